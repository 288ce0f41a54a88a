//! Solstice OS Hardware Abstraction Layer
//!
//! The kernel core never touches hardware directly. Everything the core
//! needs from the platform goes through the [`Hal`] trait, which is
//! implemented once per target (bare metal, emulator, test harness) and
//! threaded by reference into the kernel at construction.
//!
//! Keeping this contract narrow is deliberate: the core in `sol-kernel`
//! stays buildable and testable on a hosted target, with [`NullHal`]
//! standing in for real hardware.

#![no_std]

use core::sync::atomic::{AtomicU64, Ordering};

/// Errors reported by platform implementations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HalError {
    /// The platform cannot perform the requested operation
    Unsupported,
    /// The underlying device reported a failure
    Device,
}

/// Platform contract required by the kernel core.
pub trait Hal: Send + Sync {
    /// Write a line of diagnostic output (serial port, host console, ...).
    fn debug_write(&self, msg: &str);

    /// Monotonic time in nanoseconds since boot.
    fn now_nanos(&self) -> u64;

    /// Monotonic time in milliseconds since boot.
    fn now_millis(&self) -> u64 {
        self.now_nanos() / 1_000_000
    }

    /// Request hardware shutdown. May not return on bare metal.
    fn poweroff(&self) -> Result<(), HalError>;
}

/// Inert HAL for tests and hosted runs.
///
/// Discards debug output, reports a manually advanced clock, and records
/// poweroff requests instead of acting on them.
#[derive(Default)]
pub struct NullHal {
    now: AtomicU64,
    poweroff_requests: AtomicU64,
}

impl NullHal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the fake clock by `nanos`.
    pub fn advance(&self, nanos: u64) {
        self.now.fetch_add(nanos, Ordering::SeqCst);
    }

    /// Number of poweroff requests seen so far.
    pub fn poweroff_requests(&self) -> u64 {
        self.poweroff_requests.load(Ordering::SeqCst)
    }
}

impl Hal for NullHal {
    fn debug_write(&self, _msg: &str) {}

    fn now_nanos(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }

    fn poweroff(&self) -> Result<(), HalError> {
        self.poweroff_requests.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
