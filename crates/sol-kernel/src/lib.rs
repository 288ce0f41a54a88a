//! Solstice OS Kernel Core
//!
//! This crate implements the hardware-independent core of the kernel:
//!
//! - `types` - identifier and state types (ProcessId, ThreadId, ...)
//! - `error` - the kernel error taxonomy
//! - `object` - per-process capability tables mapping handles to objects
//! - `process` - process and thread lifecycle, wait/join notification
//! - `memory` - address-space region allocation and user-pointer checks
//! - `syscall` - syscall numbers and the uniform result type (ABI)
//! - `dispatch` - the single syscall entry point
//! - `kernel` - the kernel context object constructed at boot
//!
//! There are no global singletons: the [`Kernel`] is built once at boot
//! from a [`sol_hal::Hal`] and a [`sol_vfs::Vfs`] and passed by
//! reference into the trap layer, which makes the whole core testable
//! on a hosted target.

#![no_std]
extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod dispatch;
pub mod error;
pub mod kernel;
pub mod memory;
pub mod object;
pub mod process;
pub mod syscall;
pub mod types;

pub use dispatch::dispatch_syscall;
pub use error::KernelError;
pub use kernel::Kernel;
pub use memory::{AddressSpace, Region, RegionFlags, PAGE_SIZE};
pub use object::{KernelObject, ObjectTable};
pub use process::{Process, ProcessManager, Thread, WaitOutcome};
pub use syscall::{SyscallOutcome, SyscallResult, SyscallResultCode};
pub use types::{HandleId, ProcessId, ProcessState, ThreadId, ThreadState};
