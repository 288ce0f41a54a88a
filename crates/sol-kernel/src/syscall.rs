//! Syscall ABI: stable numbering and the uniform result type.
//!
//! User mode traps in with a syscall index and four machine-word
//! arguments and always receives a `(code, data)` pair back, for every
//! index in the table. Pointer arguments are addresses in the calling
//! process's virtual address space and are validated before use.

use crate::error::KernelError;

// ============================================================================
// Canonical syscall numbers (ABI, stable)
// ============================================================================

/// Stop the calling process
pub const SYS_EXIT: u64 = 0x00;
/// Open a path as a file object; args: path ptr
pub const SYS_OPEN: u64 = 0x01;
/// Free an object handle; args: handle
pub const SYS_CLOSE: u64 = 0x02;
/// Sequential read; args: handle, buf ptr, len
pub const SYS_READ: u64 = 0x03;
/// Sequential write; args: handle, buf ptr, len
pub const SYS_WRITE: u64 = 0x04;
/// Positional read; args: handle, buf ptr, len, offset
pub const SYS_PREAD: u64 = 0x05;
/// Positional write; args: handle, buf ptr, len, offset
pub const SYS_PWRITE: u64 = 0x06;
/// Device-specific control; args: handle, op, arg ptr, len
pub const SYS_IOCTL: u64 = 0x07;
/// Allocate an address-space region; args: size
pub const SYS_ALLOC_MEM: u64 = 0x08;
/// Create and start a process; args: path ptr, args ptr
pub const SYS_START_PROCESS: u64 = 0x09;
/// Block until a process's status changes; args: handle
pub const SYS_WAIT_FOR_PROCESS: u64 = 0x0a;
/// Create and start a thread; args: entry, arg
pub const SYS_START_THREAD: u64 = 0x0b;
/// Terminate the calling thread; never returns
pub const SYS_STOP_CURRENT_THREAD: u64 = 0x0c;
/// Block until a thread terminates; args: handle
pub const SYS_JOIN_THREAD: u64 = 0x0d;
/// Block the calling thread; args: milliseconds
pub const SYS_SLEEP: u64 = 0x0e;
/// Enumerate a directory; args: path ptr, buffer ptr, capacity (entries)
pub const SYS_LIST_DIRECTORY: u64 = 0x0f;
/// Hardware shutdown request
pub const SYS_POWEROFF: u64 = 0x10;

/// Longest path accepted across the syscall boundary, terminator included.
pub const MAX_PATH_LEN: usize = 1024;

// ============================================================================
// Uniform result
// ============================================================================

/// Result codes exposed at the syscall boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum SyscallResultCode {
    Ok = 0,
    NotFound = 1,
    NotSupported = 2,
    InvalidArgument = 3,
    BufferOverflow = 4,
}

impl From<KernelError> for SyscallResultCode {
    fn from(e: KernelError) -> Self {
        match e {
            KernelError::NotFound => SyscallResultCode::NotFound,
            KernelError::NotSupported => SyscallResultCode::NotSupported,
            KernelError::InvalidArgument => SyscallResultCode::InvalidArgument,
            KernelError::BufferOverflow => SyscallResultCode::BufferOverflow,
        }
    }
}

/// The `(code, data)` pair returned to user mode.
///
/// `data` carries success payloads (a handle id, a byte count, a region
/// base) and is 0 otherwise.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyscallResult {
    pub code: SyscallResultCode,
    pub data: u64,
}

impl SyscallResult {
    pub fn ok(data: u64) -> Self {
        Self {
            code: SyscallResultCode::Ok,
            data,
        }
    }

    pub fn error(code: SyscallResultCode) -> Self {
        Self { code, data: 0 }
    }
}

impl From<KernelError> for SyscallResult {
    fn from(e: KernelError) -> Self {
        Self::error(e.into())
    }
}

/// What the trap layer should do after a dispatch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyscallOutcome {
    /// Return the result to user mode on the calling thread.
    Complete(SyscallResult),
    /// The calling thread is parked; the scheduler resumes it later
    /// with the thread's pending result.
    Blocked,
    /// The calling thread (or its whole process) has terminated; control
    /// goes back to the scheduler and never returns to the caller.
    Terminated,
}

// ============================================================================
// Directory-listing response packing
// ============================================================================

/// Bit carrying the `has_more` truncation flag in a listing response.
pub const LIST_DIR_HAS_MORE_BIT: u64 = 1 << 32;

/// Pack a directory-listing response into the result data word:
/// bits 31..0 hold `entries_written`, bit 32 holds `has_more`.
pub fn pack_list_response(entries_written: u32, has_more: bool) -> u64 {
    let mut data = entries_written as u64;
    if has_more {
        data |= LIST_DIR_HAS_MORE_BIT;
    }
    data
}

/// Unpack a listing response. Used by user-space clients and tests.
pub fn unpack_list_response(data: u64) -> (u32, bool) {
    (data as u32, data & LIST_DIR_HAS_MORE_BIT != 0)
}
