//! Kernel error taxonomy.
//!
//! Every subsystem failure is caught at its own boundary and translated
//! into one of these values; the dispatcher then maps them onto the
//! uniform result code returned to user mode. No subsystem failure is
//! allowed to take the kernel down.

use sol_hal::HalError;
use sol_vfs::FsError;

/// Kernel errors
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KernelError {
    /// Path or handle does not resolve
    NotFound,
    /// Operation valid in general but not for this node/object kind,
    /// or unrecognized syscall index
    NotSupported,
    /// Malformed request (null pointer, bad range, oversized capacity)
    InvalidArgument,
    /// Destination buffer too small in a single-shot transfer. Part of
    /// the stable result-code set; the paginated enumeration protocol
    /// reports truncation through `has_more` instead.
    BufferOverflow,
}

impl From<FsError> for KernelError {
    fn from(e: FsError) -> Self {
        match e {
            FsError::NotFound => KernelError::NotFound,
            FsError::NotADirectory
            | FsError::NotAFile
            | FsError::NotSupported
            | FsError::AlreadyExists => KernelError::NotSupported,
            FsError::InvalidPath | FsError::TooLarge => KernelError::InvalidArgument,
            FsError::Io => KernelError::NotSupported,
        }
    }
}

impl From<HalError> for KernelError {
    fn from(_: HalError) -> Self {
        KernelError::NotSupported
    }
}
