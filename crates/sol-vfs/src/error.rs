//! Error types for the VFS layer.

/// Errors from VFS operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FsError {
    /// Path or node not found
    NotFound,

    /// Path already exists
    AlreadyExists,

    /// Not a directory
    NotADirectory,

    /// Not a file
    NotAFile,

    /// Operation not valid for this node kind
    NotSupported,

    /// Invalid path format
    InvalidPath,

    /// Offset or size beyond what the backing store supports
    TooLarge,

    /// Backing store error
    Io,
}
