//! The polymorphic filesystem node capability.
//!
//! Every concrete filesystem exposes its tree through [`FsNode`]. The VFS
//! lookup layer and the syscall dispatcher operate exclusively on this
//! trait; they never downcast to a concrete node type.

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::error::FsError;

/// Kind of a filesystem node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FsNodeKind {
    File,
    Directory,
}

/// An open file stream.
///
/// Sequential [`read`](File::read)/[`write`](File::write) advance the
/// stream position; the positional variants do not.
pub trait File: Send {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, FsError>;
    fn write(&mut self, buf: &[u8]) -> Result<usize, FsError>;
    fn pread(&mut self, buf: &mut [u8], offset: u64) -> Result<usize, FsError>;
    fn pwrite(&mut self, buf: &[u8], offset: u64) -> Result<usize, FsError>;

    /// Device-specific control. Plain file streams do not support any ops.
    fn ioctl(&mut self, _op: u64, _arg: &mut [u8]) -> Result<u64, FsError> {
        Err(FsError::NotSupported)
    }
}

/// An element of the filesystem tree.
///
/// The tree owns all nodes; a node handle is an `Arc<dyn FsNode>` and
/// never outlives its tree.
pub trait FsNode: Send + Sync + core::fmt::Debug {
    /// Node name within its parent directory.
    fn name(&self) -> &str;

    /// File or directory.
    fn kind(&self) -> FsNodeKind;

    /// Size in bytes for files; 0 for directories.
    fn size(&self) -> u64;

    /// Populate this directory's children from the backing store.
    ///
    /// The first call loads; every later call is a no-op. Concurrent
    /// first calls on the same directory must be synchronized by the
    /// implementation so the child list is neither duplicated nor
    /// corrupted. Returns `NotADirectory` for file nodes.
    fn load_directory(&self) -> Result<(), FsError>;

    /// The loaded child list, in backing-store order.
    ///
    /// Loads the directory first if it has not been loaded yet. The
    /// special self/parent entries ("." and "..") are present here when
    /// the backing store carries them; enumeration output filters them.
    fn children(&self) -> Result<Vec<Arc<dyn FsNode>>, FsError>;

    /// Open this node as a stream.
    ///
    /// Directories are not openable as streams and return `NotSupported`.
    fn open(&self) -> Result<Box<dyn File>, FsError>;
}
