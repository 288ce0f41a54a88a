//! Solstice OS Virtual Filesystem Layer
//!
//! The VFS presents the kernel with a single rooted tree of nodes. Leaf
//! nodes are files, interior nodes are directories whose children are
//! populated lazily on first access. Which concrete filesystem backs a
//! node is invisible above the [`FsNode`] trait: the lookup and
//! enumeration code here never assumes a specific backing format.
//!
//! - **node**: the polymorphic [`FsNode`] capability and the [`File`]
//!   stream trait
//! - **path**: path splitting and validation helpers
//! - **vfs**: component-wise lookup against the tree root
//! - **dirent**: the fixed-layout directory-entry wire format
//! - **memory**: an in-memory concrete filesystem (boot ramdisk and tests)
//!
//! # Concurrency
//!
//! The tree is read-mostly. The only write after construction is the
//! first-time population of a directory's child list, which is
//! synchronized per directory; see [`FsNode::load_directory`].

#![no_std]
extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod dirent;
pub mod error;
pub mod memory;
pub mod node;
pub mod path;
pub mod vfs;

pub use dirent::{DirectoryEntry, DIRENT_WIRE_LEN, MAX_NAME_LEN};
pub use error::FsError;
pub use memory::{MemoryFs, MAX_FILE_SIZE};
pub use node::{File, FsNode, FsNodeKind};
pub use path::{components, filename, parent_path};
pub use vfs::Vfs;
