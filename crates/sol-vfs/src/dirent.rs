//! Directory-entry wire format.
//!
//! This is the record layout returned to user space by the
//! directory-listing syscall. The layout is fixed so that the same
//! struct definition can live on both sides of the ABI:
//!
//! ```text
//! offset 0    name    256 bytes (up to 255 significant + mandatory NUL)
//! offset 256  type    1 byte    (0 = file, 1 = directory)
//! offset 257  size    8 bytes   little-endian, 0 for directories
//! ```

use alloc::string::String;

use crate::error::FsError;
use crate::node::{FsNode, FsNodeKind};

/// Maximum significant name length in a wire record.
pub const MAX_NAME_LEN: usize = 255;

/// Width of the name field, including the terminator.
pub const NAME_FIELD_LEN: usize = MAX_NAME_LEN + 1;

/// Total wire length of one record.
pub const DIRENT_WIRE_LEN: usize = NAME_FIELD_LEN + 1 + 8;

const TYPE_FILE: u8 = 0;
const TYPE_DIRECTORY: u8 = 1;

/// One directory entry as seen across the syscall boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: String,
    pub kind: FsNodeKind,
    /// File size in bytes; always 0 for directories.
    pub size: u64,
}

impl DirectoryEntry {
    /// Build an entry describing `node`.
    pub fn from_node(node: &dyn FsNode) -> Self {
        let kind = node.kind();
        Self {
            name: String::from(node.name()),
            kind,
            size: match kind {
                FsNodeKind::File => node.size(),
                FsNodeKind::Directory => 0,
            },
        }
    }

    /// Serialize to the fixed wire layout.
    ///
    /// Names longer than [`MAX_NAME_LEN`] bytes are truncated; the
    /// terminator is always present.
    pub fn encode(&self) -> [u8; DIRENT_WIRE_LEN] {
        let mut out = [0u8; DIRENT_WIRE_LEN];
        let bytes = self.name.as_bytes();
        let len = core::cmp::min(bytes.len(), MAX_NAME_LEN);
        out[..len].copy_from_slice(&bytes[..len]);
        out[NAME_FIELD_LEN] = match self.kind {
            FsNodeKind::File => TYPE_FILE,
            FsNodeKind::Directory => TYPE_DIRECTORY,
        };
        let size = match self.kind {
            FsNodeKind::File => self.size,
            FsNodeKind::Directory => 0,
        };
        out[NAME_FIELD_LEN + 1..].copy_from_slice(&size.to_le_bytes());
        out
    }

    /// Parse one wire record. Used by user-space clients and tests.
    pub fn decode(buf: &[u8]) -> Result<Self, FsError> {
        if buf.len() < DIRENT_WIRE_LEN {
            return Err(FsError::Io);
        }
        let name_field = &buf[..NAME_FIELD_LEN];
        let nul = name_field
            .iter()
            .position(|&b| b == 0)
            .ok_or(FsError::Io)?;
        let name = String::from_utf8_lossy(&name_field[..nul]).into_owned();
        let kind = match buf[NAME_FIELD_LEN] {
            TYPE_FILE => FsNodeKind::File,
            TYPE_DIRECTORY => FsNodeKind::Directory,
            _ => return Err(FsError::Io),
        };
        let mut size_bytes = [0u8; 8];
        size_bytes.copy_from_slice(&buf[NAME_FIELD_LEN + 1..DIRENT_WIRE_LEN]);
        Ok(Self {
            name,
            kind,
            size: u64::from_le_bytes(size_bytes),
        })
    }
}
