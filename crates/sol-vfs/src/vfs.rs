//! Path lookup against the tree root.

use alloc::boxed::Box;
use alloc::sync::Arc;

use crate::error::FsError;
use crate::node::{File, FsNode, FsNodeKind};
use crate::path::components;

/// The virtual filesystem: a single rooted node tree.
///
/// Constructed at boot from the concrete filesystem's root node and
/// threaded into the kernel by reference; there is no global instance.
pub struct Vfs {
    root: Arc<dyn FsNode>,
}

impl Vfs {
    pub fn new(root: Arc<dyn FsNode>) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Arc<dyn FsNode> {
        &self.root
    }

    /// Resolve an absolute path, component by component.
    ///
    /// Directories are loaded on demand during descent. Returns
    /// `NotFound` when a component is missing or when descent hits a
    /// file before the final component.
    pub fn lookup(&self, path: &str) -> Result<Arc<dyn FsNode>, FsError> {
        if !path.starts_with('/') {
            return Err(FsError::InvalidPath);
        }

        let mut current = self.root.clone();
        for comp in components(path) {
            if current.kind() != FsNodeKind::Directory {
                return Err(FsError::NotFound);
            }
            current = current
                .children()?
                .into_iter()
                .find(|c| c.name() == comp)
                .ok_or(FsError::NotFound)?;
        }
        Ok(current)
    }

    /// Resolve a path and open it as a stream.
    pub fn open(&self, path: &str) -> Result<Box<dyn File>, FsError> {
        self.lookup(path)?.open()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryFs;

    fn sample_vfs() -> Vfs {
        let fs = MemoryFs::new();
        fs.mkdir("/usr").unwrap();
        fs.mkdir("/usr/bin").unwrap();
        fs.write_file("/usr/bin/ls", b"elf").unwrap();
        fs.write_file("/motd", b"welcome").unwrap();
        Vfs::new(fs.root())
    }

    #[test]
    fn lookup_root() {
        let vfs = sample_vfs();
        let node = vfs.lookup("/").unwrap();
        assert_eq!(node.kind(), FsNodeKind::Directory);
    }

    #[test]
    fn lookup_nested_file() {
        let vfs = sample_vfs();
        let node = vfs.lookup("/usr/bin/ls").unwrap();
        assert_eq!(node.kind(), FsNodeKind::File);
        assert_eq!(node.name(), "ls");
        assert_eq!(node.size(), 3);
    }

    #[test]
    fn lookup_tolerates_duplicate_separators() {
        let vfs = sample_vfs();
        assert!(vfs.lookup("//usr//bin/").is_ok());
    }

    #[test]
    fn lookup_through_dot_entries() {
        let vfs = sample_vfs();
        let node = vfs.lookup("/usr/bin/./ls").unwrap();
        assert_eq!(node.name(), "ls");
        let node = vfs.lookup("/usr/bin/../bin/ls").unwrap();
        assert_eq!(node.name(), "ls");
    }

    #[test]
    fn lookup_missing_component() {
        let vfs = sample_vfs();
        assert!(matches!(vfs.lookup("/usr/lib"), Err(FsError::NotFound)));
    }

    #[test]
    fn lookup_descent_through_file_fails() {
        let vfs = sample_vfs();
        assert!(matches!(vfs.lookup("/motd/inner"), Err(FsError::NotFound)));
    }

    #[test]
    fn relative_path_rejected() {
        let vfs = sample_vfs();
        assert!(matches!(vfs.lookup("usr/bin"), Err(FsError::InvalidPath)));
    }

    #[test]
    fn open_resolves_and_opens() {
        let vfs = sample_vfs();
        let mut stream = vfs.open("/motd").unwrap();
        let mut buf = [0u8; 16];
        let n = stream.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"welcome");

        assert!(matches!(vfs.open("/usr"), Err(FsError::NotSupported)));
        assert!(matches!(vfs.open("/nope"), Err(FsError::NotFound)));
    }
}
