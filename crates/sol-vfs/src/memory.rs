//! In-memory concrete filesystem.
//!
//! Serves as the boot ramdisk and as the test backing store. The backing
//! store is a flat list of path records in insertion order; directory
//! nodes materialize their child lists from it lazily, which exercises
//! the same load-once discipline a disk-backed filesystem needs.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use spin::Mutex;

use crate::error::FsError;
use crate::node::{File, FsNode, FsNodeKind};
use crate::path::{components, filename, is_direct_child, parent_path};

/// Upper bound on a single file's content. Streams reject writes whose
/// end would land beyond it, so a hostile offset cannot demand an
/// arbitrarily large backing allocation.
pub const MAX_FILE_SIZE: usize = 64 * 1024 * 1024;

/// One record in the backing store.
#[derive(Debug)]
struct StoreEntry {
    path: String,
    kind: FsNodeKind,
    content: Vec<u8>,
}

/// Flat backing store. Entry order is the enumeration order.
#[derive(Debug)]
struct Store {
    entries: Vec<StoreEntry>,
}

impl Store {
    fn find(&self, path: &str) -> Option<&StoreEntry> {
        self.entries.iter().find(|e| e.path == path)
    }

    fn find_mut(&mut self, path: &str) -> Option<&mut StoreEntry> {
        self.entries.iter_mut().find(|e| e.path == path)
    }
}

/// An in-memory filesystem instance.
pub struct MemoryFs {
    store: Arc<Mutex<Store>>,
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFs {
    /// Create an empty filesystem containing only the root directory.
    pub fn new() -> Self {
        let root = StoreEntry {
            path: String::from("/"),
            kind: FsNodeKind::Directory,
            content: Vec::new(),
        };
        Self {
            store: Arc::new(Mutex::new(Store {
                entries: alloc::vec![root],
            })),
        }
    }

    /// Create a directory. The parent must already exist.
    pub fn mkdir(&self, path: &str) -> Result<(), FsError> {
        let path = canonicalize(path)?;
        if path == "/" {
            return Err(FsError::AlreadyExists);
        }

        let mut store = self.store.lock();
        if store.find(&path).is_some() {
            return Err(FsError::AlreadyExists);
        }
        check_parent(&store, &path)?;

        store.entries.push(StoreEntry {
            path,
            kind: FsNodeKind::Directory,
            content: Vec::new(),
        });
        Ok(())
    }

    /// Create or overwrite a file. The parent must already exist.
    pub fn write_file(&self, path: &str, content: &[u8]) -> Result<(), FsError> {
        let path = canonicalize(path)?;
        if path == "/" {
            return Err(FsError::NotAFile);
        }

        let mut store = self.store.lock();
        if let Some(entry) = store.find_mut(&path) {
            if entry.kind != FsNodeKind::File {
                return Err(FsError::NotAFile);
            }
            entry.content.clear();
            entry.content.extend_from_slice(content);
            return Ok(());
        }
        check_parent(&store, &path)?;

        store.entries.push(StoreEntry {
            path,
            kind: FsNodeKind::File,
            content: content.to_vec(),
        });
        Ok(())
    }

    /// Root node of this filesystem's tree.
    pub fn root(&self) -> Arc<dyn FsNode> {
        Arc::new(MemNode {
            store: self.store.clone(),
            path: String::from("/"),
            name: String::new(),
            kind: FsNodeKind::Directory,
            children: Mutex::new(None),
        })
    }
}

/// Rebuild a path in canonical form ("/a/b", no duplicate separators).
fn canonicalize(path: &str) -> Result<String, FsError> {
    if !path.starts_with('/') {
        return Err(FsError::InvalidPath);
    }
    let mut out = String::new();
    for comp in components(path) {
        out.push('/');
        out.push_str(comp);
    }
    if out.is_empty() {
        out.push('/');
    }
    Ok(out)
}

fn check_parent(store: &Store, path: &str) -> Result<(), FsError> {
    match store.find(parent_path(path)) {
        Some(p) if p.kind == FsNodeKind::Directory => Ok(()),
        Some(_) => Err(FsError::NotADirectory),
        None => Err(FsError::NotFound),
    }
}

/// A node backed by the in-memory store.
#[derive(Debug)]
struct MemNode {
    store: Arc<Mutex<Store>>,
    path: String,
    name: String,
    kind: FsNodeKind,
    /// Lazily populated child list. None until the first load.
    children: Mutex<Option<Vec<Arc<MemNode>>>>,
}

impl MemNode {
    fn child_node(&self, path: String, name: String, kind: FsNodeKind) -> Arc<MemNode> {
        Arc::new(MemNode {
            store: self.store.clone(),
            path,
            name,
            kind,
            children: Mutex::new(None),
        })
    }
}

impl FsNode for MemNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> FsNodeKind {
        self.kind
    }

    fn size(&self) -> u64 {
        match self.kind {
            FsNodeKind::Directory => 0,
            FsNodeKind::File => self
                .store
                .lock()
                .find(&self.path)
                .map(|e| e.content.len() as u64)
                .unwrap_or(0),
        }
    }

    fn load_directory(&self) -> Result<(), FsError> {
        if self.kind != FsNodeKind::Directory {
            return Err(FsError::NotADirectory);
        }

        // Holding the child-list lock across the population makes
        // concurrent first loads serialize; later callers see Some and
        // return without touching the store.
        let mut children = self.children.lock();
        if children.is_some() {
            return Ok(());
        }

        let mut loaded: Vec<Arc<MemNode>> = Vec::new();
        if self.path != "/" {
            loaded.push(self.child_node(
                self.path.clone(),
                String::from("."),
                FsNodeKind::Directory,
            ));
            loaded.push(self.child_node(
                String::from(parent_path(&self.path)),
                String::from(".."),
                FsNodeKind::Directory,
            ));
        }

        let store = self.store.lock();
        for entry in &store.entries {
            if is_direct_child(&self.path, &entry.path) {
                loaded.push(self.child_node(
                    entry.path.clone(),
                    String::from(filename(&entry.path)),
                    entry.kind,
                ));
            }
        }
        drop(store);

        *children = Some(loaded);
        Ok(())
    }

    fn children(&self) -> Result<Vec<Arc<dyn FsNode>>, FsError> {
        self.load_directory()?;
        let children = self.children.lock();
        let loaded = match children.as_ref() {
            Some(loaded) => loaded,
            None => return Err(FsError::Io),
        };
        Ok(loaded
            .iter()
            .map(|c| c.clone() as Arc<dyn FsNode>)
            .collect())
    }

    fn open(&self) -> Result<Box<dyn File>, FsError> {
        match self.kind {
            FsNodeKind::Directory => Err(FsError::NotSupported),
            FsNodeKind::File => Ok(Box::new(MemFile {
                store: self.store.clone(),
                path: self.path.clone(),
                pos: 0,
            })),
        }
    }
}

/// An open stream over a file in the store.
struct MemFile {
    store: Arc<Mutex<Store>>,
    path: String,
    pos: usize,
}

impl MemFile {
    fn read_at(&self, buf: &mut [u8], offset: usize) -> Result<usize, FsError> {
        let store = self.store.lock();
        let entry = store.find(&self.path).ok_or(FsError::NotFound)?;
        if offset >= entry.content.len() {
            return Ok(0);
        }
        let n = core::cmp::min(buf.len(), entry.content.len() - offset);
        buf[..n].copy_from_slice(&entry.content[offset..offset + n]);
        Ok(n)
    }

    fn write_at(&self, buf: &[u8], offset: usize) -> Result<usize, FsError> {
        let end = offset.checked_add(buf.len()).ok_or(FsError::TooLarge)?;
        if end > MAX_FILE_SIZE {
            return Err(FsError::TooLarge);
        }
        let mut store = self.store.lock();
        let entry = store.find_mut(&self.path).ok_or(FsError::NotFound)?;
        if entry.content.len() < end {
            entry.content.resize(end, 0);
        }
        entry.content[offset..end].copy_from_slice(buf);
        Ok(buf.len())
    }
}

impl File for MemFile {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, FsError> {
        let n = self.read_at(buf, self.pos)?;
        self.pos += n;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, FsError> {
        let n = self.write_at(buf, self.pos)?;
        self.pos += n;
        Ok(n)
    }

    fn pread(&mut self, buf: &mut [u8], offset: u64) -> Result<usize, FsError> {
        match usize::try_from(offset) {
            Ok(offset) => self.read_at(buf, offset),
            // Past the end of any representable content.
            Err(_) => Ok(0),
        }
    }

    fn pwrite(&mut self, buf: &[u8], offset: u64) -> Result<usize, FsError> {
        let offset = usize::try_from(offset).map_err(|_| FsError::TooLarge)?;
        self.write_at(buf, offset)
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod memory_tests;
