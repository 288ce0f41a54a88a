//! Per-process capability tables.
//!
//! Each process owns exactly one [`ObjectTable`] mapping opaque handle
//! ids to kernel objects. A handle from one process is never resolvable
//! in another process's table. The underlying resource is shared by
//! reference counting and destroyed when its last reference goes away,
//! which may be later than the handle (e.g. a process handle held by a
//! parent after the child has been reaped).

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use spin::Mutex;

use sol_vfs::File;

use crate::error::KernelError;
use crate::process::{Process, Thread};
use crate::types::HandleId;

/// A kernel-owned resource reachable through a handle.
#[derive(Clone)]
pub enum KernelObject {
    /// An open file stream
    File(Arc<Mutex<Box<dyn File>>>),
    /// A process control block
    Process(Arc<Process>),
    /// A thread control block
    Thread(Arc<Thread>),
}

struct TableInner {
    /// Next id to hand out. Monotonic for the table's lifetime, so a
    /// stale handle can never alias a later allocation.
    next_id: u64,
    entries: BTreeMap<HandleId, KernelObject>,
}

/// One process's handle table.
///
/// All operations take the table lock, so creates, lookups, and frees
/// from sibling threads are mutually exclusive; tables of distinct
/// processes never contend.
pub struct ObjectTable {
    inner: Mutex<TableInner>,
}

impl ObjectTable {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(TableInner {
                next_id: 1,
                entries: BTreeMap::new(),
            }),
        }
    }

    fn insert(&self, object: KernelObject) -> HandleId {
        let mut inner = self.inner.lock();
        let id = HandleId(inner.next_id);
        inner.next_id += 1;
        inner.entries.insert(id, object);
        id
    }

    /// Wrap an open file stream and return its handle.
    pub fn create_file_object(&self, file: Box<dyn File>) -> HandleId {
        self.insert(KernelObject::File(Arc::new(Mutex::new(file))))
    }

    /// Wrap a process reference and return its handle.
    pub fn create_process_object(&self, process: Arc<Process>) -> HandleId {
        self.insert(KernelObject::Process(process))
    }

    /// Wrap a thread reference and return its handle.
    pub fn create_thread_object(&self, thread: Arc<Thread>) -> HandleId {
        self.insert(KernelObject::Thread(thread))
    }

    /// Resolve a live handle to its object.
    pub fn get_object(&self, id: HandleId) -> Result<KernelObject, KernelError> {
        self.inner
            .lock()
            .entries
            .get(&id)
            .cloned()
            .ok_or(KernelError::NotFound)
    }

    /// Remove a handle, releasing the object reference it held.
    ///
    /// Freeing an unknown id is a no-op: double-close is an expected
    /// client pattern, not an error.
    pub fn free_object(&self, id: HandleId) {
        self.inner.lock().entries.remove(&id);
    }

    /// Release every entry. Called when the owning process terminates.
    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }
}

impl Default for ObjectTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sol_vfs::FsError;

    struct NullFile;

    impl File for NullFile {
        fn read(&mut self, _buf: &mut [u8]) -> Result<usize, FsError> {
            Ok(0)
        }
        fn write(&mut self, buf: &[u8]) -> Result<usize, FsError> {
            Ok(buf.len())
        }
        fn pread(&mut self, _buf: &mut [u8], _offset: u64) -> Result<usize, FsError> {
            Ok(0)
        }
        fn pwrite(&mut self, buf: &[u8], _offset: u64) -> Result<usize, FsError> {
            Ok(buf.len())
        }
    }

    #[test]
    fn handles_are_monotonic_and_never_reused() {
        let table = ObjectTable::new();
        let a = table.create_file_object(Box::new(NullFile));
        let b = table.create_file_object(Box::new(NullFile));
        assert!(b > a);

        table.free_object(a);
        let c = table.create_file_object(Box::new(NullFile));
        assert!(c > b, "freed id must not be handed out again");
    }

    #[test]
    fn free_then_get_is_not_found() {
        let table = ObjectTable::new();
        let id = table.create_file_object(Box::new(NullFile));
        assert!(table.get_object(id).is_ok());

        table.free_object(id);
        assert!(matches!(table.get_object(id), Err(KernelError::NotFound)));
    }

    #[test]
    fn free_unknown_id_is_a_noop() {
        let table = ObjectTable::new();
        table.free_object(HandleId(42));
        table.free_object(HandleId(42));
        assert!(table.is_empty());
    }

    #[test]
    fn handles_are_table_scoped() {
        let a = ObjectTable::new();
        let b = ObjectTable::new();
        let id = a.create_file_object(Box::new(NullFile));

        // The numerically equal id in another table resolves nothing.
        assert!(matches!(b.get_object(id), Err(KernelError::NotFound)));
    }

    #[test]
    fn clear_releases_everything() {
        let table = ObjectTable::new();
        let a = table.create_file_object(Box::new(NullFile));
        let b = table.create_file_object(Box::new(NullFile));
        table.clear();
        assert!(table.is_empty());
        assert!(table.get_object(a).is_err());
        assert!(table.get_object(b).is_err());
    }

    #[test]
    fn concurrent_creates_never_share_an_id() {
        use std::sync::Arc as StdArc;

        let table = StdArc::new(ObjectTable::new());
        let mut handles = std::vec::Vec::new();
        for _ in 0..8 {
            let table = table.clone();
            handles.push(std::thread::spawn(move || {
                let mut ids = std::vec::Vec::new();
                for _ in 0..100 {
                    ids.push(table.create_file_object(Box::new(NullFile)));
                }
                ids
            }));
        }

        let mut all = std::vec::Vec::new();
        for h in handles {
            all.extend(h.join().unwrap());
        }
        all.sort();
        let before = all.len();
        all.dedup();
        assert_eq!(all.len(), before, "duplicate handle id observed");
        assert_eq!(table.len(), 800);
    }
}
