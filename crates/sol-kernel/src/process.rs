//! Process and thread control blocks.
//!
//! Lifecycle here is deliberately decoupled from any scheduler: a
//! blocked thread is simply marked [`ThreadState::Blocked`] with an
//! empty pending-result slot, and whoever wakes it deposits the
//! syscall result via [`Thread::unblock_with`]. Check-and-park always
//! happens under the same lock as the state being waited on, so a
//! wakeup racing with the park is never lost.

use alloc::string::String;
use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;
use alloc::collections::BTreeMap;
use core::sync::atomic::{AtomicU64, Ordering};
use spin::Mutex;

use sol_vfs::{FsNodeKind, Vfs};

use crate::error::KernelError;
use crate::memory::AddressSpace;
use crate::object::ObjectTable;
use crate::syscall::SyscallResult;
use crate::types::{ProcessId, ProcessState, ThreadId, ThreadState};

/// Result of attempting a blocking wait.
pub enum WaitOutcome {
    /// The condition already held; the result is available now.
    Ready(SyscallResult),
    /// The caller was parked and will receive its result on wakeup.
    Parked,
}

struct ThreadLifecycle {
    state: ThreadState,
    /// Threads parked in a join on this thread.
    joiners: Vec<Arc<Thread>>,
}

/// A thread control block.
pub struct Thread {
    tid: ThreadId,
    owner: Weak<Process>,
    entry: u64,
    arg: u64,
    lifecycle: Mutex<ThreadLifecycle>,
    /// Result deposited by a waker for a parked thread, consumed when
    /// the thread resumes.
    pending: Mutex<Option<SyscallResult>>,
}

impl Thread {
    fn new(tid: ThreadId, owner: Weak<Process>, entry: u64, arg: u64) -> Arc<Self> {
        Arc::new(Self {
            tid,
            owner,
            entry,
            arg,
            lifecycle: Mutex::new(ThreadLifecycle {
                state: ThreadState::Created,
                joiners: Vec::new(),
            }),
            pending: Mutex::new(None),
        })
    }

    pub fn id(&self) -> ThreadId {
        self.tid
    }

    pub fn entry_point(&self) -> u64 {
        self.entry
    }

    pub fn entry_arg(&self) -> u64 {
        self.arg
    }

    /// The process this thread belongs to, if it still exists.
    pub fn owner(&self) -> Option<Arc<Process>> {
        self.owner.upgrade()
    }

    pub fn state(&self) -> ThreadState {
        self.lifecycle.lock().state
    }

    /// Make a `Created` thread runnable.
    pub fn start(&self) {
        let mut lc = self.lifecycle.lock();
        if lc.state == ThreadState::Created {
            lc.state = ThreadState::Running;
        }
    }

    /// Terminate this thread and wake every joiner with `result`.
    pub fn stop(&self, result: SyscallResult) {
        let joiners = {
            let mut lc = self.lifecycle.lock();
            if lc.state == ThreadState::Stopped {
                return;
            }
            lc.state = ThreadState::Stopped;
            core::mem::take(&mut lc.joiners)
        };
        for j in joiners {
            j.unblock_with(result);
        }
    }

    /// Park this thread. The caller must have arranged for a wakeup.
    pub fn block(&self) {
        let mut lc = self.lifecycle.lock();
        if lc.state == ThreadState::Running {
            lc.state = ThreadState::Blocked;
        }
    }

    /// Wake a parked thread, handing it the result of the syscall it
    /// was blocked in.
    pub fn unblock_with(&self, result: SyscallResult) {
        *self.pending.lock() = Some(result);
        let mut lc = self.lifecycle.lock();
        if lc.state == ThreadState::Blocked {
            lc.state = ThreadState::Running;
        }
    }

    /// Consume the result deposited by the last wakeup.
    pub fn take_pending_result(&self) -> Option<SyscallResult> {
        self.pending.lock().take()
    }

    /// Join on this thread. Returns immediately if it has already
    /// stopped, otherwise parks `joiner` until it does.
    ///
    /// Both lifecycles must be held to park the joiner without a missed
    /// wakeup; they are taken in thread-id order so two threads joining
    /// each other cannot deadlock on the locks. (Such a mutual join
    /// still parks both threads for good, which is the callers'
    /// mistake, not a kernel hang.)
    pub fn join(&self, joiner: &Arc<Thread>) -> WaitOutcome {
        if self.tid == joiner.tid {
            return WaitOutcome::Ready(KernelError::InvalidArgument.into());
        }
        let (mut target, mut parked) = if self.tid < joiner.tid {
            let t = self.lifecycle.lock();
            let j = joiner.lifecycle.lock();
            (t, j)
        } else {
            let j = joiner.lifecycle.lock();
            let t = self.lifecycle.lock();
            (t, j)
        };
        if target.state == ThreadState::Stopped {
            return WaitOutcome::Ready(SyscallResult::ok(0));
        }
        target.joiners.push(joiner.clone());
        if parked.state == ThreadState::Running {
            parked.state = ThreadState::Blocked;
        }
        WaitOutcome::Parked
    }
}

struct ProcessStatus {
    state: ProcessState,
    exit_code: u64,
    /// Threads parked waiting for this process to stop.
    waiters: Vec<Arc<Thread>>,
}

/// A process control block.
///
/// Owns the handle table and address space; both die with the process.
pub struct Process {
    pid: ProcessId,
    name: String,
    args: String,
    status: Mutex<ProcessStatus>,
    threads: Mutex<Vec<Arc<Thread>>>,
    objects: ObjectTable,
    addrspace: AddressSpace,
}

impl Process {
    pub fn id(&self) -> ProcessId {
        self.pid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &str {
        &self.args
    }

    pub fn objects(&self) -> &ObjectTable {
        &self.objects
    }

    pub fn addrspace(&self) -> &AddressSpace {
        &self.addrspace
    }

    pub fn state(&self) -> ProcessState {
        self.status.lock().state
    }

    pub fn exit_code(&self) -> u64 {
        self.status.lock().exit_code
    }

    /// The thread created with the process.
    pub fn main_thread(&self) -> Arc<Thread> {
        self.threads.lock()[0].clone()
    }

    pub fn threads(&self) -> Vec<Arc<Thread>> {
        self.threads.lock().clone()
    }

    /// Start the process: mark it running, start every thread still in
    /// `Created`, and deliver the new status to any waiter that parked
    /// while the process was inert.
    pub fn start(&self) {
        let waiters = {
            let mut status = self.status.lock();
            if status.state != ProcessState::Created {
                return;
            }
            status.state = ProcessState::Running;
            core::mem::take(&mut status.waiters)
        };
        for t in self.threads.lock().iter() {
            t.start();
        }
        let observed = SyscallResult::ok(ProcessState::Running.as_u64());
        for w in waiters {
            w.unblock_with(observed);
        }
    }

    /// Terminate the process with `exit_code`.
    ///
    /// Stops every thread (waking their joiners), wakes every process
    /// waiter with the exit code, and releases the handle table. The
    /// stop is idempotent; `Stopped` is terminal.
    pub fn stop(&self, exit_code: u64) {
        let waiters = {
            let mut status = self.status.lock();
            if status.state == ProcessState::Stopped {
                return;
            }
            status.state = ProcessState::Stopped;
            status.exit_code = exit_code;
            core::mem::take(&mut status.waiters)
        };
        for t in self.threads.lock().iter() {
            t.stop(SyscallResult::ok(0));
        }
        self.objects.clear();
        let observed = SyscallResult::ok(ProcessState::Stopped.as_u64());
        for w in waiters {
            w.unblock_with(observed);
        }
    }

    /// Wait for this process to stop. Returns the new status at once if
    /// it already has, otherwise parks `waiter`.
    pub fn wait_for_status_change(&self, waiter: &Arc<Thread>) -> WaitOutcome {
        let mut status = self.status.lock();
        if status.state == ProcessState::Stopped {
            return WaitOutcome::Ready(SyscallResult::ok(status.state.as_u64()));
        }
        status.waiters.push(waiter.clone());
        waiter.block();
        WaitOutcome::Parked
    }
}

/// Factory and registry for processes and threads.
pub struct ProcessManager {
    procs: Mutex<BTreeMap<ProcessId, Arc<Process>>>,
    next_pid: AtomicU64,
    next_tid: AtomicU64,
}

impl ProcessManager {
    pub fn new() -> Self {
        Self {
            procs: Mutex::new(BTreeMap::new()),
            next_pid: AtomicU64::new(1),
            next_tid: AtomicU64::new(1),
        }
    }

    /// Create an inert process from an executable path.
    ///
    /// The path must resolve to a file. The process comes back in
    /// `Created` with one main thread, also in `Created`; nothing runs
    /// until [`Process::start`].
    pub fn create_process(
        &self,
        vfs: &Vfs,
        path: &str,
        args: &str,
    ) -> Result<Arc<Process>, KernelError> {
        let node = vfs.lookup(path)?;
        if node.kind() != FsNodeKind::File {
            return Err(KernelError::NotFound);
        }

        let pid = ProcessId(self.next_pid.fetch_add(1, Ordering::Relaxed));
        let process = Arc::new_cyclic(|weak: &Weak<Process>| {
            let tid = ThreadId(self.next_tid.fetch_add(1, Ordering::Relaxed));
            let main = Thread::new(tid, weak.clone(), 0, 0);
            Process {
                pid,
                name: String::from(path),
                args: String::from(args),
                status: Mutex::new(ProcessStatus {
                    state: ProcessState::Created,
                    exit_code: 0,
                    waiters: Vec::new(),
                }),
                threads: Mutex::new(alloc::vec![main]),
                objects: ObjectTable::new(),
                addrspace: AddressSpace::new(),
            }
        });
        self.procs.lock().insert(pid, process.clone());
        Ok(process)
    }

    /// Create an inert thread inside `process` with the given entry
    /// point and argument.
    pub fn create_thread(
        &self,
        process: &Arc<Process>,
        entry: u64,
        arg: u64,
    ) -> Result<Arc<Thread>, KernelError> {
        if process.state() == ProcessState::Stopped {
            return Err(KernelError::InvalidArgument);
        }
        let tid = ThreadId(self.next_tid.fetch_add(1, Ordering::Relaxed));
        let thread = Thread::new(tid, Arc::downgrade(process), entry, arg);
        process.threads.lock().push(thread.clone());
        Ok(thread)
    }

    pub fn get(&self, pid: ProcessId) -> Option<Arc<Process>> {
        self.procs.lock().get(&pid).cloned()
    }

    pub fn count(&self) -> usize {
        self.procs.lock().len()
    }

    /// Drop the registry's reference to a stopped process.
    pub fn reap(&self, pid: ProcessId) -> Result<(), KernelError> {
        let mut procs = self.procs.lock();
        match procs.get(&pid) {
            Some(p) if p.state() == ProcessState::Stopped => {
                procs.remove(&pid);
                Ok(())
            }
            Some(_) => Err(KernelError::InvalidArgument),
            None => Err(KernelError::NotFound),
        }
    }
}

impl Default for ProcessManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sol_vfs::MemoryFs;

    fn test_vfs() -> Vfs {
        let fs = MemoryFs::new();
        fs.mkdir("/bin").unwrap();
        fs.write_file("/bin/shell", b"\x7fELF").unwrap();
        Vfs::new(fs.root())
    }

    #[test]
    fn create_process_requires_a_file() {
        let vfs = test_vfs();
        let pm = ProcessManager::new();
        assert!(matches!(
            pm.create_process(&vfs, "/bin/missing", ""),
            Err(KernelError::NotFound)
        ));
        assert!(matches!(
            pm.create_process(&vfs, "/bin", ""),
            Err(KernelError::NotFound)
        ));
        assert!(pm.create_process(&vfs, "/bin/shell", "").is_ok());
    }

    #[test]
    fn new_process_is_inert_until_started() {
        let vfs = test_vfs();
        let pm = ProcessManager::new();
        let p = pm.create_process(&vfs, "/bin/shell", "-l").unwrap();

        assert_eq!(p.state(), ProcessState::Created);
        assert_eq!(p.main_thread().state(), ThreadState::Created);
        assert_eq!(p.args(), "-l");

        p.start();
        assert_eq!(p.state(), ProcessState::Running);
        assert_eq!(p.main_thread().state(), ThreadState::Running);
    }

    #[test]
    fn pids_and_tids_are_unique() {
        let vfs = test_vfs();
        let pm = ProcessManager::new();
        let a = pm.create_process(&vfs, "/bin/shell", "").unwrap();
        let b = pm.create_process(&vfs, "/bin/shell", "").unwrap();
        assert_ne!(a.id(), b.id());
        assert_ne!(a.main_thread().id(), b.main_thread().id());

        let t = pm.create_thread(&a, 0x1000, 7).unwrap();
        assert_ne!(t.id(), a.main_thread().id());
        assert_eq!(t.entry_point(), 0x1000);
        assert_eq!(t.entry_arg(), 7);
    }

    #[test]
    fn stop_terminates_threads_and_clears_handles() {
        let vfs = test_vfs();
        let pm = ProcessManager::new();
        let p = pm.create_process(&vfs, "/bin/shell", "").unwrap();
        p.start();
        let extra = pm.create_thread(&p, 0x2000, 0).unwrap();
        extra.start();
        p.objects().create_process_object(p.clone());

        p.stop(3);
        assert_eq!(p.state(), ProcessState::Stopped);
        assert_eq!(p.exit_code(), 3);
        assert_eq!(p.main_thread().state(), ThreadState::Stopped);
        assert_eq!(extra.state(), ThreadState::Stopped);
        assert!(p.objects().is_empty());

        // Terminal: a second stop keeps the first exit code.
        p.stop(9);
        assert_eq!(p.exit_code(), 3);
    }

    #[test]
    fn wait_on_running_process_parks_and_observes_new_status() {
        let vfs = test_vfs();
        let pm = ProcessManager::new();
        let parent = pm.create_process(&vfs, "/bin/shell", "").unwrap();
        parent.start();
        let child = pm.create_process(&vfs, "/bin/shell", "").unwrap();
        child.start();

        let waiter = parent.main_thread();
        assert!(matches!(
            child.wait_for_status_change(&waiter),
            WaitOutcome::Parked
        ));
        assert_eq!(waiter.state(), ThreadState::Blocked);

        child.stop(42);
        assert_eq!(waiter.state(), ThreadState::Running);
        let result = waiter.take_pending_result().unwrap();
        assert_eq!(result.data, ProcessState::Stopped.as_u64());
        assert_eq!(child.exit_code(), 42);
    }

    #[test]
    fn wait_on_created_process_observes_start() {
        let vfs = test_vfs();
        let pm = ProcessManager::new();
        let parent = pm.create_process(&vfs, "/bin/shell", "").unwrap();
        parent.start();
        let child = pm.create_process(&vfs, "/bin/shell", "").unwrap();

        let waiter = parent.main_thread();
        assert!(matches!(
            child.wait_for_status_change(&waiter),
            WaitOutcome::Parked
        ));

        child.start();
        assert_eq!(waiter.state(), ThreadState::Running);
        let result = waiter.take_pending_result().unwrap();
        assert_eq!(result.data, ProcessState::Running.as_u64());
    }

    #[test]
    fn wait_on_stopped_process_is_immediate() {
        let vfs = test_vfs();
        let pm = ProcessManager::new();
        let parent = pm.create_process(&vfs, "/bin/shell", "").unwrap();
        parent.start();
        let child = pm.create_process(&vfs, "/bin/shell", "").unwrap();
        child.start();
        child.stop(7);

        match child.wait_for_status_change(&parent.main_thread()) {
            WaitOutcome::Ready(r) => assert_eq!(r.data, ProcessState::Stopped.as_u64()),
            WaitOutcome::Parked => panic!("expected immediate result"),
        }
        assert_eq!(parent.main_thread().state(), ThreadState::Running);
    }

    #[test]
    fn join_follows_the_same_protocol() {
        let vfs = test_vfs();
        let pm = ProcessManager::new();
        let p = pm.create_process(&vfs, "/bin/shell", "").unwrap();
        p.start();
        let worker = pm.create_thread(&p, 0x3000, 0).unwrap();
        worker.start();

        let joiner = p.main_thread();
        assert!(matches!(worker.join(&joiner), WaitOutcome::Parked));
        assert_eq!(joiner.state(), ThreadState::Blocked);

        worker.stop(SyscallResult::ok(0));
        assert_eq!(joiner.state(), ThreadState::Running);
        assert!(joiner.take_pending_result().is_some());

        // Joining a stopped thread returns straight away.
        assert!(matches!(worker.join(&joiner), WaitOutcome::Ready(_)));
    }

    #[test]
    fn mutual_join_parks_both_without_hanging() {
        let vfs = test_vfs();
        let pm = ProcessManager::new();
        let p = pm.create_process(&vfs, "/bin/shell", "").unwrap();
        p.start();

        // Two threads joining each other concurrently must both park;
        // the joins themselves have to return.
        for _ in 0..64 {
            let a = pm.create_thread(&p, 0x1000, 0).unwrap();
            let b = pm.create_thread(&p, 0x2000, 0).unwrap();
            a.start();
            b.start();

            let (a1, b1) = (a.clone(), b.clone());
            let h1 = std::thread::spawn(move || b1.join(&a1));
            let (a2, b2) = (a.clone(), b.clone());
            let h2 = std::thread::spawn(move || a2.join(&b2));

            assert!(matches!(h1.join().unwrap(), WaitOutcome::Parked));
            assert!(matches!(h2.join().unwrap(), WaitOutcome::Parked));
            assert_eq!(a.state(), ThreadState::Blocked);
            assert_eq!(b.state(), ThreadState::Blocked);

            a.stop(SyscallResult::ok(0));
            b.stop(SyscallResult::ok(0));
        }
    }

    #[test]
    fn join_on_self_yields_an_error() {
        let vfs = test_vfs();
        let pm = ProcessManager::new();
        let p = pm.create_process(&vfs, "/bin/shell", "").unwrap();
        p.start();
        let main = p.main_thread();
        match main.join(&main) {
            WaitOutcome::Ready(r) => {
                assert_eq!(r, SyscallResult::from(KernelError::InvalidArgument))
            }
            WaitOutcome::Parked => panic!("self join must not park"),
        }
        assert_eq!(main.state(), ThreadState::Running);
    }

    #[test]
    fn reap_only_accepts_stopped_processes() {
        let vfs = test_vfs();
        let pm = ProcessManager::new();
        let p = pm.create_process(&vfs, "/bin/shell", "").unwrap();
        let pid = p.id();
        p.start();

        assert!(matches!(pm.reap(pid), Err(KernelError::InvalidArgument)));
        p.stop(0);
        assert!(pm.reap(pid).is_ok());
        assert!(pm.get(pid).is_none());
        assert!(matches!(pm.reap(pid), Err(KernelError::NotFound)));
    }

    #[test]
    fn thread_owner_is_weak() {
        let vfs = test_vfs();
        let pm = ProcessManager::new();
        let p = pm.create_process(&vfs, "/bin/shell", "").unwrap();
        let pid = p.id();
        let main = p.main_thread();
        assert!(main.owner().is_some());

        p.start();
        p.stop(0);
        pm.reap(pid).unwrap();
        drop(p);
        assert!(main.owner().is_none());
    }
}
