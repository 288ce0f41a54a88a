//! The kernel context object.
//!
//! All kernel state hangs off one [`Kernel`] value; there are no
//! global singletons. Tests build as many independent kernels as they
//! like, each with its own HAL, filesystem, and process registry.

use alloc::format;
use alloc::sync::Arc;
use alloc::vec::Vec;
use spin::Mutex;

use sol_hal::Hal;
use sol_vfs::Vfs;

use crate::error::KernelError;
use crate::process::{Process, ProcessManager, Thread};
use crate::syscall::SyscallResult;

struct Sleeper {
    deadline_millis: u64,
    thread: Arc<Thread>,
}

/// Threads parked in `sleep`, woken by timer advance.
struct SleepQueue {
    sleepers: Mutex<Vec<Sleeper>>,
}

impl SleepQueue {
    fn new() -> Self {
        Self {
            sleepers: Mutex::new(Vec::new()),
        }
    }

    fn park(&self, thread: &Arc<Thread>, deadline_millis: u64) {
        let mut sleepers = self.sleepers.lock();
        sleepers.push(Sleeper {
            deadline_millis,
            thread: thread.clone(),
        });
        thread.block();
    }

    /// Wake every sleeper whose deadline has passed. Returns the wake
    /// count.
    fn expire(&self, now_millis: u64) -> usize {
        let due: Vec<Sleeper> = {
            let mut sleepers = self.sleepers.lock();
            let mut due = Vec::new();
            let mut i = 0;
            while i < sleepers.len() {
                if sleepers[i].deadline_millis <= now_millis {
                    due.push(sleepers.swap_remove(i));
                } else {
                    i += 1;
                }
            }
            due
        };
        let count = due.len();
        for s in due {
            s.thread.unblock_with(SyscallResult::ok(0));
        }
        count
    }

    fn len(&self) -> usize {
        self.sleepers.lock().len()
    }
}

/// Root of all kernel state.
pub struct Kernel<H: Hal> {
    hal: H,
    vfs: Vfs,
    processes: ProcessManager,
    sleepers: SleepQueue,
    boot_time_nanos: u64,
}

impl<H: Hal> Kernel<H> {
    pub fn new(hal: H, vfs: Vfs) -> Self {
        let boot_time_nanos = hal.now_nanos();
        Self {
            hal,
            vfs,
            processes: ProcessManager::new(),
            sleepers: SleepQueue::new(),
            boot_time_nanos,
        }
    }

    pub fn hal(&self) -> &H {
        &self.hal
    }

    pub fn vfs(&self) -> &Vfs {
        &self.vfs
    }

    pub fn processes(&self) -> &ProcessManager {
        &self.processes
    }

    pub fn uptime_nanos(&self) -> u64 {
        self.hal.now_nanos().saturating_sub(self.boot_time_nanos)
    }

    /// Create and start a process outside syscall context. Used to
    /// bring up the initial process at boot.
    pub fn launch(&self, path: &str, args: &str) -> Result<Arc<Process>, KernelError> {
        let process = self.processes.create_process(&self.vfs, path, args)?;
        self.hal.debug_write(&format!(
            "[kernel] launching {} (pid {})",
            path,
            process.id().0
        ));
        process.start();
        Ok(process)
    }

    /// Park `thread` until `millis` milliseconds from now.
    pub(crate) fn sleep_thread(&self, thread: &Arc<Thread>, millis: u64) {
        let deadline = self.hal.now_millis().saturating_add(millis);
        self.sleepers.park(thread, deadline);
    }

    /// Timer tick: wake sleepers whose deadline has passed.
    pub fn expire_sleepers(&self) -> usize {
        self.sleepers.expire(self.hal.now_millis())
    }

    pub fn pending_sleepers(&self) -> usize {
        self.sleepers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ProcessState, ThreadState};
    use sol_hal::NullHal;
    use sol_vfs::MemoryFs;

    fn boot() -> Kernel<NullHal> {
        let fs = MemoryFs::new();
        fs.mkdir("/bin").unwrap();
        fs.write_file("/bin/init", b"\x7fELF").unwrap();
        Kernel::new(NullHal::new(), Vfs::new(fs.root()))
    }

    #[test]
    fn launch_starts_the_process() {
        let kernel = boot();
        let init = kernel.launch("/bin/init", "").unwrap();
        assert_eq!(init.state(), ProcessState::Running);
        assert_eq!(init.main_thread().state(), ThreadState::Running);
        assert!(matches!(
            kernel.launch("/bin/missing", ""),
            Err(KernelError::NotFound)
        ));
    }

    #[test]
    fn uptime_follows_the_clock() {
        let kernel = boot();
        assert_eq!(kernel.uptime_nanos(), 0);
        kernel.hal().advance(5_000_000);
        assert_eq!(kernel.uptime_nanos(), 5_000_000);
    }

    #[test]
    fn sleepers_wake_only_at_their_deadline() {
        let kernel = boot();
        let init = kernel.launch("/bin/init", "").unwrap();
        let thread = init.main_thread();

        kernel.sleep_thread(&thread, 10);
        assert_eq!(thread.state(), ThreadState::Blocked);
        assert_eq!(kernel.pending_sleepers(), 1);

        // 5ms in: not yet due.
        kernel.hal().advance(5_000_000);
        assert_eq!(kernel.expire_sleepers(), 0);
        assert_eq!(thread.state(), ThreadState::Blocked);

        kernel.hal().advance(5_000_000);
        assert_eq!(kernel.expire_sleepers(), 1);
        assert_eq!(thread.state(), ThreadState::Running);
        assert_eq!(kernel.pending_sleepers(), 0);
        assert!(thread.take_pending_result().is_some());
    }
}
