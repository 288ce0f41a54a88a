//! Core kernel types.

/// Process identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessId(pub u64);

/// Thread identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(pub u64);

/// Opaque per-process object handle.
///
/// Handles are unforgeable names for kernel objects, valid only inside
/// the table that allocated them; a numerically equal id in another
/// process names nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandleId(pub u64);

/// Process lifecycle state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessState {
    /// Constructed but not yet runnable
    Created,
    /// Enqueued with the scheduler
    Running,
    /// Terminated; awaiting reap
    Stopped,
}

impl ProcessState {
    /// Stable encoding reported to user mode by the wait syscall.
    pub const fn as_u64(self) -> u64 {
        match self {
            ProcessState::Created => 0,
            ProcessState::Running => 1,
            ProcessState::Stopped => 2,
        }
    }
}

/// Thread lifecycle state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThreadState {
    /// Constructed but not yet runnable
    Created,
    /// Runnable or on-CPU
    Running,
    /// Parked on a wait, join, or sleep
    Blocked,
    /// Terminated
    Stopped,
}
