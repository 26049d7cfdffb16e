//! Process Identity & Lifecycle
//!
//! The per-process record the boundary layer owns (identity plus the
//! descriptor table), the process-control capability it consumes, and the
//! parent/child lifecycle arena.
//!
//! Scheduling, address-space teardown, and program loading live elsewhere;
//! this layer reaches them only through [`ProcessControl`].

mod lifecycle;

pub use lifecycle::{LinkState, LinkTable};

use core::fmt;

use alloc::string::String;

use crate::fd::FdTable;

/// Unique identifier assigned to a process at creation.
///
/// Matches the thread identifier of the underlying execution substrate,
/// and travels across the syscall ABI as a plain word.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ProcessId(i32);

impl ProcessId {
    /// Create an identifier from its raw ABI value.
    #[inline]
    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }

    /// Get the raw ABI value.
    #[inline]
    pub const fn as_raw(self) -> i32 {
        self.0
    }
}

impl fmt::Debug for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProcessId({})", self.0)
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Process-control operations the boundary layer consumes.
///
/// Implemented by the scheduler/loader side of the kernel.
pub trait ProcessControl {
    /// Create a new process executing `cmd_line`.
    ///
    /// Returns the new process's identifier, or `None` if a process could
    /// not be created at all. The new process must not begin loading until
    /// the caller next yields: the caller registers the lifecycle record
    /// for the child between `spawn` returning and its first yield.
    fn spawn(&mut self, cmd_line: &str) -> Option<ProcessId>;

    /// Give up the processor so another process can run.
    fn yield_now(&mut self);

    /// Tear down the calling process: destroy its address space, reclaim
    /// its memory, release its execution context. The caller has already
    /// finished every piece of boundary-layer bookkeeping.
    fn terminate_current(&mut self);

    /// Power the whole machine off.
    fn power_off(&mut self);
}

/// The boundary layer's record of one live process.
#[derive(Debug)]
pub struct Process {
    pid: ProcessId,
    name: String,
    /// Open-file table; dropped in full when the process exits.
    pub files: FdTable,
}

impl Process {
    /// Create the record for a process, named for the termination notice.
    pub fn new(pid: ProcessId, name: &str) -> Self {
        Self {
            pid,
            name: String::from(name),
            files: FdTable::new(),
        }
    }

    /// The process's identifier.
    #[inline]
    pub fn pid(&self) -> ProcessId {
        self.pid
    }

    /// The process's name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pid_round_trip() {
        let pid = ProcessId::new(7);
        assert_eq!(pid.as_raw(), 7);
        assert_eq!(pid, ProcessId::new(7));
    }

    #[test]
    fn test_new_process_has_empty_table() {
        let proc = Process::new(ProcessId::new(1), "init");
        assert_eq!(proc.name(), "init");
        assert_eq!(proc.files.open_count(), 0);
    }
}
