//! Per-Process File-Descriptor Table
//!
//! Maps the small integers a user program names its open files with onto
//! the opaque handles the filesystem issued for them.
//!
//! # Design
//! - Fixed-size array of optional handles, indexed by descriptor
//! - Descriptors 0 and 1 are reserved for the console and never hold a
//!   handle
//! - `insert` always picks the lowest free dynamic slot, so descriptor
//!   numbers are deterministic and reusable immediately after a close
//! - Raw descriptors from user space are range-checked here, nowhere else

use crate::fs::{FileHandle, FileSystem};

/// Reserved descriptor for console input.
pub const STDIN_FD: i32 = 0;
/// Reserved descriptor for console output.
pub const STDOUT_FD: i32 = 1;

/// Number of reserved console descriptors.
pub const RESERVED_SLOTS: usize = 2;
/// Number of files a process may hold open at once.
pub const MAX_OPEN_FILES: usize = 16;

const TABLE_SIZE: usize = RESERVED_SLOTS + MAX_OPEN_FILES;

/// The descriptor table of one process.
///
/// Owned by the process and touched only from its own thread, so it needs
/// no internal locking. Slot mutations would have to move under a lock if
/// processes ever grew a second thread.
#[derive(Debug)]
pub struct FdTable {
    slots: [Option<FileHandle>; TABLE_SIZE],
}

impl FdTable {
    /// Create an empty table.
    pub const fn new() -> Self {
        const EMPTY: Option<FileHandle> = None;
        Self {
            slots: [EMPTY; TABLE_SIZE],
        }
    }

    /// Map a raw descriptor to a dynamic slot index.
    ///
    /// Reserved and out-of-range descriptors (including negative ones)
    /// address nothing.
    fn index(fd: i32) -> Option<usize> {
        if fd < RESERVED_SLOTS as i32 || fd >= TABLE_SIZE as i32 {
            None
        } else {
            Some(fd as usize)
        }
    }

    /// Place a handle in the lowest free dynamic slot.
    ///
    /// Returns the descriptor, or gives the handle back when the table is
    /// full so the caller can release it; a handle is never dropped
    /// without the filesystem hearing about it.
    pub fn insert(&mut self, handle: FileHandle) -> Result<i32, FileHandle> {
        for fd in RESERVED_SLOTS..TABLE_SIZE {
            if self.slots[fd].is_none() {
                self.slots[fd] = Some(handle);
                return Ok(fd as i32);
            }
        }
        Err(handle)
    }

    /// Look up the handle a descriptor refers to.
    pub fn get(&self, fd: i32) -> Option<&FileHandle> {
        self.slots[Self::index(fd)?].as_ref()
    }

    /// Take the handle out of a slot, leaving it empty.
    pub fn remove(&mut self, fd: i32) -> Option<FileHandle> {
        self.slots[Self::index(fd)?].take()
    }

    /// Close every still-open handle and empty the table.
    ///
    /// Invoked once, at process exit; no handle may outlive its owning
    /// process.
    pub fn close_all(&mut self, fs: &mut dyn FileSystem) {
        for slot in self.slots.iter_mut() {
            if let Some(handle) = slot.take() {
                fs.close(handle);
            }
        }
    }

    /// Number of occupied slots.
    pub fn open_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

impl Default for FdTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    /// Filesystem stub that only records which handles were closed.
    #[derive(Default)]
    struct CloseLog {
        closed: Vec<u32>,
    }

    impl FileSystem for CloseLog {
        fn create(&mut self, _name: &str, _initial_size: usize) -> bool {
            false
        }
        fn open(&mut self, _name: &str) -> Option<FileHandle> {
            None
        }
        fn close(&mut self, handle: FileHandle) {
            self.closed.push(handle.raw());
        }
        fn read(&mut self, _handle: &FileHandle, _buf: &mut [u8]) -> usize {
            0
        }
        fn write(&mut self, _handle: &FileHandle, _buf: &[u8]) -> usize {
            0
        }
        fn seek(&mut self, _handle: &FileHandle, _position: usize) {}
        fn tell(&self, _handle: &FileHandle) -> usize {
            0
        }
        fn length(&self, _handle: &FileHandle) -> usize {
            0
        }
        fn remove(&mut self, _name: &str) -> bool {
            false
        }
    }

    #[test]
    fn test_insert_skips_reserved_slots() {
        let mut table = FdTable::new();
        assert_eq!(table.insert(FileHandle::new(10)), Ok(2));
        assert_eq!(table.insert(FileHandle::new(11)), Ok(3));
    }

    #[test]
    fn test_lowest_slot_reused_after_close() {
        let mut table = FdTable::new();
        let first = table.insert(FileHandle::new(10)).unwrap();
        table.insert(FileHandle::new(11)).unwrap();
        table.remove(first);
        assert_eq!(table.insert(FileHandle::new(12)), Ok(first));
    }

    #[test]
    fn test_full_table_returns_handle() {
        let mut table = FdTable::new();
        for i in 0..MAX_OPEN_FILES as u32 {
            table.insert(FileHandle::new(i)).unwrap();
        }
        let back = table.insert(FileHandle::new(99)).unwrap_err();
        assert_eq!(back.raw(), 99);
    }

    #[test]
    fn test_reserved_and_out_of_range_descriptors() {
        let mut table = FdTable::new();
        table.insert(FileHandle::new(10)).unwrap();
        assert!(table.get(STDIN_FD).is_none());
        assert!(table.get(STDOUT_FD).is_none());
        assert!(table.get(-3).is_none());
        assert!(table.get(TABLE_SIZE as i32).is_none());
        assert!(table.remove(STDOUT_FD).is_none());
    }

    #[test]
    fn test_remove_twice_is_empty() {
        let mut table = FdTable::new();
        let fd = table.insert(FileHandle::new(10)).unwrap();
        assert!(table.remove(fd).is_some());
        assert!(table.remove(fd).is_none());
    }

    #[test]
    fn test_close_all_releases_everything() {
        let mut table = FdTable::new();
        for i in 0..3 {
            table.insert(FileHandle::new(i)).unwrap();
        }
        let mut fs = CloseLog::default();
        table.close_all(&mut fs);
        assert_eq!(fs.closed, [0, 1, 2]);
        assert_eq!(table.open_count(), 0);
    }
}
