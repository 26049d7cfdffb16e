//! User-Memory Validation
//!
//! Every address, string, and buffer a user program hands to a syscall is
//! checked here before the kernel touches a single byte of it.
//!
//! # Security Principles
//! - Validate ALL inputs before use
//! - A byte is checked against its own address: a large count never gets
//!   to define a short, safely-mapped range
//! - Strings are walked one byte at a time up to and including the
//!   terminator, so an unmapped page is detected before it is crossed
//! - Validation has no side effects; the dispatcher decides what a fault
//!   means for the calling process

use core::fmt;
use core::ptr::NonNull;

use alloc::string::String;
use alloc::vec::Vec;

use bitflags::bitflags;

use crate::mm::{UserAddr, WORD_SIZE};

bitflags! {
    /// Access intent declared when asking the page table for a translation.
    ///
    /// A buffer the kernel fills (syscall `read`) needs `WRITE`; a buffer
    /// the kernel consumes (syscall `write`) needs `READ`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Access: u8 {
        /// The kernel will read the byte.
        const READ = 1 << 0;
        /// The kernel will write the byte.
        const WRITE = 1 << 1;
    }
}

/// A fatal user-memory fault.
///
/// Carried back to the dispatcher as an error value rather than acted on
/// here; supplying a bad pointer is a fatal program error, and the
/// dispatcher terminates the offending process with status -1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The address is at or above the kernel/user split.
    KernelSpace(UserAddr),
    /// The address is in user space but not mapped.
    Unmapped(UserAddr),
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KernelSpace(addr) => write!(f, "address {addr} is not in user space"),
            Self::Unmapped(addr) => write!(f, "address {addr} is not mapped"),
        }
    }
}

/// The memory-translation capability of the current process.
///
/// Implemented by the virtual-memory subsystem. `translate` is a read-only
/// page-table lookup; it must return a kernel pointer valid for at least
/// one byte of the requested access, or `None` when the page is unmapped
/// or lacks the requested permission.
pub trait AddressSpace {
    /// Translate one user virtual address to a kernel-accessible location.
    fn translate(&self, addr: UserAddr, access: Access) -> Option<NonNull<u8>>;
}

/// Check the split, then ask the page table. The only path from a user
/// address to a dereferenceable pointer.
fn byte_ptr(mem: &dyn AddressSpace, addr: UserAddr, access: Access) -> Result<NonNull<u8>, Fault> {
    if !addr.is_user() {
        return Err(Fault::KernelSpace(addr));
    }
    mem.translate(addr, access).ok_or(Fault::Unmapped(addr))
}

/// Check that a single byte is readable, without reading it.
pub fn check_addr(mem: &dyn AddressSpace, addr: UserAddr) -> Result<(), Fault> {
    byte_ptr(mem, addr, Access::READ).map(|_| ())
}

/// Read one byte of user memory.
pub fn read_byte(mem: &dyn AddressSpace, addr: UserAddr) -> Result<u8, Fault> {
    let ptr = byte_ptr(mem, addr, Access::READ)?;
    // SAFETY: translate() returned a live kernel mapping for this byte.
    Ok(unsafe { ptr.as_ptr().read() })
}

/// Write one byte of user memory.
pub fn write_byte(mem: &dyn AddressSpace, addr: UserAddr, value: u8) -> Result<(), Fault> {
    let ptr = byte_ptr(mem, addr, Access::WRITE)?;
    // SAFETY: translate() returned a live, writable kernel mapping.
    unsafe { ptr.as_ptr().write(value) };
    Ok(())
}

/// Read one little-endian ABI word.
///
/// Each of the word's bytes is validated individually, so a word that
/// straddles an unmapped page faults instead of reading past it.
pub fn read_word(mem: &dyn AddressSpace, addr: UserAddr) -> Result<i32, Fault> {
    let mut bytes = [0u8; WORD_SIZE];
    for (i, byte) in bytes.iter_mut().enumerate() {
        *byte = read_byte(mem, addr.add(i))?;
    }
    Ok(i32::from_le_bytes(bytes))
}

/// Read a NUL-terminated string out of user memory.
///
/// Walks one byte at a time from `start`, validating every address up to
/// and including the terminator. The walk never assumes the string is
/// entirely mapped; it is bounded by the first fault or the kernel/user
/// split, whichever comes first.
pub fn read_string(mem: &dyn AddressSpace, start: UserAddr) -> Result<String, Fault> {
    let mut bytes = Vec::new();
    let mut addr = start;
    loop {
        let byte = read_byte(mem, addr)?;
        if byte == 0 {
            break;
        }
        bytes.push(byte);
        addr = addr.add(1);
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Check a whole user buffer for the given access, one byte per address.
///
/// Zero-length buffers are valid at any address.
pub fn check_buffer(
    mem: &dyn AddressSpace,
    start: UserAddr,
    len: usize,
    access: Access,
) -> Result<(), Fault> {
    for i in 0..len {
        byte_ptr(mem, start.add(i), access)?;
    }
    Ok(())
}

/// Copy `len` bytes out of user memory into a kernel buffer.
pub fn copy_from_user(
    mem: &dyn AddressSpace,
    start: UserAddr,
    len: usize,
) -> Result<Vec<u8>, Fault> {
    let mut bytes = Vec::with_capacity(len);
    for i in 0..len {
        bytes.push(read_byte(mem, start.add(i))?);
    }
    Ok(bytes)
}

/// Copy a kernel buffer into user memory.
pub fn copy_to_user(mem: &dyn AddressSpace, start: UserAddr, bytes: &[u8]) -> Result<(), Fault> {
    for (i, &byte) in bytes.iter().enumerate() {
        write_byte(mem, start.add(i), byte)?;
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::testmem::TestSpace;
    use super::*;
    use crate::mm::KERNEL_BASE;

    const BASE: usize = 0x1000_0000;

    #[test]
    fn test_kernel_space_rejected() {
        let mem = TestSpace::new(BASE, 0x100);
        let addr = UserAddr::new(KERNEL_BASE);
        assert_eq!(check_addr(&mem, addr), Err(Fault::KernelSpace(addr)));
    }

    #[test]
    fn test_unmapped_rejected() {
        let mem = TestSpace::new(BASE, 0x100);
        let addr = UserAddr::new(BASE + 0x100);
        assert_eq!(check_addr(&mem, addr), Err(Fault::Unmapped(addr)));
    }

    #[test]
    fn test_word_assembly() {
        let mut mem = TestSpace::new(BASE, 0x100);
        mem.poke_words(BASE, &[-7]);
        assert_eq!(read_word(&mem, UserAddr::new(BASE)), Ok(-7));
    }

    #[test]
    fn test_word_straddling_hole_faults() {
        let mut mem = TestSpace::new(BASE, 0x100);
        mem.poke_words(BASE + 0x10, &[42]);
        mem.unmap(BASE + 0x12, 2);
        let result = read_word(&mem, UserAddr::new(BASE + 0x10));
        assert_eq!(result, Err(Fault::Unmapped(UserAddr::new(BASE + 0x12))));
    }

    #[test]
    fn test_string_walk() {
        let mut mem = TestSpace::new(BASE, 0x100);
        mem.poke(BASE + 4, b"hello\0");
        let s = read_string(&mem, UserAddr::new(BASE + 4)).unwrap();
        assert_eq!(s, "hello");
    }

    #[test]
    fn test_string_missing_terminator_faults() {
        // The string runs off the end of the mapped region before a NUL
        // shows up; the walk must fault at the first unmapped byte.
        let mut mem = TestSpace::new(BASE, 8);
        mem.poke(BASE, b"abcdefgh");
        let result = read_string(&mem, UserAddr::new(BASE));
        assert_eq!(result, Err(Fault::Unmapped(UserAddr::new(BASE + 8))));
    }

    #[test]
    fn test_buffer_checks_every_byte() {
        let mut mem = TestSpace::new(BASE, 0x100);
        mem.unmap(BASE + 0x50, 1);
        assert!(check_buffer(&mem, UserAddr::new(BASE), 0x50, Access::READ).is_ok());
        assert_eq!(
            check_buffer(&mem, UserAddr::new(BASE), 0x51, Access::READ),
            Err(Fault::Unmapped(UserAddr::new(BASE + 0x50)))
        );
    }

    #[test]
    fn test_zero_length_buffer() {
        // Valid at any address, even an unmapped or kernel one.
        let mem = TestSpace::new(BASE, 0x100);
        assert!(check_buffer(&mem, UserAddr::new(KERNEL_BASE), 0, Access::READ).is_ok());
    }

    #[test]
    fn test_copy_round_trip() {
        let mut mem = TestSpace::new(BASE, 0x100);
        copy_to_user(&mem, UserAddr::new(BASE + 8), b"payload").unwrap();
        let back = copy_from_user(&mem, UserAddr::new(BASE + 8), 7).unwrap();
        assert_eq!(back, b"payload");
        assert_eq!(mem.peek(BASE + 8, 7), b"payload");
    }
}
