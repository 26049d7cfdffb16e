//! Syscall Interface
//!
//! The boundary where untrusted input crosses into the kernel. Everything
//! a user program hands over (the stack pointer, the syscall number, each
//! argument word, every string and buffer) is validated here before it is
//! used.
//!
//! # Layout
//! - [`validate`]: user-memory checks and copies, the only path from a
//!   user address to kernel-visible bytes
//! - [`frame`]: the trap frame and the validating argument cursor
//! - [`handler`]: the dispatcher and the per-syscall handlers

mod frame;
mod handler;
mod validate;

pub use frame::{ArgCursor, TrapFrame};
pub use handler::{numbers, Control, Syscalls};
pub use validate::{
    check_addr, check_buffer, copy_from_user, copy_to_user, read_byte, read_string, read_word,
    write_byte, Access, AddressSpace, Fault,
};
