//! Memory types for the user/kernel boundary
//!
//! Provides the user-address newtype and the ABI constants shared by the
//! validation layer and the dispatcher. The page table itself lives in the
//! memory-management subsystem and is reached only through the
//! [`AddressSpace`](crate::syscall::AddressSpace) translation capability.

mod addr;

pub use addr::{UserAddr, KERNEL_BASE, WORD_SIZE};
