//! User Virtual Address Type
//!
//! Type-safe wrapper for addresses supplied by user programs. A `UserAddr`
//! is never dereferenced directly: it must be handed to the validation
//! layer, which checks the kernel/user split and asks the page table for a
//! translation first.
//!
//! # Security Properties
//! - User addresses cannot be turned into pointers without translation
//! - The kernel/user split check is a type-level operation, not a call-site
//!   convention

use core::fmt;

/// Base of kernel space. Every valid user address is strictly below this.
pub const KERNEL_BASE: usize = 0xC000_0000;

/// Width in bytes of one syscall ABI word (number, arguments, return value).
pub const WORD_SIZE: usize = 4;

/// An address in a user process's virtual address space.
///
/// This is a newtype wrapper that prevents accidental mixing of user
/// addresses with kernel pointers. User addresses are untrusted input and
/// carry no validity guarantee of any kind.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct UserAddr(usize);

impl UserAddr {
    /// Create a new user address. Any value is representable; validity is
    /// decided later, at translation time.
    #[inline]
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    /// Create a user address from a 32-bit ABI word (zero-extended).
    ///
    /// Pointer arguments arrive on the user stack as words; a "negative"
    /// word is simply a high user address, never a sign-extended one.
    #[inline]
    pub const fn from_word(word: i32) -> Self {
        Self(word as u32 as usize)
    }

    /// Get the raw address value.
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0
    }

    /// Check if the address is below the kernel/user split.
    #[inline]
    pub const fn is_user(self) -> bool {
        self.0 < KERNEL_BASE
    }

    /// Add a byte offset to this address.
    #[inline]
    pub const fn add(self, offset: usize) -> Self {
        Self(self.0.wrapping_add(offset))
    }
}

impl fmt::Debug for UserAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserAddr({:#010x})", self.0)
    }
}

impl fmt::Display for UserAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_boundary() {
        assert!(UserAddr::new(0).is_user());
        assert!(UserAddr::new(KERNEL_BASE - 1).is_user());
        assert!(!UserAddr::new(KERNEL_BASE).is_user());
        assert!(!UserAddr::new(usize::MAX).is_user());
    }

    #[test]
    fn test_word_zero_extension() {
        // -1 as an ABI word is the high user address 0xFFFF_FFFF,
        // not a sign-extended 64-bit value.
        let addr = UserAddr::from_word(-1);
        assert_eq!(addr.as_usize(), 0xFFFF_FFFF);
        assert!(!addr.is_user());
    }

    #[test]
    fn test_offset() {
        let addr = UserAddr::new(0x1000);
        assert_eq!(addr.add(WORD_SIZE).as_usize(), 0x1004);
    }
}
