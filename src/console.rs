//! Console Device Interface
//!
//! Keyboard input and display output are external drivers; the boundary
//! layer reaches them through this pair of operations. Reads block until a
//! byte is available, so a console read always delivers exactly the number
//! of bytes asked for.

/// Largest number of bytes a single `write` syscall delivers to the
/// console. Larger requests are silently truncated to this cap; the
/// syscall reports the capped count. Part of the binding ABI.
pub const CONSOLE_WRITE_MAX: usize = 300;

/// Operations the boundary layer requires from the console device.
pub trait Console {
    /// Read one byte of input, blocking until a byte is available.
    fn read_byte(&mut self) -> u8;

    /// Write bytes to the display.
    fn write_bytes(&mut self, bytes: &[u8]);
}
