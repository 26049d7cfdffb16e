//! Syscall Dispatcher
//!
//! Decodes the trap a user process took, validates every argument before
//! touching it, and routes to the handler for the requested service.
//!
//! # Security Considerations
//! - The user stack pointer itself is validated before the syscall number
//!   is read from it
//! - Arguments are validated one word at a time, in order; a bad word
//!   terminates the process before any handler runs
//! - Descriptor-table and lifecycle failures are syscall-local and come
//!   back as sentinel values, never as process termination

use alloc::format;
use alloc::vec;

use crate::console::{Console, CONSOLE_WRITE_MAX};
use crate::fd::{STDIN_FD, STDOUT_FD};
use crate::fs::FileSystem;
use crate::process::{LinkTable, Process, ProcessControl, ProcessId};

use super::frame::{ArgCursor, TrapFrame};
use super::validate::{
    check_buffer, copy_from_user, copy_to_user, read_string, write_byte, Access, AddressSpace,
    Fault,
};

/// Syscall numbers. Part of the binding ABI; the number occupies the word
/// at the user stack pointer, arguments follow it.
pub mod numbers {
    pub const SYS_HALT: i32 = 0;
    pub const SYS_EXIT: i32 = 1;
    pub const SYS_EXEC: i32 = 2;
    pub const SYS_WAIT: i32 = 3;
    pub const SYS_CREATE: i32 = 4;
    pub const SYS_REMOVE: i32 = 5;
    pub const SYS_OPEN: i32 = 6;
    pub const SYS_FILESIZE: i32 = 7;
    pub const SYS_READ: i32 = 8;
    pub const SYS_WRITE: i32 = 9;
    pub const SYS_SEEK: i32 = 10;
    pub const SYS_TELL: i32 = 11;
    pub const SYS_CLOSE: i32 = 12;
}

/// What became of the calling process.
///
/// Returned to the trap glue so it knows whether to restore the frame and
/// resume, or to schedule away from a process that no longer exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Resume the caller; the frame's return slot holds any result.
    Resume,
    /// The caller was terminated with this status.
    Exited(i32),
    /// The machine is powering off.
    PowerOff,
}

/// The syscall layer of the calling process.
///
/// Bundles the process's own record with the collaborator capabilities a
/// handler may consult. Built by the trap glue for the duration of one
/// trap; interrupts are re-enabled by then, so handlers are free to block.
pub struct Syscalls<'a> {
    /// Translation capability for the caller's address space.
    pub mem: &'a dyn AddressSpace,
    /// The filesystem collaborator.
    pub fs: &'a mut dyn FileSystem,
    /// The console device.
    pub console: &'a mut dyn Console,
    /// Scheduler/loader capabilities.
    pub control: &'a mut dyn ProcessControl,
    /// Kernel-wide parent/child lifecycle arena.
    pub links: &'a LinkTable,
    /// The calling process.
    pub process: &'a mut Process,
}

impl Syscalls<'_> {
    /// Handle one syscall trap.
    ///
    /// Reads the number and arguments from the user stack, each word
    /// validated before use, and writes the result into the frame's
    /// return slot. Any invalid user memory encountered anywhere in the
    /// walk terminates the caller with status -1 before the handler has a
    /// chance to act.
    pub fn dispatch(&mut self, frame: &mut TrapFrame) -> Control {
        let mut args = ArgCursor::new(self.mem, frame.sp);
        let number = match args.next_word() {
            Ok(number) => number,
            Err(fault) => return self.fault(fault),
        };
        log::trace!("syscall {} from {}", number, self.process.name());

        let outcome = match number {
            numbers::SYS_HALT => return self.sys_halt(),
            numbers::SYS_EXIT => {
                // Any status is acceptable and passed through verbatim.
                return match args.next_word() {
                    Ok(status) => self.exit(status),
                    Err(fault) => self.fault(fault),
                };
            }
            numbers::SYS_EXEC => self.sys_exec(&mut args),
            numbers::SYS_WAIT => self.sys_wait(&mut args),
            numbers::SYS_CREATE => self.sys_create(&mut args),
            numbers::SYS_REMOVE => self.sys_remove(&mut args),
            numbers::SYS_OPEN => self.sys_open(&mut args),
            numbers::SYS_FILESIZE => self.sys_filesize(&mut args),
            numbers::SYS_READ => self.sys_read(&mut args),
            numbers::SYS_WRITE => self.sys_write(&mut args),
            numbers::SYS_SEEK => self.sys_seek(&mut args),
            numbers::SYS_TELL => self.sys_tell(&mut args),
            numbers::SYS_CLOSE => self.sys_close(&mut args),
            unknown => {
                log::warn!("unknown syscall {} from {}", unknown, self.process.name());
                Ok(None)
            }
        };

        match outcome {
            Ok(Some(value)) => {
                frame.ret = value;
                Control::Resume
            }
            Ok(None) => Control::Resume,
            Err(fault) => self.fault(fault),
        }
    }

    /// Terminate the calling process.
    ///
    /// The single termination path: reached from the `exit` syscall, from
    /// any user-memory fault, and by the kernel when a process returns
    /// from its entry point. Prints the termination notice, records the
    /// status and wakes a waiting parent in one transition, closes every
    /// open descriptor, abandons the records of the caller's own
    /// children, and hands the process to teardown.
    pub fn exit(&mut self, status: i32) -> Control {
        // Notice format relied on by the test harnesses.
        let notice = format!("{}: exit({})\n", self.process.name(), status);
        self.console.write_bytes(notice.as_bytes());

        self.links.record_exit(self.process.pid(), status);
        self.process.files.close_all(&mut *self.fs);
        self.links.detach(self.process.pid());

        log::debug!("{} terminated with status {}", self.process.name(), status);
        self.control.terminate_current();
        Control::Exited(status)
    }

    /// A fatal user-memory fault: terminate the caller with status -1.
    fn fault(&mut self, fault: Fault) -> Control {
        log::debug!("{}: {}", self.process.name(), fault);
        self.exit(-1)
    }

    fn sys_halt(&mut self) -> Control {
        log::debug!("halt requested by {}", self.process.name());
        self.control.power_off();
        Control::PowerOff
    }

    fn sys_exec(&mut self, args: &mut ArgCursor<'_>) -> Result<Option<i32>, Fault> {
        let cmd_line = read_string(self.mem, args.next_addr()?)?;
        let child = match self.control.spawn(&cmd_line) {
            Some(child) => child,
            None => {
                log::debug!("exec: no process slot for {:?}", cmd_line);
                return Ok(Some(-1));
            }
        };

        // The record must exist before the child first runs; spawn
        // guarantees the child does not load until we yield.
        let links = self.links;
        links.register(self.process.pid(), child);

        let control = &mut *self.control;
        if links.await_load(child, || control.yield_now()) {
            Ok(Some(child.as_raw()))
        } else {
            log::debug!("exec: child {} failed to load", child);
            Ok(Some(-1))
        }
    }

    fn sys_wait(&mut self, args: &mut ArgCursor<'_>) -> Result<Option<i32>, Fault> {
        let child = ProcessId::new(args.next_word()?);
        let links = self.links;
        let parent = self.process.pid();
        let control = &mut *self.control;
        Ok(Some(links.await_exit(parent, child, || control.yield_now())))
    }

    fn sys_create(&mut self, args: &mut ArgCursor<'_>) -> Result<Option<i32>, Fault> {
        let name = read_string(self.mem, args.next_addr()?)?;
        let initial_size = args.next_size()?;
        Ok(Some(self.fs.create(&name, initial_size) as i32))
    }

    fn sys_remove(&mut self, args: &mut ArgCursor<'_>) -> Result<Option<i32>, Fault> {
        let name = read_string(self.mem, args.next_addr()?)?;
        Ok(Some(self.fs.remove(&name) as i32))
    }

    fn sys_open(&mut self, args: &mut ArgCursor<'_>) -> Result<Option<i32>, Fault> {
        let name = read_string(self.mem, args.next_addr()?)?;
        let handle = match self.fs.open(&name) {
            Some(handle) => handle,
            None => return Ok(Some(-1)),
        };
        match self.process.files.insert(handle) {
            Ok(fd) => Ok(Some(fd)),
            Err(handle) => {
                // Full table: the fresh handle must not outlive the call.
                self.fs.close(handle);
                Ok(Some(-1))
            }
        }
    }

    fn sys_filesize(&mut self, args: &mut ArgCursor<'_>) -> Result<Option<i32>, Fault> {
        let fd = args.next_word()?;
        let result = match self.process.files.get(fd) {
            Some(handle) => self.fs.length(handle) as i32,
            None => -1,
        };
        Ok(Some(result))
    }

    fn sys_read(&mut self, args: &mut ArgCursor<'_>) -> Result<Option<i32>, Fault> {
        let fd = args.next_word()?;
        let buffer = args.next_addr()?;
        let size = args.next_size()?;
        check_buffer(self.mem, buffer, size, Access::WRITE)?;

        match fd {
            STDIN_FD => {
                // Console reads block per byte, so the count is exact.
                for i in 0..size {
                    let byte = self.console.read_byte();
                    write_byte(self.mem, buffer.add(i), byte)?;
                }
                Ok(Some(size as i32))
            }
            STDOUT_FD => Ok(Some(-1)),
            _ => match self.process.files.get(fd) {
                None => Ok(Some(-1)),
                Some(handle) => {
                    let mut data = vec![0u8; size];
                    let count = self.fs.read(handle, &mut data);
                    copy_to_user(self.mem, buffer, &data[..count])?;
                    Ok(Some(count as i32))
                }
            },
        }
    }

    fn sys_write(&mut self, args: &mut ArgCursor<'_>) -> Result<Option<i32>, Fault> {
        let fd = args.next_word()?;
        let buffer = args.next_addr()?;
        let size = args.next_size()?;
        check_buffer(self.mem, buffer, size, Access::READ)?;

        match fd {
            STDOUT_FD => {
                // One console write delivers at most CONSOLE_WRITE_MAX
                // bytes; the rest of a larger request is dropped and the
                // capped count reported.
                let capped = size.min(CONSOLE_WRITE_MAX);
                let data = copy_from_user(self.mem, buffer, capped)?;
                self.console.write_bytes(&data);
                Ok(Some(capped as i32))
            }
            STDIN_FD => Ok(Some(-1)),
            _ => match self.process.files.get(fd) {
                None => Ok(Some(-1)),
                Some(handle) => {
                    let data = copy_from_user(self.mem, buffer, size)?;
                    Ok(Some(self.fs.write(handle, &data) as i32))
                }
            },
        }
    }

    fn sys_seek(&mut self, args: &mut ArgCursor<'_>) -> Result<Option<i32>, Fault> {
        let fd = args.next_word()?;
        let position = args.next_size()?;
        if let Some(handle) = self.process.files.get(fd) {
            let length = self.fs.length(handle);
            // Positions are clamped to the last byte; an empty file
            // seeks to 0.
            let clamped = position.min(length.saturating_sub(1));
            self.fs.seek(handle, clamped);
        }
        Ok(None)
    }

    fn sys_tell(&mut self, args: &mut ArgCursor<'_>) -> Result<Option<i32>, Fault> {
        let fd = args.next_word()?;
        match self.process.files.get(fd) {
            Some(handle) => Ok(Some(self.fs.tell(handle) as i32)),
            // Best-effort: no defined return value for a bad descriptor.
            None => Ok(None),
        }
    }

    fn sys_close(&mut self, args: &mut ArgCursor<'_>) -> Result<Option<i32>, Fault> {
        let fd = args.next_word()?;
        if let Some(handle) = self.process.files.remove(fd) {
            self.fs.close(handle);
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syscall_numbers_are_stable() {
        // Binding ABI: user programs are compiled against these values.
        assert_eq!(numbers::SYS_HALT, 0);
        assert_eq!(numbers::SYS_EXIT, 1);
        assert_eq!(numbers::SYS_EXEC, 2);
        assert_eq!(numbers::SYS_WAIT, 3);
        assert_eq!(numbers::SYS_CREATE, 4);
        assert_eq!(numbers::SYS_REMOVE, 5);
        assert_eq!(numbers::SYS_OPEN, 6);
        assert_eq!(numbers::SYS_FILESIZE, 7);
        assert_eq!(numbers::SYS_READ, 8);
        assert_eq!(numbers::SYS_WRITE, 9);
        assert_eq!(numbers::SYS_SEEK, 10);
        assert_eq!(numbers::SYS_TELL, 11);
        assert_eq!(numbers::SYS_CLOSE, 12);
    }
}
