use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// Accumulating fault set of a VM instance.
    ///
    /// The empty set means the VM has not faulted; a finished program is
    /// tracked separately, so "finished cleanly" is the unique zero value
    /// here. Faults combine (a host abort can land on top of a memory
    /// fault) and are terminal for the owning task: the kernel reaps the
    /// task and keeps running the others.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Fault: u32 {
        /// Executed an `UNDEF`/`BREAK` or an unknown padded slot.
        const INVALID_OPCODE  = 1 << 0;
        /// Popped an empty operand stack.
        const STACK_UNDERFLOW = 1 << 1;
        /// Pushed past the operand-stack capacity, or ran the program
        /// stack below its reserved bottom.
        const STACK_OVERFLOW  = 1 << 2;
        /// A heap access ranged past the allocated length, or a code
        /// address left the code segment.
        const OUT_OF_BOUNDS   = 1 << 3;
        /// 2- or 4-byte heap access on an unaligned address.
        const MISALIGNED      = 1 << 4;
        /// Integer division or modulo by zero.
        const MATH            = 1 << 5;
        /// Syscall trap with no environment table attached.
        const BAD_ENV         = 1 << 6;
        /// Syscall index past the end of the environment table.
        const BAD_SYSCALL     = 1 << 7;
        /// Host- or guest-requested abort.
        const ABORTED         = 1 << 8;
        /// Ran a VM whose entry frame was never set up.
        const UNINITIALIZED   = 1 << 9;
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        let mut first = true;
        for (name, _) in self.iter_names() {
            if !first {
                write!(f, "|")?;
            }
            write!(f, "{}", name)?;
            first = false;
        }
        Ok(())
    }
}
