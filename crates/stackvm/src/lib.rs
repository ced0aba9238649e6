//! An embedded stack-machine bytecode interpreter.
//!
//! A [`Vm`] is built from a binary image (header + dense instruction stream +
//! data/lit/bss sections), owns a power-of-two heap and a bounded operand
//! stack, and executes in bounded slices under a host-driven loop. Host
//! functions are invoked through negative call targets resolved against a
//! shared [`SyscallEnv`]; the hosting scheduler reads the yield/sleep flags a
//! syscall leaves on the VM after each slice.

pub mod decoder;
pub mod fault;
pub mod image;
pub mod instruction;
pub mod isa;
pub mod memory;
pub mod syscall;
pub mod vm;

pub use fault::Fault;
pub use image::{ImageHeader, LoadError, MAGIC_V1, MAGIC_V2, PROGRAM_STACK_SIZE};
pub use instruction::Instr;
pub use isa::Opcode;
pub use syscall::{HostFn, SyscallEnv};
pub use vm::{SliceResult, Vm, OP_STACK_SIZE, RETURN_SENTINEL};
