use std::fmt::Write as _;
use std::rc::Rc;

use log::warn;

use crate::decoder::decode;
use crate::fault::Fault;
use crate::image::{self, ImageHeader, LoadError, PROGRAM_STACK_SIZE};
use crate::instruction::Instr;
use crate::isa::Opcode;
use crate::memory::Heap;
use crate::syscall::SyscallEnv;

/// Operand-stack capacity in word-sized slots.
pub const OP_STACK_SIZE: usize = 1024;

/// Saved return pc meaning "the entry frame returned": the program is
/// finished and its result is on top of the operand stack.
pub const RETURN_SENTINEL: i32 = -1;

/// Outcome of one bounded execution of the interpreter loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceResult {
    /// The entry frame returned; the payload is the program's result.
    Finished(i32),
    /// A syscall requested a cooperative yield; run another slice later.
    NotFinished,
    /// The accumulated fault set. Terminal for this VM.
    Faulted(Fault),
}

/// One bytecode VM instance.
///
/// Owns a read-only decoded code segment, a power-of-two heap, a bounded
/// operand stack, and a program (call) stack carved out of the top of the
/// heap. Executes under a host loop one slice at a time; never blocks
/// internally.
#[derive(Debug)]
pub struct Vm {
    code: Vec<Instr>,
    /// Pre-padding instruction count; the disassembler stops here.
    decoded_len: usize,
    heap: Heap,
    op_stack: [i32; OP_STACK_SIZE],
    op_depth: usize,
    pc: u32,
    program_stack: u32,
    stack_bottom: u32,
    faults: Fault,
    done: bool,
    entered: bool,
    env: Option<Rc<SyscallEnv>>,
    yield_flag: bool,
    sleep_request: Option<u64>,
    extra: u64,
}

impl Vm {
    /// Parses and validates a binary image, producing a VM ready for
    /// [`set_entry`](Self::set_entry).
    pub fn load(bytes: &[u8]) -> Result<Self, LoadError> {
        let header = ImageHeader::parse(bytes)?;
        let code_bytes = image::section(
            bytes,
            "code",
            header.code_offset,
            header.code_length as u32,
        )?;
        let init = image::section(
            bytes,
            "data",
            header.data_offset,
            header.data_length as u32 + header.lit_length as u32,
        )?;

        let (code, decoded_len) = decode(code_bytes)?;
        if decoded_len as i64 != header.instruction_count as i64 {
            warn!(
                "header claims {} instructions, decoded {}",
                header.instruction_count, decoded_len
            );
        }

        let heap = Heap::new(init, header.heap_len());
        let program_stack = (heap.mask() - 3) & !3;
        Ok(Self {
            code,
            decoded_len,
            op_stack: [0; OP_STACK_SIZE],
            op_depth: 0,
            pc: 0,
            program_stack,
            stack_bottom: program_stack.saturating_sub(PROGRAM_STACK_SIZE),
            heap,
            faults: Fault::empty(),
            done: false,
            entered: false,
            env: None,
            yield_flag: false,
            sleep_request: None,
            extra: 0,
        })
    }

    /// Builds the synthetic entry frame for a `main(arg0, arg1, ...)`-style
    /// call: arguments land where `LOCAL`-relative loads expect them and
    /// the saved return pc is the terminal sentinel, so the entry
    /// function's `LEAVE` finishes the program.
    pub fn set_entry(&mut self, args: &[i32]) {
        let frame = 8 + 4 * args.len() as u32;
        self.program_stack -= frame;
        for (slot, value) in args.iter().enumerate() {
            self.store_checked(self.program_stack + 8 + 4 * slot as u32, *value as u32);
        }
        self.store_checked(self.program_stack + 4, 0);
        self.store_checked(self.program_stack, RETURN_SENTINEL as u32);
        self.pc = 0;
        self.entered = true;
    }

    fn store_checked(&mut self, addr: u32, value: u32) {
        if let Err(fault) = self.heap.store32(addr, value) {
            self.faults |= fault;
        }
    }

    /// Runs instructions until the program finishes, faults, or a syscall
    /// requests a yield. Calling again after a terminal result reports the
    /// same result.
    pub fn run_slice(&mut self) -> SliceResult {
        if !self.entered {
            self.faults |= Fault::UNINITIALIZED;
        }
        loop {
            if !self.faults.is_empty() {
                return SliceResult::Faulted(self.faults);
            }
            if self.done {
                return SliceResult::Finished(self.result());
            }
            if self.yield_flag {
                self.yield_flag = false;
                return SliceResult::NotFinished;
            }
            if let Err(fault) = self.step() {
                self.faults |= fault;
            }
        }
    }

    /// Executes one instruction.
    fn step(&mut self) -> Result<(), Fault> {
        if self.pc as usize >= self.code.len() {
            return Err(Fault::OUT_OF_BOUNDS);
        }
        let Instr { op, imm } = self.code[self.pc as usize];
        self.pc = self.pc.wrapping_add(1);

        use Opcode::*;
        match op {
            Undef | Break => return Err(Fault::INVALID_OPCODE),
            Ignore => {}

            Enter => {
                // A negative immediate becomes a huge u32 and fails the
                // checked subtraction, so the pointer can neither wrap past
                // zero nor move above its current position.
                match self.program_stack.checked_sub(imm as u32) {
                    Some(ps) if ps >= self.stack_bottom => self.program_stack = ps,
                    _ => return Err(Fault::STACK_OVERFLOW),
                }
            }
            Leave => {
                self.program_stack = self.program_stack.wrapping_add(imm as u32);
                let saved = self.heap.load32(self.program_stack)? as i32;
                if saved == RETURN_SENTINEL {
                    self.done = true;
                } else {
                    self.pc = self.code_target(saved)?;
                }
            }
            Call => {
                let target = self.try_pop()?;
                // Return linkage for both plain calls and traps lives in
                // the heap word at the caller's frame base.
                self.heap.store32(self.program_stack, self.pc)?;
                if target >= 0 {
                    self.pc = self.code_target(target)?;
                } else {
                    self.trap(target)?;
                }
            }

            Push => self.try_push(0)?,
            Pop => {
                self.try_pop()?;
            }
            Const => self.try_push(imm)?,
            Local => self.try_push(self.program_stack.wrapping_add(imm as u32) as i32)?,
            Jump => {
                let target = self.try_pop()?;
                self.pc = self.code_target(target)?;
            }

            Eq | Ne | Lti | Lei | Gti | Gei | Ltu | Leu | Gtu | Geu | Eqf | Nef | Ltf | Lef
            | Gtf | Gef => {
                let (a, b) = self.try_pop2()?;
                let (ua, ub) = (a as u32, b as u32);
                let (fa, fb) = (f32::from_bits(ua), f32::from_bits(ub));
                let taken = match op {
                    Eq => a == b,
                    Ne => a != b,
                    Lti => a < b,
                    Lei => a <= b,
                    Gti => a > b,
                    Gei => a >= b,
                    Ltu => ua < ub,
                    Leu => ua <= ub,
                    Gtu => ua > ub,
                    Geu => ua >= ub,
                    Eqf => fa == fb,
                    Nef => fa != fb,
                    Ltf => fa < fb,
                    Lef => fa <= fb,
                    Gtf => fa > fb,
                    _ => fa >= fb,
                };
                if taken {
                    self.pc = self.code_target(imm)?;
                }
            }

            Load1 => {
                let addr = self.try_pop()? as u32;
                let value = self.heap.load8(addr)?;
                self.try_push(value as i32)?;
            }
            Load2 => {
                let addr = self.try_pop()? as u32;
                let value = self.heap.load16(addr)?;
                self.try_push(value as i32)?;
            }
            Load4 => {
                let addr = self.try_pop()? as u32;
                let value = self.heap.load32(addr)?;
                self.try_push(value as i32)?;
            }
            Store1 => {
                let value = self.try_pop()?;
                let addr = self.try_pop()? as u32;
                self.heap.store8(addr, value as u8)?;
            }
            Store2 => {
                let value = self.try_pop()?;
                let addr = self.try_pop()? as u32;
                self.heap.store16(addr, value as u16)?;
            }
            Store4 => {
                let value = self.try_pop()?;
                let addr = self.try_pop()? as u32;
                self.heap.store32(addr, value as u32)?;
            }
            Arg => {
                let value = self.try_pop()?;
                self.heap
                    .store32(self.program_stack.wrapping_add(imm as u32), value as u32)?;
            }
            BlockCopy => {
                let src = self.try_pop()? as u32;
                let dest = self.try_pop()? as u32;
                self.heap.block_copy(dest, src, imm as u32)?;
            }

            Sex8 => self.unary(|v| v as i8 as i32)?,
            Sex16 => self.unary(|v| v as i16 as i32)?,
            Negi => self.unary(i32::wrapping_neg)?,
            Add => self.binary(i32::wrapping_add)?,
            Sub => self.binary(i32::wrapping_sub)?,
            Muli => self.binary(i32::wrapping_mul)?,
            Mulu => self.binary(|a, b| ((a as u32).wrapping_mul(b as u32)) as i32)?,
            Divi => self.division(|a, b| a.wrapping_div(b))?,
            Divu => self.division(|a, b| ((a as u32) / (b as u32)) as i32)?,
            Modi => self.division(|a, b| a.wrapping_rem(b))?,
            Modu => self.division(|a, b| ((a as u32) % (b as u32)) as i32)?,
            Band => self.binary(|a, b| a & b)?,
            Bor => self.binary(|a, b| a | b)?,
            Bxor => self.binary(|a, b| a ^ b)?,
            Bcom => self.unary(|v| !v)?,
            // Shift amounts take the low five bits of the operand.
            Lsh => self.binary(|a, b| ((a as u32) << (b & 0x1f)) as i32)?,
            Rshi => self.binary(|a, b| a >> (b & 0x1f))?,
            Rshu => self.binary(|a, b| ((a as u32) >> (b & 0x1f)) as i32)?,

            Negf => self.unary_f(|v| -v)?,
            Addf => self.binary_f(|a, b| a + b)?,
            Subf => self.binary_f(|a, b| a - b)?,
            Divf => self.binary_f(|a, b| a / b)?,
            Mulf => self.binary_f(|a, b| a * b)?,
            Cvif => self.unary(|v| (v as f32).to_bits() as i32)?,
            Cvfi => self.unary(|v| f32::from_bits(v as u32) as i32)?,
        }
        Ok(())
    }

    /// Dispatches a negative call target into the host table and enforces
    /// the one-return-value contract before resuming after the `CALL`.
    fn trap(&mut self, target: i32) -> Result<(), Fault> {
        let env = self.env.clone().ok_or(Fault::BAD_ENV)?;
        let index = SyscallEnv::index_for(target);
        let func = env.get(index).ok_or(Fault::BAD_SYSCALL)?;

        let depth_before = self.op_depth;
        func(self);

        let want = depth_before + 1;
        if self.op_depth > want {
            warn!(
                "syscall {} pushed {} extra operand-stack value(s) (want exactly 1 result), dropping",
                index,
                self.op_depth - want
            );
            while self.op_depth > want {
                self.op_depth -= 1;
            }
        } else if self.op_depth < want {
            warn!(
                "syscall {} left the operand stack {} value(s) short of the single expected result, padding with 0",
                index,
                want - self.op_depth
            );
            while self.op_depth < want {
                self.op_stack[self.op_depth] = 0;
                self.op_depth += 1;
            }
        }

        let saved = self.heap.load32(self.program_stack)? as i32;
        self.pc = self.code_target(saved)?;
        Ok(())
    }

    /// Validates a jump/call/return target against the code mask.
    fn code_target(&self, target: i32) -> Result<u32, Fault> {
        if target < 0 || target as usize >= self.code.len() {
            return Err(Fault::OUT_OF_BOUNDS);
        }
        Ok(target as u32)
    }

    fn try_push(&mut self, value: i32) -> Result<(), Fault> {
        if self.op_depth == OP_STACK_SIZE {
            return Err(Fault::STACK_OVERFLOW);
        }
        self.op_stack[self.op_depth] = value;
        self.op_depth += 1;
        Ok(())
    }

    fn try_pop(&mut self) -> Result<i32, Fault> {
        if self.op_depth == 0 {
            return Err(Fault::STACK_UNDERFLOW);
        }
        self.op_depth -= 1;
        Ok(self.op_stack[self.op_depth])
    }

    /// Pops `(second, top)` for a binary operator.
    fn try_pop2(&mut self) -> Result<(i32, i32), Fault> {
        let b = self.try_pop()?;
        let a = self.try_pop()?;
        Ok((a, b))
    }

    fn unary(&mut self, f: impl Fn(i32) -> i32) -> Result<(), Fault> {
        let v = self.try_pop()?;
        self.try_push(f(v))
    }

    fn binary(&mut self, f: impl Fn(i32, i32) -> i32) -> Result<(), Fault> {
        let (a, b) = self.try_pop2()?;
        self.try_push(f(a, b))
    }

    /// Like [`binary`](Self::binary), but a zero divisor faults before
    /// anything is popped, leaving the operand-stack depth unchanged.
    fn division(&mut self, f: impl Fn(i32, i32) -> i32) -> Result<(), Fault> {
        if self.op_depth == 0 {
            return Err(Fault::STACK_UNDERFLOW);
        }
        if self.op_stack[self.op_depth - 1] == 0 {
            return Err(Fault::MATH);
        }
        self.binary(f)
    }

    fn unary_f(&mut self, f: impl Fn(f32) -> f32) -> Result<(), Fault> {
        self.unary(|v| f(f32::from_bits(v as u32)).to_bits() as i32)
    }

    fn binary_f(&mut self, f: impl Fn(f32, f32) -> f32) -> Result<(), Fault> {
        self.binary(|a, b| f(f32::from_bits(a as u32), f32::from_bits(b as u32)).to_bits() as i32)
    }

    // --- host-facing API -------------------------------------------------

    /// Pushes a word for the guest; overflow accumulates a fault instead
    /// of panicking so host callbacks need no error plumbing.
    pub fn push(&mut self, value: i32) {
        if let Err(fault) = self.try_push(value) {
            self.faults |= fault;
        }
    }

    /// Pops a word; underflow accumulates a fault and yields 0.
    pub fn pop(&mut self) -> i32 {
        match self.try_pop() {
            Ok(v) => v,
            Err(fault) => {
                self.faults |= fault;
                0
            }
        }
    }

    pub fn push_f32(&mut self, value: f32) {
        self.push(value.to_bits() as i32);
    }

    pub fn pop_f32(&mut self) -> f32 {
        f32::from_bits(self.pop() as u32)
    }

    /// The `n`-th call argument of the frame that trapped, per the ABI:
    /// arguments sit above the two linkage words at the frame base.
    pub fn arg(&self, n: u32) -> i32 {
        self.heap
            .load32(self.program_stack + 8 + 4 * n)
            .unwrap_or(0) as i32
    }

    /// A host view of the null-terminated heap string at `addr`; never
    /// reads outside the heap.
    pub fn heap_str(&self, addr: u32) -> Result<&[u8], Fault> {
        self.heap.cstr(addr)
    }

    /// Raises the abort fault; the current slice ends before the next
    /// guest instruction.
    pub fn abort(&mut self) {
        self.faults |= Fault::ABORTED;
    }

    /// Asks the hosting scheduler to park this VM for `micros` and ends
    /// the slice at the current trap.
    pub fn request_sleep(&mut self, micros: u64) {
        self.sleep_request = Some(micros);
        self.yield_flag = true;
    }

    /// Takes the sleep request a syscall left during the last slice.
    pub fn take_sleep_request(&mut self) -> Option<u64> {
        self.sleep_request.take()
    }

    pub fn set_env(&mut self, env: Rc<SyscallEnv>) {
        self.env = Some(env);
    }

    /// Opaque host context, used by the kernel to link a VM back to its
    /// owning task.
    pub fn set_extra(&mut self, extra: u64) {
        self.extra = extra;
    }

    pub fn extra(&self) -> u64 {
        self.extra
    }

    // --- inspection ------------------------------------------------------

    pub fn faults(&self) -> Fault {
        self.faults
    }

    pub fn is_finished(&self) -> bool {
        self.done
    }

    /// Top of the operand stack, the program's result once finished.
    pub fn result(&self) -> i32 {
        if self.op_depth == 0 {
            0
        } else {
            self.op_stack[self.op_depth - 1]
        }
    }

    pub fn op_depth(&self) -> usize {
        self.op_depth
    }

    pub fn pc(&self) -> u32 {
        self.pc
    }

    pub fn program_stack(&self) -> u32 {
        self.program_stack
    }

    pub fn heap_len(&self) -> usize {
        self.heap.len()
    }

    /// One line per decoded instruction (padding excluded).
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        for (index, instr) in self.code[..self.decoded_len].iter().enumerate() {
            let _ = writeln!(out, "{:5}  {}", index, instr);
        }
        out
    }

    /// Hex dump of a heap range for fault diagnostics.
    pub fn dump_heap(&self, start: usize, end: usize) -> String {
        self.heap.dump(start, end)
    }
}
