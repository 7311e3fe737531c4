//! Core virtual machine implementation.
//!
//! The VM is an explicit state machine over a private memory image, an
//! instruction pointer, a relative base and an input queue. Callers drive it
//! with [`VM::resume`], which runs until the program emits a value, needs an
//! input that has not been queued yet, or halts. Nothing runs between calls,
//! so any number of machines can be interleaved on one thread.

mod config;
mod memory;

pub use config::{DEFAULT_CAPACITY, VmConfig};

use crate::trace;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::Instruction;
use crate::virtual_machine::operand::{Decoded, Mode, decode};
use crate::virtual_machine::program::Program;
use memory::Memory;
use std::collections::VecDeque;

/// Where the machine stands between calls.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ExecState {
    /// Ready to execute the instruction at the instruction pointer.
    Ready,
    /// Parked on an input instruction with an empty queue.
    AwaitingInput,
    /// Just handed an output value to the caller.
    HasOutput,
    /// Stopped for good.
    Halted,
}

/// Outcome of executing a single instruction.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Step {
    /// Instruction executed without producing anything visible.
    Continue,
    /// An output instruction produced this value.
    Output(i64),
    /// The next instruction reads input and the queue is empty. Nothing was executed.
    NeedsInput,
    /// The machine has halted.
    Halted,
}

/// Why [`VM::resume`] handed control back.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Event {
    /// The program emitted a value.
    Output(i64),
    /// The program needs an input; push one and resume.
    NeedsInput,
    /// The program has halted.
    Halted,
}

/// What a handler asks the execution loop to do next.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Effect {
    /// Advance past the instruction.
    Next,
    /// Continue at an absolute address.
    Jump(usize),
    /// Advance past the instruction and suspend with a value.
    Output(i64),
    /// Stop.
    Halt,
}

/// Dispatches a decoded instruction to its handler.
///
/// Each parameter is resolved according to its kind before the handler runs:
/// `Read` parameters arrive as values, `Write` parameters as validated
/// destination indices.
macro_rules! exec_vm {
    (
        vm = $vm:ident,
        decoded = $decoded:ident,
        { $( $variant:ident => $handler:ident ( $( $field:ident : $kind:ident ),* $(,)? ) ),* $(,)? }
    ) => {{
        match $decoded.instruction {
            $(
                Instruction::$variant => {
                    let mut param = 0usize;
                    $(
                        let $field = exec_vm!(@read $vm, $decoded, param, $kind)?;
                        param += 1;
                    )*
                    $vm.$handler($( $field ),*)
                }
            ),*
        }
    }};

    // Fetch an operand value
    (@read $vm:ident, $decoded:ident, $param:ident, Read) => {{
        $vm.fetch($param, $decoded.mode($param))
    }};

    // Resolve a destination index
    (@read $vm:ident, $decoded:ident, $param:ident, Write) => {{
        $vm.destination($param, $decoded.mode($param))
    }};
}

/// Intcode virtual machine.
///
/// Owns its memory outright; the [`Program`] it was built from is never
/// touched. Once halted it stays halted.
pub struct VM {
    /// Memory image.
    memory: Memory,
    /// Instruction pointer (address of the next instruction word).
    ip: usize,
    /// Base added to relative-mode parameters.
    relative_base: i64,
    /// Pending inputs, consumed front first.
    inputs: VecDeque<i64>,
    state: ExecState,
    /// Number of instructions executed so far.
    executed: u64,
    trace: bool,
}

impl VM {
    /// Creates a VM with default settings.
    ///
    /// Capacity is [`DEFAULT_CAPACITY`], raised to the program length if the
    /// program is larger.
    pub fn new(program: &Program) -> Self {
        let memory = Memory::with_room(program.cells().to_vec(), DEFAULT_CAPACITY);
        Self::from_memory(memory, false)
    }

    /// Creates a VM with explicit settings.
    ///
    /// Returns [`VMError::CapacityTooSmall`] if the program does not fit in
    /// `config.capacity` cells.
    pub fn with_config(program: &Program, config: VmConfig) -> Result<Self, VMError> {
        let memory = Memory::new(program.cells().to_vec(), config.capacity)?;
        Ok(Self::from_memory(memory, config.trace))
    }

    /// Creates a VM from raw cells with a fixed capacity.
    pub fn with_capacity(cells: &[i64], capacity: usize) -> Result<Self, VMError> {
        let memory = Memory::new(cells.to_vec(), capacity)?;
        Ok(Self::from_memory(memory, false))
    }

    fn from_memory(memory: Memory, trace: bool) -> Self {
        Self {
            memory,
            ip: 0,
            relative_base: 0,
            inputs: VecDeque::new(),
            state: ExecState::Ready,
            executed: 0,
            trace,
        }
    }

    /// Appends a value to the input queue.
    pub fn push_input(&mut self, value: i64) {
        self.inputs.push_back(value);
        if self.state == ExecState::AwaitingInput {
            self.state = ExecState::Ready;
        }
    }

    /// Appends several values to the input queue, in order.
    pub fn extend_input<I: IntoIterator<Item = i64>>(&mut self, values: I) {
        for value in values {
            self.push_input(value);
        }
    }

    /// Number of queued inputs not yet consumed.
    pub fn pending_inputs(&self) -> usize {
        self.inputs.len()
    }

    pub fn state(&self) -> ExecState {
        self.state
    }

    pub fn is_halted(&self) -> bool {
        self.state == ExecState::Halted
    }

    pub fn ip(&self) -> usize {
        self.ip
    }

    pub fn relative_base(&self) -> i64 {
        self.relative_base
    }

    /// Number of instructions executed since construction.
    pub fn instructions_executed(&self) -> u64 {
        self.executed
    }

    /// Read-only view of the materialised memory.
    ///
    /// Covers the loaded program and every cell up to the highest write;
    /// anything beyond reads as zero.
    pub fn memory(&self) -> &[i64] {
        self.memory.cells()
    }

    /// Reads any cell below the capacity.
    pub fn read(&self, addr: usize) -> Result<i64, VMError> {
        self.memory.read_at(addr)
    }

    pub fn capacity(&self) -> usize {
        self.memory.capacity()
    }

    /// Runs until the program outputs a value, needs input, or halts.
    pub fn resume(&mut self) -> Result<Event, VMError> {
        loop {
            match self.step()? {
                Step::Continue => {}
                Step::Output(value) => return Ok(Event::Output(value)),
                Step::NeedsInput => return Ok(Event::NeedsInput),
                Step::Halted => return Ok(Event::Halted),
            }
        }
    }

    /// Queues `inputs`, then runs to completion and returns every output.
    ///
    /// Returns [`VMError::StarvedInput`] if the program asks for more input
    /// than was supplied.
    pub fn run_with_inputs<I: IntoIterator<Item = i64>>(
        &mut self,
        inputs: I,
    ) -> Result<Vec<i64>, VMError> {
        self.extend_input(inputs);
        self.outputs().collect()
    }

    /// Iterates over outputs until the machine halts.
    ///
    /// Running out of input is reported once as [`VMError::StarvedInput`],
    /// after which the iterator ends. Input pushed later can be picked up by
    /// calling `outputs` again.
    pub fn outputs(&mut self) -> Outputs<'_> {
        Outputs {
            vm: self,
            done: false,
        }
    }

    /// Executes exactly one instruction.
    ///
    /// The machine halts on opcode 99 or once the instruction pointer reaches
    /// the capacity. Unwritten cells below the capacity decode as opcode 0.
    /// An input instruction with an empty queue is not executed: the machine
    /// reports [`Step::NeedsInput`] and stays on it. Errors leave memory, the
    /// instruction pointer and the relative base as they were before the
    /// faulting instruction.
    pub fn step(&mut self) -> Result<Step, VMError> {
        if self.state == ExecState::Halted {
            return Ok(Step::Halted);
        }
        if self.ip >= self.memory.capacity() {
            self.state = ExecState::Halted;
            return Ok(Step::Halted);
        }

        let ip = self.ip;
        let word = self.memory.read_at(ip)?;
        let decoded = decode(word).map_err(|e| e.at(ip))?;
        let instruction = decoded.instruction;

        if instruction == Instruction::In && self.inputs.is_empty() {
            self.state = ExecState::AwaitingInput;
            return Ok(Step::NeedsInput);
        }

        if self.trace {
            self.trace_instruction(&decoded)?;
        }

        let effect = self.exec(&decoded)?;
        self.executed += 1;

        match effect {
            Effect::Next => {
                self.ip = ip + instruction.width();
                self.state = ExecState::Ready;
                Ok(Step::Continue)
            }
            Effect::Jump(target) => {
                self.ip = target;
                self.state = ExecState::Ready;
                Ok(Step::Continue)
            }
            Effect::Output(value) => {
                self.ip = ip + instruction.width();
                self.state = ExecState::HasOutput;
                Ok(Step::Output(value))
            }
            Effect::Halt => {
                self.state = ExecState::Halted;
                Ok(Step::Halted)
            }
        }
    }

    fn trace_instruction(&self, decoded: &Decoded) -> Result<(), VMError> {
        let raw = (0..decoded.instruction.arity())
            .map(|param| self.raw_param(param))
            .collect::<Result<Vec<_>, _>>()?;
        trace!(
            "{:>6}  rb={:<6} {}",
            self.ip,
            self.relative_base,
            decoded.instruction.render(decoded.modes(), &raw)
        );
        Ok(())
    }

    /// Executes a single decoded instruction.
    #[allow(unused_assignments, unused_mut, unused_variables)]
    fn exec(&mut self, decoded: &Decoded) -> Result<Effect, VMError> {
        exec_vm! {
            vm = self,
            decoded = decoded,
            {
                // Arithmetic
                Add => op_add(a: Read, b: Read, dst: Write),
                Mul => op_mul(a: Read, b: Read, dst: Write),
                // I/O
                In => op_in(dst: Write),
                Out => op_out(a: Read),
                // Control Flow
                Jnz => op_jnz(cond: Read, target: Read),
                Jz => op_jz(cond: Read, target: Read),
                // Comparison
                Lt => op_lt(a: Read, b: Read, dst: Write),
                Eq => op_eq(a: Read, b: Read, dst: Write),
                // Registers
                Arb => op_arb(a: Read),
                Halt => op_halt(),
            }
        }
    }

    /// Raw contents of parameter cell `param` of the current instruction.
    fn raw_param(&self, param: usize) -> Result<i64, VMError> {
        self.memory.read_at(self.ip + 1 + param)
    }

    /// Adds the relative base to a relative-mode parameter.
    fn relative(&self, offset: i64) -> Result<i64, VMError> {
        self.relative_base
            .checked_add(offset)
            .ok_or(VMError::ArithmeticOverflow { ip: self.ip })
    }

    /// Resolves parameter `param` to the value it denotes.
    fn fetch(&self, param: usize, mode: Mode) -> Result<i64, VMError> {
        let raw = self.raw_param(param)?;
        match mode {
            Mode::Position => self.memory.read(raw),
            Mode::Immediate => Ok(raw),
            Mode::Relative => self.memory.read(self.relative(raw)?),
        }
    }

    /// Resolves parameter `param` to the index of the cell it names.
    fn destination(&self, param: usize, mode: Mode) -> Result<usize, VMError> {
        let raw = self.raw_param(param)?;
        match mode {
            Mode::Position => self.memory.check(raw),
            Mode::Immediate => Err(VMError::ImmediateWrite { ip: self.ip }),
            Mode::Relative => self.memory.check(self.relative(raw)?),
        }
    }

    /// Validates a jump target.
    fn jump_to(&self, target: i64) -> Result<Effect, VMError> {
        let target = usize::try_from(target).map_err(|_| VMError::OutOfBoundsAddress {
            address: target,
            capacity: self.memory.capacity(),
        })?;
        Ok(Effect::Jump(target))
    }

    fn op_add(&mut self, a: i64, b: i64, dst: usize) -> Result<Effect, VMError> {
        let sum = a
            .checked_add(b)
            .ok_or(VMError::ArithmeticOverflow { ip: self.ip })?;
        self.memory.write(dst, sum);
        Ok(Effect::Next)
    }

    fn op_mul(&mut self, a: i64, b: i64, dst: usize) -> Result<Effect, VMError> {
        let product = a
            .checked_mul(b)
            .ok_or(VMError::ArithmeticOverflow { ip: self.ip })?;
        self.memory.write(dst, product);
        Ok(Effect::Next)
    }

    fn op_in(&mut self, dst: usize) -> Result<Effect, VMError> {
        let value = self
            .inputs
            .pop_front()
            .ok_or(VMError::StarvedInput { ip: self.ip })?;
        self.memory.write(dst, value);
        Ok(Effect::Next)
    }

    fn op_out(&mut self, a: i64) -> Result<Effect, VMError> {
        Ok(Effect::Output(a))
    }

    fn op_jnz(&mut self, cond: i64, target: i64) -> Result<Effect, VMError> {
        if cond != 0 {
            return self.jump_to(target);
        }
        Ok(Effect::Next)
    }

    fn op_jz(&mut self, cond: i64, target: i64) -> Result<Effect, VMError> {
        if cond == 0 {
            return self.jump_to(target);
        }
        Ok(Effect::Next)
    }

    fn op_lt(&mut self, a: i64, b: i64, dst: usize) -> Result<Effect, VMError> {
        self.memory.write(dst, (a < b) as i64);
        Ok(Effect::Next)
    }

    fn op_eq(&mut self, a: i64, b: i64, dst: usize) -> Result<Effect, VMError> {
        self.memory.write(dst, (a == b) as i64);
        Ok(Effect::Next)
    }

    fn op_arb(&mut self, a: i64) -> Result<Effect, VMError> {
        self.relative_base = self.relative(a)?;
        Ok(Effect::Next)
    }

    fn op_halt(&mut self) -> Result<Effect, VMError> {
        Ok(Effect::Halt)
    }
}

/// Iterator returned by [`VM::outputs`].
pub struct Outputs<'a> {
    vm: &'a mut VM,
    done: bool,
}

impl Iterator for Outputs<'_> {
    type Item = Result<i64, VMError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = match self.vm.resume() {
            Ok(Event::Output(value)) => return Some(Ok(value)),
            Ok(Event::Halted) => None,
            Ok(Event::NeedsInput) => Some(Err(VMError::StarvedInput { ip: self.vm.ip })),
            Err(e) => Some(Err(e)),
        };
        self.done = true;
        item
    }
}
