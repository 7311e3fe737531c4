//! Intcode virtual machine.
//!
//! Programs are flat lists of signed 64-bit integers that double as code and
//! data. The machine executes them against its own copy of that memory and
//! talks to the caller through an input queue and suspending output events.
//!
//! # Architecture
//!
//! - **Memory**: grows with zeros on demand, bounded by a configurable capacity
//! - **Instruction format**: `modes * 100 + opcode`, followed by one cell per parameter
//! - **Addressing**: positional, immediate and relative-to-base parameters
//! - **Execution model**: explicit state machine driven by [`vm::VM::resume`];
//!   the machine suspends on every output and whenever it needs input
//!
//! # Modules
//!
//! - [`errors`]: Load and execution error types
//! - [`isa`]: Instruction set definition and opcode mappings
//! - [`operand`]: Addressing modes and instruction-word decoding
//! - [`program`]: Program images and their text format
//! - [`vm`]: Core virtual machine implementation

pub mod errors;
pub mod isa;
#[cfg(test)]
mod isa_static_check;
pub mod operand;
pub mod program;
pub mod vm;
