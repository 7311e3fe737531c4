//! Instruction Set Architecture (ISA) definitions.
//!
//! The [`for_each_instruction!`](crate::for_each_instruction) macro holds the
//! canonical Intcode instruction list and invokes a callback macro for code
//! generation, so the opcode table, the ISA fingerprint test and any future
//! tooling share one definition.
//!
//! This module generates:
//! - The [`Instruction`] enum with opcode mappings
//! - `TryFrom<i64>` for decoding opcodes
//! - Arity, width and per-parameter [`ParamKind`] tables
//!
//! # Instruction Format
//!
//! Every instruction occupies `1 + arity` memory cells:
//! - Instruction word: `modes * 100 + opcode`
//! - One cell per parameter, interpreted according to its mode digit

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::operand::Mode;

/// Invokes a callback macro with the complete instruction definition list.
#[macro_export]
macro_rules! for_each_instruction {
    ($callback:ident) => {
        $callback! {
            // =========================
            // Arithmetic
            // =========================
            /// ADD a, b, dst ; dst = a + b
            Add = 1, "ADD" => [a: Read, b: Read, dst: Write],
            /// MUL a, b, dst ; dst = a * b
            Mul = 2, "MUL" => [a: Read, b: Read, dst: Write],
            // =========================
            // I/O
            // =========================
            /// IN dst ; dst = next queued input (suspends when the queue is empty)
            In = 3, "IN" => [dst: Write],
            /// OUT a ; emits a and suspends back to the caller
            Out = 4, "OUT" => [a: Read],
            // =========================
            // Control Flow
            // =========================
            /// JNZ cond, target ; if cond != 0 then IP = target
            Jnz = 5, "JNZ" => [cond: Read, target: Read],
            /// JZ cond, target ; if cond == 0 then IP = target
            Jz = 6, "JZ" => [cond: Read, target: Read],
            // =========================
            // Comparison
            // =========================
            /// LT a, b, dst ; dst = (a < b)
            Lt = 7, "LT" => [a: Read, b: Read, dst: Write],
            /// EQ a, b, dst ; dst = (a == b)
            Eq = 8, "EQ" => [a: Read, b: Read, dst: Write],
            // =========================
            // Registers
            // =========================
            /// ARB a ; relative_base += a
            Arb = 9, "ARB" => [a: Read],
            /// HALT ; stops the machine for good
            Halt = 99, "HALT" => [],
        }
    };
}

/// How an instruction uses one of its parameters.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ParamKind {
    /// Operand is fetched as a value.
    Read,
    /// Operand names the destination cell.
    Write,
}

#[macro_export]
macro_rules! define_instructions {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = $opcode:literal, $mnemonic:literal => [
                $( $field:ident : $kind:ident ),* $(,)?
            ]
        ),* $(,)?
    ) => {
        // =========================
        // VM instruction enum
        // =========================
        #[derive(Copy, Clone, Debug, Eq, PartialEq)]
        pub enum Instruction {
            $(
                $(#[$doc])*
                $name = $opcode,
            )*
        }

        impl TryFrom<i64> for Instruction {
            type Error = VMError;

            fn try_from(value: i64) -> Result<Self, Self::Error> {
                match value {
                    $( $opcode => Ok(Instruction::$name), )*
                    _ => Err(VMError::UnknownOpcode {
                        opcode: value,
                        ip: 0,
                    }),
                }
            }
        }

        impl Instruction {
            /// Returns the mnemonic used in traces and listings.
            pub const fn mnemonic(&self) -> &'static str {
                match self {
                    $( Instruction::$name => $mnemonic, )*
                }
            }

            /// Returns how each parameter is used, in left-to-right order.
            pub const fn params(&self) -> &'static [ParamKind] {
                match self {
                    $( Instruction::$name => &[$( ParamKind::$kind ),*], )*
                }
            }
        }
    };
}

for_each_instruction!(define_instructions);

/// Largest parameter count of any instruction.
pub const MAX_PARAMS: usize = 3;

impl Instruction {
    /// Returns the numeric opcode.
    pub const fn opcode(&self) -> i64 {
        *self as i64
    }

    /// Returns the number of parameters.
    pub const fn arity(&self) -> usize {
        self.params().len()
    }

    /// Returns the number of cells occupied, instruction word included.
    pub const fn width(&self) -> usize {
        1 + self.arity()
    }

    /// Renders the instruction with its raw parameters, e.g. `ADD [9] #3 ->[rb+2]`.
    ///
    /// `modes` and `raw` must both hold at least [`arity`](Self::arity) entries.
    pub fn render(&self, modes: &[Mode], raw: &[i64]) -> String {
        let mut out = String::from(self.mnemonic());
        for (i, kind) in self.params().iter().enumerate() {
            out.push(' ');
            if *kind == ParamKind::Write {
                out.push_str("->");
            }
            out.push_str(&modes[i].format_operand(raw[i]));
        }
        out
    }
}
