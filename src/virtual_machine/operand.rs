//! Parameter addressing modes and instruction-word decoding.

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::{Instruction, MAX_PARAMS};

/// Addressing mode of a single instruction parameter.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum Mode {
    /// Parameter is the address of the operand.
    #[default]
    Position = 0,
    /// Parameter is the operand itself. Never valid for a destination.
    Immediate = 1,
    /// Parameter is an offset from the relative base.
    Relative = 2,
}

impl Mode {
    /// Formats a raw parameter the way traces show it.
    pub fn format_operand(&self, raw: i64) -> String {
        match self {
            Mode::Position => format!("[{raw}]"),
            Mode::Immediate => format!("#{raw}"),
            Mode::Relative if raw < 0 => format!("[rb{raw}]"),
            Mode::Relative => format!("[rb+{raw}]"),
        }
    }
}

impl TryFrom<i64> for Mode {
    type Error = VMError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Position),
            1 => Ok(Self::Immediate),
            2 => Ok(Self::Relative),
            _ => Err(VMError::InvalidMode { mode: value, ip: 0 }),
        }
    }
}

/// A decoded instruction word: the opcode plus one mode per parameter.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Decoded {
    pub instruction: Instruction,
    modes: [Mode; MAX_PARAMS],
}

impl Decoded {
    /// Modes for the parameters this instruction actually takes.
    pub fn modes(&self) -> &[Mode] {
        &self.modes[..self.instruction.arity()]
    }

    /// Mode of parameter `index`, defaulting to positional past the arity.
    pub fn mode(&self, index: usize) -> Mode {
        self.modes.get(index).copied().unwrap_or_default()
    }
}

/// Splits an instruction word into its opcode and parameter modes.
///
/// The two low decimal digits select the opcode; each higher digit, nearest
/// first, is the mode of the next parameter. Missing digits mean
/// [`Mode::Position`]. Digits beyond the opcode's arity are ignored.
pub fn decode(word: i64) -> Result<Decoded, VMError> {
    if word < 0 {
        return Err(VMError::UnknownOpcode { opcode: word, ip: 0 });
    }
    let instruction = Instruction::try_from(word % 100)?;

    let mut modes = [Mode::Position; MAX_PARAMS];
    let mut digits = word / 100;
    for mode in modes.iter_mut().take(instruction.arity()) {
        *mode = Mode::try_from(digits % 10)?;
        digits /= 10;
    }

    Ok(Decoded { instruction, modes })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_try_from_valid() {
        assert_eq!(Mode::try_from(0i64).unwrap(), Mode::Position);
        assert_eq!(Mode::try_from(1i64).unwrap(), Mode::Immediate);
        assert_eq!(Mode::try_from(2i64).unwrap(), Mode::Relative);
    }

    #[test]
    fn mode_try_from_invalid() {
        for mode in 3..=9i64 {
            let err = Mode::try_from(mode).unwrap_err();
            assert!(matches!(err, VMError::InvalidMode { mode: m, .. } if m == mode));
        }
    }

    #[test]
    fn decode_multiply_with_immediate() {
        let decoded = decode(1002).unwrap();
        assert_eq!(decoded.instruction, Instruction::Mul);
        assert_eq!(
            decoded.modes(),
            &[Mode::Position, Mode::Immediate, Mode::Position]
        );
    }

    #[test]
    fn decode_defaults_missing_digits() {
        let decoded = decode(1).unwrap();
        assert_eq!(decoded.instruction, Instruction::Add);
        assert_eq!(decoded.modes(), &[Mode::Position; 3]);

        let decoded = decode(109).unwrap();
        assert_eq!(decoded.instruction, Instruction::Arb);
        assert_eq!(decoded.modes(), &[Mode::Immediate]);
    }

    #[test]
    fn decode_relative_destination() {
        let decoded = decode(21107).unwrap();
        assert_eq!(decoded.instruction, Instruction::Lt);
        assert_eq!(
            decoded.modes(),
            &[Mode::Immediate, Mode::Immediate, Mode::Relative]
        );
    }

    #[test]
    fn decode_halt_has_no_modes() {
        let decoded = decode(99).unwrap();
        assert_eq!(decoded.instruction, Instruction::Halt);
        assert!(decoded.modes().is_empty());
        assert_eq!(decoded.mode(0), Mode::Position);
    }

    #[test]
    fn decode_is_idempotent() {
        for word in [1, 2, 99, 1002, 1101, 203, 21108, 1105, 2106, 109, 204] {
            assert_eq!(decode(word).unwrap(), decode(word).unwrap());
        }
    }

    #[test]
    fn decode_ignores_digits_past_arity() {
        // OUT only has one parameter, so the 3 in the hundreds-of-thousands is never read.
        let decoded = decode(300104).unwrap();
        assert_eq!(decoded.instruction, Instruction::Out);
        assert_eq!(decoded.modes(), &[Mode::Immediate]);
    }

    #[test]
    fn decode_rejects_bad_mode_digit() {
        assert!(matches!(
            decode(301),
            Err(VMError::InvalidMode { mode: 3, .. })
        ));
    }

    #[test]
    fn decode_rejects_unknown_opcode() {
        assert!(matches!(
            decode(0),
            Err(VMError::UnknownOpcode { opcode: 0, .. })
        ));
        assert!(matches!(
            decode(1050),
            Err(VMError::UnknownOpcode { opcode: 50, .. })
        ));
        assert!(matches!(
            decode(-1),
            Err(VMError::UnknownOpcode { opcode: -1, .. })
        ));
    }

    #[test]
    fn format_operand_by_mode() {
        assert_eq!(Mode::Position.format_operand(7), "[7]");
        assert_eq!(Mode::Immediate.format_operand(-7), "#-7");
        assert_eq!(Mode::Relative.format_operand(7), "[rb+7]");
        assert_eq!(Mode::Relative.format_operand(-7), "[rb-7]");
    }
}
