use thiserror::Error;

/// Errors that can occur while loading or executing an Intcode program.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VMError {
    /// Program text contained a token that is not a decimal integer.
    #[error("malformed program: token {index} ({token:?}) is not an integer")]
    MalformedProgram { index: usize, token: String },
    /// Program file could not be read.
    #[error("io error reading {path}: {reason}")]
    IoError { path: String, reason: String },
    /// Decoded opcode is not part of the instruction set.
    #[error("unknown opcode {opcode} at ip {ip}")]
    UnknownOpcode { opcode: i64, ip: usize },
    /// Parameter mode digit is not positional, immediate or relative.
    #[error("invalid parameter mode {mode} at ip {ip}")]
    InvalidMode { mode: i64, ip: usize },
    /// Destination parameter was given immediate mode.
    #[error("write through immediate-mode parameter at ip {ip}")]
    ImmediateWrite { ip: usize },
    /// Resolved address is negative or past the configured capacity.
    #[error("address {address} out of bounds (capacity {capacity})")]
    OutOfBoundsAddress { address: i64, capacity: usize },
    /// Add, multiply or relative base adjustment overflowed `i64`.
    #[error("arithmetic overflow at ip {ip}")]
    ArithmeticOverflow { ip: usize },
    /// Input instruction reached with nothing queued and no way to ask for more.
    #[error("input requested at ip {ip} but the input queue is empty")]
    StarvedInput { ip: usize },
    /// Configured capacity cannot hold the program.
    #[error("capacity {capacity} is smaller than the program ({program_len} cells)")]
    CapacityTooSmall { program_len: usize, capacity: usize },
}

impl VMError {
    /// Attaches the instruction pointer to errors raised by context-free
    /// decoding helpers, which report `ip: 0`.
    pub(crate) fn at(self, ip: usize) -> Self {
        match self {
            VMError::UnknownOpcode { opcode, .. } => VMError::UnknownOpcode { opcode, ip },
            VMError::InvalidMode { mode, .. } => VMError::InvalidMode { mode, ip },
            other => other,
        }
    }
}
