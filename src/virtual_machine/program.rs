//! Intcode program images and their text format.
//!
//! A program is a comma-separated list of decimal integers, optionally
//! followed by a newline. There is no header, version or checksum.

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::vm::DEFAULT_CAPACITY;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Initial memory image of an Intcode machine.
///
/// The VM copies the cells on construction, so one `Program` can seed any
/// number of independent machines.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Program {
    cells: Vec<i64>,
}

impl Program {
    /// Wraps raw cells as a program.
    pub fn new(cells: Vec<i64>) -> Self {
        Self { cells }
    }

    /// Parses comma-separated program text.
    ///
    /// Whitespace around tokens is ignored, as is a single trailing comma.
    /// Empty input yields an empty program.
    pub fn parse(source: &str) -> Result<Self, VMError> {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            return Ok(Self::default());
        }
        let trimmed = trimmed.strip_suffix(',').unwrap_or(trimmed);

        let cells = trimmed
            .split(',')
            .enumerate()
            .map(|(index, token)| {
                let token = token.trim();
                token.parse::<i64>().map_err(|_| VMError::MalformedProgram {
                    index,
                    token: token.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { cells })
    }

    /// Reads and parses a program file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, VMError> {
        let path_ref = path.as_ref();
        let source = fs::read_to_string(path_ref).map_err(|e| VMError::IoError {
            path: path_ref.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::parse(&source)
    }

    /// Overwrites one cell before the program is run, growing the image with
    /// zeros if `addr` lies past its end.
    ///
    /// `addr` must fall below [`DEFAULT_CAPACITY`]; use
    /// [`patch_within`](Self::patch_within) for machines configured larger.
    pub fn patch(&mut self, addr: usize, value: i64) -> Result<&mut Self, VMError> {
        self.patch_within(addr, value, DEFAULT_CAPACITY)
    }

    /// Like [`patch`](Self::patch), but bounded by an explicit capacity.
    ///
    /// Returns [`VMError::OutOfBoundsAddress`] without touching the image if
    /// `addr >= capacity`.
    pub fn patch_within(
        &mut self,
        addr: usize,
        value: i64,
        capacity: usize,
    ) -> Result<&mut Self, VMError> {
        if addr >= capacity {
            return Err(VMError::OutOfBoundsAddress {
                address: i64::try_from(addr).unwrap_or(i64::MAX),
                capacity,
            });
        }
        if addr >= self.cells.len() {
            self.cells.resize(addr + 1, 0);
        }
        self.cells[addr] = value;
        Ok(self)
    }

    pub fn cells(&self) -> &[i64] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl From<Vec<i64>> for Program {
    fn from(cells: Vec<i64>) -> Self {
        Self::new(cells)
    }
}

impl FromStr for Program {
    type Err = VMError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, cell) in self.cells.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{cell}")?;
        }
        Ok(())
    }
}
