//! Intcode library.
//!
//! Provides the Intcode program format, a suspendable virtual machine, and the
//! logging helpers shared with the runner binary.

pub mod utils;
pub mod virtual_machine;
