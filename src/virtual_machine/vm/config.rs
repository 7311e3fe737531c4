/// Default upper bound on addressable cells.
///
/// Memory materialises every cell up to the highest address written, so the
/// cost grows with that address rather than with the number of cells used.
pub const DEFAULT_CAPACITY: usize = 1 << 24;

/// Construction-time settings for a [`VM`](super::VM).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct VmConfig {
    /// Exclusive upper bound on memory addresses.
    pub capacity: usize,
    /// Log every executed instruction at trace level.
    pub trace: bool,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            trace: false,
        }
    }
}

impl VmConfig {
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }
}
