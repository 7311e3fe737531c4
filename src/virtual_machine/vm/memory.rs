use crate::virtual_machine::errors::VMError;

/// Flat cell memory of one VM.
///
/// Starts as a copy of the program and grows with zeros when a write lands
/// past the end. Reads past the end but below `capacity` see zero without
/// growing anything. Any address outside `0..capacity` is rejected.
pub(super) struct Memory {
    /// Materialised cells: the program plus everything up to the highest write.
    cells: Vec<i64>,
    /// Exclusive upper bound on addresses.
    capacity: usize,
}

impl Memory {
    /// Creates memory holding `cells`, bounded by `capacity`.
    ///
    /// Returns [`VMError::CapacityTooSmall`] if the program does not fit.
    pub(super) fn new(cells: Vec<i64>, capacity: usize) -> Result<Self, VMError> {
        if cells.len() > capacity {
            return Err(VMError::CapacityTooSmall {
                program_len: cells.len(),
                capacity,
            });
        }
        Ok(Self { cells, capacity })
    }

    /// Creates memory holding `cells` with at least `capacity` addressable cells.
    pub(super) fn with_room(cells: Vec<i64>, capacity: usize) -> Self {
        let capacity = capacity.max(cells.len());
        Self { cells, capacity }
    }

    /// Validates a resolved address and converts it to an index.
    pub(super) fn check(&self, address: i64) -> Result<usize, VMError> {
        match usize::try_from(address) {
            Ok(index) if index < self.capacity => Ok(index),
            _ => Err(VMError::OutOfBoundsAddress {
                address,
                capacity: self.capacity,
            }),
        }
    }

    /// Reads the cell at a resolved address.
    pub(super) fn read(&self, address: i64) -> Result<i64, VMError> {
        let index = self.check(address)?;
        Ok(self.cells.get(index).copied().unwrap_or(0))
    }

    /// Reads the cell at an index already known to be non-negative.
    pub(super) fn read_at(&self, index: usize) -> Result<i64, VMError> {
        if index >= self.capacity {
            return Err(VMError::OutOfBoundsAddress {
                address: index as i64,
                capacity: self.capacity,
            });
        }
        Ok(self.cells.get(index).copied().unwrap_or(0))
    }

    /// Stores `value` at an index returned by [`check`](Self::check).
    pub(super) fn write(&mut self, index: usize, value: i64) {
        debug_assert!(index < self.capacity);
        if index >= self.cells.len() {
            self.cells.resize(index + 1, 0);
        }
        self.cells[index] = value;
    }

    pub(super) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(super) fn cells(&self) -> &[i64] {
        &self.cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_program_larger_than_capacity() {
        assert!(matches!(
            Memory::new(vec![1, 2, 3], 2),
            Err(VMError::CapacityTooSmall {
                program_len: 3,
                capacity: 2
            })
        ));
    }

    #[test]
    fn with_room_never_truncates() {
        let memory = Memory::with_room(vec![1, 2, 3], 2);
        assert_eq!(memory.capacity(), 3);
        assert_eq!(memory.cells(), &[1, 2, 3]);
    }

    #[test]
    fn reads_past_program_are_zero() {
        let memory = Memory::new(vec![7], 100).unwrap();
        assert_eq!(memory.read(0).unwrap(), 7);
        assert_eq!(memory.read(50).unwrap(), 0);
        assert_eq!(memory.cells().len(), 1);
    }

    #[test]
    fn write_grows_with_zeros() {
        let mut memory = Memory::new(vec![7], 100).unwrap();
        let index = memory.check(4).unwrap();
        memory.write(index, 9);
        assert_eq!(memory.cells(), &[7, 0, 0, 0, 9]);
    }

    #[test]
    fn negative_address_out_of_bounds() {
        let memory = Memory::new(vec![], 10).unwrap();
        assert_eq!(
            memory.read(-1).unwrap_err(),
            VMError::OutOfBoundsAddress {
                address: -1,
                capacity: 10
            }
        );
    }

    #[test]
    fn capacity_is_exclusive() {
        let memory = Memory::new(vec![], 10).unwrap();
        assert!(memory.check(9).is_ok());
        assert!(matches!(
            memory.check(10),
            Err(VMError::OutOfBoundsAddress { address: 10, .. })
        ));
        assert!(memory.read_at(10).is_err());
    }
}
