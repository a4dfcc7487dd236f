use super::Input;
use crate::{Error::OutOfBounds, Result};

/// Stack-map section held in an owned buffer
#[derive(Debug)]
pub struct Memory {
    data: Vec<u8>,
}

impl Memory {
    /// Create a new memory input
    ///
    /// ## Arguments
    /// * 'data' - The data buffer to consume
    #[must_use]
    pub fn new(data: Vec<u8>) -> Memory {
        Memory { data }
    }
}

impl Input for Memory {
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let Some(offset_end) = offset.checked_add(len) else {
            return Err(OutOfBounds);
        };

        if offset_end > self.data.len() {
            return Err(OutOfBounds);
        }

        Ok(&self.data[offset..offset_end])
    }

    fn data(&self) -> &[u8] {
        self.data.as_slice()
    }

    fn len(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_slices() {
        let mut data = vec![0xCC_u8; 72];
        data[16..20].copy_from_slice(&[0, 0, 0, 0]);
        let memory = Memory::new(data);

        assert_eq!(memory.len(), 72);
        assert_eq!(memory.data_slice(16, 4).unwrap(), &[0, 0, 0, 0]);
        assert!(memory.data_slice(70, 4).is_err());
        assert!(matches!(
            memory.data_slice(usize::MAX, 1).unwrap_err(),
            OutOfBounds
        ));
    }

    #[test]
    fn test_memory_empty_buffer() {
        let memory = Memory::new(vec![]);

        assert_eq!(memory.len(), 0);
        assert!(memory.data_slice(0, 1).is_err());
        let empty_slice: &[u8] = &[];
        assert_eq!(memory.data_slice(0, 0).unwrap(), empty_slice);
    }
}
