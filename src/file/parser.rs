//! Cursor-based binary reader used by the stack-map decoder.
//!
//! [`crate::file::parser::Parser`] keeps a position into a borrowed byte slice and offers
//! bounds-checked primitive reads plus the alignment step the stack-map format needs between a
//! record's locations and its live-outs.
//!
//! # Examples
//!
//! ```rust
//! use jitlower::Parser;
//!
//! let data = [0x03, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x2A];
//! let mut parser = Parser::new(&data);
//!
//! let version = parser.read_le::<u8>()?;
//! parser.align(4)?;
//! let count = parser.read_le::<u32>()?;
//! assert_eq!((version, count), (3, 1));
//! assert_eq!(parser.pos(), 8);
//! # Ok::<(), jitlower::Error>(())
//! ```

use crate::{
    file::io::{read_le_at, ByteIO},
    Result,
};

/// A bounds-checked cursor over a byte slice.
///
/// Reads never panic; running past the end yields [`crate::Error::OutOfBounds`] and leaves the
/// position unchanged.
pub struct Parser<'a> {
    /// The binary data being parsed
    data: &'a [u8],
    /// Current position within the data buffer
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new [`crate::file::parser::Parser`] from a byte slice.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use jitlower::Parser;
    /// let data = [0x01, 0x02, 0x03, 0x04];
    /// let parser = Parser::new(&data);
    /// assert_eq!(parser.len(), 4);
    /// ```
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Returns the length of the underlying data buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the parser has no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of bytes between the cursor and the end of the buffer.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Move the position forward by the specified number of bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if advancing by step would exceed the data length.
    pub fn advance_by(&mut self, step: usize) -> Result<()> {
        match self.position.checked_add(step) {
            Some(end) if end <= self.data.len() => {
                self.position = end;
                Ok(())
            }
            _ => Err(out_of_bounds_error!()),
        }
    }

    /// Get the current position of the parser within the data buffer.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Get access to the underlying data buffer.
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Align the position to a specific boundary.
    ///
    /// # Arguments
    /// * `alignment` - The boundary to align to (must be a power of 2)
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if aligning would exceed the data length.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use jitlower::Parser;
    /// let data = [0u8; 16];
    /// let mut parser = Parser::new(&data);
    ///
    /// parser.advance_by(12)?;
    /// parser.align(8)?;
    /// assert_eq!(parser.pos(), 16);
    /// # Ok::<(), jitlower::Error>(())
    /// ```
    pub fn align(&mut self, alignment: usize) -> Result<()> {
        debug_assert!(alignment.is_power_of_two());
        let padding = (alignment - (self.position % alignment)) % alignment;
        self.advance_by(padding)
    }

    /// Read a type `T` from the current position in little-endian format and advance the position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading would exceed the data length.
    pub fn read_le<T: ByteIO>(&mut self) -> Result<T> {
        read_le_at::<T>(self.data, &mut self.position)
    }

    /// Read an unsigned value whose width is chosen at runtime (4 or 8 bytes), widened to `u64`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading would exceed the data length, or
    /// [`crate::Error::NotSupported`] for any other width.
    pub fn read_le_sized(&mut self, width: usize) -> Result<u64> {
        match width {
            4 => Ok(u64::from(self.read_le::<u32>()?)),
            8 => self.read_le::<u64>(),
            _ => Err(crate::Error::NotSupported),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_reads() {
        let data = [0x01, 0x00, 0x02, 0x00, 0x00, 0x00, 0xF0, 0xFF, 0xFF, 0xFF];
        let mut parser = Parser::new(&data);

        assert_eq!(parser.read_le::<u16>().unwrap(), 1);
        assert_eq!(parser.read_le::<u32>().unwrap(), 2);
        assert_eq!(parser.read_le::<i32>().unwrap(), -16);
        assert_eq!(parser.remaining(), 0);
    }

    #[test]
    fn test_align_is_noop_when_aligned() {
        let data = [0u8; 16];
        let mut parser = Parser::new(&data);
        parser.advance_by(8).unwrap();
        parser.align(8).unwrap();
        assert_eq!(parser.pos(), 8);

        parser.advance_by(2).unwrap();
        parser.align(8).unwrap();
        assert_eq!(parser.pos(), 16);
    }

    #[test]
    fn test_align_past_end_fails() {
        let data = [0u8; 10];
        let mut parser = Parser::new(&data);
        parser.advance_by(9).unwrap();
        assert!(parser.align(8).is_err());
        assert_eq!(parser.pos(), 9);
    }

    #[test]
    fn test_advance_bounds() {
        let data = [0u8; 4];
        let mut parser = Parser::new(&data);
        assert!(parser.advance_by(4).is_ok());
        assert!(parser.read_le::<u8>().is_err());
        assert!(parser.advance_by(1).is_err());
        assert!(parser.advance_by(usize::MAX).is_err());
        assert_eq!(parser.pos(), 4);
    }

    #[test]
    fn test_read_le_sized() {
        let data = [0x40, 0, 0, 0, 0x40, 0, 0, 0, 0, 0, 0, 0];
        let mut parser = Parser::new(&data);
        assert_eq!(parser.read_le_sized(4).unwrap(), 64);
        assert_eq!(parser.read_le_sized(8).unwrap(), 64);
        assert!(parser.read_le_sized(2).is_err());
    }
}
