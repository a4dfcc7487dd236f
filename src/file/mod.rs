//! Byte-level input handling for the stack-map decoder.
//!
//! The decoder only ever needs a contiguous, immutable view of the stack-map section. This module
//! abstracts where that view comes from ([`Memory`] for an owned buffer handed over by the code
//! emitter, [`Physical`] for a file mapped from disk) and provides the bounds-checked primitives
//! used to read it ([`io`], [`parser::Parser`]).

pub mod io;
mod memory;
pub mod parser;
mod physical;

pub use memory::Memory;
pub use physical::Physical;

use crate::Result;

/// A source of stack-map bytes.
///
/// Implementations are immutable after construction, so they can be shared between threads that
/// decode the sections of independently compiled functions.
pub trait Input: Send + Sync {
    /// Returns a slice of the data at the given offset and length.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the requested range is out of bounds.
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]>;

    /// Returns the entire data buffer.
    fn data(&self) -> &[u8];

    /// Returns the total length of the data buffer.
    fn len(&self) -> usize;

    /// Returns `true` if the input holds no bytes.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
