//! Bounds-checked little-endian reads of primitive values.
//!
//! The stack-map section is a flat little-endian byte buffer. Everything in this module reads
//! one primitive at an offset and advances that offset, failing with
//! [`crate::Error::OutOfBounds`] instead of panicking when the buffer is too short.
//!
//! # Key Components
//!
//! - [`crate::file::io::ByteIO`] - Conversion between primitive values and their byte arrays
//! - [`crate::file::io::read_le_at`] - Read at an offset and advance
//!
//! # Examples
//!
//! ```rust,ignore
//! use jitlower::file::io::read_le_at;
//!
//! let data = [0x07, 0x00, 0x00, 0x00, 0x28, 0x00];
//! let mut offset = 0;
//! let id: u32 = read_le_at(&data, &mut offset)?;
//! let flags: u16 = read_le_at(&data, &mut offset)?;
//! assert_eq!((id, flags, offset), (7, 40, 6));
//! # Ok::<(), jitlower::Error>(())
//! ```

use crate::{Error::OutOfBounds, Result};

/// Trait for primitive values that can be decoded from a fixed-size byte array.
///
/// Implemented for all fixed-width integers and floats. `usize`/`isize` are deliberately not
/// covered: stack-map fields have an explicit width that never depends on the host.
pub trait ByteIO: Sized {
    /// Associated type representing the byte array type for this numeric type.
    type Bytes: Sized + for<'a> TryFrom<&'a [u8]>;

    /// Read T from a byte buffer in little-endian
    fn from_le_bytes(bytes: Self::Bytes) -> Self;
}

macro_rules! impl_byte_io {
    ($($ty:ty),*) => {
        $(
            impl ByteIO for $ty {
                type Bytes = [u8; std::mem::size_of::<$ty>()];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }
            }
        )*
    };
}

impl_byte_io!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

/// Reads a value of type `T` in little-endian byte order at `offset` and advances the offset.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if fewer than `size_of::<T>()` bytes remain.
pub fn read_le_at<T: ByteIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let bytes = take::<T>(data, offset)?;
    Ok(T::from_le_bytes(bytes))
}

/// Reads a value of type `T` from the start of `data` in little-endian byte order.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if `data` is shorter than `T`.
pub fn read_le<T: ByteIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_le_at(data, &mut offset)
}

fn take<T: ByteIO>(data: &[u8], offset: &mut usize) -> Result<T::Bytes> {
    let type_len = std::mem::size_of::<T>();
    let Some(end) = offset.checked_add(type_len) else {
        return Err(OutOfBounds);
    };
    if end > data.len() {
        return Err(OutOfBounds);
    }

    let Ok(read) = data[*offset..end].try_into() else {
        return Err(OutOfBounds);
    };

    *offset = end;
    Ok(read)
}
