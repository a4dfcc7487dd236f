//! Memory-mapped access to a stack-map section dumped to disk.
//!
//! Code emitters typically hand the stack-map section over in memory, but dumps written for
//! offline inspection can get large when a module contains many functions. [`Physical`] maps such
//! a dump read-only instead of reading it into a buffer.

use super::Input;
use crate::{
    Error::{Error, FileError, OutOfBounds},
    Result,
};

use memmap2::Mmap;
use std::{fs, path::Path};

/// An input backed by a read-only memory mapping of a file.
///
/// # Examples
///
/// ```rust,ignore
/// use jitlower::file::{Input, Physical};
///
/// let section = Physical::new("out/llvm_stackmaps.bin")?;
/// let version = section.data_slice(0, 1)?[0];
/// println!("stack map version {}", version);
/// # Ok::<(), jitlower::Error>(())
/// ```
#[derive(Debug)]
pub struct Physical {
    /// Memory-mapped file data
    data: Mmap,
}

impl Physical {
    /// Map the file at `path` into memory.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be opened or
    /// [`crate::Error::Error`] if memory mapping fails.
    pub fn new(path: impl AsRef<Path>) -> Result<Physical> {
        let file = match fs::File::open(path) {
            Ok(file) => file,
            Err(error) => return Err(FileError(error)),
        };

        // The mapping is private to this process and never written through.
        let mmap = match unsafe { Mmap::map(&file) } {
            Ok(mmap) => mmap,
            Err(error) => return Err(Error(error.to_string())),
        };

        Ok(Physical { data: mmap })
    }
}

impl Input for Physical {
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
        self.data.as_ref()
    }

    fn len(&self) -> usize {
        self.data.len()
    }
}
