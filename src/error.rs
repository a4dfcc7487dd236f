use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! out_of_bounds_error {
    () => {
        crate::Error::OutOfBounds
    };
}

macro_rules! schedule_defect {
    ($msg:expr) => {
        crate::Error::ScheduleDefect {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::ScheduleDefect {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! representation_defect {
    ($msg:expr) => {
        crate::Error::RepresentationDefect {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::RepresentationDefect {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Every variant aborts the compilation of the current function. None of them carry partially
/// built state: a caller receiving an error must drop the [`crate::graph::GraphModel`], the
/// emitter output and any builder state for that function, and may retry the whole function.
///
/// # Error Categories
///
/// ## Lowering Defects
/// - [`Error::ScheduleDefect`] - The incoming scheduled graph violates its contract
/// - [`Error::RepresentationDefect`] - A value cannot be coerced to the type its consumer needs
/// - [`Error::SlotsExhausted`] - A call has more operands than placement slots
/// - [`Error::PassConflict`] - A pass found another pass's block attachment still installed
///
/// ## Stack-Map Errors
/// - [`Error::BackendFailure`] - The code emitter's backend signaled failure through the stack map
/// - [`Error::Malformed`] - Corrupted or inconsistent binary or textual input
/// - [`Error::OutOfBounds`] - Attempted to read beyond the input buffer
/// - [`Error::NotSupported`] - Unsupported format version or byte order
/// - [`Error::Empty`] - Empty input provided
///
/// ## I/O and External Errors
/// - [`Error::FileError`] - Filesystem I/O errors
/// - [`Error::Error`] - Miscellaneous failures
///
/// # Examples
///
/// ```rust
/// use jitlower::{Error, stackmap::StackMaps};
///
/// match StackMaps::parse(&[]) {
///     Ok(maps) => println!("{} records", maps.records().len()),
///     Err(Error::BackendFailure(id)) => eprintln!("backend gave up at patch {}", id),
///     Err(Error::Empty) => eprintln!("no stack map section"),
///     Err(e) => eprintln!("other error: {}", e),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    // Lowering defects
    /// The scheduled graph handed to the lowering passes is malformed.
    ///
    /// Raised for unknown or never-scheduled predecessor ids, duplicate block ids, values
    /// referenced before their definition, phi arity mismatches and unresolved phi inputs at
    /// finalization. The scheduler is assumed correct, so this always points at an upstream bug.
    ///
    /// # Fields
    ///
    /// * `message` - Description of the violated property
    /// * `file` - Source file where the defect was detected
    /// * `line` - Source line where the defect was detected
    #[error("Schedule defect - {file}:{line}: {message}")]
    ScheduleDefect {
        /// The message to be printed for the defect
        message: String,
        /// The source file in which this defect was detected
        file: &'static str,
        /// The source line in which this defect was detected
        line: u32,
    },

    /// A value's emitted type does not match what its consumer expects and no sanctioned
    /// coercion exists.
    ///
    /// The sanctioned set is integer pointer to tagged, pointer to integer pointer and boolean
    /// zero-extension.
    #[error("Representation defect - {file}:{line}: {message}")]
    RepresentationDefect {
        /// The message to be printed for the defect
        message: String,
        /// The source file in which this defect was detected
        file: &'static str,
        /// The source line in which this defect was detected
        line: u32,
    },

    /// A call needs more placement slots than the calling convention provides.
    #[error("Call needs {operands} slots but only {slots} are available")]
    SlotsExhausted {
        /// Number of slots the call tried to occupy
        operands: usize,
        /// Number of slots in the bank
        slots: usize,
    },

    /// A pass tried to install its per-block attachment while another pass still owned the slot.
    #[error("Block B{0} still carries another pass's attachment")]
    PassConflict(u32),

    // Stack-map errors
    /// The backend signaled failure by emitting a patch id that is negative or does not fit a
    /// 32-bit signed value.
    ///
    /// The emitter's optimizer may legitimately produce such output under resource pressure, so
    /// this is distinct from [`Error::Malformed`].
    #[error("Backend signaled failure through patch id {0}")]
    BackendFailure(i64),

    /// The input is damaged and could not be parsed.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// This format version or byte order is not supported.
    #[error("This stack map format is not supported")]
    NotSupported,

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// File I/O error.
    ///
    /// Wraps standard I/O errors that can occur while mapping a stack-map section from disk.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}

impl Error {
    /// Returns `true` for the defect categories that abort a single function's lowering.
    #[must_use]
    pub fn is_defect(&self) -> bool {
        matches!(
            self,
            Error::ScheduleDefect { .. }
                | Error::RepresentationDefect { .. }
                | Error::SlotsExhausted { .. }
                | Error::PassConflict(_)
        )
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_defect_macros_capture_location() {
        let err = schedule_defect!("block B{} declared twice", 3);
        match &err {
            crate::Error::ScheduleDefect { message, file, .. } => {
                assert_eq!(message, "block B3 declared twice");
                assert!(file.ends_with("error.rs"));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(err.is_defect());
    }

    #[test]
    fn test_backend_failure_is_not_a_defect() {
        let err = crate::Error::BackendFailure(-1);
        assert!(!err.is_defect());
        assert_eq!(err.to_string(), "Backend signaled failure through patch id -1");

        let err = representation_defect!("float64 into tagged");
        assert!(err.is_defect());
        assert!(!malformed_error!("bad").is_defect());
    }
}
