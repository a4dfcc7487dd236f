//! Process-wide target tables.
//!
//! The mapping from machine representations to emission types is fixed for the process and is
//! built once, on first use. Every compilation borrows the same [`Backend`].

use std::sync::OnceLock;

use strum::EnumCount;
use tracing::debug;

use crate::{emit::EmitType, schedule::MachineRepresentation, Result};

static BACKEND: OnceLock<Backend> = OnceLock::new();

/// Immutable target description shared by all compilations.
#[derive(Debug)]
pub struct Backend {
    types: [Option<EmitType>; MachineRepresentation::COUNT],
}

impl Backend {
    /// Returns the process-wide backend, building it on the first call.
    ///
    /// Later calls, from any thread, return the same instance.
    pub fn initialize() -> &'static Backend {
        BACKEND.get_or_init(|| {
            let backend = Backend::build();
            debug!(
                representations = MachineRepresentation::COUNT,
                "backend initialized"
            );
            backend
        })
    }

    /// Returns the backend if [`Backend::initialize`] already ran.
    pub fn get() -> Option<&'static Backend> {
        BACKEND.get()
    }

    fn build() -> Self {
        let mut types = [None; MachineRepresentation::COUNT];
        let table = [
            (MachineRepresentation::Bit, EmitType::Bool),
            (MachineRepresentation::Word8, EmitType::Int8),
            (MachineRepresentation::Word16, EmitType::Int16),
            (MachineRepresentation::Word32, EmitType::Int32),
            (MachineRepresentation::Word64, EmitType::Int64),
            (MachineRepresentation::TaggedSigned, EmitType::Tagged),
            (MachineRepresentation::TaggedPointer, EmitType::Tagged),
            (MachineRepresentation::Tagged, EmitType::Tagged),
            (MachineRepresentation::Float32, EmitType::Float32),
            (MachineRepresentation::Float64, EmitType::Float64),
        ];
        for (representation, ty) in table {
            types[representation as usize] = Some(ty);
        }
        Backend { types }
    }

    /// The emission type values of `representation` are materialized as.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::RepresentationDefect`] for representations that cannot be
    /// materialized as a scalar value (`None`, `Simd128`).
    pub fn emit_type(&self, representation: MachineRepresentation) -> Result<EmitType> {
        self.types[representation as usize].ok_or_else(|| {
            let name: &'static str = representation.into();
            representation_defect!("no emission type for {}", name)
        })
    }
}
