//! Building the function from the schedule.
//!
//! The [`SsaBuilder`] is the second pass over a schedule. It walks the blocks in scheduler
//! order, keeps for each block the map from scheduler values to emitted values, and drives an
//! [`crate::emit::Emitter`]:
//!
//! - a block with one predecessor inherits the predecessor's values, or, if the predecessor
//!   ended in a call, the values relocated by the call's safepoint;
//! - a block with several predecessors gets a phi per live-in value. Inputs from predecessors
//!   that are not built yet stay pending and are filled in by [`SsaBuilder::finish`];
//! - calls go through the slot-based operand placement of `call` and emit safepoints whose
//!   patch ids are recorded in a [`crate::stackmap::info::StackMapInfoMap`].
//!
//! # Example
//!
//! ```rust,no_run
//! use jitlower::{
//!     emit::LirEmitter, liveness::LivenessAnalysis, lower::SsaBuilder, schedule::Schedule,
//!     Backend, LoweringConfig,
//! };
//!
//! let schedule = Schedule::from_text(
//!     "--- BLOCK B0 ---\n1: Parameter[0, kRepTagged]\n2: Int32Constant[0]\n3: Return(2, 1)\n",
//! )?;
//! let config = LoweringConfig::new();
//!
//! let mut graph = jitlower::graph::GraphModel::new();
//! let mut liveness = LivenessAnalysis::new(&mut graph);
//! schedule.replay(&mut liveness)?;
//! liveness.finish()?;
//!
//! let mut emitter = LirEmitter::new("example");
//! let mut builder = SsaBuilder::new(Backend::initialize(), &config, &mut graph, &mut emitter)?;
//! schedule.replay(&mut builder)?;
//! let lowered = builder.finish()?;
//! assert_eq!(lowered.info.len(), 1);
//! # Ok::<(), jitlower::Error>(())
//! ```

mod builder;
mod call;
mod coerce;
mod constants;
mod ops;
mod state;

pub use builder::{LoweredFunction, SsaBuilder};
pub use constants::{
    ConstantKind, ConstantRecorder, ISOLATE_EXTERNAL_REFERENCE_MAGIC, RECORD_STUB_CODE_MAGIC,
};
pub use state::{BuilderState, PhiInput, PhiPlaceholder, Relocation};
