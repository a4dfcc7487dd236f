//! Driving both passes over whole functions.
//!
//! [`compile_function`] runs liveness and then the builder over one schedule. Every call owns
//! its graph and patch-id counter, so independent functions can be lowered in parallel;
//! [`compile_batch`] does that with rayon, recording each function with its own
//! [`LirEmitter`].

use rayon::prelude::*;
use tracing::debug;

use crate::{
    backend::Backend,
    config::LoweringConfig,
    emit::{Emitter, LirEmitter, LirFunction},
    graph::GraphModel,
    liveness::LivenessAnalysis,
    lower::{LoweredFunction, SsaBuilder},
    schedule::Schedule,
    Result,
};

/// Lowers `schedule` into `emitter`.
///
/// # Errors
///
/// Returns the first defect raised by either pass. The emitter's contents are unspecified
/// afterwards and should be discarded.
pub fn compile_function(
    backend: &Backend,
    schedule: &Schedule,
    config: &LoweringConfig,
    emitter: &mut dyn Emitter,
) -> Result<LoweredFunction> {
    let mut graph = GraphModel::new();

    let mut liveness = LivenessAnalysis::new(&mut graph);
    schedule.replay(&mut liveness)?;
    liveness.finish()?;

    let mut builder = SsaBuilder::new(backend, config, &mut graph, emitter)?;
    schedule.replay(&mut builder)?;
    builder.finish()
}

/// A function lowered by [`compile_batch`].
#[derive(Debug)]
pub struct CompiledFunction {
    /// The recorded code
    pub function: LirFunction,
    /// Patch-site bookkeeping
    pub lowered: LoweredFunction,
}

/// Lowers independent `(name, schedule)` pairs in parallel.
///
/// Results are returned in input order; a failing function does not affect the others.
pub fn compile_batch(
    backend: &Backend,
    config: &LoweringConfig,
    functions: &[(String, Schedule)],
) -> Vec<Result<CompiledFunction>> {
    let results: Vec<_> = functions
        .par_iter()
        .map(|(name, schedule)| {
            let mut emitter = LirEmitter::new(name);
            let lowered = compile_function(backend, schedule, config, &mut emitter)?;
            Ok(CompiledFunction {
                function: emitter.into_function(),
                lowered,
            })
        })
        .collect();

    let failed = results.iter().filter(|result| result.is_err()).count();
    debug!(functions = functions.len(), failed, "compiled batch");
    results
}
