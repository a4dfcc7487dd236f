// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(clippy::too_many_arguments)]
//#![deny(unsafe_code)]
// - 'file/physical.rs' uses mmap to map a file into memory

//! # jitlower
//!
//! The back half of a JIT's code generator. `jitlower` takes a function that an upstream
//! scheduler has already put into basic blocks, builds it in SSA form through a code emitter,
//! lowers calls to GC safepoints that relocate every live tagged value, and afterwards decodes
//! the stack-map section the emitter produced so patch sites can be located.
//!
//! ## Features
//!
//! - **Two-pass lowering** - liveness over the scheduled blocks, then incremental SSA
//!   construction that defers phi inputs from blocks not built yet
//! - **GC safepoints** - slot-based operand placement, relocation of live tagged values across
//!   calls and invokes, exception landing blocks
//! - **Patch-site bookkeeping** - every emitted safepoint, return, exception read and write
//!   barrier is recorded by patch id
//! - **Stack-map decoding** - versions 0 to 3 of the stack-map section, from memory or from a
//!   memory-mapped file
//! - **Parallel batches** - independent functions lowered on a rayon pool
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use jitlower::{compile_function, emit::LirEmitter, schedule::Schedule, Backend, LoweringConfig};
//!
//! let schedule = Schedule::from_text(
//!     "--- BLOCK B0 ---\n\
//!      1: Parameter[0, kRepTagged]\n\
//!      2: Int32Constant[0]\n\
//!      3: Return(2, 1)\n",
//! )?;
//!
//! let mut emitter = LirEmitter::new("identity");
//! let lowered = compile_function(
//!     Backend::initialize(),
//!     &schedule,
//!     &LoweringConfig::default(),
//!     &mut emitter,
//! )?;
//! println!("{}", emitter.function());
//! println!("{} patch sites", lowered.info.len());
//! # Ok::<(), jitlower::Error>(())
//! ```
//!
//! ### Decoding the stack maps
//!
//! ```rust,no_run
//! use jitlower::stackmap::{ParseOptions, StackMaps};
//!
//! let maps = StackMaps::from_file("function.stackmaps", ParseOptions::default())?;
//! let records = maps.compute_record_map();
//! println!("{records}");
//! # Ok::<(), jitlower::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`schedule`] - the visitor protocol the scheduler drives, plus a replayable [`schedule::Schedule`]
//! - [`graph`] - the block arena both passes share
//! - [`liveness`] - first pass: per-block live-in sets
//! - [`lower`] - second pass: the SSA builder and call lowering
//! - [`emit`] - the code-emission interface and the recording [`emit::LirEmitter`]
//! - [`stackmap`] - the stack-map decoder and the patch-site map
//! - [`compile`] - whole-function and batch drivers
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T>`]. Malformed schedules, inconsistent
//! representations and operand slot exhaustion abort the current function; see [`Error`].

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit- and integration-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust,no_run
/// use jitlower::prelude::*;
///
/// let schedule = Schedule::from_text("--- BLOCK B0 ---\n1: Int32Constant[0]\n2: Return(1, 1)\n")?;
/// let mut emitter = LirEmitter::new("f");
/// compile_function(Backend::initialize(), &schedule, &LoweringConfig::new(), &mut emitter)?;
/// # Ok::<(), jitlower::Error>(())
/// ```
pub mod prelude;

pub mod backend;
pub mod compile;
pub mod config;
pub mod emit;
pub mod file;
pub mod graph;
pub mod liveness;
pub mod lower;
pub mod schedule;
pub mod stackmap;
pub mod utils;

/// `jitlower` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always
/// [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `jitlower` Error type
///
/// # Examples
///
/// ```rust,no_run
/// use jitlower::{stackmap::StackMaps, Error};
///
/// match StackMaps::parse(&[]) {
///     Ok(maps) => println!("{} records", maps.records().len()),
///     Err(Error::Empty) => println!("no stack-map section"),
///     Err(Error::BackendFailure(id)) => println!("backend failed with id {id}"),
///     Err(e) => println!("Error: {}", e),
/// }
/// ```
pub use error::Error;

/// Low-level parsing of the stack-map section.
pub use file::parser::Parser;

/// The process-wide target table.
pub use backend::Backend;

/// Tunables of the lowering passes.
pub use config::LoweringConfig;

/// Whole-function drivers.
pub use compile::{compile_batch, compile_function, CompiledFunction};
