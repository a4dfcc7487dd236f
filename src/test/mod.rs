//! Shared helpers for unit tests.
//!
//! - [`helpers`] builds instructions and ids with less ceremony
//! - [`stackmaps`] assembles stack-map sections byte by byte

mod helpers;
mod stackmaps;

pub use helpers::*;
pub use stackmaps::StackMapBuilder;
