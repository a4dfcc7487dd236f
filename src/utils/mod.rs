//! Small data structures shared by the passes.

pub mod bitset;

pub use bitset::BitSet;
