//! Builder-side bookkeeping of emitted patch sites.
//!
//! Every patch id the builder hands out is registered here together with what the site is
//! for. After the backend has produced the stack-map section, [`StackMapInfoMap::join`] pairs each
//! decoded [`Record`] with its entry so the patch stage knows how to treat the code at the
//! record's offset.

use std::collections::BTreeMap;

use bitflags::bitflags;
use tracing::warn;

use crate::{
    stackmap::{Record, StackMaps},
    Result,
};

bitflags! {
    /// Flags operand of a safepoint.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StatepointFlags: u32 {
        /// The call is a transition between GC domains
        const GC_TRANSITION = 0x1;
        /// Deoptimization operands are live-in at the call
        const DEOPT_LIVE_IN = 0x2;
    }
}

/// Flavor of a call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    /// Safepoint call that returns into the same block
    Call,
    /// Patch point leaving the frame
    TailCall,
    /// Safepoint call with an exception edge
    Invoke,
}

/// A call site and the slots its operands were placed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallInfo {
    /// Slot of the call target followed by the slots of the stack operands
    pub locations: Vec<usize>,
    /// Flavor of the site
    pub kind: CallKind,
    /// Declared number of results
    pub return_count: u32,
}

/// A function return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReturnInfo {
    /// Whether the number of popped slots was known at compile time
    pub pop_count_is_constant: bool,
    /// Popped slots, stack parameters included; only meaningful if constant
    pub constant: i64,
}

/// The site reading the pending exception in a landing block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionInfo {
    /// Patch id of the invoke whose unwind edge leads here
    pub call_patch_id: u32,
}

/// What a patch site is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackMapInfo {
    /// A call, tail call or invoke
    Call(CallInfo),
    /// A return
    Return(ReturnInfo),
    /// An exception read
    Exception(ExceptionInfo),
    /// A write barrier stub call
    StoreBarrier,
}

/// A decoded record paired with the builder's entry for its patch id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchSite<'a> {
    /// The decoded record
    pub record: &'a Record,
    /// What the builder emitted at this site
    pub info: &'a StackMapInfo,
}

/// Entries of one function keyed by patch id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackMapInfoMap {
    map: BTreeMap<u32, StackMapInfo>,
}

impl StackMapInfoMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the site emitted with `patch_id`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ScheduleDefect`] if `patch_id` is already registered.
    pub fn insert(&mut self, patch_id: u32, info: StackMapInfo) -> Result<()> {
        if self.map.contains_key(&patch_id) {
            return Err(schedule_defect!("patch id {} registered twice", patch_id));
        }
        self.map.insert(patch_id, info);
        Ok(())
    }

    /// Entry for `patch_id`.
    #[must_use]
    pub fn get(&self, patch_id: u32) -> Option<&StackMapInfo> {
        self.map.get(&patch_id)
    }

    /// Number of registered sites.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether no site was registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Entries in ascending patch id order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &StackMapInfo)> {
        self.map.iter().map(|(id, info)| (*id, info))
    }

    /// Pairs every record of `maps` with its entry.
    ///
    /// Sites without a record are allowed (the backend drops unreachable code) and are only
    /// logged.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if a record names a patch id that was never registered.
    pub fn join<'a>(&'a self, maps: &'a StackMaps) -> Result<Vec<PatchSite<'a>>> {
        let mut sites = Vec::with_capacity(maps.records().len());
        for record in maps.records() {
            let info = self.get(record.patch_id).ok_or_else(|| {
                malformed_error!("record for unregistered patch id {}", record.patch_id)
            })?;
            sites.push(PatchSite { record, info });
        }

        if sites.len() < self.map.len() {
            warn!(
                registered = self.map.len(),
                recorded = sites.len(),
                "some patch sites have no stack map record"
            );
        }
        Ok(sites)
    }
}
