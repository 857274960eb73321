//! This module provides the virtual flow table of a datapath and the registry of tables.
//!
//! A [FlowTable] decides the fate of every flow-mod with the relation classifier of
//! [vflow_core::relation]: accept, replace in place, reject as overlapping, coexist or delete.
mod registry;
mod table;

use vflow_core::entry::FlowMod;

pub use {
    registry::{FlowTables, SharedFlowTable},
    table::{FlowModOutcome, FlowTable, RemovalReason, RemovedFlow, TableConfig},
};

/// Errors a table reports back for a rejected flow-mod or lookup.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("flow overlaps an existing entry at priority {priority}")]
    Overlap { priority: u16 },
    #[error("flow table is full ({0} entries)")]
    TableFull(usize),
    #[error("emergency flow with a non-zero timeout")]
    BadEmergencyTimeout,
    #[error("no flow table for datapath {0:#018x}")]
    InvalidDpid(u64),
    #[error("invalid controller state: {0}")]
    ControllerState(String),
    #[error("no such flow entry")]
    UnknownEntry,
}

// FlowStore is the flow storage of a single datapath.
pub trait FlowStore {
    // Required methods
    fn clear(&mut self);

    fn apply(&mut self, fm: &FlowMod) -> Result<FlowModOutcome, TableError>;

    // Provided methods
    /// Applies the requests in order; a rejected request does not stop the following ones.
    fn apply_all<'f>(
        &mut self,
        fms: impl IntoIterator<Item = &'f FlowMod>,
    ) -> Vec<Result<FlowModOutcome, TableError>> {
        fms.into_iter().map(|fm| self.apply(fm)).collect()
    }
}

#[allow(missing_docs)]
pub mod prelude {
    #[doc(hidden)]
    pub use crate::{
        FlowModOutcome, FlowStore, FlowTable, FlowTables, RemovalReason, RemovedFlow,
        SharedFlowTable, TableConfig, TableError,
    };
}
