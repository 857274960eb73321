//! # vflow
//!
//! Flow tables of OpenFlow 1.0 virtual datapaths. The heart of it is the relation classifier
//! ([model::relation::classify]) deciding whether two wildcard matches are equal, nested,
//! intersecting or disjoint, which a [table::FlowTable] uses to accept, replace, reject or
//! delete flow entries.
//!
//! ```
//! use vflow::prelude::*;
//!
//! let mut table = FlowTable::new(1, TableConfig::default());
//! let fm = FlowMod::new(FlowModCommand::Add, WildcardMatch::new().with_in_port(1))
//!     .with_actions([FlowAction::output(2)]);
//! assert!(matches!(table.apply(&fm), Ok(FlowModOutcome::Added(_))));
//! ```
pub use vflow_internal::*;
