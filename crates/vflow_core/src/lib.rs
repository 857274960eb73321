//! This module provides OpenFlow 1.0 matches, the relation classifier between them, and the
//! flow entries and statistics bodies built on top.
pub mod action;
pub mod entry;
pub mod r#match;
pub mod relation;
pub mod stats;

pub use crate::r#match::MatchError;

#[allow(missing_docs)]
pub mod prelude {
    #[doc(hidden)]
    pub use crate::{
        action::{port, DisplayActions, FlowAction},
        entry::{EntryKey, FlowEntry, FlowMod, FlowModCommand, FlowModFlags, FlowStats},
        r#match::{
            field::{constant, Field, FieldSet},
            mac::MacAddr,
            MatchError, WildcardMatch, Wildcards,
        },
        relation::{classify, Relation},
        stats::{StatsBody, StatsDirection, StatsType},
    };
}
