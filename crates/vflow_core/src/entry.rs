//! # Flow entry
//!
//! A [FlowEntry] is one row of a virtual flow table. It is seeded from an accepted [FlowMod]
//! and afterwards only mutated by the table that owns it.
//!
//! ## Identity and order
//! - Two entries are equal when their actions, datapath id, priority and match are equal.
//!   Cookie, timeouts, statistics and sequence number are bookkeeping and do not take part.
//! - Inside a table, entries are ordered by [EntryKey]: higher priority first, then by the
//!   sequence number. Every entry draws a fresh sequence number when it is built, so two
//!   entries never share a key by accident; a table renumbers its entries at insertion.
//!
//! ```
//! use vflow_core::entry::{FlowEntry, FlowMod, FlowModCommand};
//! use vflow_core::r#match::WildcardMatch;
//!
//! let fm = FlowMod::new(FlowModCommand::Add, WildcardMatch::new().with_in_port(1))
//!     .with_priority(10);
//! let mut low = FlowEntry::new(&fm, 1);
//! let mut high = FlowEntry::new(&fm.clone().with_priority(20), 1);
//! low.set_sequence(0);
//! high.set_sequence(1);
//! assert!(high.sort_key() < low.sort_key());
//! ```

use std::{
    cmp::Ordering,
    fmt::{Display, Formatter},
    hash::{Hash, Hasher},
    sync::atomic::{self, AtomicU64},
    time::Duration,
};

use bitflags::bitflags;

use crate::{
    action::{port::OFPP_NONE, DisplayActions, FlowAction},
    r#match::WildcardMatch,
    relation::{classify, Relation},
};

pub const OFP_DEFAULT_PRIORITY: u16 = 0x8000;

// source of the sequence numbers of newly built entries
static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(0);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FlowModCommand {
    Add = 0,
    Modify = 1,
    ModifyStrict = 2,
    Delete = 3,
    DeleteStrict = 4,
}

impl FlowModCommand {
    /// Strict commands require an exact match and priority instead of containment.
    #[inline]
    pub fn is_strict(self) -> bool {
        matches!(self, FlowModCommand::ModifyStrict | FlowModCommand::DeleteStrict)
    }

    pub fn from_name(name: &str) -> Option<FlowModCommand> {
        match name {
            "add" => Some(FlowModCommand::Add),
            "modify" => Some(FlowModCommand::Modify),
            "modify_strict" => Some(FlowModCommand::ModifyStrict),
            "delete" => Some(FlowModCommand::Delete),
            "delete_strict" => Some(FlowModCommand::DeleteStrict),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FlowModCommand::Add => "add",
            FlowModCommand::Modify => "modify",
            FlowModCommand::ModifyStrict => "modify_strict",
            FlowModCommand::Delete => "delete",
            FlowModCommand::DeleteStrict => "delete_strict",
        }
    }
}

impl Display for FlowModCommand {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

bitflags! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct FlowModFlags: u16 {
        const SEND_FLOW_REM = 1 << 0;
        const CHECK_OVERLAP = 1 << 1;
        const EMERG = 1 << 2;
    }
}

/// A decoded flow-modification request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowMod {
    pub command: FlowModCommand,
    pub rule_match: WildcardMatch,
    pub cookie: u64,
    pub idle_timeout: u16,
    pub hard_timeout: u16,
    pub priority: u16,
    /// Only meaningful for delete commands; [OFPP_NONE] disables the filter.
    pub out_port: u16,
    pub flags: FlowModFlags,
    pub actions: Vec<FlowAction>,
}

impl FlowMod {
    pub fn new(command: FlowModCommand, rule_match: WildcardMatch) -> Self {
        FlowMod {
            command,
            rule_match,
            cookie: 0,
            idle_timeout: 0,
            hard_timeout: 0,
            priority: OFP_DEFAULT_PRIORITY,
            out_port: OFPP_NONE,
            flags: FlowModFlags::empty(),
            actions: vec![],
        }
    }

    pub fn with_priority(mut self, priority: u16) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_cookie(mut self, cookie: u64) -> Self {
        self.cookie = cookie;
        self
    }

    pub fn with_timeouts(mut self, idle_timeout: u16, hard_timeout: u16) -> Self {
        self.idle_timeout = idle_timeout;
        self.hard_timeout = hard_timeout;
        self
    }

    pub fn with_out_port(mut self, out_port: u16) -> Self {
        self.out_port = out_port;
        self
    }

    pub fn with_flags(mut self, flags: FlowModFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_actions(mut self, actions: impl IntoIterator<Item = FlowAction>) -> Self {
        self.actions = actions.into_iter().collect();
        self
    }
}

/// Counters of an installed entry.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FlowStats {
    pub duration_sec: u32,
    pub duration_nsec: u32,
    pub packet_count: u64,
    pub byte_count: u64,
}

impl FlowStats {
    #[inline]
    pub fn duration(&self) -> Duration {
        Duration::new(u64::from(self.duration_sec), self.duration_nsec)
    }

    /// Adds `elapsed` to the installed duration, saturating at `u32::MAX` seconds.
    pub fn advance(&mut self, elapsed: Duration) {
        let total = self.duration().saturating_add(elapsed);
        match u32::try_from(total.as_secs()) {
            Ok(secs) => {
                self.duration_sec = secs;
                self.duration_nsec = total.subsec_nanos();
            }
            Err(_) => {
                self.duration_sec = u32::MAX;
                self.duration_nsec = 0;
            }
        }
    }
}

/// Position of an entry in a table: descending priority, then ascending sequence number.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct EntryKey {
    pub priority: u16,
    pub sequence: u64,
}

impl Ord for EntryKey {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| self.sequence.cmp(&other.sequence))
    }
}

impl PartialOrd for EntryKey {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for EntryKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.priority, self.sequence)
    }
}

/// One row of a virtual flow table.
#[derive(Clone, Debug)]
pub struct FlowEntry {
    dpid: u64,
    rule_match: WildcardMatch,
    actions: Vec<FlowAction>,
    priority: u16,
    out_port: u16,
    idle_timeout: u16,
    hard_timeout: u16,
    cookie: u64,
    flags: FlowModFlags,
    stats: FlowStats,
    sequence: u64,
}

impl FlowEntry {
    /// Builds an entry from an accepted request; statistics start at zero and the sequence
    /// number is unique within the process.
    pub fn new(fm: &FlowMod, dpid: u64) -> Self {
        FlowEntry {
            dpid,
            rule_match: fm.rule_match,
            actions: fm.actions.clone(),
            priority: fm.priority,
            out_port: fm.out_port,
            idle_timeout: fm.idle_timeout,
            hard_timeout: fm.hard_timeout,
            cookie: fm.cookie,
            flags: fm.flags,
            stats: FlowStats::default(),
            sequence: NEXT_SEQUENCE.fetch_add(1, atomic::Ordering::Relaxed),
        }
    }

    /// Relation of this entry's match to `other`.
    #[inline]
    pub fn compare(&self, other: &WildcardMatch, strict: bool) -> Relation {
        classify(&self.rule_match, other, strict)
    }

    /// Reseeds the entry from a request that replaces it. The sequence number is kept.
    pub fn replace_with(&mut self, fm: &FlowMod) -> &mut Self {
        let sequence = self.sequence;
        *self = FlowEntry::new(fm, self.dpid);
        self.sequence = sequence;
        self
    }

    #[inline]
    pub fn rule_match(&self) -> &WildcardMatch {
        &self.rule_match
    }

    #[inline]
    pub fn set_match(&mut self, rule_match: WildcardMatch) -> &mut Self {
        self.rule_match = rule_match;
        self
    }

    #[inline]
    pub fn dpid(&self) -> u64 {
        self.dpid
    }

    #[inline]
    pub fn set_dpid(&mut self, dpid: u64) -> &mut Self {
        self.dpid = dpid;
        self
    }

    #[inline]
    pub fn out_port(&self) -> u16 {
        self.out_port
    }

    #[inline]
    pub fn set_out_port(&mut self, out_port: u16) -> &mut Self {
        self.out_port = out_port;
        self
    }

    #[inline]
    pub fn priority(&self) -> u16 {
        self.priority
    }

    /// Changes the [EntryKey] of the entry. Containers keyed by the old key are not updated.
    #[inline]
    pub fn set_priority(&mut self, priority: u16) -> &mut Self {
        self.priority = priority;
        self
    }

    #[inline]
    pub fn cookie(&self) -> u64 {
        self.cookie
    }

    #[inline]
    pub fn set_cookie(&mut self, cookie: u64) -> &mut Self {
        self.cookie = cookie;
        self
    }

    #[inline]
    pub fn actions(&self) -> &[FlowAction] {
        &self.actions
    }

    #[inline]
    pub fn set_actions(&mut self, actions: Vec<FlowAction>) -> &mut Self {
        self.actions = actions;
        self
    }

    #[inline]
    pub fn idle_timeout(&self) -> u16 {
        self.idle_timeout
    }

    #[inline]
    pub fn hard_timeout(&self) -> u16 {
        self.hard_timeout
    }

    #[inline]
    pub fn flags(&self) -> FlowModFlags {
        self.flags
    }

    #[inline]
    pub fn stats(&self) -> &FlowStats {
        &self.stats
    }

    #[inline]
    pub fn stats_mut(&mut self) -> &mut FlowStats {
        &mut self.stats
    }

    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    #[inline]
    pub fn set_sequence(&mut self, sequence: u64) -> &mut Self {
        self.sequence = sequence;
        self
    }

    #[inline]
    pub fn sort_key(&self) -> EntryKey {
        EntryKey {
            priority: self.priority,
            sequence: self.sequence,
        }
    }

    /// Table order of two entries, see [EntryKey].
    #[inline]
    pub fn table_order(a: &FlowEntry, b: &FlowEntry) -> Ordering {
        a.sort_key().cmp(&b.sort_key())
    }

    /// True when one of the actions sends packets to `port`.
    pub fn outputs_to(&self, port: u16) -> bool {
        self.actions.iter().any(|a| a.out_port() == Some(port))
    }
}

impl PartialEq for FlowEntry {
    fn eq(&self, other: &Self) -> bool {
        self.actions == other.actions
            && self.dpid == other.dpid
            && self.priority == other.priority
            && self.rule_match == other.rule_match
    }
}

impl Eq for FlowEntry {}

impl Hash for FlowEntry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.actions.hash(state);
        self.dpid.hash(state);
        self.priority.hash(state);
        self.rule_match.hash(state);
    }
}

impl Display for FlowEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "FlowEntry {{ dpid: {:#018x}, priority: {}, out_port: {}, duration: {}.{:09}s, \
             timeout(hard/idle): {}/{}, cookie: {:#x}, packets: {}, bytes: {}, match: {}, \
             actions: {} }}",
            self.dpid,
            self.priority,
            self.out_port,
            self.stats.duration_sec,
            self.stats.duration_nsec,
            self.hard_timeout,
            self.idle_timeout,
            self.cookie,
            self.stats.packet_count,
            self.stats.byte_count,
            self.rule_match,
            DisplayActions(&self.actions),
        )
    }
}
