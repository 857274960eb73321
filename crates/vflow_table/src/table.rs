use std::time::Duration;

use fxhash::{FxBuildHasher, FxHashMap};
use indexmap::IndexMap;
use tracing::{debug, info, warn};

use vflow_core::{
    action::port::OFPP_NONE,
    entry::{EntryKey, FlowEntry, FlowMod, FlowModCommand, FlowModFlags},
    r#match::{WildcardMatch, Wildcards},
    relation::Relation,
    stats::{AggregateStatsReply, FlowStatsReply, TableStats},
};

use crate::{FlowStore, TableError};

/// Limits and policies of a flow table.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TableConfig {
    pub max_entries: usize,
    /// Treat every add as if it carried the check-overlap flag.
    pub always_check_overlap: bool,
    pub emergency_max_entries: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        TableConfig {
            max_entries: 1024,
            always_check_overlap: false,
            emergency_max_entries: 64,
        }
    }
}

impl TableConfig {
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    pub fn with_always_check_overlap(mut self, always_check_overlap: bool) -> Self {
        self.always_check_overlap = always_check_overlap;
        self
    }

    pub fn with_emergency_max_entries(mut self, emergency_max_entries: usize) -> Self {
        self.emergency_max_entries = emergency_max_entries;
        self
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RemovalReason {
    IdleTimeout,
    HardTimeout,
    Delete,
}

/// An entry evicted from a table and why.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemovedFlow {
    pub entry: FlowEntry,
    pub reason: RemovalReason,
}

impl RemovedFlow {
    /// The controller asked to be told about this removal.
    #[inline]
    pub fn notify(&self) -> bool {
        self.entry.flags().contains(FlowModFlags::SEND_FLOW_REM)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlowModOutcome {
    Added(EntryKey),
    /// An entry with the same priority and match was reseeded from the request.
    Replaced(EntryKey),
    Modified(usize),
    Deleted(Vec<RemovedFlow>),
}

type EntryMap = IndexMap<EntryKey, FlowEntry, FxBuildHasher>;

/// Flow table of one virtual datapath.
///
/// Entries are kept in table order (see [EntryKey]), so iteration visits them the way a lookup
/// would try them. Emergency entries live in a separate table of their own.
#[derive(Debug)]
pub struct FlowTable {
    dpid: u64,
    config: TableConfig,
    entries: EntryMap,
    emergency: EntryMap,
    // installed duration of an entry at its last packet count increase
    last_hit: FxHashMap<EntryKey, Duration>,
    next_sequence: u64,
}

impl FlowTable {
    pub fn new(dpid: u64, config: TableConfig) -> Self {
        FlowTable {
            dpid,
            config,
            entries: IndexMap::with_hasher(FxBuildHasher::default()),
            emergency: IndexMap::with_hasher(FxBuildHasher::default()),
            last_hit: FxHashMap::default(),
            next_sequence: 0,
        }
    }

    #[inline]
    pub fn dpid(&self) -> u64 {
        self.dpid
    }

    #[inline]
    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in table order.
    pub fn iter(&self) -> impl Iterator<Item = &FlowEntry> {
        self.entries.values()
    }

    pub fn emergency_entries(&self) -> impl Iterator<Item = &FlowEntry> {
        self.emergency.values()
    }

    pub fn get(&self, key: &EntryKey) -> Option<&FlowEntry> {
        self.entries.get(key)
    }

    pub fn find_by_cookie(&self, cookie: u64) -> impl Iterator<Item = &FlowEntry> {
        self.entries.values().filter(move |e| e.cookie() == cookie)
    }

    /// Relation of every entry's match to `m`, in table order.
    pub fn classify(&self, m: &WildcardMatch, strict: bool) -> Vec<(EntryKey, Relation)> {
        self.entries
            .iter()
            .map(|(key, entry)| (*key, entry.compare(m, strict)))
            .collect()
    }

    #[inline]
    fn table_mut(&mut self, emergency: bool) -> &mut EntryMap {
        if emergency {
            &mut self.emergency
        } else {
            &mut self.entries
        }
    }

    /// Entries a modify or delete request applies to: contained in the request's match, or for
    /// strict commands, the same priority and the same match.
    fn selects(entry: &FlowEntry, fm: &FlowMod) -> bool {
        if fm.command.is_strict() {
            entry.priority() == fm.priority
                && entry.compare(&fm.rule_match, true) == Relation::Equal
        } else {
            entry.compare(&fm.rule_match, false) == Relation::Equal
        }
    }

    #[inline]
    fn outputs_to(entry: &FlowEntry, out_port: u16) -> bool {
        out_port == OFPP_NONE || entry.outputs_to(out_port)
    }

    fn add(&mut self, fm: &FlowMod) -> Result<FlowModOutcome, TableError> {
        let emergency = fm.flags.contains(FlowModFlags::EMERG);
        if emergency && (fm.idle_timeout != 0 || fm.hard_timeout != 0) {
            warn!(dpid = self.dpid, "emergency flow with timeouts rejected");
            return Err(TableError::BadEmergencyTimeout);
        }
        let check_overlap =
            self.config.always_check_overlap || fm.flags.contains(FlowModFlags::CHECK_OVERLAP);
        let capacity = if emergency {
            self.config.emergency_max_entries
        } else {
            self.config.max_entries
        };
        let dpid = self.dpid;
        let entries = if emergency {
            &mut self.emergency
        } else {
            &mut self.entries
        };

        let mut identical = None;
        for (key, entry) in entries.iter().filter(|(k, _)| k.priority == fm.priority) {
            match entry.compare(&fm.rule_match, true) {
                Relation::Disjoint => {}
                _ if check_overlap => {
                    warn!(dpid, %key, rule_match = %fm.rule_match, "flow overlaps, rejected");
                    return Err(TableError::Overlap {
                        priority: fm.priority,
                    });
                }
                Relation::Equal => {
                    identical = Some(*key);
                    break;
                }
                _ => {}
            }
        }

        if let Some(key) = identical {
            if let Some(entry) = entries.get_mut(&key) {
                entry.replace_with(fm);
            }
            self.last_hit.remove(&key);
            debug!(dpid, %key, "flow replaced");
            return Ok(FlowModOutcome::Replaced(key));
        }

        if entries.len() >= capacity {
            warn!(dpid, capacity, emergency, "flow table full");
            return Err(TableError::TableFull(capacity));
        }
        let key = EntryKey {
            priority: fm.priority,
            sequence: self.next_sequence,
        };
        let mut entry = FlowEntry::new(fm, dpid);
        entry.set_sequence(key.sequence);
        entries.insert_sorted(key, entry);
        self.next_sequence += 1;
        debug!(dpid, %key, rule_match = %fm.rule_match, emergency, "flow added");
        Ok(FlowModOutcome::Added(key))
    }

    fn modify(&mut self, fm: &FlowMod) -> Result<FlowModOutcome, TableError> {
        let emergency = fm.flags.contains(FlowModFlags::EMERG);
        let mut modified = 0;
        for entry in self.table_mut(emergency).values_mut() {
            if Self::selects(entry, fm) {
                entry.set_actions(fm.actions.clone()).set_cookie(fm.cookie);
                modified += 1;
            }
        }
        if modified == 0 {
            debug!(dpid = self.dpid, command = %fm.command, "nothing to modify, adding");
            return self.add(fm);
        }
        debug!(dpid = self.dpid, command = %fm.command, modified, "flows modified");
        Ok(FlowModOutcome::Modified(modified))
    }

    fn delete(&mut self, fm: &FlowMod) -> FlowModOutcome {
        let emergency = fm.flags.contains(FlowModFlags::EMERG);
        let selected: Vec<EntryKey> = self
            .table_mut(emergency)
            .iter()
            .filter(|(_, e)| Self::selects(e, fm) && Self::outputs_to(e, fm.out_port))
            .map(|(key, _)| *key)
            .collect();
        let removed: Vec<RemovedFlow> = selected
            .iter()
            .filter_map(|key| self.remove(key, emergency, RemovalReason::Delete))
            .collect();
        debug!(dpid = self.dpid, command = %fm.command, deleted = removed.len(), "flows deleted");
        FlowModOutcome::Deleted(removed)
    }

    fn remove(
        &mut self,
        key: &EntryKey,
        emergency: bool,
        reason: RemovalReason,
    ) -> Option<RemovedFlow> {
        let entry = self.table_mut(emergency).shift_remove(key)?;
        self.last_hit.remove(key);
        Some(RemovedFlow { entry, reason })
    }

    /// Refreshes the counters of an entry from the datapath. A grown packet count marks the
    /// entry as active for the idle timeout.
    pub fn update_stats(
        &mut self,
        key: &EntryKey,
        packet_count: u64,
        byte_count: u64,
    ) -> Result<(), TableError> {
        let entry = self.entries.get_mut(key).ok_or(TableError::UnknownEntry)?;
        let stats = entry.stats_mut();
        if packet_count > stats.packet_count {
            self.last_hit.insert(*key, stats.duration());
        }
        stats.packet_count = packet_count;
        stats.byte_count = byte_count;
        Ok(())
    }

    /// Advances the age of every entry by `elapsed` and evicts the expired ones, hard timeout
    /// taking precedence over idle timeout.
    pub fn tick(&mut self, elapsed: Duration) -> Vec<RemovedFlow> {
        for entry in self.emergency.values_mut() {
            entry.stats_mut().advance(elapsed);
        }

        let mut expired = vec![];
        for (key, entry) in self.entries.iter_mut() {
            entry.stats_mut().advance(elapsed);
            let age = entry.stats().duration();
            let hard = Duration::from_secs(u64::from(entry.hard_timeout()));
            let idle = Duration::from_secs(u64::from(entry.idle_timeout()));
            if !hard.is_zero() && age >= hard {
                expired.push((*key, RemovalReason::HardTimeout));
                continue;
            }
            let last_hit = self.last_hit.get(key).copied().unwrap_or_default();
            if !idle.is_zero() && age.saturating_sub(last_hit) >= idle {
                expired.push((*key, RemovalReason::IdleTimeout));
            }
        }

        let removed: Vec<RemovedFlow> = expired
            .into_iter()
            .filter_map(|(key, reason)| self.remove(&key, false, reason))
            .collect();
        for flow in &removed {
            info!(
                dpid = self.dpid,
                key = %flow.entry.sort_key(),
                reason = ?flow.reason,
                "flow expired"
            );
        }
        removed
    }

    fn reported<'t>(
        &'t self,
        m: &'t WildcardMatch,
        out_port: u16,
    ) -> impl Iterator<Item = &'t FlowEntry> + 't {
        self.entries.values().filter(move |e| {
            e.compare(m, false) == Relation::Equal && Self::outputs_to(e, out_port)
        })
    }

    /// Statistics of the entries contained in `m`, filtered by output port.
    pub fn flow_stats(&self, m: &WildcardMatch, out_port: u16) -> Vec<FlowStatsReply> {
        self.reported(m, out_port).map(FlowStatsReply::from).collect()
    }

    pub fn aggregate_stats(&self, m: &WildcardMatch, out_port: u16) -> AggregateStatsReply {
        self.reported(m, out_port).collect()
    }

    pub fn table_stats(&self) -> TableStats {
        TableStats {
            table_id: 0,
            name: format!("vflow-{:#x}", self.dpid),
            wildcards: Wildcards::ALL,
            max_entries: u32::try_from(self.config.max_entries).unwrap_or(u32::MAX),
            active_count: u32::try_from(self.entries.len()).unwrap_or(u32::MAX),
            lookup_count: 0,
            matched_count: self.entries.values().map(|e| e.stats().packet_count).sum(),
        }
    }
}

impl FlowStore for FlowTable {
    fn clear(&mut self) {
        self.entries.clear();
        self.emergency.clear();
        self.last_hit.clear();
        info!(dpid = self.dpid, "flow table cleared");
    }

    fn apply(&mut self, fm: &FlowMod) -> Result<FlowModOutcome, TableError> {
        match fm.command {
            FlowModCommand::Add => self.add(fm),
            FlowModCommand::Modify | FlowModCommand::ModifyStrict => self.modify(fm),
            FlowModCommand::Delete | FlowModCommand::DeleteStrict => Ok(self.delete(fm)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use tracing_test::traced_test;
    use vflow_core::action::FlowAction;

    use super::*;

    fn add(m: WildcardMatch, priority: u16, port: u16) -> FlowMod {
        FlowMod::new(FlowModCommand::Add, m)
            .with_priority(priority)
            .with_actions([FlowAction::output(port)])
    }

    fn table() -> FlowTable {
        FlowTable::new(1, TableConfig::default())
    }

    fn keys(t: &FlowTable) -> Vec<(u16, u64)> {
        t.iter().map(|e| (e.priority(), e.sequence())).collect()
    }

    #[test]
    fn test_iteration_in_table_order() {
        let mut t = table();
        for (i, p) in [10u16, 300, 10, 40].iter().enumerate() {
            let m = WildcardMatch::new().with_in_port(i as u16 + 1);
            assert!(matches!(t.apply(&add(m, *p, 1)), Ok(FlowModOutcome::Added(_))));
        }
        assert_eq!(keys(&t), vec![(300, 1), (40, 3), (10, 0), (10, 2)]);
        assert_eq!(t.len(), 4);
    }

    #[test]
    #[traced_test]
    fn test_check_overlap_rejects() {
        let mut t = table();
        t.apply(&add(WildcardMatch::new().with_in_port(1), 100, 2))
            .unwrap();
        let wider = add(WildcardMatch::new(), 100, 3).with_flags(FlowModFlags::CHECK_OVERLAP);
        assert_eq!(
            t.apply(&wider),
            Err(TableError::Overlap { priority: 100 })
        );
        assert!(logs_contain("flow overlaps, rejected"));

        // other priority, or disjoint at the same priority, is accepted
        t.apply(&add(WildcardMatch::new(), 99, 3).with_flags(FlowModFlags::CHECK_OVERLAP))
            .unwrap();
        t.apply(
            &add(WildcardMatch::new().with_in_port(2), 100, 3)
                .with_flags(FlowModFlags::CHECK_OVERLAP),
        )
        .unwrap();
        assert_eq!(t.len(), 3);
    }

    #[test]
    fn test_always_check_overlap() {
        let mut t = FlowTable::new(1, TableConfig::default().with_always_check_overlap(true));
        t.apply(&add(WildcardMatch::new().with_tp_dst(80), 5, 2))
            .unwrap();
        assert_eq!(
            t.apply(&add(WildcardMatch::new().with_nw_proto(6), 5, 2)),
            Err(TableError::Overlap { priority: 5 })
        );
        // identical flows overlap too
        assert_eq!(
            t.apply(&add(WildcardMatch::new().with_tp_dst(80), 5, 2)),
            Err(TableError::Overlap { priority: 5 })
        );
    }

    #[test]
    fn test_identical_add_replaces() {
        let mut t = table();
        let m = WildcardMatch::new().with_nw_dst(Ipv4Addr::new(10, 0, 0, 0), 24);
        let Ok(FlowModOutcome::Added(key)) = t.apply(&add(m, 100, 2).with_cookie(1)) else {
            panic!("first add must be accepted");
        };
        t.apply(&add(WildcardMatch::new(), 200, 1)).unwrap();
        t.update_stats(&key, 10, 1000).unwrap();

        // same match, host bits differ under the prefix
        let m2 = WildcardMatch::new().with_nw_dst(Ipv4Addr::new(10, 0, 0, 7), 24);
        assert_eq!(
            t.apply(&add(m2, 100, 5).with_cookie(2)),
            Ok(FlowModOutcome::Replaced(key))
        );
        assert_eq!(t.len(), 2);
        let e = t.get(&key).unwrap();
        assert_eq!(e.cookie(), 2);
        assert_eq!(e.actions(), &[FlowAction::output(5)]);
        assert_eq!(e.stats().packet_count, 0);
        assert_eq!(e.sequence(), key.sequence);
    }

    #[test]
    fn test_overlapping_entries_coexist_without_check() {
        let mut t = table();
        t.apply(&add(WildcardMatch::new().with_in_port(1), 100, 2))
            .unwrap();
        t.apply(&add(WildcardMatch::new(), 100, 3)).unwrap();
        assert_eq!(t.len(), 2);
        let relations: Vec<_> = t
            .classify(&WildcardMatch::new().with_in_port(1), true)
            .into_iter()
            .map(|(_, r)| r)
            .collect();
        assert_eq!(relations, vec![Relation::Equal, Relation::Superset]);
    }

    #[test]
    fn test_table_full() {
        let mut t = FlowTable::new(1, TableConfig::default().with_max_entries(2));
        t.apply(&add(WildcardMatch::new().with_in_port(1), 1, 1))
            .unwrap();
        t.apply(&add(WildcardMatch::new().with_in_port(2), 1, 1))
            .unwrap();
        assert_eq!(
            t.apply(&add(WildcardMatch::new().with_in_port(3), 1, 1)),
            Err(TableError::TableFull(2))
        );
        // replacing needs no room
        assert!(matches!(
            t.apply(&add(WildcardMatch::new().with_in_port(2), 1, 4)),
            Ok(FlowModOutcome::Replaced(_))
        ));
    }

    #[test]
    fn test_delete_removes_contained_entries() {
        let mut t = table();
        t.apply(&add(WildcardMatch::new().with_in_port(1).with_tp_dst(80), 10, 2))
            .unwrap();
        t.apply(&add(WildcardMatch::new().with_in_port(1), 20, 2))
            .unwrap();
        t.apply(&add(WildcardMatch::new().with_in_port(2), 30, 2))
            .unwrap();
        t.apply(&add(WildcardMatch::new(), 0, 2)).unwrap();

        let del = FlowMod::new(FlowModCommand::Delete, WildcardMatch::new().with_in_port(1));
        let Ok(FlowModOutcome::Deleted(removed)) = t.apply(&del) else {
            panic!("delete never fails");
        };
        assert_eq!(removed.len(), 2);
        assert!(removed.iter().all(|r| r.reason == RemovalReason::Delete));
        assert_eq!(keys(&t), vec![(30, 2), (0, 3)]);

        // an empty match deletes everything
        let all = FlowMod::new(FlowModCommand::Delete, WildcardMatch::new());
        t.apply(&all).unwrap();
        assert!(t.is_empty());
    }

    #[test]
    fn test_delete_strict_needs_priority_and_match() {
        let mut t = table();
        let m = WildcardMatch::new().with_in_port(1);
        t.apply(&add(m, 10, 2)).unwrap();
        t.apply(&add(m.with_tp_dst(22), 10, 2)).unwrap();

        let wrong_priority = FlowMod::new(FlowModCommand::DeleteStrict, m).with_priority(11);
        assert_eq!(
            t.apply(&wrong_priority),
            Ok(FlowModOutcome::Deleted(vec![]))
        );
        let exact = FlowMod::new(FlowModCommand::DeleteStrict, m).with_priority(10);
        let Ok(FlowModOutcome::Deleted(removed)) = t.apply(&exact) else {
            panic!("delete never fails");
        };
        assert_eq!(removed.len(), 1);
        assert_eq!(*removed[0].entry.rule_match(), m);
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn test_delete_filters_out_port() {
        let mut t = table();
        t.apply(&add(WildcardMatch::new().with_in_port(1), 10, 2))
            .unwrap();
        t.apply(&add(WildcardMatch::new().with_in_port(2), 10, 3))
            .unwrap();
        let del = FlowMod::new(FlowModCommand::Delete, WildcardMatch::new()).with_out_port(3);
        let Ok(FlowModOutcome::Deleted(removed)) = t.apply(&del) else {
            panic!("delete never fails");
        };
        assert_eq!(removed.len(), 1);
        assert!(removed[0].entry.outputs_to(3));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn test_modify_updates_or_adds() {
        let mut t = table();
        t.apply(&add(WildcardMatch::new().with_in_port(1).with_tp_dst(80), 10, 2))
            .unwrap();
        t.apply(&add(WildcardMatch::new().with_in_port(1).with_tp_dst(443), 20, 2))
            .unwrap();

        let modify = FlowMod::new(FlowModCommand::Modify, WildcardMatch::new().with_in_port(1))
            .with_cookie(7)
            .with_actions([FlowAction::output(9)]);
        assert_eq!(t.apply(&modify), Ok(FlowModOutcome::Modified(2)));
        assert!(t.iter().all(|e| e.outputs_to(9) && e.cookie() == 7));
        assert_eq!(t.find_by_cookie(7).count(), 2);

        // nothing matches strictly, the request is added instead
        let strict = FlowMod::new(FlowModCommand::ModifyStrict, WildcardMatch::new().with_in_port(1))
            .with_priority(10)
            .with_actions([FlowAction::output(4)]);
        assert!(matches!(t.apply(&strict), Ok(FlowModOutcome::Added(_))));
        assert_eq!(t.len(), 3);
        assert_eq!(
            t.apply(&strict.clone().with_actions([])),
            Ok(FlowModOutcome::Modified(1))
        );
    }

    #[test]
    #[traced_test]
    fn test_timeouts() {
        let mut t = table();
        let Ok(FlowModOutcome::Added(hard)) = t.apply(
            &add(WildcardMatch::new().with_in_port(1), 1, 1)
                .with_timeouts(0, 10)
                .with_flags(FlowModFlags::SEND_FLOW_REM),
        ) else {
            panic!("add must be accepted");
        };
        let Ok(FlowModOutcome::Added(idle)) =
            t.apply(&add(WildcardMatch::new().with_in_port(2), 1, 1).with_timeouts(5, 0))
        else {
            panic!("add must be accepted");
        };
        t.apply(&add(WildcardMatch::new().with_in_port(3), 1, 1))
            .unwrap();

        assert!(t.tick(Duration::from_secs(4)).is_empty());
        // traffic keeps the idle entry alive
        t.update_stats(&idle, 1, 64).unwrap();
        assert!(t.tick(Duration::from_secs(4)).is_empty());
        t.update_stats(&idle, 2, 128).unwrap();

        let removed = t.tick(Duration::from_secs(2));
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].entry.sort_key(), hard);
        assert_eq!(removed[0].reason, RemovalReason::HardTimeout);
        assert!(removed[0].notify());
        assert!(logs_contain("flow expired"));

        let removed = t.tick(Duration::from_secs(3));
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].entry.sort_key(), idle);
        assert_eq!(removed[0].reason, RemovalReason::IdleTimeout);
        assert!(!removed[0].notify());

        assert_eq!(t.len(), 1);
        assert_eq!(t.iter().next().unwrap().stats().duration_sec, 13);
        assert_eq!(t.update_stats(&idle, 1, 1), Err(TableError::UnknownEntry));
    }

    #[test]
    fn test_emergency_entries() {
        let mut t = FlowTable::new(1, TableConfig::default().with_emergency_max_entries(1));
        let emerg = add(WildcardMatch::new(), 0, 1).with_flags(FlowModFlags::EMERG);
        assert_eq!(
            t.apply(&emerg.clone().with_timeouts(1, 0)),
            Err(TableError::BadEmergencyTimeout)
        );
        assert!(matches!(t.apply(&emerg), Ok(FlowModOutcome::Added(_))));
        assert_eq!(
            t.apply(&add(WildcardMatch::new().with_in_port(1), 0, 1).with_flags(FlowModFlags::EMERG)),
            Err(TableError::TableFull(1))
        );
        assert!(t.is_empty());
        assert_eq!(t.emergency_entries().count(), 1);

        let del = FlowMod::new(FlowModCommand::Delete, WildcardMatch::new())
            .with_flags(FlowModFlags::EMERG);
        t.apply(&del).unwrap();
        assert_eq!(t.emergency_entries().count(), 0);
    }

    #[test]
    fn test_stats() {
        let mut t = table();
        let Ok(FlowModOutcome::Added(web)) =
            t.apply(&add(WildcardMatch::new().with_dl_type(0x0800).with_tp_dst(80), 10, 2))
        else {
            panic!("add must be accepted");
        };
        let Ok(FlowModOutcome::Added(ssh)) =
            t.apply(&add(WildcardMatch::new().with_dl_type(0x0800).with_tp_dst(22), 10, 3))
        else {
            panic!("add must be accepted");
        };
        t.apply(&add(WildcardMatch::new(), 0, 4)).unwrap();
        t.update_stats(&web, 10, 1500).unwrap();
        t.update_stats(&ssh, 2, 200).unwrap();

        let ip = WildcardMatch::new().with_dl_type(0x0800);
        let flows = t.flow_stats(&ip, OFPP_NONE);
        assert_eq!(flows.len(), 2);
        assert_eq!(flows[0].packet_count, 10);
        assert_eq!(
            t.aggregate_stats(&ip, OFPP_NONE),
            AggregateStatsReply {
                packet_count: 12,
                byte_count: 1700,
                flow_count: 2,
            }
        );
        assert_eq!(t.aggregate_stats(&ip, 3).flow_count, 1);
        assert_eq!(t.aggregate_stats(&WildcardMatch::new(), OFPP_NONE).flow_count, 3);

        let table_stats = t.table_stats();
        assert_eq!(table_stats.active_count, 3);
        assert_eq!(table_stats.max_entries, 1024);
        assert_eq!(table_stats.matched_count, 12);
    }

    #[test]
    fn test_apply_all_and_clear() {
        let mut t = table();
        let fms = [
            add(WildcardMatch::new().with_in_port(1), 1, 1),
            add(WildcardMatch::new().with_in_port(1), 1, 1).with_flags(FlowModFlags::CHECK_OVERLAP),
            add(WildcardMatch::new().with_in_port(2), 1, 1),
        ];
        let results = t.apply_all(&fms);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert!(results[2].is_ok());
        t.clear();
        assert!(t.is_empty());
    }
}
