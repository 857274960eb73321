use std::{sync::Arc, time::Duration};

use fxhash::FxHashMap;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::info;

use vflow_core::entry::FlowMod;

use crate::{
    table::{FlowModOutcome, FlowTable, RemovedFlow, TableConfig},
    FlowStore, TableError,
};

/// A flow table shared between one writer at a time and any number of readers.
#[derive(Clone, Debug)]
pub struct SharedFlowTable(Arc<RwLock<FlowTable>>);

impl SharedFlowTable {
    pub fn new(table: FlowTable) -> Self {
        SharedFlowTable(Arc::new(RwLock::new(table)))
    }

    #[inline]
    pub fn read(&self) -> RwLockReadGuard<'_, FlowTable> {
        self.0.read()
    }

    #[inline]
    pub fn write(&self) -> RwLockWriteGuard<'_, FlowTable> {
        self.0.write()
    }

    pub fn apply(&self, fm: &FlowMod) -> Result<FlowModOutcome, TableError> {
        self.write().apply(fm)
    }
}

/// Flow tables of every virtual datapath, by datapath id.
#[derive(Debug, Default)]
pub struct FlowTables {
    tables: FxHashMap<u64, SharedFlowTable>,
}

impl FlowTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the table of a datapath. A datapath registers once.
    pub fn register(
        &mut self,
        dpid: u64,
        config: TableConfig,
    ) -> Result<SharedFlowTable, TableError> {
        if self.tables.contains_key(&dpid) {
            return Err(TableError::ControllerState(format!(
                "datapath {dpid:#018x} already registered"
            )));
        }
        let table = SharedFlowTable::new(FlowTable::new(dpid, config));
        self.tables.insert(dpid, table.clone());
        info!(dpid, "flow table registered");
        Ok(table)
    }

    pub fn get(&self, dpid: u64) -> Result<&SharedFlowTable, TableError> {
        self.tables.get(&dpid).ok_or(TableError::InvalidDpid(dpid))
    }

    pub fn write(&self, dpid: u64) -> Result<RwLockWriteGuard<'_, FlowTable>, TableError> {
        Ok(self.get(dpid)?.write())
    }

    pub fn remove(&mut self, dpid: u64) -> Result<SharedFlowTable, TableError> {
        let table = self
            .tables
            .remove(&dpid)
            .ok_or(TableError::InvalidDpid(dpid))?;
        info!(dpid, "flow table removed");
        Ok(table)
    }

    pub fn apply(&self, dpid: u64, fm: &FlowMod) -> Result<FlowModOutcome, TableError> {
        self.get(dpid)?.apply(fm)
    }

    /// Ages every table, see [FlowTable::tick].
    pub fn tick(&self, elapsed: Duration) -> Vec<RemovedFlow> {
        self.tables
            .values()
            .flat_map(|table| table.write().tick(elapsed))
            .collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn dpids(&self) -> impl Iterator<Item = u64> + '_ {
        self.tables.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use vflow_core::{
        action::FlowAction, entry::FlowModCommand, r#match::WildcardMatch,
    };

    use super::*;

    fn add(in_port: u16) -> FlowMod {
        FlowMod::new(FlowModCommand::Add, WildcardMatch::new().with_in_port(in_port))
            .with_actions([FlowAction::output(1)])
    }

    #[test]
    fn test_register_and_lookup() {
        let mut tables = FlowTables::new();
        tables.register(1, TableConfig::default()).unwrap();
        tables.register(2, TableConfig::default()).unwrap();
        assert!(matches!(
            tables.register(1, TableConfig::default()),
            Err(TableError::ControllerState(_))
        ));
        assert_eq!(tables.len(), 2);

        tables.apply(1, &add(1)).unwrap();
        assert_eq!(tables.get(1).unwrap().read().len(), 1);
        assert_eq!(tables.write(2).unwrap().len(), 0);

        assert_eq!(tables.apply(3, &add(1)), Err(TableError::InvalidDpid(3)));
        assert!(matches!(tables.get(3), Err(TableError::InvalidDpid(3))));
        tables.remove(2).unwrap();
        assert!(matches!(tables.remove(2), Err(TableError::InvalidDpid(2))));

        let mut dpids: Vec<_> = tables.dpids().collect();
        dpids.sort();
        assert_eq!(dpids, vec![1]);
    }

    #[test]
    fn test_tick_ages_every_table() {
        let mut tables = FlowTables::new();
        for dpid in 1..=3 {
            tables.register(dpid, TableConfig::default()).unwrap();
            tables
                .apply(dpid, &add(1).with_timeouts(0, 1))
                .unwrap();
        }
        let removed = tables.tick(Duration::from_secs(1));
        assert_eq!(removed.len(), 3);
        assert!(tables.dpids().all(|d| tables.get(d).unwrap().read().is_empty()));
    }

    #[test]
    fn test_shared_between_threads() {
        let mut tables = FlowTables::new();
        let shared = tables.register(7, TableConfig::default()).unwrap();
        thread::scope(|s| {
            for worker in 0..4u16 {
                let table = shared.clone();
                s.spawn(move || {
                    for i in 0..25u16 {
                        table.apply(&add(worker * 100 + i)).unwrap();
                        let snapshot = table.read();
                        assert!(snapshot.iter().all(|e| e.dpid() == 7));
                    }
                });
            }
        });
        assert_eq!(shared.read().len(), 100);
    }
}
