use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use replenish_replenishment::{Decision, ObservabilityRecord, Order, StockEvent};

use super::r#trait::{ReplenishmentStore, StoreConnector, StoreError, Table};

#[derive(Debug, Default)]
struct Tables {
    stock_events: Vec<StockEvent>,
    orders: Vec<Order>,
    decisions: Vec<Decision>,
    observability: Vec<ObservabilityRecord>,
}

/// In-memory replenishment store.
///
/// Intended for tests/dev. Individual tables can be switched to fail, which
/// simulates a missing table or a constraint violation on that write only.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    failing: RwLock<HashSet<Table>>,
    releases: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Make every subsequent write to `table` fail.
    pub fn fail_table(&self, table: Table) {
        if let Ok(mut failing) = self.failing.write() {
            failing.insert(table);
        }
    }

    pub fn heal_table(&self, table: Table) {
        if let Ok(mut failing) = self.failing.write() {
            failing.remove(&table);
        }
    }

    pub fn stock_events(&self) -> Vec<StockEvent> {
        self.read(|t| t.stock_events.clone())
    }

    pub fn orders(&self) -> Vec<Order> {
        self.read(|t| t.orders.clone())
    }

    pub fn decisions(&self) -> Vec<Decision> {
        self.read(|t| t.decisions.clone())
    }

    pub fn observability_records(&self) -> Vec<ObservabilityRecord> {
        self.read(|t| t.observability.clone())
    }

    /// How many times a batch released its connection to this store.
    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    fn read<T: Default>(&self, f: impl FnOnce(&Tables) -> T) -> T {
        self.tables.read().map(|t| f(&t)).unwrap_or_default()
    }

    fn write(&self, table: Table, f: impl FnOnce(&mut Tables)) -> Result<(), StoreError> {
        let failing = self
            .failing
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?
            .contains(&table);
        if failing {
            return Err(StoreError::MissingTable(format!(
                "relation \"{}\" does not exist",
                table.as_str().to_lowercase()
            )));
        }

        let mut tables = self
            .tables
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;
        f(&mut tables);
        Ok(())
    }
}

#[async_trait]
impl ReplenishmentStore for InMemoryStore {
    async fn insert_stock_event(&self, event: &StockEvent) -> Result<(), StoreError> {
        self.write(Table::StockEvents, |t| t.stock_events.push(event.clone()))
    }

    async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        self.write(Table::Orders, |t| t.orders.push(order.clone()))
    }

    async fn insert_decision(&self, decision: &Decision) -> Result<(), StoreError> {
        self.write(Table::DecisionLogs, |t| t.decisions.push(decision.clone()))
    }

    async fn insert_observability(&self, record: &ObservabilityRecord) -> Result<(), StoreError> {
        self.write(Table::EsbLogs, |t| t.observability.push(record.clone()))
    }

    async fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// Connector handing out a shared `InMemoryStore`.
///
/// Can be made unreachable to simulate a store outage at batch start.
#[derive(Debug)]
pub struct InMemoryConnector {
    store: Arc<InMemoryStore>,
    reachable: AtomicBool,
    connects: AtomicUsize,
}

impl InMemoryConnector {
    pub fn new(store: Arc<InMemoryStore>) -> Self {
        Self {
            store,
            reachable: AtomicBool::new(true),
            connects: AtomicUsize::new(0),
        }
    }

    pub fn store(&self) -> &Arc<InMemoryStore> {
        &self.store
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Number of successful connects.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StoreConnector for InMemoryConnector {
    type Store = Arc<InMemoryStore>;

    async fn connect(&self) -> Result<Self::Store, StoreError> {
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(self.store.clone())
    }
}
