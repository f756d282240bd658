//! StateStore — redb-backed state persistence for AppGrid.
//!
//! Rows are JSON-serialized into redb's `&[u8]` value columns. Writes that
//! must land together go through a [`UnitOfWork`], an explicit write
//! transaction handle that is threaded through every DAO call and either
//! committed or rolled back as a whole. The store supports both on-disk and
//! in-memory backends (the latter for testing).

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, TableHandle, WriteTransaction};
use tracing::{debug, warn};

use crate::error::{StateError, StateResult};
use crate::record::{Record, owned_by};
use crate::tables::ALL_TABLES;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        for table in ALL_TABLES {
            txn.open_table(*table).map_err(map_err!(Table))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Transactions ───────────────────────────────────────────────

    /// Start a unit of work. Dropping it without [`UnitOfWork::commit`]
    /// discards every write made through it.
    pub fn begin(&self) -> StateResult<UnitOfWork> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        Ok(UnitOfWork { txn })
    }

    /// Run `f` inside one unit of work.
    ///
    /// Commits when `f` returns `Ok`, rolls back when it returns `Err`. If `f`
    /// panics the transaction is rolled back before the panic continues.
    pub fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&UnitOfWork) -> Result<T, E>,
        E: From<StateError>,
    {
        let uow = self.begin()?;
        match panic::catch_unwind(AssertUnwindSafe(|| f(&uow))) {
            Ok(Ok(value)) => {
                uow.commit()?;
                Ok(value)
            }
            Ok(Err(e)) => {
                if let Err(abort) = uow.rollback() {
                    warn!(error = %abort, "rollback failed");
                }
                Err(e)
            }
            Err(payload) => {
                if let Err(abort) = uow.rollback() {
                    warn!(error = %abort, "rollback after panic failed");
                }
                panic::resume_unwind(payload)
            }
        }
    }

    // ── Reads and single-row writes ────────────────────────────────

    /// Get a row by its full key.
    pub fn get<R: Record>(&self, key: &str) -> StateResult<Option<R>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(R::TABLE).map_err(map_err!(Table))?;
        read_row(&table, key)
    }

    /// List every row owned by `owner`.
    pub fn list_by_owner<R: Record>(&self, owner: &str) -> StateResult<Vec<R>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(R::TABLE).map_err(map_err!(Table))?;
        scan_owner(&table, owner)
    }

    /// List every row of a table.
    pub fn list_all<R: Record>(&self) -> StateResult<Vec<R>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(R::TABLE).map_err(map_err!(Table))?;
        scan_all(&table)
    }

    /// Insert or update a single row in its own transaction.
    pub fn put<R: Record>(&self, row: &R) -> StateResult<()> {
        self.transaction(|uow| uow.put(row))
    }

    /// Delete a row by key in its own transaction. Returns true if it existed.
    pub fn delete<R: Record>(&self, key: &str) -> StateResult<bool> {
        self.transaction(|uow| uow.delete::<R>(key))
    }
}

/// An open write transaction.
///
/// Every per-aspect DAO operation takes the unit of work explicitly so that
/// all writes of one synchronization land (or vanish) together.
pub struct UnitOfWork {
    txn: WriteTransaction,
}

impl UnitOfWork {
    /// Make every write visible to other readers.
    pub fn commit(self) -> StateResult<()> {
        self.txn.commit().map_err(map_err!(Transaction))
    }

    /// Discard every write made through this unit of work.
    pub fn rollback(self) -> StateResult<()> {
        self.txn.abort().map_err(map_err!(Transaction))
    }

    /// Get a row by its full key.
    pub fn get<R: Record>(&self, key: &str) -> StateResult<Option<R>> {
        let table = self.txn.open_table(R::TABLE).map_err(map_err!(Table))?;
        read_row(&table, key)
    }

    /// Get a row that must exist.
    pub fn get_required<R: Record>(&self, key: &str) -> StateResult<R> {
        self.get(key)?
            .ok_or_else(|| StateError::NotFound(format!("{} {key}", R::TABLE.name())))
    }

    /// List every row owned by `owner`.
    pub fn list_by_owner<R: Record>(&self, owner: &str) -> StateResult<Vec<R>> {
        let table = self.txn.open_table(R::TABLE).map_err(map_err!(Table))?;
        scan_owner(&table, owner)
    }

    /// List every row owned by any of `owners`.
    pub fn list_by_owners<R: Record>(&self, owners: &[String]) -> StateResult<Vec<R>> {
        let table = self.txn.open_table(R::TABLE).map_err(map_err!(Table))?;
        let mut rows = Vec::new();
        for owner in owners {
            rows.extend(scan_owner(&table, owner)?);
        }
        Ok(rows)
    }

    /// List every row of a table.
    pub fn list_all<R: Record>(&self) -> StateResult<Vec<R>> {
        let table = self.txn.open_table(R::TABLE).map_err(map_err!(Table))?;
        scan_all(&table)
    }

    /// Insert or update a single row.
    pub fn put<R: Record>(&self, row: &R) -> StateResult<()> {
        self.create_or_update_in_batch(std::slice::from_ref(row))
            .map(|_| ())
    }

    /// Insert or update all `rows`, returning how many were written.
    pub fn create_or_update_in_batch<R: Record>(&self, rows: &[R]) -> StateResult<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut table = self.txn.open_table(R::TABLE).map_err(map_err!(Table))?;
        for row in rows {
            let key = row.row_key();
            let value = serde_json::to_vec(row).map_err(map_err!(Serialize))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        debug!(table = R::TABLE.name(), count = rows.len(), "rows written");
        Ok(rows.len())
    }

    /// Delete a row by key. Returns true if it existed.
    pub fn delete<R: Record>(&self, key: &str) -> StateResult<bool> {
        let mut table = self.txn.open_table(R::TABLE).map_err(map_err!(Table))?;
        let existed = table.remove(key).map_err(map_err!(Write))?.is_some();
        Ok(existed)
    }

    /// Delete every row owned by any of `owners`. Returns number deleted;
    /// zero is not an error.
    pub fn delete_by_owner_ids<R: Record>(&self, owners: &[String]) -> StateResult<u64> {
        let mut table = self.txn.open_table(R::TABLE).map_err(map_err!(Table))?;
        // Collect keys first; the table cannot be mutated while a range is open.
        let mut keys = Vec::new();
        for owner in owners {
            keys.extend(scan_owner_keys(&table, owner)?);
        }
        for key in &keys {
            table.remove(key.as_str()).map_err(map_err!(Write))?;
        }
        if !keys.is_empty() {
            debug!(table = R::TABLE.name(), count = keys.len(), "rows deleted");
        }
        Ok(keys.len() as u64)
    }

    /// Delete every row matching `pred`, wherever it lives in the table.
    pub fn delete_where<R, P>(&self, pred: P) -> StateResult<u64>
    where
        R: Record,
        P: Fn(&R) -> bool,
    {
        let mut table = self.txn.open_table(R::TABLE).map_err(map_err!(Table))?;
        let mut keys = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            let row: R = serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            if pred(&row) {
                keys.push(key.value().to_string());
            }
        }
        for key in &keys {
            table.remove(key.as_str()).map_err(map_err!(Write))?;
        }
        Ok(keys.len() as u64)
    }
}

fn read_row<R, T>(table: &T, key: &str) -> StateResult<Option<R>>
where
    R: Record,
    T: ReadableTable<&'static str, &'static [u8]>,
{
    match table.get(key).map_err(map_err!(Read))? {
        Some(guard) => {
            let row: R = serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
            Ok(Some(row))
        }
        None => Ok(None),
    }
}

fn scan_owner<R, T>(table: &T, owner: &str) -> StateResult<Vec<R>>
where
    R: Record,
    T: ReadableTable<&'static str, &'static [u8]>,
{
    let mut rows = Vec::new();
    for entry in table.range(owner..).map_err(map_err!(Read))? {
        let (key, value) = entry.map_err(map_err!(Read))?;
        let k = key.value();
        if !k.starts_with(owner) {
            break;
        }
        if owned_by(k, owner) {
            let row: R = serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            rows.push(row);
        }
    }
    Ok(rows)
}

fn scan_owner_keys<T>(table: &T, owner: &str) -> StateResult<Vec<String>>
where
    T: ReadableTable<&'static str, &'static [u8]>,
{
    let mut keys = Vec::new();
    for entry in table.range(owner..).map_err(map_err!(Read))? {
        let (key, _) = entry.map_err(map_err!(Read))?;
        let k = key.value();
        if !k.starts_with(owner) {
            break;
        }
        if owned_by(k, owner) {
            keys.push(k.to_string());
        }
    }
    Ok(keys)
}

fn scan_all<R, T>(table: &T) -> StateResult<Vec<R>>
where
    R: Record,
    T: ReadableTable<&'static str, &'static [u8]>,
{
    let mut rows = Vec::new();
    for entry in table.iter().map_err(map_err!(Read))? {
        let (_, value) = entry.map_err(map_err!(Read))?;
        let row: R = serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::*;

    fn test_port(component_id: &str, container_port: u16) -> Port {
        Port {
            component_id: component_id.to_string(),
            tenant_env_id: "env-1".to_string(),
            container_port,
            mapping_port: container_port,
            protocol: "http".to_string(),
            port_alias: format!("P{container_port}"),
            k8s_service_name: None,
            is_inner_service: false,
            is_outer_service: false,
        }
    }

    fn test_label(component_id: &str, key: &str) -> Label {
        Label {
            component_id: component_id.to_string(),
            label_key: key.to_string(),
            label_value: "v".to_string(),
        }
    }

    // ── Unit of work ───────────────────────────────────────────────

    #[test]
    fn batch_write_and_scan_by_owner() {
        let store = StateStore::open_in_memory().unwrap();
        let uow = store.begin().unwrap();
        uow.create_or_update_in_batch(&[
            test_port("c1", 8080),
            test_port("c1", 5432),
            test_port("c2", 80),
        ])
        .unwrap();
        uow.commit().unwrap();

        let c1: Vec<Port> = store.list_by_owner("c1").unwrap();
        assert_eq!(c1.len(), 2);
        let c2: Vec<Port> = store.list_by_owner("c2").unwrap();
        assert_eq!(c2.len(), 1);
    }

    #[test]
    fn owner_scan_does_not_leak_into_similar_ids() {
        let store = StateStore::open_in_memory().unwrap();
        store.put(&test_port("abc", 80)).unwrap();
        store.put(&test_port("abc-x", 80)).unwrap();
        store.put(&test_port("abc2", 80)).unwrap();

        let rows: Vec<Port> = store.list_by_owner("abc").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].component_id, "abc");
    }

    #[test]
    fn delete_by_owner_ids_counts_and_tolerates_missing() {
        let store = StateStore::open_in_memory().unwrap();
        store.put(&test_label("c1", "a")).unwrap();
        store.put(&test_label("c1", "b")).unwrap();
        store.put(&test_label("c2", "a")).unwrap();

        let uow = store.begin().unwrap();
        let deleted = uow
            .delete_by_owner_ids::<Label>(&["c1".to_string(), "missing".to_string()])
            .unwrap();
        uow.commit().unwrap();

        assert_eq!(deleted, 2);
        assert!(store.list_by_owner::<Label>("c1").unwrap().is_empty());
        assert_eq!(store.list_by_owner::<Label>("c2").unwrap().len(), 1);
    }

    #[test]
    fn dropped_unit_of_work_discards_writes() {
        let store = StateStore::open_in_memory().unwrap();
        {
            let uow = store.begin().unwrap();
            uow.put(&test_port("c1", 80)).unwrap();
        }
        assert!(store.list_all::<Port>().unwrap().is_empty());
    }

    #[test]
    fn transaction_rolls_back_on_error() {
        let store = StateStore::open_in_memory().unwrap();
        let result: StateResult<()> = store.transaction(|uow| {
            uow.put(&test_port("c1", 80))?;
            Err(StateError::NotFound("forced".to_string()))
        });
        assert!(result.unwrap_err().is_not_found());
        assert!(store.list_all::<Port>().unwrap().is_empty());
    }

    #[test]
    fn transaction_rolls_back_on_panic() {
        let store = StateStore::open_in_memory().unwrap();
        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
            let _: StateResult<()> = store.transaction(|uow| {
                uow.put(&test_port("c1", 80))?;
                panic!("boom");
            });
        }));
        assert!(outcome.is_err());
        assert!(store.list_all::<Port>().unwrap().is_empty());

        // The store stays usable afterwards.
        store.put(&test_port("c1", 81)).unwrap();
        assert_eq!(store.list_all::<Port>().unwrap().len(), 1);
    }

    #[test]
    fn get_required_reports_not_found() {
        let store = StateStore::open_in_memory().unwrap();
        let uow = store.begin().unwrap();
        let err = uow.get_required::<Port>("c1/80").unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("ports"));
    }

    #[test]
    fn delete_where_matches_across_owners() {
        let store = StateStore::open_in_memory().unwrap();
        for (cid, dep) in [("a", "x"), ("b", "x"), ("c", "y")] {
            store
                .put(&DependencyRelation {
                    component_id: cid.to_string(),
                    dep_component_id: dep.to_string(),
                    tenant_env_id: "env-1".to_string(),
                })
                .unwrap();
        }
        let uow = store.begin().unwrap();
        let n = uow
            .delete_where::<DependencyRelation, _>(|r| r.dep_component_id == "x")
            .unwrap();
        uow.commit().unwrap();
        assert_eq!(n, 2);
        assert_eq!(store.list_all::<DependencyRelation>().unwrap().len(), 1);
    }

    // ── Single-row helpers ─────────────────────────────────────────

    #[test]
    fn put_get_delete_single_row() {
        let store = StateStore::open_in_memory().unwrap();
        let port = test_port("c1", 8080);
        store.put(&port).unwrap();

        assert_eq!(store.get::<Port>("c1/8080").unwrap(), Some(port));
        assert!(store.delete::<Port>("c1/8080").unwrap());
        assert!(!store.delete::<Port>("c1/8080").unwrap());
        assert!(store.get::<Port>("c1/8080").unwrap().is_none());
    }

    // ── Persistence (on-disk) ──────────────────────────────────────

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.redb");

        {
            let store = StateStore::open(&db_path).unwrap();
            store.put(&test_label("c1", "tier")).unwrap();
        }

        // Reopen the same database file.
        let store = StateStore::open(&db_path).unwrap();
        let labels: Vec<Label> = store.list_by_owner("c1").unwrap();
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].label_key, "tier");
    }

    #[test]
    fn empty_store_operations() {
        let store = StateStore::open_in_memory().unwrap();

        assert!(store.list_all::<Component>().unwrap().is_empty());
        assert!(store.list_by_owner::<Volume>("any").unwrap().is_empty());
        assert!(!store.delete::<Component>("nope").unwrap());
    }
}
