//! In-memory sorted table catalog
//!
//! Implements [`KvStore`] over one `BTreeMap` per table. A batch is applied
//! under a single write lock, which makes it atomic for readers.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use crate::error::{Result, VaultError};

use super::{Cell, KvStore};

/// (row, family, qualifier)
type CellKey = (Vec<u8>, String, String);

/// Sorted in-memory tables
pub struct MemoryKvStore {
    tables: RwLock<HashMap<String, BTreeMap<CellKey, Cell>>>,
    available: AtomicBool,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Create an empty table; no-op if it exists
    pub fn create_table(&self, table: &str) {
        self.tables.write().entry(table.to_string()).or_default();
    }

    pub fn drop_table(&self, table: &str) -> bool {
        self.tables.write().remove(table).is_some()
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.tables.read().contains_key(table)
    }

    /// Number of cells in `table`
    pub fn cell_count(&self, table: &str) -> Result<usize> {
        self.tables
            .read()
            .get(table)
            .map(BTreeMap::len)
            .ok_or_else(|| VaultError::TableNotFound(table.to_string()))
    }

    /// Simulate the backend going away (every call fails) or coming back
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(VaultError::BackendUnavailable(
                "in-memory store marked unavailable".to_string(),
            ))
        }
    }
}

impl Default for MemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KvStore for MemoryKvStore {
    fn scan(
        &self,
        table: &str,
        start_row: &[u8],
        end_row: &[u8],
        family: Option<&str>,
    ) -> Result<Vec<Cell>> {
        self.check_available()?;

        let tables = self.tables.read();
        let cells = tables
            .get(table)
            .ok_or_else(|| VaultError::TableNotFound(table.to_string()))?;

        if start_row > end_row {
            return Ok(Vec::new());
        }

        let lower: CellKey = (start_row.to_vec(), String::new(), String::new());
        Ok(cells
            .range((Bound::Included(lower), Bound::Unbounded))
            .take_while(|((row, _, _), _)| row.as_slice() <= end_row)
            .filter(|((_, fam, _), _)| family.map_or(true, |f| f == fam))
            .map(|(_, cell)| cell.clone())
            .collect())
    }

    fn apply(&self, table: &str, mutations: Vec<Cell>) -> Result<()> {
        self.check_available()?;

        let mut tables = self.tables.write();
        let cells = tables
            .get_mut(table)
            .ok_or_else(|| VaultError::TableNotFound(table.to_string()))?;

        let count = mutations.len();
        for cell in mutations {
            let key = (cell.row.clone(), cell.family.clone(), cell.qualifier.clone());
            cells.insert(key, cell);
        }

        tracing::debug!(table, mutations = count, "Applied batch");
        Ok(())
    }
}
