use super::table::Table;
use crate::core::{StoreError, StoreResult};
use crate::model::PersistedChangeset;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Complete state of a memory store: tables, migration history and the
/// statements that produced them.
///
/// A transaction works on a clone and the clone replaces the published
/// catalog on commit, so tables and history always move together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    tables: BTreeMap<String, Table>,
    history: Vec<PersistedChangeset>,
    /// Inspection only; not part of the snapshot.
    #[serde(skip)]
    executed_statements: Vec<String>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_table(&mut self, table: Table, if_not_exists: bool) -> StoreResult<()> {
        let name = table.name().to_string();
        if self.tables.contains_key(&name) {
            if if_not_exists {
                return Ok(());
            }
            return Err(StoreError::TableExists(name));
        }
        self.tables.insert(name, table);
        Ok(())
    }

    pub fn drop_table(&mut self, name: &str, if_exists: bool) -> StoreResult<()> {
        if self.tables.remove(name).is_none() && !if_exists {
            return Err(StoreError::TableNotFound(name.to_string()));
        }
        Ok(())
    }

    pub fn table(&self, name: &str) -> StoreResult<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| StoreError::TableNotFound(name.to_string()))
    }

    pub fn table_mut(&mut self, name: &str) -> StoreResult<&mut Table> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| StoreError::TableNotFound(name.to_string()))
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Upserts by id: a re-applied changeset keeps its position in the history.
    pub fn record(&mut self, changeset: PersistedChangeset) {
        match self.history.iter_mut().find(|record| record.id == changeset.id) {
            Some(existing) => *existing = changeset,
            None => self.history.push(changeset),
        }
    }

    pub fn history(&self) -> &[PersistedChangeset] {
        &self.history
    }

    pub(crate) fn log_statement(&mut self, statement: String) {
        self.executed_statements.push(statement);
    }

    pub fn executed_statements(&self) -> &[String] {
        &self.executed_statements
    }
}
