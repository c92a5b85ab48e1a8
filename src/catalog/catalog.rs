use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::catalog::schema::Schema;
use crate::common::types::Rid;
use crate::index::hash::{ExtendibleHashTable, HashIndexError};
use crate::query::executor::result::{DataValue, QueryError, QueryResult, Tuple};
use crate::storage::buffer::PagePool;
use crate::storage::table::{TableError, TableHeap};

pub type TableOid = u32;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Table {0} not found")]
    TableNotFound(String),

    #[error("Table {0} already exists")]
    DuplicateTable(String),

    #[error("Column index {0} out of range")]
    ColumnOutOfRange(usize),

    #[error("Table error: {0}")]
    Table(#[from] TableError),

    #[error("Index error: {0}")]
    Index(#[from] HashIndexError),
}

/// Metadata for one table: schema plus the heap holding its rows.
pub struct TableInfo {
    pub oid: TableOid,
    pub name: String,
    pub schema: Schema,
    pub heap: Arc<TableHeap>,
}

/// Metadata for one index over a single integer key column.
pub struct IndexInfo {
    pub name: String,
    pub table_name: String,
    pub key_attr: usize,
    pub index: Arc<ExtendibleHashTable<i64, Rid>>,
}

impl IndexInfo {
    /// Derive the index key from a tuple of the indexed table.
    pub fn key_from_tuple(&self, tuple: &Tuple) -> QueryResult<i64> {
        match tuple.value(self.key_attr)? {
            DataValue::Integer(i) => Ok(*i),
            other => Err(QueryError::TypeError(format!(
                "index {} requires an integer key, got {:?}",
                self.name, other
            ))),
        }
    }
}

/// In-memory catalog of tables and indexes. Persisting the catalog is a
/// recovery concern and out of scope.
pub struct Catalog {
    buffer_pool: Arc<dyn PagePool>,
    tables: HashMap<TableOid, Arc<TableInfo>>,
    table_names: HashMap<String, TableOid>,
    indexes: HashMap<String, Vec<Arc<IndexInfo>>>,
    next_oid: TableOid,
}

impl Catalog {
    pub fn new(buffer_pool: Arc<dyn PagePool>) -> Self {
        Self {
            buffer_pool,
            tables: HashMap::new(),
            table_names: HashMap::new(),
            indexes: HashMap::new(),
            next_oid: 1,
        }
    }

    pub fn create_table(
        &mut self,
        name: impl Into<String>,
        schema: Schema,
    ) -> Result<Arc<TableInfo>, CatalogError> {
        let name = name.into();
        if self.table_names.contains_key(&name) {
            return Err(CatalogError::DuplicateTable(name));
        }

        let heap = Arc::new(TableHeap::create(self.buffer_pool.clone())?);
        let oid = self.next_oid;
        self.next_oid += 1;

        let info = Arc::new(TableInfo {
            oid,
            name: name.clone(),
            schema,
            heap,
        });
        self.tables.insert(oid, info.clone());
        self.table_names.insert(name, oid);
        Ok(info)
    }

    pub fn get_table(&self, oid: TableOid) -> Option<Arc<TableInfo>> {
        self.tables.get(&oid).cloned()
    }

    pub fn get_table_by_name(&self, name: &str) -> Option<Arc<TableInfo>> {
        self.table_names
            .get(name)
            .and_then(|oid| self.tables.get(oid))
            .cloned()
    }

    /// Create an extendible-hash index over one integer column of the
    /// table.
    pub fn create_index(
        &mut self,
        index_name: impl Into<String>,
        table_name: &str,
        key_attr: usize,
    ) -> Result<Arc<IndexInfo>, CatalogError> {
        let table = self
            .get_table_by_name(table_name)
            .ok_or_else(|| CatalogError::TableNotFound(table_name.to_string()))?;
        if key_attr >= table.schema.column_count() {
            return Err(CatalogError::ColumnOutOfRange(key_attr));
        }

        let index = Arc::new(ExtendibleHashTable::new(self.buffer_pool.clone())?);
        let info = Arc::new(IndexInfo {
            name: index_name.into(),
            table_name: table_name.to_string(),
            key_attr,
            index,
        });
        self.indexes
            .entry(table_name.to_string())
            .or_default()
            .push(info.clone());
        Ok(info)
    }

    pub fn table_indexes(&self, table_name: &str) -> Vec<Arc<IndexInfo>> {
        self.indexes.get(table_name).cloned().unwrap_or_default()
    }
}
