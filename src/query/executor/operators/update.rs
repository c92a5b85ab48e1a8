// Update Operator
//
// Streams rows from a child (typically a scan), rewrites the tuple per
// the plan's update actions, writes it back in place and refreshes every
// index entry.

use std::sync::Arc;

use crate::catalog::{IndexInfo, TableInfo};
use crate::common::types::Rid;
use crate::query::executor::context::ExecutorContext;
use crate::query::executor::operators::Operator;
use crate::query::executor::result::{DataValue, QueryError, QueryResult, Tuple};
use crate::query::plan::{UpdateInfo, UpdatePlan};

pub struct UpdateOperator {
    plan: UpdatePlan,
    ctx: ExecutorContext,
    child: Box<dyn Operator>,
    table: Option<Arc<TableInfo>>,
    indexes: Vec<Arc<IndexInfo>>,
}

impl UpdateOperator {
    pub fn new(plan: UpdatePlan, ctx: ExecutorContext, child: Box<dyn Operator>) -> Self {
        UpdateOperator {
            plan,
            ctx,
            child,
            table: None,
            indexes: Vec::new(),
        }
    }

    /// Build the updated tuple: untouched columns pass through, updated
    /// columns apply Set or Add.
    fn generate_updated_tuple(&self, src: &Tuple) -> QueryResult<Tuple> {
        let mut values = Vec::with_capacity(src.values().len());
        for (idx, value) in src.values().iter().enumerate() {
            match self.plan.update_attrs.get(&idx) {
                None => values.push(value.clone()),
                Some(UpdateInfo::Set(new_value)) => values.push(new_value.clone()),
                Some(UpdateInfo::Add(delta)) => match value {
                    DataValue::Integer(i) => values.push(DataValue::Integer(i + delta)),
                    other => {
                        return Err(QueryError::TypeError(format!(
                            "cannot add to non-integer value {:?}",
                            other
                        )))
                    }
                },
            }
        }
        Ok(Tuple::new(values))
    }

    /// Escalate the row lock for the write: upgrade a held shared lock,
    /// otherwise take exclusive directly.
    fn lock_for_write(&self, rid: Rid) -> QueryResult<()> {
        if self.ctx.txn.is_exclusive_locked(rid) {
            return Ok(());
        }
        if self.ctx.txn.is_shared_locked(rid) {
            self.ctx.lock_manager.lock_upgrade(&self.ctx.txn, rid)?;
        } else {
            self.ctx.lock_manager.lock_exclusive(&self.ctx.txn, rid)?;
        }
        Ok(())
    }
}

impl Operator for UpdateOperator {
    fn init(&mut self) -> QueryResult<()> {
        let (table, indexes) = {
            let catalog = self
                .ctx
                .catalog
                .read()
                .map_err(|_| QueryError::CatalogError("catalog lock poisoned".to_string()))?;
            let table = catalog
                .get_table(self.plan.table_oid)
                .ok_or_else(|| QueryError::TableNotFound(format!("oid {}", self.plan.table_oid)))?;
            let indexes = catalog.table_indexes(&table.name);
            (table, indexes)
        };
        self.table = Some(table);
        self.indexes = indexes;
        self.child.init()
    }

    fn next(&mut self) -> QueryResult<Option<(Tuple, Rid)>> {
        let (old_tuple, rid) = match self.child.next()? {
            Some(row) => row,
            None => return Ok(None),
        };

        let table = match self.table.as_ref() {
            Some(table) => table.clone(),
            None => {
                return Err(QueryError::InvalidOperation(
                    "update operator used before init".to_string(),
                ))
            }
        };

        self.lock_for_write(rid)?;

        let new_tuple = self.generate_updated_tuple(&old_tuple)?;
        table.heap.update_tuple(rid, &new_tuple.to_bytes()?)?;

        // Index entries follow the data: drop the old key, add the new.
        for index in &self.indexes {
            let old_key = index.key_from_tuple(&old_tuple)?;
            let new_key = index.key_from_tuple(&new_tuple)?;
            index.index.remove(&old_key, &rid)?;
            index.index.insert(&new_key, &rid)?;
        }

        Ok(Some((new_tuple, rid)))
    }
}
