// Delete Operator
//
// Streams rows from a child, marks each deleted in the table heap and
// removes its index entries.

use std::sync::Arc;

use crate::catalog::{IndexInfo, TableInfo};
use crate::common::types::Rid;
use crate::query::executor::context::ExecutorContext;
use crate::query::executor::operators::Operator;
use crate::query::executor::result::{QueryError, QueryResult, Tuple};
use crate::query::plan::DeletePlan;

pub struct DeleteOperator {
    plan: DeletePlan,
    ctx: ExecutorContext,
    child: Box<dyn Operator>,
    table: Option<Arc<TableInfo>>,
    indexes: Vec<Arc<IndexInfo>>,
}

impl DeleteOperator {
    pub fn new(plan: DeletePlan, ctx: ExecutorContext, child: Box<dyn Operator>) -> Self {
        DeleteOperator {
            plan,
            ctx,
            child,
            table: None,
            indexes: Vec::new(),
        }
    }

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

impl Operator for DeleteOperator {
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
        let (tuple, rid) = match self.child.next()? {
            Some(row) => row,
            None => return Ok(None),
        };

        let table = match self.table.as_ref() {
            Some(table) => table.clone(),
            None => {
                return Err(QueryError::InvalidOperation(
                    "delete operator used before init".to_string(),
                ))
            }
        };

        self.lock_for_write(rid)?;
        table.heap.mark_delete(rid)?;

        for index in &self.indexes {
            let key = index.key_from_tuple(&tuple)?;
            index.index.remove(&key, &rid)?;
        }

        Ok(Some((tuple, rid)))
    }
}
