// Sequential Scan Operator
//
// Walks a table heap under the executing transaction, applying the plan's
// predicate and projecting the output schema. The original RID of each
// qualifying row is passed through for downstream DML operators.

use std::sync::Arc;

use crate::catalog::TableInfo;
use crate::common::types::Rid;
use crate::query::executor::context::ExecutorContext;
use crate::query::executor::operators::Operator;
use crate::query::executor::result::{QueryError, QueryResult, Tuple};
use crate::query::plan::SeqScanPlan;
use crate::storage::table::TableIterator;
use crate::transaction::concurrency::IsolationLevel;

pub struct SeqScanOperator {
    plan: SeqScanPlan,
    ctx: ExecutorContext,
    table: Option<Arc<TableInfo>>,
    iter: Option<TableIterator>,
}

impl SeqScanOperator {
    pub fn new(plan: SeqScanPlan, ctx: ExecutorContext) -> Self {
        SeqScanOperator {
            plan,
            ctx,
            table: None,
            iter: None,
        }
    }
}

impl Operator for SeqScanOperator {
    fn init(&mut self) -> QueryResult<()> {
        let catalog = self
            .ctx
            .catalog
            .read()
            .map_err(|_| QueryError::CatalogError("catalog lock poisoned".to_string()))?;
        let table = catalog
            .get_table(self.plan.table_oid)
            .ok_or_else(|| QueryError::TableNotFound(format!("oid {}", self.plan.table_oid)))?;
        self.iter = Some(table.heap.iter());
        self.table = Some(table);
        Ok(())
    }

    fn next(&mut self) -> QueryResult<Option<(Tuple, Rid)>> {
        let iter = match self.iter.as_mut() {
            Some(iter) => iter,
            None => return Ok(None),
        };

        for item in iter {
            let (rid, bytes) = item?;

            let locked_here = {
                if self.ctx.txn.isolation_level() == IsolationLevel::ReadUncommitted {
                    false
                } else if self.ctx.txn.is_shared_locked(rid)
                    || self.ctx.txn.is_exclusive_locked(rid)
                {
                    false
                } else {
                    self.ctx.lock_manager.lock_shared(&self.ctx.txn, rid)?;
                    true
                }
            };

            let tuple = Tuple::from_bytes(&bytes)?;
            let qualifies = match &self.plan.predicate {
                Some(predicate) => predicate
                    .evaluate(&tuple, &self.plan.output_schema)?
                    .is_true(),
                None => true,
            };

            // ReadCommitted drops the read lock as soon as the row has
            // been examined.
            if locked_here && self.ctx.txn.isolation_level() == IsolationLevel::ReadCommitted {
                self.ctx.lock_manager.unlock(&self.ctx.txn, rid);
            }

            if qualifies {
                let values = self
                    .plan
                    .output_exprs
                    .iter()
                    .map(|expr| expr.evaluate(&tuple, &self.plan.output_schema))
                    .collect::<QueryResult<Vec<_>>>()?;
                return Ok(Some((Tuple::new(values), rid)));
            }
        }

        Ok(None)
    }

    fn close(&mut self) -> QueryResult<()> {
        self.iter = None;
        self.table = None;
        Ok(())
    }
}
