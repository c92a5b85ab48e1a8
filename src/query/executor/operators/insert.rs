// Insert Operator
//
// Inserts rows into a table heap, either raw values carried in the plan
// or rows streamed from a child operator, and maintains every index on
// the table.

use std::sync::Arc;

use crate::catalog::{IndexInfo, TableInfo};
use crate::common::types::Rid;
use crate::query::executor::context::ExecutorContext;
use crate::query::executor::operators::Operator;
use crate::query::executor::result::{QueryError, QueryResult, Tuple};
use crate::query::plan::{InsertPlan, InsertSource};

pub struct InsertOperator {
    plan: InsertPlan,
    ctx: ExecutorContext,
    child: Option<Box<dyn Operator>>,
    table: Option<Arc<TableInfo>>,
    indexes: Vec<Arc<IndexInfo>>,
    next_raw: usize,
}

impl InsertOperator {
    pub fn new(plan: InsertPlan, ctx: ExecutorContext, child: Option<Box<dyn Operator>>) -> Self {
        InsertOperator {
            plan,
            ctx,
            child,
            table: None,
            indexes: Vec::new(),
            next_raw: 0,
        }
    }

    fn source_tuple(&mut self) -> QueryResult<Option<Tuple>> {
        match &self.plan.source {
            InsertSource::Raw(rows) => {
                if self.next_raw < rows.len() {
                    let tuple = Tuple::new(rows[self.next_raw].clone());
                    self.next_raw += 1;
                    Ok(Some(tuple))
                } else {
                    Ok(None)
                }
            }
            InsertSource::Child => match self.child.as_mut() {
                Some(child) => Ok(child.next()?.map(|(tuple, _)| tuple)),
                None => Err(QueryError::InvalidOperation(
                    "insert plan streams from a child but none was supplied".to_string(),
                )),
            },
        }
    }
}

impl Operator for InsertOperator {
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
        self.next_raw = 0;
        if let Some(child) = self.child.as_mut() {
            child.init()?;
        }
        Ok(())
    }

    fn next(&mut self) -> QueryResult<Option<(Tuple, Rid)>> {
        let tuple = match self.source_tuple()? {
            Some(tuple) => tuple,
            None => return Ok(None),
        };

        let table = match self.table.as_ref() {
            Some(table) => table,
            None => {
                return Err(QueryError::InvalidOperation(
                    "insert operator used before init".to_string(),
                ))
            }
        };

        let rid = table.heap.insert_tuple(&tuple.to_bytes()?)?;
        self.ctx.lock_manager.lock_exclusive(&self.ctx.txn, rid)?;

        for index in &self.indexes {
            let key = index.key_from_tuple(&tuple)?;
            index.index.insert(&key, &rid)?;
        }

        Ok(Some((tuple, rid)))
    }
}
