// Distinct Operator
//
// Suppresses rows whose full value vector has already been emitted.

use std::collections::HashSet;

use crate::common::types::Rid;
use crate::query::executor::operators::Operator;
use crate::query::executor::result::{DataValue, QueryResult, Tuple};

pub struct DistinctOperator {
    child: Box<dyn Operator>,
    seen: HashSet<Vec<DataValue>>,
}

impl DistinctOperator {
    pub fn new(child: Box<dyn Operator>) -> Self {
        DistinctOperator {
            child,
            seen: HashSet::new(),
        }
    }
}

impl Operator for DistinctOperator {
    fn init(&mut self) -> QueryResult<()> {
        self.seen.clear();
        self.child.init()
    }

    fn next(&mut self) -> QueryResult<Option<(Tuple, Rid)>> {
        while let Some((tuple, rid)) = self.child.next()? {
            if self.seen.insert(tuple.values().to_vec()) {
                return Ok(Some((tuple, rid)));
            }
        }
        Ok(None)
    }

    fn close(&mut self) -> QueryResult<()> {
        self.seen.clear();
        self.child.close()
    }
}
