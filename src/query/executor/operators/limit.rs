// Limit Operator
//
// Passes through at most `limit` rows from its child.

use crate::common::types::Rid;
use crate::query::executor::operators::Operator;
use crate::query::executor::result::{QueryResult, Tuple};
use crate::query::plan::LimitPlan;

pub struct LimitOperator {
    plan: LimitPlan,
    child: Box<dyn Operator>,
    emitted: usize,
}

impl LimitOperator {
    pub fn new(plan: LimitPlan, child: Box<dyn Operator>) -> Self {
        LimitOperator {
            plan,
            child,
            emitted: 0,
        }
    }
}

impl Operator for LimitOperator {
    fn init(&mut self) -> QueryResult<()> {
        self.emitted = 0;
        self.child.init()
    }

    fn next(&mut self) -> QueryResult<Option<(Tuple, Rid)>> {
        if self.emitted >= self.plan.limit {
            return Ok(None);
        }
        match self.child.next()? {
            Some(row) => {
                self.emitted += 1;
                Ok(Some(row))
            }
            None => Ok(None),
        }
    }

    fn close(&mut self) -> QueryResult<()> {
        self.child.close()
    }
}
