// Nested Loop Join Implementation
//
// For every left row the right child is re-initialized and drained; each
// (left, right) pair passing the join predicate is projected through the
// plan's output expressions. The emitted RID is the left row's.

use crate::common::types::Rid;
use crate::query::executor::operators::Operator;
use crate::query::executor::result::{QueryResult, Tuple};
use crate::query::plan::NestedLoopJoinPlan;

pub struct NestedLoopJoinOperator {
    plan: NestedLoopJoinPlan,
    left: Box<dyn Operator>,
    right: Box<dyn Operator>,
    current_left: Option<(Tuple, Rid)>,
}

impl NestedLoopJoinOperator {
    pub fn new(
        plan: NestedLoopJoinPlan,
        left: Box<dyn Operator>,
        right: Box<dyn Operator>,
    ) -> Self {
        NestedLoopJoinOperator {
            plan,
            left,
            right,
            current_left: None,
        }
    }

    fn project(&self, left_tuple: &Tuple, right_tuple: &Tuple) -> QueryResult<Tuple> {
        let values = self
            .plan
            .output_exprs
            .iter()
            .map(|expr| {
                expr.evaluate_join(
                    left_tuple,
                    &self.plan.left_schema,
                    right_tuple,
                    &self.plan.right_schema,
                )
            })
            .collect::<QueryResult<Vec<_>>>()?;
        Ok(Tuple::new(values))
    }
}

impl Operator for NestedLoopJoinOperator {
    fn init(&mut self) -> QueryResult<()> {
        self.left.init()?;
        self.right.init()?;
        self.current_left = self.left.next()?;
        Ok(())
    }

    fn next(&mut self) -> QueryResult<Option<(Tuple, Rid)>> {
        loop {
            let (left_tuple, left_rid) = match &self.current_left {
                Some(row) => row.clone(),
                None => return Ok(None),
            };

            match self.right.next()? {
                None => {
                    // Right side exhausted: advance the left row and
                    // rewind the right child.
                    self.current_left = self.left.next()?;
                    if self.current_left.is_some() {
                        self.right.init()?;
                    }
                }
                Some((right_tuple, _)) => {
                    let qualifies = match &self.plan.predicate {
                        Some(predicate) => predicate
                            .evaluate_join(
                                &left_tuple,
                                &self.plan.left_schema,
                                &right_tuple,
                                &self.plan.right_schema,
                            )?
                            .is_true(),
                        None => true,
                    };
                    if qualifies {
                        let tuple = self.project(&left_tuple, &right_tuple)?;
                        return Ok(Some((tuple, left_rid)));
                    }
                }
            }
        }
    }

    fn close(&mut self) -> QueryResult<()> {
        self.left.close()?;
        self.right.close()?;
        self.current_left = None;
        Ok(())
    }
}
