// Hash Join Implementation
//
// Build-probe equality join: the left child is drained into a hash table
// keyed by the left join expression; each right row probes it with the
// key evaluated on the tuple the right child just produced, and every
// stored left row is emitted against it through a per-call cursor.

use std::collections::HashMap;

use crate::common::types::Rid;
use crate::query::executor::operators::Operator;
use crate::query::executor::result::{DataValue, QueryResult, Tuple};
use crate::query::plan::HashJoinPlan;

pub struct HashJoinOperator {
    plan: HashJoinPlan,
    left: Box<dyn Operator>,
    right: Box<dyn Operator>,
    hash_table: HashMap<DataValue, Vec<(Tuple, Rid)>>,
    hash_table_built: bool,
    current_right: Option<Tuple>,
    current_matches: Vec<(Tuple, Rid)>,
    current_match_index: usize,
}

impl HashJoinOperator {
    pub fn new(plan: HashJoinPlan, left: Box<dyn Operator>, right: Box<dyn Operator>) -> Self {
        HashJoinOperator {
            plan,
            left,
            right,
            hash_table: HashMap::new(),
            hash_table_built: false,
            current_right: None,
            current_matches: Vec::new(),
            current_match_index: 0,
        }
    }

    /// Drain the left child into the hash table.
    fn build_hash_table(&mut self) -> QueryResult<()> {
        while let Some((tuple, rid)) = self.left.next()? {
            let key = self.plan.left_key.evaluate(&tuple, &self.plan.left_schema)?;
            self.hash_table.entry(key).or_default().push((tuple, rid));
        }
        self.hash_table_built = true;
        Ok(())
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

impl Operator for HashJoinOperator {
    fn init(&mut self) -> QueryResult<()> {
        self.left.init()?;
        self.right.init()?;
        if !self.hash_table_built {
            self.build_hash_table()?;
        }
        self.current_right = None;
        self.current_matches.clear();
        self.current_match_index = 0;
        Ok(())
    }

    fn next(&mut self) -> QueryResult<Option<(Tuple, Rid)>> {
        loop {
            if self.current_match_index < self.current_matches.len() {
                let (left_tuple, left_rid) =
                    self.current_matches[self.current_match_index].clone();
                self.current_match_index += 1;

                let right_tuple = match &self.current_right {
                    Some(tuple) => tuple,
                    None => continue,
                };
                let tuple = self.project(&left_tuple, right_tuple)?;
                return Ok(Some((tuple, left_rid)));
            }

            match self.right.next()? {
                None => return Ok(None),
                Some((right_tuple, _)) => {
                    let key = self
                        .plan
                        .right_key
                        .evaluate(&right_tuple, &self.plan.right_schema)?;
                    self.current_matches =
                        self.hash_table.get(&key).cloned().unwrap_or_default();
                    self.current_match_index = 0;
                    self.current_right = Some(right_tuple);
                }
            }
        }
    }

    fn close(&mut self) -> QueryResult<()> {
        self.left.close()?;
        self.right.close()?;
        self.current_matches.clear();
        self.current_right = None;
        Ok(())
    }
}
