// Hash-based Aggregation Operator
//
// Drains the child into a hash table keyed by the group-by expressions,
// folding each row into per-group accumulators, then iterates the groups
// applying the HAVING filter and the output projection.

use linked_hash_map::LinkedHashMap;

use crate::common::types::{Rid, INVALID_PAGE_ID};
use crate::query::executor::operators::Operator;
use crate::query::executor::result::{DataValue, QueryError, QueryResult, Tuple};
use crate::query::plan::{AggregateType, AggregationPlan};

pub struct HashAggregationOperator {
    plan: AggregationPlan,
    child: Box<dyn Operator>,
    // LinkedHashMap keeps group output order deterministic
    groups: LinkedHashMap<Vec<DataValue>, Vec<DataValue>>,
    built: bool,
    results: Vec<(Vec<DataValue>, Vec<DataValue>)>,
    cursor: usize,
}

impl HashAggregationOperator {
    pub fn new(plan: AggregationPlan, child: Box<dyn Operator>) -> Self {
        HashAggregationOperator {
            plan,
            child,
            groups: LinkedHashMap::new(),
            built: false,
            results: Vec::new(),
            cursor: 0,
        }
    }

    fn build(&mut self) -> QueryResult<()> {
        while let Some((tuple, _)) = self.child.next()? {
            let key = self
                .plan
                .group_bys
                .iter()
                .map(|expr| expr.evaluate(&tuple, &self.plan.input_schema))
                .collect::<QueryResult<Vec<_>>>()?;

            let inputs = self
                .plan
                .aggregates
                .iter()
                .map(|(_, expr)| expr.evaluate(&tuple, &self.plan.input_schema))
                .collect::<QueryResult<Vec<_>>>()?;

            let initial = self.plan.generate_initial_aggregate_value();
            let accumulators = self.groups.entry(key).or_insert(initial);
            combine(&self.plan, accumulators, &inputs)?;
        }

        self.results = self
            .groups
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        self.built = true;
        Ok(())
    }
}

/// Fold one row's aggregate inputs into the group's accumulators.
fn combine(
    plan: &AggregationPlan,
    accumulators: &mut [DataValue],
    inputs: &[DataValue],
) -> QueryResult<()> {
    for (idx, (agg_type, _)) in plan.aggregates.iter().enumerate() {
        let input = &inputs[idx];
        let acc = &mut accumulators[idx];
        match agg_type {
            AggregateType::Count => {
                if let DataValue::Integer(count) = acc {
                    *count += 1;
                }
            }
            AggregateType::Sum => match (&*acc, input) {
                (DataValue::Integer(a), DataValue::Integer(b)) => {
                    *acc = DataValue::Integer(a + b);
                }
                (DataValue::Integer(a), DataValue::Float(b)) => {
                    *acc = DataValue::Float(*a as f64 + b);
                }
                (DataValue::Float(a), DataValue::Integer(b)) => {
                    *acc = DataValue::Float(a + *b as f64);
                }
                (DataValue::Float(a), DataValue::Float(b)) => {
                    *acc = DataValue::Float(a + b);
                }
                (_, DataValue::Null) => {}
                (a, b) => {
                    return Err(QueryError::TypeError(format!(
                        "cannot SUM {:?} and {:?}",
                        a, b
                    )))
                }
            },
            AggregateType::Min => {
                if *input != DataValue::Null && (*acc == DataValue::Null || *input < *acc) {
                    *acc = input.clone();
                }
            }
            AggregateType::Max => {
                if *input != DataValue::Null && (*acc == DataValue::Null || *input > *acc) {
                    *acc = input.clone();
                }
            }
        }
    }
    Ok(())
}

impl Operator for HashAggregationOperator {
    fn init(&mut self) -> QueryResult<()> {
        self.child.init()?;
        if !self.built {
            self.build()?;
        }
        self.cursor = 0;
        Ok(())
    }

    fn next(&mut self) -> QueryResult<Option<(Tuple, Rid)>> {
        while self.cursor < self.results.len() {
            let (group_bys, aggregates) = &self.results[self.cursor];
            self.cursor += 1;

            if let Some(having) = &self.plan.having {
                if !having.evaluate_aggregate(group_bys, aggregates)?.is_true() {
                    continue;
                }
            }

            let values = self
                .plan
                .output_exprs
                .iter()
                .map(|expr| expr.evaluate_aggregate(group_bys, aggregates))
                .collect::<QueryResult<Vec<_>>>()?;

            // Aggregated rows have no backing record
            return Ok(Some((Tuple::new(values), Rid::new(INVALID_PAGE_ID, 0))));
        }
        Ok(None)
    }

    fn close(&mut self) -> QueryResult<()> {
        self.child.close()?;
        self.cursor = 0;
        Ok(())
    }
}
