// Expression Evaluation
//
// Expression trees evaluated against tuples. The same node works in three
// contexts: single-tuple predicates and projections, join predicates over
// a (left, right) pair, and aggregation output over (group-by, aggregate)
// value vectors.

use crate::catalog::schema::Schema;
use crate::query::executor::result::{DataValue, QueryError, QueryResult, Tuple};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

#[derive(Debug, Clone)]
pub enum Expression {
    /// Constant literal
    Constant(DataValue),
    /// Column reference; `tuple_idx` picks the left (0) or right (1) side
    /// of a join, and is ignored in single-tuple contexts.
    ColumnValue { tuple_idx: usize, col_idx: usize },
    /// Binary comparison producing a Boolean
    Comparison {
        op: ComparisonOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// Reference into aggregation output: a group-by term or an aggregate
    /// term, by position.
    AggregateValue { is_group_by: bool, term_idx: usize },
}

impl Expression {
    pub fn column(col_idx: usize) -> Self {
        Expression::ColumnValue {
            tuple_idx: 0,
            col_idx,
        }
    }

    pub fn join_column(tuple_idx: usize, col_idx: usize) -> Self {
        Expression::ColumnValue { tuple_idx, col_idx }
    }

    pub fn comparison(op: ComparisonOp, left: Expression, right: Expression) -> Self {
        Expression::Comparison {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Evaluate against a single tuple.
    pub fn evaluate(&self, tuple: &Tuple, schema: &Schema) -> QueryResult<DataValue> {
        match self {
            Expression::Constant(value) => Ok(value.clone()),
            Expression::ColumnValue { col_idx, .. } => Ok(tuple.value(*col_idx)?.clone()),
            Expression::Comparison { op, left, right } => {
                let lhs = left.evaluate(tuple, schema)?;
                let rhs = right.evaluate(tuple, schema)?;
                Ok(DataValue::Boolean(compare(*op, &lhs, &rhs)))
            }
            Expression::AggregateValue { .. } => Err(QueryError::InvalidOperation(
                "aggregate reference outside aggregation".to_string(),
            )),
        }
    }

    /// Evaluate against a joined (left, right) tuple pair.
    pub fn evaluate_join(
        &self,
        left_tuple: &Tuple,
        left_schema: &Schema,
        right_tuple: &Tuple,
        right_schema: &Schema,
    ) -> QueryResult<DataValue> {
        match self {
            Expression::Constant(value) => Ok(value.clone()),
            Expression::ColumnValue { tuple_idx, col_idx } => {
                let tuple = if *tuple_idx == 0 { left_tuple } else { right_tuple };
                Ok(tuple.value(*col_idx)?.clone())
            }
            Expression::Comparison { op, left, right } => {
                let lhs = left.evaluate_join(left_tuple, left_schema, right_tuple, right_schema)?;
                let rhs = right.evaluate_join(left_tuple, left_schema, right_tuple, right_schema)?;
                Ok(DataValue::Boolean(compare(*op, &lhs, &rhs)))
            }
            Expression::AggregateValue { .. } => Err(QueryError::InvalidOperation(
                "aggregate reference outside aggregation".to_string(),
            )),
        }
    }

    /// Evaluate against aggregation output.
    pub fn evaluate_aggregate(
        &self,
        group_bys: &[DataValue],
        aggregates: &[DataValue],
    ) -> QueryResult<DataValue> {
        match self {
            Expression::Constant(value) => Ok(value.clone()),
            Expression::AggregateValue {
                is_group_by,
                term_idx,
            } => {
                let source = if *is_group_by { group_bys } else { aggregates };
                source.get(*term_idx).cloned().ok_or_else(|| {
                    QueryError::ColumnNotFound(format!("aggregate term {}", term_idx))
                })
            }
            Expression::Comparison { op, left, right } => {
                let lhs = left.evaluate_aggregate(group_bys, aggregates)?;
                let rhs = right.evaluate_aggregate(group_bys, aggregates)?;
                Ok(DataValue::Boolean(compare(*op, &lhs, &rhs)))
            }
            Expression::ColumnValue { .. } => Err(QueryError::InvalidOperation(
                "column reference inside aggregation output".to_string(),
            )),
        }
    }
}

/// Three-valued-ish comparison: anything involving Null (or mismatched
/// types) compares false.
fn compare(op: ComparisonOp, lhs: &DataValue, rhs: &DataValue) -> bool {
    match op {
        ComparisonOp::Eq => lhs == rhs && *lhs != DataValue::Null,
        ComparisonOp::NotEq => lhs != rhs && *lhs != DataValue::Null && *rhs != DataValue::Null,
        ComparisonOp::Lt => matches!(lhs.partial_cmp(rhs), Some(std::cmp::Ordering::Less)),
        ComparisonOp::LtEq => matches!(
            lhs.partial_cmp(rhs),
            Some(std::cmp::Ordering::Less) | Some(std::cmp::Ordering::Equal)
        ),
        ComparisonOp::Gt => matches!(lhs.partial_cmp(rhs), Some(std::cmp::Ordering::Greater)),
        ComparisonOp::GtEq => matches!(
            lhs.partial_cmp(rhs),
            Some(std::cmp::Ordering::Greater) | Some(std::cmp::Ordering::Equal)
        ),
    }
}
