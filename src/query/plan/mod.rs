// Physical Plan Nodes
//
// Immutable plan trees consumed by the execution operators. A planner
// would normally build these; here they arrive fully formed.

use std::collections::HashMap;

use crate::catalog::schema::Schema;
use crate::catalog::TableOid;
use crate::query::executor::result::DataValue;
use crate::query::expression::Expression;

/// Build the identity projection over a schema: one column reference per
/// column, in order.
pub fn identity_projection(schema: &Schema) -> Vec<Expression> {
    (0..schema.column_count()).map(Expression::column).collect()
}

/// Sequential scan with an optional predicate and a projection.
#[derive(Debug, Clone)]
pub struct SeqScanPlan {
    pub table_oid: TableOid,
    pub predicate: Option<Expression>,
    pub output_exprs: Vec<Expression>,
    pub output_schema: Schema,
}

/// Where an insert gets its rows from.
#[derive(Debug, Clone)]
pub enum InsertSource {
    /// Raw value lists carried in the plan
    Raw(Vec<Vec<DataValue>>),
    /// Rows streamed from a child operator
    Child,
}

#[derive(Debug, Clone)]
pub struct InsertPlan {
    pub table_oid: TableOid,
    pub source: InsertSource,
}

/// Per-attribute update action.
#[derive(Debug, Clone)]
pub enum UpdateInfo {
    Set(DataValue),
    Add(i64),
}

#[derive(Debug, Clone)]
pub struct UpdatePlan {
    pub table_oid: TableOid,
    /// Column index -> action; untouched columns keep their value
    pub update_attrs: HashMap<usize, UpdateInfo>,
}

#[derive(Debug, Clone)]
pub struct DeletePlan {
    pub table_oid: TableOid,
}

/// Nested-loop join; a missing predicate means a cross product.
#[derive(Debug, Clone)]
pub struct NestedLoopJoinPlan {
    pub predicate: Option<Expression>,
    pub left_schema: Schema,
    pub right_schema: Schema,
    pub output_exprs: Vec<Expression>,
    pub output_schema: Schema,
}

/// Hash join on a single equality; the left side builds, the right side
/// probes.
#[derive(Debug, Clone)]
pub struct HashJoinPlan {
    pub left_key: Expression,
    pub right_key: Expression,
    pub left_schema: Schema,
    pub right_schema: Schema,
    pub output_exprs: Vec<Expression>,
    pub output_schema: Schema,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateType {
    Count,
    Sum,
    Min,
    Max,
}

/// Hash aggregation over group-by expressions, with an optional HAVING
/// filter applied to the aggregated rows.
#[derive(Debug, Clone)]
pub struct AggregationPlan {
    pub group_bys: Vec<Expression>,
    pub aggregates: Vec<(AggregateType, Expression)>,
    pub having: Option<Expression>,
    pub input_schema: Schema,
    pub output_exprs: Vec<Expression>,
    pub output_schema: Schema,
}

impl AggregationPlan {
    /// Starting accumulator for each aggregate: counts and sums begin at
    /// zero, min/max begin undefined.
    pub fn generate_initial_aggregate_value(&self) -> Vec<DataValue> {
        self.aggregates
            .iter()
            .map(|(agg_type, _)| match agg_type {
                AggregateType::Count => DataValue::Integer(0),
                AggregateType::Sum => DataValue::Integer(0),
                AggregateType::Min | AggregateType::Max => DataValue::Null,
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct LimitPlan {
    pub limit: usize,
}
