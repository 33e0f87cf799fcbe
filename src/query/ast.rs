use std::collections::BTreeMap;
use std::fmt;
use chrono::{DateTime, Datelike, FixedOffset, Months, NaiveTime, TimeDelta, TimeZone, Utc};
use serde::{Serialize, Deserialize};
use serde_json::Value as JsonValue;

/// Operator used to resolve implicit juxtaposition (`a b`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BooleanOperator {
    And,
    Or,
}

/// Metadata key holding the content types an `And` node is scoped to.
pub const CONTENT_TYPES: &str = "contentTypes";

/// Open string-keyed bag attached to every node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata(BTreeMap<String, JsonValue>);

impl Metadata {
    pub fn new() -> Self {
        Metadata(BTreeMap::new())
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: JsonValue) {
        self.0.insert(key.into(), value);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn content_types(&self) -> Option<Vec<String>> {
        let list = self.0.get(CONTENT_TYPES)?.as_array()?;
        Some(list.iter().filter_map(|v| v.as_str().map(String::from)).collect())
    }

    pub fn set_content_types(&mut self, content_types: Vec<String>) {
        self.insert(CONTENT_TYPES, JsonValue::from(content_types));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldOperator {
    None,
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEquals,
    LessThan,
    LessThanOrEquals,
    In,
    NotIn,
    Similar,
    NotSimilar,
}

impl FieldOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            FieldOperator::None => "",
            FieldOperator::Equals => "=",
            FieldOperator::NotEquals => "!=",
            FieldOperator::GreaterThan => ">",
            FieldOperator::GreaterThanOrEquals => ">=",
            FieldOperator::LessThan => "<",
            FieldOperator::LessThanOrEquals => "<=",
            FieldOperator::In => "IN",
            FieldOperator::NotIn => "NOT IN",
            FieldOperator::Similar => "~",
            FieldOperator::NotSimilar => "!~",
        }
    }

    pub fn is_ordering(&self) -> bool {
        matches!(self,
            FieldOperator::GreaterThan | FieldOperator::GreaterThanOrEquals |
            FieldOperator::LessThan | FieldOperator::LessThanOrEquals)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateTimeKind {
    Date,       // Whole day, e.g. 2014-09-10
    DateTime,   // Instant
}

/// Anchor of a relative date expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetAnchor {
    Now,
    Today,
}

/// Relative time like `+2days`, `NOW-7d` or `TODAY+1w2d`, resolved at lowering.
#[derive(Debug, Clone, PartialEq)]
pub struct OffsetDateTime {
    pub raw: String,
    pub anchor: OffsetAnchor,
    pub months: i32,
    pub offset: TimeDelta,
}

impl OffsetDateTime {
    pub fn resolve(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let base = match self.anchor {
            OffsetAnchor::Now => now,
            OffsetAnchor::Today => Utc.from_utc_datetime(&now.date_naive().and_time(NaiveTime::MIN)),
        };
        let shifted = if self.months >= 0 {
            base.checked_add_months(Months::new(self.months as u32))?
        } else {
            base.checked_sub_months(Months::new(self.months.unsigned_abs()))?
        };
        shifted.checked_add_signed(self.offset)
    }

    /// Kind of the resolved value: `TODAY` expressions address whole days.
    pub fn kind(&self) -> DateTimeKind {
        match self.anchor {
            OffsetAnchor::Today => DateTimeKind::Date,
            OffsetAnchor::Now => DateTimeKind::DateTime,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Wildcard(String),
    Phrase(String),
    Number(f64),
    Integer(i64),
    DateTime { value: DateTime<FixedOffset>, kind: DateTimeKind },
    Offset(OffsetDateTime),
    MatchAll,
    List(Vec<Value>),
}

impl Value {
    /// Flattened list of values; nested lists are spliced in.
    pub fn list(values: Vec<Value>) -> Value {
        let mut flat = Vec::with_capacity(values.len());
        for value in values {
            match value {
                Value::List(inner) => {
                    if let Value::List(inner) = Value::list(inner) {
                        flat.extend(inner);
                    }
                }
                other => flat.push(other),
            }
        }
        Value::List(flat)
    }

    /// Values as a flat sequence; a scalar yields itself.
    pub fn into_values(self) -> Vec<Value> {
        match self {
            Value::List(values) => values,
            other => vec![other],
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::String(s) | Value::Wildcard(s) => write!(f, "{}", s),
            Value::Phrase(s) => write!(f, "\"{}\"", s.replace('"', "\\\"")),
            Value::Number(n) => write!(f, "{}", n),
            Value::Integer(i) => write!(f, "{}", i),
            Value::DateTime { value, kind: DateTimeKind::Date } => {
                write!(f, "{:04}-{:02}-{:02}", value.year(), value.month(), value.day())
            }
            Value::DateTime { value, kind: DateTimeKind::DateTime } => write!(f, "{}", value.to_rfc3339()),
            Value::Offset(offset) => write!(f, "{}", offset.raw),
            Value::MatchAll => write!(f, "*"),
            Value::List(values) => {
                write!(f, "(")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                write!(f, ")")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldQuery {
    /// `None` for unfielded terms
    pub name: Option<String>,
    pub operator: FieldOperator,
    pub value: Value,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompositeQuery {
    pub queries: Vec<QueryAst>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotQuery {
    pub query: Box<QueryAst>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderField {
    pub name: String,
    pub direction: SortDirection,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub fields: Vec<OrderField>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderedQuery {
    pub query: Box<QueryAst>,
    pub ordering: OrderBy,
    pub metadata: Metadata,
}

/// Query tree produced by the parser and rewritten by the optimizer
#[derive(Debug, Clone, PartialEq)]
pub enum QueryAst {
    Field(FieldQuery),
    And(CompositeQuery),
    Or(CompositeQuery),
    /// Juxtaposed clauses; resolved to `And`/`Or` by the optimizer
    Implicit(CompositeQuery),
    Not(NotQuery),
    Ordered(OrderedQuery),
}

impl QueryAst {
    pub fn field(name: impl Into<String>, operator: FieldOperator, value: Value) -> Self {
        QueryAst::Field(FieldQuery {
            name: Some(name.into()),
            operator,
            value,
            metadata: Metadata::new(),
        })
    }

    pub fn unfielded(value: Value) -> Self {
        QueryAst::Field(FieldQuery {
            name: None,
            operator: FieldOperator::None,
            value,
            metadata: Metadata::new(),
        })
    }

    pub fn match_all() -> Self {
        QueryAst::unfielded(Value::MatchAll)
    }

    pub fn and(queries: Vec<QueryAst>) -> Self {
        QueryAst::And(CompositeQuery { queries, metadata: Metadata::new() })
    }

    pub fn or(queries: Vec<QueryAst>) -> Self {
        QueryAst::Or(CompositeQuery { queries, metadata: Metadata::new() })
    }

    pub fn implicit(queries: Vec<QueryAst>) -> Self {
        QueryAst::Implicit(CompositeQuery { queries, metadata: Metadata::new() })
    }

    pub fn not(query: QueryAst) -> Self {
        QueryAst::Not(NotQuery { query: Box::new(query), metadata: Metadata::new() })
    }

    pub fn ordered(query: QueryAst, fields: Vec<OrderField>) -> Self {
        QueryAst::Ordered(OrderedQuery {
            query: Box::new(query),
            ordering: OrderBy { fields, metadata: Metadata::new() },
            metadata: Metadata::new(),
        })
    }

    pub fn metadata(&self) -> &Metadata {
        match self {
            QueryAst::Field(q) => &q.metadata,
            QueryAst::And(q) | QueryAst::Or(q) | QueryAst::Implicit(q) => &q.metadata,
            QueryAst::Not(q) => &q.metadata,
            QueryAst::Ordered(q) => &q.metadata,
        }
    }

    pub fn metadata_mut(&mut self) -> &mut Metadata {
        match self {
            QueryAst::Field(q) => &mut q.metadata,
            QueryAst::And(q) | QueryAst::Or(q) | QueryAst::Implicit(q) => &mut q.metadata,
            QueryAst::Not(q) => &mut q.metadata,
            QueryAst::Ordered(q) => &mut q.metadata,
        }
    }

    /// Number of query nodes in the tree (ordering excluded).
    pub fn node_count(&self) -> usize {
        match self {
            QueryAst::Field(_) => 1,
            QueryAst::And(q) | QueryAst::Or(q) | QueryAst::Implicit(q) => {
                1 + q.queries.iter().map(QueryAst::node_count).sum::<usize>()
            }
            QueryAst::Not(q) => 1 + q.query.node_count(),
            QueryAst::Ordered(q) => 1 + q.query.node_count(),
        }
    }
}

impl fmt::Display for QueryAst {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fn join(f: &mut fmt::Formatter, queries: &[QueryAst], sep: &str) -> fmt::Result {
            write!(f, "(")?;
            for (i, q) in queries.iter().enumerate() {
                if i > 0 {
                    write!(f, "{}", sep)?;
                }
                write!(f, "{}", q)?;
            }
            write!(f, ")")
        }

        match self {
            QueryAst::Field(q) => match (&q.name, q.operator) {
                (None, _) => write!(f, "{}", q.value),
                (Some(name), FieldOperator::None) => write!(f, "{}: {}", name, q.value),
                (Some(name), op) => write!(f, "{} {} {}", name, op.symbol(), q.value),
            },
            QueryAst::And(q) => join(f, &q.queries, " AND "),
            QueryAst::Or(q) => join(f, &q.queries, " OR "),
            QueryAst::Implicit(q) => join(f, &q.queries, " "),
            QueryAst::Not(q) => write!(f, "NOT {}", q.query),
            QueryAst::Ordered(q) => {
                write!(f, "{} ORDER BY ", q.query)?;
                for (i, field) in q.ordering.fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    let dir = match field.direction {
                        SortDirection::Ascending => "ASC",
                        SortDirection::Descending => "DESC",
                    };
                    write!(f, "{} {}", field.name, dir)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_construction_flattens_nested_lists() {
        let list = Value::list(vec![
            Value::Integer(1),
            Value::List(vec![Value::Integer(2), Value::List(vec![Value::Integer(3)])]),
        ]);
        assert_eq!(list, Value::List(vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]));
    }

    #[test]
    fn today_offsets_resolve_from_midnight() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 13, 45, 0).unwrap();
        let offset = OffsetDateTime {
            raw: "TODAY-1d".to_string(),
            anchor: OffsetAnchor::Today,
            months: 0,
            offset: TimeDelta::days(-1),
        };
        assert_eq!(offset.resolve(now).unwrap(), Utc.with_ymd_and_hms(2024, 3, 14, 0, 0, 0).unwrap());
        assert_eq!(offset.kind(), DateTimeKind::Date);
    }

    #[test]
    fn month_offsets_use_calendar_arithmetic() {
        let now = Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap();
        let offset = OffsetDateTime {
            raw: "+1month".to_string(),
            anchor: OffsetAnchor::Now,
            months: 1,
            offset: TimeDelta::zero(),
        };
        assert_eq!(offset.resolve(now).unwrap(), Utc.with_ymd_and_hms(2024, 2, 29, 0, 0, 0).unwrap());
    }

    #[test]
    fn content_types_round_trip_through_metadata() {
        let mut metadata = Metadata::new();
        metadata.set_content_types(vec!["person".to_string(), "car".to_string()]);
        assert_eq!(metadata.content_types().unwrap(), vec!["person", "car"]);
    }

    #[test]
    fn node_count_includes_composites() {
        let ast = QueryAst::and(vec![
            QueryAst::field("age", FieldOperator::Equals, Value::Integer(20)),
            QueryAst::not(QueryAst::field("name", FieldOperator::Equals, Value::String("Peter".into()))),
        ]);
        assert_eq!(ast.node_count(), 4);
    }
}
