use serde_json::Value as JsonValue;
use crate::query::ast::{
    BooleanOperator, CompositeQuery, FieldOperator, FieldQuery, Metadata, QueryAst, Value, CONTENT_TYPES,
};

/// Rewrite applied to a single node whose children are already optimized.
/// Returns `None` when the rule leaves the node unchanged.
pub trait OptimizationRule: Send + Sync {
    fn name(&self) -> &str;
    fn optimize(&self, node: &QueryAst) -> Option<QueryAst>;
}

/// Rule: resolve juxtaposition with the configured default operator
pub struct ImplicitOperatorRule {
    pub operator: BooleanOperator,
}

impl OptimizationRule for ImplicitOperatorRule {
    fn name(&self) -> &str {
        "implicit_operator"
    }

    fn optimize(&self, node: &QueryAst) -> Option<QueryAst> {
        match node {
            QueryAst::Implicit(composite) => Some(match self.operator {
                BooleanOperator::And => QueryAst::And(composite.clone()),
                BooleanOperator::Or => QueryAst::Or(composite.clone()),
            }),
            _ => None,
        }
    }
}

/// Rule: NOT NOT x => x
pub struct DoubleNegationRule;

impl OptimizationRule for DoubleNegationRule {
    fn name(&self) -> &str {
        "double_negation"
    }

    fn optimize(&self, node: &QueryAst) -> Option<QueryAst> {
        match node {
            QueryAst::Not(outer) => match outer.query.as_ref() {
                QueryAst::Not(inner) => Some(inner.query.as_ref().clone()),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Rule: a composite with a single child is that child
pub struct UnwrapSingleRule;

impl OptimizationRule for UnwrapSingleRule {
    fn name(&self) -> &str {
        "unwrap_single"
    }

    fn optimize(&self, node: &QueryAst) -> Option<QueryAst> {
        match node {
            QueryAst::And(c) | QueryAst::Or(c) | QueryAst::Implicit(c) if c.queries.len() == 1 => {
                Some(c.queries[0].clone())
            }
            _ => None,
        }
    }
}

/// Rule: cluster clauses on the same field together, in order of first
/// appearance. Under `Or`, equality clauses on one field collapse into a
/// single `IN`, and inequality clauses into a single `NOT IN`.
pub struct FieldGroupingRule;

impl FieldGroupingRule {
    fn group(queries: &[QueryAst]) -> Vec<Vec<QueryAst>> {
        let mut groups: Vec<(Option<String>, Vec<QueryAst>)> = Vec::new();
        for query in queries {
            let key = match query {
                QueryAst::Field(FieldQuery { name: Some(name), .. }) => Some(name.clone()),
                _ => None,
            };
            match key {
                Some(ref name) => {
                    if let Some((_, members)) = groups.iter_mut().find(|(k, _)| k.as_deref() == Some(name.as_str())) {
                        members.push(query.clone());
                    } else {
                        groups.push((key, vec![query.clone()]));
                    }
                }
                None => groups.push((None, vec![query.clone()])),
            }
        }
        groups.into_iter().map(|(_, members)| members).collect()
    }

    fn merge_disjunction(members: Vec<QueryAst>) -> Vec<QueryAst> {
        if members.len() < 2 {
            return members;
        }

        let is_positive = |op: FieldOperator| matches!(op, FieldOperator::Equals | FieldOperator::None | FieldOperator::In);
        let is_negative = |op: FieldOperator| matches!(op, FieldOperator::NotEquals | FieldOperator::NotIn);
        let count = |pred: &dyn Fn(FieldOperator) -> bool| {
            members.iter().filter(|q| matches!(q, QueryAst::Field(f) if pred(f.operator))).count()
        };
        let merge_positive = count(&is_positive) >= 2;
        let merge_negative = count(&is_negative) >= 2;

        let mut out: Vec<QueryAst> = Vec::with_capacity(members.len());
        let mut positive_slot: Option<usize> = None;
        let mut negative_slot: Option<usize> = None;

        for member in members {
            let field = match member {
                QueryAst::Field(field) => field,
                other => {
                    out.push(other);
                    continue;
                }
            };

            let (merge, slot, operator) = if merge_positive && is_positive(field.operator) {
                (true, &mut positive_slot, FieldOperator::In)
            } else if merge_negative && is_negative(field.operator) {
                (true, &mut negative_slot, FieldOperator::NotIn)
            } else {
                (false, &mut positive_slot, field.operator)
            };

            if !merge {
                out.push(QueryAst::Field(field));
                continue;
            }

            match *slot {
                Some(index) => {
                    if let QueryAst::Field(merged) = &mut out[index] {
                        append_unique(&mut merged.value, field.value);
                    }
                }
                None => {
                    let mut value = Value::List(Vec::new());
                    append_unique(&mut value, field.value);
                    *slot = Some(out.len());
                    out.push(QueryAst::Field(FieldQuery {
                        name: field.name,
                        operator,
                        value,
                        metadata: field.metadata,
                    }));
                }
            }
        }
        out
    }
}

fn append_unique(target: &mut Value, value: Value) {
    if let Value::List(existing) = target {
        for v in value.into_values() {
            for flat in Value::list(vec![v]).into_values() {
                if !existing.contains(&flat) {
                    existing.push(flat);
                }
            }
        }
    }
}

impl OptimizationRule for FieldGroupingRule {
    fn name(&self) -> &str {
        "field_grouping"
    }

    fn optimize(&self, node: &QueryAst) -> Option<QueryAst> {
        let (composite, disjunction) = match node {
            QueryAst::And(c) => (c, false),
            QueryAst::Or(c) => (c, true),
            _ => return None,
        };

        let groups = Self::group(&composite.queries);
        let queries: Vec<QueryAst> = if disjunction {
            groups.into_iter().flat_map(Self::merge_disjunction).collect()
        } else {
            groups.into_iter().flatten().collect()
        };

        if queries == composite.queries {
            return None;
        }

        let rebuilt = CompositeQuery { queries, metadata: composite.metadata.clone() };
        Some(if disjunction { QueryAst::Or(rebuilt) } else { QueryAst::And(rebuilt) })
    }
}

/// Rule: tag conjunctions with the content types their children pin down
pub struct ContentTypeScopeRule {
    pub field: String,
}

impl ContentTypeScopeRule {
    fn collect(&self, queries: &[QueryAst]) -> Vec<String> {
        let mut content_types = Vec::new();
        for query in queries {
            let field = match query {
                QueryAst::Field(f) if f.name.as_deref() == Some(self.field.as_str()) => f,
                _ => continue,
            };
            if !matches!(field.operator, FieldOperator::Equals | FieldOperator::In) {
                continue;
            }
            for value in field.value.clone().into_values() {
                let name = match value {
                    Value::String(s) | Value::Phrase(s) => s,
                    _ => continue,
                };
                if !content_types.contains(&name) {
                    content_types.push(name);
                }
            }
        }
        content_types
    }
}

impl OptimizationRule for ContentTypeScopeRule {
    fn name(&self) -> &str {
        "content_type_scope"
    }

    fn optimize(&self, node: &QueryAst) -> Option<QueryAst> {
        let composite = match node {
            QueryAst::And(c) => c,
            _ => return None,
        };

        let content_types = self.collect(&composite.queries);
        if content_types.is_empty() || composite.metadata.content_types().as_ref() == Some(&content_types) {
            return None;
        }

        let mut metadata: Metadata = composite.metadata.clone();
        metadata.insert(CONTENT_TYPES, JsonValue::from(content_types));
        Some(QueryAst::And(CompositeQuery { queries: composite.queries.clone(), metadata }))
    }
}

/// Bottom-up rule driver. Each node is rewritten to a fixpoint after its
/// children, so running the optimizer twice changes nothing.
pub struct QueryOptimizer {
    pub rules: Vec<Box<dyn OptimizationRule>>,
}

impl QueryOptimizer {
    pub fn new(default_operator: BooleanOperator, content_type_field: &str) -> Self {
        QueryOptimizer {
            rules: vec![
                Box::new(ImplicitOperatorRule { operator: default_operator }),
                Box::new(DoubleNegationRule),
                Box::new(FieldGroupingRule),
                Box::new(UnwrapSingleRule),
                Box::new(ContentTypeScopeRule { field: content_type_field.to_string() }),
            ],
        }
    }

    pub fn optimize(&self, ast: QueryAst) -> QueryAst {
        let node = match ast {
            QueryAst::And(c) => QueryAst::And(self.optimize_composite(c)),
            QueryAst::Or(c) => QueryAst::Or(self.optimize_composite(c)),
            QueryAst::Implicit(c) => QueryAst::Implicit(self.optimize_composite(c)),
            QueryAst::Not(mut not) => {
                *not.query = self.optimize(*not.query);
                QueryAst::Not(not)
            }
            QueryAst::Ordered(mut ordered) => {
                *ordered.query = self.optimize(*ordered.query);
                return QueryAst::Ordered(ordered);
            }
            field @ QueryAst::Field(_) => field,
        };
        self.rewrite(node)
    }

    fn optimize_composite(&self, composite: CompositeQuery) -> CompositeQuery {
        CompositeQuery {
            queries: composite.queries.into_iter().map(|q| self.optimize(q)).collect(),
            metadata: composite.metadata,
        }
    }

    fn rewrite(&self, mut node: QueryAst) -> QueryAst {
        loop {
            let mut changed = false;
            for rule in &self.rules {
                if let Some(rewritten) = rule.optimize(&node) {
                    tracing::trace!(rule = rule.name(), "query rewritten");
                    // A rewrite can expose an unoptimized shape, e.g. NOT NOT
                    // revealing a composite that now needs unwrapping.
                    node = rewritten;
                    changed = true;
                }
            }
            if !changed {
                return node;
            }
        }
    }
}

pub fn optimize(ast: QueryAst, default_operator: BooleanOperator) -> QueryAst {
    QueryOptimizer::new(default_operator, "$contentType").optimize(ast)
}
