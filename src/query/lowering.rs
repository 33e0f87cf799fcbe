use chrono::{DateTime, NaiveTime, TimeDelta, Utc};
use crate::analysis::analyzer::AnalyzerRegistry;
use crate::core::error::{Error, Result};
use crate::core::types::FieldType;
use crate::fields::field::sub_field;
use crate::fields::strategies::to_ticks;
use crate::index::query::{
    BoolQuery, FuzzyQuery, Numeric, NumericRangeQuery, Occur, PhraseQuery, Query, SortField, SortSpec,
    TermRangeQuery, WildcardQuery,
};
use crate::query::ast::{DateTimeKind, FieldOperator, FieldQuery, QueryAst, Value};
use crate::schema::field_info::{FieldInfoIndex, ResolvedKind};

/// What lowering needs to know about the index it targets.
pub struct LoweringContext<'a> {
    pub field_infos: &'a FieldInfoIndex,
    pub analyzers: &'a AnalyzerRegistry,
    /// Evaluation instant for relative dates
    pub now: DateTime<Utc>,
    pub phrase_slop: u32,
    pub fuzzy_max_edits: u8,
}

/// Lower an optimized tree into a native query and optional sort.
///
/// A top-level negation lowers to a boolean holding only MUST_NOT, which
/// matches nothing; callers wanting "everything except" must add a match-all.
pub fn lower(ast: &QueryAst, context: &LoweringContext) -> Result<(Query, Option<SortSpec>)> {
    let lowering = QueryLowering { context };
    match ast {
        QueryAst::Ordered(ordered) => {
            let query = lowering.root(&ordered.query)?;
            let sort = SortSpec {
                fields: ordered.ordering.fields.iter()
                    .map(|f| lowering.sort_field(&f.name, f.direction == crate::query::ast::SortDirection::Descending))
                    .collect(),
            };
            Ok((query, Some(sort)))
        }
        other => Ok((lowering.root(other)?, None)),
    }
}

struct QueryLowering<'c, 'a> {
    context: &'c LoweringContext<'a>,
}

enum Bound {
    Lower { inclusive: bool },
    Upper { inclusive: bool },
}

impl QueryLowering<'_, '_> {
    fn root(&self, ast: &QueryAst) -> Result<Query> {
        let (occur, query) = self.node(ast, None)?;
        Ok(match occur {
            Occur::MustNot => Query::Bool(BoolQuery::new().with_must_not(query)),
            Occur::Must | Occur::Should => query,
        })
    }

    fn sort_field(&self, name: &str, descending: bool) -> SortField {
        let field = match self.context.field_infos.resolve(name, None) {
            ResolvedKind::Date => sub_field(name, "ticks"),
            _ => name.to_string(),
        };
        SortField { field, descending }
    }

    fn node(&self, ast: &QueryAst, scope: Option<&[String]>) -> Result<(Occur, Query)> {
        match ast {
            QueryAst::Field(field) => self.field(field, scope),
            QueryAst::And(composite) => {
                let content_types = composite.metadata.content_types();
                let scope = content_types.as_deref().or(scope);
                let mut bool_query = BoolQuery::new();
                for child in &composite.queries {
                    match self.node(child, scope)? {
                        (Occur::MustNot, q) => bool_query.must_not.push(q),
                        (_, q) => bool_query.must.push(q),
                    }
                }
                Ok((Occur::Must, Query::Bool(bool_query)))
            }
            QueryAst::Or(composite) => {
                let mut bool_query = BoolQuery::new();
                for child in &composite.queries {
                    match self.node(child, scope)? {
                        (Occur::MustNot, q) => bool_query.must_not.push(q),
                        (_, q) => bool_query.should.push(q),
                    }
                }
                Ok((Occur::Must, Query::Bool(bool_query)))
            }
            QueryAst::Not(not) => {
                let (occur, query) = self.node(&not.query, scope)?;
                Ok(match occur {
                    Occur::MustNot => (Occur::Must, query),
                    Occur::Must | Occur::Should => (Occur::MustNot, query),
                })
            }
            QueryAst::Ordered(ordered) => self.node(&ordered.query, scope),
            QueryAst::Implicit(_) => Err(Error::configuration(
                "implicit composite reached lowering; the optimizer is required to resolve it",
            )),
        }
    }

    fn field(&self, field: &FieldQuery, scope: Option<&[String]>) -> Result<(Occur, Query)> {
        let name = match &field.name {
            Some(name) => name.as_str(),
            None => return self.unfielded(field, scope),
        };

        match field.operator {
            FieldOperator::None | FieldOperator::Equals => Ok((Occur::Must, self.exact(name, &field.value, scope)?)),
            FieldOperator::NotEquals => Ok((Occur::MustNot, self.exact(name, &field.value, scope)?)),
            FieldOperator::In => Ok((Occur::Must, self.any_of(name, field, scope)?)),
            FieldOperator::NotIn => {
                let excluded = self.any_of(name, field, scope)?;
                Ok((Occur::Must, Query::Bool(BoolQuery::new().with_must(Query::MatchAll).with_must_not(excluded))))
            }
            FieldOperator::GreaterThan => Ok((Occur::Must, self.range(name, &field.value, Bound::Lower { inclusive: false }, scope)?)),
            FieldOperator::GreaterThanOrEquals => Ok((Occur::Must, self.range(name, &field.value, Bound::Lower { inclusive: true }, scope)?)),
            FieldOperator::LessThan => Ok((Occur::Must, self.range(name, &field.value, Bound::Upper { inclusive: false }, scope)?)),
            FieldOperator::LessThanOrEquals => Ok((Occur::Must, self.range(name, &field.value, Bound::Upper { inclusive: true }, scope)?)),
            FieldOperator::Similar => Ok((Occur::Must, self.fuzzy(name, &field.value, scope)?)),
            FieldOperator::NotSimilar => Ok((Occur::MustNot, self.fuzzy(name, &field.value, scope)?)),
        }
    }

    fn unfielded(&self, field: &FieldQuery, scope: Option<&[String]>) -> Result<(Occur, Query)> {
        if field.value == Value::MatchAll {
            return Ok((Occur::Must, Query::MatchAll));
        }
        let mut alternatives = Vec::new();
        for name in self.context.field_infos.lexical_fields(scope) {
            alternatives.push(self.exact(&name, &field.value, scope)?);
        }
        let occur = if field.operator == FieldOperator::NotEquals { Occur::MustNot } else { Occur::Must };
        Ok((occur, Query::should(alternatives)))
    }

    fn any_of(&self, name: &str, field: &FieldQuery, scope: Option<&[String]>) -> Result<Query> {
        let values = match &field.value {
            Value::List(values) => values,
            other => {
                return Err(Error::configuration(format!(
                    "{} on '{}' requires a list value, got {}", field.operator.symbol(), name, other
                )));
            }
        };
        let alternatives = values.iter()
            .map(|v| self.exact(name, v, scope))
            .collect::<Result<Vec<_>>>()?;
        Ok(Query::should(alternatives))
    }

    /// Analyzed terms with positions relative to the first kept token.
    fn text_terms(&self, name: &str, text: &str, scope: Option<&[String]>) -> Result<Option<Vec<(String, u32)>>> {
        match self.context.field_infos.analyzer_for(name, scope) {
            Some(analyzer) => {
                let tokens = self.context.analyzers.analyze(&analyzer, text)?;
                let base = tokens.first().map_or(0, |t| t.position);
                Ok(Some(tokens.into_iter().map(|t| (t.text, t.position.saturating_sub(base))).collect()))
            }
            None => Ok(None),
        }
    }

    fn analyzed(&self, name: &str, text: &str, slop: u32, scope: Option<&[String]>) -> Result<Query> {
        let terms = match self.text_terms(name, text, scope)? {
            Some(terms) => terms,
            None => return Ok(Query::term(name, text)),
        };
        Ok(match terms.len() {
            0 => Query::should(Vec::new()),
            1 => Query::term(name, terms[0].0.clone()),
            _ => Query::Phrase(PhraseQuery { field: name.to_string(), phrase: terms, slop }),
        })
    }

    fn numeric_kind(&self, name: &str, scope: Option<&[String]>) -> Option<FieldType> {
        match self.context.field_infos.resolve(name, scope) {
            ResolvedKind::Numeric(field_type) => Some(field_type),
            _ => None,
        }
    }

    fn numeric(&self, value: &Value, field_type: FieldType) -> Option<Numeric> {
        match (value, field_type) {
            (Value::Integer(i), FieldType::Double) => Some(Numeric::Double(*i as f64)),
            (Value::Integer(i), _) => Some(Numeric::Long(*i)),
            (Value::Number(n), _) => Some(Numeric::Double(*n)),
            _ => None,
        }
    }

    /// Resolved instant and whether it addresses a whole day.
    fn instant(&self, value: &Value) -> Option<(DateTime<Utc>, bool)> {
        match value {
            Value::DateTime { value, kind } => Some((value.with_timezone(&Utc), *kind == DateTimeKind::Date)),
            Value::Offset(offset) => {
                let resolved = offset.resolve(self.context.now)?;
                Some((resolved, offset.kind() == DateTimeKind::Date))
            }
            _ => None,
        }
    }

    fn day_bounds(instant: &DateTime<Utc>) -> (i64, i64) {
        let start = instant.date_naive().and_time(NaiveTime::MIN).and_utc();
        (to_ticks(&start), to_ticks(&(start + TimeDelta::days(1))))
    }

    fn exact(&self, name: &str, value: &Value, scope: Option<&[String]>) -> Result<Query> {
        if let Some((instant, whole_day)) = self.instant(value) {
            return Ok(match self.context.field_infos.resolve(name, scope) {
                ResolvedKind::Date | ResolvedKind::Unknown => {
                    let ticks_field = sub_field(name, "ticks");
                    if whole_day {
                        let (start, end) = Self::day_bounds(&instant);
                        Query::NumericRange(NumericRangeQuery {
                            field: ticks_field,
                            lower: Some(Numeric::Long(start)),
                            upper: Some(Numeric::Long(end)),
                            include_lower: true,
                            include_upper: false,
                        })
                    } else {
                        Query::NumericRange(NumericRangeQuery::exact(ticks_field, Numeric::Long(to_ticks(&instant))))
                    }
                }
                _ => Query::term(name, instant.format("%Y-%m-%dT%H:%M:%S").to_string()),
            });
        }

        match value {
            Value::String(text) => self.analyzed(name, text, 0, scope),
            Value::Phrase(text) => self.analyzed(name, text, self.context.phrase_slop, scope),
            Value::Wildcard(pattern) => {
                let pattern = if self.context.field_infos.is_text(name, scope) {
                    pattern.to_lowercase()
                } else {
                    pattern.clone()
                };
                Ok(Query::Wildcard(WildcardQuery { field: name.to_string(), pattern }))
            }
            Value::Integer(_) | Value::Number(_) => match self.numeric_kind(name, scope) {
                Some(field_type) => {
                    let number = self.numeric(value, field_type)
                        .ok_or_else(|| Error::configuration(format!("'{}' is not numeric", value)))?;
                    Ok(Query::NumericRange(NumericRangeQuery::exact(name, number)))
                }
                None => self.analyzed(name, &value.to_string(), 0, scope),
            },
            Value::MatchAll => Ok(match self.context.field_infos.resolve(name, scope) {
                // Numbers have no terms to enumerate
                ResolvedKind::Numeric(_) => Query::NumericRange(NumericRangeQuery::unbounded(name)),
                ResolvedKind::Date => Query::NumericRange(NumericRangeQuery::unbounded(sub_field(name, "ticks"))),
                _ => Query::Wildcard(WildcardQuery { field: name.to_string(), pattern: "*".to_string() }),
            }),
            Value::List(_) => Err(Error::configuration(format!("list value on '{}' requires IN or NOT IN", name))),
            Value::DateTime { .. } | Value::Offset(_) => Err(Error::configuration(format!("unresolvable date '{}'", value))),
        }
    }

    fn range(&self, name: &str, value: &Value, bound: Bound, scope: Option<&[String]>) -> Result<Query> {
        let (lower_inclusive, upper_inclusive) = match bound {
            Bound::Lower { inclusive } => (inclusive, false),
            Bound::Upper { inclusive } => (false, inclusive),
        };
        let is_lower = matches!(bound, Bound::Lower { .. });

        if let Some((instant, whole_day)) = self.instant(value) {
            // Whole days: `> day` starts at the next midnight, `<= day` ends there
            let (point, inclusive) = if whole_day {
                let (start, end) = Self::day_bounds(&instant);
                match (is_lower, lower_inclusive || upper_inclusive) {
                    (true, true) => (start, true),
                    (true, false) => (end, true),
                    (false, true) => (end, false),
                    (false, false) => (start, false),
                }
            } else {
                (to_ticks(&instant), lower_inclusive || upper_inclusive)
            };
            let number = Some(Numeric::Long(point));
            return Ok(Query::NumericRange(NumericRangeQuery {
                field: sub_field(name, "ticks"),
                lower: if is_lower { number } else { None },
                upper: if is_lower { None } else { number },
                include_lower: is_lower && inclusive,
                include_upper: !is_lower && inclusive,
            }));
        }

        match value {
            Value::Integer(_) | Value::Number(_) => {
                let resolved = self.context.field_infos.resolve(name, scope);
                if let ResolvedKind::Lexical = resolved {
                    return Ok(self.term_range(name, value.to_string(), is_lower, lower_inclusive || upper_inclusive));
                }
                let field_type = match resolved {
                    ResolvedKind::Numeric(t) => t,
                    _ => FieldType::Double,
                };
                let number = self.numeric(value, field_type);
                Ok(Query::NumericRange(NumericRangeQuery {
                    field: name.to_string(),
                    lower: if is_lower { number } else { None },
                    upper: if is_lower { None } else { number },
                    include_lower: lower_inclusive,
                    include_upper: upper_inclusive,
                }))
            }
            Value::String(text) | Value::Phrase(text) => {
                let text = if self.context.field_infos.is_text(name, scope) { text.to_lowercase() } else { text.clone() };
                Ok(self.term_range(name, text, is_lower, lower_inclusive || upper_inclusive))
            }
            other => Err(Error::configuration(format!("cannot compare '{}' with {}", name, other))),
        }
    }

    fn term_range(&self, name: &str, text: String, is_lower: bool, inclusive: bool) -> Query {
        Query::TermRange(TermRangeQuery {
            field: name.to_string(),
            lower: if is_lower { Some(text.clone()) } else { None },
            upper: if is_lower { None } else { Some(text) },
            include_lower: is_lower && inclusive,
            include_upper: !is_lower && inclusive,
        })
    }

    fn fuzzy(&self, name: &str, value: &Value, scope: Option<&[String]>) -> Result<Query> {
        let term = match value {
            Value::String(s) | Value::Phrase(s) => s.clone(),
            Value::Integer(_) | Value::Number(_) => value.to_string(),
            other => return Err(Error::configuration(format!("'{}' cannot be matched fuzzily against {}", name, other))),
        };
        let term = if self.context.field_infos.is_text(name, scope) { term.to_lowercase() } else { term };
        Ok(Query::Fuzzy(FuzzyQuery { field: name.to_string(), term, max_edits: self.context.fuzzy_max_edits }))
    }
}
