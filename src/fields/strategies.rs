use chrono::{DateTime, Datelike, NaiveDateTime, TimeDelta, Timelike, Utc};
use serde_json::Value as JsonValue;
use crate::analysis::analyzer::STANDARD;
use crate::core::error::{Error, Result};
use crate::core::types::Field;
use crate::fields::field::{sub_field, IndexableJsonField};
use crate::fields::strategy::{json_type_of, FieldStrategy, PathContext};
use crate::schema::field_info::JsonType;

pub const NULL_SENTINEL: &str = "$$NULL$$";
pub const UNDEFINED_SENTINEL: &str = "$$UNDEFINED$$";

/// 100ns ticks between 0001-01-01 and the unix epoch
const TICKS_AT_UNIX_EPOCH: i64 = 621_355_968_000_000_000;
const TICKS_PER_SECOND: i64 = 10_000_000;

/// Instant as 100ns ticks since 0001-01-01T00:00:00Z.
pub fn to_ticks(value: &DateTime<Utc>) -> i64 {
    TICKS_AT_UNIX_EPOCH
        + value.timestamp() * TICKS_PER_SECOND
        + (value.timestamp_subsec_nanos() / 100) as i64
}

pub fn timespan_ticks(value: &TimeDelta) -> i64 {
    value.num_seconds() * TICKS_PER_SECOND + (value.subsec_nanos() / 100) as i64
}

/// ISO 8601 instants as found in JSON documents. A missing offset means UTC.
pub fn parse_json_date(text: &str) -> Option<DateTime<Utc>> {
    if !text.contains('T') {
        return None;
    }
    if let Ok(value) = DateTime::parse_from_rfc3339(text) {
        return Some(value.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// `[-][d.]hh:mm:ss[.fffffff]`
pub fn parse_timespan(text: &str) -> Option<TimeDelta> {
    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };

    let mut parts = body.split(':');
    let first = parts.next()?;
    let minutes: i64 = parts.next()?.parse().ok()?;
    let seconds_part = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    let (days, hours) = match first.split_once('.') {
        Some((d, h)) => (d.parse::<i64>().ok()?, h.parse::<i64>().ok()?),
        None => (0, first.parse::<i64>().ok()?),
    };
    let (seconds, fraction) = match seconds_part.split_once('.') {
        Some((s, f)) => (s.parse::<i64>().ok()?, f),
        None => (seconds_part.parse::<i64>().ok()?, ""),
    };
    if hours > 23 || minutes > 59 || seconds > 59 || fraction.len() > 7 {
        return None;
    }
    let fraction_ticks: i64 = if fraction.is_empty() {
        0
    } else {
        format!("{:0<7}", fraction).parse().ok()?
    };

    let total = TimeDelta::try_days(days)?
        .checked_add(&TimeDelta::try_hours(hours)?)?
        .checked_add(&TimeDelta::try_minutes(minutes)?)?
        .checked_add(&TimeDelta::try_seconds(seconds)?)?
        .checked_add(&TimeDelta::nanoseconds(fraction_ticks * 100))?;
    Some(if negative { -total } else { total })
}

fn scalar_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn mismatch(strategy: &str, value: &JsonValue, context: &PathContext) -> Error {
    Error::conversion(format!(
        "{}: cannot project {:?} value at '{}' with the {} strategy",
        context.content_type, json_type_of(value), context.path, strategy
    ))
}

/// Exact, unanalyzed term.
pub struct IdentityStrategy;

impl FieldStrategy for IdentityStrategy {
    fn name(&self) -> &str {
        "identity"
    }

    fn create_fields(&self, value: &JsonValue, context: &PathContext) -> Result<Vec<IndexableJsonField>> {
        if value.is_object() || value.is_array() {
            return Err(mismatch(self.name(), value, context));
        }
        Ok(vec![
            IndexableJsonField::new(&context.path, json_type_of(value), self.name())
                .with_field(Field::term(&context.path, scalar_text(value))),
        ])
    }
}

/// Analyzed text.
pub struct TextStrategy {
    pub analyzer: String,
}

impl Default for TextStrategy {
    fn default() -> Self {
        TextStrategy { analyzer: STANDARD.to_string() }
    }
}

impl FieldStrategy for TextStrategy {
    fn name(&self) -> &str {
        "text"
    }

    fn create_fields(&self, value: &JsonValue, context: &PathContext) -> Result<Vec<IndexableJsonField>> {
        if value.is_object() || value.is_array() {
            return Err(mismatch(self.name(), value, context));
        }
        Ok(vec![
            IndexableJsonField::new(&context.path, json_type_of(value), self.name())
                .with_field(Field::text(&context.path, scalar_text(value), &self.analyzer)),
        ])
    }
}

/// Element count under `path.@count`; the builder walks the elements.
pub struct ArrayStrategy;

impl FieldStrategy for ArrayStrategy {
    fn name(&self) -> &str {
        "array"
    }

    fn create_fields(&self, value: &JsonValue, context: &PathContext) -> Result<Vec<IndexableJsonField>> {
        let elements = value.as_array().ok_or_else(|| mismatch(self.name(), value, context))?;
        Ok(vec![
            IndexableJsonField::new(&context.path, JsonType::Array, self.name())
                .with_field(Field::long(sub_field(&context.path, "count"), elements.len() as i64)),
        ])
    }
}

pub struct Int64Strategy;

impl FieldStrategy for Int64Strategy {
    fn name(&self) -> &str {
        "int64"
    }

    fn create_fields(&self, value: &JsonValue, context: &PathContext) -> Result<Vec<IndexableJsonField>> {
        let number = match value {
            JsonValue::Number(n) => n.as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
            JsonValue::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        let number = number.ok_or_else(|| mismatch(self.name(), value, context))?;
        Ok(vec![
            IndexableJsonField::new(&context.path, JsonType::Integer, self.name())
                .with_field(Field::long(&context.path, number)),
        ])
    }
}

pub struct DoubleStrategy;

impl FieldStrategy for DoubleStrategy {
    fn name(&self) -> &str {
        "double"
    }

    fn create_fields(&self, value: &JsonValue, context: &PathContext) -> Result<Vec<IndexableJsonField>> {
        let number = match value {
            JsonValue::Number(n) => n.as_f64(),
            JsonValue::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        let number = number.ok_or_else(|| mismatch(self.name(), value, context))?;
        Ok(vec![
            IndexableJsonField::new(&context.path, JsonType::Float, self.name())
                .with_field(Field::double(&context.path, number)),
        ])
    }
}

/// `true`/`false` terms.
pub struct BooleanStrategy;

impl FieldStrategy for BooleanStrategy {
    fn name(&self) -> &str {
        "boolean"
    }

    fn create_fields(&self, value: &JsonValue, context: &PathContext) -> Result<Vec<IndexableJsonField>> {
        let flag = match value {
            JsonValue::Bool(b) => Some(*b),
            JsonValue::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
            JsonValue::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        };
        let flag = flag.ok_or_else(|| mismatch(self.name(), value, context))?;
        Ok(vec![
            IndexableJsonField::new(&context.path, JsonType::Boolean, self.name())
                .with_field(Field::term(&context.path, flag.to_string())),
        ])
    }
}

pub struct NullStrategy;

impl FieldStrategy for NullStrategy {
    fn name(&self) -> &str {
        "null"
    }

    fn create_fields(&self, _value: &JsonValue, context: &PathContext) -> Result<Vec<IndexableJsonField>> {
        Ok(vec![
            IndexableJsonField::new(&context.path, JsonType::Null, self.name())
                .with_field(Field::term(&context.path, NULL_SENTINEL)),
        ])
    }
}

pub struct UndefinedStrategy;

impl FieldStrategy for UndefinedStrategy {
    fn name(&self) -> &str {
        "undefined"
    }

    fn create_fields(&self, _value: &JsonValue, context: &PathContext) -> Result<Vec<IndexableJsonField>> {
        Ok(vec![
            IndexableJsonField::new(&context.path, JsonType::Undefined, self.name())
                .with_field(Field::term(&context.path, UNDEFINED_SENTINEL)),
        ])
    }
}

/// Lexical `yyyy-MM-ddTHH:mm:ss` term plus numeric `@ticks`, `@year`,
/// `@month`, `@day`, `@hour` and `@minute` sub-fields, all in UTC.
pub struct ExpandedDateTimeStrategy;

impl FieldStrategy for ExpandedDateTimeStrategy {
    fn name(&self) -> &str {
        "expanded_datetime"
    }

    fn create_fields(&self, value: &JsonValue, context: &PathContext) -> Result<Vec<IndexableJsonField>> {
        let instant = value.as_str()
            .and_then(parse_json_date)
            .ok_or_else(|| mismatch(self.name(), value, context))?;
        let path = context.path.as_str();

        Ok(vec![
            IndexableJsonField::new(path, JsonType::Date, self.name())
                .with_field(Field::term(path, instant.format("%Y-%m-%dT%H:%M:%S").to_string()))
                .with_field(Field::long(sub_field(path, "ticks"), to_ticks(&instant)))
                .with_field(Field::long(sub_field(path, "year"), instant.year() as i64))
                .with_field(Field::long(sub_field(path, "month"), instant.month() as i64))
                .with_field(Field::long(sub_field(path, "day"), instant.day() as i64))
                .with_field(Field::long(sub_field(path, "hour"), instant.hour() as i64))
                .with_field(Field::long(sub_field(path, "minute"), instant.minute() as i64)),
        ])
    }
}

/// Raw term plus `@ticks`, `@days`, `@hours` and `@minutes`.
pub struct ExpandedTimeSpanStrategy;

impl FieldStrategy for ExpandedTimeSpanStrategy {
    fn name(&self) -> &str {
        "expanded_timespan"
    }

    fn create_fields(&self, value: &JsonValue, context: &PathContext) -> Result<Vec<IndexableJsonField>> {
        let raw = value.as_str().ok_or_else(|| mismatch(self.name(), value, context))?;
        let span = parse_timespan(raw).ok_or_else(|| mismatch(self.name(), value, context))?;
        let path = context.path.as_str();

        // Components carry the span's sign, like the whole-unit parts of a duration
        let days = span.num_days();
        let hours = span.num_hours() - days * 24;
        let minutes = span.num_minutes() - span.num_hours() * 60;

        Ok(vec![
            IndexableJsonField::new(path, JsonType::TimeSpan, self.name())
                .with_field(Field::term(path, raw))
                .with_field(Field::long(sub_field(path, "ticks"), timespan_ticks(&span)))
                .with_field(Field::long(sub_field(path, "days"), days))
                .with_field(Field::long(sub_field(path, "hours"), hours))
                .with_field(Field::long(sub_field(path, "minutes"), minutes)),
        ])
    }
}
