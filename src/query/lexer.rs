use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone};
use nom::{IResult, Parser};
use nom::branch::alt;
use nom::bytes::complete::{tag, take_while1, take_while_m_n};
use nom::character::complete::{alpha1, char, digit1, one_of, satisfy};
use nom::combinator::{map, not, opt, recognize, value};
use nom::multi::many1;
use nom::sequence::terminated;
use crate::query::ast::{DateTimeKind, FieldOperator, OffsetAnchor, OffsetDateTime};
use crate::query::parser::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Word(String),
    Quoted(String),
    Integer(i64),
    Number(f64),
    Date(DateTime<FixedOffset>, DateTimeKind),
    Offset(OffsetDateTime),
    Op(FieldOperator),
    Colon,
    And,
    Or,
    Not,
    In,
    Order,
    By,
    Asc,
    Desc,
    LParen,
    RParen,
    Comma,
}

impl TokenKind {
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Word(w) => format!("'{}'", w),
            TokenKind::Quoted(q) => format!("\"{}\"", q),
            TokenKind::Integer(i) => i.to_string(),
            TokenKind::Number(n) => n.to_string(),
            TokenKind::Date(d, _) => d.to_rfc3339(),
            TokenKind::Offset(o) => o.raw.clone(),
            TokenKind::Op(op) => format!("'{}'", op.symbol()),
            TokenKind::Colon => "':'".to_string(),
            TokenKind::And => "AND".to_string(),
            TokenKind::Or => "OR".to_string(),
            TokenKind::Not => "NOT".to_string(),
            TokenKind::In => "IN".to_string(),
            TokenKind::Order => "ORDER".to_string(),
            TokenKind::By => "BY".to_string(),
            TokenKind::Asc => "ASC".to_string(),
            TokenKind::Desc => "DESC".to_string(),
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
            TokenKind::Comma => "','".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Character offset of the token start
    pub position: usize,
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | '$' | '@' | '-' | '*' | '?' | '/' | '+' | '#' | '\\')
}

fn boundary(input: &str) -> IResult<&str, ()> {
    not(satisfy(is_word_char)).parse(input)
}

fn verify_failed(input: &str) -> nom::Err<nom::error::Error<&str>> {
    nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Verify))
}

fn two_digits(input: &str) -> IResult<&str, &str> {
    take_while_m_n(2, 2, |c: char| c.is_ascii_digit()).parse(input)
}

// yyyy-MM-dd[THH:mm[:ss[.fffffff]][Z|(+|-)HH:mm]]
fn date_literal(input: &str) -> IResult<&str, &str> {
    recognize((
        take_while_m_n(4, 4, |c: char| c.is_ascii_digit()),
        char('-'),
        two_digits,
        char('-'),
        two_digits,
        opt((
            char('T'),
            two_digits,
            char(':'),
            two_digits,
            opt((char(':'), two_digits, opt((char('.'), digit1)))),
            opt(alt((
                tag("Z"),
                recognize((one_of("+-"), two_digits, char(':'), two_digits)),
            ))),
        )),
    )).parse(input)
}

pub(crate) fn parse_date_literal(literal: &str) -> Option<(DateTime<FixedOffset>, DateTimeKind)> {
    if literal.len() == 10 {
        let date = NaiveDate::parse_from_str(literal, "%Y-%m-%d").ok()?;
        let utc = FixedOffset::east_opt(0)?;
        let value = utc.from_local_datetime(&date.and_time(NaiveTime::MIN)).single()?;
        return Some((value, DateTimeKind::Date));
    }

    let (body, offset_secs) = if let Some(body) = literal.strip_suffix('Z') {
        (body, 0)
    } else if literal.len() > 16 && matches!(&literal[literal.len() - 6..literal.len() - 5], "+" | "-") {
        let suffix = &literal[literal.len() - 6..];
        let sign = if suffix.starts_with('-') { -1 } else { 1 };
        let hours: i32 = suffix[1..3].parse().ok()?;
        let minutes: i32 = suffix[4..6].parse().ok()?;
        (&literal[..literal.len() - 6], sign * (hours * 3600 + minutes * 60))
    } else {
        (literal, 0)
    };

    let naive = NaiveDateTime::parse_from_str(body, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(body, "%Y-%m-%dT%H:%M"))
        .ok()?;
    let offset = FixedOffset::east_opt(offset_secs)?;
    let value = offset.from_local_datetime(&naive).single()?;
    Some((value, DateTimeKind::DateTime))
}

fn date_token(input: &str) -> IResult<&str, TokenKind> {
    let (rest, literal) = terminated(date_literal, boundary).parse(input)?;
    match parse_date_literal(literal) {
        Some((value, kind)) => Ok((rest, TokenKind::Date(value, kind))),
        None => Err(verify_failed(input)),
    }
}

fn anchor(input: &str) -> IResult<&str, &str> {
    alt((tag("NOW"), tag("TODAY"))).parse(input)
}

fn offset_literal(input: &str) -> IResult<&str, &str> {
    terminated(
        recognize(alt((
            recognize((opt(anchor), one_of("+-"), many1((digit1, alpha1)))),
            anchor,
        ))),
        boundary,
    ).parse(input)
}

fn unit_delta(amount: i64, unit: &str) -> Option<(i32, TimeDelta)> {
    match unit {
        "y" | "year" | "years" => Some((i32::try_from(amount.checked_mul(12)?).ok()?, TimeDelta::zero())),
        "M" | "mo" | "month" | "months" => Some((i32::try_from(amount).ok()?, TimeDelta::zero())),
        "w" | "week" | "weeks" => Some((0, TimeDelta::try_weeks(amount)?)),
        "d" | "day" | "days" => Some((0, TimeDelta::try_days(amount)?)),
        "h" | "hour" | "hours" => Some((0, TimeDelta::try_hours(amount)?)),
        "m" | "min" | "minute" | "minutes" => Some((0, TimeDelta::try_minutes(amount)?)),
        "s" | "sec" | "second" | "seconds" => Some((0, TimeDelta::try_seconds(amount)?)),
        _ => None,
    }
}

pub(crate) fn parse_offset_literal(literal: &str) -> Option<OffsetDateTime> {
    let (anchor, rest) = if let Some(rest) = literal.strip_prefix("NOW") {
        (OffsetAnchor::Now, rest)
    } else if let Some(rest) = literal.strip_prefix("TODAY") {
        (OffsetAnchor::Today, rest)
    } else {
        (OffsetAnchor::Now, literal)
    };

    let mut months = 0i32;
    let mut offset = TimeDelta::zero();

    if !rest.is_empty() {
        let sign: i64 = if rest.starts_with('-') { -1 } else { 1 };
        let mut remaining = &rest[1..];
        while !remaining.is_empty() {
            let digits_end = remaining.find(|c: char| !c.is_ascii_digit())?;
            let amount: i64 = remaining[..digits_end].parse().ok()?;
            let unit_end = remaining[digits_end..]
                .find(|c: char| c.is_ascii_digit())
                .map(|i| digits_end + i)
                .unwrap_or(remaining.len());
            let (m, delta) = unit_delta(sign * amount, &remaining[digits_end..unit_end])?;
            months = months.checked_add(m)?;
            offset = offset.checked_add(&delta)?;
            remaining = &remaining[unit_end..];
        }
    }

    Some(OffsetDateTime {
        raw: literal.to_string(),
        anchor,
        months,
        offset,
    })
}

fn offset_token(input: &str) -> IResult<&str, TokenKind> {
    let (rest, literal) = offset_literal(input)?;
    match parse_offset_literal(literal) {
        Some(offset) => Ok((rest, TokenKind::Offset(offset))),
        None => Err(verify_failed(input)),
    }
}

fn number_token(input: &str) -> IResult<&str, TokenKind> {
    let (rest, literal) = terminated(
        recognize((opt(char('-')), digit1, opt((char('.'), digit1)))),
        boundary,
    ).parse(input)?;

    let kind = if literal.contains('.') {
        literal.parse::<f64>().ok().map(TokenKind::Number)
    } else {
        literal.parse::<i64>().ok().map(TokenKind::Integer)
            .or_else(|| literal.parse::<f64>().ok().map(TokenKind::Number))
    };
    kind.map(|k| (rest, k)).ok_or_else(|| verify_failed(input))
}

fn operator_token(input: &str) -> IResult<&str, TokenKind> {
    alt((
        value(TokenKind::Op(FieldOperator::GreaterThanOrEquals), tag(">=")),
        value(TokenKind::Op(FieldOperator::LessThanOrEquals), tag("<=")),
        value(TokenKind::Op(FieldOperator::NotEquals), tag("!=")),
        value(TokenKind::Op(FieldOperator::NotSimilar), tag("!~")),
        value(TokenKind::Op(FieldOperator::GreaterThan), tag(">")),
        value(TokenKind::Op(FieldOperator::LessThan), tag("<")),
        value(TokenKind::Op(FieldOperator::Equals), tag("=")),
        value(TokenKind::Op(FieldOperator::Similar), tag("~")),
        value(TokenKind::Colon, tag(":")),
    )).parse(input)
}

fn punctuation_token(input: &str) -> IResult<&str, TokenKind> {
    alt((
        value(TokenKind::LParen, char('(')),
        value(TokenKind::RParen, char(')')),
        value(TokenKind::Comma, char(',')),
    )).parse(input)
}

/// `"..."` with backslash escapes. An unterminated phrase is a hard failure.
fn quoted(input: &str) -> IResult<&str, String> {
    let (mut rest, _) = char('"').parse(input)?;
    let mut out = String::new();
    loop {
        let mut chars = rest.chars();
        match chars.next() {
            None => {
                return Err(nom::Err::Failure(nom::error::Error::new(input, nom::error::ErrorKind::Char)));
            }
            Some('"') => return Ok((&rest[1..], out)),
            Some('\\') => match chars.next() {
                Some(escaped) => {
                    out.push(escaped);
                    rest = &rest[1 + escaped.len_utf8()..];
                }
                None => {
                    return Err(nom::Err::Failure(nom::error::Error::new(input, nom::error::ErrorKind::Escaped)));
                }
            },
            Some(c) => {
                out.push(c);
                rest = &rest[c.len_utf8()..];
            }
        }
    }
}

fn keyword_or_word(word: &str) -> TokenKind {
    match word.to_ascii_uppercase().as_str() {
        "AND" => TokenKind::And,
        "OR" => TokenKind::Or,
        "NOT" => TokenKind::Not,
        "IN" => TokenKind::In,
        "ORDER" => TokenKind::Order,
        "BY" => TokenKind::By,
        "ASC" => TokenKind::Asc,
        "DESC" => TokenKind::Desc,
        _ => TokenKind::Word(word.to_string()),
    }
}

fn token(input: &str) -> IResult<&str, TokenKind> {
    alt((
        map(quoted, TokenKind::Quoted),
        date_token,
        offset_token,
        number_token,
        operator_token,
        punctuation_token,
        map(take_while1(is_word_char), keyword_or_word),
    )).parse(input)
}

/// Split query text into tokens. Positions are character offsets.
pub fn tokenize(text: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let mut rest = text;

    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }

        let byte_position = text.len() - rest.len();
        let position = text[..byte_position].chars().count();

        match token(rest) {
            Ok((remaining, kind)) => {
                tokens.push(Token { kind, position });
                rest = remaining;
            }
            Err(nom::Err::Failure(_)) if rest.starts_with('"') => {
                return Err(ParseError::new(position, "unterminated quoted phrase"));
            }
            Err(_) => {
                let c = rest.chars().next().unwrap_or(' ');
                return Err(ParseError::new(position, format!("unexpected character '{}'", c)));
            }
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        tokenize(text).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn field_comparisons_tokenize() {
        assert_eq!(kinds("age >= 20 and name: Peter"), vec![
            TokenKind::Word("age".into()),
            TokenKind::Op(FieldOperator::GreaterThanOrEquals),
            TokenKind::Integer(20),
            TokenKind::And,
            TokenKind::Word("name".into()),
            TokenKind::Colon,
            TokenKind::Word("Peter".into()),
        ]);
    }

    #[test]
    fn numbers_need_a_word_boundary() {
        assert_eq!(kinds("1.5 20abc 1.2.3"), vec![
            TokenKind::Number(1.5),
            TokenKind::Word("20abc".into()),
            TokenKind::Word("1.2.3".into()),
        ]);
    }

    #[test]
    fn dates_keep_their_offset() {
        let tokens = kinds("2014-09-10T11:00:00+02:00 2014-09-10");
        match &tokens[0] {
            TokenKind::Date(value, DateTimeKind::DateTime) => {
                assert_eq!(value.offset().local_minus_utc(), 7200);
                assert_eq!(value.to_rfc3339(), "2014-09-10T11:00:00+02:00");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(tokens[1], TokenKind::Date(_, DateTimeKind::Date)));
    }

    #[test]
    fn relative_offsets_parse_units() {
        let tokens = kinds("+2days NOW-7d TODAY NOW+1w2h NOWHERE");
        match &tokens[0] {
            TokenKind::Offset(o) => assert_eq!(o.offset, TimeDelta::days(2)),
            other => panic!("unexpected {:?}", other),
        }
        match &tokens[1] {
            TokenKind::Offset(o) => {
                assert_eq!(o.anchor, OffsetAnchor::Now);
                assert_eq!(o.offset, TimeDelta::days(-7));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(&tokens[2], TokenKind::Offset(o) if o.anchor == OffsetAnchor::Today));
        match &tokens[3] {
            TokenKind::Offset(o) => assert_eq!(o.offset, TimeDelta::weeks(1) + TimeDelta::hours(2)),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(tokens[4], TokenKind::Word("NOWHERE".into()));
    }

    #[test]
    fn quoted_phrases_unescape() {
        assert_eq!(kinds(r#""say \"hi\"""#), vec![TokenKind::Quoted("say \"hi\"".into())]);
    }

    #[test]
    fn unterminated_phrase_reports_its_start() {
        let err = tokenize("name = \"open").unwrap_err();
        assert_eq!(err.position, 7);
    }

    #[test]
    fn unexpected_characters_fail_with_position() {
        let err = tokenize("name = {x}").unwrap_err();
        assert_eq!(err.position, 7);
    }
}
