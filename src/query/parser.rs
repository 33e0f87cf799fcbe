use std::fmt;
use crate::core::error::{Error, ErrorKind};
use crate::query::ast::{FieldOperator, OrderField, QueryAst, SortDirection, Value, Metadata};
use crate::query::lexer::{tokenize, Token, TokenKind};

/// Syntax error with the character offset it was detected at.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub position: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(position: usize, message: impl Into<String>) -> Self {
        ParseError { position, message: message.into() }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} at position {}", self.message, self.position)
    }
}

impl std::error::Error for ParseError {}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Error::new(ErrorKind::Parse, err.to_string())
    }
}

/// Parse query text into an unoptimized tree.
pub fn parse(text: &str) -> Result<QueryAst, ParseError> {
    let tokens = tokenize(text)?;
    let end = text.chars().count();
    QueryParser { tokens, pos: 0, end }.parse_query()
}

/// Recursive descent over lexer tokens.
///
/// ```text
/// query    := ORDER BY order | or_expr [ORDER BY order]
/// or_expr  := and_expr (OR and_expr)*
/// and_expr := implicit (AND implicit)*
/// implicit := unary unary*
/// unary    := NOT unary | primary
/// primary  := '(' or_expr ')' | WORD op value | WORD [NOT] IN list | value
/// ```
struct QueryParser {
    tokens: Vec<Token>,
    pos: usize,
    end: usize,
}

impl QueryParser {
    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn peek_at(&self, ahead: usize) -> Option<&TokenKind> {
        self.tokens.get(self.pos + ahead).map(|t| &t.kind)
    }

    fn position(&self) -> usize {
        self.tokens.get(self.pos).map(|t| t.position).unwrap_or(self.end)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        match self.peek() {
            Some(kind) => ParseError::new(self.position(), format!("expected {}, found {}", expected, kind.describe())),
            None => ParseError::new(self.end, format!("expected {}, found end of query", expected)),
        }
    }

    fn parse_query(&mut self) -> Result<QueryAst, ParseError> {
        if self.tokens.is_empty() {
            return Err(ParseError::new(0, "empty query"));
        }

        // A bare ORDER BY sorts every document
        let query = if self.peek() == Some(&TokenKind::Order) {
            QueryAst::match_all()
        } else {
            self.parse_or()?
        };

        let query = if self.eat(&TokenKind::Order) {
            if !self.eat(&TokenKind::By) {
                return Err(self.unexpected("BY"));
            }
            let fields = self.parse_order_fields()?;
            QueryAst::ordered(query, fields)
        } else {
            query
        };

        if self.peek().is_some() {
            return Err(self.unexpected("end of query"));
        }
        Ok(query)
    }

    fn parse_order_fields(&mut self) -> Result<Vec<OrderField>, ParseError> {
        let mut fields = Vec::new();
        loop {
            let name = match self.peek() {
                Some(TokenKind::Word(name)) => name.clone(),
                _ => return Err(self.unexpected("sort field")),
            };
            self.pos += 1;
            let direction = if self.eat(&TokenKind::Desc) {
                SortDirection::Descending
            } else {
                self.eat(&TokenKind::Asc);
                SortDirection::Ascending
            };
            fields.push(OrderField { name, direction, metadata: Metadata::new() });

            if !self.eat(&TokenKind::Comma) {
                return Ok(fields);
            }
        }
    }

    fn parse_or(&mut self) -> Result<QueryAst, ParseError> {
        let mut queries = vec![self.parse_and()?];
        while self.eat(&TokenKind::Or) {
            queries.push(self.parse_and()?);
        }
        Ok(if queries.len() == 1 { queries.remove(0) } else { QueryAst::or(queries) })
    }

    fn parse_and(&mut self) -> Result<QueryAst, ParseError> {
        let mut queries = vec![self.parse_implicit()?];
        while self.eat(&TokenKind::And) {
            queries.push(self.parse_implicit()?);
        }
        Ok(if queries.len() == 1 { queries.remove(0) } else { QueryAst::and(queries) })
    }

    fn starts_unary(&self) -> bool {
        matches!(self.peek(), Some(
            TokenKind::Not | TokenKind::LParen | TokenKind::Word(_) | TokenKind::Quoted(_) |
            TokenKind::Integer(_) | TokenKind::Number(_) | TokenKind::Date(..) | TokenKind::Offset(_)
        ))
    }

    fn parse_implicit(&mut self) -> Result<QueryAst, ParseError> {
        let mut queries = vec![self.parse_unary()?];
        while self.starts_unary() {
            queries.push(self.parse_unary()?);
        }
        Ok(if queries.len() == 1 { queries.remove(0) } else { QueryAst::implicit(queries) })
    }

    fn parse_unary(&mut self) -> Result<QueryAst, ParseError> {
        if self.eat(&TokenKind::Not) {
            return Ok(QueryAst::not(self.parse_unary()?));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<QueryAst, ParseError> {
        if self.eat(&TokenKind::LParen) {
            let inner = self.parse_or()?;
            if !self.eat(&TokenKind::RParen) {
                return Err(self.unexpected("')'"));
            }
            return Ok(inner);
        }

        if let Some(TokenKind::Word(name)) = self.peek() {
            let name = name.clone();
            match self.peek_at(1) {
                Some(TokenKind::Op(op)) => {
                    let op = *op;
                    self.pos += 2;
                    let value = self.parse_value()?;
                    return Ok(QueryAst::field(name, op, value));
                }
                Some(TokenKind::Colon) => {
                    self.pos += 2;
                    let value = self.parse_value()?;
                    return Ok(QueryAst::field(name, FieldOperator::Equals, value));
                }
                Some(TokenKind::In) => {
                    self.pos += 2;
                    let list = self.parse_list()?;
                    return Ok(QueryAst::field(name, FieldOperator::In, list));
                }
                Some(TokenKind::Not) if self.peek_at(2) == Some(&TokenKind::In) => {
                    self.pos += 3;
                    let list = self.parse_list()?;
                    return Ok(QueryAst::field(name, FieldOperator::NotIn, list));
                }
                _ => {}
            }
        }

        let value = self.parse_value()?;
        Ok(QueryAst::unfielded(value))
    }

    fn parse_list(&mut self) -> Result<Value, ParseError> {
        if !self.eat(&TokenKind::LParen) {
            return Err(self.unexpected("'('"));
        }
        let mut values = vec![self.parse_value()?];
        while self.eat(&TokenKind::Comma) {
            values.push(self.parse_value()?);
        }
        if !self.eat(&TokenKind::RParen) {
            return Err(self.unexpected("')'"));
        }
        Ok(Value::list(values))
    }

    fn parse_value(&mut self) -> Result<Value, ParseError> {
        let value = match self.peek() {
            Some(TokenKind::Word(word)) => word_value(word),
            Some(TokenKind::Quoted(phrase)) => Value::Phrase(phrase.clone()),
            Some(TokenKind::Integer(i)) => Value::Integer(*i),
            Some(TokenKind::Number(n)) => Value::Number(*n),
            Some(TokenKind::Date(value, kind)) => Value::DateTime { value: *value, kind: *kind },
            Some(TokenKind::Offset(offset)) => Value::Offset(offset.clone()),
            _ => return Err(self.unexpected("value")),
        };
        self.pos += 1;
        Ok(value)
    }
}

fn word_value(word: &str) -> Value {
    if word == "*" {
        Value::MatchAll
    } else if word.contains('*') || word.contains('?') {
        Value::Wildcard(word.to_string())
    } else {
        Value::String(word.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, op: FieldOperator, value: Value) -> QueryAst {
        QueryAst::field(name, op, value)
    }

    #[test]
    fn corpus_parses_to_expected_shapes() {
        let corpus = [
            ("age = 20 and name = Peter", 3),
            ("age = 30 or name = Peter", 3),
            ("a = 1 or b = 2 or c = 3", 4),
            ("a = 1 or b = 2 and c = 3", 5),
            ("(a = 1 or b = 2) and c = 3", 5),
            ("NOT x = 1", 2),
            ("* AND NOT name = Peter", 4),
            ("peter parker", 3),
            ("age IN (20, 40)", 1),
            ("age NOT IN (30)", 1),
            ("name ~ Pete", 1),
            ("* AND name !~ Pete", 3),
            ("title: \"quick brown\" age >= 18", 3),
            ("* ORDER BY age DESC", 2),
            ("ORDER BY name", 2),
            ("created > NOW-7d and (title: fox* or title ~ jumsp)", 5),
        ];
        for (text, nodes) in corpus {
            let ast = parse(text).unwrap_or_else(|e| panic!("{}: {}", text, e));
            assert_eq!(ast.node_count(), nodes, "{}", text);
            let reparsed = parse(&ast.to_string()).unwrap_or_else(|e| panic!("{} -> {}: {}", text, ast, e));
            assert_eq!(reparsed.node_count(), nodes, "{} -> {}", text, ast);
        }
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let ast = parse("a = 1 or b = 2 and c = 3").unwrap();
        assert_eq!(ast, QueryAst::or(vec![
            field("a", FieldOperator::Equals, Value::Integer(1)),
            QueryAst::and(vec![
                field("b", FieldOperator::Equals, Value::Integer(2)),
                field("c", FieldOperator::Equals, Value::Integer(3)),
            ]),
        ]));
    }

    #[test]
    fn juxtaposition_is_implicit() {
        let ast = parse("peter NOT parker").unwrap();
        assert_eq!(ast, QueryAst::implicit(vec![
            QueryAst::unfielded(Value::String("peter".into())),
            QueryAst::not(QueryAst::unfielded(Value::String("parker".into()))),
        ]));
    }

    #[test]
    fn in_and_not_in_lists() {
        let ast = parse("age IN (20, 30) and name NOT IN (Peter)").unwrap();
        assert_eq!(ast, QueryAst::and(vec![
            field("age", FieldOperator::In, Value::List(vec![Value::Integer(20), Value::Integer(30)])),
            field("name", FieldOperator::NotIn, Value::List(vec![Value::String("Peter".into())])),
        ]));
    }

    #[test]
    fn word_shapes_become_value_kinds() {
        assert_eq!(parse("name: Pet*").unwrap(), field("name", FieldOperator::Equals, Value::Wildcard("Pet*".into())));
        assert_eq!(parse("name = *").unwrap(), field("name", FieldOperator::Equals, Value::MatchAll));
        assert_eq!(parse("*").unwrap(), QueryAst::match_all());
        assert_eq!(parse("bio ~ \"red car\"").unwrap(), field("bio", FieldOperator::Similar, Value::Phrase("red car".into())));
    }

    #[test]
    fn order_by_clauses() {
        let ast = parse("age > 18 ORDER BY name, age DESC").unwrap();
        match ast {
            QueryAst::Ordered(ordered) => {
                assert_eq!(*ordered.query, field("age", FieldOperator::GreaterThan, Value::Integer(18)));
                let fields: Vec<(&str, SortDirection)> = ordered.ordering.fields.iter()
                    .map(|f| (f.name.as_str(), f.direction))
                    .collect();
                assert_eq!(fields, vec![("name", SortDirection::Ascending), ("age", SortDirection::Descending)]);
            }
            other => panic!("expected ordered query, got {:?}", other),
        }
    }

    #[test]
    fn bare_order_by_matches_everything() {
        match parse("order by age").unwrap() {
            QueryAst::Ordered(ordered) => assert_eq!(*ordered.query, QueryAst::match_all()),
            other => panic!("expected ordered query, got {:?}", other),
        }
    }

    #[test]
    fn errors_carry_positions() {
        let err = parse("age = ").unwrap_err();
        assert_eq!(err.position, 6);

        let err = parse("(age = 1").unwrap_err();
        assert_eq!(err.position, 8);

        let err = parse("age = 1 )").unwrap_err();
        assert_eq!(err.position, 8);

        let err = parse("name IN Peter").unwrap_err();
        assert_eq!(err.position, 8);
    }

    #[test]
    fn parse_errors_convert_to_parse_kind() {
        let err: Error = parse("a = ").unwrap_err().into();
        assert_eq!(err.kind, ErrorKind::Parse);
    }
}
