//! Parser for the field query language.
//!
//! Accepted forms:
//!
//! ```text
//! SELECT <* | field, ...> FROM <type> [WHERE <predicate>]
//!     [ORDER BY <field> [ASC | DESC]] [LIMIT <n> [OFFSET <m>]]
//!
//! [FROM <type>] [WHERE] <predicate> [ORDER BY ...] [LIMIT ...]
//! ```
//!
//! The second form is the clause passed to a row query, where the type is
//! already known. Predicates support `=`, `!=`, `<>`, `<`, `<=`, `>`, `>=`,
//! `[NOT] BETWEEN`, `[NOT] IN`, `IS [NOT] NULL`, `AND`, `OR`, `NOT` and
//! parentheses. Literals are integers, `'text'`, `TRUE`, `FALSE`, `NULL`
//! and `?` placeholders. Keywords and identifiers are case-insensitive.

use crate::error::{CoreError, CoreResult};
use crate::query::ast::{CompareOp, Expr, Operand, OrderBy, Selection, Statement};
use gridix_codec::Value;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Quoted(String),
    Int(i64),
    Str(String),
    Param,
    Star,
    Comma,
    LParen,
    RParen,
    Op(CompareOp),
    End,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(name) => format!("'{name}'"),
            Token::Quoted(name) => format!("\"{name}\""),
            Token::Int(n) => n.to_string(),
            Token::Str(s) => format!("'{s}'"),
            Token::Param => "'?'".into(),
            Token::Star => "'*'".into(),
            Token::Comma => "','".into(),
            Token::LParen => "'('".into(),
            Token::RParen => "')'".into(),
            Token::Op(_) => "operator".into(),
            Token::End => "end of query".into(),
        }
    }
}

const RESERVED: &[&str] = &[
    "SELECT", "FROM", "WHERE", "ORDER", "BY", "ASC", "DESC", "LIMIT", "OFFSET", "AND", "OR",
    "NOT", "BETWEEN", "IN", "IS", "NULL", "TRUE", "FALSE",
];

fn lex(text: &str) -> CoreResult<Vec<(Token, usize)>> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (pos, c) = chars[i];
        let next = chars.get(i + 1).map(|(_, c)| *c);

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let (token, len) = match c {
            '?' => (Token::Param, 1),
            '*' => (Token::Star, 1),
            ',' => (Token::Comma, 1),
            '(' => (Token::LParen, 1),
            ')' => (Token::RParen, 1),
            '=' => (Token::Op(CompareOp::Eq), 1),
            '!' if next == Some('=') => (Token::Op(CompareOp::Ne), 2),
            '<' if next == Some('>') => (Token::Op(CompareOp::Ne), 2),
            '<' if next == Some('=') => (Token::Op(CompareOp::Le), 2),
            '<' => (Token::Op(CompareOp::Lt), 1),
            '>' if next == Some('=') => (Token::Op(CompareOp::Ge), 2),
            '>' => (Token::Op(CompareOp::Gt), 1),
            '\'' => {
                let mut value = String::new();
                let mut j = i + 1;
                loop {
                    match chars.get(j).map(|(_, c)| *c) {
                        None => return Err(CoreError::parse("unterminated string literal", pos)),
                        Some('\'') if chars.get(j + 1).map(|(_, c)| *c) == Some('\'') => {
                            value.push('\'');
                            j += 2;
                        }
                        Some('\'') => break,
                        Some(c) => {
                            value.push(c);
                            j += 1;
                        }
                    }
                }
                (Token::Str(value), j + 1 - i)
            }
            '"' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|(_, c)| *c == '"')
                    .ok_or_else(|| CoreError::parse("unterminated quoted identifier", pos))?;
                let name: String = chars[i + 1..i + 1 + end].iter().map(|(_, c)| *c).collect();
                if name.is_empty() {
                    return Err(CoreError::parse("empty quoted identifier", pos));
                }
                (Token::Quoted(name), end + 2)
            }
            c if c.is_ascii_digit() || (c == '-' && next.is_some_and(|n| n.is_ascii_digit())) => {
                let len = 1 + chars[i + 1..]
                    .iter()
                    .take_while(|(_, c)| c.is_ascii_digit())
                    .count();
                let literal: String = chars[i..i + len].iter().map(|(_, c)| *c).collect();
                let value = literal
                    .parse::<i64>()
                    .map_err(|_| CoreError::parse(format!("integer out of range: {literal}"), pos))?;
                (Token::Int(value), len)
            }
            c if c.is_alphabetic() || c == '_' => {
                let len = chars[i..]
                    .iter()
                    .take_while(|(_, c)| c.is_alphanumeric() || *c == '_')
                    .count();
                let name: String = chars[i..i + len].iter().map(|(_, c)| *c).collect();
                (Token::Ident(name), len)
            }
            other => return Err(CoreError::parse(format!("unexpected character '{other}'"), pos)),
        };

        tokens.push((token, pos));
        i += len;
    }

    tokens.push((Token::End, text.len()));
    Ok(tokens)
}

/// Parses a full `SELECT` statement.
pub(crate) fn parse_select(text: &str) -> CoreResult<Statement> {
    let mut parser = Parser::new(text)?;
    parser.expect_keyword("SELECT")?;
    let statement = parser.select_body()?;
    parser.expect_end()?;
    Ok(statement)
}

/// Parses a bare clause, or a full statement if the text starts with
/// `SELECT`.
pub(crate) fn parse_clause(text: &str) -> CoreResult<Statement> {
    let mut parser = Parser::new(text)?;
    let statement = if parser.eat_keyword("SELECT") {
        parser.select_body()?
    } else {
        let type_name = if parser.eat_keyword("FROM") {
            Some(parser.identifier()?)
        } else {
            None
        };
        parser.eat_keyword("WHERE");
        let filter = if parser.at_keyword("ORDER") || parser.at_keyword("LIMIT") || parser.at_end() {
            None
        } else {
            Some(parser.predicate()?)
        };
        let (order_by, limit, offset) = parser.tail()?;
        Statement {
            selection: None,
            type_name,
            filter,
            order_by,
            limit,
            offset,
            params: parser.params,
        }
    };
    parser.expect_end()?;
    Ok(statement)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    index: usize,
    params: usize,
}

impl Parser {
    fn new(text: &str) -> CoreResult<Self> {
        Ok(Self {
            tokens: lex(text)?,
            index: 0,
            params: 0,
        })
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.index.min(self.tokens.len() - 1)].0
    }

    fn position(&self) -> usize {
        self.tokens[self.index.min(self.tokens.len() - 1)].1
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.index < self.tokens.len() - 1 {
            self.index += 1;
        }
        token
    }

    fn error<T>(&self, expected: &str) -> CoreResult<T> {
        Err(CoreError::parse(
            format!("expected {expected}, found {}", self.peek().describe()),
            self.position(),
        ))
    }

    fn at_end(&self) -> bool {
        *self.peek() == Token::End
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Token::Ident(name) if name.eq_ignore_ascii_case(keyword))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.at_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> CoreResult<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            self.error(keyword)
        }
    }

    fn expect(&mut self, token: Token) -> CoreResult<()> {
        if *self.peek() == token {
            self.advance();
            Ok(())
        } else {
            self.error(&token.describe())
        }
    }

    fn expect_end(&self) -> CoreResult<()> {
        if self.at_end() {
            Ok(())
        } else {
            self.error("end of query")
        }
    }

    fn identifier(&mut self) -> CoreResult<String> {
        match self.peek().clone() {
            Token::Ident(name) if !RESERVED.iter().any(|k| name.eq_ignore_ascii_case(k)) => {
                self.advance();
                Ok(name)
            }
            Token::Quoted(name) => {
                self.advance();
                Ok(name)
            }
            _ => self.error("identifier"),
        }
    }

    fn count(&mut self) -> CoreResult<u64> {
        match self.peek().clone() {
            Token::Int(n) if n >= 0 => {
                self.advance();
                Ok(n as u64)
            }
            _ => self.error("non-negative integer"),
        }
    }

    fn select_body(&mut self) -> CoreResult<Statement> {
        let selection = if *self.peek() == Token::Star {
            self.advance();
            Selection::All
        } else {
            let mut fields = vec![self.identifier()?];
            while *self.peek() == Token::Comma {
                self.advance();
                fields.push(self.identifier()?);
            }
            Selection::Fields(fields)
        };

        self.expect_keyword("FROM")?;
        let type_name = self.identifier()?;
        let filter = if self.eat_keyword("WHERE") {
            Some(self.predicate()?)
        } else {
            None
        };
        let (order_by, limit, offset) = self.tail()?;

        Ok(Statement {
            selection: Some(selection),
            type_name: Some(type_name),
            filter,
            order_by,
            limit,
            offset,
            params: self.params,
        })
    }

    fn tail(&mut self) -> CoreResult<(Option<OrderBy>, Option<u64>, Option<u64>)> {
        let order_by = if self.eat_keyword("ORDER") {
            self.expect_keyword("BY")?;
            let field = self.identifier()?;
            let descending = if self.eat_keyword("DESC") {
                true
            } else {
                self.eat_keyword("ASC");
                false
            };
            Some(OrderBy { field, descending })
        } else {
            None
        };

        let (limit, offset) = if self.eat_keyword("LIMIT") {
            let limit = self.count()?;
            let offset = if self.eat_keyword("OFFSET") {
                Some(self.count()?)
            } else {
                None
            };
            (Some(limit), offset)
        } else {
            (None, None)
        };

        Ok((order_by, limit, offset))
    }

    fn predicate(&mut self) -> CoreResult<Expr> {
        let mut left = self.conjunction()?;
        while self.eat_keyword("OR") {
            let right = self.conjunction()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn conjunction(&mut self) -> CoreResult<Expr> {
        let mut left = self.negation()?;
        while self.eat_keyword("AND") {
            let right = self.negation()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn negation(&mut self) -> CoreResult<Expr> {
        if self.eat_keyword("NOT") {
            return Ok(Expr::Not(Box::new(self.negation()?)));
        }
        if *self.peek() == Token::LParen {
            self.advance();
            let inner = self.predicate()?;
            self.expect(Token::RParen)?;
            return Ok(inner);
        }
        self.comparison()
    }

    fn comparison(&mut self) -> CoreResult<Expr> {
        if let Some(operand) = self.try_operand()? {
            // Literal on the left: `5 < age`.
            let Token::Op(op) = self.peek().clone() else {
                return self.error("comparison operator");
            };
            self.advance();
            let field = self.identifier()?;
            return Ok(Expr::Compare {
                field,
                op: op.flipped(),
                operand,
            });
        }

        let field = self.identifier()?;
        if let Token::Op(op) = self.peek().clone() {
            self.advance();
            let operand = self.operand()?;
            return Ok(Expr::Compare { field, op, operand });
        }

        if self.eat_keyword("IS") {
            let negated = self.eat_keyword("NOT");
            self.expect_keyword("NULL")?;
            return Ok(Expr::IsNull { field, negated });
        }

        let negated = self.eat_keyword("NOT");
        if self.eat_keyword("BETWEEN") {
            let low = self.operand()?;
            self.expect_keyword("AND")?;
            let high = self.operand()?;
            return Ok(Expr::Between {
                field,
                low,
                high,
                negated,
            });
        }
        if self.eat_keyword("IN") {
            self.expect(Token::LParen)?;
            let mut list = vec![self.operand()?];
            while *self.peek() == Token::Comma {
                self.advance();
                list.push(self.operand()?);
            }
            self.expect(Token::RParen)?;
            return Ok(Expr::In {
                field,
                list,
                negated,
            });
        }

        self.error(if negated { "BETWEEN or IN" } else { "comparison" })
    }

    fn operand(&mut self) -> CoreResult<Operand> {
        match self.try_operand()? {
            Some(operand) => Ok(operand),
            None => self.error("literal or '?'"),
        }
    }

    fn try_operand(&mut self) -> CoreResult<Option<Operand>> {
        let operand = match self.peek().clone() {
            Token::Int(n) => Operand::Literal(Value::Integer(n)),
            Token::Str(s) => Operand::Literal(Value::Text(s)),
            Token::Param => {
                self.params += 1;
                Operand::Param(self.params - 1)
            }
            Token::Ident(word) if word.eq_ignore_ascii_case("TRUE") => {
                Operand::Literal(Value::Bool(true))
            }
            Token::Ident(word) if word.eq_ignore_ascii_case("FALSE") => {
                Operand::Literal(Value::Bool(false))
            }
            Token::Ident(word) if word.eq_ignore_ascii_case("NULL") => Operand::Literal(Value::Null),
            _ => return Ok(None),
        };
        self.advance();
        Ok(Some(operand))
    }
}
