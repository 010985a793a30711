//! 查询解析器
//!
//! 语法（关键字不区分大小写，优先级 NOT > AND > OR）：
//!
//! ```text
//! expr      := and ("OR" and)*
//! and       := unary ("AND" unary)*
//! unary     := "NOT" unary | "(" expr ")" | predicate
//! predicate := key_chain operator operand
//! key_chain := category ".content" (("->" | "->>") segment)+
//! segment   := 'quoted' | integer | identifier
//! operator  := "?" | "=" | "!=" | "<>" | "LIKE" | "ILIKE" | "IN"
//! operand   := literal | "(" literal ("," literal)* ")"
//! ```
//!
//! 任何语法错误都在访问存储之前返回。括号和 `NOT` 的嵌套层数受
//! [`MAX_NESTING`] 限制，递归深度与输入长度无关。

use thiserror::Error;

use crate::models::category::Category;
use crate::models::content::PathStep;
use crate::query::ast::{Expression, KeyChain, Literal, Operand, Operator, Predicate};

/// 括号与 `NOT` 的最大嵌套层数
pub const MAX_NESTING: usize = 64;

/// 查询解析错误，`pos` 为字节偏移
#[derive(Debug, Error, Clone, PartialEq)]
pub enum QueryParseError {
    #[error("empty query")]
    Empty,

    #[error("unexpected character '{ch}' at {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("unterminated quoted literal starting at {pos}")]
    UnterminatedLiteral { pos: usize },

    #[error("unknown category alias '{name}' at {pos}")]
    UnknownCategory { name: String, pos: usize },

    #[error("expected '.content' after category at {pos}")]
    ExpectedContent { pos: usize },

    #[error("key chain has no '->' segment at {pos}")]
    EmptyKeyChain { pos: usize },

    #[error("'->>' must be the last segment of a key chain (at {pos})")]
    TextExtractionNotLast { pos: usize },

    #[error("expected comparison operator at {pos}, found {found}")]
    MissingOperator { found: String, pos: usize },

    #[error("expected operand at {pos}, found {found}")]
    MissingOperand { found: String, pos: usize },

    #[error("unexpected {found} at {pos}")]
    UnexpectedToken { found: String, pos: usize },

    #[error("unexpected trailing {found} at {pos}")]
    TrailingTokens { found: String, pos: usize },

    #[error("expression nested deeper than {max} levels at {pos}")]
    TooDeep { max: usize, pos: usize },

    #[error("invalid LIKE pattern '{0}'")]
    InvalidPattern(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(String),
    Str(String),
    Dot,
    Arrow,
    TextArrow,
    Question,
    Eq,
    NotEq,
    LParen,
    RParen,
    Comma,
    End,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(s) => format!("'{}'", s),
            Token::Number(n) => n.clone(),
            Token::Str(s) => format!("literal '{}'", s),
            Token::Dot => "'.'".into(),
            Token::Arrow => "'->'".into(),
            Token::TextArrow => "'->>'".into(),
            Token::Question => "'?'".into(),
            Token::Eq => "'='".into(),
            Token::NotEq => "'!='".into(),
            Token::LParen => "'('".into(),
            Token::RParen => "')'".into(),
            Token::Comma => "','".into(),
            Token::End => "end of input".into(),
        }
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Token::Ident(s) if s.eq_ignore_ascii_case(keyword))
    }
}

fn tokenize(input: &str) -> Result<Vec<(Token, usize)>, QueryParseError> {
    let mut tokens = Vec::new();
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut i = 0;

    while i < chars.len() {
        let (pos, c) = chars[i];
        let next = chars.get(i + 1).map(|(_, c)| *c);
        match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '\'' => {
                let mut text = String::new();
                let mut j = i + 1;
                loop {
                    match chars.get(j) {
                        None => return Err(QueryParseError::UnterminatedLiteral { pos }),
                        Some((_, '\'')) if matches!(chars.get(j + 1), Some((_, '\''))) => {
                            text.push('\'');
                            j += 2;
                        }
                        Some((_, '\'')) => break,
                        Some((_, ch)) => {
                            text.push(*ch);
                            j += 1;
                        }
                    }
                }
                tokens.push((Token::Str(text), pos));
                i = j + 1;
                continue;
            }
            '-' if next == Some('>') => {
                if matches!(chars.get(i + 2), Some((_, '>'))) {
                    tokens.push((Token::TextArrow, pos));
                    i += 3;
                } else {
                    tokens.push((Token::Arrow, pos));
                    i += 2;
                }
                continue;
            }
            '!' if next == Some('=') => {
                tokens.push((Token::NotEq, pos));
                i += 2;
                continue;
            }
            '<' if next == Some('>') => {
                tokens.push((Token::NotEq, pos));
                i += 2;
                continue;
            }
            '-' | '0'..='9' => {
                let mut j = i + 1;
                while matches!(chars.get(j), Some((_, d)) if d.is_ascii_digit() || *d == '.') {
                    j += 1;
                }
                let end = chars.get(j).map_or(input.len(), |(p, _)| *p);
                let text = &input[pos..end];
                if text == "-" || text.parse::<f64>().is_err() {
                    return Err(QueryParseError::UnexpectedChar { ch: c, pos });
                }
                tokens.push((Token::Number(text.to_string()), pos));
                i = j;
                continue;
            }
            c if c.is_alphabetic() || c == '_' || c == '@' => {
                let mut j = i + 1;
                while matches!(chars.get(j), Some((_, d)) if d.is_alphanumeric() || *d == '_') {
                    j += 1;
                }
                let end = chars.get(j).map_or(input.len(), |(p, _)| *p);
                tokens.push((Token::Ident(input[pos..end].to_string()), pos));
                i = j;
                continue;
            }
            _ => {}
        }

        let token = match c {
            '.' => Token::Dot,
            '?' => Token::Question,
            '=' => Token::Eq,
            '(' => Token::LParen,
            ')' => Token::RParen,
            ',' => Token::Comma,
            other => return Err(QueryParseError::UnexpectedChar { ch: other, pos }),
        };
        tokens.push((token, pos));
        i += 1;
    }

    tokens.push((Token::End, input.len()));
    Ok(tokens)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    cursor: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.cursor].0
    }

    fn pos(&self) -> usize {
        self.tokens[self.cursor].1
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.cursor].0.clone();
        if token != Token::End {
            self.cursor += 1;
        }
        token
    }

    fn unexpected(&self) -> QueryParseError {
        QueryParseError::UnexpectedToken {
            found: self.peek().describe(),
            pos: self.pos(),
        }
    }

    fn or(&mut self) -> Result<Expression, QueryParseError> {
        let mut items = vec![self.and()?];
        while self.peek().is_keyword("OR") {
            self.advance();
            items.push(self.and()?);
        }
        Ok(if items.len() == 1 {
            items.remove(0)
        } else {
            Expression::Or(items)
        })
    }

    fn and(&mut self) -> Result<Expression, QueryParseError> {
        let mut items = vec![self.unary()?];
        while self.peek().is_keyword("AND") {
            self.advance();
            items.push(self.unary()?);
        }
        Ok(if items.len() == 1 {
            items.remove(0)
        } else {
            Expression::And(items)
        })
    }

    fn unary(&mut self) -> Result<Expression, QueryParseError> {
        let negated = self.peek().is_keyword("NOT");
        if !negated && *self.peek() != Token::LParen {
            return Ok(Expression::Predicate(self.predicate()?));
        }

        if self.depth >= MAX_NESTING {
            return Err(QueryParseError::TooDeep {
                max: MAX_NESTING,
                pos: self.pos(),
            });
        }
        self.depth += 1;
        self.advance();
        let inner = if negated {
            Expression::Not(Box::new(self.unary()?))
        } else {
            let inner = self.or()?;
            if *self.peek() != Token::RParen {
                return Err(self.unexpected());
            }
            self.advance();
            inner
        };
        self.depth -= 1;
        Ok(inner)
    }

    fn predicate(&mut self) -> Result<Predicate, QueryParseError> {
        let key = self.key_chain()?;
        let operator = self.operator()?;
        let operand = match operator {
            Operator::In => self.list()?,
            _ => Operand::Single(self.literal()?),
        };
        Ok(Predicate {
            key,
            operator,
            operand,
        })
    }

    fn key_chain(&mut self) -> Result<KeyChain, QueryParseError> {
        let pos = self.pos();
        let category = match self.peek() {
            Token::Ident(name) => {
                let category = name
                    .parse::<Category>()
                    .map_err(|_| QueryParseError::UnknownCategory {
                        name: name.clone(),
                        pos,
                    })?;
                self.advance();
                category
            }
            _ => return Err(self.unexpected()),
        };

        let content_pos = self.pos();
        if self.advance() != Token::Dot || !self.peek().is_keyword("content") {
            return Err(QueryParseError::ExpectedContent { pos: content_pos });
        }
        self.advance();

        let mut steps = Vec::new();
        let mut as_text = false;
        loop {
            let arrow_pos = self.pos();
            let text = match self.peek() {
                Token::Arrow => false,
                Token::TextArrow => true,
                _ => break,
            };
            if as_text {
                return Err(QueryParseError::TextExtractionNotLast { pos: arrow_pos });
            }
            self.advance();
            let step = match self.advance() {
                Token::Str(key) | Token::Ident(key) => PathStep::Key(key),
                Token::Number(n) => match n.parse::<usize>() {
                    Ok(index) => PathStep::Index(index),
                    Err(_) => PathStep::Key(n),
                },
                other => {
                    return Err(QueryParseError::UnexpectedToken {
                        found: other.describe(),
                        pos: arrow_pos,
                    });
                }
            };
            steps.push(step);
            as_text = text;
        }

        if steps.is_empty() {
            return Err(QueryParseError::EmptyKeyChain { pos: self.pos() });
        }
        Ok(KeyChain {
            category,
            steps,
            as_text,
        })
    }

    fn operator(&mut self) -> Result<Operator, QueryParseError> {
        let token = self.peek();
        let operator = match token {
            Token::Question => Operator::Contains,
            Token::Eq => Operator::Eq,
            Token::NotEq => Operator::NotEq,
            t if t.is_keyword("IN") => Operator::In,
            t if t.is_keyword("LIKE") => Operator::Like,
            t if t.is_keyword("ILIKE") => Operator::ILike,
            other => {
                return Err(QueryParseError::MissingOperator {
                    found: other.describe(),
                    pos: self.pos(),
                });
            }
        };
        self.advance();
        Ok(operator)
    }

    fn literal(&mut self) -> Result<Literal, QueryParseError> {
        let literal = match self.peek() {
            Token::Str(s) => Literal::Text(s.clone()),
            Token::Number(n) => Literal::Number(n.clone()),
            Token::Ident(s) if !is_reserved(s) => Literal::Text(s.clone()),
            other => {
                return Err(QueryParseError::MissingOperand {
                    found: other.describe(),
                    pos: self.pos(),
                });
            }
        };
        self.advance();
        Ok(literal)
    }

    fn list(&mut self) -> Result<Operand, QueryParseError> {
        if *self.peek() != Token::LParen {
            return Err(QueryParseError::MissingOperand {
                found: self.peek().describe(),
                pos: self.pos(),
            });
        }
        self.advance();
        let mut items = vec![self.literal()?];
        while *self.peek() == Token::Comma {
            self.advance();
            items.push(self.literal()?);
        }
        if *self.peek() != Token::RParen {
            return Err(self.unexpected());
        }
        self.advance();
        Ok(Operand::List(items))
    }
}

fn is_reserved(word: &str) -> bool {
    ["AND", "OR", "NOT", "IN", "LIKE", "ILIKE"]
        .iter()
        .any(|k| word.eq_ignore_ascii_case(k))
}

/// 解析查询表达式
pub fn parse(input: &str) -> Result<Expression, QueryParseError> {
    if input.trim().is_empty() {
        return Err(QueryParseError::Empty);
    }
    let mut parser = Parser {
        tokens: tokenize(input)?,
        cursor: 0,
        depth: 0,
    };
    let expression = parser.or()?;
    if *parser.peek() != Token::End {
        return Err(QueryParseError::TrailingTokens {
            found: parser.peek().describe(),
            pos: parser.pos(),
        });
    }
    Ok(expression)
}
