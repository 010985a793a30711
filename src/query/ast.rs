//! 查询语法树
//!
//! 解析与执行分离：解析器只产出这里的纯数据结构，执行器再把它
//! 编译成可求值的条件。

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::models::category::Category;
use crate::models::content::PathStep;

/// 布尔表达式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    Predicate(Predicate),
    Not(Box<Expression>),
    And(Vec<Expression>),
    Or(Vec<Expression>),
}

impl Expression {
    /// 表达式引用到的类别
    pub fn categories(&self) -> BTreeSet<Category> {
        let mut out = BTreeSet::new();
        let mut stack = vec![self];
        while let Some(expr) = stack.pop() {
            match expr {
                Expression::Predicate(p) => {
                    out.insert(p.key.category);
                }
                Expression::Not(inner) => stack.push(inner),
                Expression::And(items) | Expression::Or(items) => stack.extend(items.iter()),
            }
        }
        out
    }
}

/// 单个比较：键链 + 运算符 + 操作数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    pub key: KeyChain,
    pub operator: Operator,
    pub operand: Operand,
}

/// `category.content->'a'->'b'` 形式的内容键链
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyChain {
    pub category: Category,
    pub steps: Vec<PathStep>,
    /// 最后一段使用 `->>` 取文本
    pub as_text: bool,
}

impl fmt::Display for KeyChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.content", self.category)?;
        let last = self.steps.len().saturating_sub(1);
        for (i, step) in self.steps.iter().enumerate() {
            let arrow = if self.as_text && i == last { "->>" } else { "->" };
            write!(f, "{}{}", arrow, step)?;
        }
        Ok(())
    }
}

/// 比较运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    /// `?`
    Contains,
    /// `=`
    Eq,
    /// `!=` 或 `<>`
    NotEq,
    /// `IN (...)`
    In,
    /// `LIKE`
    Like,
    /// `ILIKE`
    ILike,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operator::Contains => "?",
            Operator::Eq => "=",
            Operator::NotEq => "!=",
            Operator::In => "IN",
            Operator::Like => "LIKE",
            Operator::ILike => "ILIKE",
        };
        f.write_str(s)
    }
}

/// 字面量
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    /// 引号字符串或裸字
    Text(String),
    /// 数字，保留原文
    Number(String),
}

impl Literal {
    pub fn text(&self) -> &str {
        match self {
            Literal::Text(s) | Literal::Number(s) => s,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Literal::Number(n) => f.write_str(n),
        }
    }
}

/// 操作数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    Single(Literal),
    List(Vec<Literal>),
}

impl Operand {
    pub fn literals(&self) -> &[Literal] {
        match self {
            Operand::Single(literal) => std::slice::from_ref(literal),
            Operand::List(items) => items,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Single(literal) => write!(f, "{}", literal),
            Operand::List(items) => {
                let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "({})", parts.join(", "))
            }
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.key, self.operator, self.operand)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Predicate(p) => write!(f, "{}", p),
            Expression::Not(inner) => write!(f, "NOT ({})", inner),
            Expression::And(items) | Expression::Or(items) => {
                let joiner = if matches!(self, Expression::And(_)) {
                    " AND "
                } else {
                    " OR "
                };
                let parts: Vec<String> = items.iter().map(|e| format!("({})", e)).collect();
                f.write_str(&parts.join(joiner))
            }
        }
    }
}
