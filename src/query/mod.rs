//! 内容查询模块
//!
//! `samples.content->'biomaterial_type' ? 'primary cell'` 这样的表达式先解析成
//! 语法树，再由执行器在连接后的记录行上求值。

pub mod ast;
pub mod executor;
pub mod parser;

pub use ast::{Expression, KeyChain, Literal, Operand, Operator, Predicate};
pub use executor::{SearchPlan, SearchResultSet, SearchRow, execute};
pub use parser::{MAX_NESTING, QueryParseError, parse};
