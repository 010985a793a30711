//! 内容文档导航
//!
//! 记录内容是任意嵌套的 JSON。导航时数组对路径透明：
//! 在数组上应用键名等价于对每个元素应用该键。

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// 导航的一步
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathStep {
    /// 对象键
    Key(String),
    /// 数组下标
    Index(usize),
}

impl PathStep {
    pub fn key(name: impl Into<String>) -> Self {
        PathStep::Key(name.into())
    }
}

impl fmt::Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathStep::Key(key) => write!(f, "'{}'", key.replace('\'', "''")),
            PathStep::Index(index) => write!(f, "{}", index),
        }
    }
}

/// 沿路径导航，返回所有可达的值（文档顺序）
pub fn navigate<'v>(root: &'v Value, steps: &[PathStep]) -> Vec<&'v Value> {
    let mut current = vec![root];
    for step in steps {
        let mut next = Vec::new();
        for value in current {
            descend(value, step, &mut next);
        }
        if next.is_empty() {
            return next;
        }
        current = next;
    }
    current
}

fn descend<'v>(value: &'v Value, step: &PathStep, out: &mut Vec<&'v Value>) {
    let mut stack = vec![value];
    while let Some(value) = stack.pop() {
        match (value, step) {
            (Value::Object(map), PathStep::Key(key)) => {
                if let Some(child) = map.get(key) {
                    out.push(child);
                }
            }
            (Value::Array(items), PathStep::Index(index)) => {
                if let Some(child) = items.get(*index) {
                    out.push(child);
                }
            }
            (Value::Array(items), PathStep::Key(_)) => stack.extend(items.iter().rev()),
            _ => {}
        }
    }
}

/// 将值展开为文本：字符串原样输出，数字和布尔值取 JSON 文本，
/// 数组逐元素展开，对象取紧凑 JSON，null 被跳过。
pub fn texts(values: &[&Value]) -> Vec<String> {
    let mut out = Vec::new();
    let mut stack: Vec<&Value> = values.iter().rev().copied().collect();
    while let Some(value) = stack.pop() {
        match value {
            Value::Null => {}
            Value::String(s) => out.push(s.clone()),
            Value::Array(items) => stack.extend(items.iter().rev()),
            Value::Object(_) => out.push(value.to_string()),
            other => out.push(other.to_string()),
        }
    }
    out
}

/// 标量的文本形式；数组、对象和 null 返回 None
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
