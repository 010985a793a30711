//! 属性路径解析
//!
//! 在类别的元模型树上逐段行走。同一套路径语法既用于列出子属性，
//! 也用于定位取值的叶子。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::metamodel::schema::{SchemaNode, ValueType};
use crate::models::content::PathStep;

/// 路径分隔符
pub const SEPARATOR: &str = "->";

/// 路径解析错误
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PathError {
    #[error("unknown attribute '{segment}' in path '{path}'")]
    UnknownAttribute { segment: String, path: String },

    #[error("segment '{segment}' follows leaf attribute '{leaf}'")]
    PathTooDeep { segment: String, leaf: String },
}

/// 属性路径：`seg1->seg2->...->segN`
///
/// 段两侧的空白会被忽略，段可以用单引号包裹（`'sample_type'->'term_value'`）。
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct AttributePath {
    segments: Vec<String>,
}

impl AttributePath {
    pub fn new(segments: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// 转换为内容导航步骤
    pub fn steps(&self) -> Vec<PathStep> {
        self.segments.iter().map(PathStep::key).collect()
    }
}

impl FromStr for AttributePath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Ok(Self::default());
        }
        let segments = s.split(SEPARATOR).map(unquote).collect();
        Ok(Self { segments })
    }
}

fn unquote(segment: &str) -> String {
    let trimmed = segment.trim();
    match trimmed
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
    {
        Some(inner) => inner.replace("''", "'"),
        None => trimmed.to_string(),
    }
}

impl From<String> for AttributePath {
    fn from(value: String) -> Self {
        let Ok(path) = value.parse();
        path
    }
}

impl From<AttributePath> for String {
    fn from(value: AttributePath) -> Self {
        value.to_string()
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join(SEPARATOR))
    }
}

/// 解析结果
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved<'m> {
    /// 路径落在对象节点上
    Object {
        children: &'m BTreeMap<String, SchemaNode>,
    },
    /// 路径落在叶子上
    Leaf { value_type: ValueType, repeated: bool },
}

impl Resolved<'_> {
    /// 子属性名（已排序、无重复）；叶子没有子属性
    pub fn attribute_names(&self) -> Vec<String> {
        match self {
            Resolved::Object { children } => children.keys().cloned().collect(),
            Resolved::Leaf { .. } => Vec::new(),
        }
    }

    /// 对象节点的子节点全部是叶子
    pub fn is_flat_object(&self) -> bool {
        match self {
            Resolved::Object { children } => children.values().all(SchemaNode::is_leaf),
            Resolved::Leaf { .. } => false,
        }
    }
}

/// 沿路径行走类别的元模型树
pub fn resolve<'m>(root: &'m SchemaNode, path: &AttributePath) -> Result<Resolved<'m>, PathError> {
    let mut node = root;
    let mut walked = 0usize;
    for segment in path.segments() {
        match node {
            SchemaNode::Object { children, .. } => {
                node = children
                    .get(segment)
                    .ok_or_else(|| PathError::UnknownAttribute {
                        segment: segment.clone(),
                        path: path.to_string(),
                    })?;
            }
            SchemaNode::Leaf { .. } => {
                return Err(PathError::PathTooDeep {
                    segment: segment.clone(),
                    leaf: path.segments()[..walked].join(SEPARATOR),
                });
            }
        }
        walked += 1;
    }

    Ok(match node {
        SchemaNode::Object { children, .. } => Resolved::Object { children },
        SchemaNode::Leaf {
            value_type,
            repeated,
            ..
        } => Resolved::Leaf {
            value_type: *value_type,
            repeated: *repeated,
        },
    })
}
