//! 元模型结构与 JSON Schema 编译
//!
//! Hub 的 schema 文档是 JSON Schema，顶层 `properties` 以类别命名。
//! 编译后得到只有两种节点的树：对象节点（命名子节点）和叶子节点（值域）。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::warn;

use crate::metamodel::resolver::{AttributePath, Resolved, resolve};
use crate::models::category::Category;

/// `$ref` 展开与嵌套的最大深度
const MAX_DEPTH: usize = 64;

/// 元模型编译错误
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchemaError {
    #[error("schema document must be an object with top-level `properties`")]
    InvalidDocument,

    #[error("schema document declares no known category")]
    NoCategories,

    #[error("category '{0}' is not an object schema")]
    CategoryNotObject(String),

    #[error("cyclic $ref: {0}")]
    ReferenceCycle(String),

    #[error("unresolved $ref: {0}")]
    UnresolvedRef(String),

    #[error("only local $ref pointers are supported: {0}")]
    UnsupportedRef(String),

    #[error("schema nesting exceeds {0} levels")]
    TooDeep(usize),

    #[error("invalid reference: {0}")]
    InvalidReference(String),
}

/// 叶子值类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    String,
    Number,
    Integer,
    Boolean,
    /// 无声明属性的自由对象
    Object,
    Any,
}

impl ValueType {
    fn from_schema(schema: &Map<String, Value>) -> Self {
        let declared = match schema.get("type") {
            Some(Value::String(t)) => Some(t.as_str()),
            Some(Value::Array(types)) => types
                .iter()
                .filter_map(Value::as_str)
                .find(|t| *t != "null"),
            _ => None,
        };
        match declared {
            Some("string") => ValueType::String,
            Some("number") => ValueType::Number,
            Some("integer") => ValueType::Integer,
            Some("boolean") => ValueType::Boolean,
            Some("object") => ValueType::Object,
            _ => ValueType::Any,
        }
    }
}

/// 元模型节点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchemaNode {
    Object {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        children: BTreeMap<String, SchemaNode>,
    },
    Leaf {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        value_type: ValueType,
        /// 值出现在数组中
        #[serde(default)]
        repeated: bool,
    },
}

impl SchemaNode {
    pub fn leaf(value_type: ValueType) -> Self {
        SchemaNode::Leaf {
            description: None,
            value_type,
            repeated: false,
        }
    }

    pub fn object(children: impl IntoIterator<Item = (String, SchemaNode)>) -> Self {
        SchemaNode::Object {
            description: None,
            children: children.into_iter().collect(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, SchemaNode::Leaf { .. })
    }

    pub fn children(&self) -> Option<&BTreeMap<String, SchemaNode>> {
        match self {
            SchemaNode::Object { children, .. } => Some(children),
            SchemaNode::Leaf { .. } => None,
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            SchemaNode::Object { description, .. } | SchemaNode::Leaf { description, .. } => {
                description.as_deref()
            }
        }
    }

    fn set_description(&mut self, text: Option<String>) {
        if text.is_none() {
            return;
        }
        match self {
            SchemaNode::Object { description, .. } | SchemaNode::Leaf { description, .. } => {
                *description = text;
            }
        }
    }

    fn mark_repeated(&mut self) {
        if let SchemaNode::Leaf { repeated, .. } = self {
            *repeated = true;
        }
    }

    /// 合并同名节点：两个对象合并子节点，其余情况保留已有节点
    fn merge(&mut self, other: SchemaNode) {
        match self {
            SchemaNode::Object { children, .. } => {
                if let SchemaNode::Object {
                    children: incoming, ..
                } = other
                {
                    for (name, node) in incoming {
                        insert_child(children, name, node);
                    }
                }
            }
            SchemaNode::Leaf { .. } => {
                if !other.is_leaf() {
                    *self = other;
                }
            }
        }
    }
}

fn insert_child(children: &mut BTreeMap<String, SchemaNode>, name: String, node: SchemaNode) {
    match children.get_mut(&name) {
        Some(existing) => existing.merge(node),
        None => {
            children.insert(name, node);
        }
    }
}

/// 类别之间的引用关系，用于搜索时连接记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub from_category: Category,
    pub from_attribute: AttributePath,
    pub to_category: Category,
    pub to_attribute: AttributePath,
}

impl Reference {
    pub fn connects(&self, a: Category, b: Category) -> bool {
        (self.from_category == a && self.to_category == b)
            || (self.from_category == b && self.to_category == a)
    }
}

/// 一个 (仓库, Hub) 的元模型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metamodel {
    pub categories: BTreeMap<Category, SchemaNode>,
    #[serde(default)]
    pub references: Vec<Reference>,
}

impl Metamodel {
    /// 从 JSON Schema 文档编译元模型
    pub fn compile(document: &Value, references: Vec<Reference>) -> Result<Self, SchemaError> {
        let properties = document
            .get("properties")
            .and_then(Value::as_object)
            .ok_or(SchemaError::InvalidDocument)?;

        let mut compiler = Compiler {
            document,
            ref_stack: Vec::new(),
        };
        let mut categories = BTreeMap::new();
        for (name, schema) in properties {
            let Ok(category) = name.parse::<Category>() else {
                warn!("Skipping non-category schema property: {}", name);
                continue;
            };
            let node = compiler.node(schema, 0)?;
            if node.is_leaf() {
                return Err(SchemaError::CategoryNotObject(name.clone()));
            }
            categories.insert(category, node);
        }

        if categories.is_empty() {
            return Err(SchemaError::NoCategories);
        }

        let metamodel = Self {
            categories,
            references,
        };
        metamodel.check_references()?;
        Ok(metamodel)
    }

    /// 获取类别的根节点
    pub fn category(&self, category: Category) -> Option<&SchemaNode> {
        self.categories.get(&category)
    }

    /// 已声明的类别，按规范顺序
    pub fn category_names(&self) -> Vec<Category> {
        self.categories.keys().copied().collect()
    }

    /// 扁平形式：每个类别的全部叶子路径
    pub fn flat(&self) -> BTreeMap<Category, Vec<String>> {
        self.categories
            .iter()
            .map(|(category, root)| (*category, leaf_paths(root)))
            .collect()
    }

    fn check_references(&self) -> Result<(), SchemaError> {
        for reference in &self.references {
            for (category, attribute) in [
                (reference.from_category, &reference.from_attribute),
                (reference.to_category, &reference.to_attribute),
            ] {
                let root = self.category(category).ok_or_else(|| {
                    SchemaError::InvalidReference(format!("category '{}' not declared", category))
                })?;
                match resolve(root, attribute) {
                    Ok(Resolved::Leaf { .. }) => {}
                    _ => {
                        return Err(SchemaError::InvalidReference(format!(
                            "{}.{} is not a leaf attribute",
                            category, attribute
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

fn leaf_paths(root: &SchemaNode) -> Vec<String> {
    let mut paths = Vec::new();
    let mut stack: Vec<(String, &SchemaNode)> = vec![(String::new(), root)];
    while let Some((prefix, node)) = stack.pop() {
        match node {
            SchemaNode::Leaf { .. } => paths.push(prefix),
            SchemaNode::Object { children, .. } => {
                for (name, child) in children {
                    let path = if prefix.is_empty() {
                        name.clone()
                    } else {
                        format!("{}->{}", prefix, name)
                    };
                    stack.push((path, child));
                }
            }
        }
    }
    paths.sort();
    paths
}

struct Compiler<'d> {
    document: &'d Value,
    ref_stack: Vec<String>,
}

impl<'d> Compiler<'d> {
    fn node(&mut self, schema: &'d Value, depth: usize) -> Result<SchemaNode, SchemaError> {
        if depth > MAX_DEPTH {
            return Err(SchemaError::TooDeep(MAX_DEPTH));
        }
        let Some(obj) = schema.as_object() else {
            return Ok(SchemaNode::leaf(ValueType::Any));
        };
        let description = obj
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string);

        if let Some(pointer) = obj.get("$ref").and_then(Value::as_str) {
            if self.ref_stack.iter().any(|r| r == pointer) {
                return Err(SchemaError::ReferenceCycle(pointer.to_string()));
            }
            let target = self.lookup(pointer)?;
            self.ref_stack.push(pointer.to_string());
            let node = self.node(target, depth + 1);
            self.ref_stack.pop();
            let mut node = node?;
            node.set_description(description);
            return Ok(node);
        }

        if obj.get("type").and_then(Value::as_str) == Some("array") || obj.contains_key("items")
        {
            let mut node = match obj.get("items") {
                Some(Value::Array(tuple)) => {
                    let mut merged: Option<SchemaNode> = None;
                    for item in tuple {
                        let next = self.node(item, depth + 1)?;
                        match merged.as_mut() {
                            Some(node) => node.merge(next),
                            None => merged = Some(next),
                        }
                    }
                    merged.unwrap_or_else(|| SchemaNode::leaf(ValueType::Any))
                }
                Some(items) => self.node(items, depth + 1)?,
                None => SchemaNode::leaf(ValueType::Any),
            };
            node.mark_repeated();
            if node.description().is_none() {
                node.set_description(description);
            }
            return Ok(node);
        }

        let mut children = BTreeMap::new();
        if let Some(properties) = obj.get("properties").and_then(Value::as_object) {
            for (name, property) in properties {
                let child = self.node(property, depth + 1)?;
                insert_child(&mut children, name.clone(), child);
            }
        }
        for combinator in ["allOf", "anyOf", "oneOf"] {
            let Some(variants) = obj.get(combinator).and_then(Value::as_array) else {
                continue;
            };
            for variant in variants {
                if let SchemaNode::Object {
                    children: variant_children,
                    ..
                } = self.node(variant, depth + 1)?
                {
                    for (name, child) in variant_children {
                        insert_child(&mut children, name, child);
                    }
                }
            }
        }

        if children.is_empty() {
            Ok(SchemaNode::Leaf {
                description,
                value_type: ValueType::from_schema(obj),
                repeated: false,
            })
        } else {
            Ok(SchemaNode::Object {
                description,
                children,
            })
        }
    }

    fn lookup(&self, pointer: &str) -> Result<&'d Value, SchemaError> {
        let Some(fragment) = pointer.strip_prefix('#') else {
            return Err(SchemaError::UnsupportedRef(pointer.to_string()));
        };
        self.document
            .pointer(fragment)
            .ok_or_else(|| SchemaError::UnresolvedRef(pointer.to_string()))
    }
}
