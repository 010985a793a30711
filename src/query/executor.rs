//! 查询执行
//!
//! 把各类别的记录按引用连接成行，对每一行求值条件，投影后去重并截断。
//! 这是存储层的默认实现，后端可以选择下推。

use regex::{Regex, RegexBuilder};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use tracing::{debug, warn};

use crate::metamodel::schema::Reference;
use crate::models::category::Category;
use crate::models::content::{self, scalar_text};
use crate::models::record::Record;
use crate::query::ast::{Expression, Literal, Operator, Predicate};
use crate::query::parser::QueryParseError;

/// 一次搜索的执行计划
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPlan {
    pub expression: Expression,
    /// 输出的类别（规范顺序）
    pub projection: Vec<Category>,
    /// 参与连接的类别（规范顺序），包含投影类别和查询引用的类别
    pub join: Vec<Category>,
    /// 0 表示不限
    pub limit: usize,
}

impl SearchPlan {
    /// 构建计划
    ///
    /// `projection` 为空时，投影到引用关系覆盖的全部类别以及查询中出现的类别。
    pub fn new(
        expression: Expression,
        projection: &[Category],
        references: &[Reference],
        limit: usize,
    ) -> Self {
        let queried = expression.categories();
        let projection: BTreeSet<Category> = if projection.is_empty() {
            references
                .iter()
                .flat_map(|r| [r.from_category, r.to_category])
                .chain(queried.iter().copied())
                .collect()
        } else {
            projection.iter().copied().collect()
        };
        let required: BTreeSet<Category> =
            projection.iter().chain(queried.iter()).copied().collect();
        let join = connect(&required, references);

        Self {
            expression,
            projection: projection.into_iter().collect(),
            join: join.into_iter().collect(),
            limit,
        }
    }
}

/// 补齐连接所需的中间类别
///
/// 例如投影 `tracks` 而查询 `samples` 时，需要经由 `experiments` 连接。
/// 引用图中不可达的类别原样保留，执行时做笛卡尔积。
fn connect(required: &BTreeSet<Category>, references: &[Reference]) -> BTreeSet<Category> {
    let mut joined: BTreeSet<Category> = BTreeSet::new();
    for &target in required {
        if joined.is_empty() || joined.contains(&target) {
            joined.insert(target);
            continue;
        }
        // 从已连接集合出发做 BFS
        let mut parent: HashMap<Category, Category> = HashMap::new();
        let mut queue: VecDeque<Category> = joined.iter().copied().collect();
        let mut visited: HashSet<Category> = joined.iter().copied().collect();
        while let Some(current) = queue.pop_front() {
            if current == target {
                break;
            }
            for next in Category::ALL {
                if !visited.contains(&next) && references.iter().any(|r| r.connects(current, next)) {
                    visited.insert(next);
                    parent.insert(next, current);
                    queue.push_back(next);
                }
            }
        }
        let mut cursor = target;
        joined.insert(target);
        while let Some(&previous) = parent.get(&cursor) {
            joined.insert(previous);
            cursor = previous;
        }
    }
    joined
}

/// 结果行：类别 → 该类别中参与连接的一条记录
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRow {
    pub records: BTreeMap<Category, Record>,
}

impl SearchRow {
    pub fn get(&self, category: Category) -> Option<&Record> {
        self.records.get(&category)
    }

    /// JSON 表示：`{ "<category>": <content>, ... }`
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .records
            .iter()
            .map(|(category, record)| (category.to_string(), record.content.clone()))
            .collect();
        Value::Object(map)
    }
}

/// 有序结果集
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResultSet {
    pub rows: Vec<SearchRow>,
}

impl SearchResultSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 某类别在结果中出现的记录 ID
    pub fn record_ids(&self, category: Category) -> HashSet<&str> {
        self.rows
            .iter()
            .filter_map(|row| row.get(category))
            .map(|record| record.id.as_str())
            .collect()
    }

    pub fn to_json(&self) -> Value {
        Value::Array(self.rows.iter().map(SearchRow::to_json).collect())
    }
}

impl Serialize for SearchResultSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// 编译后的条件
#[derive(Debug)]
pub enum Condition {
    Leaf(Matcher),
    Not(Box<Condition>),
    And(Vec<Condition>),
    Or(Vec<Condition>),
}

/// 编译后的谓词
#[derive(Debug)]
pub struct Matcher {
    predicate: Predicate,
    pattern: Option<Regex>,
}

impl Condition {
    pub fn compile(expression: &Expression) -> Result<Self, QueryParseError> {
        Ok(match expression {
            Expression::Predicate(p) => Condition::Leaf(Matcher::new(p.clone())?),
            Expression::Not(inner) => Condition::Not(Box::new(Self::compile(inner)?)),
            Expression::And(items) => Condition::And(
                items.iter().map(Self::compile).collect::<Result<_, _>>()?,
            ),
            Expression::Or(items) => Condition::Or(
                items.iter().map(Self::compile).collect::<Result<_, _>>()?,
            ),
        })
    }

    /// 对一行求值；缺少谓词所需类别的行视为不满足该谓词
    pub fn evaluate(&self, row: &BTreeMap<Category, &Record>) -> bool {
        match self {
            Condition::Leaf(matcher) => row
                .get(&matcher.predicate.key.category)
                .is_some_and(|record| matcher.matches(&record.content)),
            Condition::Not(inner) => !inner.evaluate(row),
            Condition::And(items) => items.iter().all(|c| c.evaluate(row)),
            Condition::Or(items) => items.iter().any(|c| c.evaluate(row)),
        }
    }
}

/// LIKE 模式编译后的大小上限
const PATTERN_SIZE_LIMIT: usize = 1 << 20;

/// LIKE 模式转正则：`%` 任意串，`_` 单字符
fn like_to_regex(pattern: &str) -> String {
    let mut out = String::from("^");
    for c in pattern.chars() {
        match c {
            '%' => out.push_str(".*"),
            '_' => out.push('.'),
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    out
}

impl Matcher {
    fn new(predicate: Predicate) -> Result<Self, QueryParseError> {
        let pattern = match predicate.operator {
            Operator::Like | Operator::ILike => {
                let source = predicate
                    .operand
                    .literals()
                    .first()
                    .map(Literal::text)
                    .unwrap_or_default();
                let regex = RegexBuilder::new(&like_to_regex(source))
                    .case_insensitive(predicate.operator == Operator::ILike)
                    .dot_matches_new_line(true)
                    .size_limit(PATTERN_SIZE_LIMIT)
                    .build()
                    .map_err(|_| QueryParseError::InvalidPattern(source.to_string()))?;
                Some(regex)
            }
            _ => None,
        };
        Ok(Self { predicate, pattern })
    }

    /// 内容文档是否满足谓词：键链可达的任一值满足即可
    pub fn matches(&self, document: &Value) -> bool {
        content::navigate(document, &self.predicate.key.steps)
            .into_iter()
            .any(|value| self.matches_value(value))
    }

    fn matches_value(&self, value: &Value) -> bool {
        let literals = self.predicate.operand.literals();
        match self.predicate.operator {
            Operator::Contains => {
                let needle = literals.first().map(Literal::text).unwrap_or_default();
                match value {
                    Value::Array(items) => items.iter().any(|v| scalar_text(v).as_deref() == Some(needle)),
                    Value::Object(map) => map.contains_key(needle),
                    scalar => scalar_text(scalar).as_deref() == Some(needle),
                }
            }
            Operator::Eq | Operator::In => {
                elements(value).any(|v| literals.iter().any(|l| literal_equals(l, v)))
            }
            Operator::NotEq => {
                !value.is_null() && !elements(value).any(|v| literals.iter().any(|l| literal_equals(l, v)))
            }
            Operator::Like | Operator::ILike => match &self.pattern {
                Some(regex) => elements(value)
                    .filter_map(scalar_text)
                    .any(|text| regex.is_match(&text)),
                None => false,
            },
        }
    }
}

/// 数组比较其元素，其余比较自身
fn elements(value: &Value) -> Box<dyn Iterator<Item = &Value> + '_> {
    match value {
        Value::Array(items) => Box::new(items.iter()),
        other => Box::new(std::iter::once(other)),
    }
}

fn literal_equals(literal: &Literal, value: &Value) -> bool {
    match (literal, value) {
        (Literal::Number(n), Value::Number(v)) => match (n.parse::<f64>(), v.as_f64()) {
            (Ok(a), Some(b)) => a == b,
            _ => false,
        },
        (literal, value) => scalar_text(value).as_deref() == Some(literal.text()),
    }
}

/// 执行计划
///
/// `records` 需包含 `plan.join` 中每个类别的记录，按存储顺序排列。
pub fn execute(
    plan: &SearchPlan,
    records: &HashMap<Category, Vec<Record>>,
    references: &[Reference],
) -> Result<SearchResultSet, QueryParseError> {
    let condition = Condition::compile(&plan.expression)?;
    let empty = Vec::new();
    let table = |category: Category| records.get(&category).unwrap_or(&empty);

    let Some((&first, rest)) = plan.join.split_first() else {
        return Ok(SearchResultSet::default());
    };

    // 每行保存各类别记录在其表中的下标
    let mut joined = vec![first];
    let mut rows: Vec<Vec<usize>> = (0..table(first).len()).map(|i| vec![i]).collect();
    let mut pending: Vec<Category> = rest.to_vec();

    while !pending.is_empty() {
        let next = pending
            .iter()
            .position(|c| references.iter().any(|r| joined.iter().any(|j| r.connects(*c, *j))))
            .unwrap_or(0);
        let category = pending.remove(next);
        let right = table(category);

        let links: Vec<(usize, &Reference)> = joined
            .iter()
            .enumerate()
            .flat_map(|(slot, j)| {
                references
                    .iter()
                    .filter(move |r| r.connects(category, *j))
                    .map(move |r| (slot, r))
            })
            .collect();

        rows = match links.split_first() {
            None => {
                warn!(
                    "No reference connects {} to {:?}; using cross join",
                    category, joined
                );
                rows.into_iter()
                    .flat_map(|row| {
                        (0..right.len()).map(move |i| {
                            let mut row = row.clone();
                            row.push(i);
                            row
                        })
                    })
                    .collect()
            }
            Some((&(slot, primary), others)) => {
                let left_category = joined[slot];
                let index = build_index(right, join_side(primary, category));
                let mut out = Vec::new();
                for row in rows {
                    let left = &table(left_category)[row[slot]];
                    let mut matches: BTreeSet<usize> = BTreeSet::new();
                    for key in join_keys(left, join_side(primary, left_category)) {
                        if let Some(found) = index.get(&key) {
                            matches.extend(found.iter().copied());
                        }
                    }
                    for i in matches {
                        let candidate = &right[i];
                        let consistent = others.iter().all(|&(other_slot, reference)| {
                            let other = &table(joined[other_slot])[row[other_slot]];
                            linked(other, joined[other_slot], candidate, category, reference)
                        });
                        if consistent {
                            let mut extended = row.clone();
                            extended.push(i);
                            out.push(extended);
                        }
                    }
                }
                out
            }
        };
        joined.push(category);
    }
    debug!("Joined {} rows across {:?}", rows.len(), joined);

    let projected: Vec<usize> = plan
        .projection
        .iter()
        .filter_map(|c| joined.iter().position(|j| j == c))
        .collect();

    let mut seen: HashSet<Vec<&str>> = HashSet::new();
    let mut result = SearchResultSet::default();
    for row in rows {
        let view: BTreeMap<Category, &Record> = joined
            .iter()
            .zip(&row)
            .map(|(c, &i)| (*c, &table(*c)[i]))
            .collect();
        if !condition.evaluate(&view) {
            continue;
        }

        let identity: Vec<&str> = projected
            .iter()
            .map(|&slot| table(joined[slot])[row[slot]].id.as_str())
            .collect();
        if !seen.insert(identity) {
            continue;
        }

        let records = projected
            .iter()
            .map(|&slot| (joined[slot], table(joined[slot])[row[slot]].clone()))
            .collect();
        result.rows.push(SearchRow { records });
        if plan.limit > 0 && result.rows.len() >= plan.limit {
            break;
        }
    }
    Ok(result)
}

/// 引用中属于 `category` 一侧的属性步骤
fn join_side(reference: &Reference, category: Category) -> Vec<content::PathStep> {
    if reference.from_category == category {
        reference.from_attribute.steps()
    } else {
        reference.to_attribute.steps()
    }
}

fn join_keys(record: &Record, steps: Vec<content::PathStep>) -> Vec<String> {
    content::texts(&record.values_at(&steps))
}

fn build_index(records: &[Record], steps: Vec<content::PathStep>) -> HashMap<String, Vec<usize>> {
    let mut index: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, record) in records.iter().enumerate() {
        for key in join_keys(record, steps.clone()) {
            index.entry(key).or_default().push(i);
        }
    }
    index
}

fn linked(
    a: &Record,
    a_category: Category,
    b: &Record,
    b_category: Category,
    reference: &Reference,
) -> bool {
    let a_keys: HashSet<String> = join_keys(a, join_side(reference, a_category))
        .into_iter()
        .collect();
    join_keys(b, join_side(reference, b_category))
        .iter()
        .any(|k| a_keys.contains(k))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parser::parse;
    use serde_json::json;

    fn records(category: Category, docs: Vec<Value>) -> Vec<Record> {
        docs.into_iter()
            .enumerate()
            .map(|(i, doc)| Record::new(format!("{}:{}", category, i), category, i as u64, doc))
            .collect()
    }

    fn reference(from: Category, from_attr: &str, to: Category, to_attr: &str) -> Reference {
        Reference {
            from_category: from,
            from_attribute: from_attr.parse().unwrap(),
            to_category: to,
            to_attribute: to_attr.parse().unwrap(),
        }
    }

    fn matcher(query: &str) -> Matcher {
        match Condition::compile(&parse(query).unwrap()).unwrap() {
            Condition::Leaf(m) => m,
            other => panic!("expected a single predicate, got {:?}", other),
        }
    }

    #[test]
    fn test_contains_follows_jsonb_semantics() {
        let doc = json!({
            "biomaterial_type": "primary cell",
            "aliases": ["a", "b"],
            "sample_type": {"term_value": "x"}
        });
        assert!(matcher("samples.content->'biomaterial_type' ? 'primary cell'").matches(&doc));
        assert!(!matcher("samples.content->'biomaterial_type' ? 'primary'").matches(&doc));
        assert!(matcher("samples.content->'aliases' ? 'b'").matches(&doc));
        assert!(matcher("samples.content->'sample_type' ? 'term_value'").matches(&doc));
        assert!(!matcher("samples.content->'missing' ? 'x'").matches(&doc));
    }

    #[test]
    fn test_navigation_flattens_arrays() {
        let doc = json!({"contacts": [{"name": "ann"}, {"name": "bob"}]});
        assert!(matcher("studies.content->'contacts'->'name' = 'bob'").matches(&doc));
        assert!(matcher("studies.content->'contacts'->0->>'name' = 'ann'").matches(&doc));
        assert!(!matcher("studies.content->'contacts'->0->>'name' = 'bob'").matches(&doc));
    }

    #[test]
    fn test_equality_in_and_not_equal() {
        let doc = json!({"age": 30, "sex": "female", "tags": ["x", "y"]});
        assert!(matcher("samples.content->'age' = 30.0").matches(&doc));
        assert!(matcher("samples.content->'age' = '30'").matches(&doc));
        assert!(matcher("samples.content->'sex' IN ('male', 'female')").matches(&doc));
        assert!(matcher("samples.content->'sex' != 'male'").matches(&doc));
        assert!(!matcher("samples.content->'tags' <> 'x'").matches(&doc));
        assert!(!matcher("samples.content->'missing' != 'male'").matches(&doc));
    }

    #[test]
    fn test_like_and_ilike() {
        let doc = json!({"label": "H1-hESC rep_1"});
        assert!(matcher("samples.content->'label' LIKE 'H1%'").matches(&doc));
        assert!(!matcher("samples.content->'label' LIKE 'h1%'").matches(&doc));
        assert!(matcher("samples.content->'label' ILIKE 'h1%'").matches(&doc));
        assert!(matcher("samples.content->'label' LIKE '%rep_1'").matches(&doc));
        assert!(!matcher("samples.content->'label' LIKE 'H1.%'").matches(&doc));
    }

    fn fixture() -> (HashMap<Category, Vec<Record>>, Vec<Reference>) {
        let mut tables = HashMap::new();
        tables.insert(
            Category::Tracks,
            records(
                Category::Tracks,
                vec![
                    json!({"label": "t1", "experiment_ref": "e1"}),
                    json!({"label": "t2", "experiment_ref": "e2"}),
                    json!({"label": "t3", "experiment_ref": "e1"}),
                ],
            ),
        );
        tables.insert(
            Category::Experiments,
            records(
                Category::Experiments,
                vec![
                    json!({"local_id": "e1", "sample_ref": "s1"}),
                    json!({"local_id": "e2", "sample_ref": "s2"}),
                ],
            ),
        );
        tables.insert(
            Category::Samples,
            records(
                Category::Samples,
                vec![
                    json!({"local_id": "s1", "biomaterial_type": "primary cell"}),
                    json!({"local_id": "s2", "biomaterial_type": "cell line"}),
                ],
            ),
        );
        let references = vec![
            reference(Category::Tracks, "experiment_ref", Category::Experiments, "local_id"),
            reference(Category::Experiments, "sample_ref", Category::Samples, "local_id"),
        ];
        (tables, references)
    }

    #[test]
    fn test_join_follows_references() {
        let (tables, references) = fixture();
        let expr = parse("samples.content->'biomaterial_type' ? 'primary cell'").unwrap();
        let plan = SearchPlan::new(expr, &[], &references, 0);
        assert_eq!(
            plan.join,
            vec![Category::Tracks, Category::Experiments, Category::Samples]
        );

        let result = execute(&plan, &tables, &references).unwrap();
        let labels: Vec<_> = result
            .rows
            .iter()
            .map(|row| row.get(Category::Tracks).unwrap().content["label"].clone())
            .collect();
        assert_eq!(labels, vec![json!("t1"), json!("t3")]);
        assert!(result.rows.iter().all(|row| row.records.len() == 3));
    }

    #[test]
    fn test_projection_deduplicates_and_limits() {
        let (tables, references) = fixture();
        let expr = parse("samples.content->'biomaterial_type' ? 'primary cell'").unwrap();

        let plan = SearchPlan::new(expr.clone(), &[Category::Samples], &references, 0);
        let result = execute(&plan, &tables, &references).unwrap();
        assert_eq!(result.len(), 1);

        let plan = SearchPlan::new(expr, &[Category::Tracks], &references, 1);
        let result = execute(&plan, &tables, &references).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.record_ids(Category::Tracks), HashSet::from(["tracks:0"]));
    }

    #[test]
    fn test_unconnected_categories_cross_join() {
        let (tables, _) = fixture();
        let expr = parse("samples.content->'local_id' = 's2'").unwrap();
        let plan = SearchPlan::new(expr, &[Category::Tracks, Category::Samples], &[], 0);
        let result = execute(&plan, &tables, &[]).unwrap();
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn test_json_rows_are_keyed_by_category() {
        let (tables, references) = fixture();
        let expr = parse("samples.content->'local_id' = 's2'").unwrap();
        let plan = SearchPlan::new(expr, &[Category::Samples], &references, 0);
        let result = execute(&plan, &tables, &references).unwrap();
        assert_eq!(
            result.to_json(),
            json!([{"samples": {"local_id": "s2", "biomaterial_type": "cell line"}}])
        );
    }
}
