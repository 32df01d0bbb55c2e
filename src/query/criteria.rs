//! Criteria trees and their compilation into parameterized `WHERE` clauses.
//!
//! Criteria can be written as a typed [`CriteriaNode`] tree, or as an ordered keyword list
//! ([`Criteria`]) where keys beginning with `@` are keywords:
//!
//! - `@or` CRITERIA - match the nested criteria using `OR`, e.g. `( foo = ? OR bar = ? )`
//! - `@and` CRITERIA - match the nested criteria using `AND`
//! - `@limit` INTEGER - append a `LIMIT` clause
//!
//! Values are matched with `=`, except `NULL` and the strings `"@null"` and `"@not_null"`, which
//! compile to `IS NULL` and `IS NOT NULL`.

use std::fmt::Display;

use crate::{
    error::{Error, Result},
    query::{
        BinaryExpr, BinaryExprOperand, BracketsExpr, ChainExpr, ColumnName, PushToQuery,
        QueryVariable, SingletonExpr, SingletonExprOperand, StatementBuilder,
    },
    value::Value,
};

pub const NULL_SENTINEL: &str = "@null";
pub const NOT_NULL_SENTINEL: &str = "@not_null";

/// The operator joining the children of a [`CriteriaNode::Group`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Glue {
    #[default]
    And,
    Or,
}

impl From<Glue> for BinaryExprOperand {
    fn from(value: Glue) -> Self {
        match value {
            Glue::And => Self::And,
            Glue::Or => Self::Or,
        }
    }
}

impl Display for Glue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        BinaryExprOperand::from(*self).fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CriteriaNode {
    Equals(String, Value),
    IsNull(String),
    IsNotNull(String),
    Group(Glue, Vec<CriteriaNode>),
    Limit(u64),
}

impl CriteriaNode {
    pub fn equals(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Equals(column.into(), value.into())
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Self::IsNull(column.into())
    }

    pub fn is_not_null(column: impl Into<String>) -> Self {
        Self::IsNotNull(column.into())
    }

    #[must_use]
    pub const fn and(children: Vec<Self>) -> Self {
        Self::Group(Glue::And, children)
    }

    #[must_use]
    pub const fn or(children: Vec<Self>) -> Self {
        Self::Group(Glue::Or, children)
    }

    #[must_use]
    pub const fn limit(n: u64) -> Self {
        Self::Limit(n)
    }
}

/// A value in a [`Criteria`] list: either a value to match, or nested criteria for `@and` /
/// `@or`.
#[derive(Debug, Clone, PartialEq)]
pub enum CriteriaValue {
    Value(Value),
    Nested(Criteria),
}

impl<T: Into<Value>> From<T> for CriteriaValue {
    fn from(value: T) -> Self {
        Self::Value(value.into())
    }
}

impl From<Criteria> for CriteriaValue {
    fn from(value: Criteria) -> Self {
        Self::Nested(value)
    }
}

/// An ordered list of `(key, value)` criteria. Keys may repeat.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria {
    entries: Vec<(String, CriteriaValue)>,
}

impl Criteria {
    #[must_use]
    pub const fn new() -> Self {
        Self { entries: vec![] }
    }

    /// Append an entry. Use a `@` keyword as `key` to refine the query.
    #[must_use]
    pub fn add(mut self, key: impl Into<String>, value: impl Into<CriteriaValue>) -> Self {
        self.push(key, value);
        self
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<CriteriaValue>) {
        self.entries.push((key.into(), value.into()));
    }

    #[must_use]
    pub fn or(self, nested: Self) -> Self {
        self.add("@or", nested)
    }

    #[must_use]
    pub fn and(self, nested: Self) -> Self {
        self.add("@and", nested)
    }

    #[must_use]
    pub fn limit(self, n: impl Into<Value>) -> Self {
        self.add("@limit", n.into())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &CriteriaValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Convert into a criteria tree, glued with `AND` at the top level.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownCriteriaKeyword`] for unrecognized `@` keys, [`Error::InvalidLimit`] if
    /// `@limit` is not given a non-negative integer, [`Error::InvalidCriteria`] if `@and` / `@or`
    /// is not given nested criteria or a column is.
    pub fn to_tree(&self) -> Result<CriteriaNode> {
        self.to_group(Glue::And)
    }

    fn to_group(&self, glue: Glue) -> Result<CriteriaNode> {
        let children = self
            .entries
            .iter()
            .map(|(key, value)| match (key.strip_prefix('@'), value) {
                (Some("or"), CriteriaValue::Nested(inner)) => inner.to_group(Glue::Or),
                (Some("and"), CriteriaValue::Nested(inner)) => inner.to_group(Glue::And),
                (Some("or" | "and"), CriteriaValue::Value(value)) => Err(Error::InvalidCriteria(
                    format!("{key} expects nested criteria, got {}", value.type_name()),
                )),
                (Some("limit"), CriteriaValue::Value(Value::Integer(n))) => u64::try_from(*n)
                    .map(CriteriaNode::Limit)
                    .map_err(|_| Error::InvalidLimit(n.to_string())),
                (Some("limit"), CriteriaValue::Value(value)) => {
                    Err(Error::InvalidLimit(value.type_name().to_string()))
                }
                (Some("limit"), CriteriaValue::Nested(_)) => {
                    Err(Error::InvalidLimit("nested criteria".to_string()))
                }
                (Some(_), _) => Err(Error::UnknownCriteriaKeyword(key.clone())),
                (None, CriteriaValue::Value(value)) => {
                    Ok(CriteriaNode::Equals(key.clone(), value.clone()))
                }
                (None, CriteriaValue::Nested(_)) => Err(Error::InvalidCriteria(format!(
                    "column `{key}` cannot be matched against nested criteria"
                ))),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(CriteriaNode::Group(glue, children))
    }

    /// Shorthand for converting to a tree and compiling it.
    ///
    /// # Errors
    ///
    /// See [`Criteria::to_tree`] and [`compile`].
    pub fn compile(&self) -> Result<CompiledCriteria> {
        compile(&self.to_tree()?)
    }
}

/// A compiled `WHERE` clause (without the keyword), its bind values in placeholder order, and
/// the row limit requested anywhere in the tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledCriteria {
    pub sql: String,
    pub binds: Vec<Value>,
    pub limit: Option<u64>,
}

impl CompiledCriteria {
    /// Whether the criteria produced no clauses, in which case no `WHERE` is emitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }
}

impl PushToQuery for CompiledCriteria {
    fn push_to(&self, builder: &mut StatementBuilder) {
        builder.push_fragment(&self.sql, &self.binds);
    }
}

/// Compile a criteria tree. A top-level [`CriteriaNode::Group`] is not wrapped in brackets;
/// nested groups are.
///
/// # Errors
///
/// [`Error::DuplicateLimit`] if the tree holds more than one [`CriteriaNode::Limit`].
pub fn compile(tree: &CriteriaNode) -> Result<CompiledCriteria> {
    let mut limit = None;

    let expr = match tree {
        CriteriaNode::Group(glue, children) => compile_group(children, *glue, &mut limit)?,
        other => compile_node(other, &mut limit)?,
    };

    let mut builder = StatementBuilder::default();
    if let Some(expr) = expr {
        expr.push_to(&mut builder);
    }

    let (sql, binds) = builder.into_parts();

    Ok(CompiledCriteria { sql, binds, limit })
}

type Fragment = Box<dyn PushToQuery>;

fn compile_group(
    children: &[CriteriaNode],
    glue: Glue,
    limit: &mut Option<u64>,
) -> Result<Option<Fragment>> {
    let mut fragments = vec![];

    for child in children {
        if let Some(fragment) = compile_node(child, limit)? {
            fragments.push(fragment);
        }
    }

    Ok(match fragments.len() {
        0 => None,
        1 => fragments.pop(),
        _ => Some(Box::new(ChainExpr::new(fragments, glue.into()))),
    })
}

fn compile_node(node: &CriteriaNode, limit: &mut Option<u64>) -> Result<Option<Fragment>> {
    Ok(match node {
        CriteriaNode::Equals(column, value) => Some(match value {
            Value::Null => is_null(column, SingletonExprOperand::IsNull),
            Value::Text(text) if text == NULL_SENTINEL => {
                is_null(column, SingletonExprOperand::IsNull)
            }
            Value::Text(text) if text == NOT_NULL_SENTINEL => {
                is_null(column, SingletonExprOperand::IsNotNull)
            }
            value => Box::new(BinaryExpr::new(
                ColumnName(column).to_string(),
                QueryVariable(value.clone()),
                BinaryExprOperand::Equals,
            )),
        }),
        CriteriaNode::IsNull(column) => Some(is_null(column, SingletonExprOperand::IsNull)),
        CriteriaNode::IsNotNull(column) => Some(is_null(column, SingletonExprOperand::IsNotNull)),
        CriteriaNode::Group(glue, children) => compile_group(children, *glue, limit)?
            .map(|inner| Box::new(BracketsExpr::new(inner)) as Fragment),
        CriteriaNode::Limit(n) => {
            if limit.is_some() {
                return Err(Error::DuplicateLimit);
            }
            *limit = Some(*n);
            None
        }
    })
}

fn is_null(column: &str, operand: SingletonExprOperand) -> Fragment {
    Box::new(SingletonExpr::new(ColumnName(column).to_string(), operand))
}
