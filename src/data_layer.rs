//! The connection collaborator the engine runs its statements through.

pub mod mysql;

use futures::future::BoxFuture;

use crate::value::Value;

/// A SQL statement with positional `?` placeholders and the values bound to them, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    sql: String,
    binds: Vec<Value>,
}

impl Statement {
    pub fn prepare(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            binds: vec![],
        }
    }

    /// Bind the next positional parameter.
    #[must_use]
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.binds.push(value.into());
        self
    }

    pub fn push_bind(&mut self, value: impl Into<Value>) {
        self.binds.push(value.into());
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn binds(&self) -> &[Value] {
        &self.binds
    }
}

/// A single result row, holding its values in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    #[must_use]
    pub const fn new() -> Self {
        Self { columns: vec![] }
    }

    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(column, value);
        self
    }

    pub fn push(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.columns.push((column.into(), value.into()));
    }

    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find_map(|(name, value)| name.eq(column).then_some(value))
    }

    /// Remove the value of `column` from the row.
    pub fn take(&mut self, column: &str) -> Option<Value> {
        let index = self.columns.iter().position(|(name, _)| name.eq(column))?;
        Some(self.columns.swap_remove(index).1)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (S, Value)>>(iter: I) -> Self {
        Self {
            columns: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
        }
    }
}

/// Outcome of a statement that does not return rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Executed {
    pub rows_affected: u64,
    /// The key generated by an `INSERT`, if the table has one.
    pub last_insert_id: Option<Value>,
}

/// Executes statements on behalf of the engine and reports the database (schema) name used to
/// scope catalog lookups.
///
/// Transactions are never opened by the engine itself; callers wanting several writes to be
/// atomic wrap them in [`begin`](DataLayer::begin) and [`commit`](DataLayer::commit) on the
/// same data layer.
pub trait DataLayer: Send {
    fn database_name(&self) -> &str;

    fn fetch_all<'a>(
        &'a mut self,
        statement: &'a Statement,
    ) -> BoxFuture<'a, Result<Vec<Row>, sqlx::Error>>;

    fn execute<'a>(
        &'a mut self,
        statement: &'a Statement,
    ) -> BoxFuture<'a, Result<Executed, sqlx::Error>>;

    fn begin(&mut self) -> BoxFuture<'_, Result<(), sqlx::Error>>;

    fn commit(&mut self) -> BoxFuture<'_, Result<(), sqlx::Error>>;

    fn rollback(&mut self) -> BoxFuture<'_, Result<(), sqlx::Error>>;
}
