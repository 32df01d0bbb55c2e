use itertools::Itertools;

use super::{
    BinaryExpr, BinaryExprOperand, ColumnName, Placeholder, PushToQuery, StatementBuilder,
    criteria::CompiledCriteria,
};

/// A `SELECT` over a single table.
pub struct Select<'a> {
    table: &'a str,
    columns: Vec<&'a str>,
    conditions: Option<Box<dyn PushToQuery + 'a>>,
    limit: Option<u64>,
}

impl<'a> Select<'a> {
    pub fn new(table: &'a str, columns: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            table,
            columns: columns.into_iter().collect(),
            conditions: None,
            limit: None,
        }
    }

    /// Restrict the selection to the row whose `key_column` equals the value bound at execution
    /// time. The `?` is left unbound, making the statement reusable as a template.
    #[must_use]
    pub fn by_key(mut self, key_column: &'a str) -> Self {
        self.conditions = Some(Box::new(BinaryExpr::new(
            ColumnName(key_column),
            Placeholder,
            BinaryExprOperand::Equals,
        )));
        self.limit = Some(1);
        self
    }

    /// Filter by compiled criteria, taking their limit as well.
    #[must_use]
    pub fn matching(mut self, criteria: &CompiledCriteria) -> Self {
        if !criteria.is_empty() {
            self.conditions = Some(Box::new(criteria.clone()));
        }
        self.limit = criteria.limit;
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: Option<u64>) -> Self {
        self.limit = limit;
        self
    }

    /// Render the statement text, for logging or template caching.
    #[must_use]
    pub fn query(&self) -> String {
        let mut builder = StatementBuilder::default();
        self.push_to(&mut builder);
        builder.into_parts().0
    }
}

impl PushToQuery for Select<'_> {
    fn push_to(&self, builder: &mut StatementBuilder) {
        builder.push("SELECT ");
        builder.push(self.columns.iter().map(|e| ColumnName(e)).join(", "));
        builder.push(" FROM ");
        builder.push(ColumnName(self.table));

        if let Some(conditions) = &self.conditions {
            builder.push(" WHERE ");
            conditions.push_to(builder);
        }

        if let Some(limit) = self.limit {
            builder.push(format_args!(" LIMIT {limit}"));
        }
    }
}
