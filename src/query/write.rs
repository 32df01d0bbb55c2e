use super::{
    BinaryExpr, BinaryExprOperand, ColumnName, PushToQuery, QueryVariable, StatementBuilder,
};
use crate::value::Value;

/// `` `a` = ?, `b` = ? ``
struct Assignments<'a>(&'a [(&'a str, Value)]);

impl PushToQuery for Assignments<'_> {
    fn push_to(&self, builder: &mut StatementBuilder) {
        self.0.iter().enumerate().for_each(|(i, (column, value))| {
            if i > 0 {
                builder.push(", ");
            }
            BinaryExpr::new(
                ColumnName(column),
                QueryVariable(value.clone()),
                BinaryExprOperand::Equals,
            )
            .push_to(builder);
        });
    }
}

/// An `INSERT INTO ... SET` statement. Without assignments, inserts a row of defaults.
pub struct Insert<'a> {
    table: &'a str,
    assignments: Vec<(&'a str, Value)>,
}

impl<'a> Insert<'a> {
    #[must_use]
    pub const fn new(table: &'a str, assignments: Vec<(&'a str, Value)>) -> Self {
        Self { table, assignments }
    }
}

impl PushToQuery for Insert<'_> {
    fn push_to(&self, builder: &mut StatementBuilder) {
        builder.push("INSERT INTO ");
        builder.push(ColumnName(self.table));

        if self.assignments.is_empty() {
            builder.push(" () VALUES ()");
        } else {
            builder.push(" SET ");
            Assignments(&self.assignments).push_to(builder);
        }
    }
}

/// An `UPDATE ... SET ... WHERE key = ?` statement for a single row.
pub struct Update<'a> {
    table: &'a str,
    assignments: Vec<(&'a str, Value)>,
    key_column: &'a str,
    key: Value,
}

impl<'a> Update<'a> {
    #[must_use]
    pub const fn new(
        table: &'a str,
        assignments: Vec<(&'a str, Value)>,
        key_column: &'a str,
        key: Value,
    ) -> Self {
        Self {
            table,
            assignments,
            key_column,
            key,
        }
    }

    /// An update without assignments has nothing to do.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.assignments.is_empty()
    }
}

impl PushToQuery for Update<'_> {
    fn push_to(&self, builder: &mut StatementBuilder) {
        builder.push("UPDATE ");
        builder.push(ColumnName(self.table));
        builder.push(" SET ");
        Assignments(&self.assignments).push_to(builder);
        builder.push(" WHERE ");
        BinaryExpr::new(
            ColumnName(self.key_column),
            QueryVariable(self.key.clone()),
            BinaryExprOperand::Equals,
        )
        .push_to(builder);
    }
}
