pub mod criteria;
pub mod select;
pub mod write;

use std::fmt::Display;

use crate::{data_layer::Statement, value::Value};

/// Accumulates SQL text and the values bound to its `?` placeholders.
#[derive(Debug, Default)]
pub struct StatementBuilder {
    sql: String,
    binds: Vec<Value>,
}

impl StatementBuilder {
    pub fn new(init: impl Into<String>) -> Self {
        Self {
            sql: init.into(),
            binds: vec![],
        }
    }

    pub fn push(&mut self, sql: impl Display) -> &mut Self {
        use std::fmt::Write;

        // Writing into a `String` cannot fail.
        let _ = write!(self.sql, "{sql}");
        self
    }

    /// Push a `?` placeholder and bind `value` to it.
    pub fn push_bind(&mut self, value: Value) -> &mut Self {
        self.sql.push('?');
        self.binds.push(value);
        self
    }

    /// Push SQL that already contains its placeholders, along with their values.
    pub fn push_fragment(&mut self, sql: &str, binds: &[Value]) -> &mut Self {
        self.sql.push_str(sql);
        self.binds.extend_from_slice(binds);
        self
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn binds(&self) -> &[Value] {
        &self.binds
    }

    #[must_use]
    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.sql, self.binds)
    }

    #[must_use]
    pub fn into_statement(self) -> Statement {
        self.binds
            .into_iter()
            .fold(Statement::prepare(self.sql), |statement, value| {
                statement.bind(value)
            })
    }
}

/// This trait represents anything that can be pushed into a [`StatementBuilder`], i.e. any kind
/// of query fragment, like a condition or a list of values.
pub trait PushToQuery {
    /// Push the object's contents into a statement builder.
    fn push_to(&self, builder: &mut StatementBuilder);

    /// Render the fragment on its own.
    fn to_statement(&self) -> Statement {
        let mut builder = StatementBuilder::default();
        self.push_to(&mut builder);
        builder.into_statement()
    }
}

impl PushToQuery for Box<dyn PushToQuery + '_> {
    fn push_to(&self, builder: &mut StatementBuilder) {
        self.as_ref().push_to(builder);
    }
}

impl PushToQuery for String {
    fn push_to(&self, builder: &mut StatementBuilder) {
        builder.push(self);
    }
}

/// Quote an identifier with backticks.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// A backtick-quoted column or table name.
pub struct ColumnName<'a>(pub &'a str);

impl Display for ColumnName<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&quote_identifier(self.0))
    }
}

impl PushToQuery for ColumnName<'_> {
    fn push_to(&self, builder: &mut StatementBuilder) {
        builder.push(self);
    }
}

/// A value bound to a `?` placeholder.
pub(crate) struct QueryVariable(pub(crate) Value);

impl PushToQuery for QueryVariable {
    fn push_to(&self, builder: &mut StatementBuilder) {
        builder.push_bind(self.0.clone());
    }
}

/// A bare `?` placeholder whose value is bound when the template is executed.
pub(crate) struct Placeholder;

impl PushToQuery for Placeholder {
    fn push_to(&self, builder: &mut StatementBuilder) {
        builder.push("?");
    }
}

pub(crate) struct BracketsExpr<T: PushToQuery>(T);

impl<T: PushToQuery> BracketsExpr<T> {
    pub(crate) const fn new(inner: T) -> Self {
        Self(inner)
    }
}

impl<T: PushToQuery> PushToQuery for BracketsExpr<T> {
    fn push_to(&self, builder: &mut StatementBuilder) {
        builder.push("( ");
        self.0.push_to(builder);
        builder.push(" )");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryExprOperand {
    Equals,
    And,
    Or,
}

impl Display for BinaryExprOperand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Equals => "=",
                Self::And => "AND",
                Self::Or => "OR",
            }
        )
    }
}

/// A binary SQL expression, glued together with an operator.
///
/// Example: `left-side [operator] right-side`
pub(crate) struct BinaryExpr<T, C>
where
    T: PushToQuery,
    C: PushToQuery,
{
    a: T,
    b: C,
    operand: BinaryExprOperand,
}

impl<T, C> BinaryExpr<T, C>
where
    T: PushToQuery,
    C: PushToQuery,
{
    pub(crate) const fn new(left: T, right: C, operand: BinaryExprOperand) -> Self {
        Self {
            a: left,
            b: right,
            operand,
        }
    }
}

impl<T, C> PushToQuery for BinaryExpr<T, C>
where
    T: PushToQuery,
    C: PushToQuery,
{
    fn push_to(&self, builder: &mut StatementBuilder) {
        self.a.push_to(builder);
        builder.push(format_args!(" {} ", self.operand));
        self.b.push_to(builder);
    }
}

/// Any number of fragments joined by the same operator, e.g. `a AND b AND c`.
pub(crate) struct ChainExpr<T: PushToQuery> {
    items: Vec<T>,
    operand: BinaryExprOperand,
}

impl<T: PushToQuery> ChainExpr<T> {
    pub(crate) const fn new(items: Vec<T>, operand: BinaryExprOperand) -> Self {
        Self { items, operand }
    }
}

impl<T: PushToQuery> PushToQuery for ChainExpr<T> {
    fn push_to(&self, builder: &mut StatementBuilder) {
        self.items.iter().enumerate().for_each(|(i, e)| {
            if i > 0 {
                builder.push(format_args!(" {} ", self.operand));
            }
            e.push_to(builder);
        });
    }
}

pub(crate) enum SingletonExprOperand {
    IsNull,
    IsNotNull,
}

impl Display for SingletonExprOperand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::IsNull => "IS NULL",
                Self::IsNotNull => "IS NOT NULL",
            }
        )
    }
}

pub(crate) struct SingletonExpr<T>
where
    T: PushToQuery,
{
    inner: T,
    operand: SingletonExprOperand,
}

impl<T> SingletonExpr<T>
where
    T: PushToQuery,
{
    pub(crate) const fn new(inner: T, operand: SingletonExprOperand) -> Self {
        Self { inner, operand }
    }
}

impl<T> PushToQuery for SingletonExpr<T>
where
    T: PushToQuery,
{
    fn push_to(&self, builder: &mut StatementBuilder) {
        self.inner.push_to(builder);
        builder.push(format_args!(" {}", self.operand));
    }
}
