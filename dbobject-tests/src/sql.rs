//! Parses the statements the engine generates, with their binds substituted.

use std::slice::Iter;

use dbobject::Value;
use sqlparser::{
    ast::{
        self, Assignment, AssignmentTarget, BinaryOperator, Expr, LimitClause, ObjectName,
        ObjectNamePart, Query, SelectItem, SetExpr, Statement, TableFactor, TableObject,
        TableWithJoins,
    },
    dialect::MySqlDialect,
    parser::{Parser, ParserError},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SqlError {
    #[error(transparent)]
    Parser(#[from] ParserError),

    #[error("expected exactly one statement, found {0}")]
    StatementCount(usize),

    #[error("not enough values bound to placeholders")]
    MissingBind,

    #[error("{0} values bound but never used")]
    UnusedBinds(usize),

    #[error("unsupported {0}")]
    Unsupported(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Equals(String, Value),
    IsNull(String),
    IsNotNull(String),
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Select {
        table: String,
        columns: Vec<String>,
        filter: Option<Condition>,
        limit: Option<u64>,
    },
    Insert {
        table: String,
        assignments: Vec<(String, Value)>,
    },
    Update {
        table: String,
        assignments: Vec<(String, Value)>,
        filter: Option<Condition>,
    },
}

fn unsupported<T>(what: impl std::fmt::Display) -> Result<T, SqlError> {
    Err(SqlError::Unsupported(what.to_string()))
}

/// Parse `sql`, substituting `binds` for its `?` placeholders in order.
///
/// # Errors
///
/// If the statement is not a `SELECT`, `INSERT` or `UPDATE` of the supported shape, or the
/// number of binds does not match the placeholders.
pub fn parse(sql: &str, binds: &[Value]) -> Result<Command, SqlError> {
    let mut statements = Parser::parse_sql(&MySqlDialect {}, sql)?;

    if statements.len() != 1 {
        return Err(SqlError::StatementCount(statements.len()));
    }

    let mut binds = binds.iter();
    let command = match statements.remove(0) {
        Statement::Query(query) => select(&query, &mut binds)?,
        Statement::Insert(insert) => insert_into(&insert, &mut binds)?,
        Statement::Update {
            table,
            assignments,
            selection,
            ..
        } => Command::Update {
            table: table_of(&table)?,
            assignments: assignments_of(&assignments, &mut binds)?,
            filter: selection
                .as_ref()
                .map(|e| condition(e, &mut binds))
                .transpose()?,
        },
        other => return unsupported(format!("statement: {other}")),
    };

    match binds.len() {
        0 => Ok(command),
        n => Err(SqlError::UnusedBinds(n)),
    }
}

fn name_of(name: &ObjectName) -> Result<String, SqlError> {
    match name.0.last() {
        Some(ObjectNamePart::Identifier(ident)) => Ok(ident.value.clone()),
        None => unsupported("empty name"),
    }
}

fn table_of(table: &TableWithJoins) -> Result<String, SqlError> {
    if !table.joins.is_empty() {
        return unsupported(format!("join: {table}"));
    }

    match &table.relation {
        TableFactor::Table { name, .. } => name_of(name),
        other => unsupported(format!("table: {other}")),
    }
}

fn column_of(expr: &Expr) -> Result<String, SqlError> {
    match expr {
        Expr::Identifier(ident) => Ok(ident.value.clone()),
        Expr::CompoundIdentifier(idents) => match idents.last() {
            Some(ident) => Ok(ident.value.clone()),
            None => unsupported("empty identifier"),
        },
        other => unsupported(format!("column: {other}")),
    }
}

fn select(query: &Query, binds: &mut Iter<'_, Value>) -> Result<Command, SqlError> {
    let SetExpr::Select(select) = query.body.as_ref() else {
        return unsupported(format!("query: {query}"));
    };

    let [table] = select.from.as_slice() else {
        return unsupported(format!("query: {query}"));
    };

    let columns = select
        .projection
        .iter()
        .map(|e| match e {
            SelectItem::UnnamedExpr(expr) => column_of(expr),
            other => unsupported(format!("projection: {other}")),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let filter = select
        .selection
        .as_ref()
        .map(|e| condition(e, binds))
        .transpose()?;

    let limit = match &query.limit_clause {
        None => None,
        Some(LimitClause::LimitOffset {
            limit: Some(limit),
            offset: None,
            ..
        }) => Some(row_count(limit)?),
        Some(other) => return unsupported(format!("limit: {other}")),
    };

    Ok(Command::Select {
        table: table_of(table)?,
        columns,
        filter,
        limit,
    })
}

fn row_count(expr: &Expr) -> Result<u64, SqlError> {
    match expr {
        Expr::Value(value) => match &value.value {
            ast::Value::Number(n, _) => n
                .parse::<u64>()
                .map_or_else(|_| unsupported(format!("row count: {n}")), Ok),
            other => unsupported(format!("row count: {other}")),
        },
        other => unsupported(format!("row count: {other}")),
    }
}

fn insert_into(insert: &ast::Insert, binds: &mut Iter<'_, Value>) -> Result<Command, SqlError> {
    let TableObject::TableName(name) = &insert.table else {
        return unsupported(format!("table: {}", insert.table));
    };

    // `INSERT .. SET ..`, or a single row of `(columns) VALUES (values)`.
    let assignments = match &insert.source {
        None => assignments_of(&insert.assignments, binds)?,
        Some(query) => match query.body.as_ref() {
            SetExpr::Values(values) => {
                let row = match values.rows.as_slice() {
                    [] => &[][..],
                    [row] => row.as_slice(),
                    _ => return unsupported(format!("values: {values}")),
                };

                if row.len() != insert.columns.len() {
                    return unsupported(format!("values: {values}"));
                }

                insert
                    .columns
                    .iter()
                    .zip(row)
                    .map(|(column, expr)| Ok((column.value.clone(), operand(expr, binds)?)))
                    .collect::<Result<Vec<_>, SqlError>>()?
            }
            _ => return unsupported(format!("insert source: {query}")),
        },
    };

    Ok(Command::Insert {
        table: name_of(name)?,
        assignments,
    })
}

fn assignments_of(
    assignments: &[Assignment],
    binds: &mut Iter<'_, Value>,
) -> Result<Vec<(String, Value)>, SqlError> {
    assignments
        .iter()
        .map(|e| match &e.target {
            AssignmentTarget::ColumnName(name) => Ok((name_of(name)?, operand(&e.value, binds)?)),
            AssignmentTarget::Tuple(_) => unsupported(format!("assignment: {e}")),
        })
        .collect()
}

fn condition(expr: &Expr, binds: &mut Iter<'_, Value>) -> Result<Condition, SqlError> {
    match expr {
        Expr::Nested(inner) => condition(inner, binds),
        Expr::IsNull(column) => Ok(Condition::IsNull(column_of(column)?)),
        Expr::IsNotNull(column) => Ok(Condition::IsNotNull(column_of(column)?)),
        Expr::BinaryOp { left, op, right } => match op {
            BinaryOperator::And => Ok(Condition::And(
                Box::new(condition(left, binds)?),
                Box::new(condition(right, binds)?),
            )),
            BinaryOperator::Or => Ok(Condition::Or(
                Box::new(condition(left, binds)?),
                Box::new(condition(right, binds)?),
            )),
            BinaryOperator::Eq => Ok(Condition::Equals(column_of(left)?, operand(right, binds)?)),
            _ => unsupported(format!("condition: {expr}")),
        },
        other => unsupported(format!("condition: {other}")),
    }
}

fn operand(expr: &Expr, binds: &mut Iter<'_, Value>) -> Result<Value, SqlError> {
    let Expr::Value(value) = expr else {
        return unsupported(format!("value: {expr}"));
    };

    match &value.value {
        ast::Value::Placeholder(p) if p == "?" => binds.next().cloned().ok_or(SqlError::MissingBind),
        ast::Value::Null => Ok(Value::Null),
        ast::Value::Boolean(b) => Ok(Value::Boolean(*b)),
        ast::Value::Number(n, _) => Ok(n
            .parse::<i64>()
            .map(Value::Integer)
            .or_else(|_| n.parse::<f64>().map(Value::Float))
            .unwrap_or_else(|_| Value::Text(n.clone()))),
        ast::Value::SingleQuotedString(s) | ast::Value::DoubleQuotedString(s) => {
            Ok(Value::Text(s.clone()))
        }
        other => unsupported(format!("value: {other}")),
    }
}

/// Evaluate `condition` against a row, given a lookup of its column values.
///
/// Comparisons follow SQL: `NULL` equals nothing.
pub fn matches<'a>(condition: &Condition, lookup: &impl Fn(&str) -> Option<&'a Value>) -> bool {
    match condition {
        Condition::Equals(column, value) => {
            lookup(column).is_some_and(|current| sql_equals(current, value))
        }
        Condition::IsNull(column) => lookup(column).is_none_or(Value::is_null),
        Condition::IsNotNull(column) => lookup(column).is_some_and(|e| !e.is_null()),
        Condition::And(a, b) => matches(a, lookup) && matches(b, lookup),
        Condition::Or(a, b) => matches(a, lookup) || matches(b, lookup),
    }
}

#[allow(clippy::cast_precision_loss)]
fn sql_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Integer(x), Value::Float(y)) | (Value::Float(y), Value::Integer(x)) => {
            (*x as f64 - y).abs() < f64::EPSILON
        }
        (Value::Boolean(x), Value::Integer(y)) | (Value::Integer(y), Value::Boolean(x)) => {
            i64::from(*x) == *y
        }
        (Value::Text(x), Value::Bytes(y)) | (Value::Bytes(y), Value::Text(x)) => {
            x.as_bytes() == y.as_slice()
        }
        (a, b) => a == b,
    }
}

#[cfg(test)]
mod test {
    use dbobject::Value;

    use super::{Command, Condition, parse};

    #[test]
    fn test_parse_select() {
        let command = parse(
            "SELECT `id`, `name` FROM `person` WHERE `a` = ? AND ( `b` = ? OR `c` IS NULL ) LIMIT 3",
            &[Value::Integer(1), Value::from("x")],
        )
        .expect("Failed to parse select");

        assert_eq!(
            command,
            Command::Select {
                table: "person".to_string(),
                columns: vec!["id".to_string(), "name".to_string()],
                filter: Some(Condition::And(
                    Box::new(Condition::Equals("a".to_string(), Value::Integer(1))),
                    Box::new(Condition::Or(
                        Box::new(Condition::Equals("b".to_string(), Value::from("x"))),
                        Box::new(Condition::IsNull("c".to_string())),
                    )),
                )),
                limit: Some(3),
            }
        );
    }

    #[test]
    fn test_parse_insert_defaults() {
        let command =
            parse("INSERT INTO `counter` () VALUES ()", &[]).expect("Failed to parse insert");

        assert_eq!(
            command,
            Command::Insert {
                table: "counter".to_string(),
                assignments: vec![],
            }
        );
    }

    #[test]
    fn test_parse_writes() {
        let insert = parse(
            "INSERT INTO `person` SET `name` = ?, `email` = NULL",
            &[Value::from("Ursula")],
        )
        .expect("Failed to parse insert");

        assert_eq!(
            insert,
            Command::Insert {
                table: "person".to_string(),
                assignments: vec![
                    ("name".to_string(), Value::from("Ursula")),
                    ("email".to_string(), Value::Null),
                ],
            }
        );

        let update = parse(
            "UPDATE `person` SET `name` = ? WHERE `id` = ?",
            &[Value::from("Terry"), Value::Integer(2)],
        )
        .expect("Failed to parse update");

        assert_eq!(
            update,
            Command::Update {
                table: "person".to_string(),
                assignments: vec![("name".to_string(), Value::from("Terry"))],
                filter: Some(Condition::Equals("id".to_string(), Value::Integer(2))),
            }
        );
    }

    #[test]
    fn test_unsupported_statements_are_rejected() {
        assert!(parse("DELETE FROM `person`", &[]).is_err());
        assert!(parse("SELECT `a` FROM `t` WHERE `a` > ?", &[Value::Integer(1)]).is_err());
    }

    #[test]
    fn test_bind_count_must_match() {
        assert!(parse("UPDATE `t` SET `a` = ? WHERE `id` = ?", &[Value::Integer(1)]).is_err());
        assert!(parse("SELECT `a` FROM `t`", &[Value::Integer(1)]).is_err());
    }
}
