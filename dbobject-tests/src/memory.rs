use chrono::{NaiveDateTime, Timelike, Utc};
use dbobject::{
    Value,
    data_layer::{DataLayer, Executed, Row, Statement},
    sqlx,
};
use dbobject_sqlparse::{
    query::{ParseError, parse_tables},
    schema::{SqlColumn, SqlTable},
};
use futures::{
    FutureExt,
    future::{self, BoxFuture},
};
use tracing::debug;

use crate::sql::{self, Command, Condition};

fn protocol(message: impl Into<String>) -> sqlx::Error {
    sqlx::Error::Protocol(message.into())
}

impl From<sql::SqlError> for sqlx::Error {
    fn from(value: sql::SqlError) -> Self {
        protocol(value.to_string())
    }
}

fn now() -> NaiveDateTime {
    let now = Utc::now().naive_utc();
    now.with_nanosecond(0).unwrap_or(now)
}

#[derive(Debug, Clone)]
struct MemoryTable {
    definition: SqlTable,
    rows: Vec<Vec<Value>>,
    next_id: i64,
}

impl MemoryTable {
    fn position(&self, column: &str) -> Result<usize, sqlx::Error> {
        self.definition
            .columns
            .iter()
            .position(|e| e.name == column)
            .ok_or_else(|| sqlx::Error::ColumnNotFound(column.to_string()))
    }

    fn matching(&self, filter: Option<&Condition>) -> Vec<usize> {
        (0..self.rows.len())
            .filter(|&i| {
                filter.is_none_or(|filter| {
                    sql::matches(filter, &|column: &str| {
                        self.definition
                            .columns
                            .iter()
                            .position(|e| e.name == column)
                            .map(|position| &self.rows[i][position])
                    })
                })
            })
            .collect()
    }

    /// The value MySQL would store for `value` in `column`.
    fn coerce(column: &SqlColumn, value: Value) -> Result<Value, sqlx::Error> {
        match value {
            Value::Null if column.data_type == "timestamp" => Ok(Value::Timestamp(now())),
            Value::Null if !column.nullable => {
                Err(protocol(format!("Column '{}' cannot be null", column.name)))
            }
            Value::Boolean(v) if column.data_type == "tinyint" => Ok(Value::Integer(i64::from(v))),
            value => Ok(value),
        }
    }

    fn default_of(column: &SqlColumn) -> Value {
        match column.default.as_deref() {
            None => Value::Null,
            Some(default) if default.eq_ignore_ascii_case("NULL") => Value::Null,
            Some(default) if default.to_ascii_uppercase().starts_with("CURRENT_TIMESTAMP") => {
                Value::Timestamp(now())
            }
            Some(default) => default.parse::<i64>().map_or_else(
                |_| Value::Text(default.trim_matches('\'').to_string()),
                Value::Integer,
            ),
        }
    }

    fn insert(&mut self, assignments: Vec<(String, Value)>) -> Result<Executed, sqlx::Error> {
        let mut row = self
            .definition
            .columns
            .iter()
            .map(Self::default_of)
            .collect::<Vec<_>>();

        for (column, value) in assignments {
            let position = self.position(&column)?;
            row[position] = value;
        }

        let mut generated = None;
        let mut values = Vec::with_capacity(row.len());

        for (column, value) in self.definition.columns.iter().zip(row) {
            let value = match value {
                Value::Null if column.auto_increment => {
                    generated = Some(self.next_id);
                    Value::Integer(self.next_id)
                }
                value => Self::coerce(column, value)?,
            };
            values.push(value);
        }

        if let Some(key) = &self.definition.primary_key {
            let position = self.position(key)?;
            if self.rows.iter().any(|e| e[position] == values[position]) {
                return Err(protocol(format!(
                    "Duplicate entry '{}' for key 'PRIMARY'",
                    values[position]
                )));
            }

            if let Value::Integer(id) = values[position] {
                self.next_id = self.next_id.max(id + 1);
            }
        }

        self.rows.push(values);

        Ok(Executed {
            rows_affected: 1,
            last_insert_id: generated.map(Value::Integer),
        })
    }

    fn update(
        &mut self,
        assignments: Vec<(String, Value)>,
        filter: Option<&Condition>,
    ) -> Result<Executed, sqlx::Error> {
        let assignments = assignments
            .into_iter()
            .map(|(column, value)| {
                let position = self.position(&column)?;
                let value = Self::coerce(&self.definition.columns[position], value)?;
                Ok::<_, sqlx::Error>((position, value))
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        let matching = self.matching(filter);

        for &i in &matching {
            for (position, value) in &assignments {
                self.rows[i][*position] = value.clone();
            }
        }

        Ok(Executed {
            rows_affected: matching.len() as u64,
            last_insert_id: None,
        })
    }

    fn select(
        &self,
        columns: &[String],
        filter: Option<&Condition>,
        limit: Option<u64>,
    ) -> Result<Vec<Row>, sqlx::Error> {
        let positions = columns
            .iter()
            .map(|e| self.position(e))
            .collect::<Result<Vec<_>, _>>()?;

        let limit = limit.map_or(usize::MAX, |e| usize::try_from(e).unwrap_or(usize::MAX));

        Ok(self
            .matching(filter)
            .into_iter()
            .take(limit)
            .map(|i| {
                columns
                    .iter()
                    .zip(&positions)
                    .map(|(name, &position)| (name.as_str(), self.rows[i][position].clone()))
                    .collect()
            })
            .collect())
    }
}

/// A [`DataLayer`] keeping its tables in memory.
///
/// Tables are created from MySQL DDL. The data layer answers the catalog queries the engine
/// issues and executes the `SELECT`, `INSERT` and `UPDATE` statements it generates. Every
/// statement is recorded, and failures can be injected for statements matching a pattern.
#[derive(Debug, Clone)]
pub struct MemoryDataLayer {
    database_name: String,
    tables: Vec<MemoryTable>,
    snapshot: Option<Vec<MemoryTable>>,
    statements: Vec<Statement>,
    failures: Vec<String>,
}

impl MemoryDataLayer {
    pub fn new(database_name: impl Into<String>) -> Self {
        Self {
            database_name: database_name.into(),
            tables: vec![],
            snapshot: None,
            statements: vec![],
            failures: vec![],
        }
    }

    /// # Errors
    ///
    /// If `ddl` cannot be parsed.
    pub fn from_ddl(database_name: impl Into<String>, ddl: &str) -> Result<Self, ParseError> {
        let mut db = Self::new(database_name);
        db.create_tables(ddl)?;
        Ok(db)
    }

    /// Create the tables of every `CREATE TABLE` statement in `ddl`.
    ///
    /// # Errors
    ///
    /// If `ddl` cannot be parsed.
    pub fn create_tables(&mut self, ddl: &str) -> Result<(), ParseError> {
        self.tables
            .extend(parse_tables(ddl)?.into_iter().map(|definition| MemoryTable {
                definition,
                rows: vec![],
                next_id: 1,
            }));
        Ok(())
    }

    fn table(&self, name: &str) -> Result<&MemoryTable, sqlx::Error> {
        self.tables
            .iter()
            .find(|e| e.definition.name == name)
            .ok_or_else(|| protocol(format!("Table '{}.{name}' doesn't exist", self.database_name)))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut MemoryTable, sqlx::Error> {
        let database_name = &self.database_name;
        self.tables
            .iter_mut()
            .find(|e| e.definition.name == name)
            .ok_or_else(|| protocol(format!("Table '{database_name}.{name}' doesn't exist")))
    }

    /// Insert a row directly, bypassing the statement log.
    ///
    /// # Errors
    ///
    /// If the table or a column does not exist, or a constraint is violated.
    pub fn insert_row(&mut self, table: &str, row: Row) -> Result<Option<Value>, sqlx::Error> {
        let assignments = row
            .columns()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();

        Ok(self.table_mut(table)?.insert(assignments)?.last_insert_id)
    }

    /// Every row of `table`, with all of its columns.
    ///
    /// # Errors
    ///
    /// If the table does not exist.
    pub fn rows(&self, table: &str) -> Result<Vec<Row>, sqlx::Error> {
        let table = self.table(table)?;
        let columns = table
            .definition
            .columns
            .iter()
            .map(|e| e.name.clone())
            .collect::<Vec<_>>();

        table.select(&columns, None, None)
    }

    /// The statements executed so far, in order.
    #[must_use]
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// The SQL of the statements executed so far, excluding catalog lookups.
    #[must_use]
    pub fn executed_sql(&self) -> Vec<&str> {
        self.statements
            .iter()
            .map(Statement::sql)
            .filter(|e| !e.contains("information_schema"))
            .collect()
    }

    pub fn clear_log(&mut self) {
        self.statements.clear();
    }

    /// Make the next statement whose SQL contains `pattern` fail.
    pub fn fail_next_matching(&mut self, pattern: impl Into<String>) {
        self.failures.push(pattern.into());
    }

    fn record(&mut self, statement: &Statement) -> Result<(), sqlx::Error> {
        debug!(sql = statement.sql(), binds = statement.binds().len(), "memory statement");
        self.statements.push(statement.clone());

        if let Some(i) = self
            .failures
            .iter()
            .position(|e| statement.sql().contains(e.as_str()))
        {
            let pattern = self.failures.remove(i);
            return Err(protocol(format!("injected failure for `{pattern}`")));
        }

        Ok(())
    }

    fn catalog(&self, statement: &Statement) -> Result<Vec<Row>, sqlx::Error> {
        let [schema, table] = statement.binds() else {
            return Err(protocol("catalog lookups take a schema and a table name"));
        };

        if schema.as_text() != Some(self.database_name.as_str()) {
            return Ok(vec![]);
        }

        let Some(table) = self
            .tables
            .iter()
            .find(|e| Some(e.definition.name.as_str()) == table.as_text())
        else {
            return Ok(vec![]);
        };

        let columns = table.definition.columns.iter();

        if statement.sql().contains("key_column_usage") {
            return Ok(columns
                .filter(|e| e.primary_key)
                .map(|e| Row::new().with("COLUMN_NAME", e.name.as_str()))
                .collect());
        }

        Ok(columns
            .map(|e| {
                let key = if e.primary_key {
                    "PRI"
                } else if e.unique {
                    "UNI"
                } else {
                    ""
                };

                Row::new()
                    .with("COLUMN_NAME", e.name.as_str())
                    .with("DATA_TYPE", e.data_type.as_str())
                    .with("IS_NULLABLE", if e.nullable { "YES" } else { "NO" })
                    .with("COLUMN_KEY", key)
            })
            .collect())
    }

    fn fetch(&mut self, statement: &Statement) -> Result<Vec<Row>, sqlx::Error> {
        self.record(statement)?;

        if statement.sql().contains("`information_schema`") {
            return self.catalog(statement);
        }

        match sql::parse(statement.sql(), statement.binds())? {
            Command::Select {
                table,
                columns,
                filter,
                limit,
            } => self.table(&table)?.select(&columns, filter.as_ref(), limit),
            _ => Err(protocol("statement does not return rows")),
        }
    }

    fn run(&mut self, statement: &Statement) -> Result<Executed, sqlx::Error> {
        self.record(statement)?;

        match sql::parse(statement.sql(), statement.binds())? {
            Command::Insert { table, assignments } => self.table_mut(&table)?.insert(assignments),
            Command::Update {
                table,
                assignments,
                filter,
            } => self.table_mut(&table)?.update(assignments, filter.as_ref()),
            Command::Select { .. } => Err(protocol("statement returns rows")),
        }
    }
}

impl DataLayer for MemoryDataLayer {
    fn database_name(&self) -> &str {
        &self.database_name
    }

    fn fetch_all<'a>(
        &'a mut self,
        statement: &'a Statement,
    ) -> BoxFuture<'a, Result<Vec<Row>, sqlx::Error>> {
        future::ready(self.fetch(statement)).boxed()
    }

    fn execute<'a>(
        &'a mut self,
        statement: &'a Statement,
    ) -> BoxFuture<'a, Result<Executed, sqlx::Error>> {
        future::ready(self.run(statement)).boxed()
    }

    fn begin(&mut self) -> BoxFuture<'_, Result<(), sqlx::Error>> {
        self.snapshot = Some(self.tables.clone());
        future::ready(Ok(())).boxed()
    }

    fn commit(&mut self) -> BoxFuture<'_, Result<(), sqlx::Error>> {
        self.snapshot = None;
        future::ready(Ok(())).boxed()
    }

    fn rollback(&mut self) -> BoxFuture<'_, Result<(), sqlx::Error>> {
        if let Some(tables) = self.snapshot.take() {
            self.tables = tables;
        }
        future::ready(Ok(())).boxed()
    }
}
