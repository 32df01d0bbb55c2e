use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use futures::{FutureExt, future::BoxFuture};
use sqlx::{
    Column, Connection, Executor, MySql, MySqlConnection, Row as _, TypeInfo,
    mysql::{MySqlArguments, MySqlRow},
    query::Query,
};
use tracing::debug;

use crate::{
    config::DatabaseConfig,
    data_layer::{DataLayer, Executed, Row, Statement},
    value::Value,
};

/// A [`DataLayer`] backed by a single MySQL connection.
///
/// sqlx caches prepared statements per connection, so the engine's query templates are
/// prepared once and reused.
pub struct MySqlDataLayer {
    connection: MySqlConnection,
    database_name: String,
}

impl MySqlDataLayer {
    /// # Errors
    ///
    /// If the connection cannot be established or no default database is selected.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let connection = MySqlConnection::connect(url).await?;
        Self::from_connection(connection).await
    }

    /// # Errors
    ///
    /// See [`MySqlDataLayer::connect`].
    pub async fn connect_with(config: &DatabaseConfig) -> crate::Result<Self> {
        Ok(Self::connect(config.url()).await?)
    }

    /// Wrap an existing connection, reading the selected database's name.
    ///
    /// # Errors
    ///
    /// If no default database is selected on the connection.
    pub async fn from_connection(mut connection: MySqlConnection) -> Result<Self, sqlx::Error> {
        let database_name: Option<String> = sqlx::query_scalar("SELECT DATABASE()")
            .fetch_one(&mut connection)
            .await?;

        let Some(database_name) = database_name else {
            return Err(sqlx::Error::Configuration(
                "connection has no default database selected".into(),
            ));
        };

        Ok(Self {
            connection,
            database_name,
        })
    }

    #[must_use]
    pub fn into_inner(self) -> MySqlConnection {
        self.connection
    }
}

fn build_query(statement: &Statement) -> Query<'_, MySql, MySqlArguments> {
    statement
        .binds()
        .iter()
        .fold(sqlx::query(statement.sql()), |query, value| match value {
            Value::Null => query.bind(None::<String>),
            Value::Integer(v) => query.bind(*v),
            Value::Float(v) => query.bind(*v),
            Value::Text(v) => query.bind(v.as_str()),
            Value::Bytes(v) => query.bind(v.as_slice()),
            Value::Boolean(v) => query.bind(*v),
            Value::Timestamp(v) => query.bind(*v),
        })
}

fn decode_row(row: &MySqlRow) -> Result<Row, sqlx::Error> {
    row.columns()
        .iter()
        .map(|column| {
            let value = decode_column(row, column.ordinal(), column.type_info().name())?;
            Ok((column.name().to_string(), value))
        })
        .collect()
}

fn decode_column(row: &MySqlRow, index: usize, type_name: &str) -> Result<Value, sqlx::Error> {
    let type_name = type_name.to_ascii_uppercase();

    let value = match type_name.as_str() {
        "NULL" => None,
        "BOOLEAN" => row.try_get::<Option<bool>, _>(index)?.map(Value::Boolean),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
            row.try_get::<Option<i64>, _>(index)?.map(Value::Integer)
        }
        t if t.ends_with("UNSIGNED") => row.try_get::<Option<u64>, _>(index)?.map(|v| {
            i64::try_from(v).map_or_else(|_| Value::Text(v.to_string()), Value::Integer)
        }),
        "FLOAT" => row
            .try_get::<Option<f32>, _>(index)?
            .map(|v| Value::Float(f64::from(v))),
        "DOUBLE" => row.try_get::<Option<f64>, _>(index)?.map(Value::Float),
        "TIMESTAMP" | "DATETIME" => row
            .try_get::<Option<NaiveDateTime>, _>(index)?
            .map(Value::Timestamp),
        "DATE" => row
            .try_get::<Option<NaiveDate>, _>(index)?
            .map(|v| Value::Timestamp(v.and_time(NaiveTime::default()))),
        "TIME" => row
            .try_get::<Option<NaiveTime>, _>(index)?
            .map(|v| Value::Text(v.to_string())),
        "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BINARY" | "VARBINARY" => {
            row.try_get::<Option<Vec<u8>>, _>(index)?.map(Value::Bytes)
        }
        // Catalog views report some columns as binary strings depending on the server version.
        _ => match row.try_get::<Option<String>, _>(index) {
            Ok(v) => v.map(Value::Text),
            Err(_) => row.try_get::<Option<Vec<u8>>, _>(index)?.map(Value::Bytes),
        },
    };

    Ok(value.unwrap_or(Value::Null))
}

impl DataLayer for MySqlDataLayer {
    fn database_name(&self) -> &str {
        &self.database_name
    }

    fn fetch_all<'a>(
        &'a mut self,
        statement: &'a Statement,
    ) -> BoxFuture<'a, Result<Vec<Row>, sqlx::Error>> {
        async move {
            debug!(sql = statement.sql(), binds = statement.binds().len(), "fetch");
            let rows = build_query(statement).fetch_all(&mut self.connection).await?;
            rows.iter().map(decode_row).collect()
        }
        .boxed()
    }

    fn execute<'a>(
        &'a mut self,
        statement: &'a Statement,
    ) -> BoxFuture<'a, Result<Executed, sqlx::Error>> {
        async move {
            debug!(sql = statement.sql(), binds = statement.binds().len(), "execute");
            let result = build_query(statement).execute(&mut self.connection).await?;

            Ok(Executed {
                rows_affected: result.rows_affected(),
                last_insert_id: match result.last_insert_id() {
                    0 => None,
                    id => i64::try_from(id).ok().map(Value::Integer),
                },
            })
        }
        .boxed()
    }

    fn begin(&mut self) -> BoxFuture<'_, Result<(), sqlx::Error>> {
        async move {
            self.connection.execute("START TRANSACTION").await?;
            Ok(())
        }
        .boxed()
    }

    fn commit(&mut self) -> BoxFuture<'_, Result<(), sqlx::Error>> {
        async move {
            self.connection.execute("COMMIT").await?;
            Ok(())
        }
        .boxed()
    }

    fn rollback(&mut self) -> BoxFuture<'_, Result<(), sqlx::Error>> {
        async move {
            self.connection.execute("ROLLBACK").await?;
            Ok(())
        }
        .boxed()
    }
}
