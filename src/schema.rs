//! Table metadata read from `information_schema`.

use tracing::debug;

use crate::{
    data_layer::{DataLayer, Row, Statement},
    error::{Error, Result},
};

const DESCRIBE_COLUMNS: &str = "SELECT `COLUMN_NAME`, `DATA_TYPE`, `IS_NULLABLE`, `COLUMN_KEY` \
     FROM `information_schema`.`COLUMNS` \
     WHERE `TABLE_SCHEMA` = ? AND `TABLE_NAME` = ? \
     ORDER BY `ORDINAL_POSITION`";

const PRIMARY_KEY_COLUMNS: &str = "SELECT `k`.`COLUMN_NAME` \
     FROM `information_schema`.`table_constraints` `t` \
     JOIN `information_schema`.`key_column_usage` `k` \
     USING (`CONSTRAINT_NAME`, `CONSTRAINT_SCHEMA`, `TABLE_NAME`) \
     WHERE `t`.`CONSTRAINT_TYPE` = 'PRIMARY KEY' \
     AND `t`.`TABLE_SCHEMA` = ? \
     AND `t`.`TABLE_NAME` = ?";

/// A column as described by the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableColumn {
    pub name: String,
    /// The catalog's `DATA_TYPE`, lower case, e.g. `varchar` or `blob`.
    pub datatype: String,
    pub nullable: bool,
    pub is_primary_key: bool,
}

impl TableColumn {
    /// Built from catalog fields directly. A `timestamp` column is always nullable, since the
    /// database substitutes the current time for `NULL`.
    pub fn new(
        name: impl Into<String>,
        datatype: impl Into<String>,
        nullable: bool,
        is_primary_key: bool,
    ) -> Self {
        let datatype = datatype.into().to_ascii_lowercase();

        Self {
            name: name.into(),
            nullable: nullable || datatype == "timestamp",
            datatype,
            is_primary_key,
        }
    }
}

fn text_column(row: &Row, column: &str) -> Result<String> {
    row.get(column)
        .and_then(|value| value.as_text())
        .map(ToString::to_string)
        .ok_or_else(|| Error::Schema(format!("catalog row is missing `{column}`")))
}

fn parse_column(row: &Row) -> Result<TableColumn> {
    let name = text_column(row, "COLUMN_NAME")?;
    let datatype = text_column(row, "DATA_TYPE")?;
    let nullable = text_column(row, "IS_NULLABLE")?.eq_ignore_ascii_case("YES");
    let is_primary_key = text_column(row, "COLUMN_KEY")?.eq_ignore_ascii_case("PRI");

    Ok(TableColumn::new(name, datatype, nullable, is_primary_key))
}

/// Describe the columns of `table` in the data layer's database, in ordinal order.
///
/// # Errors
///
/// [`Error::Schema`] if the catalog query fails or the table has no columns.
pub async fn describe_columns(db: &mut dyn DataLayer, table: &str) -> Result<Vec<TableColumn>> {
    let statement = Statement::prepare(DESCRIBE_COLUMNS)
        .bind(db.database_name())
        .bind(table);

    let rows = db
        .fetch_all(&statement)
        .await
        .map_err(|e| Error::Schema(format!("failed to describe `{table}`: {e}")))?;

    if rows.is_empty() {
        return Err(Error::Schema(format!(
            "table `{table}` has no columns in database `{}`",
            db.database_name()
        )));
    }

    let columns = rows.iter().map(parse_column).collect::<Result<Vec<_>>>()?;
    debug!(table, columns = columns.len(), "described table");

    Ok(columns)
}

/// Names of the columns making up the primary key of `table`.
///
/// # Errors
///
/// [`Error::Schema`] if the catalog query fails.
pub async fn primary_key_columns(db: &mut dyn DataLayer, table: &str) -> Result<Vec<String>> {
    let statement = Statement::prepare(PRIMARY_KEY_COLUMNS)
        .bind(db.database_name())
        .bind(table);

    let rows = db
        .fetch_all(&statement)
        .await
        .map_err(|e| Error::Schema(format!("failed to read primary key of `{table}`: {e}")))?;

    rows.iter().map(|row| text_column(row, "COLUMN_NAME")).collect()
}
