use sqlparser::{
    ast::Statement,
    dialect::MySqlDialect,
    parser::{Parser, ParserError},
};
use thiserror::Error;

use crate::schema::{SqlSchema, SqlTable};

#[derive(Error, Debug)]
pub enum ParseError {
    #[error(transparent)]
    Parser(#[from] ParserError),

    #[error("no CREATE TABLE statement found")]
    NoCreateTable,
}

/// Parse every `CREATE TABLE` statement of `query`, ignoring other statements.
///
/// # Errors
///
/// If `query` is not valid MySQL.
pub fn parse_tables(query: &str) -> Result<Vec<SqlTable>, ParseError> {
    let ast = Parser::parse_sql(&MySqlDialect {}, query)?;

    Ok(ast
        .iter()
        .filter_map(|e| {
            if let Statement::CreateTable(statement) = e {
                Some(SqlTable::from(statement))
            } else {
                None
            }
        })
        .collect())
}

/// Parse the first `CREATE TABLE` statement of `query`.
///
/// # Errors
///
/// If `query` is not valid MySQL, or defines no table.
pub fn parse_create_table(query: &str) -> Result<SqlTable, ParseError> {
    parse_tables(query)?
        .into_iter()
        .next()
        .ok_or(ParseError::NoCreateTable)
}

/// # Errors
///
/// See [`parse_tables`].
pub fn parse_schema(query: &str) -> Result<SqlSchema, ParseError> {
    Ok(SqlSchema {
        tables: parse_tables(query)?,
    })
}

#[cfg(test)]
mod test {
    use super::{ParseError, parse_create_table, parse_schema};

    #[test]
    fn test_create_table() {
        let query = "CREATE TABLE `test`(
          `id` INT NOT NULL AUTO_INCREMENT PRIMARY KEY,
          `name` VARCHAR(255) NOT NULL,
          `something_nullable` TEXT,
          `payload` LONGBLOB,
          `created` TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )";

        let parsed = parse_create_table(query).expect("Failed to parse query");

        assert_eq!(parsed.name, "test");
        assert_eq!(parsed.primary_key.as_deref(), Some("id"));

        let id = parsed.find_column("id").expect("Missing id");
        assert!(!id.nullable);
        assert!(id.auto_increment);
        assert_eq!(id.data_type, "int");

        let name = parsed.find_column("name").expect("Missing name");
        assert!(!name.nullable);
        assert_eq!(name.data_type, "varchar");

        assert!(
            parsed
                .columns
                .iter()
                .any(|e| e.name.eq("something_nullable") && e.nullable)
        );
        assert_eq!(
            parsed.find_column("payload").map(|e| e.data_type.as_str()),
            Some("longblob")
        );

        let created = parsed.find_column("created").expect("Missing created");
        assert_eq!(created.data_type, "timestamp");
        assert!(created.default.is_some());
    }

    #[test]
    fn test_primary_key_implies_not_null() {
        let parsed = parse_create_table("CREATE TABLE t (id INTEGER PRIMARY KEY, flag BOOLEAN)")
            .expect("Failed to parse query");

        let id = parsed.find_column("id").expect("Missing id");
        assert!(!id.nullable);
        assert_eq!(id.data_type, "int");
        assert_eq!(
            parsed.find_column("flag").map(|e| e.data_type.as_str()),
            Some("tinyint")
        );
    }

    #[test]
    fn test_schema_json() {
        let schema = parse_schema(
            "CREATE TABLE a (id INT PRIMARY KEY); CREATE TABLE b (id INT PRIMARY KEY, a_id INT);",
        )
        .expect("Failed to parse schema");

        assert_eq!(schema.tables.len(), 2);
        assert!(schema.find_table("b").is_some());

        let json = schema.to_json().expect("Failed to serialize schema");
        let decoded = super::SqlSchema::from_json(&json).expect("Failed to deserialize schema");

        assert_eq!(decoded, schema);
    }

    #[test]
    fn test_no_table() {
        assert!(matches!(
            parse_create_table("SELECT 1"),
            Err(ParseError::NoCreateTable)
        ));
    }
}
