use dotenvy::dotenv;

use crate::error::{Error, Result};

pub enum DbType {
    MySql,
    Postgres,
    Sqlite,
}

impl DbType {
    #[must_use]
    pub fn from_connection_string(input: &str) -> Option<Self> {
        let lower = input.to_lowercase();

        if lower.starts_with("postgres") {
            Some(Self::Postgres)
        } else if lower.starts_with("sqlite") {
            Some(Self::Sqlite)
        } else if lower.starts_with("mysql") || lower.starts_with("mariadb") {
            Some(Self::MySql)
        } else {
            None
        }
    }
}

/// Attempt to retrieve the database URL from the `DATABASE_URL` environment variable, or from a
/// corresponding `.env` file.
#[must_use]
pub fn get_database_url() -> Option<String> {
    let _ = dotenv();

    std::env::var_os("DATABASE_URL").and_then(|e| e.into_string().ok())
}

/// Connection settings for [`MySqlDataLayer`](crate::data_layer::mysql::MySqlDataLayer).
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    url: String,
}

impl DatabaseConfig {
    /// # Errors
    ///
    /// If `url` is not a MySQL connection string. The catalog queries and statement syntax the
    /// engine emits are MySQL specific.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url = url.into();

        match DbType::from_connection_string(&url) {
            Some(DbType::MySql) => Ok(Self { url }),
            Some(DbType::Postgres | DbType::Sqlite) => Err(Error::Configuration(
                "only MySQL connection strings are supported".to_string(),
            )),
            None => Err(Error::Configuration(
                "Failed to determine database type from connection string, ensure it starts with `mysql`."
                    .to_string(),
            )),
        }
    }

    /// Read the configuration from `DATABASE_URL` (or a `.env` file).
    ///
    /// # Errors
    ///
    /// If the variable is unset or does not hold a MySQL connection string.
    pub fn from_env() -> Result<Self> {
        let Some(url) = get_database_url() else {
            return Err(Error::Configuration(
                "Missing database URL, set the `DATABASE_URL` environment variable".to_string(),
            ));
        };

        Self::new(url)
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[cfg(test)]
mod test {
    use super::{DatabaseConfig, DbType};

    #[test]
    fn test_db_type_from_connection_string() {
        assert!(matches!(
            DbType::from_connection_string("mysql://root@localhost/app"),
            Some(DbType::MySql)
        ));
        assert!(matches!(
            DbType::from_connection_string("Postgres://localhost"),
            Some(DbType::Postgres)
        ));
        assert!(DbType::from_connection_string("redis://localhost").is_none());
    }

    #[test]
    fn test_config_requires_mysql() {
        assert!(DatabaseConfig::new("mysql://root@localhost/app").is_ok());
        assert!(DatabaseConfig::new("sqlite::memory:").is_err());
    }
}
