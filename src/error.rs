use thiserror::Error;

/// Everything that can go wrong while mapping entities to rows.
#[derive(Error, Debug)]
pub enum Error {
    /// The catalog could not describe the requested table.
    #[error("schema error: {0}")]
    Schema(String),

    /// A type's declared mapping cannot be satisfied by the table it is bound to.
    #[error("binding error: {0}")]
    Binding(String),

    #[error("could not find a constructor matching '{0}'")]
    NoMatchingConstructor(String),

    #[error("field {entity}.{field} cannot be null, `{table}`.`{column}` declared 'NOT NULL'")]
    NotNullViolation {
        entity: &'static str,
        field: &'static str,
        table: &'static str,
        column: &'static str,
    },

    #[error("got multiple limit-keywords")]
    DuplicateLimit,

    #[error("limit expected a non-negative integer, got {0}")]
    InvalidLimit(String),

    #[error("unknown keyword {0} passed as criteria")]
    UnknownCriteriaKeyword(String),

    #[error("invalid criteria: {0}")]
    InvalidCriteria(String),

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("serialization failed: {0}")]
    Serialization(String),

    /// A record that should be backed by a row has none.
    #[error("invalid object reference, primary key {key} not found in `{table}`")]
    MissingRow { table: &'static str, key: String },

    #[error("entity {0} has not been registered")]
    Unregistered(&'static str),

    #[error("entity {0} is already registered")]
    AlreadyRegistered(&'static str),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("query execution failed: {0}")]
    QueryExecution(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<rmp_serde::encode::Error> for Error {
    fn from(err: rmp_serde::encode::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<rmp_serde::decode::Error> for Error {
    fn from(err: rmp_serde::decode::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
