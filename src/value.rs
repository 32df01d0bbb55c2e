use std::fmt::Display;

use chrono::NaiveDateTime;

use crate::error::{Error, Result};

/// A dynamically typed SQL value, as bound to a statement or read from a row.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Boolean(bool),
    Timestamp(NaiveDateTime),
}

impl Value {
    #[must_use]
    pub const fn kind(&self) -> Option<ValueKind> {
        match self {
            Self::Null => None,
            Self::Integer(_) => Some(ValueKind::Integer),
            Self::Float(_) => Some(ValueKind::Float),
            Self::Text(_) => Some(ValueKind::Text),
            Self::Bytes(_) => Some(ValueKind::Bytes),
            Self::Boolean(_) => Some(ValueKind::Boolean),
            Self::Timestamp(_) => Some(ValueKind::Timestamp),
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Name of the value's kind, `NULL` for [`Value::Null`].
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.kind().map_or("NULL", ValueKind::name)
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Bytes(bytes) => std::str::from_utf8(bytes).ok(),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "'{v}'"),
            Self::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Timestamp(v) => write!(f, "'{v}'"),
        }
    }
}

/// The kind of value a field holds or a constructor parameter accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Accepts any value.
    Any,
    Integer,
    Float,
    Text,
    Bytes,
    Boolean,
    Timestamp,
}

impl ValueKind {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Any => "ANY",
            Self::Integer => "INTEGER",
            Self::Float => "FLOAT",
            Self::Text => "TEXT",
            Self::Bytes => "BYTES",
            Self::Boolean => "BOOLEAN",
            Self::Timestamp => "TIMESTAMP",
        }
    }

    /// Whether `value` may be passed where this kind is expected. `NULL` is assignable to every
    /// kind.
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        match value.kind() {
            None => true,
            Some(kind) => self == Self::Any || self == kind,
        }
    }

    /// Whether a field of this kind can plausibly hold values of a MySQL column whose
    /// `DATA_TYPE` is `column_datatype`.
    #[must_use]
    pub fn compatible_with_column(self, column_datatype: &str) -> bool {
        let datatype = column_datatype.to_ascii_lowercase();

        match self {
            Self::Any => true,
            Self::Integer => matches!(
                datatype.as_str(),
                "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "bigint" | "bit" | "year"
            ),
            Self::Float => matches!(
                datatype.as_str(),
                "float" | "double" | "real" | "decimal" | "numeric"
            ),
            Self::Text => matches!(
                datatype.as_str(),
                "char"
                    | "varchar"
                    | "tinytext"
                    | "text"
                    | "mediumtext"
                    | "longtext"
                    | "enum"
                    | "set"
                    | "json"
                    | "decimal"
                    | "date"
                    | "time"
            ),
            Self::Bytes => is_blob_type(&datatype) || matches!(datatype.as_str(), "binary" | "varbinary"),
            Self::Boolean => matches!(datatype.as_str(), "tinyint" | "bool" | "boolean" | "bit"),
            Self::Timestamp => matches!(datatype.as_str(), "timestamp" | "datetime" | "date"),
        }
    }
}

impl Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether `column_datatype` names one of MySQL's binary blob types.
#[must_use]
pub fn is_blob_type(column_datatype: &str) -> bool {
    matches!(
        column_datatype.to_ascii_lowercase().as_str(),
        "blob" | "tinyblob" | "mediumblob" | "longblob"
    )
}

fn mismatch(expected: &str, found: &Value) -> Error {
    Error::TypeMismatch(format!(
        "expected {expected}, got {} ({found})",
        found.type_name()
    ))
}

/// A rust type that can be stored in a plain (non-reference, non-serialized) column.
pub trait FieldValue: Sized + Send + Sync + 'static {
    const KIND: ValueKind;

    fn to_value(&self) -> Value;

    /// Convert a value read from a row.
    ///
    /// # Errors
    ///
    /// [`Error::TypeMismatch`] if the value cannot be held by this type.
    fn from_value(value: Value) -> Result<Self>;
}

macro_rules! integer_field_value {
    ($($ty:ty),*) => {
        $(
            impl FieldValue for $ty {
                const KIND: ValueKind = ValueKind::Integer;

                #[allow(clippy::cast_lossless, clippy::cast_possible_wrap)]
                fn to_value(&self) -> Value {
                    Value::Integer(*self as i64)
                }

                fn from_value(value: Value) -> Result<Self> {
                    match value {
                        Value::Integer(v) => <$ty>::try_from(v).map_err(|_| {
                            Error::TypeMismatch(format!(
                                "{v} does not fit into {}",
                                stringify!($ty)
                            ))
                        }),
                        Value::Boolean(v) => Ok(<$ty>::from(v)),
                        other => Err(mismatch(stringify!($ty), &other)),
                    }
                }
            }

            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    value.to_value()
                }
            }
        )*
    };
}

integer_field_value!(i8, i16, i32, i64, u8, u16, u32);

impl FieldValue for u64 {
    const KIND: ValueKind = ValueKind::Integer;

    fn to_value(&self) -> Value {
        i64::try_from(*self).map_or_else(|_| Value::Text(self.to_string()), Value::Integer)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Integer(v) => {
                Self::try_from(v).map_err(|_| Error::TypeMismatch(format!("{v} does not fit into u64")))
            }
            Value::Text(ref text) => text.parse().map_err(|_| mismatch("u64", &value)),
            other => Err(mismatch("u64", &other)),
        }
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        value.to_value()
    }
}

impl FieldValue for f64 {
    const KIND: ValueKind = ValueKind::Float;

    fn to_value(&self) -> Value {
        Value::Float(*self)
    }

    #[allow(clippy::cast_precision_loss)]
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Float(v) => Ok(v),
            Value::Integer(v) => Ok(v as Self),
            other => Err(mismatch("f64", &other)),
        }
    }
}

impl FieldValue for f32 {
    const KIND: ValueKind = ValueKind::Float;

    fn to_value(&self) -> Value {
        Value::Float(f64::from(*self))
    }

    #[allow(clippy::cast_possible_truncation)]
    fn from_value(value: Value) -> Result<Self> {
        f64::from_value(value).map(|v| v as Self)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl FieldValue for bool {
    const KIND: ValueKind = ValueKind::Boolean;

    fn to_value(&self) -> Value {
        Value::Boolean(*self)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Boolean(v) => Ok(v),
            Value::Integer(v) => Ok(v != 0),
            other => Err(mismatch("bool", &other)),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl FieldValue for String {
    const KIND: ValueKind = ValueKind::Text;

    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Text(v) => Ok(v),
            Value::Bytes(v) => Self::from_utf8(v).map_err(|e| Error::TypeMismatch(e.to_string())),
            other => Err(mismatch("String", &other)),
        }
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl FieldValue for Vec<u8> {
    const KIND: ValueKind = ValueKind::Bytes;

    fn to_value(&self) -> Value {
        Value::Bytes(self.clone())
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bytes(v) => Ok(v),
            other => Err(mismatch("Vec<u8>", &other)),
        }
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl FieldValue for NaiveDateTime {
    const KIND: ValueKind = ValueKind::Timestamp;

    fn to_value(&self) -> Value {
        Value::Timestamp(*self)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Timestamp(v) => Ok(v),
            other => Err(mismatch("NaiveDateTime", &other)),
        }
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Self::Timestamp(value)
    }
}

impl<F: FieldValue> FieldValue for Option<F> {
    const KIND: ValueKind = F::KIND;

    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, F::to_value)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => F::from_value(other).map(Some),
        }
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}
