use serde::{Deserialize, Serialize};
use sqlparser::ast::{ColumnDef, ColumnOption, CreateTable, DataType, ObjectNamePart};

/// Lower case base name of a column type, the way MySQL reports it as `DATA_TYPE`, e.g.
/// `VARCHAR(255)` becomes `varchar`.
#[must_use]
pub fn base_type_name(data_type: &DataType) -> String {
    let full = data_type.to_string().to_ascii_lowercase();
    let base = full
        .split(|c: char| c == '(' || c.is_whitespace())
        .next()
        .unwrap_or_default();

    match base {
        "integer" => "int",
        "bool" | "boolean" => "tinyint",
        other => other,
    }
    .to_string()
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SqlColumn {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub unique: bool,
    pub primary_key: bool,
    pub auto_increment: bool,
    /// The `DEFAULT` expression, as written.
    pub default: Option<String>,
}

impl From<&ColumnDef> for SqlColumn {
    fn from(value: &ColumnDef) -> Self {
        let primary_key = value.options.iter().any(|e| {
            matches!(
                e.option,
                ColumnOption::Unique {
                    is_primary: true,
                    ..
                }
            )
        });

        Self {
            name: value.name.value.clone(),
            data_type: base_type_name(&value.data_type),
            // Primary key columns are implicitly NOT NULL.
            nullable: !primary_key
                && value
                    .options
                    .iter()
                    .find_map(|e| match e.option {
                        ColumnOption::Null => Some(true),
                        ColumnOption::NotNull => Some(false),
                        _ => None,
                    })
                    .unwrap_or(true),
            unique: value
                .options
                .iter()
                .any(|e| matches!(e.option, ColumnOption::Unique { .. })),
            primary_key,
            auto_increment: value.options.iter().any(|e| {
                matches!(&e.option, ColumnOption::DialectSpecific(_))
                    && e.option.to_string().eq_ignore_ascii_case("AUTO_INCREMENT")
            }),
            default: value.options.iter().find_map(|e| match &e.option {
                ColumnOption::Default(expr) => Some(expr.to_string()),
                _ => None,
            }),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SqlTable {
    pub name: String,
    pub columns: Vec<SqlColumn>,
    pub primary_key: Option<String>,
}

impl SqlTable {
    #[must_use]
    pub fn find_column(&self, name: &str) -> Option<&SqlColumn> {
        self.columns.iter().find(|e| e.name.eq(name))
    }
}

impl From<&CreateTable> for SqlTable {
    fn from(create_table: &CreateTable) -> Self {
        let columns: Vec<SqlColumn> = create_table.columns.iter().map(SqlColumn::from).collect();

        Self {
            name: create_table
                .name
                .0
                .iter()
                .map(|e| {
                    let ObjectNamePart::Identifier(ident) = e;

                    ident.value.clone()
                })
                .last()
                .unwrap_or_default(),
            primary_key: columns
                .iter()
                .find_map(|e| e.primary_key.then(|| e.name.clone())),
            columns,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlSchema {
    pub tables: Vec<SqlTable>,
}

impl SqlSchema {
    #[must_use]
    pub fn find_table(&self, name: &str) -> Option<&SqlTable> {
        self.tables.iter().find(|e| e.name.eq(name))
    }

    /// # Errors
    ///
    /// If the schema cannot be serialized.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// # Errors
    ///
    /// If `json` does not describe a schema.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
