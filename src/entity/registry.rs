use std::{any::type_name, fmt::Debug};

use itertools::Itertools;
use tracing::debug;

use crate::{
    context::Context,
    data_layer::{DataLayer, Statement},
    entity::{
        Entity, binder,
        column::{BoundColumn, ColumnDescriptor},
        mapping::{Constructor, Mapping},
    },
    error::{Error, Result},
    query::{PushToQuery, criteria::CompiledCriteria, select::Select},
    schema::{self, TableColumn},
    value::Value,
};

/// Everything the engine knows about an entity type: its bound columns, its constructors and
/// its prepared query templates. Built once per type, then shared read-only.
pub struct EntityRegistry<T> {
    table: &'static str,
    columns: Vec<BoundColumn<T>>,
    primary_key: usize,
    constructors: Vec<Constructor<T>>,
    select_all: String,
    select_by_id: String,
}

impl<T: Entity> EntityRegistry<T> {
    /// Introspect `T`'s table and bind its mapping.
    ///
    /// # Errors
    ///
    /// [`Error::Schema`] if the table cannot be described, [`Error::Binding`] if the mapping
    /// does not fit it.
    pub async fn initialize(db: &mut dyn DataLayer) -> Result<Self> {
        let columns = schema::describe_columns(db, T::TABLE_NAME).await?;
        Self::from_parts(Mapping::of(), &columns)
    }

    /// Bind `mapping` against an already known list of table columns.
    ///
    /// # Errors
    ///
    /// [`Error::Binding`] if the mapping does not fit the columns, or declares no constructor.
    pub fn from_parts(mapping: Mapping<T>, table_columns: &[TableColumn]) -> Result<Self> {
        let (declared, constructors) = mapping.into_parts();

        if constructors.is_empty() {
            return Err(Error::Binding(format!(
                "{} declares no constructor",
                std::any::type_name::<T>()
            )));
        }

        let (columns, primary_key) = binder::bind(declared, T::TABLE_NAME, table_columns)?;

        let names = columns.iter().map(|e| e.descriptor.column_name).collect::<Vec<_>>();
        let key_column = columns[primary_key].descriptor.column_name;

        let select_all = Select::new(T::TABLE_NAME, names.iter().copied()).query();
        let select_by_id = Select::new(T::TABLE_NAME, names.iter().copied())
            .by_key(key_column)
            .query();

        debug!(
            table = T::TABLE_NAME,
            columns = columns.len(),
            constructors = constructors.len(),
            "bound entity {}",
            std::any::type_name::<T>()
        );

        Ok(Self {
            table: T::TABLE_NAME,
            columns,
            primary_key,
            constructors,
            select_all,
            select_by_id,
        })
    }
}

impl<T> EntityRegistry<T> {
    #[must_use]
    pub const fn table(&self) -> &'static str {
        self.table
    }

    pub fn columns(&self) -> &[BoundColumn<T>] {
        &self.columns
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.iter().map(|e| &e.descriptor)
    }

    #[must_use]
    pub fn primary_key(&self) -> &BoundColumn<T> {
        &self.columns[self.primary_key]
    }

    /// Read the primary key of `model`.
    ///
    /// # Errors
    ///
    /// If the key field cannot be read, see [`BoundColumn::read`].
    pub fn primary_key_of(&self, context: &Context, model: &T) -> Result<Value> {
        self.primary_key().read(context, model)
    }

    /// Pick the first declared constructor accepting `args`.
    ///
    /// # Errors
    ///
    /// [`Error::NoMatchingConstructor`] if none does.
    pub fn select_constructor(&self, args: &[Value]) -> Result<&Constructor<T>> {
        self.constructors
            .iter()
            .find(|e| e.accepts(args))
            .ok_or_else(|| {
                Error::NoMatchingConstructor(format!(
                    "{}({})",
                    type_name::<T>(),
                    args.iter().map(Value::type_name).join(", ")
                ))
            })
    }

    /// `SELECT <columns> FROM <table>`
    #[must_use]
    pub fn select_all_sql(&self) -> &str {
        &self.select_all
    }

    /// `SELECT <columns> FROM <table> WHERE <key> = ? LIMIT 1`
    #[must_use]
    pub fn select_by_id_sql(&self) -> &str {
        &self.select_by_id
    }

    pub(crate) fn select_all_statement(&self) -> Statement {
        Statement::prepare(self.select_all.as_str())
    }

    pub(crate) fn select_by_id_statement(&self, key: Value) -> Statement {
        Statement::prepare(self.select_by_id.as_str()).bind(key)
    }

    pub(crate) fn selection_statement(&self, criteria: &CompiledCriteria) -> Statement {
        Select::new(self.table, self.columns.iter().map(|e| e.descriptor.column_name))
            .matching(criteria)
            .to_statement()
    }
}

impl<T> Debug for EntityRegistry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityRegistry")
            .field("table", &self.table)
            .field("columns", &self.descriptors().collect::<Vec<_>>())
            .field("constructors", &self.constructors)
            .field("select_all", &self.select_all)
            .field("select_by_id", &self.select_by_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod test {
    use super::EntityRegistry;
    use crate::{
        entity::{Entity, mapping::Mapping},
        error::Error,
        schema::TableColumn,
        value::{FieldValue, Value, ValueKind},
    };

    #[derive(Debug, Default, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Settings {
        theme: String,
    }

    #[derive(Default)]
    struct Account {
        id: i64,
        email: String,
        settings: Option<Settings>,
    }

    impl Entity for Account {
        const TABLE_NAME: &'static str = "account";

        fn map(mapping: &mut Mapping<Self>) {
            mapping
                .column("id", "id", |m| &m.id, |m| &mut m.id)
                .column("email", "email", |m| &m.email, |m| &mut m.email)
                .serialized("settings", "settings", |m| &m.settings, |m| {
                    &mut m.settings
                })
                .constructor(&[ValueKind::Text], |args| {
                    Ok(Self {
                        email: String::from_value(args[0].clone())?,
                        ..Self::default()
                    })
                })
                .default_constructor();
        }
    }

    fn account_columns(settings_type: &str) -> Vec<TableColumn> {
        vec![
            TableColumn::new("id", "int", false, true),
            TableColumn::new("email", "varchar", false, false),
            TableColumn::new("settings", settings_type, true, false),
            TableColumn::new("created", "timestamp", false, false),
        ]
    }

    #[test]
    fn test_templates() {
        let registry = EntityRegistry::from_parts(Mapping::<Account>::of(), &account_columns("blob"))
            .expect("Failed to bind account");

        assert_eq!(
            registry.select_all_sql(),
            "SELECT `id`, `email`, `settings` FROM `account`"
        );
        assert_eq!(
            registry.select_by_id_sql(),
            "SELECT `id`, `email`, `settings` FROM `account` WHERE `id` = ? LIMIT 1"
        );
        assert_eq!(registry.primary_key().descriptor.column_name, "id");
    }

    #[test]
    fn test_serialized_column_must_be_blob() {
        let result =
            EntityRegistry::from_parts(Mapping::<Account>::of(), &account_columns("varchar"));

        assert!(matches!(result, Err(Error::Binding(_))));
    }

    #[test]
    fn test_unknown_column() {
        let columns = account_columns("blob")
            .into_iter()
            .filter(|e| e.name != "email")
            .collect::<Vec<_>>();

        let result = EntityRegistry::from_parts(Mapping::<Account>::of(), &columns);

        assert!(matches!(result, Err(Error::Binding(msg)) if msg.contains("unknown column")));
    }

    #[test]
    fn test_primary_key_required() {
        let columns = vec![
            TableColumn::new("id", "int", false, false),
            TableColumn::new("email", "varchar", false, false),
            TableColumn::new("settings", "blob", true, false),
        ];

        let result = EntityRegistry::from_parts(Mapping::<Account>::of(), &columns);

        assert!(matches!(result, Err(Error::Binding(_))));
    }

    #[test]
    fn test_constructor_selection_prefers_first_match() {
        let registry = EntityRegistry::from_parts(Mapping::<Account>::of(), &account_columns("blob"))
            .expect("Failed to bind account");

        let zero_args = registry
            .select_constructor(&[])
            .expect("Failed to select constructor");
        assert!(zero_args.params().is_empty());

        let named = registry
            .select_constructor(&[Value::from("bob@example.com")])
            .expect("Failed to select constructor");
        assert_eq!(named.params(), &[ValueKind::Text]);

        assert!(matches!(
            registry.select_constructor(&[Value::Integer(1), Value::Integer(2)]),
            Err(Error::NoMatchingConstructor(msg)) if msg.ends_with("::Account(INTEGER, INTEGER)")
        ));
    }
}
