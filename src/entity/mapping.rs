use std::{any::type_name, fmt::Debug, sync::Arc};

use itertools::Itertools;
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    entity::{
        Entity,
        column::{FieldAccessor, ReferenceAccessor, SerializedAccessor, ValueAccessor},
    },
    error::Result,
    value::{FieldValue, Value, ValueKind},
};

/// A field the entity declares as mapped, before it is bound to the table.
pub struct DeclaredColumn<T> {
    pub column_name: &'static str,
    pub field_name: &'static str,
    pub field_datatype: ValueKind,
    pub reference_type: Option<&'static str>,
    pub serialize_type: Option<&'static str>,
    pub(crate) accessor: Arc<dyn FieldAccessor<T>>,
}

impl<T> Debug for DeclaredColumn<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeclaredColumn")
            .field("column_name", &self.column_name)
            .field("field_name", &self.field_name)
            .field("field_datatype", &self.field_datatype)
            .field("reference_type", &self.reference_type)
            .field("serialize_type", &self.serialize_type)
            .finish_non_exhaustive()
    }
}

type Build<T> = Box<dyn Fn(&[Value]) -> Result<T> + Send + Sync>;

/// A factory building a fresh entity from the extra arguments of a read.
pub struct Constructor<T> {
    params: Vec<ValueKind>,
    build: Build<T>,
}

impl<T> Constructor<T> {
    pub fn params(&self) -> &[ValueKind] {
        &self.params
    }

    /// Whether `args` can be passed to this constructor: same count, each argument assignable
    /// to its parameter.
    #[must_use]
    pub fn accepts(&self, args: &[Value]) -> bool {
        self.params.len() == args.len()
            && self
                .params
                .iter()
                .zip(args)
                .all(|(param, arg)| param.accepts(arg))
    }

    /// # Errors
    ///
    /// Whatever the factory returns.
    pub fn build(&self, args: &[Value]) -> Result<T> {
        (self.build)(args)
    }
}

impl<T> Debug for Constructor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Constructor({})", self.params.iter().join(", "))
    }
}

/// Builder for the mapping of an entity type, filled in by [`Entity::map`].
///
/// ```ignore
/// fn map(mapping: &mut Mapping<Self>) {
///     mapping
///         .column("id", "id", |m| &m.id, |m| &mut m.id)
///         .column("name", "name", |m| &m.name, |m| &mut m.name)
///         .reference("owner_id", "owner", |m| &m.owner, |m| &mut m.owner)
///         .default_constructor();
/// }
/// ```
pub struct Mapping<T> {
    columns: Vec<DeclaredColumn<T>>,
    constructors: Vec<Constructor<T>>,
}

impl<T> Default for Mapping<T> {
    fn default() -> Self {
        Self {
            columns: vec![],
            constructors: vec![],
        }
    }
}

impl<T: Entity> Mapping<T> {
    /// Collect the mapping `T` declares.
    #[must_use]
    pub fn of() -> Self {
        let mut mapping = Self::default();
        T::map(&mut mapping);
        mapping
    }

    /// Map a plain field to `column`.
    pub fn column<F: FieldValue>(
        &mut self,
        column: &'static str,
        field: &'static str,
        get: fn(&T) -> &F,
        get_mut: fn(&mut T) -> &mut F,
    ) -> &mut Self {
        self.columns.push(DeclaredColumn {
            column_name: column,
            field_name: field,
            field_datatype: F::KIND,
            reference_type: None,
            serialize_type: None,
            accessor: Arc::new(ValueAccessor { get, get_mut }),
        });
        self
    }

    /// Map a field holding another entity. The column stores the referenced entity's primary
    /// key.
    pub fn reference<R: Entity>(
        &mut self,
        column: &'static str,
        field: &'static str,
        get: fn(&T) -> &Option<R>,
        get_mut: fn(&mut T) -> &mut Option<R>,
    ) -> &mut Self {
        self.columns.push(DeclaredColumn {
            column_name: column,
            field_name: field,
            field_datatype: ValueKind::Any,
            reference_type: Some(type_name::<R>()),
            serialize_type: None,
            accessor: Arc::new(ReferenceAccessor { get, get_mut }),
        });
        self
    }

    /// Map a field persisted as an opaque blob. The column must be blob-typed.
    pub fn serialized<S>(
        &mut self,
        column: &'static str,
        field: &'static str,
        get: fn(&T) -> &Option<S>,
        get_mut: fn(&mut T) -> &mut Option<S>,
    ) -> &mut Self
    where
        S: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        self.columns.push(DeclaredColumn {
            column_name: column,
            field_name: field,
            field_datatype: ValueKind::Bytes,
            reference_type: None,
            serialize_type: Some(type_name::<S>()),
            accessor: Arc::new(SerializedAccessor { get, get_mut }),
        });
        self
    }

    /// Append a constructor taking extra arguments of the given kinds. Constructors are tried in
    /// the order they are declared.
    pub fn constructor(
        &mut self,
        params: &[ValueKind],
        build: impl Fn(&[Value]) -> Result<T> + Send + Sync + 'static,
    ) -> &mut Self {
        self.constructors.push(Constructor {
            params: params.to_vec(),
            build: Box::new(build),
        });
        self
    }

    /// Append a constructor taking no extra arguments.
    pub fn default_constructor(&mut self) -> &mut Self
    where
        T: Default,
    {
        self.constructor(&[], |_| Ok(T::default()))
    }

    pub fn columns(&self) -> &[DeclaredColumn<T>] {
        &self.columns
    }

    pub fn constructors(&self) -> &[Constructor<T>] {
        &self.constructors
    }

    pub(crate) fn into_parts(self) -> (Vec<DeclaredColumn<T>>, Vec<Constructor<T>>) {
        (self.columns, self.constructors)
    }
}

#[cfg(test)]
mod test {
    use super::Mapping;
    use crate::{
        entity::Entity,
        value::{FieldValue, Value, ValueKind},
    };

    #[derive(Default)]
    struct Person {
        id: i64,
        name: String,
    }

    impl Entity for Person {
        const TABLE_NAME: &'static str = "person";

        fn map(mapping: &mut Mapping<Self>) {
            mapping
                .column("id", "id", |m| &m.id, |m| &mut m.id)
                .column("name", "name", |m| &m.name, |m| &mut m.name)
                .constructor(&[ValueKind::Text], |args| {
                    Ok(Self {
                        id: 0,
                        name: String::from_value(args[0].clone())?,
                    })
                })
                .default_constructor();
        }
    }

    #[test]
    fn test_mapping_records_declarations_in_order() {
        let mapping = Mapping::<Person>::of();

        let columns = mapping
            .columns()
            .iter()
            .map(|e| (e.column_name, e.field_datatype))
            .collect::<Vec<_>>();

        assert_eq!(
            columns,
            vec![("id", ValueKind::Integer), ("name", ValueKind::Text)]
        );
        assert_eq!(mapping.constructors().len(), 2);
    }

    #[test]
    fn test_constructor_assignability() {
        let mapping = Mapping::<Person>::of();
        let named = &mapping.constructors()[0];

        assert!(named.accepts(&[Value::from("bob")]));
        assert!(named.accepts(&[Value::Null]));
        assert!(!named.accepts(&[Value::Integer(1)]));
        assert!(!named.accepts(&[]));

        let person = named.build(&[Value::from("bob")]).expect("Failed to build");

        assert_eq!(person.name, "bob");
        assert_eq!(person.id, 0);
    }
}
