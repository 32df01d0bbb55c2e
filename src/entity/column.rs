use std::{any::type_name, sync::Arc};

use futures::{
    FutureExt,
    future::{self, BoxFuture},
};
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    context::Context,
    data_layer::DataLayer,
    entity::Entity,
    error::{Error, Result},
    value::{FieldValue, Value, ValueKind},
};

/// Metadata linking one field of an entity to one column of its table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub field_name: &'static str,
    /// [`ValueKind::Any`] for references, [`ValueKind::Bytes`] for serialized fields.
    pub field_datatype: ValueKind,
    pub column_name: &'static str,
    pub column_datatype: String,
    pub nullable: bool,
    pub is_primary_key: bool,
    /// The entity type a reference column resolves to.
    pub reference_type: Option<&'static str>,
    /// The type a serialized column is decoded into.
    pub serialize_type: Option<&'static str>,
}

impl ColumnDescriptor {
    /// Whether decoding this column may be degraded by [`ResolvePolicy`](crate::ResolvePolicy).
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        self.reference_type.is_some() || self.serialize_type.is_some()
    }
}

/// A deferred write of a decoded value into an entity.
pub type Assign<T> = Box<dyn FnOnce(&mut T) + Send>;

/// Reads a field as a column value, and decodes column values back into the field.
pub trait FieldAccessor<T>: Send + Sync {
    /// The value to store in the column.
    ///
    /// # Errors
    ///
    /// If the field cannot be converted, e.g. a reference to an unregistered type.
    fn read(&self, context: &Context, model: &T) -> Result<Value>;

    /// Decode `value` into an assignment of the field. References may query `db`.
    fn decode<'a>(
        &'a self,
        context: &'a Context,
        db: &'a mut dyn DataLayer,
        value: Value,
    ) -> BoxFuture<'a, Result<Assign<T>>>;

    /// An assignment leaving the field absent.
    fn absent(&self) -> Assign<T>;
}

/// A column bound to the accessor of its field.
pub struct BoundColumn<T> {
    pub descriptor: ColumnDescriptor,
    pub(crate) accessor: Arc<dyn FieldAccessor<T>>,
}

impl<T> BoundColumn<T> {
    /// # Errors
    ///
    /// See [`FieldAccessor::read`].
    pub fn read(&self, context: &Context, model: &T) -> Result<Value> {
        self.accessor.read(context, model)
    }
}

pub(crate) struct ValueAccessor<T, F> {
    pub(crate) get: fn(&T) -> &F,
    pub(crate) get_mut: fn(&mut T) -> &mut F,
}

impl<T, F> FieldAccessor<T> for ValueAccessor<T, F>
where
    T: 'static,
    F: FieldValue,
{
    fn read(&self, _context: &Context, model: &T) -> Result<Value> {
        Ok((self.get)(model).to_value())
    }

    fn decode<'a>(
        &'a self,
        _context: &'a Context,
        _db: &'a mut dyn DataLayer,
        value: Value,
    ) -> BoxFuture<'a, Result<Assign<T>>> {
        let get_mut = self.get_mut;

        future::ready(F::from_value(value).map(|value| -> Assign<T> {
            Box::new(move |model: &mut T| *get_mut(model) = value)
        }))
        .boxed()
    }

    fn absent(&self) -> Assign<T> {
        Box::new(|_: &mut T| {})
    }
}

/// A field holding another entity, stored as that entity's primary key.
pub(crate) struct ReferenceAccessor<T, R> {
    pub(crate) get: fn(&T) -> &Option<R>,
    pub(crate) get_mut: fn(&mut T) -> &mut Option<R>,
}

impl<T, R> FieldAccessor<T> for ReferenceAccessor<T, R>
where
    T: 'static,
    R: Entity,
{
    fn read(&self, context: &Context, model: &T) -> Result<Value> {
        match (self.get)(model) {
            Some(referenced) => context.registry::<R>()?.primary_key_of(context, referenced),
            None => Ok(Value::Null),
        }
    }

    fn decode<'a>(
        &'a self,
        context: &'a Context,
        db: &'a mut dyn DataLayer,
        value: Value,
    ) -> BoxFuture<'a, Result<Assign<T>>> {
        let get_mut = self.get_mut;

        async move {
            if value.is_null() {
                return Ok::<_, Error>(self.absent());
            }

            let key = value.to_string();
            let Some(referenced) = context.by_id::<R>(db, value, &[]).await? else {
                return Err(Error::MissingRow {
                    table: R::TABLE_NAME,
                    key,
                });
            };

            let referenced = referenced.into_inner();
            Ok(Box::new(move |model: &mut T| *get_mut(model) = Some(referenced)) as Assign<T>)
        }
        .boxed()
    }

    fn absent(&self) -> Assign<T> {
        let get_mut = self.get_mut;
        Box::new(move |model: &mut T| *get_mut(model) = None)
    }
}

/// A field stored as an opaque MessagePack blob.
pub(crate) struct SerializedAccessor<T, S> {
    pub(crate) get: fn(&T) -> &Option<S>,
    pub(crate) get_mut: fn(&mut T) -> &mut Option<S>,
}

impl<T, S> FieldAccessor<T> for SerializedAccessor<T, S>
where
    T: 'static,
    S: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn read(&self, _context: &Context, model: &T) -> Result<Value> {
        match (self.get)(model) {
            Some(value) => Ok(Value::Bytes(rmp_serde::to_vec_named(value)?)),
            None => Ok(Value::Null),
        }
    }

    fn decode<'a>(
        &'a self,
        _context: &'a Context,
        _db: &'a mut dyn DataLayer,
        value: Value,
    ) -> BoxFuture<'a, Result<Assign<T>>> {
        let get_mut = self.get_mut;

        let result = match value {
            Value::Null => Ok(self.absent()),
            Value::Bytes(bytes) => rmp_serde::from_slice::<S>(&bytes)
                .map(|decoded| -> Assign<T> {
                    Box::new(move |model: &mut T| *get_mut(model) = Some(decoded))
                })
                .map_err(Error::from),
            other => Err(Error::TypeMismatch(format!(
                "expected a blob holding {}, got {}",
                type_name::<S>(),
                other.type_name()
            ))),
        };

        future::ready(result).boxed()
    }

    fn absent(&self) -> Assign<T> {
        let get_mut = self.get_mut;
        Box::new(move |model: &mut T| *get_mut(model) = None)
    }
}
