//! Inserting and updating entities.

use std::any::type_name;

use tracing::debug;

use crate::{
    context::Context,
    data_layer::DataLayer,
    entity::{EntityState, Record, factory, registry::EntityRegistry},
    error::{Error, Result},
    query::{
        PushToQuery,
        write::{Insert, Update},
    },
    value::Value,
};

/// `(column, value)` for every non-key column of `model`.
fn assignments<T>(
    context: &Context,
    registry: &EntityRegistry<T>,
    model: &T,
) -> Result<Vec<(&'static str, Value)>> {
    registry
        .columns()
        .iter()
        .filter(|e| !e.descriptor.is_primary_key)
        .map(|column| {
            let descriptor = &column.descriptor;
            let value = column.read(context, model)?;

            if value.is_null() && !descriptor.nullable {
                return Err(Error::NotNullViolation {
                    entity: type_name::<T>(),
                    field: descriptor.field_name,
                    table: registry.table(),
                    column: descriptor.column_name,
                });
            }

            Ok((descriptor.column_name, value))
        })
        .collect()
}

/// Insert a transient record, or update a persisted one.
///
/// A successful insert marks the record persisted, stores the generated key in it and refreshes
/// it from the row it created. If the statement itself fails the record is left as it was.
///
/// # Errors
///
/// [`Error::NotNullViolation`] before anything is executed, if a non-nullable column would be
/// set to `NULL`; otherwise any error of the statement or of the refresh. A failed refresh
/// after an insert still leaves the record persisted, so the next call updates its row.
pub async fn persist<T: 'static>(
    context: &Context,
    registry: &EntityRegistry<T>,
    db: &mut dyn DataLayer,
    record: &mut Record<T>,
) -> Result<()> {
    let assignments = assignments(context, registry, record.model())?;

    match record.state() {
        EntityState::Transient => {
            let statement = Insert::new(registry.table(), assignments).to_statement();
            let executed = db.execute(&statement).await?;

            // The row exists from here on, whatever happens to the refresh.
            record.mark_persisted();

            let key = match executed.last_insert_id {
                Some(key) => key,
                None => registry.primary_key_of(context, record.model())?,
            };
            debug!(table = registry.table(), key = %key, "inserted");

            let assign = registry
                .primary_key()
                .accessor
                .decode(context, &mut *db, key.clone())
                .await?;
            factory::apply(record.model_mut(), vec![assign]);

            refresh_with_key(context, registry, db, record, key).await
        }
        EntityState::Persisted => {
            let key = registry.primary_key_of(context, record.model())?;
            let update = Update::new(
                registry.table(),
                assignments,
                registry.primary_key().descriptor.column_name,
                key,
            );

            if update.is_noop() {
                return Ok(());
            }

            db.execute(&update.to_statement()).await?;
            Ok(())
        }
    }
}

/// Overwrite every mapped field of `record` from its row. The record's state is not changed.
///
/// # Errors
///
/// [`Error::MissingRow`] if no row exists for the record's primary key, or any decode error.
pub async fn refresh<T: 'static>(
    context: &Context,
    registry: &EntityRegistry<T>,
    db: &mut dyn DataLayer,
    record: &mut Record<T>,
) -> Result<()> {
    let key = registry.primary_key_of(context, record.model())?;
    refresh_with_key(context, registry, db, record, key).await
}

async fn refresh_with_key<T: 'static>(
    context: &Context,
    registry: &EntityRegistry<T>,
    db: &mut dyn DataLayer,
    record: &mut Record<T>,
    key: Value,
) -> Result<()> {
    let statement = registry.select_by_id_statement(key.clone());

    let Some(row) = db.fetch_all(&statement).await?.into_iter().next() else {
        return Err(Error::MissingRow {
            table: registry.table(),
            key: key.to_string(),
        });
    };

    let assignments = factory::decode_row(context, registry, db, row).await?;
    factory::apply(record.model_mut(), assignments);

    Ok(())
}
