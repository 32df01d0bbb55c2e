//! Turns result rows into entities.

use tracing::warn;

use crate::{
    context::{Context, ResolvePolicy},
    data_layer::{DataLayer, Row},
    entity::{Record, column::Assign, registry::EntityRegistry},
    error::{Error, Result},
    value::Value,
};

/// Decode every mapped column of `row` into assignments, without touching any entity.
///
/// References are resolved through `context`, and a failing reference or blob is degraded to
/// an absent field unless the context's policy is [`ResolvePolicy::Abort`].
///
/// # Errors
///
/// A column missing from the row, a plain value the field cannot hold, or (with
/// [`ResolvePolicy::Abort`]) a failed reference or blob.
pub async fn decode_row<T: 'static>(
    context: &Context,
    registry: &EntityRegistry<T>,
    db: &mut dyn DataLayer,
    mut row: Row,
) -> Result<Vec<Assign<T>>> {
    let mut assignments = Vec::with_capacity(registry.columns().len());

    for column in registry.columns() {
        let descriptor = &column.descriptor;

        let value = row.take(descriptor.column_name).ok_or_else(|| {
            Error::QueryExecution(sqlx::Error::ColumnNotFound(
                descriptor.column_name.to_string(),
            ))
        })?;

        match column.accessor.decode(context, &mut *db, value).await {
            Ok(assign) => assignments.push(assign),
            Err(e) if descriptor.is_resolved() && context.policy() == ResolvePolicy::Degrade => {
                warn!(
                    table = registry.table(),
                    column = descriptor.column_name,
                    field = descriptor.field_name,
                    "could not resolve field, leaving it empty: {e}"
                );
                assignments.push(column.accessor.absent());
            }
            Err(e) => return Err(e),
        }
    }

    Ok(assignments)
}

pub(crate) fn apply<T>(model: &mut T, assignments: Vec<Assign<T>>) {
    assignments.into_iter().for_each(|assign| assign(model));
}

/// Construct a new entity from `row`, passing `extra_args` to the first matching constructor.
///
/// # Errors
///
/// [`Error::NoMatchingConstructor`] if no constructor accepts `extra_args`, or any error of
/// the constructor or of [`decode_row`].
pub async fn instantiate<T: 'static>(
    context: &Context,
    registry: &EntityRegistry<T>,
    db: &mut dyn DataLayer,
    row: Row,
    extra_args: &[Value],
) -> Result<Record<T>> {
    let mut model = registry.select_constructor(extra_args)?.build(extra_args)?;

    let assignments = decode_row(context, registry, db, row).await?;
    apply(&mut model, assignments);

    Ok(Record::persisted(model))
}
