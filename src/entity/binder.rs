//! Resolves an entity's declared mapping against the columns of its table.

use std::collections::HashSet;

use tracing::warn;

use crate::{
    entity::{column::BoundColumn, column::ColumnDescriptor, mapping::DeclaredColumn},
    error::{Error, Result},
    schema::TableColumn,
    value::is_blob_type,
};

fn bind_column<T>(
    declared: DeclaredColumn<T>,
    table: &str,
    columns: &[TableColumn],
) -> Result<BoundColumn<T>> {
    let Some(column) = columns.iter().find(|e| e.name == declared.column_name) else {
        return Err(Error::Binding(format!(
            "unknown column `{}` for field {}, table `{table}` has no such column",
            declared.column_name, declared.field_name
        )));
    };

    if let Some(serialize_type) = declared.serialize_type {
        if !is_blob_type(&column.datatype) {
            return Err(Error::Binding(format!(
                "serialized column `{table}`.`{}` (field {}, {serialize_type}) must be blob-typed, got {}",
                column.name, declared.field_name, column.datatype
            )));
        }
    } else if declared.reference_type.is_none()
        && !declared.field_datatype.compatible_with_column(&column.datatype)
    {
        warn!(
            table,
            column = %column.name,
            field = declared.field_name,
            "field of kind {} may not hold values of column type {}",
            declared.field_datatype,
            column.datatype
        );
    }

    Ok(BoundColumn {
        descriptor: ColumnDescriptor {
            field_name: declared.field_name,
            field_datatype: declared.field_datatype,
            column_name: declared.column_name,
            column_datatype: column.datatype.clone(),
            nullable: column.nullable,
            is_primary_key: column.is_primary_key,
            reference_type: declared.reference_type,
            serialize_type: declared.serialize_type,
        },
        accessor: declared.accessor,
    })
}

/// Bind every declared column to the matching column of `table`, in declaration order.
///
/// Returns the bound columns and the index of the primary key among them.
///
/// # Errors
///
/// [`Error::Binding`] if a column is declared twice or absent from the table, a serialized
/// column is not blob-typed, or the columns do not include exactly one primary key.
pub fn bind<T>(
    declared: Vec<DeclaredColumn<T>>,
    table: &str,
    columns: &[TableColumn],
) -> Result<(Vec<BoundColumn<T>>, usize)> {
    let mut seen = HashSet::new();

    if let Some(duplicate) = declared.iter().find(|e| !seen.insert(e.column_name)) {
        return Err(Error::Binding(format!(
            "column `{}` of `{table}` is mapped more than once",
            duplicate.column_name
        )));
    }

    let bound = declared
        .into_iter()
        .map(|e| bind_column(e, table, columns))
        .collect::<Result<Vec<_>>>()?;

    let primary_keys = bound
        .iter()
        .enumerate()
        .filter(|(_, e)| e.descriptor.is_primary_key)
        .map(|(i, _)| i)
        .collect::<Vec<_>>();

    match primary_keys.as_slice() {
        [primary_key] => Ok((bound, *primary_key)),
        [] => Err(Error::Binding(format!(
            "`{table}` has no mapped primary key column"
        ))),
        _ => Err(Error::Binding(format!(
            "`{table}` maps a composite primary key, only single-column keys are supported"
        ))),
    }
}
