mod entity;

use entity::derive_entity;
use proc_macro::TokenStream;
use proc_macro_error2::proc_macro_error;

/// Implement `dbobject::Entity` for a struct with named fields.
///
/// Struct attributes:
///
/// - `#[dbobject(table = "people")]` sets the table name, defaulting to the snake-cased struct
///   name.
/// - `#[dbobject(constructors = "path::to::fn")]` names a `fn(&mut Mapping<Self>)` declaring the
///   constructors. Defaults to the `Default` implementation of the struct.
///
/// Field attributes:
///
/// - `#[dbobject(column = "name")]` maps the field to another column than its own name.
/// - `#[dbobject(references)]` stores an `Option<E>` field as the primary key of entity `E`.
/// - `#[dbobject(serializes)]` stores an `Option<S>` field as a MessagePack blob.
/// - `#[dbobject(skip)]` leaves the field unmapped.
#[proc_macro_error]
#[proc_macro_derive(Entity, attributes(dbobject))]
pub fn entity(input: TokenStream) -> TokenStream {
    derive_entity(input.into()).into()
}
