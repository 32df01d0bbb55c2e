use convert_case::{Case, Casing};
use darling::{FromDeriveInput, FromField, ast::Data, util::Flag};
use proc_macro_error2::{abort, emit_error};
use proc_macro2::TokenStream;
use quote::quote;
use syn::{DeriveInput, Ident, Path, parse2};

#[derive(FromField, Debug)]
#[darling(attributes(dbobject))]
struct DeriveEntityField {
    ident: Option<Ident>,
    column: Option<String>,
    references: Flag,
    serializes: Flag,
    skip: Flag,
}

#[derive(FromDeriveInput)]
#[darling(attributes(dbobject), supports(struct_named))]
struct DeriveEntityTarget {
    ident: Ident,
    generics: syn::Generics,
    table: Option<String>,
    constructors: Option<Path>,
    data: Data<(), DeriveEntityField>,
}

enum ColumnKind {
    Plain,
    Reference,
    Serialized,
}

struct TargetColumn {
    field_ident: Ident,
    db_name: String,
    kind: ColumnKind,
}

pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input: DeriveInput = parse2(input).expect("Failed to parse derive input");

    let target = match DeriveEntityTarget::from_derive_input(&input) {
        Ok(r) => r,
        Err(e) => return e.write_errors(),
    };

    let Some(struct_data) = target.data.take_struct() else {
        abort! {
            input, "Target is not a struct.";
            note = "This macro must be run on a struct.";
        };
    };

    let columns = struct_data
        .fields
        .iter()
        .filter(|e| !e.skip.is_present())
        .map(|e| {
            let Some(ident) = &e.ident else {
                abort! {
                    e.ident, "Field has no ident.";
                    note = "This macro cannot be run on tuple structs.";
                };
            };

            let kind = match (e.references.is_present(), e.serializes.is_present()) {
                (false, false) => ColumnKind::Plain,
                (true, false) => ColumnKind::Reference,
                (false, true) => ColumnKind::Serialized,
                (true, true) => {
                    emit_error! {
                        e.serializes.span(), "Field cannot both reference an entity and be serialized.";
                        note = "Use either #[dbobject(references)] or #[dbobject(serializes)].";
                    };
                    ColumnKind::Plain
                }
            };

            TargetColumn {
                field_ident: ident.clone(),
                db_name: e.column.clone().unwrap_or_else(|| ident.to_string()),
                kind,
            }
        })
        .collect::<Vec<_>>();

    // Make sure all columns have unique names.
    if let Some(duplicate) = columns
        .iter()
        .find(|e| columns.iter().filter(|o| e.db_name.eq(&o.db_name)).count() > 1)
    {
        columns.iter().for_each(|e| {
            if columns.iter().filter(|o| e.db_name.eq(&o.db_name)).count() > 1 {
                emit_error! {
                    e.field_ident.span(), "Clashing occurrence of \"{}\" here.", e.db_name
                };
            }
        });

        abort! {
            duplicate.field_ident.span(), "Duplicate column definition \"{}\"", duplicate.db_name;
            note = "Columns must have unique names, if necessary use the #[dbobject(column = \"my_column_name\")] attribute to specify a unique name.";
        }
    }

    let column_decls = columns.iter().map(|e| {
        let ident = &e.field_ident;
        let db_name = &e.db_name;
        let field_name = ident.to_string();

        let method = match e.kind {
            ColumnKind::Plain => quote!(column),
            ColumnKind::Reference => quote!(reference),
            ColumnKind::Serialized => quote!(serialized),
        };

        quote! {
            mapping.#method(#db_name, #field_name, |m| &m.#ident, |m| &mut m.#ident);
        }
    });

    let constructors = target.constructors.map_or_else(
        || quote!(mapping.default_constructor();),
        |path| quote!(#path(mapping);),
    );

    let table_name = target
        .table
        .unwrap_or_else(|| target.ident.to_string().to_case(Case::Snake));

    let model_ident = &target.ident;
    let (impl_generics, ty_generics, where_clause) = target.generics.split_for_impl();

    quote! {
        impl #impl_generics ::dbobject::entity::Entity for #model_ident #ty_generics #where_clause {
            const TABLE_NAME: &'static str = #table_name;

            fn map(mapping: &mut ::dbobject::entity::mapping::Mapping<Self>) {
                #(
                    #column_decls
                )*

                #constructors
            }
        }
    }
}
