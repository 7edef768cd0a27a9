//! Procedural macros for relmodel.
//!
//! `#[derive(Model)]` generates the per-type capability the association layer
//! relies on: static field metadata (`ModelType::info`) and positional field
//! access (`Model`). Generated code refers to `relmodel_core`, so crates using
//! the derive depend on `relmodel-core` alongside `relmodel`.

use proc_macro::TokenStream;
use quote::quote;

mod parse;

use parse::{FieldDef, ModelDef, Shape, parse_model};

/// Derive macro for the `Model` and `ModelType` traits.
///
/// The struct must also implement `Default`; unset associations are filled
/// with default-valued records.
///
/// # Attributes
///
/// - `#[rel(table = "name")]` - Override table name (defaults to the
///   pluralized snake_case struct name)
/// - `#[rel(primary_key)]` - Mark field as primary key (otherwise `id`)
/// - `#[rel(column = "name")]` - Override the column name used for key lookups
/// - `#[rel(skip)]` - Leave this field out of the model metadata
/// - `#[rel(association)]` - Treat a plain `T` field as an embedded association
/// - `#[rel(references = "field[:through_field]")]` - Explicit reference key
/// - `#[rel(foreign_key = "field[:through_field]")]` - Explicit foreign key
/// - `#[rel(through = "table")]` - Many-to-many join table
/// - `#[rel(autosave)]` - Cascade saves and deletes
///
/// Fields of type `Option<Box<T>>`, `Vec<T>` and `Option<Vec<T>>` are
/// associations automatically when `T` is not a scalar type.
///
/// # Example
///
/// ```ignore
/// use relmodel::prelude::*;
///
/// #[derive(Model, Default)]
/// struct User {
///     id: i64,
///     team_id: i64,
///     team: Option<Box<Team>>,
///     #[rel(through = "user_roles")]
///     roles: Vec<Role>,
/// }
/// ```
#[proc_macro_derive(Model, attributes(rel))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as syn::DeriveInput);

    let model = match parse_model(&input) {
        Ok(m) => m,
        Err(e) => return e.to_compile_error().into(),
    };

    generate_model_impl(&model).into()
}

/// Generate the `ModelType` and `Model` implementations.
fn generate_model_impl(model: &ModelDef) -> proc_macro2::TokenStream {
    let name = &model.name;
    let name_str = name.to_string();
    let table_name = &model.table_name;

    let fields: Vec<&FieldDef> = model.model_fields().collect();
    let field_infos = fields.iter().map(|f| generate_field_info(f));

    let mut value_arms = Vec::new();
    let mut set_value_arms = Vec::new();
    let mut association_arms = Vec::new();
    let mut association_mut_arms = Vec::new();

    for (position, field) in fields.iter().enumerate() {
        let ident = &field.name;
        match &field.association {
            None => {
                value_arms.push(quote! {
                    #position => ::std::option::Option::Some(
                        relmodel_core::Value::from(::std::clone::Clone::clone(&self.#ident))
                    ),
                });
                set_value_arms.push(quote! {
                    #position => {
                        self.#ident = ::std::convert::TryInto::try_into(value)?;
                        ::std::result::Result::Ok(())
                    }
                });
            }
            Some(assoc) => {
                let (view, view_mut) = match assoc.shape {
                    Shape::Embedded => (
                        quote! { relmodel_core::AssociationRef::Embedded(&self.#ident) },
                        quote! { relmodel_core::AssociationMut::Embedded(&mut self.#ident) },
                    ),
                    Shape::Pointer => (
                        quote! {
                            relmodel_core::AssociationRef::Pointer(
                                relmodel_core::PointerSlot::target(&self.#ident)
                            )
                        },
                        quote! { relmodel_core::AssociationMut::Pointer(&mut self.#ident) },
                    ),
                    Shape::Sequence | Shape::OptionalSequence => (
                        quote! {
                            relmodel_core::AssociationRef::Many(
                                relmodel_core::SequenceSlot::sequence(&self.#ident)
                            )
                        },
                        quote! { relmodel_core::AssociationMut::Many(&mut self.#ident) },
                    ),
                };
                association_arms.push(quote! {
                    #position => ::std::option::Option::Some(#view),
                });
                association_mut_arms.push(quote! {
                    #position => ::std::option::Option::Some(#view_mut),
                });
            }
        }
    }

    quote! {
        impl relmodel_core::ModelType for #name {
            fn info() -> &'static relmodel_core::ModelInfo {
                static INFO: relmodel_core::ModelInfo = relmodel_core::ModelInfo {
                    name: #name_str,
                    table_name: #table_name,
                    type_id: ::std::any::TypeId::of::<#name>,
                    fields: &[
                        #(#field_infos),*
                    ],
                };
                &INFO
            }
        }

        impl relmodel_core::Model for #name {
            fn model_info(&self) -> &'static relmodel_core::ModelInfo {
                <Self as relmodel_core::ModelType>::info()
            }

            fn value(&self, position: usize) -> ::std::option::Option<relmodel_core::Value> {
                match position {
                    #(#value_arms)*
                    _ => ::std::option::Option::None,
                }
            }

            fn set_value(
                &mut self,
                position: usize,
                value: relmodel_core::Value,
            ) -> relmodel_core::Result<()> {
                match position {
                    #(#set_value_arms)*
                    _ => ::std::result::Result::Err(
                        relmodel_core::SchemaError::field_not_found(
                            #name_str,
                            ::std::string::ToString::to_string(&position),
                        )
                        .into(),
                    ),
                }
            }

            fn association(
                &self,
                position: usize,
            ) -> ::std::option::Option<relmodel_core::AssociationRef<'_>> {
                match position {
                    #(#association_arms)*
                    _ => ::std::option::Option::None,
                }
            }

            fn association_mut(
                &mut self,
                position: usize,
            ) -> ::std::option::Option<relmodel_core::AssociationMut<'_>> {
                match position {
                    #(#association_mut_arms)*
                    _ => ::std::option::Option::None,
                }
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
                self
            }
        }
    }
}

/// Generate the `FieldInfo` builder expression for one field.
fn generate_field_info(field: &FieldDef) -> proc_macro2::TokenStream {
    let name = field.name.to_string();
    let column = &field.column_name;
    let primary_key = field.primary_key;

    let Some(assoc) = &field.association else {
        return quote! {
            relmodel_core::FieldInfo::new(#name, #column, relmodel_core::FieldType::scalar())
                .primary_key(#primary_key)
        };
    };

    let target = &assoc.target;
    let wrappers = match assoc.shape {
        Shape::Embedded => quote! { &[] },
        Shape::Pointer => quote! { &[relmodel_core::TypeWrapper::Pointer] },
        Shape::Sequence => quote! { &[relmodel_core::TypeWrapper::Sequence] },
        Shape::OptionalSequence => quote! {
            &[relmodel_core::TypeWrapper::Pointer, relmodel_core::TypeWrapper::Sequence]
        },
    };

    let references = assoc
        .references
        .as_ref()
        .map(|tag| quote! { .references(#tag) });
    let foreign_key = assoc
        .foreign_key
        .as_ref()
        .map(|tag| quote! { .foreign_key(#tag) });
    let through = assoc.through.as_ref().map(|table| quote! { .through(#table) });
    let autosave = assoc.autosave;

    quote! {
        relmodel_core::FieldInfo::new(
            #name,
            #column,
            relmodel_core::FieldType::association(
                #wrappers,
                <#target as relmodel_core::ModelType>::info,
            ),
        )
        #references
        #foreign_key
        #through
        .autosave(#autosave)
    }
}
