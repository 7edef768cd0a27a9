//! Parsing logic for the Model derive macro.
//!
//! Extracts struct-level and field-level `#[rel(...)]` attributes and the
//! shape of association fields to build `ModelDef` and `FieldDef`.

use heck::ToSnakeCase;
use proc_macro2::Span;
use syn::{
    Attribute, Data, DeriveInput, Error, Field, Fields, GenericArgument, Ident, Lit, LitBool,
    PathArguments, Result, Type,
};

/// Parsed model definition from a struct with `#[derive(Model)]`.
#[derive(Debug)]
pub struct ModelDef {
    /// The struct name (e.g., `User`).
    pub name: Ident,
    /// The table name (e.g., `"users"`).
    pub table_name: String,
    /// Parsed field definitions, including skipped ones.
    pub fields: Vec<FieldDef>,
}

impl ModelDef {
    /// Fields that appear in the model metadata, in position order.
    pub fn model_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| !f.skip)
    }
}

/// Parsed field definition from a struct field.
#[derive(Debug)]
pub struct FieldDef {
    /// The Rust field name (e.g., `team_id`).
    pub name: Ident,
    /// Column name used for key lookups.
    pub column_name: String,
    /// Whether this field is the primary key.
    pub primary_key: bool,
    /// Left out of the model metadata entirely.
    pub skip: bool,
    /// Set when the field holds records rather than a column value.
    pub association: Option<AssociationDef>,
}

/// Parsed association field.
#[derive(Debug)]
pub struct AssociationDef {
    pub shape: Shape,
    /// The record type after stripping `Option`, `Box` and `Vec`.
    pub target: Type,
    pub references: Option<String>,
    pub foreign_key: Option<String>,
    pub through: Option<String>,
    pub autosave: bool,
}

/// Supported association field shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// `T`
    Embedded,
    /// `Option<Box<T>>`
    Pointer,
    /// `Vec<T>`
    Sequence,
    /// `Option<Vec<T>>`
    OptionalSequence,
}

impl Shape {
    pub fn is_sequence(self) -> bool {
        matches!(self, Shape::Sequence | Shape::OptionalSequence)
    }
}

/// Parse a `DeriveInput` into a `ModelDef`.
pub fn parse_model(input: &DeriveInput) -> Result<ModelDef> {
    let name = input.ident.clone();

    if !input.generics.params.is_empty() {
        return Err(Error::new_spanned(
            &input.generics,
            "Model cannot be derived for generic structs",
        ));
    }

    let table_name = parse_struct_attrs(&input.attrs)?.unwrap_or_else(|| derive_table_name(&name));

    let fields = match &input.data {
        Data::Struct(data) => parse_fields(&data.fields)?,
        Data::Enum(_) => {
            return Err(Error::new_spanned(
                input,
                "Model can only be derived for structs, not enums",
            ));
        }
        Data::Union(_) => {
            return Err(Error::new_spanned(
                input,
                "Model can only be derived for structs, not unions",
            ));
        }
    };

    Ok(ModelDef {
        name,
        table_name,
        fields,
    })
}

/// Parse struct-level `#[rel(...)]` attributes, returning the table override.
fn parse_struct_attrs(attrs: &[Attribute]) -> Result<Option<String>> {
    let mut table_name: Option<String> = None;

    for attr in attrs {
        if !attr.path().is_ident("rel") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                if table_name.is_some() {
                    return Err(Error::new_spanned(
                        meta.path,
                        "duplicate rel attribute: table",
                    ));
                }
                table_name = Some(parse_string(&meta, "table")?);
                Ok(())
            } else {
                Err(meta.error("unknown rel struct attribute"))
            }
        })?;
    }

    Ok(table_name)
}

/// Default table name: pluralized snake_case of the struct name.
pub fn derive_table_name(name: &Ident) -> String {
    let snake = name.to_string().to_snake_case();
    pluralizer::pluralize(&snake, 2, false)
}

/// Parse all fields from a struct.
fn parse_fields(fields: &Fields) -> Result<Vec<FieldDef>> {
    match fields {
        Fields::Named(named) => named.named.iter().map(parse_field).collect(),
        Fields::Unnamed(_) => Err(Error::new(
            Span::call_site(),
            "Model requires a struct with named fields, not a tuple struct",
        )),
        Fields::Unit => Err(Error::new(
            Span::call_site(),
            "Model requires a struct with fields, not a unit struct",
        )),
    }
}

/// Intermediate struct for collecting field attributes.
#[derive(Default)]
struct FieldAttrs {
    column: Option<String>,
    primary_key: bool,
    skip: bool,
    association: bool,
    references: Option<String>,
    foreign_key: Option<String>,
    through: Option<String>,
    autosave: bool,
}

impl FieldAttrs {
    fn has_association_keys(&self) -> bool {
        self.association
            || self.references.is_some()
            || self.foreign_key.is_some()
            || self.through.is_some()
            || self.autosave
    }
}

/// Parse a single field and its attributes.
fn parse_field(field: &Field) -> Result<FieldDef> {
    let name = field
        .ident
        .clone()
        .ok_or_else(|| Error::new_spanned(field, "expected named field"))?;

    let attrs = parse_field_attrs(&field.attrs)?;

    if attrs.skip && attrs.has_association_keys() {
        return Err(Error::new_spanned(
            &name,
            "skipped fields cannot carry association attributes",
        ));
    }

    let association = if attrs.skip {
        None
    } else {
        parse_association(&field.ty, &attrs)?
    };

    if let (None, false, Some(scalar)) = (&association, attrs.skip, unmapped_scalar(&field.ty)) {
        return Err(Error::new_spanned(
            &field.ty,
            format!(
                "`{scalar}` has no relmodel Value conversion; use i8..i64 or u8..u32, \
                 or mark the field #[rel(skip)]"
            ),
        ));
    }

    if association.is_some() && attrs.primary_key {
        return Err(Error::new_spanned(
            &name,
            "an association field cannot be the primary key",
        ));
    }

    let column_name = attrs.column.unwrap_or_else(|| name.to_string());

    Ok(FieldDef {
        name,
        column_name,
        primary_key: attrs.primary_key,
        skip: attrs.skip,
        association,
    })
}

/// Parse all `#[rel(...)]` attributes on a field.
fn parse_field_attrs(attrs: &[Attribute]) -> Result<FieldAttrs> {
    let mut result = FieldAttrs::default();

    for attr in attrs {
        if !attr.path().is_ident("rel") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            let path = &meta.path;

            if path.is_ident("primary_key") {
                result.primary_key = true;
            } else if path.is_ident("skip") {
                result.skip = true;
            } else if path.is_ident("association") {
                result.association = true;
            } else if path.is_ident("column") {
                result.column = Some(parse_string(&meta, "column")?);
            } else if path.is_ident("references") {
                result.references = Some(parse_key_tag(&meta, "references")?);
            } else if path.is_ident("foreign_key") {
                result.foreign_key = Some(parse_key_tag(&meta, "foreign_key")?);
            } else if path.is_ident("through") {
                let table = parse_string(&meta, "through")?;
                if table.is_empty() {
                    return Err(meta.error("through table name cannot be empty"));
                }
                result.through = Some(table);
            } else if path.is_ident("autosave") {
                // Flag form `autosave`, or `autosave = true/false`
                result.autosave = if meta.input.peek(syn::Token![=]) {
                    let value: LitBool = meta.value()?.parse()?;
                    value.value
                } else {
                    true
                };
            } else {
                return Err(meta.error("unknown rel field attribute"));
            }
            Ok(())
        })?;
    }

    Ok(result)
}

fn parse_string(meta: &syn::meta::ParseNestedMeta<'_>, key: &str) -> Result<String> {
    let value: Lit = meta.value()?.parse()?;
    if let Lit::Str(lit_str) = value {
        Ok(lit_str.value())
    } else {
        Err(Error::new_spanned(
            value,
            format!("expected string literal for {key}"),
        ))
    }
}

/// `field` or `field:through_field`.
fn parse_key_tag(meta: &syn::meta::ParseNestedMeta<'_>, key: &str) -> Result<String> {
    let tag = parse_string(meta, key)?;
    if tag.is_empty() || tag.starts_with(':') {
        return Err(meta.error(format!(
            "{key} must be in format 'field' or 'field:through_field'"
        )));
    }
    Ok(tag)
}

/// Decide whether a field is an association and, if so, its shape.
///
/// Marked fields must have a supported shape. Unmarked fields are
/// associations only when their type is `Option<Box<T>>`, `Vec<T>` or
/// `Option<Vec<T>>` with a non-scalar `T`.
fn parse_association(ty: &Type, attrs: &FieldAttrs) -> Result<Option<AssociationDef>> {
    let explicit = attrs.has_association_keys();

    let detected = detect_shape(ty);
    if detected
        .as_ref()
        .is_some_and(|(_, target)| is_scalar_type(target))
    {
        if explicit {
            return Err(Error::new_spanned(
                ty,
                "association target must be a model type, not a scalar",
            ));
        }
        return Ok(None);
    }

    let detected = match detected {
        Some((Shape::Embedded, _)) if !explicit => None,
        other => other,
    };

    let Some((shape, target)) = detected else {
        if explicit {
            return Err(Error::new_spanned(
                ty,
                "association fields must be T, Option<Box<T>>, Vec<T> or Option<Vec<T>>",
            ));
        }
        return Ok(None);
    };

    if attrs.through.is_some() && !shape.is_sequence() {
        return Err(Error::new_spanned(
            ty,
            "through is only valid on Vec<T> or Option<Vec<T>> associations",
        ));
    }

    Ok(Some(AssociationDef {
        shape,
        target,
        references: attrs.references.clone(),
        foreign_key: attrs.foreign_key.clone(),
        through: attrs.through.clone(),
        autosave: attrs.autosave,
    }))
}

/// Classify a field type by its wrapper layers.
pub fn detect_shape(ty: &Type) -> Option<(Shape, Type)> {
    if let Some(inner) = single_generic_arg(ty, "Option") {
        if let Some(target) = single_generic_arg(inner, "Box") {
            return Some((Shape::Pointer, target.clone()));
        }
        if let Some(target) = single_generic_arg(inner, "Vec") {
            return Some((Shape::OptionalSequence, target.clone()));
        }
        // Option<T> without a Box is not a supported association shape
        return None;
    }

    if let Some(target) = single_generic_arg(ty, "Vec") {
        return Some((Shape::Sequence, target.clone()));
    }

    match ty {
        Type::Path(type_path) if type_path.qself.is_none() => Some((Shape::Embedded, ty.clone())),
        _ => None,
    }
}

/// The `T` in `Wrapper<T>`, matched on the last path segment.
fn single_generic_arg<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    if args.args.len() != 1 {
        return None;
    }
    match args.args.first()? {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}

/// Types that convert to a single `Value` and never name a model.
pub fn is_scalar_type(ty: &Type) -> bool {
    const SCALARS: &[&str] = &[
        "bool", "i8", "i16", "i32", "i64", "u8", "u16", "u32", "f32", "f64", "String", "str",
        "Value",
    ];

    if unmapped_scalar(ty).is_some() {
        return true;
    }

    match ty {
        Type::Path(type_path) => type_path
            .path
            .segments
            .last()
            .is_some_and(|segment| SCALARS.iter().any(|s| segment.ident == *s)),
        Type::Reference(_) | Type::Array(_) | Type::Tuple(_) | Type::Slice(_) => true,
        _ => false,
    }
}

/// Scalar types with no lossless `Value` mapping, looked up through
/// `Option<T>` and `Vec<T>`.
pub fn unmapped_scalar(ty: &Type) -> Option<&Ident> {
    const UNMAPPED: &[&str] = &["u64", "u128", "usize", "i128", "isize", "char"];

    let inner = single_generic_arg(ty, "Option")
        .or_else(|| single_generic_arg(ty, "Vec"))
        .unwrap_or(ty);
    let Type::Path(type_path) = inner else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    UNMAPPED
        .iter()
        .any(|name| segment.ident == *name)
        .then_some(&segment.ident)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quote::ToTokens;
    use syn::parse_quote;

    fn target_name(def: &AssociationDef) -> String {
        def.target.to_token_stream().to_string()
    }

    #[test]
    fn test_derive_table_name() {
        assert_eq!(derive_table_name(&parse_quote!(User)), "users");
        assert_eq!(derive_table_name(&parse_quote!(BlogPost)), "blog_posts");
        assert_eq!(derive_table_name(&parse_quote!(Category)), "categories");
    }

    #[test]
    fn test_parse_model_table_override() {
        let input: DeriveInput = parse_quote! {
            #[rel(table = "people")]
            struct Person {
                #[rel(primary_key)]
                id: i64,
                name: String,
            }
        };

        let def = parse_model(&input).unwrap();
        assert_eq!(def.table_name, "people");
        assert!(def.fields[0].primary_key);
        assert!(def.fields.iter().all(|f| f.association.is_none()));
    }

    #[test]
    fn test_unknown_struct_attr_errors() {
        let input: DeriveInput = parse_quote! {
            #[rel(not_a_real_key = "x")]
            struct Event {
                id: i64,
            }
        };

        let err = parse_model(&input).unwrap_err();
        assert!(err.to_string().contains("unknown rel struct attribute"), "{err}");
    }

    #[test]
    fn test_shapes_detected_from_types() {
        let input: DeriveInput = parse_quote! {
            struct User {
                id: i64,
                nickname: Option<String>,
                tags: Vec<String>,
                avatar: Vec<u8>,
                team: Option<Box<Team>>,
                posts: Vec<Post>,
                roles: Option<Vec<Role>>,
                address: Address,
            }
        };

        let def = parse_model(&input).unwrap();
        let shapes: Vec<Option<Shape>> = def
            .fields
            .iter()
            .map(|f| f.association.as_ref().map(|a| a.shape))
            .collect();
        assert_eq!(
            shapes,
            vec![
                None,
                None,
                None,
                None,
                Some(Shape::Pointer),
                Some(Shape::Sequence),
                Some(Shape::OptionalSequence),
                None,
            ]
        );

        let team = def.fields[4].association.as_ref().unwrap();
        assert_eq!(target_name(team), "Team");
    }

    #[test]
    fn test_explicit_embedded_association() {
        let input: DeriveInput = parse_quote! {
            struct User {
                id: i64,
                #[rel(association, autosave)]
                address: Address,
            }
        };

        let def = parse_model(&input).unwrap();
        let address = def.fields[1].association.as_ref().unwrap();
        assert_eq!(address.shape, Shape::Embedded);
        assert!(address.autosave);
    }

    #[test]
    fn test_association_keys() {
        let input: DeriveInput = parse_quote! {
            struct User {
                id: i64,
                #[rel(through = "user_roles", references = "id:user_id", foreign_key = "id:role_id")]
                roles: Vec<Role>,
                #[rel(autosave = false, column = "owner")]
                team: Option<Box<Team>>,
            }
        };

        let def = parse_model(&input).unwrap();
        let roles = def.fields[1].association.as_ref().unwrap();
        assert_eq!(roles.through.as_deref(), Some("user_roles"));
        assert_eq!(roles.references.as_deref(), Some("id:user_id"));
        assert_eq!(roles.foreign_key.as_deref(), Some("id:role_id"));

        let team = &def.fields[2];
        assert_eq!(team.column_name, "owner");
        assert!(!team.association.as_ref().unwrap().autosave);
    }

    #[test]
    fn test_unmapped_scalars_rejected_with_clear_error() {
        let inputs: [DeriveInput; 4] = [
            parse_quote! { struct Counter { id: i64, hits: u64 } },
            parse_quote! { struct Counter { id: i64, hits: Vec<u64> } },
            parse_quote! { struct Counter { id: i64, hits: Option<usize> } },
            parse_quote! { struct Counter { id: i64, initial: char } },
        ];
        for input in inputs {
            let err = parse_model(&input).unwrap_err();
            assert!(err.to_string().contains("no relmodel Value conversion"), "{err}");
        }
    }

    #[test]
    fn test_unmapped_scalar_allowed_when_skipped() {
        let input: DeriveInput = parse_quote! {
            struct Counter {
                id: i64,
                #[rel(skip)]
                hits: Vec<u64>,
            }
        };

        let def = parse_model(&input).unwrap();
        assert_eq!(def.model_fields().count(), 1);
    }

    #[test]
    fn test_unmapped_scalar_cannot_be_association_target() {
        let input: DeriveInput = parse_quote! {
            struct Counter {
                id: i64,
                #[rel(through = "counter_hits")]
                hits: Vec<i128>,
            }
        };

        let err = parse_model(&input).unwrap_err();
        assert!(err.to_string().contains("not a scalar"), "{err}");
    }

    #[test]
    fn test_through_requires_sequence() {
        let input: DeriveInput = parse_quote! {
            struct User {
                id: i64,
                #[rel(through = "user_teams")]
                team: Option<Box<Team>>,
            }
        };

        let err = parse_model(&input).unwrap_err();
        assert!(err.to_string().contains("through is only valid"), "{err}");
    }

    #[test]
    fn test_skip_rejects_association_keys() {
        let input: DeriveInput = parse_quote! {
            struct User {
                id: i64,
                #[rel(skip, references = "team_id")]
                team: Option<Box<Team>>,
            }
        };

        let err = parse_model(&input).unwrap_err();
        assert!(err.to_string().contains("skipped fields"), "{err}");
    }

    #[test]
    fn test_skip_excludes_field_from_model() {
        let input: DeriveInput = parse_quote! {
            struct User {
                id: i64,
                #[rel(skip)]
                cache: Option<Box<Team>>,
                name: String,
            }
        };

        let def = parse_model(&input).unwrap();
        let names: Vec<String> = def.model_fields().map(|f| f.name.to_string()).collect();
        assert_eq!(names, vec!["id", "name"]);
    }

    #[test]
    fn test_unsupported_shape_errors() {
        let input: DeriveInput = parse_quote! {
            struct User {
                id: i64,
                #[rel(association)]
                team: Option<Team>,
            }
        };

        let err = parse_model(&input).unwrap_err();
        assert!(err.to_string().contains("association fields must be"), "{err}");
    }

    #[test]
    fn test_scalar_target_errors_when_marked() {
        let input: DeriveInput = parse_quote! {
            struct User {
                id: i64,
                #[rel(association)]
                tags: Vec<String>,
            }
        };

        let err = parse_model(&input).unwrap_err();
        assert!(err.to_string().contains("not a scalar"), "{err}");
    }

    #[test]
    fn test_malformed_key_tag_errors() {
        let input: DeriveInput = parse_quote! {
            struct User {
                id: i64,
                #[rel(references = ":user_id")]
                team: Option<Box<Team>>,
            }
        };

        let err = parse_model(&input).unwrap_err();
        assert!(err.to_string().contains("field:through_field"), "{err}");
    }

    #[test]
    fn test_enum_and_generics_rejected() {
        let input: DeriveInput = parse_quote! {
            enum Kind { A, B }
        };
        assert!(parse_model(&input).is_err());

        let input: DeriveInput = parse_quote! {
            struct Wrapper<T> { id: i64, inner: Vec<T> }
        };
        let err = parse_model(&input).unwrap_err();
        assert!(err.to_string().contains("generic"), "{err}");
    }

    #[test]
    fn test_unknown_field_attr_errors() {
        let input: DeriveInput = parse_quote! {
            struct User {
                #[rel(nullable)]
                id: i64,
            }
        };

        let err = parse_model(&input).unwrap_err();
        assert!(err.to_string().contains("unknown rel field attribute"), "{err}");
    }
}
