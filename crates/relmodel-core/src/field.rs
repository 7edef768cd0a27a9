//! Field metadata and association tags.

use std::fmt;

use crate::model::ModelInfo;

/// One layer of indirection around an association target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeWrapper {
    /// Optional heap indirection (`Option<Box<T>>`, or the `Option` of
    /// `Option<Vec<T>>`).
    Pointer,
    /// A sequence of records (`Vec<T>`).
    Sequence,
}

/// The declared shape of a field.
///
/// Scalar fields have no target. Association fields record their wrapper
/// layers outermost first, plus an accessor for the target model's static
/// metadata:
///
/// | Rust type        | wrappers               |
/// |------------------|------------------------|
/// | `T`              | `[]`                   |
/// | `Option<Box<T>>` | `[Pointer]`            |
/// | `Vec<T>`         | `[Sequence]`           |
/// | `Option<Vec<T>>` | `[Pointer, Sequence]`  |
#[derive(Clone, Copy)]
pub struct FieldType {
    pub wrappers: &'static [TypeWrapper],
    pub target: Option<fn() -> &'static ModelInfo>,
}

impl FieldType {
    /// A plain column value.
    pub const fn scalar() -> Self {
        Self {
            wrappers: &[],
            target: None,
        }
    }

    /// A field holding one or more records of the target model.
    pub const fn association(
        wrappers: &'static [TypeWrapper],
        target: fn() -> &'static ModelInfo,
    ) -> Self {
        Self {
            wrappers,
            target: Some(target),
        }
    }

    pub const fn is_association(&self) -> bool {
        self.target.is_some()
    }

    /// True for `Vec<T>` and `Option<Vec<T>>` fields.
    ///
    /// Only the declared field type counts: a sequence directly, or a
    /// sequence behind a single pointer.
    pub fn is_sequence(&self) -> bool {
        matches!(
            self.wrappers,
            [TypeWrapper::Sequence, ..] | [TypeWrapper::Pointer, TypeWrapper::Sequence, ..]
        )
    }

    /// True when the outermost layer is optional.
    pub fn is_pointer(&self) -> bool {
        matches!(self.wrappers.first(), Some(TypeWrapper::Pointer))
    }

    /// The target model with every pointer and sequence layer stripped.
    pub fn target_info(&self) -> Option<&'static ModelInfo> {
        self.target.map(|target| target())
    }
}

impl PartialEq for FieldType {
    fn eq(&self, other: &Self) -> bool {
        self.wrappers == other.wrappers
            && self.target_info().map(|info| info.name) == other.target_info().map(|info| info.name)
    }
}

impl fmt::Debug for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldType")
            .field("wrappers", &self.wrappers)
            .field("target", &self.target_info().map(|info| info.name))
            .finish()
    }
}

/// Metadata about a model field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldInfo {
    /// Rust field name
    pub name: &'static str,
    /// Column name used for key lookups (defaults to the field name)
    pub column_name: &'static str,
    /// Declared shape of the field
    pub ty: FieldType,
    /// Whether this is the primary key
    pub primary_key: bool,
    /// Explicit reference key, `field` or `field:through_field`
    pub references: Option<&'static str>,
    /// Explicit foreign key, `field` or `field:through_field`
    pub foreign_key: Option<&'static str>,
    /// Join table for many-to-many associations
    pub through: Option<&'static str>,
    /// Cascade saves and deletes to this association
    pub autosave: bool,
}

impl FieldInfo {
    /// Create a new field info with minimal required data.
    pub const fn new(name: &'static str, column_name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            column_name,
            ty,
            primary_key: false,
            references: None,
            foreign_key: None,
            through: None,
            autosave: false,
        }
    }

    /// Set the column name.
    pub const fn column(mut self, name: &'static str) -> Self {
        self.column_name = name;
        self
    }

    /// Set primary key flag.
    pub const fn primary_key(mut self, value: bool) -> Self {
        self.primary_key = value;
        self
    }

    /// Set the reference key tag (`field` or `field:through_field`).
    pub const fn references(mut self, tag: &'static str) -> Self {
        self.references = Some(tag);
        self
    }

    /// Set the foreign key tag (`field` or `field:through_field`).
    pub const fn foreign_key(mut self, tag: &'static str) -> Self {
        self.foreign_key = Some(tag);
        self
    }

    /// Set the many-to-many join table.
    pub const fn through(mut self, table: &'static str) -> Self {
        self.through = Some(table);
        self
    }

    pub const fn autosave(mut self, value: bool) -> Self {
        self.autosave = value;
        self
    }

    pub const fn is_association(&self) -> bool {
        self.ty.is_association()
    }

    /// Parsed reference key tag; empty tags count as absent.
    pub fn reference_key(&self) -> KeyTag<'static> {
        KeyTag::parse(self.references)
    }

    /// Parsed foreign key tag; empty tags count as absent.
    pub fn foreign_key_tag(&self) -> KeyTag<'static> {
        KeyTag::parse(self.foreign_key)
    }
}

/// A `field[:through_field]` key tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyTag<'a> {
    pub field: Option<&'a str>,
    pub through: Option<&'a str>,
}

impl<'a> KeyTag<'a> {
    /// Split a key tag on `:`.
    ///
    /// Exactly one colon yields a field and a through field. Any other
    /// number keeps only the first segment.
    pub fn parse(tag: Option<&'a str>) -> Self {
        let Some(tag) = tag else {
            return Self::default();
        };

        let mut parts = tag.split(':');
        let field = parts.next().unwrap_or_default();
        let through = match (parts.next(), parts.next()) {
            (Some(through), None) => Some(through),
            _ => None,
        };

        Self {
            field: non_empty(field),
            through: through.and_then(non_empty),
        }
    }
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() { None } else { Some(s) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_tag_field_only() {
        let tag = KeyTag::parse(Some("team_id"));
        assert_eq!(tag.field, Some("team_id"));
        assert_eq!(tag.through, None);
    }

    #[test]
    fn key_tag_with_through() {
        let tag = KeyTag::parse(Some("id:user_id"));
        assert_eq!(tag.field, Some("id"));
        assert_eq!(tag.through, Some("user_id"));
    }

    #[test]
    fn key_tag_extra_colons_keep_first_segment() {
        let tag = KeyTag::parse(Some("a:b:c"));
        assert_eq!(tag.field, Some("a"));
        assert_eq!(tag.through, None);
    }

    #[test]
    fn key_tag_empty_is_absent() {
        assert_eq!(KeyTag::parse(None), KeyTag::default());
        assert_eq!(KeyTag::parse(Some("")), KeyTag::default());
    }

    #[test]
    fn field_type_shapes() {
        assert!(!FieldType::scalar().is_association());
        assert!(!FieldType::scalar().is_sequence());

        let wrappers: &[TypeWrapper] = &[TypeWrapper::Pointer, TypeWrapper::Sequence];
        let ty = FieldType {
            wrappers,
            target: None,
        };
        assert!(ty.is_sequence());
        assert!(ty.is_pointer());

        let ty = FieldType {
            wrappers: &[TypeWrapper::Pointer],
            target: None,
        };
        assert!(!ty.is_sequence());
        assert!(ty.is_pointer());
    }

    #[test]
    fn field_info_builder() {
        let field = FieldInfo::new("posts", "posts", FieldType::scalar())
            .column("post_list")
            .references("id:user_id")
            .foreign_key("id:post_id")
            .through("user_posts")
            .autosave(true);

        assert_eq!(field.column_name, "post_list");
        assert_eq!(field.reference_key().through, Some("user_id"));
        assert_eq!(field.foreign_key_tag().field, Some("id"));
        assert_eq!(field.through, Some("user_posts"));
        assert!(field.autosave);
        assert!(!field.primary_key);
    }
}
