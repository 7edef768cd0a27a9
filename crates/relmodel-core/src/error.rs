//! Error types for relmodel operations.

use std::fmt;

/// The primary error type for all relmodel operations.
#[derive(Debug)]
pub enum Error {
    /// Schema/tag misconfiguration discovered while resolving metadata
    Schema(SchemaError),
    /// Misuse of an association handle
    Association(AssociationError),
    /// Type conversion errors
    Type(TypeError),
    /// Custom error with message
    Custom(String),
}

/// A model's declared fields do not support the requested association.
///
/// These surface on first resolution of an association and represent a
/// programmer error in the model definition, not a data problem.
#[derive(Debug, Clone)]
pub struct SchemaError {
    pub kind: SchemaErrorKind,
    /// Name of the model the lookup was performed on
    pub model: &'static str,
    /// The field (or key) that could not be resolved
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaErrorKind {
    /// Reference key missing from the host model
    ReferenceNotFound,
    /// Foreign key missing from the target model
    ForeignKeyNotFound,
    /// Position does not hold an association field
    NotAnAssociation,
    /// No field with this name or position
    FieldNotFound,
}

/// An association handle was asked for something its cardinality or
/// field shape cannot provide.
#[derive(Debug, Clone)]
pub struct AssociationError {
    pub kind: AssociationErrorKind,
    /// Name of the association field
    pub association: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationErrorKind {
    /// `foreign_value` on a has-many or many-to-many association
    ForeignValueOnMany,
    /// Single-record access on a sequence field
    NotSingular,
    /// Collection access on a single-record field
    NotCollection,
}

#[derive(Debug)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub field: Option<String>,
}

impl SchemaError {
    /// Reference key `field` does not exist on `model`.
    pub fn reference_not_found(model: &'static str, field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            kind: SchemaErrorKind::ReferenceNotFound,
            message: format!("references ({field}) field not found on {model}"),
            model,
            field,
        }
    }

    /// Foreign key `field` does not exist on `model`.
    pub fn foreign_key_not_found(model: &'static str, field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            kind: SchemaErrorKind::ForeignKeyNotFound,
            message: format!("foreign_key ({field}) field not found on {model}"),
            model,
            field,
        }
    }

    /// Position on `model` is not an association field.
    pub fn not_an_association(model: &'static str, position: usize) -> Self {
        Self {
            kind: SchemaErrorKind::NotAnAssociation,
            field: position.to_string(),
            message: format!("field at position {position} of {model} is not an association"),
            model,
        }
    }

    /// No field named (or positioned at) `field` on `model`.
    pub fn field_not_found(model: &'static str, field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            kind: SchemaErrorKind::FieldNotFound,
            message: format!("field ({field}) not found on {model}"),
            model,
            field,
        }
    }
}

impl AssociationError {
    pub fn new(
        kind: AssociationErrorKind,
        association: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            association,
            message: message.into(),
        }
    }
}

impl Error {
    /// Is this a schema/tag misconfiguration?
    pub fn is_schema_error(&self) -> bool {
        matches!(self, Error::Schema(_))
    }

    /// Is this a misuse of the association API?
    pub fn is_misuse(&self) -> bool {
        matches!(self, Error::Association(_))
    }

    /// The schema error kind, if this is a schema error.
    pub fn schema_kind(&self) -> Option<SchemaErrorKind> {
        match self {
            Error::Schema(e) => Some(e.kind),
            _ => None,
        }
    }

    /// The association error kind, if this is an API misuse.
    pub fn association_kind(&self) -> Option<AssociationErrorKind> {
        match self {
            Error::Association(e) => Some(e.kind),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Schema(e) => write!(f, "Schema error: {}", e.message),
            Error::Association(e) => {
                write!(f, "Association error on '{}': {}", e.association, e.message)
            }
            Error::Type(e) => {
                if let Some(field) = &e.field {
                    write!(
                        f,
                        "Type error in field '{}': expected {}, found {}",
                        field, e.expected, e.actual
                    )
                } else {
                    write!(f, "Type error: expected {}, found {}", e.expected, e.actual)
                }
            }
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SchemaError {}

impl fmt::Display for AssociationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AssociationError {}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(field) = &self.field {
            write!(
                f,
                "expected {} for field '{}', found {}",
                self.expected, field, self.actual
            )
        } else {
            write!(f, "expected {}, found {}", self.expected, self.actual)
        }
    }
}

impl From<SchemaError> for Error {
    fn from(err: SchemaError) -> Self {
        Error::Schema(err)
    }
}

impl From<AssociationError> for Error {
    fn from(err: AssociationError) -> Self {
        Error::Association(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

impl From<std::convert::Infallible> for Error {
    fn from(err: std::convert::Infallible) -> Self {
        match err {}
    }
}

/// Result type alias for relmodel operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_error_names_missing_field() {
        let err = Error::from(SchemaError::reference_not_found("User", "team_id"));
        assert!(err.is_schema_error());
        assert!(!err.is_misuse());
        assert_eq!(err.schema_kind(), Some(SchemaErrorKind::ReferenceNotFound));
        assert!(err.to_string().contains("team_id"));
        assert!(err.to_string().contains("User"));

        let err = Error::from(SchemaError::foreign_key_not_found("Team", "user_id"));
        assert_eq!(err.schema_kind(), Some(SchemaErrorKind::ForeignKeyNotFound));
        assert!(err.to_string().contains("foreign_key (user_id)"));
    }

    #[test]
    fn association_error_is_misuse() {
        let err = Error::from(AssociationError::new(
            AssociationErrorKind::ForeignValueOnMany,
            "posts",
            "cannot infer foreign value",
        ));
        assert!(err.is_misuse());
        assert_eq!(
            err.association_kind(),
            Some(AssociationErrorKind::ForeignValueOnMany)
        );
        assert_eq!(err.schema_kind(), None);
        assert!(err.to_string().starts_with("Association error on 'posts'"));
    }

    #[test]
    fn type_error_display() {
        let err = Error::Type(TypeError {
            expected: "i64",
            actual: "TEXT".to_string(),
            field: Some("id".to_string()),
        });
        assert_eq!(
            err.to_string(),
            "Type error in field 'id': expected i64, found TEXT"
        );
    }
}
