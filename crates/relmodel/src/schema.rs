//! Up-front schema checks and descriptor dumps.
//!
//! Association mistakes otherwise surface on the first request that touches
//! the association. Running `validate_models` at startup resolves every
//! association once, filling the global cache as a side effect.

use relmodel_core::{AssociationResolver, ModelInfo, Result};

/// Resolve every association of every model, stopping at the first error.
///
/// Returns the number of associations resolved.
pub fn validate_models(models: &[&'static ModelInfo]) -> Result<usize> {
    let resolver = AssociationResolver::global();
    let mut total = 0;

    for &model in models {
        let associations = resolver.resolve_all(model)?;
        tracing::debug!(
            model = model.name,
            associations = associations.len(),
            "validated model associations"
        );
        total += associations.len();
    }

    tracing::info!(
        models = models.len(),
        associations = total,
        "association schema validated"
    );
    Ok(total)
}

/// JSON map of association name to descriptor for one model.
pub fn describe(model: &'static ModelInfo) -> Result<serde_json::Value> {
    let associations = AssociationResolver::global().resolve_all(model)?;

    let mut map = serde_json::Map::with_capacity(associations.len());
    for info in associations {
        let value = serde_json::to_value(&*info)
            .map_err(|e| relmodel_core::Error::Custom(format!("describe {}: {e}", model.name)))?;
        map.insert(info.name.to_string(), value);
    }
    Ok(serde_json::Value::Object(map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Model, ModelType, SchemaErrorKind};

    #[derive(Model, Default)]
    struct Author {
        id: i64,
        books: Vec<Book>,
    }

    #[derive(Model, Default)]
    struct Book {
        id: i64,
        author_id: i64,
        author: Option<Box<Author>>,
    }

    #[derive(Model, Default)]
    struct Shelf {
        id: i64,
        #[rel(foreign_key = "shelf_ref")]
        books: Vec<Book>,
    }

    #[test]
    fn validate_counts_associations() {
        assert_eq!(validate_models(&[Author::info(), Book::info()]).unwrap(), 2);
    }

    #[test]
    fn validate_stops_at_first_error() {
        let err = validate_models(&[Author::info(), Shelf::info()]).unwrap_err();
        assert_eq!(err.schema_kind(), Some(SchemaErrorKind::ForeignKeyNotFound));
    }

    #[test]
    fn describe_dumps_descriptors() {
        let json = describe(Book::info()).unwrap();
        assert_eq!(json["author"]["kind"], "BelongsTo");
        assert_eq!(json["author"]["reference_field"], "author_id");
        assert_eq!(json["author"]["through"], serde_json::Value::Null);
    }
}
