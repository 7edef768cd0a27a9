//! relmodel - association metadata and runtime accessors for record types.
//!
//! Given a record type with fields that hold other records, relmodel works
//! out how the two sides join and gives uniform access to the related data
//! on a live instance:
//!
//! - `#[derive(Model)]` generates static field metadata and positional access
//! - `AssociationResolver` infers cardinality and join keys, cached per field
//! - `Association` reads, materializes and mutates one association
//!
//! # Quick Start
//!
//! ```ignore
//! use relmodel::prelude::*;
//!
//! #[derive(Model, Default)]
//! struct Team {
//!     id: i64,
//!     name: String,
//!     users: Vec<User>,
//! }
//!
//! #[derive(Model, Default)]
//! struct User {
//!     id: i64,
//!     team_id: i64,
//!     team: Option<Box<Team>>,
//! }
//!
//! let mut user = User::default();
//! let mut record = Record::new(&mut user);
//! let team = record.association("team")?;
//! assert_eq!(team.kind(), AssociationKind::BelongsTo);
//! assert_eq!(team.reference_field(), "team_id");
//! ```
//!
//! The derive expands to paths under `relmodel_core`, so depend on
//! `relmodel-core` alongside this crate.

pub use relmodel_core::{
    Association,
    AssociationError,
    AssociationErrorKind,
    AssociationInfo,
    AssociationKind,
    AssociationMut,
    AssociationRef,
    AssociationResolver,
    Error,
    FieldInfo,
    FieldType,
    Model,
    ModelInfo,
    ModelType,
    ModelVec,
    PointerSlot,
    Record,
    RecordCollection,
    ResolverConfig,
    Result,
    SchemaError,
    SchemaErrorKind,
    SequenceSlot,
    TypeWrapper,
    Value,
    naming,
};

pub use relmodel_macros::Model;

pub mod schema;
pub use schema::{describe, validate_models};

/// Commonly used types, traits and the derive macro.
pub mod prelude {
    pub use crate::schema::validate_models;
    pub use relmodel_core::{
        Association, AssociationKind, AssociationResolver, Error, Model, ModelType, Record,
        RecordCollection, Result, Value,
    };
    pub use relmodel_macros::Model;
}

#[cfg(test)]
mod derive_tests {
    use super::*;

    #[derive(Model, Debug, Default, Clone, PartialEq)]
    #[rel(table = "crew")]
    struct Ship {
        #[rel(primary_key)]
        registry: String,
        name: String,
        #[rel(skip)]
        scratch: u64,
        #[rel(references = "registry")]
        sailors: Vec<Sailor>,
    }

    #[derive(Model, Debug, Default, Clone, PartialEq)]
    struct Sailor {
        id: i64,
        ship_id: i64,
        rank: Option<i32>,
    }

    #[test]
    fn test_generated_metadata() {
        let info = Ship::info();
        assert_eq!(info.name, "Ship");
        assert_eq!(info.table_name, "crew");
        assert_eq!(info.fields.len(), 3);
        assert_eq!(info.primary_position(), Some(0));
        assert_eq!(info.association_positions().collect::<Vec<_>>(), vec![2]);
        assert_eq!(Sailor::info().table_name, "sailors");
        assert_eq!(info.id(), std::any::TypeId::of::<Ship>());
    }

    #[test]
    fn test_generated_value_access() {
        let mut sailor = Sailor::default();
        assert_eq!(sailor.value(2), Some(Value::Null));
        sailor.set_value(2, Value::Int(3)).unwrap();
        assert_eq!(sailor.rank, Some(3));
        assert_eq!(sailor.value(2), Some(Value::Int(3)));
        assert!(sailor.set_value(9, Value::Null).is_err());
        assert!(sailor.value(9).is_none());
    }

    #[test]
    fn test_custom_primary_key_drives_persisted() {
        let mut ship = Ship::default();
        let mut record = Record::new(&mut ship);
        assert!(!record.persisted());
        record
            .set_value("registry", Value::from("NCC-1701"))
            .unwrap();
        assert!(record.persisted());
        assert_eq!(ship.scratch, 0);
    }

    #[test]
    fn test_has_many_through_record() {
        let mut ship = Ship::default();
        let mut record = Record::new(&mut ship);
        let assoc = record.association("sailors").unwrap();
        assert_eq!(assoc.kind(), AssociationKind::HasMany);
        assert_eq!(assoc.reference_field(), "registry");
        assert_eq!(assoc.foreign_field(), "ship_id");
    }
}
