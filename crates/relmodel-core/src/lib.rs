//! Core types and traits for relmodel.
//!
//! This crate provides the association layer of the ORM:
//!
//! - `Model` / `ModelType` traits giving positional access to record fields
//! - `FieldInfo` / `ModelInfo` static metadata, including association tags
//! - `AssociationResolver`, which infers and caches association descriptors
//! - `Association`, a per-record handle to read and materialize associations
//! - `Record` / `RecordCollection` wrappers over live instances

pub mod association;
pub mod error;
pub mod field;
pub mod model;
pub mod naming;
pub mod record;
pub mod value;

pub use association::{
    Association, AssociationInfo, AssociationKind, AssociationResolver, ResolverConfig,
};
pub use error::{
    AssociationError, AssociationErrorKind, Error, Result, SchemaError, SchemaErrorKind, TypeError,
};
pub use field::{FieldInfo, FieldType, KeyTag, TypeWrapper};
pub use model::{
    AssociationMut, AssociationRef, Model, ModelInfo, ModelType, ModelVec, PointerSlot,
    SequenceSlot,
};
pub use record::{Record, RecordCollection};
pub use value::Value;
