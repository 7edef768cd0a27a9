//! Association metadata and runtime handles.
//!
//! An association is a field on a host model that holds one record, an
//! optional record, or a sequence of records of a target model. The
//! [`AssociationResolver`] infers how the two sides join (cardinality, key
//! fields, join table) from the field's declared shape, its tags, and naming
//! conventions, and caches the result per (host type, field position). An
//! [`Association`] pairs a cached descriptor with a live record.
//!
//! Key inference, when a key is not given explicitly:
//!
//! | condition                         | reference key  | foreign key        |
//! |-----------------------------------|----------------|--------------------|
//! | `through` table given             | `id`           | `id`               |
//! | host has column `<field>_id`      | `<field>_id`   | `id`               |
//! | otherwise                         | `id`           | `<host>_id`        |
//!
//! Singular associations whose reference key is longer than the foreign key
//! are `BelongsTo`; the rest are `HasOne`.

use std::any::TypeId;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, OnceLock, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::{AssociationError, AssociationErrorKind, Error, SchemaError};
use crate::field::FieldInfo;
use crate::model::{AssociationMut, AssociationRef, Model, ModelInfo};
use crate::naming;
use crate::record::{Record, RecordCollection, is_persisted};
use crate::{Result, Value};

/// The cardinality of an association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssociationKind {
    /// The host holds the key: many `Post`s belong to one `User`.
    BelongsTo,
    /// The target holds the key: a `User` has one `Profile`.
    HasOne,
    /// One `Team` has many `User`s.
    HasMany,
    /// `User`s have many `Role`s via a join table.
    ManyToMany,
}

impl AssociationKind {
    /// True for `HasMany` and `ManyToMany`.
    pub const fn is_many(&self) -> bool {
        matches!(self, AssociationKind::HasMany | AssociationKind::ManyToMany)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            AssociationKind::BelongsTo => "belongs_to",
            AssociationKind::HasOne => "has_one",
            AssociationKind::HasMany => "has_many",
            AssociationKind::ManyToMany => "many_to_many",
        }
    }
}

impl fmt::Display for AssociationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved, immutable description of one association field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssociationInfo {
    pub kind: AssociationKind,
    /// Association field name on the host
    pub name: &'static str,
    /// Host model name
    pub host_model: &'static str,
    /// Position of the association field on the host
    pub target_position: usize,
    /// Target model name
    pub target_model: &'static str,
    /// Join key on the host
    pub reference_field: String,
    pub reference_position: usize,
    /// Host-side column on the join table (many-to-many only)
    pub reference_through: Option<String>,
    /// Join key on the target
    pub foreign_field: String,
    pub foreign_position: usize,
    /// Target-side column on the join table (many-to-many only)
    pub foreign_through: Option<String>,
    /// Join table (many-to-many only)
    pub through: Option<&'static str>,
    /// Cascade saves and deletes to the target
    pub autosave: bool,
}

/// Naming conventions used when keys are inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Key assumed on whichever side is referenced (default `"id"`)
    pub primary_key: &'static str,
    /// Suffix appended to a name to form a key (default `"_id"`)
    pub key_suffix: &'static str,
}

impl ResolverConfig {
    pub const fn new() -> Self {
        Self {
            primary_key: "id",
            key_suffix: "_id",
        }
    }

    pub const fn primary_key(mut self, key: &'static str) -> Self {
        self.primary_key = key;
        self
    }

    pub const fn key_suffix(mut self, suffix: &'static str) -> Self {
        self.key_suffix = suffix;
        self
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self::new()
    }
}

type AssociationKey = (TypeId, usize);

/// Infers association descriptors and caches them for reuse.
///
/// Lookups take a read lock. Inference runs outside any lock, so two
/// threads missing on the same key may both infer it; the first insert wins
/// and every caller receives that shared descriptor.
pub struct AssociationResolver {
    config: ResolverConfig,
    cache: RwLock<HashMap<AssociationKey, Arc<AssociationInfo>>>,
    resolutions: AtomicUsize,
}

impl AssociationResolver {
    pub fn new() -> Self {
        Self::with_config(ResolverConfig::new())
    }

    pub fn with_config(config: ResolverConfig) -> Self {
        Self {
            config,
            cache: RwLock::new(HashMap::new()),
            resolutions: AtomicUsize::new(0),
        }
    }

    /// Process-wide resolver with the default conventions.
    pub fn global() -> &'static AssociationResolver {
        static GLOBAL: OnceLock<AssociationResolver> = OnceLock::new();
        GLOBAL.get_or_init(AssociationResolver::new)
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Descriptor for the association at `position` on `host`.
    ///
    /// Fails with a [`SchemaError`] when the position is not an association
    /// or when a reference or foreign key cannot be found. Failures are not
    /// cached.
    pub fn resolve(
        &self,
        host: &'static ModelInfo,
        position: usize,
    ) -> Result<Arc<AssociationInfo>> {
        let key = (host.id(), position);

        // Use unwrap_or_else to recover from poisoned lock; entries are immutable
        {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            if let Some(info) = cache.get(&key) {
                tracing::trace!(model = host.name, position, "association cache hit");
                return Ok(Arc::clone(info));
            }
        }

        let info = Arc::new(self.infer(host, position)?);

        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        Ok(Arc::clone(cache.entry(key).or_insert(info)))
    }

    /// Resolve every association of `host`, stopping at the first error.
    ///
    /// Useful to surface schema mistakes at startup rather than on first use.
    pub fn resolve_all(&self, host: &'static ModelInfo) -> Result<Vec<Arc<AssociationInfo>>> {
        host.association_positions()
            .map(|position| self.resolve(host, position))
            .collect()
    }

    /// Number of times inference has run (cache misses).
    pub fn resolutions(&self) -> usize {
        self.resolutions.load(AtomicOrdering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.cache.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, host: &'static ModelInfo, position: usize) -> bool {
        self.cache
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(&(host.id(), position))
    }

    fn infer(&self, host: &'static ModelInfo, position: usize) -> Result<AssociationInfo> {
        self.resolutions.fetch_add(1, AtomicOrdering::Relaxed);

        let Some((field, target)) = host
            .field(position)
            .and_then(|field| field.ty.target_info().map(|target| (field, target)))
        else {
            return Err(schema_error(SchemaError::not_an_association(
                host.name, position,
            )));
        };

        let keys = self.infer_keys(host, field, target);

        let host_index = host.field_index();
        let Some(&reference_position) = host_index.get(keys.reference.as_str()) else {
            return Err(schema_error(SchemaError::reference_not_found(
                host.name,
                keys.reference,
            )));
        };

        let target_index = target.field_index();
        let Some(&foreign_position) = target_index.get(keys.foreign.as_str()) else {
            return Err(schema_error(SchemaError::foreign_key_not_found(
                target.name,
                keys.foreign,
            )));
        };

        let through = field.through.filter(|table| !table.is_empty());
        let kind = if field.ty.is_sequence() {
            if through.is_some() {
                AssociationKind::ManyToMany
            } else {
                AssociationKind::HasMany
            }
        } else {
            match keys
                .reference
                .chars()
                .count()
                .cmp(&keys.foreign.chars().count())
            {
                Ordering::Greater => AssociationKind::BelongsTo,
                Ordering::Less => AssociationKind::HasOne,
                Ordering::Equal => {
                    tracing::warn!(
                        model = host.name,
                        field = field.name,
                        reference = %keys.reference,
                        foreign = %keys.foreign,
                        "reference and foreign keys have equal length, assuming has_one"
                    );
                    AssociationKind::HasOne
                }
            }
        };

        let (reference_through, foreign_through, through) = if kind == AssociationKind::ManyToMany
        {
            (keys.reference_through, keys.foreign_through, through)
        } else {
            (None, None, None)
        };

        tracing::debug!(
            model = host.name,
            field = field.name,
            target = target.name,
            kind = %kind,
            reference = %keys.reference,
            foreign = %keys.foreign,
            "resolved association"
        );

        Ok(AssociationInfo {
            kind,
            name: field.name,
            host_model: host.name,
            target_position: position,
            target_model: target.name,
            reference_field: keys.reference,
            reference_position,
            reference_through,
            foreign_field: keys.foreign,
            foreign_position,
            foreign_through,
            through,
            autosave: field.autosave,
        })
    }

    /// Explicit tags first, then conventions for whatever is missing.
    fn infer_keys(
        &self,
        host: &'static ModelInfo,
        field: &FieldInfo,
        target: &'static ModelInfo,
    ) -> InferredKeys {
        let ResolverConfig {
            primary_key,
            key_suffix,
        } = self.config;

        let reference_tag = field.reference_key();
        let foreign_tag = field.foreign_key_tag();
        let has_through = field.through.is_some_and(|table| !table.is_empty());

        let mut reference = reference_tag.field.map(str::to_string);
        let mut foreign = foreign_tag.field.map(str::to_string);

        if reference.is_none() || foreign.is_none() {
            let (inferred_reference, inferred_foreign) = if has_through {
                (primary_key.to_string(), primary_key.to_string())
            } else {
                let belongs_to_key = format!("{}{}", field.column_name, key_suffix);
                if host.position(&belongs_to_key).is_some() {
                    (belongs_to_key, primary_key.to_string())
                } else {
                    (
                        primary_key.to_string(),
                        naming::key_name(host.name, key_suffix),
                    )
                }
            };
            reference.get_or_insert(inferred_reference);
            foreign.get_or_insert(inferred_foreign);
        }

        let (reference_through, foreign_through) = if has_through {
            (
                Some(reference_tag.through.map_or_else(
                    || naming::key_name(host.name, key_suffix),
                    str::to_string,
                )),
                Some(foreign_tag.through.map_or_else(
                    || naming::key_name(target.name, key_suffix),
                    str::to_string,
                )),
            )
        } else {
            (None, None)
        };

        InferredKeys {
            reference: reference.unwrap_or_default(),
            foreign: foreign.unwrap_or_default(),
            reference_through,
            foreign_through,
        }
    }
}

impl Default for AssociationResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AssociationResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssociationResolver")
            .field("config", &self.config)
            .field("cached", &self.len())
            .field("resolutions", &self.resolutions())
            .finish()
    }
}

struct InferredKeys {
    reference: String,
    foreign: String,
    reference_through: Option<String>,
    foreign_through: Option<String>,
}

fn schema_error(err: SchemaError) -> Error {
    tracing::error!(
        model = err.model,
        field = %err.field,
        kind = ?err.kind,
        "{}",
        err.message
    );
    Error::Schema(err)
}

/// A resolved association bound to one live record.
///
/// Every accessor re-reads the record's field; the handle keeps no state of
/// its own beyond the shared descriptor.
pub struct Association<'a> {
    info: Arc<AssociationInfo>,
    model: &'a mut dyn Model,
}

impl<'a> Association<'a> {
    /// Handle for the association at `position`, using the global resolver.
    pub fn new(model: &'a mut dyn Model, position: usize) -> Result<Self> {
        Self::with_resolver(AssociationResolver::global(), model, position)
    }

    pub fn with_resolver(
        resolver: &AssociationResolver,
        model: &'a mut dyn Model,
        position: usize,
    ) -> Result<Self> {
        let info = resolver.resolve(model.model_info(), position)?;
        Ok(Self { info, model })
    }

    pub fn kind(&self) -> AssociationKind {
        self.info.kind
    }

    pub fn info(&self) -> &Arc<AssociationInfo> {
        &self.info
    }

    pub fn name(&self) -> &'static str {
        self.info.name
    }

    /// The target as a single record.
    ///
    /// An unset `Option<Box<T>>` is filled with a zero-valued record and
    /// reported as not loaded. Otherwise the flag is the record's
    /// `persisted()` state.
    pub fn record(&mut self) -> Result<(Record<'_>, bool)> {
        let info = &self.info;
        match self.model.association_mut(info.target_position) {
            Some(AssociationMut::Embedded(model)) => {
                let loaded = is_persisted(&*model);
                Ok((Record::new(model), loaded))
            }
            Some(AssociationMut::Pointer(slot)) => {
                let (model, was_set) = slot.target_or_init();
                if !was_set {
                    tracing::trace!(association = info.name, "allocated empty target record");
                }
                let loaded = was_set && is_persisted(&*model);
                Ok((Record::new(model), loaded))
            }
            Some(AssociationMut::Many(_)) => Err(misuse(
                info,
                AssociationErrorKind::NotSingular,
                "association holds a collection, not a single record",
            )),
            None => Err(schema_error(SchemaError::not_an_association(
                info.host_model,
                info.target_position,
            ))),
        }
    }

    /// The target as a collection.
    ///
    /// The flag reports whether the sequence was already set before this
    /// call; an unset sequence is initialized to empty.
    pub fn collection(&mut self) -> Result<(RecordCollection<'_>, bool)> {
        let info = &self.info;
        match self.model.association_mut(info.target_position) {
            Some(AssociationMut::Many(slot)) => {
                let (records, loaded) = slot.sequence_or_init();
                Ok((RecordCollection::new(records), loaded))
            }
            Some(_) => Err(misuse(
                info,
                AssociationErrorKind::NotCollection,
                "association holds a single record, not a collection",
            )),
            None => Err(schema_error(SchemaError::not_an_association(
                info.host_model,
                info.target_position,
            ))),
        }
    }

    /// True when no association data is present.
    ///
    /// Unset pointers and sequences are zero. A single record is zero when
    /// its own fields are (see [`Model::is_zero`]).
    pub fn is_zero(&self) -> bool {
        match self.model.association(self.info.target_position) {
            Some(AssociationRef::Embedded(model)) => model.is_zero(),
            Some(AssociationRef::Pointer(target)) => target.is_none_or(|model| model.is_zero()),
            Some(AssociationRef::Many(records)) => records.is_none(),
            None => true,
        }
    }

    pub fn reference_field(&self) -> &str {
        &self.info.reference_field
    }

    pub fn reference_through(&self) -> Option<&str> {
        self.info.reference_through.as_deref()
    }

    pub fn foreign_field(&self) -> &str {
        &self.info.foreign_field
    }

    pub fn foreign_through(&self) -> Option<&str> {
        self.info.foreign_through.as_deref()
    }

    pub fn through(&self) -> Option<&'static str> {
        self.info.through
    }

    pub fn autosave(&self) -> bool {
        self.info.autosave
    }

    /// The host's current value of the reference key.
    pub fn reference_value(&self) -> Value {
        self.model
            .value(self.info.reference_position)
            .unwrap_or(Value::Null)
    }

    /// The target's current value of the foreign key.
    ///
    /// Only defined for single-record associations; an unset target reads as
    /// `Value::Null`.
    pub fn foreign_value(&self) -> Result<Value> {
        if self.info.kind.is_many() {
            return Err(misuse(
                &self.info,
                AssociationErrorKind::ForeignValueOnMany,
                "cannot infer foreign value for has many or many to many association",
            ));
        }

        let target = match self.model.association(self.info.target_position) {
            Some(AssociationRef::Embedded(model)) => Some(model),
            Some(AssociationRef::Pointer(target)) => target,
            _ => None,
        };

        Ok(target
            .and_then(|model| model.value(self.info.foreign_position))
            .unwrap_or(Value::Null))
    }
}

impl fmt::Debug for Association<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Association")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

fn misuse(info: &AssociationInfo, kind: AssociationErrorKind, message: &str) -> Error {
    tracing::error!(
        model = info.host_model,
        association = info.name,
        kind = ?kind,
        "{}",
        message
    );
    Error::Association(AssociationError::new(kind, info.name, message))
}
