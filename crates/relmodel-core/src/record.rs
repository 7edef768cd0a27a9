//! Record and collection wrappers over live model instances.

use std::fmt;
use std::sync::Arc;

use crate::association::{Association, AssociationInfo, AssociationResolver};
use crate::error::{Error, SchemaError};
use crate::model::{Model, ModelInfo, ModelVec};
use crate::{Result, Value};

/// True iff the model's primary key holds a non-zero value.
pub(crate) fn is_persisted(model: &dyn Model) -> bool {
    primary_value(model).is_some_and(|value| !value.is_zero())
}

fn primary_value(model: &dyn Model) -> Option<Value> {
    model
        .model_info()
        .primary_position()
        .and_then(|position| model.value(position))
}

/// A mutable borrow of one record.
pub struct Record<'a> {
    model: &'a mut dyn Model,
}

impl<'a> Record<'a> {
    pub fn new(model: &'a mut dyn Model) -> Self {
        Self { model }
    }

    pub fn model_info(&self) -> &'static ModelInfo {
        self.model.model_info()
    }

    /// Whether the record has been saved, judged by a non-zero primary key.
    pub fn persisted(&self) -> bool {
        is_persisted(&*self.model)
    }

    pub fn primary_value(&self) -> Option<Value> {
        primary_value(&*self.model)
    }

    /// Read a scalar field by column name.
    pub fn value(&self, column: &str) -> Option<Value> {
        let position = self.model_info().position(column)?;
        self.model.value(position)
    }

    /// Write a scalar field by column name.
    pub fn set_value(&mut self, column: &str, value: Value) -> Result<()> {
        let info = self.model_info();
        let position = info
            .position(column)
            .ok_or_else(|| SchemaError::field_not_found(info.name, column))?;

        self.model.set_value(position, value).map_err(|err| match err {
            Error::Type(mut err) => {
                err.field.get_or_insert_with(|| column.to_string());
                Error::Type(err)
            }
            other => other,
        })
    }

    /// Handle for the association field named `name`.
    pub fn association(&mut self, name: &str) -> Result<Association<'_>> {
        let info = self.model_info();
        let (position, field) = info
            .field_by_name(name)
            .ok_or_else(|| SchemaError::field_not_found(info.name, name))?;

        if !field.is_association() {
            return Err(SchemaError::not_an_association(info.name, position).into());
        }

        Association::new(&mut *self.model, position)
    }

    /// Descriptors of every association on this record's type.
    pub fn associations(&self) -> Result<Vec<Arc<AssociationInfo>>> {
        AssociationResolver::global().resolve_all(self.model_info())
    }

    pub fn as_model(&self) -> &dyn Model {
        &*self.model
    }

    pub fn as_model_mut(&mut self) -> &mut dyn Model {
        &mut *self.model
    }

    pub fn downcast_ref<T: Model>(&self) -> Option<&T> {
        self.model.as_any().downcast_ref()
    }

    pub fn downcast_mut<T: Model>(&mut self) -> Option<&mut T> {
        self.model.as_any_mut().downcast_mut()
    }
}

impl fmt::Debug for Record<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("model", &self.model_info().name)
            .field("primary_value", &self.primary_value())
            .finish()
    }
}

/// A mutable borrow of a homogeneous sequence of records.
pub struct RecordCollection<'a> {
    records: &'a mut dyn ModelVec,
}

impl<'a> RecordCollection<'a> {
    pub fn new(records: &'a mut dyn ModelVec) -> Self {
        Self { records }
    }

    /// Metadata of the element type.
    pub fn model_info(&self) -> &'static ModelInfo {
        self.records.model_info()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&dyn Model> {
        self.records.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<Record<'_>> {
        self.records.get_mut(index).map(Record::new)
    }

    /// Append a zero-valued record and return it.
    pub fn add(&mut self) -> Record<'_> {
        Record::new(self.records.push_default())
    }

    pub fn truncate(&mut self, len: usize) {
        self.records.truncate(len);
    }

    /// True iff the collection is non-empty and every record is persisted.
    pub fn persisted(&self) -> bool {
        !self.is_empty() && (0..self.len()).all(|i| self.get(i).is_some_and(is_persisted))
    }

    /// Primary key of every record, in order.
    pub fn primary_values(&self) -> Vec<Value> {
        (0..self.len())
            .filter_map(|i| self.get(i))
            .map(|model| primary_value(model).unwrap_or(Value::Null))
            .collect()
    }
}

impl fmt::Debug for RecordCollection<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordCollection")
            .field("model", &self.model_info().name)
            .field("len", &self.len())
            .finish()
    }
}
