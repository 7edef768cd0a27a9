//! Model traits for record types.
//!
//! `Model` is the per-type capability the association layer works through:
//! positional field reads and writes plus typed views over association
//! fields. It is typically derived using `#[derive(Model)]` from
//! `relmodel-macros`.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use crate::Result;
use crate::field::FieldInfo;
use crate::value::Value;

/// Static metadata describing a model type.
#[derive(Debug)]
pub struct ModelInfo {
    /// Rust type name (e.g. `"UserProfile"`)
    pub name: &'static str,
    /// Table name
    pub table_name: &'static str,
    /// Identity of the concrete type
    pub type_id: fn() -> TypeId,
    /// Fields in declaration order; positions index into this slice
    pub fields: &'static [FieldInfo],
}

impl ModelInfo {
    /// The `TypeId` of the described type.
    pub fn id(&self) -> TypeId {
        (self.type_id)()
    }

    /// Column name to position, for scalar fields only.
    ///
    /// Association fields hold records rather than columns and never take
    /// part in key lookups.
    pub fn field_index(&self) -> HashMap<&'static str, usize> {
        self.fields
            .iter()
            .enumerate()
            .filter(|(_, field)| !field.is_association())
            .map(|(position, field)| (field.column_name, position))
            .collect()
    }

    /// Position of the scalar field with this column name.
    pub fn position(&self, column: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|field| !field.is_association() && field.column_name == column)
    }

    pub fn field(&self, position: usize) -> Option<&'static FieldInfo> {
        self.fields.get(position)
    }

    /// Find any field (scalar or association) by its Rust name.
    pub fn field_by_name(&self, name: &str) -> Option<(usize, &'static FieldInfo)> {
        self.fields
            .iter()
            .enumerate()
            .find(|(_, field)| field.name == name)
    }

    /// Position of the primary key.
    ///
    /// A field flagged `primary_key` wins; otherwise the scalar column named
    /// `id` is used.
    pub fn primary_position(&self) -> Option<usize> {
        self.fields
            .iter()
            .position(|field| field.primary_key)
            .or_else(|| self.position("id"))
    }

    /// Positions of every association field, in declaration order.
    pub fn association_positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.fields
            .iter()
            .enumerate()
            .filter(|(_, field)| field.is_association())
            .map(|(position, _)| position)
    }
}

/// Read-only view of an association field.
#[derive(Clone, Copy)]
pub enum AssociationRef<'a> {
    /// Record stored inline (`T`).
    Embedded(&'a dyn Model),
    /// Optional boxed record (`Option<Box<T>>`); `None` when unset.
    Pointer(Option<&'a dyn Model>),
    /// Sequence of records; `None` when unset.
    Many(Option<&'a dyn ModelVec>),
}

/// Mutable view of an association field.
pub enum AssociationMut<'a> {
    Embedded(&'a mut dyn Model),
    Pointer(&'a mut dyn PointerSlot),
    Many(&'a mut dyn SequenceSlot),
}

/// The contract every record type implements.
///
/// Positions are indexes into `model_info().fields`. The trait is object
/// safe; the association layer only ever sees `dyn Model`.
pub trait Model: Any + Send + Sync {
    /// Static metadata for the concrete type.
    fn model_info(&self) -> &'static ModelInfo;

    /// Current value of the scalar field at `position`.
    ///
    /// Optional fields read as their inner value or `Value::Null`. Returns
    /// `None` for association fields and out-of-range positions.
    fn value(&self, position: usize) -> Option<Value>;

    /// Overwrite the scalar field at `position`.
    fn set_value(&mut self, position: usize, value: Value) -> Result<()>;

    /// View the association field at `position`.
    fn association(&self, position: usize) -> Option<AssociationRef<'_>>;

    /// Mutable view of the association field at `position`.
    fn association_mut(&mut self, position: usize) -> Option<AssociationMut<'_>>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// True when every field holds its zero value.
    ///
    /// Scalars compare against their type's zero, optional and sequence
    /// associations must be unset, and embedded records are not inspected.
    fn is_zero(&self) -> bool {
        let info = self.model_info();
        (0..info.fields.len()).all(|position| match self.association(position) {
            Some(AssociationRef::Embedded(_)) => true,
            Some(AssociationRef::Pointer(target)) => target.is_none(),
            Some(AssociationRef::Many(records)) => records.is_none(),
            None => self.value(position).is_none_or(|value| value.is_zero()),
        })
    }
}

impl dyn Model + '_ {
    pub fn is<T: Model>(&self) -> bool {
        self.as_any().is::<T>()
    }

    pub fn downcast_ref<T: Model>(&self) -> Option<&T> {
        self.as_any().downcast_ref()
    }

    pub fn downcast_mut<T: Model>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut()
    }
}

/// A model type with static metadata and a zero value.
pub trait ModelType: Model + Default {
    fn info() -> &'static ModelInfo;
}

/// Type-erased `Option<Box<T>>` association field.
pub trait PointerSlot: Send + Sync {
    fn target(&self) -> Option<&dyn Model>;

    fn target_mut(&mut self) -> Option<&mut dyn Model>;

    /// The pointee, allocating a zero-valued record when unset.
    ///
    /// The flag reports whether the pointer was already set.
    fn target_or_init(&mut self) -> (&mut dyn Model, bool);
}

impl<T: ModelType> PointerSlot for Option<Box<T>> {
    fn target(&self) -> Option<&dyn Model> {
        self.as_deref().map(|model| model as &dyn Model)
    }

    fn target_mut(&mut self) -> Option<&mut dyn Model> {
        self.as_deref_mut().map(|model| model as &mut dyn Model)
    }

    fn target_or_init(&mut self) -> (&mut dyn Model, bool) {
        let was_set = self.is_some();
        let model: &mut T = self.get_or_insert_with(Box::default);
        (model, was_set)
    }
}

/// Type-erased `Vec<T>` of records.
pub trait ModelVec: Send + Sync {
    /// Metadata of the element type.
    fn model_info(&self) -> &'static ModelInfo;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, index: usize) -> Option<&dyn Model>;

    fn get_mut(&mut self, index: usize) -> Option<&mut dyn Model>;

    /// Append a zero-valued record and return it.
    fn push_default(&mut self) -> &mut dyn Model;

    fn truncate(&mut self, len: usize);
}

impl<T: ModelType> ModelVec for Vec<T> {
    fn model_info(&self) -> &'static ModelInfo {
        T::info()
    }

    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn get(&self, index: usize) -> Option<&dyn Model> {
        self.as_slice()
            .get(index)
            .map(|model| model as &dyn Model)
    }

    fn get_mut(&mut self, index: usize) -> Option<&mut dyn Model> {
        self.as_mut_slice()
            .get_mut(index)
            .map(|model| model as &mut dyn Model)
    }

    fn push_default(&mut self) -> &mut dyn Model {
        self.push(T::default());
        let last = Vec::len(self) - 1;
        &mut self.as_mut_slice()[last]
    }

    fn truncate(&mut self, len: usize) {
        Vec::truncate(self, len);
    }
}

/// Type-erased sequence association field (`Vec<T>` or `Option<Vec<T>>`).
///
/// A plain `Vec<T>` has no separate unset state, so it counts as unset
/// exactly when it is empty. `Option<Vec<T>>` is unset only when `None`.
pub trait SequenceSlot: Send + Sync {
    fn is_unset(&self) -> bool;

    /// The records, or `None` when unset.
    fn sequence(&self) -> Option<&dyn ModelVec>;

    fn sequence_mut(&mut self) -> Option<&mut dyn ModelVec>;

    /// The records, initializing an unset sequence to empty.
    ///
    /// The flag reports whether the sequence was already set.
    fn sequence_or_init(&mut self) -> (&mut dyn ModelVec, bool);
}

impl<T: ModelType> SequenceSlot for Vec<T> {
    fn is_unset(&self) -> bool {
        Vec::is_empty(self)
    }

    fn sequence(&self) -> Option<&dyn ModelVec> {
        if Vec::is_empty(self) {
            None
        } else {
            Some(self as &dyn ModelVec)
        }
    }

    fn sequence_mut(&mut self) -> Option<&mut dyn ModelVec> {
        if Vec::is_empty(self) {
            None
        } else {
            Some(self as &mut dyn ModelVec)
        }
    }

    fn sequence_or_init(&mut self) -> (&mut dyn ModelVec, bool) {
        let was_set = !Vec::is_empty(self);
        (self, was_set)
    }
}

impl<T: ModelType> SequenceSlot for Option<Vec<T>> {
    fn is_unset(&self) -> bool {
        self.is_none()
    }

    fn sequence(&self) -> Option<&dyn ModelVec> {
        self.as_ref().map(|records| records as &dyn ModelVec)
    }

    fn sequence_mut(&mut self) -> Option<&mut dyn ModelVec> {
        self.as_mut().map(|records| records as &mut dyn ModelVec)
    }

    fn sequence_or_init(&mut self) -> (&mut dyn ModelVec, bool) {
        let was_set = self.is_some();
        let records: &mut Vec<T> = self.get_or_insert_with(Vec::new);
        (records, was_set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_models::{Address, Profile, Role, Team, User};

    #[test]
    fn field_index_excludes_associations() {
        let index = User::info().field_index();
        assert_eq!(index.get("id"), Some(&0));
        assert_eq!(index.get("team_id"), Some(&2));
        assert!(!index.contains_key("team"));
        assert!(!index.contains_key("roles"));
    }

    #[test]
    fn position_and_primary_key() {
        let info = User::info();
        assert_eq!(info.position("name"), Some(1));
        assert_eq!(info.position("team"), None);
        assert_eq!(info.primary_position(), Some(0));
        assert_eq!(Role::info().primary_position(), Some(0));
        assert_eq!(info.field_by_name("team").map(|(pos, _)| pos), Some(3));
    }

    #[test]
    fn association_positions_in_order() {
        let positions: Vec<usize> = User::info().association_positions().collect();
        assert_eq!(positions, vec![3, 4, 5, 6]);
        assert_eq!(Team::info().association_positions().count(), 1);
    }

    #[test]
    fn zero_model() {
        let user = User::default();
        assert!(user.is_zero());

        let named = User {
            name: "Ada".to_string(),
            ..User::default()
        };
        assert!(!named.is_zero());

        let with_profile = User {
            profile: Some(Box::default()),
            ..User::default()
        };
        assert!(!with_profile.is_zero());

        let with_roles = User {
            roles: Some(Vec::new()),
            ..User::default()
        };
        assert!(!with_roles.is_zero());
    }

    #[test]
    fn embedded_records_are_not_inspected() {
        let user = User {
            address: Address {
                city: "Oslo".to_string(),
                ..Address::default()
            },
            ..User::default()
        };
        assert!(user.is_zero());
    }

    #[test]
    fn pointer_slot_allocates_once() {
        let mut slot: Option<Box<Profile>> = None;
        assert!(slot.target().is_none());

        let (profile, was_set) = slot.target_or_init();
        assert!(!was_set);
        assert!(profile.is_zero());
        assert!(slot.is_some());

        let (_, was_set) = slot.target_or_init();
        assert!(was_set);
    }

    #[test]
    fn sequence_slot_states() {
        let mut plain: Vec<Role> = Vec::new();
        assert!(plain.is_unset());
        let (records, was_set) = plain.sequence_or_init();
        assert!(!was_set);
        records.push_default();
        assert!(!plain.is_unset());

        let mut optional: Option<Vec<Role>> = None;
        let (records, was_set) = optional.sequence_or_init();
        assert!(!was_set);
        assert!(records.is_empty());
        assert_eq!(optional, Some(Vec::new()));
        assert!(!optional.is_unset());
    }

    #[test]
    fn model_vec_erases_element_type() {
        let mut roles = vec![Role::default(), Role::default()];
        let records: &mut dyn ModelVec = &mut roles;
        assert_eq!(records.model_info().name, "Role");
        assert_eq!(records.len(), 2);

        records
            .get_mut(1)
            .expect("second role")
            .set_value(1, Value::from("admin"))
            .expect("set name");
        records.truncate(1);
        assert_eq!(records.len(), 1);
        assert!(records.get(1).is_none());
        assert_eq!(roles.len(), 1);
    }

    #[test]
    fn downcast_dyn_model() {
        let mut user = User::default();
        let model: &mut dyn Model = &mut user;
        assert!(model.is::<User>());
        assert!(model.downcast_ref::<Team>().is_none());
        model.downcast_mut::<User>().expect("user").id = 9;
        assert_eq!(user.id, 9);
    }
}
