//! Root instance pool: live root objects addressed by identifier.

use crate::reflect::{Described, Reflect, Ref};
use slotmap::{new_key_type, SlotMap};
use std::collections::HashMap;

new_key_type! {
    /// Slot of a root instance in a [`RootPool`].
    pub struct RootKey;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("root of type {0} has no identifier")]
    MissingIdentifier(String),
    #[error("duplicate identifier {0}")]
    DuplicateIdentifier(String),
}

/// Root instances in insertion order, indexed by identifier.
#[derive(Debug, Default, Clone)]
pub struct RootPool {
    slots: SlotMap<RootKey, Box<dyn Reflect>>,
    index: HashMap<String, RootKey>,
    order: Vec<RootKey>,
}

impl RootPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a root. Its identifier must be set and unused in this pool.
    pub fn insert(&mut self, root: Box<dyn Reflect>) -> Result<RootKey, PoolError> {
        let identifier = match root.identifier() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => return Err(PoolError::MissingIdentifier(root.type_key().full_name())),
        };
        if self.index.contains_key(&identifier) {
            return Err(PoolError::DuplicateIdentifier(identifier));
        }
        let key = self.slots.insert(root);
        self.index.insert(identifier, key);
        self.order.push(key);
        Ok(key)
    }

    pub fn insert_value<T: Described>(&mut self, root: T) -> Result<RootKey, PoolError> {
        self.insert(Box::new(root))
    }

    pub fn key_of(&self, identifier: &str) -> Option<RootKey> {
        self.index.get(identifier).copied()
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.index.contains_key(identifier)
    }

    pub fn get(&self, identifier: &str) -> Option<&dyn Reflect> {
        let key = self.key_of(identifier)?;
        self.slots.get(key).map(|b| b.as_ref())
    }

    pub fn get_mut(&mut self, identifier: &str) -> Option<&mut (dyn Reflect + 'static)> {
        let key = self.key_of(identifier)?;
        self.slots.get_mut(key).map(|b| b.as_mut())
    }

    pub fn get_by_key(&self, key: RootKey) -> Option<&dyn Reflect> {
        self.slots.get(key).map(|b| b.as_ref())
    }

    /// The root with this identifier, if it is exactly a `T`.
    pub fn get_as<T: Reflect>(&self, identifier: &str) -> Option<&T> {
        self.get(identifier)?.downcast_ref::<T>()
    }

    /// Whatever root a reference names, whatever its concrete type.
    pub fn resolve_dyn<T>(&self, reference: &Ref<T>) -> Option<&dyn Reflect> {
        self.get(reference.identifier())
    }

    /// The root a reference names, if it is exactly a `T`.
    pub fn resolve<T: Described>(&self, reference: &Ref<T>) -> Option<&T> {
        self.get_as::<T>(reference.identifier())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Roots in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Reflect> {
        self.order
            .iter()
            .filter_map(|&key| self.slots.get(key))
            .map(|b| b.as_ref())
    }

    /// Roots of exactly type `T`, in insertion order.
    pub fn iter_as<T: Reflect>(&self) -> impl Iterator<Item = &T> {
        self.iter().filter_map(|r| r.downcast_ref::<T>())
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.iter().filter_map(|r| r.identifier())
    }

    /// Take a root out of the pool. Remaining roots keep their order.
    pub fn remove(&mut self, identifier: &str) -> Option<Box<dyn Reflect>> {
        let key = self.index.remove(identifier)?;
        self.order.retain(|k| *k != key);
        self.slots.remove(key)
    }

    /// Move every root of `other` into this pool. Roots whose identifier is
    /// already taken are dropped and returned as errors.
    pub fn merge(&mut self, mut other: RootPool) -> Vec<PoolError> {
        let mut rejected = Vec::new();
        for key in std::mem::take(&mut other.order) {
            if let Some(root) = other.slots.remove(key) {
                if let Err(e) = self.insert(root) {
                    rejected.push(e);
                }
            }
        }
        rejected
    }

    /// Take ownership of every root, in insertion order.
    pub fn into_roots(mut self) -> Vec<Box<dyn Reflect>> {
        self.order
            .iter()
            .filter_map(|&key| self.slots.remove(key))
            .collect()
    }
}
