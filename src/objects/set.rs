//! Ordered, de-duplicated set of values.

use crate::error::EngineError;
use crate::objects::object::{unsupported, Object};
use crate::value::Value;
use log::trace;
use std::any::Any;
use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

/// The object behind [`Value::Set`].
///
/// Elements are kept in [`Value`] order, so two sets with the same members
/// compare, hash and dump identically.
#[derive(Debug, Clone, Default)]
pub struct ValueSet {
    items: BTreeSet<Value>,
}

impl ValueSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `value`.  Returns `false` if an equal value was present.
    pub fn insert(&mut self, value: Value) -> bool {
        self.items.insert(value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.items.iter()
    }
}

impl FromIterator<Value> for ValueSet {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        let mut set = Self::new();
        for value in iter {
            if !set.insert(value) {
                trace!("dropped a duplicate set member");
            }
        }
        set
    }
}

impl Object for ValueSet {
    fn type_name(&self) -> &'static str {
        "set"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn hash_value(&self) -> Result<u64, EngineError> {
        let mut hasher = DefaultHasher::new();
        self.items.len().hash(&mut hasher);
        for item in &self.items {
            item.hash(&mut hasher);
        }
        Ok(hasher.finish())
    }

    fn compare(&self, other: &dyn Object) -> Result<Ordering, EngineError> {
        let other = other
            .as_any()
            .downcast_ref::<Self>()
            .ok_or_else(|| unsupported(other.type_name(), "set comparison"))?;
        Ok(self.items.iter().cmp(other.items.iter()))
    }

    fn dump(&self) -> Result<serde_json::Value, EngineError> {
        self.items
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .map(serde_json::Value::Array)
            .map_err(|e| EngineError::Protocol(format!("set dump: {}", e)))
    }
}
