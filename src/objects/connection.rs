//! Context object describing the client a transaction arrived from.

use crate::error::EngineError;
use crate::objects::object::{unsupported, Object};
use log::debug;
use std::any::Any;
use std::cmp::Ordering;

/// A client connection, passed to processors as their context object.
///
/// Transactions can fetch it with the `context` command, e.g. to tag their
/// log output with the originating client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    id: u64,
}

impl Connection {
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Object for Connection {
    fn type_name(&self) -> &'static str {
        "connection"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn hash_value(&self) -> Result<u64, EngineError> {
        Ok(self.id)
    }

    fn compare(&self, other: &dyn Object) -> Result<Ordering, EngineError> {
        other
            .as_any()
            .downcast_ref::<Self>()
            .map(|o| self.id.cmp(&o.id))
            .ok_or_else(|| unsupported(other.type_name(), "connection comparison"))
    }

    fn dump(&self) -> Result<serde_json::Value, EngineError> {
        Ok(serde_json::json!({ "connection": self.id }))
    }

    fn deinit(&mut self) -> Result<(), EngineError> {
        debug!("connection {} context released", self.id);
        Ok(())
    }
}
