//! Messages the action manager consumes and the replies it produces.

use crate::action::transaction::Transaction;
use crate::error::EngineError;
use crate::value::Value;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// A request to fire every transaction bound to `name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMessage {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone)]
pub enum Message {
    Transaction(Transaction),
    Event(EventMessage),
}

impl Message {
    pub fn id(&self) -> u64 {
        match self {
            Message::Transaction(t) => t.id,
            Message::Event(e) => e.id,
        }
    }
}

/// The answer to one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Value {
        id: u64,
        value: Option<Value>,
    },
    Error {
        /// `None` when the message could not be parsed far enough to know it.
        id: Option<u64>,
        code: i32,
        description: &'static str,
        cause: String,
    },
}

impl Reply {
    pub fn value(id: u64, value: Option<Value>) -> Self {
        Reply::Value { id, value }
    }

    pub fn error(id: Option<u64>, err: &EngineError) -> Self {
        Reply::Error {
            id,
            code: err.code(),
            description: err.description(),
            cause: err.cause().to_string(),
        }
    }

    pub fn id(&self) -> Option<u64> {
        match self {
            Reply::Value { id, .. } => Some(*id),
            Reply::Error { id, .. } => *id,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error { .. })
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: i32,
    description: &'a str,
    cause: &'a str,
}

/// `{"UID":1,"VALUE":...}` or `{"UID":1,"ERROR":{...}}`
impl Serialize for Reply {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        match self {
            Reply::Value { id, value } => {
                map.serialize_entry("UID", id)?;
                map.serialize_entry("VALUE", value)?;
            }
            Reply::Error {
                id,
                code,
                description,
                cause,
            } => {
                map.serialize_entry("UID", id)?;
                map.serialize_entry(
                    "ERROR",
                    &ErrorBody {
                        code: *code,
                        description,
                        cause,
                    },
                )?;
            }
        }
        map.end()
    }
}
