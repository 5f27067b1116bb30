//! Tagged values that live on the execution stack.
//!
//! A [`Value`] owns its payload.  Object-backed variants hold an
//! [`ObjectRef`], so cloning a value takes a reference and dropping it
//! releases one; there is no separate deinit step.
//!
//! Values have a total order (kind first, then payload) so they can be
//! members of a [`ValueSet`] and compared by the `eq` / `lt` / `gt`
//! commands.

use crate::error::EngineError;
use crate::objects::object::compare_refs;
use crate::objects::set::ValueSet;
use crate::objects::ObjectRef;
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Kind tag of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValueKind {
    Nil,
    Bool,
    Int,
    String,
    Object,
    Set,
    Named,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Nil => write!(f, "nil"),
            ValueKind::Bool => write!(f, "bool"),
            ValueKind::Int => write!(f, "int"),
            ValueKind::String => write!(f, "string"),
            ValueKind::Object => write!(f, "object"),
            ValueKind::Set => write!(f, "set"),
            ValueKind::Named => write!(f, "named"),
        }
    }
}

/// A value with a name attached.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Named {
    pub name: String,
    pub value: Value,
}

/// A stack value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    String(String),
    /// A possibly-null object reference.
    Object(Option<ObjectRef>),
    /// Always refers to a [`ValueSet`]; build with [`Value::set`].
    Set(ObjectRef),
    Named(Box<Named>),
}

impl Value {
    /// Build a set value from `items`, dropping duplicates.
    pub fn set(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Set(ObjectRef::new(items.into_iter().collect::<ValueSet>()))
    }

    pub fn named(name: impl Into<String>, value: Value) -> Self {
        Value::Named(Box::new(Named {
            name: name.into(),
            value,
        }))
    }

    pub fn object(obj: ObjectRef) -> Self {
        Value::Object(Some(obj))
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Nil => ValueKind::Nil,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::String(_) => ValueKind::String,
            Value::Object(_) => ValueKind::Object,
            Value::Set(_) => ValueKind::Set,
            Value::Named(_) => ValueKind::Named,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    fn expected(&self, kind: ValueKind) -> EngineError {
        EngineError::invalid(format!("expected {}, got {}", kind, self.kind()))
    }

    pub fn as_int(&self) -> Result<i64, EngineError> {
        match self {
            Value::Int(i) => Ok(*i),
            other => Err(other.expected(ValueKind::Int)),
        }
    }

    pub fn as_bool(&self) -> Result<bool, EngineError> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(other.expected(ValueKind::Bool)),
        }
    }

    pub fn as_str(&self) -> Result<&str, EngineError> {
        match self {
            Value::String(s) => Ok(s),
            other => Err(other.expected(ValueKind::String)),
        }
    }

    /// The referenced object; a null reference is an error.
    pub fn as_object(&self) -> Result<&ObjectRef, EngineError> {
        match self {
            Value::Object(Some(obj)) => Ok(obj),
            Value::Object(None) => Err(EngineError::invalid("null object reference")),
            other => Err(other.expected(ValueKind::Object)),
        }
    }

    /// Snapshot of a set's members.
    pub fn set_items(&self) -> Result<Vec<Value>, EngineError> {
        match self {
            Value::Set(obj) => obj
                .with(|s: &ValueSet| s.iter().cloned().collect())
                .ok_or_else(|| EngineError::invalid("set value does not hold a set")),
            other => Err(other.expected(ValueKind::Set)),
        }
    }

    /// Condition test used by branching commands: bools as-is, ints are true
    /// when non-zero.
    pub fn truthy(&self) -> Result<bool, EngineError> {
        match self {
            Value::Bool(b) => Ok(*b),
            Value::Int(i) => Ok(*i != 0),
            other => Err(other.expected(ValueKind::Bool)),
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Nil, Value::Nil) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Object(a), Value::Object(b)) => compare_refs(a.as_ref(), b.as_ref()),
            (Value::Set(a), Value::Set(b)) => a.compare(b),
            (Value::Named(a), Value::Named(b)) => a.cmp(b),
            (a, b) => a.kind().cmp(&b.kind()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

/// Hash an object by its capability, falling back to its type name.
fn hash_object<H: Hasher>(obj: &ObjectRef, state: &mut H) {
    match obj.hash_value() {
        Ok(h) => h.hash(state),
        Err(_) => obj.type_name().hash(state),
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind().hash(state);
        match self {
            Value::Nil => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::String(s) => s.hash(state),
            Value::Object(None) => 0u8.hash(state),
            Value::Object(Some(obj)) | Value::Set(obj) => hash_object(obj, state),
            Value::Named(n) => n.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::String(s) => write!(f, "{}", s),
            Value::Object(None) => write!(f, "null"),
            Value::Object(Some(obj)) => match obj.dump() {
                Ok(json) => write!(f, "{}", json),
                Err(_) => write!(f, "<{}>", obj.type_name()),
            },
            Value::Set(_) => {
                let items = self.set_items().unwrap_or_default();
                write!(f, "{{")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "}}")
            }
            Value::Named(n) => write!(f, "{}={}", n.name, n.value),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

/// Wire form: a single-entry map from kind name to payload, e.g.
/// `{"int": 5}` or `{"named": {"name": "x", "value": {"bool": true}}}`.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        let key = self.kind().to_string();
        match self {
            Value::Nil => map.serialize_entry(&key, &())?,
            Value::Bool(b) => map.serialize_entry(&key, b)?,
            Value::Int(i) => map.serialize_entry(&key, i)?,
            Value::String(s) => map.serialize_entry(&key, s)?,
            Value::Object(None) => map.serialize_entry(&key, &())?,
            Value::Object(Some(obj)) => {
                let dumped = obj
                    .dump()
                    .unwrap_or_else(|_| serde_json::json!({ "type": obj.type_name() }));
                map.serialize_entry(&key, &dumped)?
            }
            Value::Set(_) => {
                let items = self.set_items().map_err(serde::ser::Error::custom)?;
                map.serialize_entry(&key, &items)?
            }
            Value::Named(n) => map.serialize_entry(&key, &**n)?,
        }
        map.end()
    }
}

impl Serialize for Named {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Named", 2)?;
        s.serialize_field("name", &self.name)?;
        s.serialize_field("value", &self.value)?;
        s.end()
    }
}
