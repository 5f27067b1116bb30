//! Reference-counted, lock-guarded objects with capability dispatch.
//!
//! An [`ObjectRef`] is a shared handle to a `dyn Object` behind a
//! reader/writer lock.  Cloning a handle takes a reference; dropping the last
//! handle runs the type's [`Object::deinit`] and frees the object.
//!
//! Capabilities (`hash`, `compare`, `dump`, `run`) are trait methods whose
//! default implementation reports [`EngineError::Unsupported`], so a type only
//! implements what it supports and callers never panic on a missing one.

use crate::error::EngineError;
use crate::value::Value;
use log::warn;
use std::any::Any;
use std::cmp::Ordering;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Build the error returned when `type_name` lacks `capability`.
pub fn unsupported(type_name: &str, capability: &str) -> EngineError {
    EngineError::Unsupported(format!("{} has no {} capability", type_name, capability))
}

/// Behaviour shared by every object type.
///
/// Only [`type_name`](Object::type_name) and the `Any` accessors are
/// mandatory.
pub trait Object: Any + Send + Sync + fmt::Debug {
    /// Stable name of the concrete type, used in errors and ordering.
    fn type_name(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Hash of the object's contents.
    fn hash_value(&self) -> Result<u64, EngineError> {
        Err(unsupported(self.type_name(), "hash"))
    }

    /// Compare against another object of the same type.
    ///
    /// Implementations return `Unsupported` when `other` is not their type.
    fn compare(&self, _other: &dyn Object) -> Result<Ordering, EngineError> {
        Err(unsupported(self.type_name(), "compare"))
    }

    /// JSON rendering used in replies and log output.
    fn dump(&self) -> Result<serde_json::Value, EngineError> {
        Err(unsupported(self.type_name(), "dump"))
    }

    /// Invoke the object on a run of stack values.
    ///
    /// Same contract as a regular command: rewrite `args` in place and
    /// return how many leading slots to keep.
    fn run(&self, _args: &mut [Value]) -> Result<usize, EngineError> {
        Err(unsupported(self.type_name(), "run"))
    }

    /// Release external resources.  Called once, when the last reference
    /// goes away.  A failure is logged; the memory is reclaimed regardless.
    fn deinit(&mut self) -> Result<(), EngineError> {
        Ok(())
    }
}

/// Storage behind an [`ObjectRef`].
struct ObjectCell {
    inner: RwLock<Box<dyn Object>>,
}

impl Drop for ObjectCell {
    fn drop(&mut self) {
        let obj = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = obj.deinit() {
            warn!("deinit of {} failed: {}", obj.type_name(), e);
        }
    }
}

/// Shared handle to an object.
#[derive(Clone)]
pub struct ObjectRef(Arc<ObjectCell>);

impl ObjectRef {
    /// Wrap `obj` in a fresh handle with a reference count of one.
    pub fn new<T: Object>(obj: T) -> Self {
        Self(Arc::new(ObjectCell {
            inner: RwLock::new(Box::new(obj)),
        }))
    }

    /// Take the read lock.
    pub fn read(&self) -> RwLockReadGuard<'_, Box<dyn Object>> {
        self.0.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take the write lock.
    pub fn write(&self) -> RwLockWriteGuard<'_, Box<dyn Object>> {
        self.0.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of live handles to this object.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    /// Whether both handles point at the same object.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    pub fn type_name(&self) -> &'static str {
        self.read().type_name()
    }

    /// Run `f` on the object if it is a `T`.
    pub fn with<T: Object, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let guard = self.read();
        guard.as_any().downcast_ref::<T>().map(f)
    }

    /// Run `f` on the object, mutably, if it is a `T`.
    pub fn with_mut<T: Object, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut guard = self.write();
        guard.as_any_mut().downcast_mut::<T>().map(f)
    }

    pub fn hash_value(&self) -> Result<u64, EngineError> {
        self.read().hash_value()
    }

    pub fn dump(&self) -> Result<serde_json::Value, EngineError> {
        self.read().dump()
    }

    pub fn run(&self, args: &mut [Value]) -> Result<usize, EngineError> {
        self.read().run(args)
    }

    /// Capability-based comparison.
    ///
    /// Objects of different types are ordered by type name.  Objects of the
    /// same type without a `compare` capability are ordered by address, which
    /// is total and stable while both are alive.
    pub fn compare(&self, other: &Self) -> Ordering {
        if self.ptr_eq(other) {
            return Ordering::Equal;
        }
        let a = self.read();
        let b = other.read();
        match a.type_name().cmp(b.type_name()) {
            Ordering::Equal => {}
            ord => return ord,
        }
        a.compare(&**b)
            .unwrap_or_else(|_| self.addr().cmp(&other.addr()))
    }
}

/// Compare two optional references: two nulls are equal and null sorts
/// before any object.
pub fn compare_refs(a: Option<&ObjectRef>, b: Option<&ObjectRef>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => a.compare(b),
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.inner.try_read() {
            Ok(obj) => write!(f, "ObjectRef({:?}, refs={})", obj, self.ref_count()),
            Err(_) => write!(f, "ObjectRef(<locked>, refs={})", self.ref_count()),
        }
    }
}
