//! Observation Layer
//!
//! [`reactive`] and [`readonly`] wrap a raw [`Object`] in a [`Reactive`]
//! handle. Every access through the handle goes through an interception
//! policy that tracks reads and triggers writes; the raw object itself
//! stays untracked.
//!
//! # Policies
//!
//! Records and arrays use the keyed-container policy ([`base`]). Maps,
//! sets and their weak variants use the collection policy
//! ([`collection`]), which also backs the collection methods on
//! [`Reactive`] (`add`, `size`, `for_each`, iterators).
//!
//! Each policy comes in a mutable and a read-only flavour. Read-only views
//! reject mutation with a warning while the global [lock](lock) is
//! engaged.
//!
//! # Identity
//!
//! A raw object has at most one mutable and at most one read-only wrapper
//! alive at a time. The tables mapping raw objects to wrappers hold weak
//! references; the reverse direction is the wrapper's own `raw` field.

mod base;
mod collection;
mod lock;

pub use collection::{EntriesIter, ValuesIter};
pub use lock::{is_locked, lock, unlock};

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::{ReactiveError, Result};
use crate::reactive::Trackable;
use crate::value::{Key, Object, ObjectId, Shape, Value};
use crate::warning::{warn, Warning};

/// The interception interface every wrapped container exposes.
pub(crate) trait ProxyHandler: Sync {
    fn get(&self, target: &Reactive, key: &Value) -> Value;
    fn set(&self, target: &Reactive, key: &Value, value: Value) -> bool;
    fn delete(&self, target: &Reactive, key: &Value) -> bool;
    fn has(&self, target: &Reactive, key: &Value) -> bool;
    fn own_keys(&self, target: &Reactive) -> Vec<Key>;
}

struct ProxyInner {
    raw: Object,
    readonly: bool,
    handler: &'static dyn ProxyHandler,
}

#[derive(Default)]
struct ProxyTables {
    reactive: HashMap<ObjectId, Weak<ProxyInner>>,
    readonly: HashMap<ObjectId, Weak<ProxyInner>>,
}

impl ProxyTables {
    fn table(&mut self, readonly: bool) -> &mut HashMap<ObjectId, Weak<ProxyInner>> {
        if readonly {
            &mut self.readonly
        } else {
            &mut self.reactive
        }
    }
}

thread_local! {
    static TABLES: RefCell<ProxyTables> = RefCell::new(ProxyTables::default());
}

impl Drop for ProxyInner {
    fn drop(&mut self) {
        let id = self.raw.id();
        let readonly = self.readonly;
        // The tables may already be gone during thread teardown.
        let _ = TABLES.try_with(|tables| {
            if let Ok(mut tables) = tables.try_borrow_mut() {
                let table = tables.table(readonly);
                if table.get(&id).is_some_and(|w| w.strong_count() == 0) {
                    table.remove(&id);
                }
            }
        });
    }
}

/// An observed view over a raw container.
///
/// Cloning the handle does not create a new wrapper; handles compare by
/// identity.
#[derive(Clone)]
pub struct Reactive(Rc<ProxyInner>);

impl Reactive {
    /// The raw container behind the view.
    pub fn raw(&self) -> &Object {
        &self.0.raw
    }

    pub fn is_readonly(&self) -> bool {
        self.0.readonly
    }

    pub fn shape(&self) -> Shape {
        self.0.raw.shape()
    }

    pub fn ptr_eq(&self, other: &Reactive) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    // Capability interface

    /// Read a property (or map entry), tracking the read.
    ///
    /// Nested containers come back wrapped with this view's policy; refs
    /// come back unwrapped.
    pub fn get(&self, key: impl Into<Value>) -> Value {
        self.0.handler.get(self, &key.into())
    }

    /// Write a property (or map entry). Returns `false` if the container
    /// rejected the write.
    pub fn set(&self, key: impl Into<Value>, value: impl Into<Value>) -> bool {
        self.0.handler.set(self, &key.into(), value.into())
    }

    pub fn delete(&self, key: impl Into<Value>) -> bool {
        self.0.handler.delete(self, &key.into())
    }

    pub fn has(&self, key: impl Into<Value>) -> bool {
        self.0.handler.has(self, &key.into())
    }

    /// Enumerate own keys, tracking iteration.
    pub fn own_keys(&self) -> Vec<Key> {
        self.0.handler.own_keys(self)
    }

    // Array helpers, built on the capability interface

    /// Array length (through `length`), collection size or key count.
    pub fn len(&self) -> usize {
        match self.shape() {
            Shape::Array => self
                .get(Key::length())
                .as_number()
                .map_or(0, |n| n as usize),
            shape if shape.is_collection() => self.size().unwrap_or(0),
            _ => self.own_keys().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append to an array, returning the new length.
    pub fn push(&self, value: impl Into<Value>) -> Result<usize> {
        self.require_array("push")?;
        let len = self.len();
        self.set(len, value);
        self.set(Key::length(), len + 1);
        Ok(len + 1)
    }

    /// Remove and return the last element of an array.
    pub fn pop(&self) -> Result<Value> {
        self.require_array("pop")?;
        let len = self.len();
        if len == 0 {
            self.set(Key::length(), 0);
            return Ok(Value::Undefined);
        }
        let last = self.get(len - 1);
        self.delete(len - 1);
        self.set(Key::length(), len - 1);
        Ok(last)
    }

    /// Remove and return the first element of an array.
    pub fn shift(&self) -> Result<Value> {
        self.require_array("shift")?;
        let len = self.len();
        if len == 0 {
            self.set(Key::length(), 0);
            return Ok(Value::Undefined);
        }
        let first = self.get(0);
        for index in 1..len {
            if self.has(index) {
                // Move the raw element so nested wrappers are not stored.
                let element = to_raw(&self.get(index));
                self.set(index - 1, element);
            } else {
                self.delete(index - 1);
            }
        }
        self.delete(len - 1);
        self.set(Key::length(), len - 1);
        Ok(first)
    }

    fn require_array(&self, op: &'static str) -> Result<()> {
        match self.shape() {
            Shape::Array => Ok(()),
            shape => Err(ReactiveError::Unsupported { op, shape }),
        }
    }

    // Collection methods

    /// Add a member to a set-like collection.
    pub fn add(&self, value: impl Into<Value>) -> Result<&Self> {
        collection::add(self, value.into())?;
        Ok(self)
    }

    /// Remove every entry from a map or set.
    pub fn clear(&self) -> Result<()> {
        collection::clear(self)
    }

    /// Number of entries in a map or set, tracking iteration.
    pub fn size(&self) -> Result<usize> {
        collection::size(self)
    }

    /// Visit every `(value, key)` pair of a map or set. Both are wrapped
    /// with this view's policy.
    pub fn for_each(&self, f: impl FnMut(Value, Value, &Reactive)) -> Result<()> {
        collection::for_each(self, f)
    }

    pub fn keys(&self) -> Result<ValuesIter> {
        collection::keys(self)
    }

    pub fn values(&self) -> Result<ValuesIter> {
        collection::values(self)
    }

    pub fn entries(&self) -> Result<EntriesIter> {
        collection::entries(self)
    }
}

impl PartialEq for Reactive {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Reactive {}

impl fmt::Debug for Reactive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_readonly() { "Readonly" } else { "Reactive" };
        write!(f, "{kind}({:?})", self.0.raw)
    }
}

fn can_observe(raw: &Object) -> bool {
    !raw.is_internal() && raw.shape().is_observable() && !raw.is_marked_non_reactive()
}

fn handler_for(shape: Shape, readonly: bool) -> &'static dyn ProxyHandler {
    if shape.is_collection() {
        collection::handlers(readonly)
    } else {
        base::handlers(readonly)
    }
}

fn create_reactive_object(value: Value, readonly: bool) -> Value {
    let raw = match value {
        Value::Object(raw) => raw,
        // Already a wrapper of the requested kind (callers convert the
        // other kind before getting here).
        Value::Reactive(_) => return value,
        other => {
            warn(Warning::NotReactive {
                value: other.to_string(),
            });
            return other;
        }
    };

    let existing = TABLES.with(|tables| {
        tables
            .borrow_mut()
            .table(readonly)
            .get(&raw.id())
            .and_then(Weak::upgrade)
    });
    if let Some(existing) = existing {
        return Value::Reactive(Reactive(existing));
    }
    if !can_observe(&raw) {
        return Value::Object(raw);
    }

    let wrapper = Rc::new(ProxyInner {
        handler: handler_for(raw.shape(), readonly),
        raw: raw.clone(),
        readonly,
    });
    TABLES.with(|tables| {
        tables
            .borrow_mut()
            .table(readonly)
            .insert(raw.id(), Rc::downgrade(&wrapper));
    });
    raw.deps().ensure();
    tracing::trace!(object = ?raw, readonly, "wrapped");
    Value::Reactive(Reactive(wrapper))
}

/// Return the mutable observed view of a container.
///
/// Read-only views are returned unchanged, containers marked read-only
/// get a read-only view, and non-containers are returned unchanged with
/// a warning.
pub fn reactive(value: impl Into<Value>) -> Value {
    let value = value.into();
    if matches!(&value, Value::Reactive(view) if view.is_readonly()) {
        return value;
    }
    if matches!(&value, Value::Object(raw) if raw.is_marked_readonly()) {
        return readonly(value);
    }
    create_reactive_object(value, false)
}

/// Return the read-only observed view of a container.
///
/// A mutable view is first unwrapped to its raw container.
pub fn readonly(value: impl Into<Value>) -> Value {
    let value = match value.into() {
        Value::Reactive(view) if !view.is_readonly() => Value::Object(view.raw().clone()),
        other => other,
    };
    create_reactive_object(value, true)
}

/// Whether the value is an observed view (mutable or read-only).
pub fn is_reactive(value: &Value) -> bool {
    matches!(value, Value::Reactive(_))
}

pub fn is_readonly(value: &Value) -> bool {
    matches!(value, Value::Reactive(view) if view.is_readonly())
}

/// The raw container behind a view, or the value itself.
pub fn to_raw(value: &Value) -> Value {
    match value {
        Value::Reactive(view) => Value::Object(view.raw().clone()),
        other => other.clone(),
    }
}

/// Make later calls to [`reactive`] on this container produce a
/// read-only view.
pub fn mark_readonly(value: impl Into<Value>) -> Value {
    let value = value.into();
    if let Value::Object(raw) = &value {
        raw.mark_readonly();
    }
    value
}

/// Never observe this container.
pub fn mark_non_reactive(value: impl Into<Value>) -> Value {
    let value = value.into();
    if let Value::Object(raw) = &value {
        raw.mark_non_reactive();
    }
    value
}

/// Flag a container as framework-internal (component instances and the
/// like). Internal containers are never observed.
pub fn mark_internal(value: impl Into<Value>) -> Value {
    let value = value.into();
    if let Value::Object(raw) = &value {
        raw.mark_internal();
    }
    value
}

/// Wrap a container read out of a view with that view's policy.
pub(crate) fn wrap(value: Value, readonly_view: bool) -> Value {
    if !value.is_container() {
        return value;
    }
    if readonly_view {
        readonly(value)
    } else {
        reactive(value)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
