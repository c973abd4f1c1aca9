//! Refs
//!
//! A [`Ref`] is a single observable slot. Plain refs hold their own value
//! and track/trigger under one fixed key. Field refs (from [`to_refs`])
//! forward to a property of a container, and computed refs forward to a
//! [`Computed`]. Containers auto-unwrap any of them on read.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::computed::Computed;
use super::dep::DepsMap;
use super::runtime::{track, trigger, OperationType, Trackable, TriggerInfo};
use crate::observe::reactive;
use crate::value::{Key, Object, Value};

enum RefKind {
    Cell(RefCell<Value>),
    Field { object: Value, key: Value },
    Computed(Computed<Value>),
}

struct RefInner {
    deps: DepsMap,
    kind: RefKind,
}

/// A single-slot observable box.
#[derive(Clone)]
pub struct Ref(Rc<RefInner>);

fn slot_key() -> Key {
    Key::from("")
}

/// Containers are stored observed.
fn convert(value: Value) -> Value {
    match value {
        Value::Object(_) => reactive(value),
        other => other,
    }
}

impl Ref {
    /// Create a ref holding `value`.
    ///
    /// Passing a ref returns that same ref.
    pub fn new(value: impl Into<Value>) -> Ref {
        match value.into() {
            Value::Ref(existing) => existing,
            value => Self::from_kind(RefKind::Cell(RefCell::new(convert(value)))),
        }
    }

    fn from_kind(kind: RefKind) -> Ref {
        Ref(Rc::new(RefInner {
            deps: DepsMap::default(),
            kind,
        }))
    }

    pub(crate) fn field(object: Value, key: Value) -> Ref {
        Self::from_kind(RefKind::Field { object, key })
    }

    pub(crate) fn computed(computed: Computed<Value>) -> Ref {
        Self::from_kind(RefKind::Computed(computed))
    }

    /// Read the held value, tracking the read.
    pub fn value(&self) -> Value {
        match &self.0.kind {
            RefKind::Cell(slot) => {
                track(self, OperationType::Get, Some(slot_key()));
                slot.borrow().clone()
            }
            RefKind::Field { object, key } => match object {
                Value::Reactive(target) => target.get(key.clone()),
                Value::Object(target) => target.get(key.clone()),
                _ => Value::Undefined,
            },
            RefKind::Computed(computed) => computed.value(),
        }
    }

    /// Replace the held value.
    ///
    /// Plain refs trigger on every assignment, even when the value is
    /// unchanged.
    pub fn set_value(&self, value: impl Into<Value>) {
        let value = value.into();
        match &self.0.kind {
            RefKind::Cell(slot) => {
                let value = convert(value);
                let old = slot.replace(value.clone());
                trigger(
                    self,
                    OperationType::Set,
                    Some(slot_key()),
                    TriggerInfo::new(Some(old), Some(value)),
                );
            }
            RefKind::Field { object, key } => match object {
                Value::Reactive(target) => {
                    target.set(key.clone(), value);
                }
                Value::Object(target) => {
                    target.set(key.clone(), value);
                }
                _ => {}
            },
            RefKind::Computed(computed) => computed.set_value(value),
        }
    }

    pub fn ptr_eq(&self, other: &Ref) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl Trackable for Ref {
    fn deps(&self) -> &DepsMap {
        &self.0.deps
    }

    fn target(&self) -> Value {
        Value::Ref(self.clone())
    }
}

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.kind {
            RefKind::Cell(slot) => match slot.try_borrow() {
                Ok(value) => write!(f, "Ref({value:?})"),
                Err(_) => f.write_str("Ref(<borrowed>)"),
            },
            RefKind::Field { key, .. } => write!(f, "Ref(field {key})"),
            RefKind::Computed(_) => f.write_str("Ref(computed)"),
        }
    }
}

/// Whether the value is a ref of any kind.
pub fn is_ref(value: &Value) -> bool {
    matches!(value, Value::Ref(_))
}

/// Build a record of field refs, one per own key of `value`.
///
/// Reading a field ref reads through the original container, so refs
/// taken from a reactive container stay reactive. On a wrapper this
/// enumerates through it and tracks iteration.
pub fn to_refs(value: &Value) -> Object {
    let keys = match value {
        Value::Reactive(target) => target.own_keys(),
        Value::Object(target) => target.own_keys(),
        _ => Vec::new(),
    };
    let refs = Object::record();
    for key in keys {
        let field = Ref::field(value.clone(), key.to_value());
        refs.set_property(key, Value::Ref(field));
    }
    refs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{effect, EffectOptions};
    use std::cell::Cell;

    #[test]
    fn ref_is_idempotent() {
        let a = Ref::new(1);
        let b = Ref::new(Value::from(&a));
        assert!(a.ptr_eq(&b));
        assert!(is_ref(&Value::from(a)));
        assert!(!is_ref(&Value::from(1)));
    }

    #[test]
    fn every_assignment_triggers() {
        let cell = Ref::new(1);
        let runs = Rc::new(Cell::new(0));
        let (c, r) = (cell.clone(), runs.clone());
        effect(
            move || {
                r.set(r.get() + 1);
                c.value();
            },
            EffectOptions::default(),
        );
        cell.set_value(2);
        cell.set_value(2);
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn containers_are_stored_observed() {
        let cell = Ref::new(Object::record());
        assert!(matches!(cell.value(), Value::Reactive(_)));
        cell.set_value(Object::array([1]));
        assert!(matches!(cell.value(), Value::Reactive(_)));
    }

    #[test]
    fn field_refs_read_and_write_through() {
        let source = Object::from_entries([("a", 1), ("b", 2)]);
        let refs = to_refs(&Value::from(&source));
        assert_eq!(refs.own_keys(), vec![Key::from("a"), Key::from("b")]);

        let a = refs.get("a");
        let a = a.as_ref_cell().unwrap();
        assert_eq!(a.value(), Value::from(1));
        a.set_value(5);
        assert_eq!(source.get("a"), Value::from(5));
    }
}
