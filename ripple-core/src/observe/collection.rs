//! Collection policy (maps, sets and their weak variants).
//!
//! Collections expose their contents through methods rather than
//! properties, so each method is instrumented: keys and values are reduced
//! to raw form before they reach the raw collection, reads track, writes
//! trigger, and whatever is handed back is wrapped with the view's policy.

use std::vec;

use super::{is_locked, to_raw, wrap, ProxyHandler, Reactive};
use crate::error::{ReactiveError, Result};
use crate::reactive::{track, trigger, OperationType, TriggerInfo};
use crate::value::{Key, Shape, Value};
use crate::warning::{warn, Warning};

pub(super) struct CollectionHandlers;

static HANDLERS: CollectionHandlers = CollectionHandlers;

pub(super) fn handlers(_readonly: bool) -> &'static dyn ProxyHandler {
    // Both policies share one table; the read-only checks look at the
    // view itself.
    &HANDLERS
}

fn is_map(shape: Shape) -> bool {
    matches!(shape, Shape::Map | Shape::WeakMap)
}

fn require(target: &Reactive, op: &'static str, allowed: fn(Shape) -> bool) -> Result<()> {
    let shape = target.shape();
    if allowed(shape) {
        Ok(())
    } else {
        Err(ReactiveError::Unsupported { op, shape })
    }
}

fn iterable(shape: Shape) -> bool {
    matches!(shape, Shape::Map | Shape::Set)
}

fn set_like(shape: Shape) -> bool {
    matches!(shape, Shape::Set | Shape::WeakSet)
}

/// Refuse a mutation through a locked read-only view.
fn rejects(target: &Reactive, operation: OperationType, key: Option<&Value>) -> bool {
    if !(target.is_readonly() && is_locked()) {
        return false;
    }
    warn(Warning::ReadonlyMutation {
        operation,
        key: key.filter(|k| k.truthy()).map(ToString::to_string),
    });
    true
}

impl ProxyHandler for CollectionHandlers {
    fn get(&self, target: &Reactive, key: &Value) -> Value {
        if is_map(target.shape()) {
            get(target, key)
        } else {
            Value::Undefined
        }
    }

    fn set(&self, target: &Reactive, key: &Value, value: Value) -> bool {
        is_map(target.shape()) && set(target, key, value).is_ok()
    }

    fn delete(&self, target: &Reactive, key: &Value) -> bool {
        delete(target, key)
    }

    fn has(&self, target: &Reactive, key: &Value) -> bool {
        has(target, key)
    }

    fn own_keys(&self, _target: &Reactive) -> Vec<Key> {
        Vec::new()
    }
}

fn get(target: &Reactive, key: &Value) -> Value {
    let raw = target.raw();
    let key = to_raw(key);
    track(raw, OperationType::Get, Some(Key::Value(key.clone())));
    wrap(raw.entry_get(&key).unwrap_or_default(), target.is_readonly())
}

fn has(target: &Reactive, key: &Value) -> bool {
    let raw = target.raw();
    let key = to_raw(key);
    track(raw, OperationType::Has, Some(Key::Value(key.clone())));
    raw.entry_has(&key)
}

pub(super) fn size(target: &Reactive) -> Result<usize> {
    require(target, "size", iterable)?;
    let raw = target.raw();
    track(raw, OperationType::Iterate, None);
    Ok(raw.len())
}

pub(super) fn add(target: &Reactive, value: Value) -> Result<()> {
    require(target, "add", set_like)?;
    if rejects(target, OperationType::Add, Some(&value)) {
        return Ok(());
    }
    let raw = target.raw();
    let value = to_raw(&value);
    let had = raw.entry_has(&value);
    raw.set_add(value.clone())?;
    if !had {
        let info = TriggerInfo::new(None, Some(value.clone()));
        trigger(raw, OperationType::Add, Some(Key::Value(value)), info);
    }
    Ok(())
}

fn set(target: &Reactive, key: &Value, value: Value) -> Result<()> {
    require(target, "set", is_map)?;
    if rejects(target, OperationType::Set, Some(key)) {
        return Ok(());
    }
    let raw = target.raw();
    let key = to_raw(key);
    let value = to_raw(&value);
    let had = raw.entry_has(&key);
    let old_value = raw.entry_get(&key);
    raw.entry_insert(key.clone(), value.clone())?;
    match old_value {
        None if !had => {
            let info = TriggerInfo::new(None, Some(value));
            trigger(raw, OperationType::Add, Some(Key::Value(key)), info);
        }
        Some(old) if !value.same(&old) => {
            let info = TriggerInfo::new(Some(old), Some(value));
            trigger(raw, OperationType::Set, Some(Key::Value(key)), info);
        }
        _ => {}
    }
    Ok(())
}

fn delete(target: &Reactive, key: &Value) -> bool {
    if rejects(target, OperationType::Delete, Some(key)) {
        return false;
    }
    let raw = target.raw();
    let key = to_raw(key);
    let old_value = raw.entry_get(&key);
    let had = raw.entry_remove(&key).is_some();
    if had {
        let info = TriggerInfo::new(old_value, None);
        trigger(raw, OperationType::Delete, Some(Key::Value(key)), info);
    }
    had
}

pub(super) fn clear(target: &Reactive) -> Result<()> {
    require(target, "clear", iterable)?;
    if rejects(target, OperationType::Clear, None) {
        return Ok(());
    }
    let raw = target.raw();
    let had_items = !raw.is_empty();
    let old_target = raw.shallow_clone();
    raw.entry_clear();
    if had_items {
        let info = TriggerInfo {
            old_target: Some(old_target),
            ..TriggerInfo::default()
        };
        trigger(raw, OperationType::Clear, None, info);
    }
    Ok(())
}

pub(super) fn for_each(
    target: &Reactive,
    mut f: impl FnMut(Value, Value, &Reactive),
) -> Result<()> {
    require(target, "forEach", iterable)?;
    let raw = target.raw();
    track(raw, OperationType::Iterate, None);
    let readonly = target.is_readonly();
    for (key, value) in raw.entries_snapshot() {
        f(wrap(value, readonly), wrap(key, readonly), target);
    }
    Ok(())
}

fn snapshot(target: &Reactive, op: &'static str) -> Result<Vec<(Value, Value)>> {
    require(target, op, iterable)?;
    let raw = target.raw();
    track(raw, OperationType::Iterate, None);
    Ok(raw.entries_snapshot())
}

pub(super) fn keys(target: &Reactive) -> Result<ValuesIter> {
    let items = snapshot(target, "keys")?.into_iter().map(|(k, _)| k);
    Ok(ValuesIter::new(items.collect(), target.is_readonly()))
}

pub(super) fn values(target: &Reactive) -> Result<ValuesIter> {
    let items = snapshot(target, "values")?.into_iter().map(|(_, v)| v);
    Ok(ValuesIter::new(items.collect(), target.is_readonly()))
}

pub(super) fn entries(target: &Reactive) -> Result<EntriesIter> {
    Ok(EntriesIter {
        inner: snapshot(target, "entries")?.into_iter(),
        readonly: target.is_readonly(),
    })
}

/// Keys or values of a collection, wrapped as they are yielded.
///
/// The contents are captured when the iterator is created.
pub struct ValuesIter {
    inner: vec::IntoIter<Value>,
    readonly: bool,
}

impl ValuesIter {
    fn new(items: Vec<Value>, readonly: bool) -> Self {
        Self {
            inner: items.into_iter(),
            readonly,
        }
    }
}

impl Iterator for ValuesIter {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        self.inner.next().map(|v| wrap(v, self.readonly))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for ValuesIter {}

/// `(key, value)` pairs of a collection, wrapped as they are yielded.
pub struct EntriesIter {
    inner: vec::IntoIter<(Value, Value)>,
    readonly: bool,
}

impl Iterator for EntriesIter {
    type Item = (Value, Value);

    fn next(&mut self) -> Option<(Value, Value)> {
        let (key, value) = self.inner.next()?;
        Some((wrap(key, self.readonly), wrap(value, self.readonly)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for EntriesIter {}
