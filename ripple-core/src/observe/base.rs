//! Keyed-container policy (records and arrays).

use super::{is_locked, to_raw, wrap, ProxyHandler, Reactive};
use crate::reactive::{track, trigger, OperationType, TriggerInfo};
use crate::value::{Key, Shape, Value};
use crate::warning::{warn, Warning};

pub(super) struct BaseHandlers {
    readonly: bool,
}

static MUTABLE: BaseHandlers = BaseHandlers { readonly: false };
static READONLY: BaseHandlers = BaseHandlers { readonly: true };

pub(super) fn handlers(readonly: bool) -> &'static dyn ProxyHandler {
    if readonly {
        &READONLY
    } else {
        &MUTABLE
    }
}

impl BaseHandlers {
    /// Whether a mutation must be refused (and warned about).
    fn rejects(&self, operation: OperationType, key: &Key) -> bool {
        if self.readonly && is_locked() {
            warn(Warning::ReadonlyMutation {
                operation,
                key: Some(key.to_string()),
            });
            return true;
        }
        false
    }
}

impl ProxyHandler for BaseHandlers {
    fn get(&self, target: &Reactive, key: &Value) -> Value {
        let raw = target.raw();
        let key = Key::property(key.clone());
        let result = raw.get_property(&key).unwrap_or_default();
        if key.is_well_known_symbol() {
            return result;
        }
        if let Value::Ref(cell) = &result {
            return cell.value();
        }
        track(raw, OperationType::Get, Some(key));
        wrap(result, self.readonly)
    }

    fn set(&self, target: &Reactive, key: &Value, value: Value) -> bool {
        let key = Key::property(key.clone());
        if self.rejects(OperationType::Set, &key) {
            return true;
        }
        let raw = target.raw();
        let value = to_raw(&value);
        let had_key = raw.has_own(&key);
        let old_value = raw.get_property(&key).unwrap_or_default();

        // Assigning to a slot holding a ref writes through the ref.
        if let Value::Ref(cell) = &old_value {
            if !matches!(value, Value::Ref(_)) {
                cell.set_value(value);
                return true;
            }
        }

        if !raw.set_property(key.clone(), value.clone()) {
            return false;
        }
        if !had_key {
            let info = TriggerInfo::new(Some(old_value), Some(value));
            trigger(raw, OperationType::Add, Some(key), info);
        } else if !value.same(&old_value) {
            let info = TriggerInfo::new(Some(old_value), Some(value));
            trigger(raw, OperationType::Set, Some(key), info);
        }
        true
    }

    fn delete(&self, target: &Reactive, key: &Value) -> bool {
        let key = Key::property(key.clone());
        if self.rejects(OperationType::Delete, &key) {
            return false;
        }
        let raw = target.raw();
        let had_key = raw.has_own(&key);
        let old_value = raw.get_property(&key);
        let result = raw.delete_property(&key);
        if result && had_key {
            let info = TriggerInfo::new(old_value, None);
            trigger(raw, OperationType::Delete, Some(key), info);
        }
        result
    }

    fn has(&self, target: &Reactive, key: &Value) -> bool {
        let raw = target.raw();
        let key = Key::property(key.clone());
        let result = raw.has_own(&key);
        track(raw, OperationType::Has, Some(key));
        result
    }

    fn own_keys(&self, target: &Reactive) -> Vec<Key> {
        let raw = target.raw();
        let key = (raw.shape() == Shape::Array).then(Key::length);
        track(raw, OperationType::Iterate, key);
        raw.property_keys()
    }
}

#[cfg(test)]
mod tests {
    use crate::observe::{lock, reactive, readonly, unlock};
    use crate::reactive::{effect, EffectOptions, Ref, Trackable};
    use crate::value::{Key, Object, Symbol, Value};
    use crate::warning::{set_warn_handler, take_warn_handler};
    use std::cell::Cell;
    use std::rc::Rc;

    fn observe(object: Object) -> super::Reactive {
        reactive(object).into_reactive().unwrap()
    }

    #[test]
    fn unchanged_write_does_not_trigger() {
        let state = observe(Object::from_entries([("a", 1)]));
        let runs = Rc::new(Cell::new(0));
        let r = runs.clone();
        let s = state.clone();
        effect(
            move || {
                r.set(r.get() + 1);
                s.get("a");
            },
            EffectOptions::default(),
        );
        state.set("a", 1);
        assert_eq!(runs.get(), 1);
        state.set("a", 2);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn nan_writes_always_trigger() {
        let state = observe(Object::from_entries([("n", f64::NAN)]));
        let runs = Rc::new(Cell::new(0));
        let r = runs.clone();
        let s = state.clone();
        effect(
            move || {
                r.set(r.get() + 1);
                s.get("n");
            },
            EffectOptions::default(),
        );
        state.set("n", f64::NAN);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn nested_containers_wrap_lazily() {
        let inner = Object::record();
        let state = observe(Object::from_entries([("inner", &inner)]));
        let nested = state.get("inner");
        assert!(matches!(nested, Value::Reactive(_)));
        assert!(nested.same(&reactive(&inner)));
        assert!(matches!(state.raw().get("inner"), Value::Object(_)));
    }

    #[test]
    fn stores_raw_values() {
        let state = observe(Object::record());
        let other = reactive(Object::record());
        state.set("child", other.clone());
        assert!(matches!(state.raw().get("child"), Value::Object(_)));
        assert!(state.get("child").same(&other));
    }

    #[test]
    fn refs_unwrap_and_take_assignments() {
        let cell = Ref::new(1);
        let state = observe(Object::from_entries([("count", &cell)]));
        assert_eq!(state.get("count"), Value::from(1));
        state.set("count", 2);
        assert_eq!(cell.value(), Value::from(2));
        assert!(matches!(state.raw().get("count"), Value::Ref(_)));
    }

    #[test]
    fn well_known_symbols_are_not_tracked() {
        let state = observe(Object::record());
        let raw = state.raw().clone();
        let s = state.clone();
        effect(
            move || {
                s.get(Symbol::iterator());
            },
            EffectOptions::default(),
        );
        assert!(raw.deps().get(&Key::Symbol(Symbol::iterator())).is_none());
    }

    #[test]
    fn readonly_rejects_while_locked() {
        let warnings = Rc::new(Cell::new(0));
        let w = warnings.clone();
        set_warn_handler(move |_| w.set(w.get() + 1));

        let raw = Object::from_entries([("a", 1)]);
        let view = readonly(&raw).into_reactive().unwrap();
        assert!(view.set("a", 2));
        assert!(!view.delete("a"));
        assert_eq!(raw.get("a"), Value::from(1));
        assert_eq!(warnings.get(), 2);

        unlock();
        view.set("a", 3);
        lock();
        assert_eq!(raw.get("a"), Value::from(3));
        take_warn_handler();
        assert_eq!(warnings.get(), 2);
    }

    #[test]
    fn readonly_nested_reads_stay_readonly() {
        let raw = Object::from_entries([("inner", Object::record())]);
        let view = readonly(&raw).into_reactive().unwrap();
        let inner = view.get("inner").into_reactive().unwrap();
        assert!(inner.is_readonly());
    }
}
