//! Integration Tests for Observed Containers
//!
//! Mutable and read-only views over records, arrays and collections:
//! identity, nested wrapping, the read-only gate and collection methods.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use ripple_core::{
    effect, is_reactive, is_readonly, lock, mark_internal, mark_readonly, reactive, readonly,
    set_warn_handler, take_warn_handler, to_raw, unlock, EffectOptions, Object, OperationType,
    Reactive, ReactiveError, Ref, Shape, Value, Warning,
};

fn observe(object: Object) -> Reactive {
    reactive(object).into_reactive().expect("observable container")
}

fn view(object: Object) -> Reactive {
    readonly(object).into_reactive().expect("observable container")
}

/// Capture this thread's warnings until the guard is dropped.
struct Warnings(Rc<RefCell<Vec<Warning>>>);

impl Warnings {
    fn capture() -> Self {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        set_warn_handler(move |w| sink.borrow_mut().push(w.clone()));
        Self(log)
    }

    fn take(&self) -> Vec<Warning> {
        std::mem::take(&mut *self.0.borrow_mut())
    }
}

impl Drop for Warnings {
    fn drop(&mut self) {
        take_warn_handler();
    }
}

// ============================================================================
// Mutable views
// ============================================================================

/// Test that a record view reads and writes through to the raw container.
#[test]
fn record_view_passes_through() {
    let raw = Object::from_entries([("foo", 1)]);
    let observed = observe(raw.clone());

    assert!(!observed.raw().ptr_eq(&Object::record()));
    assert!(observed.raw().ptr_eq(&raw));
    assert_eq!(observed.get("foo"), Value::from(1));
    assert!(observed.has("foo"));
    assert_eq!(observed.own_keys().len(), 1);

    observed.set("bar", 2);
    assert_eq!(raw.get("bar"), Value::from(2));
    observed.delete("foo");
    assert!(!raw.has("foo"));
}

/// Test that an array view behaves like the array.
#[test]
fn array_view_passes_through() {
    let raw = Object::array([1, 2, 3]);
    let observed = observe(raw.clone());

    assert_eq!(observed.len(), 3);
    assert_eq!(observed.get(1), Value::from(2));
    assert_eq!(observed.push(4).unwrap(), 4);
    assert_eq!(raw.len(), 4);
    assert_eq!(observed.pop().unwrap(), Value::from(4));
    assert_eq!(observed.shift().unwrap(), Value::from(1));
    assert_eq!(raw.get(0), Value::from(2));
    assert_eq!(raw.len(), 2);
}

/// Test that array helpers refuse non-arrays.
#[test]
fn array_helpers_require_arrays() {
    let observed = observe(Object::record());
    assert_eq!(
        observed.push(1),
        Err(ReactiveError::Unsupported {
            op: "push",
            shape: Shape::Record
        })
    );
}

/// Test that nested containers come back as views.
#[test]
fn nested_containers_are_wrapped() {
    let raw = Object::from_entries([
        ("nested", Value::from(Object::from_entries([("foo", 1)]))),
        ("array", Value::from(Object::array([Object::from_entries([("bar", 2)])]))),
    ]);
    let observed = observe(raw);

    assert!(is_reactive(&observed.get("nested")));
    let array = observed.get("array").into_reactive().expect("array view");
    assert!(is_reactive(&array.get(0)));
}

/// Test that a container has exactly one mutable view.
#[test]
fn views_are_cached_per_container() {
    let raw = Object::record();
    let a = reactive(&raw);
    let b = reactive(&raw);
    assert!(a.same(&b));
    assert!(reactive(a.clone()).same(&a));

    let parent = observe(Object::from_entries([("child", &raw)]));
    assert!(parent.get("child").same(&a));
}

/// Test that assigning a view stores the raw container.
#[test]
fn assignments_store_raw_values() {
    let observed = observe(Object::record());
    let child = reactive(Object::from_entries([("foo", 1)]));
    observed.set("child", child.clone());

    let stored = observed.raw().get("child");
    assert!(!is_reactive(&stored));
    assert!(stored.same(&to_raw(&child)));
    assert!(observed.get("child").same(&child));
}

/// Test that a value written to the raw container is wrapped when read.
#[test]
fn raw_writes_are_wrapped_on_read() {
    let raw = Object::record();
    let observed = observe(raw.clone());
    let foo = Object::record();
    raw.set("foo", &foo);

    let read = observed.get("foo");
    assert!(is_reactive(&read));
    assert!(to_raw(&read).same(&Value::from(&foo)));
}

/// Test that primitives and unobservable objects are returned as they are.
#[test]
fn unobservable_values_pass_through() {
    let warnings = Warnings::capture();

    assert_eq!(reactive(1), Value::from(1));
    assert_eq!(reactive("foo"), Value::from("foo"));
    assert_eq!(reactive(false), Value::from(false));
    assert_eq!(reactive(Value::Null), Value::Null);
    assert_eq!(reactive(Value::Undefined), Value::Undefined);
    assert_eq!(warnings.take().len(), 5);

    for object in [Object::date(0.0), Object::regexp("x"), Object::promise()] {
        let result = reactive(&object);
        assert!(!is_reactive(&result));
        assert!(result.same(&Value::from(&object)));
    }
    assert!(warnings.take().is_empty());
}

/// Test that framework-internal containers are never observed.
#[test]
fn internal_containers_are_skipped() {
    let instance = mark_internal(Object::record());
    assert!(!is_reactive(&reactive(instance.clone())));
    assert!(reactive(instance.clone()).same(&instance));
}

/// Test that a ref stored in a record is unwrapped on read.
#[test]
fn refs_in_records_are_unwrapped() {
    let count = Ref::new(1);
    let observed = observe(Object::from_entries([("count", &count)]));

    assert_eq!(observed.get("count"), Value::from(1));
    observed.set("count", 2);
    assert_eq!(count.value(), Value::from(2));

    let replacement = Ref::new(10);
    observed.set("count", &replacement);
    assert_eq!(observed.get("count"), Value::from(10));
    assert_eq!(count.value(), Value::from(2));
}

// ============================================================================
// Read-only views
// ============================================================================

/// Test that a read-only view refuses writes while locked.
#[test]
fn readonly_refuses_mutation_when_locked() {
    let warnings = Warnings::capture();
    let raw = Object::from_entries([("foo", 1)]);
    let frozen = view(raw.clone());

    assert!(frozen.set("foo", 2));
    assert!(!frozen.delete("foo"));
    assert_eq!(raw.get("foo"), Value::from(1));

    let logged = warnings.take();
    assert_eq!(
        logged,
        vec![
            Warning::ReadonlyMutation {
                operation: OperationType::Set,
                key: Some("foo".into())
            },
            Warning::ReadonlyMutation {
                operation: OperationType::Delete,
                key: Some("foo".into())
            },
        ]
    );
    assert_eq!(
        logged[0].to_string(),
        "Set operation on key \"foo\" failed: target is readonly."
    );
}

/// Test that unlocking lets writes through and effects see them.
#[test]
fn readonly_allows_mutation_when_unlocked() {
    let frozen = view(Object::from_entries([("foo", 1)]));
    let seen = Rc::new(Cell::new(0.0));
    let (f, s) = (frozen.clone(), seen.clone());
    effect(
        move || s.set(f.get("foo").as_number().unwrap_or_default()),
        EffectOptions::default(),
    );

    frozen.set("foo", 2);
    assert_eq!(seen.get(), 1.0);

    unlock();
    frozen.set("foo", 3);
    lock();
    assert_eq!(seen.get(), 3.0);
}

/// Test that a read-only view wraps nested containers read-only.
#[test]
fn readonly_is_deep() {
    let frozen = view(Object::from_entries([(
        "nested",
        Object::from_entries([("foo", 1)]),
    )]));
    let nested = frozen.get("nested");
    assert!(is_readonly(&nested));
}

/// Test the relationship between mutable and read-only views.
#[test]
fn readonly_and_mutable_views_are_distinct() {
    let raw = Object::record();
    let mutable = reactive(&raw);
    let frozen = readonly(mutable.clone());

    assert!(is_readonly(&frozen));
    assert!(!frozen.same(&mutable));
    assert!(to_raw(&frozen).same(&Value::from(&raw)));
    assert!(readonly(&raw).same(&frozen));
    // Asking for a mutable view of a read-only one keeps it read-only.
    assert!(reactive(frozen.clone()).same(&frozen));
}

/// Test that containers marked read-only get read-only views.
#[test]
fn marked_readonly_containers_become_readonly() {
    let raw = mark_readonly(Object::record());
    assert!(is_readonly(&reactive(raw)));
}

// ============================================================================
// Collections
// ============================================================================

/// Test that a map view tracks per-key reads and iteration separately.
#[test]
fn map_tracks_keys_and_size() {
    let map = observe(Object::new_map());
    let (key_runs, size_runs) = (Rc::new(Cell::new(0)), Rc::new(Cell::new(0)));

    let (m, r) = (map.clone(), key_runs.clone());
    effect(
        move || {
            r.set(r.get() + 1);
            m.get("key");
        },
        EffectOptions::default(),
    );
    let (m, r) = (map.clone(), size_runs.clone());
    effect(
        move || {
            r.set(r.get() + 1);
            m.size().unwrap();
        },
        EffectOptions::default(),
    );

    map.set("other", 1);
    assert_eq!((key_runs.get(), size_runs.get()), (1, 2));
    map.set("key", 1);
    assert_eq!((key_runs.get(), size_runs.get()), (2, 3));
    map.set("key", 2);
    assert_eq!((key_runs.get(), size_runs.get()), (3, 3));
    map.delete("key");
    assert_eq!((key_runs.get(), size_runs.get()), (4, 4));
    // Clearing reaches every subscriber of the map.
    map.clear().unwrap();
    assert_eq!((key_runs.get(), size_runs.get()), (5, 5));
}

/// Test that a new map entry holding undefined still counts as an add.
#[test]
fn map_add_of_undefined_triggers() {
    let map = observe(Object::new_map());
    let size = Rc::new(Cell::new(usize::MAX));
    let (m, s) = (map.clone(), size.clone());
    effect(move || s.set(m.size().unwrap()), EffectOptions::default());

    map.set("key", Value::Undefined);
    assert_eq!(size.get(), 1);
}

/// Test that map keys are compared in raw form.
#[test]
fn map_keys_are_raw() {
    let map = observe(Object::new_map());
    let key = Object::record();
    let key_view = reactive(&key);

    map.set(key_view.clone(), 1);
    assert_eq!(map.get(&key), Value::from(1));
    assert!(map.has(key_view));
    assert_eq!(map.raw().entries().unwrap()[0].0, Value::from(&key));
}

/// Test that set iteration re-runs on adds and removals and wraps members.
#[test]
fn set_iteration_is_observed() {
    let set = observe(Object::new_set());
    let members = Rc::new(Cell::new(0));
    let (s, m) = (set.clone(), members.clone());
    effect(move || m.set(s.values().unwrap().count()), EffectOptions::default());

    set.add(1).unwrap().add(2).unwrap();
    assert_eq!(members.get(), 2);
    set.add(2).unwrap();
    assert_eq!(members.get(), 2);
    set.delete(1);
    assert_eq!(members.get(), 1);

    set.add(Object::record()).unwrap();
    assert!(set.values().unwrap().any(|v| is_reactive(&v)));
}

/// Test for_each over a map, values first.
#[test]
fn map_for_each_yields_value_then_key() {
    let map = observe(Object::map_from([("a", 1), ("b", 2)]));
    let mut seen = Vec::new();
    map.for_each(|value, key, _| seen.push(format!("{key}={value}")))
        .unwrap();
    assert_eq!(seen, ["a=1", "b=2"]);

    let entries: Vec<(Value, Value)> = map.entries().unwrap().collect();
    assert_eq!(
        entries,
        vec![
            (Value::from("a"), Value::from(1)),
            (Value::from("b"), Value::from(2))
        ]
    );
}

/// Test that weak collections refuse non-object keys.
#[test]
fn weak_collections_require_object_keys() {
    let weak = observe(Object::weak_map());
    assert!(!weak.set("key", 1));

    let key = Object::record();
    assert!(weak.set(&key, 1));
    assert_eq!(weak.get(&key), Value::from(1));
    assert!(weak.size().is_err());

    let weak_set = observe(Object::weak_set());
    assert_eq!(weak_set.add(1).unwrap_err(), ReactiveError::InvalidWeakKey);
    assert!(weak_set.add(&key).is_ok());
    assert!(weak_set.has(&key));
}

/// Test that a read-only collection refuses mutation with a warning.
#[test]
fn readonly_collections_refuse_mutation() {
    let warnings = Warnings::capture();
    let map = view(Object::map_from([("a", 1)]));

    map.set("a", 2);
    assert!(!map.delete("a"));
    map.clear().unwrap();
    assert_eq!(map.raw().get("a"), Value::from(1));

    let operations: Vec<_> = warnings
        .take()
        .into_iter()
        .map(|w| match w {
            Warning::ReadonlyMutation { operation, .. } => operation,
            other => panic!("unexpected warning {other}"),
        })
        .collect();
    assert_eq!(
        operations,
        vec![OperationType::Set, OperationType::Delete, OperationType::Clear]
    );
}
