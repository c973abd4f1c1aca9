//! Raw containers.
//!
//! An [`Object`] is the unobserved target behind every wrapper. Its
//! methods implement the default semantics the interception policies
//! forward to; calling them directly never tracks or triggers anything.

use std::cell::{Cell, Ref as CellRef, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::{IndexMap, IndexSet};

use super::{Key, Value};
use crate::error::{ReactiveError, Result};
use crate::reactive::{DepsMap, Trackable};

/// Unique identity of a raw container.
///
/// Ids are never reused, so a stale id held by a weak table can never
/// alias a newer container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// The structural kind of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    Record,
    Array,
    Map,
    Set,
    WeakMap,
    WeakSet,
    Date,
    RegExp,
    Promise,
}

impl Shape {
    /// Associative and set-like shapes use the collection policy.
    pub fn is_collection(self) -> bool {
        matches!(
            self,
            Shape::Map | Shape::Set | Shape::WeakMap | Shape::WeakSet
        )
    }

    /// Whether the shape can be wrapped at all.
    pub fn is_observable(self) -> bool {
        !matches!(self, Shape::Date | Shape::RegExp | Shape::Promise)
    }

    pub fn is_weak(self) -> bool {
        matches!(self, Shape::WeakMap | Shape::WeakSet)
    }

    pub fn tag(self) -> &'static str {
        match self {
            Shape::Record => "Object",
            Shape::Array => "Array",
            Shape::Map => "Map",
            Shape::Set => "Set",
            Shape::WeakMap => "WeakMap",
            Shape::WeakSet => "WeakSet",
            Shape::Date => "Date",
            Shape::RegExp => "RegExp",
            Shape::Promise => "Promise",
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Array storage: present elements by index plus an explicit length.
///
/// Indices without an element are holes, so a write far past the end
/// costs one entry rather than the whole gap.
#[derive(Clone, Default)]
pub(crate) struct Elements {
    items: BTreeMap<usize, Value>,
    length: usize,
}

impl Elements {
    pub(crate) fn len(&self) -> usize {
        self.length
    }

    pub(crate) fn get(&self, index: usize) -> Option<&Value> {
        self.items.get(&index)
    }

    fn contains(&self, index: usize) -> bool {
        self.items.contains_key(&index)
    }

    fn insert(&mut self, index: usize, value: Value) {
        self.items.insert(index, value);
        self.length = self.length.max(index + 1);
    }

    fn remove(&mut self, index: usize) {
        self.items.remove(&index);
    }

    /// Grow with holes or drop every element at or past `length`.
    fn set_len(&mut self, length: usize) {
        self.items.split_off(&length);
        self.length = length;
    }

    fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.items.keys().copied()
    }
}

impl FromIterator<Value> for Elements {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        let items: BTreeMap<usize, Value> = iter.into_iter().enumerate().collect();
        let length = items.len();
        Self { items, length }
    }
}

pub(crate) enum Data {
    Record(IndexMap<Key, Value>),
    Array(Elements),
    Map(IndexMap<Value, Value>),
    Set(IndexSet<Value>),
    WeakMap(HashMap<ObjectId, (Weak<ObjectInner>, Value)>),
    WeakSet(HashMap<ObjectId, Weak<ObjectInner>>),
    Date(f64),
    RegExp(Rc<str>),
    Promise,
}

impl Data {
    pub(crate) fn shape(&self) -> Shape {
        match self {
            Data::Record(_) => Shape::Record,
            Data::Array(_) => Shape::Array,
            Data::Map(_) => Shape::Map,
            Data::Set(_) => Shape::Set,
            Data::WeakMap(_) => Shape::WeakMap,
            Data::WeakSet(_) => Shape::WeakSet,
            Data::Date(_) => Shape::Date,
            Data::RegExp(_) => Shape::RegExp,
            Data::Promise => Shape::Promise,
        }
    }
}

const NON_REACTIVE: u8 = 1;
const READONLY: u8 = 1 << 1;
const INTERNAL: u8 = 1 << 2;

pub(crate) struct ObjectInner {
    id: ObjectId,
    data: RefCell<Data>,
    flags: Cell<u8>,
    deps: DepsMap,
}

/// A raw container with identity.
///
/// Cloning an `Object` clones the handle, not the contents.
#[derive(Clone)]
pub struct Object(Rc<ObjectInner>);

impl Object {
    fn with_data(data: Data) -> Self {
        Self(Rc::new(ObjectInner {
            id: ObjectId::new(),
            data: RefCell::new(data),
            flags: Cell::new(0),
            deps: DepsMap::default(),
        }))
    }

    /// An empty record.
    pub fn record() -> Self {
        Self::with_data(Data::Record(IndexMap::new()))
    }

    /// A record built from `(key, value)` pairs, in order.
    pub fn from_entries<K, V, I>(entries: I) -> Self
    where
        K: Into<Value>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let object = Self::record();
        for (key, value) in entries {
            object.set(key, value);
        }
        object
    }

    /// An array holding the given elements.
    pub fn array<V, I>(elements: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        let elements = elements.into_iter().map(Into::into).collect();
        Self::with_data(Data::Array(elements))
    }

    pub fn new_map() -> Self {
        Self::with_data(Data::Map(IndexMap::new()))
    }

    pub fn map_from<K, V, I>(entries: I) -> Self
    where
        K: Into<Value>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let entries = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::with_data(Data::Map(entries))
    }

    pub fn new_set() -> Self {
        Self::with_data(Data::Set(IndexSet::new()))
    }

    pub fn set_from<V, I>(values: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        Self::with_data(Data::Set(values.into_iter().map(Into::into).collect()))
    }

    pub fn weak_map() -> Self {
        Self::with_data(Data::WeakMap(HashMap::new()))
    }

    pub fn weak_set() -> Self {
        Self::with_data(Data::WeakSet(HashMap::new()))
    }

    /// A date holding milliseconds since the epoch.
    pub fn date(millis: f64) -> Self {
        Self::with_data(Data::Date(millis))
    }

    pub fn regexp(source: &str) -> Self {
        Self::with_data(Data::RegExp(Rc::from(source)))
    }

    pub fn promise() -> Self {
        Self::with_data(Data::Promise)
    }

    pub fn id(&self) -> ObjectId {
        self.0.id
    }

    pub fn shape(&self) -> Shape {
        self.0.data.borrow().shape()
    }

    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    pub(crate) fn data(&self) -> CellRef<'_, Data> {
        self.0.data.borrow()
    }

    fn downgrade(&self) -> Weak<ObjectInner> {
        Rc::downgrade(&self.0)
    }

    // Flags

    fn has_flag(&self, flag: u8) -> bool {
        self.0.flags.get() & flag != 0
    }

    fn add_flag(&self, flag: u8) {
        self.0.flags.set(self.0.flags.get() | flag);
    }

    pub(crate) fn mark_non_reactive(&self) {
        self.add_flag(NON_REACTIVE);
    }

    pub(crate) fn mark_readonly(&self) {
        self.add_flag(READONLY);
    }

    pub(crate) fn mark_internal(&self) {
        self.add_flag(INTERNAL);
    }

    pub fn is_marked_non_reactive(&self) -> bool {
        self.has_flag(NON_REACTIVE)
    }

    pub fn is_marked_readonly(&self) -> bool {
        self.has_flag(READONLY)
    }

    pub fn is_internal(&self) -> bool {
        self.has_flag(INTERNAL)
    }

    // Default (untracked) keyed semantics

    /// Read a property or collection entry without tracking.
    pub fn get(&self, key: impl Into<Value>) -> Value {
        let key = key.into();
        let shape = self.shape();
        if shape.is_collection() {
            return self.entry_get(&key).unwrap_or_default();
        }
        self.get_property(&Key::property(key)).unwrap_or_default()
    }

    /// Write a property or map entry without triggering.
    ///
    /// Returns `false` when the container rejects the write.
    pub fn set(&self, key: impl Into<Value>, value: impl Into<Value>) -> bool {
        let key = key.into();
        match self.shape() {
            Shape::Map | Shape::WeakMap => self.entry_insert(key, value.into()).is_ok(),
            Shape::Set | Shape::WeakSet => false,
            _ => self.set_property(Key::property(key), value.into()),
        }
    }

    pub fn delete(&self, key: impl Into<Value>) -> bool {
        let key = key.into();
        if self.shape().is_collection() {
            return self.entry_remove(&key).is_some();
        }
        self.delete_property(&Key::property(key))
    }

    pub fn has(&self, key: impl Into<Value>) -> bool {
        let key = key.into();
        if self.shape().is_collection() {
            return self.entry_has(&key);
        }
        self.has_own(&Key::property(key))
    }

    /// Own enumerable keys in insertion (or index) order.
    pub fn own_keys(&self) -> Vec<Key> {
        self.property_keys()
    }

    /// Array length, collection size or number of record keys.
    pub fn len(&self) -> usize {
        match &*self.data() {
            Data::Record(map) => map.len(),
            Data::Array(items) => items.len(),
            Data::Map(map) => map.len(),
            Data::Set(set) => set.len(),
            Data::WeakMap(map) => map.values().filter(|(k, _)| k.strong_count() > 0).count(),
            Data::WeakSet(set) => set.values().filter(|k| k.strong_count() > 0).count(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add a value to a set-like container.
    pub fn add(&self, value: impl Into<Value>) -> Result<bool> {
        self.set_add(value.into())
    }

    /// Empty a collection, returning how many entries were removed.
    pub fn clear(&self) -> Result<usize> {
        let shape = self.shape();
        if !shape.is_collection() {
            return Err(ReactiveError::Unsupported { op: "clear", shape });
        }
        Ok(self.entry_clear())
    }

    /// Snapshot of `(key, value)` pairs of an iterable collection.
    ///
    /// Set-like containers report each value as its own key.
    pub fn entries(&self) -> Result<Vec<(Value, Value)>> {
        match self.shape() {
            Shape::Map | Shape::Set => Ok(self.entries_snapshot()),
            shape => Err(ReactiveError::Unsupported { op: "entries", shape }),
        }
    }

    // Property helpers used by the keyed-container policy

    pub(crate) fn get_property(&self, key: &Key) -> Option<Value> {
        match &*self.data() {
            Data::Record(map) => map.get(key).cloned(),
            Data::Array(items) => match key {
                Key::Index(i) => items.get(*i).cloned(),
                key if key.is_length() => Some(Value::from(items.len())),
                _ => None,
            },
            _ => None,
        }
    }

    pub(crate) fn has_own(&self, key: &Key) -> bool {
        match &*self.data() {
            Data::Record(map) => map.contains_key(key),
            Data::Array(items) => match key {
                Key::Index(i) => items.contains(*i),
                key => key.is_length(),
            },
            _ => false,
        }
    }

    pub(crate) fn set_property(&self, key: Key, value: Value) -> bool {
        let mut data = self.0.data.borrow_mut();
        match &mut *data {
            Data::Record(map) => {
                map.insert(key, value);
                true
            }
            Data::Array(items) => match key {
                Key::Index(i) => {
                    items.insert(i, value);
                    true
                }
                key if key.is_length() => match value.as_number() {
                    Some(n) if n >= 0.0 && n.fract() == 0.0 && n < u32::MAX as f64 => {
                        items.set_len(n as usize);
                        true
                    }
                    _ => false,
                },
                _ => false,
            },
            _ => false,
        }
    }

    pub(crate) fn delete_property(&self, key: &Key) -> bool {
        let mut data = self.0.data.borrow_mut();
        match &mut *data {
            Data::Record(map) => {
                map.shift_remove(key);
                true
            }
            Data::Array(items) => match key {
                Key::Index(i) => {
                    items.remove(*i);
                    true
                }
                key => !key.is_length(),
            },
            _ => true,
        }
    }

    pub(crate) fn property_keys(&self) -> Vec<Key> {
        match &*self.data() {
            Data::Record(map) => map.keys().cloned().collect(),
            Data::Array(items) => items.indices().map(Key::Index).collect(),
            _ => Vec::new(),
        }
    }

    // Entry helpers used by the collection policy

    pub(crate) fn entry_get(&self, key: &Value) -> Option<Value> {
        match &*self.data() {
            Data::Map(map) => map.get(key).cloned(),
            Data::WeakMap(map) => {
                let id = weak_key(key)?.id();
                map.get(&id).map(|(_, value)| value.clone())
            }
            _ => None,
        }
    }

    pub(crate) fn entry_has(&self, key: &Value) -> bool {
        match &*self.data() {
            Data::Map(map) => map.contains_key(key),
            Data::Set(set) => set.contains(key),
            Data::WeakMap(map) => weak_key(key).is_some_and(|k| map.contains_key(&k.id())),
            Data::WeakSet(set) => weak_key(key).is_some_and(|k| set.contains_key(&k.id())),
            _ => false,
        }
    }

    /// Insert or overwrite a map entry, returning the previous value.
    pub(crate) fn entry_insert(&self, key: Value, value: Value) -> Result<Option<Value>> {
        let mut data = self.0.data.borrow_mut();
        match &mut *data {
            Data::Map(map) => Ok(map.insert(key, value)),
            Data::WeakMap(map) => {
                let key = weak_key(&key).ok_or(ReactiveError::InvalidWeakKey)?;
                map.retain(|_, (k, _)| k.strong_count() > 0);
                Ok(map
                    .insert(key.id(), (key.downgrade(), value))
                    .map(|(_, old)| old))
            }
            other => Err(ReactiveError::Unsupported {
                op: "set",
                shape: other.shape(),
            }),
        }
    }

    /// Add a member to a set-like container; `false` if it was present.
    pub(crate) fn set_add(&self, value: Value) -> Result<bool> {
        let mut data = self.0.data.borrow_mut();
        match &mut *data {
            Data::Set(set) => Ok(set.insert(value)),
            Data::WeakSet(set) => {
                let key = weak_key(&value).ok_or(ReactiveError::InvalidWeakKey)?;
                set.retain(|_, k| k.strong_count() > 0);
                Ok(set.insert(key.id(), key.downgrade()).is_none())
            }
            other => Err(ReactiveError::Unsupported {
                op: "add",
                shape: other.shape(),
            }),
        }
    }

    /// Remove an entry, returning its value (`Undefined` for set-like shapes).
    pub(crate) fn entry_remove(&self, key: &Value) -> Option<Value> {
        let mut data = self.0.data.borrow_mut();
        match &mut *data {
            Data::Map(map) => map.shift_remove(key),
            Data::Set(set) => set.shift_remove(key).then_some(Value::Undefined),
            Data::WeakMap(map) => map.remove(&weak_key(key)?.id()).map(|(_, value)| value),
            Data::WeakSet(set) => set.remove(&weak_key(key)?.id()).map(|_| Value::Undefined),
            _ => None,
        }
    }

    pub(crate) fn entry_clear(&self) -> usize {
        let len = self.len();
        let mut data = self.0.data.borrow_mut();
        match &mut *data {
            Data::Map(map) => map.clear(),
            Data::Set(set) => set.clear(),
            Data::WeakMap(map) => map.clear(),
            Data::WeakSet(set) => set.clear(),
            _ => {}
        }
        len
    }

    pub(crate) fn entries_snapshot(&self) -> Vec<(Value, Value)> {
        match &*self.data() {
            Data::Map(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            Data::Set(set) => set.iter().map(|v| (v.clone(), v.clone())).collect(),
            _ => Vec::new(),
        }
    }

    /// Shallow copy of a collection's contents into a new container.
    pub(crate) fn shallow_clone(&self) -> Object {
        let data = match &*self.data() {
            Data::Record(map) => Data::Record(map.clone()),
            Data::Array(items) => Data::Array(items.clone()),
            Data::Map(map) => Data::Map(map.clone()),
            Data::Set(set) => Data::Set(set.clone()),
            Data::WeakMap(map) => Data::WeakMap(map.clone()),
            Data::WeakSet(set) => Data::WeakSet(set.clone()),
            Data::Date(t) => Data::Date(*t),
            Data::RegExp(src) => Data::RegExp(src.clone()),
            Data::Promise => Data::Promise,
        };
        Object::with_data(data)
    }
}

fn weak_key(value: &Value) -> Option<&Object> {
    value.as_object()
}

impl Trackable for Object {
    fn deps(&self) -> &DepsMap {
        &self.0.deps
    }

    fn target(&self) -> Value {
        Value::Object(self.clone())
    }

    fn is_array(&self) -> bool {
        self.shape() == Shape::Array
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Object {}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object({} #{})", self.shape(), self.0.id.0)
    }
}
