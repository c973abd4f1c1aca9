//! Dependency Store
//!
//! Every trackable target owns a [`DepsMap`]: the map from key to the
//! [`Dep`] of effects subscribed to that key. Owning the slot ties its
//! lifetime to the target, so the store never keeps a dead container
//! alive and needs no global table.
//!
//! A `Dep` is shared between the store (by key) and every effect
//! subscribed to it. Effects only hold a weak back-reference, used to
//! remove themselves on cleanup; they never own the set.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use indexmap::{IndexMap, IndexSet};

use super::effect::ReactiveEffect;
use crate::value::Key;

/// The set of effects subscribed to one (target, key) pair.
#[derive(Clone, Default)]
pub struct Dep(Rc<RefCell<IndexSet<ReactiveEffect>>>);

impl Dep {
    /// Subscribe an effect. Returns `true` if it was not already a member.
    pub fn insert(&self, effect: ReactiveEffect) -> bool {
        self.0.borrow_mut().insert(effect)
    }

    pub fn remove(&self, effect: &ReactiveEffect) -> bool {
        self.0.borrow_mut().shift_remove(effect)
    }

    pub fn contains(&self, effect: &ReactiveEffect) -> bool {
        self.0.borrow().contains(effect)
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Copy of the current members, safe to iterate while effects run.
    pub fn snapshot(&self) -> Vec<ReactiveEffect> {
        self.0.borrow().iter().cloned().collect()
    }

    pub(crate) fn downgrade(&self) -> WeakDep {
        WeakDep(Rc::downgrade(&self.0))
    }
}

/// Non-owning handle from an effect back to a [`Dep`] it belongs to.
#[derive(Clone)]
pub(crate) struct WeakDep(Weak<RefCell<IndexSet<ReactiveEffect>>>);

impl WeakDep {
    pub(crate) fn upgrade(&self) -> Option<Dep> {
        self.0.upgrade().map(Dep)
    }
}

/// Per-target map from key to [`Dep`].
///
/// The map is absent until the target is first wrapped or tracked;
/// triggering an absent map is a no-op.
#[derive(Default)]
pub struct DepsMap(RefCell<Option<IndexMap<Key, Dep>>>);

impl DepsMap {
    /// Create the (empty) entry for a freshly observed target.
    pub fn ensure(&self) {
        self.0.borrow_mut().get_or_insert_with(IndexMap::new);
    }

    /// Whether the target was ever observed.
    pub fn is_tracked(&self) -> bool {
        self.0.borrow().is_some()
    }

    pub fn get_or_insert(&self, key: Key) -> Dep {
        self.0
            .borrow_mut()
            .get_or_insert_with(IndexMap::new)
            .entry(key)
            .or_default()
            .clone()
    }

    pub fn get(&self, key: &Key) -> Option<Dep> {
        self.0.borrow().as_ref()?.get(key).cloned()
    }

    /// Every dep registered for the target.
    pub fn all(&self) -> Vec<Dep> {
        self.0
            .borrow()
            .as_ref()
            .map(|map| map.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of keys with a dep, subscribed or not.
    pub fn dep_count(&self) -> usize {
        self.0.borrow().as_ref().map_or(0, IndexMap::len)
    }
}
