//! Computed values.
//!
//! A [`Computed`] caches the result of a lazy runner effect. The runner's
//! scheduler only flags the cache dirty; the next read recomputes. Reading
//! a computed value inside another effect subscribes that effect to
//! everything the runner depends on, so the reader re-runs when the
//! computed's inputs change.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::context::ReactiveContext;
use super::effect::{effect, Effect, EffectOptions, ReactiveEffect};
use super::refs::Ref;
use super::runtime::is_tracking;
use crate::value::Value;
use crate::warning::{warn, Warning};

struct ComputedInner<T> {
    dirty: Rc<Cell<bool>>,
    value: RefCell<Option<T>>,
    runner: Effect<T>,
    setter: Option<Rc<dyn Fn(T)>>,
}

/// A lazily evaluated, cached derivation.
pub struct Computed<T>(Rc<ComputedInner<T>>);

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: Clone + 'static> Computed<T> {
    fn build(getter: Rc<dyn Fn() -> T>, setter: Option<Rc<dyn Fn(T)>>) -> Self {
        let dirty = Rc::new(Cell::new(true));
        let flag = dirty.clone();
        let runner = effect(
            move || getter(),
            EffectOptions::new()
                .lazy(true)
                .computed(true)
                .scheduler(move |_| flag.set(true)),
        );
        Self(Rc::new(ComputedInner {
            dirty,
            value: RefCell::new(None),
            runner,
            setter,
        }))
    }

    /// Current value, recomputed first if an input changed.
    ///
    /// # Panics
    ///
    /// If the getter reads this computed while it is being evaluated.
    pub fn value(&self) -> T {
        let inner = &self.0;
        if inner.dirty.get() {
            // `None` means this read came from inside the getter; the outer
            // evaluation is still pending, so the cache stays dirty.
            if let Some(fresh) = inner.runner.run() {
                *inner.value.borrow_mut() = Some(fresh);
                inner.dirty.set(false);
            }
        }
        track_child_run(inner.runner.handle());
        match &*inner.value.borrow() {
            Some(value) => value.clone(),
            None => panic!("computed value read itself during its own evaluation"),
        }
    }

    /// Pass `value` to the setter, or warn if the computed is read-only.
    pub fn set_value(&self, value: T) {
        match &self.0.setter {
            Some(setter) => setter(value),
            None => warn(Warning::ReadonlyComputed),
        }
    }

    /// The runner effect. Stopping it freezes the computed at its
    /// last value.
    pub fn effect(&self) -> &Effect<T> {
        &self.0.runner
    }

    pub fn is_dirty(&self) -> bool {
        self.0.dirty.get()
    }

    pub fn is_readonly(&self) -> bool {
        self.0.setter.is_none()
    }
}

impl Computed<Value> {
    /// A ref that reads and writes through this computed, so it can be
    /// stored in a container slot.
    pub fn to_ref(&self) -> Ref {
        Ref::computed(self.clone())
    }
}

/// Subscribe the running effect to every dep of `child`.
fn track_child_run(child: &ReactiveEffect) {
    if !is_tracking() {
        return;
    }
    let Some(parent) = ReactiveContext::current() else {
        return;
    };
    for dep in child.deps() {
        if dep.insert(parent.clone()) {
            parent.push_dep(&dep);
        }
    }
}

/// Create a read-only computed value.
pub fn computed<T, F>(getter: F) -> Computed<T>
where
    T: Clone + 'static,
    F: Fn() -> T + 'static,
{
    Computed::build(Rc::new(getter), None)
}

/// Create a computed value whose writes go to `setter`.
pub fn computed_with_setter<T, G, S>(getter: G, setter: S) -> Computed<T>
where
    T: Clone + 'static,
    G: Fn() -> T + 'static,
    S: Fn(T) + 'static,
{
    Computed::build(Rc::new(getter), Some(Rc::new(setter)))
}
