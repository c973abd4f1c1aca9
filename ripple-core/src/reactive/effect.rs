//! Effect Implementation
//!
//! An Effect is a computation that re-runs whenever something it read
//! changes.
//!
//! # How Effects Work
//!
//! 1. Unless created lazily, the effect runs once immediately to collect
//!    its initial dependencies.
//!
//! 2. Every run first unsubscribes the effect from all deps it joined
//!    last time, then pushes it on the context stack while the function
//!    runs. Only what this run reads is subscribed again, so branches
//!    that are no longer taken stop triggering the effect.
//!
//! 3. When a dependency changes, the effect's scheduler (if any) receives
//!    the handle and decides when to run it; otherwise it runs at once.
//!
//! # Recursion
//!
//! An effect that is already on the context stack is never re-entered: a
//! write it makes to something it read does not run it again, and calling
//! it from inside itself returns `None`.
//!
//! # Lifetime
//!
//! Deps own strong handles to their subscribers. An effect that reads a
//! container which its own closure captures lives as long as it stays
//! subscribed; [`stop`] unsubscribes it and releases the cycle.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;

use super::context::ReactiveContext;
use super::dep::{Dep, WeakDep};
use super::runtime::DebuggerEvent;
use crate::value::Value;

/// Unique identifier for an effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(u64);

impl EffectId {
    /// Generate a new unique effect ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for EffectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub type Scheduler = Rc<dyn Fn(&ReactiveEffect)>;
pub type DebuggerHook = Rc<dyn Fn(&DebuggerEvent)>;

/// How an effect is created and notified.
#[derive(Clone, Default)]
pub struct EffectOptions {
    lazy: bool,
    computed: bool,
    scheduler: Option<Scheduler>,
    on_track: Option<DebuggerHook>,
    on_trigger: Option<DebuggerHook>,
    on_stop: Option<Rc<dyn Fn()>>,
}

impl EffectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip the initial run.
    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    /// Mark the effect as a computed runner; it is notified before plain
    /// effects.
    pub fn computed(mut self, computed: bool) -> Self {
        self.computed = computed;
        self
    }

    /// Hand the effect to `scheduler` instead of running it on trigger.
    pub fn scheduler(mut self, scheduler: impl Fn(&ReactiveEffect) + 'static) -> Self {
        self.scheduler = Some(Rc::new(scheduler));
        self
    }

    /// Called once per new subscription.
    pub fn on_track(mut self, hook: impl Fn(&DebuggerEvent) + 'static) -> Self {
        self.on_track = Some(Rc::new(hook));
        self
    }

    /// Called for each trigger that reaches the effect, before it runs.
    pub fn on_trigger(mut self, hook: impl Fn(&DebuggerEvent) + 'static) -> Self {
        self.on_trigger = Some(Rc::new(hook));
        self
    }

    pub fn on_stop(mut self, hook: impl Fn() + 'static) -> Self {
        self.on_stop = Some(Rc::new(hook));
        self
    }
}

struct EffectInner {
    id: EffectId,
    active: Cell<bool>,
    deps: RefCell<SmallVec<[WeakDep; 4]>>,
    options: EffectOptions,
    /// Runs the user function under the effect; result discarded.
    job: Box<dyn Fn(&ReactiveEffect)>,
}

/// Type-erased effect handle.
///
/// This is what deps hold and what schedulers and debugger hooks receive.
/// Handles compare by identity.
#[derive(Clone)]
pub struct ReactiveEffect(Rc<EffectInner>);

impl ReactiveEffect {
    pub fn id(&self) -> EffectId {
        self.0.id
    }

    pub fn is_active(&self) -> bool {
        self.0.active.get()
    }

    pub fn is_computed(&self) -> bool {
        self.0.options.computed
    }

    /// Run the effect now, as a trigger without a scheduler would.
    pub fn run(&self) {
        (self.0.job)(self)
    }

    /// Deactivate the effect. See [`stop`].
    pub fn stop(&self) {
        if !self.is_active() {
            return;
        }
        self.cleanup();
        if let Some(on_stop) = &self.0.options.on_stop {
            on_stop();
        }
        self.0.active.set(false);
        tracing::debug!(effect = %self.id(), "effect stopped");
    }

    /// Number of deps the effect is currently subscribed to.
    pub fn dep_count(&self) -> usize {
        self.0.deps.borrow().len()
    }

    pub(crate) fn scheduler(&self) -> Option<&Scheduler> {
        self.0.options.scheduler.as_ref()
    }

    pub(crate) fn on_track(&self) -> Option<&DebuggerHook> {
        self.0.options.on_track.as_ref()
    }

    pub(crate) fn on_trigger(&self) -> Option<&DebuggerHook> {
        self.0.options.on_trigger.as_ref()
    }

    pub(crate) fn push_dep(&self, dep: &Dep) {
        self.0.deps.borrow_mut().push(dep.downgrade());
    }

    /// Snapshot of the deps the effect belongs to.
    pub(crate) fn deps(&self) -> Vec<Dep> {
        self.0
            .deps
            .borrow()
            .iter()
            .filter_map(WeakDep::upgrade)
            .collect()
    }

    /// Leave every dep joined by the previous run.
    fn cleanup(&self) {
        let deps = std::mem::take(&mut *self.0.deps.borrow_mut());
        for dep in deps.iter().filter_map(WeakDep::upgrade) {
            dep.remove(self);
        }
    }
}

impl PartialEq for ReactiveEffect {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ReactiveEffect {}

impl Hash for ReactiveEffect {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Rc::as_ptr(&self.0).hash(state);
    }
}

impl fmt::Debug for ReactiveEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReactiveEffect({})", self.0.id)
    }
}

/// A typed effect: the erased handle plus the user function.
pub struct Effect<T> {
    handle: ReactiveEffect,
    raw: Rc<dyn Fn() -> T>,
}

impl<T> Clone for Effect<T> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            raw: self.raw.clone(),
        }
    }
}

impl<T> Effect<T> {
    /// Run the effect, returning the function's result.
    ///
    /// Returns `None` if the effect is already running further up the
    /// stack.
    pub fn run(&self) -> Option<T> {
        run_effect(&self.handle, || (self.raw)())
    }

    pub fn handle(&self) -> &ReactiveEffect {
        &self.handle
    }

    pub fn id(&self) -> EffectId {
        self.handle.id()
    }

    pub fn is_active(&self) -> bool {
        self.handle.is_active()
    }

    /// The undecorated user function.
    pub fn raw(&self) -> Rc<dyn Fn() -> T> {
        self.raw.clone()
    }
}

impl<T> fmt::Debug for Effect<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Effect({})", self.handle.id())
    }
}

fn run_effect<R>(handle: &ReactiveEffect, f: impl FnOnce() -> R) -> Option<R> {
    if !handle.is_active() {
        return Some(f());
    }
    if ReactiveContext::contains(handle) {
        return None;
    }
    handle.cleanup();
    let _ctx = ReactiveContext::enter(handle);
    tracing::trace!(effect = %handle.id(), depth = ReactiveContext::depth(), "effect run");
    Some(f())
}

fn create_effect<T: 'static>(raw: Rc<dyn Fn() -> T>, options: EffectOptions) -> Effect<T> {
    let lazy = options.lazy;
    let job_raw = raw.clone();
    let handle = ReactiveEffect(Rc::new(EffectInner {
        id: EffectId::new(),
        active: Cell::new(true),
        deps: RefCell::new(SmallVec::new()),
        options,
        job: Box::new(move |handle| {
            run_effect(handle, || {
                job_raw();
            });
        }),
    }));

    let effect = Effect { handle, raw };
    if !lazy {
        effect.run();
    }
    effect
}

/// Create an effect running `f`.
pub fn effect<T, F>(f: F, options: EffectOptions) -> Effect<T>
where
    T: 'static,
    F: Fn() -> T + 'static,
{
    create_effect(Rc::new(f), options)
}

/// Create a new effect around the user function of an existing one.
///
/// The new effect runs the original function directly; it does not
/// nest the old effect's bookkeeping.
pub fn rewrap<T: 'static>(effect: &Effect<T>, options: EffectOptions) -> Effect<T> {
    create_effect(effect.raw(), options)
}

/// Unsubscribe an effect from everything, fire `on_stop` and deactivate
/// it. A stopped effect still runs when called, but without tracking.
pub fn stop<T>(effect: &Effect<T>) {
    effect.handle.stop();
}

/// Whether a dynamic value is a function made from an effect.
pub fn is_effect(value: &Value) -> bool {
    value.as_function().is_some_and(|f| f.effect().is_some())
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Function;

    #[test]
    fn effect_runs_immediately() {
        let runs = Rc::new(Cell::new(0));
        let r = runs.clone();
        effect(move || r.set(r.get() + 1), EffectOptions::default());
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn lazy_effect_waits() {
        let runs = Rc::new(Cell::new(0));
        let r = runs.clone();
        let e = effect(move || r.set(r.get() + 1), EffectOptions::new().lazy(true));
        assert_eq!(runs.get(), 0);
        e.run();
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn run_returns_value() {
        let e = effect(|| 42, EffectOptions::new().lazy(true));
        assert_eq!(e.run(), Some(42));
    }

    #[test]
    fn reentrant_call_is_suppressed() {
        let slot: Rc<RefCell<Option<Effect<u32>>>> = Rc::new(RefCell::new(None));
        let inner = slot.clone();
        let e = effect(
            move || {
                let nested = inner.borrow().as_ref().map(|e| e.run());
                assert_eq!(nested, Some(None));
                7
            },
            EffectOptions::new().lazy(true),
        );
        *slot.borrow_mut() = Some(e.clone());
        assert_eq!(e.run(), Some(7));
        slot.borrow_mut().take();
    }

    #[test]
    fn stop_fires_hook_once() {
        let stops = Rc::new(Cell::new(0));
        let s = stops.clone();
        let e = effect(|| (), EffectOptions::new().on_stop(move || s.set(s.get() + 1)));
        stop(&e);
        stop(&e);
        assert_eq!(stops.get(), 1);
        assert!(!e.is_active());
    }

    #[test]
    fn stopped_effect_still_runs_untracked() {
        let e = effect(|| ReactiveContext::is_active(), EffectOptions::new().lazy(true));
        assert_eq!(e.run(), Some(true));
        stop(&e);
        assert_eq!(e.run(), Some(false));
    }

    #[test]
    fn rewrap_shares_the_user_function() {
        let runs = Rc::new(Cell::new(0));
        let r = runs.clone();
        let first = effect(move || r.set(r.get() + 1), EffectOptions::default());
        let second = rewrap(&first, EffectOptions::default());
        assert_eq!(runs.get(), 2);
        assert_ne!(first.handle(), second.handle());
        assert!(Rc::ptr_eq(&first.raw(), &second.raw()));
    }

    #[test]
    fn effect_functions_are_branded() {
        let e = effect(|| 1, EffectOptions::new().lazy(true));
        let f = Value::from(Function::from(e));
        assert!(is_effect(&f));
        assert_eq!(f.as_function().map(|f| f.call(&[])), Some(Value::from(1)));
        assert!(!is_effect(&Value::from(Function::new(|_| Value::Null))));
        assert!(!is_effect(&Value::Null));
    }
}
