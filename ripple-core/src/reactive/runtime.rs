//! Reactive Runtime
//!
//! `track` and `trigger` connect observed targets with the effects that
//! read them.
//!
//! # How It Works
//!
//! 1. When an effect reads a key of a target, [`track`] subscribes the
//!    effect to that key's [`Dep`](super::Dep) and records the dep on the
//!    effect so it can unsubscribe before its next run.
//!
//! 2. When a key is written, [`trigger`] collects the subscribed effects:
//!    the key's own dep, plus the iteration dep when the key set changed
//!    (or every dep of the target for a clear).
//!
//! 3. Subscribers are deduplicated. Computed runners are scheduled before
//!    plain effects so that plain effects reading a computed value never
//!    see a stale cache.
//!
//! # Threading
//!
//! All state is thread-local. Targets and effects are `!Send`, so a graph
//! never spans threads.

use std::cell::Cell;
use std::fmt;

use indexmap::IndexSet;

use super::context::ReactiveContext;
use super::dep::DepsMap;
use super::effect::ReactiveEffect;
use crate::value::{iterate_key, Key, Object, Value};

/// The kind of access or mutation being tracked or triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum OperationType {
    Set,
    Add,
    Delete,
    Clear,
    Get,
    Has,
    Iterate,
}

impl OperationType {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationType::Set => "set",
            OperationType::Add => "add",
            OperationType::Delete => "delete",
            OperationType::Clear => "clear",
            OperationType::Get => "get",
            OperationType::Has => "has",
            OperationType::Iterate => "iterate",
        }
    }

    /// Whether the operation changes the set of keys.
    pub fn changes_keys(self) -> bool {
        matches!(self, OperationType::Add | OperationType::Delete)
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

thread_local! {
    static SHOULD_TRACK: Cell<bool> = const { Cell::new(true) };
}

/// Globally suspend tracking until [`resume_tracking`].
pub fn pause_tracking() {
    SHOULD_TRACK.with(|flag| flag.set(false));
}

pub fn resume_tracking() {
    SHOULD_TRACK.with(|flag| flag.set(true));
}

/// Whether reads are currently being tracked.
pub fn is_tracking() -> bool {
    SHOULD_TRACK.with(Cell::get)
}

/// Run `f` with tracking paused, restoring the previous state afterwards
/// (also on unwind).
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    struct Restore(bool);

    impl Drop for Restore {
        fn drop(&mut self) {
            SHOULD_TRACK.with(|flag| flag.set(self.0));
        }
    }

    let _restore = Restore(SHOULD_TRACK.with(|flag| flag.replace(false)));
    f()
}

/// Anything that owns a dependency map: raw containers and refs.
pub(crate) trait Trackable {
    fn deps(&self) -> &DepsMap;

    /// The target as reported in debugger events.
    fn target(&self) -> Value;

    /// Indexed targets use `length` as their iteration key.
    fn is_array(&self) -> bool {
        false
    }
}

/// Extra diagnostics attached to a trigger.
#[derive(Debug, Clone, Default)]
pub struct TriggerInfo {
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
    /// Snapshot of a collection before it was cleared.
    pub old_target: Option<Object>,
}

impl TriggerInfo {
    pub fn new(old_value: Option<Value>, new_value: Option<Value>) -> Self {
        Self {
            old_value,
            new_value,
            old_target: None,
        }
    }
}

/// What debugger hooks receive.
#[derive(Debug, Clone)]
pub struct DebuggerEvent {
    pub effect: ReactiveEffect,
    pub target: Value,
    pub kind: OperationType,
    pub key: Option<Key>,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
    pub old_target: Option<Object>,
}

/// Subscribe the running effect to `key` of `target`.
///
/// A missing key tracks the iteration marker. Arrays enumerate under
/// `length` instead, since that is what their adds and deletes trigger.
pub(crate) fn track<T: Trackable + ?Sized>(target: &T, kind: OperationType, key: Option<Key>) {
    if !is_tracking() {
        return;
    }
    let Some(effect) = ReactiveContext::current() else {
        return;
    };

    let key = key.unwrap_or_else(iterate_key);

    let dep = target.deps().get_or_insert(key.clone());
    if !dep.insert(effect.clone()) {
        return;
    }
    effect.push_dep(&dep);

    if let Some(on_track) = effect.on_track() {
        on_track(&DebuggerEvent {
            effect: effect.clone(),
            target: target.target(),
            kind,
            key: Some(key),
            old_value: None,
            new_value: None,
            old_target: None,
        });
    }
}

/// Notify the effects subscribed to `key` of `target`.
pub(crate) fn trigger<T: Trackable + ?Sized>(
    target: &T,
    kind: OperationType,
    key: Option<Key>,
    info: TriggerInfo,
) {
    let deps = target.deps();
    if !deps.is_tracked() {
        return;
    }

    let mut computed_runners = IndexSet::new();
    let mut effects = IndexSet::new();
    let mut add_runners = |dep: Option<super::Dep>| {
        for effect in dep.iter().flat_map(super::Dep::snapshot) {
            if effect.is_computed() {
                computed_runners.insert(effect);
            } else {
                effects.insert(effect);
            }
        }
    };

    if kind == OperationType::Clear {
        for dep in deps.all() {
            add_runners(Some(dep));
        }
    } else {
        if let Some(key) = &key {
            add_runners(deps.get(key));
        }
        if kind.changes_keys() {
            let iteration_key = if target.is_array() {
                Key::length()
            } else {
                iterate_key()
            };
            add_runners(deps.get(&iteration_key));
        }
    }

    if computed_runners.is_empty() && effects.is_empty() {
        return;
    }

    tracing::trace!(
        kind = %kind,
        key = ?key,
        computed = computed_runners.len(),
        effects = effects.len(),
        "trigger"
    );

    let target_value = target.target();
    for effect in computed_runners.into_iter().chain(effects) {
        schedule_run(&effect, &target_value, kind, key.as_ref(), &info);
    }
}

fn schedule_run(
    effect: &ReactiveEffect,
    target: &Value,
    kind: OperationType,
    key: Option<&Key>,
    info: &TriggerInfo,
) {
    if let Some(on_trigger) = effect.on_trigger() {
        on_trigger(&DebuggerEvent {
            effect: effect.clone(),
            target: target.clone(),
            kind,
            key: key.cloned(),
            old_value: info.old_value.clone(),
            new_value: info.new_value.clone(),
            old_target: info.old_target.clone(),
        });
    }
    match effect.scheduler() {
        Some(scheduler) => scheduler(effect),
        None => effect.run(),
    }
}
