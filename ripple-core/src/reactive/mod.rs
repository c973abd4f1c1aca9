//! Reactive Primitives
//!
//! This module implements the effect scheduler and the primitives built on
//! it: refs and computed values.
//!
//! # Concepts
//!
//! ## Effects
//!
//! An Effect is a computation whose reads are recorded. When anything it
//! read changes, it runs again (or is handed to its scheduler).
//!
//! ## Deps
//!
//! Every observed target owns a map from key to [`Dep`], the set of
//! effects that read that key. [`track`] fills it; [`trigger`] drains a
//! snapshot of it.
//!
//! ## Refs
//!
//! A [`Ref`] is a single observable slot, tracked like a container with one
//! key.
//!
//! ## Computed
//!
//! A [`Computed`] value is a lazy effect with a cache. Its runner only
//! marks the cache dirty when inputs change; reading it recomputes.
//!
//! # Implementation Notes
//!
//! Which effect is running is kept on a thread-local stack
//! ([`ReactiveContext`]). Reads made while the stack is empty, or while
//! tracking is paused, record nothing.

mod computed;
mod context;
mod dep;
mod effect;
mod refs;
mod runtime;

pub use computed::{computed, computed_with_setter, Computed};
pub use context::ReactiveContext;
pub use dep::{Dep, DepsMap};
pub use effect::{
    effect, is_effect, rewrap, stop, DebuggerHook, Effect, EffectId, EffectOptions,
    ReactiveEffect, Scheduler,
};
pub use refs::{is_ref, to_refs, Ref};
pub use runtime::{
    is_tracking, pause_tracking, resume_tracking, untracked, DebuggerEvent, OperationType,
    TriggerInfo,
};

pub(crate) use runtime::{track, trigger, Trackable};
