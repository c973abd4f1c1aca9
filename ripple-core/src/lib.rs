//! Ripple Core
//!
//! Fine-grained push-pull reactivity for dynamically shaped state.
//!
//! - Effects that record what they read and re-run when it changes
//! - Observed views over records, arrays, maps and sets, mutable or
//!   read-only behind a global lock
//! - Refs (single observable slots) and cached computed values
//!
//! Everything is single-threaded: handles are `Rc`-based and all
//! bookkeeping lives in thread-locals.
//!
//! # Architecture
//!
//! - `value`: the dynamic value model and raw containers
//! - `reactive`: dependency store, effect stack, track/trigger, refs and
//!   computed values
//! - `observe`: the interception policies behind [`Reactive`] views
//! - `warning`: developer diagnostics routed to a per-thread handler
//!
//! # Example
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! use ripple_core::{computed, effect, reactive, EffectOptions, Object, Value};
//!
//! let state = reactive(Object::from_entries([("count", 1)]))
//!     .into_reactive()
//!     .unwrap();
//!
//! let s = state.clone();
//! let doubled = computed(move || s.get("count").as_number().unwrap_or(0.0) * 2.0);
//!
//! let seen = Rc::new(Cell::new(0.0));
//! let (d, out) = (doubled.clone(), seen.clone());
//! effect(move || out.set(d.value()), EffectOptions::default());
//! assert_eq!(seen.get(), 2.0);
//!
//! state.set("count", 5);
//! assert_eq!(seen.get(), 10.0);
//! assert_eq!(state.get("count"), Value::from(5));
//! ```

pub mod error;
pub mod observe;
pub mod reactive;
pub mod value;
pub mod warning;

pub use error::{ReactiveError, Result};
pub use observe::{
    is_locked, is_reactive, is_readonly, lock, mark_internal, mark_non_reactive, mark_readonly,
    reactive, readonly, to_raw, unlock, EntriesIter, Reactive, ValuesIter,
};
pub use reactive::{
    computed, computed_with_setter, effect, is_effect, is_ref, pause_tracking, resume_tracking,
    rewrap, stop, to_refs, untracked, Computed, DebuggerEvent, Effect, EffectOptions,
    OperationType, ReactiveEffect, Ref,
};
pub use value::{Function, Key, Object, Shape, Symbol, Value};
pub use warning::{set_warn_handler, take_warn_handler, Warning};
