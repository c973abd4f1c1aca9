//! Reactive Context
//!
//! The reactive context tracks which effect is currently running so that
//! reads can register it as a subscriber.
//!
//! # Implementation
//!
//! We use a thread-local stack of effect handles. Running an effect pushes
//! it; the guard returned by [`ReactiveContext::enter`] pops it again when
//! dropped, so the stack stays balanced even if the effect panics.
//!
//! Nested effects (an effect that runs another effect) push on top; the
//! innermost effect is the one reads are attributed to.

use std::cell::RefCell;

use super::effect::ReactiveEffect;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ReactiveEffect>> = const { RefCell::new(Vec::new()) };
}

/// Guard that pops the context when dropped.
pub struct ReactiveContext {
    effect: ReactiveEffect,
}

impl ReactiveContext {
    /// Push `effect` as the currently running effect.
    ///
    /// The effect stays current until the returned guard is dropped.
    pub fn enter(effect: &ReactiveEffect) -> Self {
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(effect.clone()));
        Self {
            effect: effect.clone(),
        }
    }

    /// Check if any effect is running.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// The innermost running effect, if any.
    pub fn current() -> Option<ReactiveEffect> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().cloned())
    }

    /// Whether `effect` is anywhere on the stack.
    pub fn contains(effect: &ReactiveEffect) -> bool {
        CONTEXT_STACK.with(|stack| stack.borrow().contains(effect))
    }

    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            if let Some(effect) = popped {
                debug_assert_eq!(
                    effect, self.effect,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    self.effect, effect
                );
            }
        });
    }
}
