//! Developer warnings.
//!
//! Misuse that does not warrant failing the call (writing through a locked
//! read-only view, observing a primitive, writing a read-only computed)
//! produces a [`Warning`]. Warnings go to the handler installed for the
//! current thread, or to `tracing` under the `ripple` target if there is
//! none.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::reactive::OperationType;

/// A non-fatal diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// A primitive was passed to `reactive` or `readonly`.
    NotReactive { value: String },
    /// A mutation was attempted through a locked read-only view.
    ReadonlyMutation {
        operation: OperationType,
        key: Option<String>,
    },
    /// A computed created without a setter was written.
    ReadonlyComputed,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::NotReactive { value } => {
                write!(f, "value cannot be made reactive: {value}")
            }
            Warning::ReadonlyMutation { operation, key } => {
                let name = capitalize(operation.as_str());
                match key {
                    Some(key) => write!(
                        f,
                        "{name} operation on key \"{key}\" failed: target is readonly."
                    ),
                    None => write!(f, "{name} operation failed: target is readonly."),
                }
            }
            Warning::ReadonlyComputed => {
                f.write_str("Write operation failed: computed value is readonly")
            }
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub type WarnHandler = Rc<dyn Fn(&Warning)>;

thread_local! {
    static HANDLER: RefCell<Option<WarnHandler>> = const { RefCell::new(None) };
}

/// Route this thread's warnings to `handler`, returning the previous one.
pub fn set_warn_handler(handler: impl Fn(&Warning) + 'static) -> Option<WarnHandler> {
    HANDLER.with(|slot| slot.borrow_mut().replace(Rc::new(handler)))
}

/// Remove this thread's handler; warnings go back to `tracing`.
pub fn take_warn_handler() -> Option<WarnHandler> {
    HANDLER.with(|slot| slot.borrow_mut().take())
}

pub(crate) fn warn(warning: Warning) {
    let handler = HANDLER.with(|slot| slot.borrow().clone());
    match handler {
        Some(handler) => handler(&warning),
        None => tracing::warn!(target: "ripple", "{warning}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages() {
        assert_eq!(
            Warning::NotReactive { value: "1".into() }.to_string(),
            "value cannot be made reactive: 1"
        );
        assert_eq!(
            Warning::ReadonlyMutation {
                operation: OperationType::Set,
                key: Some("foo".into()),
            }
            .to_string(),
            "Set operation on key \"foo\" failed: target is readonly."
        );
        assert_eq!(
            Warning::ReadonlyMutation {
                operation: OperationType::Clear,
                key: None,
            }
            .to_string(),
            "Clear operation failed: target is readonly."
        );
    }

    #[test]
    fn handler_receives_warnings() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        set_warn_handler(move |w| log.borrow_mut().push(w.clone()));
        warn(Warning::ReadonlyComputed);
        assert!(take_warn_handler().is_some());
        warn(Warning::ReadonlyComputed);
        assert_eq!(*seen.borrow(), vec![Warning::ReadonlyComputed]);
    }
}
