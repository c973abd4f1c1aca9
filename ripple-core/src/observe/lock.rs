//! The read-only gate.
//!
//! Read-only views reject mutation only while the lock is engaged. It
//! starts engaged; framework code unlocks it around updates it is allowed
//! to make through read-only views.

use std::cell::Cell;

thread_local! {
    static LOCKED: Cell<bool> = const { Cell::new(true) };
}

pub fn lock() {
    LOCKED.with(|flag| flag.set(true));
}

pub fn unlock() {
    LOCKED.with(|flag| flag.set(false));
}

pub fn is_locked() -> bool {
    LOCKED.with(Cell::get)
}
