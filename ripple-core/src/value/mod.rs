//! Dynamic Values
//!
//! Observed state is made of dynamically typed values. Primitives are
//! stored inline; containers live behind identity-bearing handles so that
//! two structurally equal containers are still two different targets.
//!
//! # Equality
//!
//! Two notions of equality are used throughout the crate:
//!
//! - [`Value::same`] is strict identity. It decides whether a write
//!   actually changed a slot: numbers compare with IEEE equality (so `NaN`
//!   never equals itself), strings by content, everything on the heap by
//!   pointer.
//! - `PartialEq`/`Hash` implement SameValueZero, which is what keys of
//!   associative collections need: `NaN` equals `NaN` and `+0` equals
//!   `-0`.

mod key;
mod object;
#[cfg(feature = "serde")]
mod json;

pub use key::{iterate_key, Key, Symbol};
pub use object::{Object, ObjectId, Shape};

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::observe::Reactive;
use crate::reactive::{Effect, ReactiveEffect, Ref};

/// A dynamically typed value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    Symbol(Symbol),
    Function(Function),
    /// A raw, unobserved container.
    Object(Object),
    /// An observed (mutable or read-only) view over a raw container.
    Reactive(Reactive),
    /// A single-slot observable box.
    Ref(Ref),
}

impl Value {
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Whether the value is a container (raw or observed).
    pub fn is_container(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Reactive(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_reactive(&self) -> Option<&Reactive> {
        match self {
            Value::Reactive(r) => Some(r),
            _ => None,
        }
    }

    pub fn into_reactive(self) -> Option<Reactive> {
        match self {
            Value::Reactive(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_ref_cell(&self) -> Option<&Ref> {
        match self {
            Value::Ref(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Truthiness as a host language would define it.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Strict identity comparison.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            _ => match (self.identity(), other.identity()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }

    /// Address of the heap allocation behind a reference value.
    pub(crate) fn identity(&self) -> Option<usize> {
        match self {
            Value::Function(f) => Some(f.addr()),
            Value::Object(o) => Some(o.addr()),
            Value::Reactive(r) => Some(r.addr()),
            Value::Ref(r) => Some(r.addr()),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            _ => self.same(other),
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Undefined | Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Number(n) => {
                let bits = if *n == 0.0 {
                    0.0f64.to_bits()
                } else if n.is_nan() {
                    f64::NAN.to_bits()
                } else {
                    n.to_bits()
                };
                bits.hash(state);
            }
            Value::Str(s) => s.hash(state),
            Value::Symbol(s) => s.hash(state),
            _ => self.identity().hash(state),
        }
    }
}

/// Format a number the way a host language prints it (`1`, `1.5`, `NaN`).
pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        // Covers -0.
        "0".to_string()
    } else {
        format!("{n}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::Str(s) => f.write_str(s),
            Value::Symbol(s) => write!(f, "{s}"),
            Value::Function(_) => f.write_str("function"),
            Value::Object(o) => write!(f, "[object {}]", o.shape()),
            Value::Reactive(r) => write!(f, "[object {}]", r.shape()),
            Value::Ref(_) => f.write_str("[object Ref]"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("Undefined"),
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::Symbol(s) => write!(f, "{s}"),
            Value::Function(func) => write!(f, "Function({:#x})", func.addr()),
            Value::Object(o) => write!(f, "{o:?}"),
            Value::Reactive(r) => write!(f, "{r:?}"),
            Value::Ref(r) => write!(f, "{r:?}"),
        }
    }
}

macro_rules! impl_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Value::Number(n as f64)
                }
            }
        )*
    };
}

impl_from_number!(i32, i64, u32, u64, usize, f32, f64);

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<Rc<str>> for Value {
    fn from(s: Rc<str>) -> Self {
        Value::Str(s)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Undefined
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl From<Symbol> for Value {
    fn from(s: Symbol) -> Self {
        Value::Symbol(s)
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Value::Function(f)
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Value::Object(o)
    }
}

impl From<&Object> for Value {
    fn from(o: &Object) -> Self {
        Value::Object(o.clone())
    }
}

impl From<Reactive> for Value {
    fn from(r: Reactive) -> Self {
        Value::Reactive(r)
    }
}

impl From<&Reactive> for Value {
    fn from(r: &Reactive) -> Self {
        Value::Reactive(r.clone())
    }
}

impl From<Ref> for Value {
    fn from(r: Ref) -> Self {
        Value::Ref(r)
    }
}

impl From<&Ref> for Value {
    fn from(r: &Ref) -> Self {
        Value::Ref(r.clone())
    }
}

impl From<&Value> for Value {
    fn from(v: &Value) -> Self {
        v.clone()
    }
}

/// A callable value.
///
/// Functions are never observed; storing one in a container and reading
/// it back yields the same function.
#[derive(Clone)]
pub struct Function {
    call: Rc<dyn Fn(&[Value]) -> Value>,
    effect: Option<ReactiveEffect>,
}

impl Function {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Value + 'static,
    {
        Self {
            call: Rc::new(f),
            effect: None,
        }
    }

    pub fn call(&self, args: &[Value]) -> Value {
        (self.call)(args)
    }

    /// The effect this function runs, if it was made from an effect handle.
    pub fn effect(&self) -> Option<&ReactiveEffect> {
        self.effect.as_ref()
    }

    pub fn ptr_eq(&self, other: &Function) -> bool {
        self.addr() == other.addr()
    }

    fn addr(&self) -> usize {
        Rc::as_ptr(&self.call) as *const () as usize
    }
}

impl<T> From<Effect<T>> for Function
where
    T: Into<Value> + 'static,
{
    fn from(effect: Effect<T>) -> Self {
        let handle = effect.handle().clone();
        Self {
            call: Rc::new(move |_| effect.run().map(Into::into).unwrap_or_default()),
            effect: Some(handle),
        }
    }
}
