//! Property and entry keys.
//!
//! Keyed containers (records, arrays) address their slots with property
//! keys: strings, canonical array indices and symbols. Associative
//! collections address entries with arbitrary values, carried as
//! [`Key::Value`] so that the dependency store can treat both uniformly.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use super::Value;

/// A unique, unforgeable marker.
///
/// Two symbols are equal only if they are clones of the same symbol, no
/// matter what their descriptions say.
#[derive(Clone)]
pub struct Symbol(Rc<SymbolInner>);

struct SymbolInner {
    description: Option<Rc<str>>,
    well_known: bool,
}

struct WellKnownSymbols {
    iterator: Symbol,
    async_iterator: Symbol,
    has_instance: Symbol,
    to_primitive: Symbol,
    to_string_tag: Symbol,
    iterate: Symbol,
}

thread_local! {
    static WELL_KNOWN: WellKnownSymbols = WellKnownSymbols {
        iterator: Symbol::well_known("Symbol.iterator"),
        async_iterator: Symbol::well_known("Symbol.asyncIterator"),
        has_instance: Symbol::well_known("Symbol.hasInstance"),
        to_primitive: Symbol::well_known("Symbol.toPrimitive"),
        to_string_tag: Symbol::well_known("Symbol.toStringTag"),
        // Not well-known: the iteration marker has to be tracked.
        iterate: Symbol::new("iterate"),
    };
}

impl Symbol {
    /// Create a new symbol with the given description.
    pub fn new(description: impl Into<Rc<str>>) -> Self {
        Self(Rc::new(SymbolInner {
            description: Some(description.into()),
            well_known: false,
        }))
    }

    /// Create a new symbol without a description.
    pub fn anonymous() -> Self {
        Self(Rc::new(SymbolInner {
            description: None,
            well_known: false,
        }))
    }

    fn well_known(description: &str) -> Self {
        Self(Rc::new(SymbolInner {
            description: Some(Rc::from(description)),
            well_known: true,
        }))
    }

    pub fn iterator() -> Self {
        WELL_KNOWN.with(|s| s.iterator.clone())
    }

    pub fn async_iterator() -> Self {
        WELL_KNOWN.with(|s| s.async_iterator.clone())
    }

    pub fn has_instance() -> Self {
        WELL_KNOWN.with(|s| s.has_instance.clone())
    }

    pub fn to_primitive() -> Self {
        WELL_KNOWN.with(|s| s.to_primitive.clone())
    }

    pub fn to_string_tag() -> Self {
        WELL_KNOWN.with(|s| s.to_string_tag.clone())
    }

    /// The description given at creation, if any.
    pub fn description(&self) -> Option<&str> {
        self.0.description.as_deref()
    }

    /// Whether this is one of the host's fixed protocol symbols.
    ///
    /// Reads through these keys are never tracked.
    pub fn is_well_known(&self) -> bool {
        self.0.well_known
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.description().unwrap_or(""))
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// The synthetic key standing for "the set of keys" of a container.
///
/// Enumeration, `size` and collection iteration track this key; adding
/// or removing keys triggers it.
pub fn iterate_key() -> Key {
    Key::Symbol(WELL_KNOWN.with(|s| s.iterate.clone()))
}

/// A property key (records, arrays) or an entry key (collections).
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Str(Rc<str>),
    Index(usize),
    Symbol(Symbol),
    /// An associative-collection entry key, compared with SameValueZero.
    Value(Value),
}

impl Key {
    /// Convert a value into a property key.
    ///
    /// Canonical array indices, whether given as numbers or as numeric
    /// strings, become [`Key::Index`]. Anything else that is not a symbol
    /// is stringified.
    pub fn property(value: Value) -> Key {
        match value {
            Value::Str(s) => match canonical_index(&s) {
                Some(index) => Key::Index(index),
                None => Key::Str(s),
            },
            Value::Number(n) if is_index(n) => Key::Index(n as usize),
            Value::Number(n) => Key::Str(Rc::from(super::format_number(n))),
            Value::Symbol(s) => Key::Symbol(s),
            other => Key::Str(Rc::from(other.to_string())),
        }
    }

    /// The key of an array's length property.
    pub fn length() -> Key {
        Key::Str(Rc::from("length"))
    }

    pub fn is_length(&self) -> bool {
        matches!(self, Key::Str(s) if &**s == "length")
    }

    /// Whether reads through this key bypass tracking.
    pub fn is_well_known_symbol(&self) -> bool {
        matches!(self, Key::Symbol(s) if s.is_well_known())
    }

    /// The key as a value, suitable for passing back into an accessor.
    pub fn to_value(&self) -> Value {
        match self {
            Key::Str(s) => Value::Str(s.clone()),
            Key::Index(i) => Value::Number(*i as f64),
            Key::Symbol(s) => Value::Symbol(s.clone()),
            Key::Value(v) => v.clone(),
        }
    }
}

fn is_index(n: f64) -> bool {
    n >= 0.0 && n.fract() == 0.0 && n < u32::MAX as f64
}

fn canonical_index(s: &str) -> Option<usize> {
    if s.is_empty() || (s.len() > 1 && s.starts_with('0')) {
        return None;
    }
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse::<u32>().ok().filter(|i| *i != u32::MAX).map(|i| i as usize)
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::property(Value::from(s))
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

impl From<Symbol> for Key {
    fn from(symbol: Symbol) -> Self {
        Key::Symbol(symbol)
    }
}

impl From<Key> for Value {
    fn from(key: Key) -> Self {
        match key {
            Key::Value(v) => v,
            other => other.to_value(),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Str(s) => f.write_str(s),
            Key::Index(i) => write!(f, "{i}"),
            Key::Symbol(s) => write!(f, "{s}"),
            Key::Value(v) => write!(f, "{v}"),
        }
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Str(s) => write!(f, "{s:?}"),
            Key::Index(i) => write!(f, "{i}"),
            Key::Symbol(s) => write!(f, "{s}"),
            Key::Value(v) => write!(f, "{v:?}"),
        }
    }
}
