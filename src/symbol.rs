//! Named unknowns that may carry a bound value.
//!
//! A [`Symbol`] is identified by its [`Identifier`] only. Its bound value lives in a shared cell:
//! clones of a symbol observe each other's rebinding, which is how a caller changes the value of an
//! unknown between evaluations of an expression that already holds it.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::scalar::Scalar;
use crate::term::Term;

/// Unique identity of a symbol.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Identifier {
    /// "No symbol". Used to represent constants uniformly.
    Invalid,
    Named(Arc<str>),
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Invalid => write!(f, "<invalid>"),
            Identifier::Named(name) => write!(f, "{name}"),
        }
    }
}

/// A named unknown, optionally bound to a value.
///
/// Equality and hashing only look at the identifier.
///
/// ```
/// use polyterm_jit::Symbol;
///
/// let x = Symbol::new("x");
/// assert!(!x.has_value());
///
/// let handle = x.clone();
/// handle.bind(2.5);
/// assert_eq!(x.value(), 2.5);
/// ```
#[derive(Clone)]
pub struct Symbol {
    id: Identifier,
    value: Arc<AtomicU64>,
}

impl Symbol {
    /// Creates an unbound symbol.
    pub fn new(name: &str) -> Self {
        Self::from_parts(Identifier::Named(Arc::from(name)), Scalar::NAN)
    }

    /// Creates a symbol that already carries a value.
    pub fn with_value(name: &str, value: impl Into<Scalar>) -> Self {
        Self::from_parts(Identifier::Named(Arc::from(name)), value.into())
    }

    /// The "no symbol" symbol. It always evaluates to one.
    pub fn invalid() -> Self {
        Self::from_parts(Identifier::Invalid, Scalar::ONE)
    }

    fn from_parts(id: Identifier, value: Scalar) -> Self {
        Self {
            id,
            value: Arc::new(AtomicU64::new(value.value().to_bits())),
        }
    }

    pub fn id(&self) -> &Identifier {
        &self.id
    }

    /// The symbol's name, `None` for the invalid symbol.
    pub fn name(&self) -> Option<&str> {
        match &self.id {
            Identifier::Invalid => None,
            Identifier::Named(name) => Some(name),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.id != Identifier::Invalid
    }

    /// The bound value, NaN when unbound.
    pub fn value(&self) -> Scalar {
        Scalar::new(f64::from_bits(self.value.load(Ordering::Acquire)))
    }

    pub fn has_value(&self) -> bool {
        !self.value().is_nan()
    }

    /// Binds a value. Every clone of this symbol observes the new value.
    ///
    /// Binding the invalid symbol has no effect.
    pub fn bind(&self, value: impl Into<Scalar>) {
        if self.is_valid() {
            self.value
                .store(value.into().value().to_bits(), Ordering::Release);
        }
    }

    /// Removes the bound value.
    pub fn unbind(&self) {
        self.bind(Scalar::NAN);
    }

    /// `self^power` with a coefficient of one.
    pub fn pow(&self, power: impl Into<Scalar>) -> Term {
        Term::new(Scalar::ONE, self.clone(), power.into())
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Symbol")
            .field("id", &self.id)
            .field("value", &self.value().value())
            .finish()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_identity_ignores_value() {
        let a = Symbol::new("x");
        let b = Symbol::with_value("x", 3.0);
        let c = Symbol::new("y");
        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<Symbol> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_binding_is_shared_between_clones() {
        let x = Symbol::new("x");
        let held = x.clone();
        assert!(!held.has_value());

        x.bind(4.0);
        assert!(held.has_value());
        assert_eq!(held.value(), 4.0);

        held.unbind();
        assert!(!x.has_value());
    }

    #[test]
    fn test_invalid_symbol() {
        let inv = Symbol::invalid();
        assert!(!inv.is_valid());
        assert!(inv.has_value());
        assert_eq!(inv.value(), 1.0);
        assert_eq!(inv.name(), None);

        inv.bind(5.0);
        assert_eq!(inv.value(), 1.0);
    }

    #[test]
    fn test_display() {
        assert_eq!(Symbol::new("alpha").to_string(), "alpha");
        assert_eq!(Symbol::new("x").name(), Some("x"));
    }
}
