//! Canonical sums of terms.
//!
//! An [`Expression`] keeps its terms sorted by power with exactly one constant slot and at most one
//! term per (symbol, power). Every operator that builds an expression places terms through a
//! single insertion routine, so the canonical form holds after any sequence of operations.
//!
//! # Placement
//!
//! A new term first tries the constant slot. Failing that it walks outwards from the constant: to
//! the left for negative powers, to the right otherwise. The walk merges into a combinable term if
//! one exists in the run of equal powers, and otherwise inserts at the front of that run for
//! negative powers or at its back for positive ones.
//!
//! # Example
//!
//! ```
//! use polyterm_jit::Symbol;
//!
//! let x = Symbol::new("x");
//! let f = 2.0 + 1.0 / x.pow(2.0) + 6.0 * &x + 6.0 - 10.0 * x.pow(-3.0) + x.pow(0.25);
//!
//! assert_eq!(f.to_string(), "-10/x^3 +1/x^2 +8 +x^0.25 +6x");
//! assert_eq!(f.evaluate_at(1.0), 6.0);
//! ```

use std::cmp::Ordering;
use std::fmt;

use itertools::Itertools;
use tracing::{debug, trace};

use crate::builder::BuildOptions;
use crate::compiled::{CompiledFunction, SymbolBinding};
use crate::errors::{CompileError, EvalError};
use crate::expr::Expr;
use crate::scalar::Scalar;
use crate::symbol::Symbol;
use crate::term::Term;

/// Where a term lands in the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Merge(usize),
    Insert(usize),
}

/// A sum of terms in canonical form.
#[derive(Clone, Debug, PartialEq)]
pub struct Expression {
    terms: Vec<Term>,
    /// Index of the constant slot in `terms`.
    constant: usize,
}

impl Default for Expression {
    fn default() -> Self {
        Self::new()
    }
}

impl Expression {
    /// The empty sum, holding only a zero constant.
    pub fn new() -> Self {
        Self {
            terms: vec![Term::Constant(Scalar::ZERO)],
            constant: 0,
        }
    }

    /// All terms in ascending power order, constant slot included.
    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Term> {
        self.terms.iter()
    }

    /// Value of the constant slot.
    pub fn constant(&self) -> Scalar {
        self.terms[self.constant].coefficient()
    }

    /// Number of power terms.
    pub fn len(&self) -> usize {
        self.terms.len() - 1
    }

    /// True when the expression holds nothing but its constant.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Distinct symbols in term order.
    pub fn symbols(&self) -> Vec<Symbol> {
        self.terms
            .iter()
            .filter_map(Term::symbol)
            .unique()
            .cloned()
            .collect()
    }

    /// Inserts a term, merging it into a combinable term if one exists.
    ///
    /// Returns the index the term landed at.
    pub(crate) fn insert(&mut self, term: Term) -> usize {
        let constant = self.constant;
        let slot = if self.terms[constant].can_combine(&term) {
            Slot::Merge(constant)
        } else if precedes_constant(&term) {
            self.walk_left(constant, &term)
        } else {
            self.walk_right(constant, &term)
        };
        self.place(slot, term)
    }

    fn walk_left(&self, mut index: usize, term: &Term) -> Slot {
        loop {
            let node = &self.terms[index];
            if node.can_combine(term) {
                return Slot::Merge(index);
            }
            if node.cmp_power(term) == Ordering::Less {
                return Slot::Insert(index + 1);
            }
            if index == 0 {
                return Slot::Insert(0);
            }
            index -= 1;
        }
    }

    fn walk_right(&self, mut index: usize, term: &Term) -> Slot {
        loop {
            let node = &self.terms[index];
            if node.can_combine(term) {
                return Slot::Merge(index);
            }
            if node.cmp_power(term) == Ordering::Greater {
                return Slot::Insert(index);
            }
            if index + 1 == self.terms.len() {
                return Slot::Insert(index + 1);
            }
            index += 1;
        }
    }

    /// Finds the slot for `term` scanning forward from `from`.
    ///
    /// `from` must not lie past the run of terms with the same power as `term`.
    fn locate_from(&self, from: usize, term: &Term) -> Slot {
        if term.is_constant() {
            return Slot::Merge(self.constant);
        }

        let mut index = from;
        while index < self.terms.len() && self.terms[index].cmp_power(term) == Ordering::Less {
            index += 1;
        }
        let run_start = index;
        while index < self.terms.len() && self.terms[index].cmp_power(term) == Ordering::Equal {
            if self.terms[index].can_combine(term) {
                return Slot::Merge(index);
            }
            index += 1;
        }

        if precedes_constant(term) {
            Slot::Insert(run_start)
        } else {
            Slot::Insert(index)
        }
    }

    fn place(&mut self, slot: Slot, term: Term) -> usize {
        match slot {
            Slot::Merge(index) => {
                let node = &self.terms[index];
                let merged = node.with_coefficient(node.coefficient() + term.coefficient());
                trace!(index, power = %term.power(), coefficient = %merged.coefficient(), "merged term");
                self.terms[index] = merged;
                index
            }
            Slot::Insert(index) => {
                trace!(index, power = %term.power(), "inserted term");
                self.terms.insert(index, term);
                if index <= self.constant {
                    self.constant += 1;
                }
                index
            }
        }
    }

    /// Index of the first term in the equal-power run containing `index`.
    fn run_start(&self, mut index: usize) -> usize {
        while index > 0 && self.terms[index - 1].cmp_power(&self.terms[index]) == Ordering::Equal {
            index -= 1;
        }
        index
    }

    /// Inserts every term of an ascending sequence.
    ///
    /// Each search resumes from the run where the previous term landed, so merging a whole
    /// expression is a single forward pass. The result is the same as calling `insert` for each
    /// term in order.
    pub(crate) fn merge<I>(&mut self, ascending: I)
    where
        I: IntoIterator<Item = Term>,
    {
        let mut cursor = 0;
        for term in ascending {
            let slot = self.locate_from(cursor, &term);
            let landed = self.place(slot, term);
            cursor = self.run_start(landed);
        }
    }

    /// Every term negated. The constant slot stays in place.
    pub fn negate(&self) -> Expression {
        self.map_coefficients(|c| -c)
    }

    /// Every coefficient multiplied by `k`. Terms are kept even when `k` is zero.
    pub fn scaled(&self, k: impl Into<Scalar>) -> Expression {
        let k = k.into();
        self.map_coefficients(|c| c * k)
    }

    /// Every coefficient divided by `k`.
    pub fn divided(&self, k: impl Into<Scalar>) -> Expression {
        let k = k.into();
        self.map_coefficients(|c| c / k)
    }

    fn map_coefficients(&self, f: impl Fn(Scalar) -> Scalar) -> Expression {
        Expression {
            terms: self
                .terms
                .iter()
                .map(|t| t.with_coefficient(f(t.coefficient())))
                .collect(),
            constant: self.constant,
        }
    }

    /// Sums the terms from left to right, asking `binder` for each symbol's value.
    pub fn evaluate_with<F>(&self, binder: F) -> Scalar
    where
        F: Fn(&Symbol) -> Scalar,
    {
        self.terms.iter().map(|t| t.evaluate(&binder)).sum()
    }

    /// Like [`Expression::evaluate_with`], stopping at the first binder error.
    pub fn try_evaluate_with<F, E>(&self, binder: F) -> Result<Scalar, E>
    where
        F: Fn(&Symbol) -> Result<Scalar, E>,
    {
        self.terms
            .iter()
            .try_fold(Scalar::ZERO, |acc, t| Ok(acc + t.try_evaluate(&binder)?))
    }

    /// Evaluates with every symbol standing for `x`. Bound values are ignored.
    pub fn evaluate_at(&self, x: impl Into<Scalar>) -> Scalar {
        let x = x.into();
        self.evaluate_with(|_| x)
    }

    /// Evaluates using each symbol's bound value.
    ///
    /// # Errors
    /// Returns `EvalError::UnboundSymbol` for the first symbol without a value.
    ///
    /// ```
    /// use polyterm_jit::{EvalError, Symbol};
    ///
    /// let x = Symbol::new("x");
    /// let y = Symbol::new("y");
    /// let f = -5.0 / &x + x.pow(2.0) + 100.0 * &y;
    ///
    /// x.bind(1.0);
    /// assert_eq!(f.evaluate(), Err(EvalError::UnboundSymbol("y".to_string())));
    ///
    /// y.bind(2.0);
    /// assert_eq!(f.evaluate().unwrap(), 196.0);
    /// ```
    pub fn evaluate(&self) -> Result<Scalar, EvalError> {
        self.try_evaluate_with(|symbol| {
            if symbol.has_value() {
                Ok(symbol.value())
            } else {
                debug!(%symbol, "strict evaluation hit an unbound symbol");
                Err(EvalError::UnboundSymbol(symbol.to_string()))
            }
        })
    }

    /// Evaluates with bound symbols taking their values and unbound ones standing for `x`.
    pub fn evaluate_or_default(&self, x: impl Into<Scalar>) -> Scalar {
        let x = x.into();
        self.evaluate_with(|symbol| {
            if symbol.has_value() {
                symbol.value()
            } else {
                x
            }
        })
    }

    /// Turns the expression into an interpreted closure equivalent to [`Expression::evaluate_at`].
    pub fn into_fn(self) -> impl Fn(f64) -> f64 + Send + Sync {
        move |x| self.evaluate_at(x).value()
    }

    /// Lowers the expression into a left-folded chain of additions.
    pub fn to_expr<F>(&self, provider: F) -> Expr
    where
        F: Fn(&Symbol) -> Expr,
    {
        self.terms
            .iter()
            .map(|t| t.to_expr(&provider))
            .reduce(|acc, e| Expr::Add(Box::new(acc), Box::new(e)))
            .unwrap_or(Expr::Const(0.0))
    }

    /// JIT-compiles the expression with every symbol reading the function input.
    ///
    /// ```
    /// use polyterm_jit::Symbol;
    ///
    /// let x = Symbol::new("x");
    /// let f = 3.0 * x.pow(2.0) + 1.0;
    ///
    /// let compiled = f.compile().unwrap();
    /// assert_eq!(compiled.call(2.0), 13.0);
    /// ```
    pub fn compile(&self) -> Result<CompiledFunction, CompileError> {
        self.compile_with(SymbolBinding::Input, &BuildOptions::default())
    }

    /// JIT-compiles the expression with bound symbols frozen to their current values.
    ///
    /// Unbound symbols read the function input.
    pub fn compile_unset(&self) -> Result<CompiledFunction, CompileError> {
        self.compile_with(SymbolBinding::BoundAsLiteral, &BuildOptions::default())
    }

    pub fn compile_with(
        &self,
        binding: SymbolBinding,
        options: &BuildOptions,
    ) -> Result<CompiledFunction, CompileError> {
        CompiledFunction::new(self, binding, options)
    }
}

fn precedes_constant(term: &Term) -> bool {
    term.power().value().total_cmp(&0.0) == Ordering::Less
}

impl From<Term> for Expression {
    fn from(term: Term) -> Self {
        if term.is_constant() {
            return Self {
                terms: vec![term],
                constant: 0,
            };
        }
        let mut expression = Self::new();
        expression.insert(term);
        expression
    }
}

impl From<Symbol> for Expression {
    fn from(symbol: Symbol) -> Self {
        Term::variable(symbol).into()
    }
}

impl From<Scalar> for Expression {
    fn from(value: Scalar) -> Self {
        Term::Constant(value).into()
    }
}

impl From<f64> for Expression {
    fn from(value: f64) -> Self {
        Scalar::new(value).into()
    }
}

impl FromIterator<Term> for Expression {
    fn from_iter<I: IntoIterator<Item = Term>>(iter: I) -> Self {
        let mut expression = Self::new();
        for term in iter {
            expression.insert(term);
        }
        expression
    }
}

impl IntoIterator for Expression {
    type Item = Term;
    type IntoIter = std::vec::IntoIter<Term>;

    fn into_iter(self) -> Self::IntoIter {
        self.terms.into_iter()
    }
}

impl<'a> IntoIterator for &'a Expression {
    type Item = &'a Term;
    type IntoIter = std::slice::Iter<'a, Term>;

    fn into_iter(self) -> Self::IntoIter {
        self.terms.iter()
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = self
            .terms
            .iter()
            .filter(|t| t.coefficient() != 0.0)
            .join(" ");
        match shown.strip_prefix('+') {
            _ if shown.is_empty() => write!(f, "0"),
            Some(rest) => write!(f, "{rest}"),
            None => write!(f, "{shown}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x() -> Symbol {
        Symbol::new("x")
    }

    fn powers(e: &Expression) -> Vec<f64> {
        e.terms().iter().map(|t| t.power().value()).collect()
    }

    fn demo() -> Expression {
        let x = x();
        2.0 + 1.0 / x.pow(2.0) + 6.0 * &x + 6.0 - 10.0 * x.pow(-3.0) + x.pow(0.25)
    }

    #[test]
    fn test_new_holds_only_constant() {
        let e = Expression::new();
        assert_eq!(e.terms(), &[Term::constant(0.0)]);
        assert!(e.is_empty());
        assert_eq!(e.to_string(), "0");
    }

    #[test]
    fn test_terms_are_sorted() {
        let e = demo();
        assert_eq!(powers(&e), vec![-3.0, -2.0, 0.0, 0.25, 1.0]);
        assert_eq!(e.constant(), 8.0);
        assert_eq!(e.len(), 4);
    }

    #[test]
    fn test_like_terms_merge() {
        let x = x();
        let a: Expression = [Term::new(3.0, x.clone(), 2.0), Term::new(4.0, x.clone(), 2.0)]
            .into_iter()
            .collect();
        let b: Expression = [Term::new(4.0, x.clone(), 2.0), Term::new(3.0, x.clone(), 2.0)]
            .into_iter()
            .collect();
        assert_eq!(a, b);
        assert_eq!(a.len(), 1);
        assert_eq!(a.terms()[1].coefficient(), 7.0);
    }

    #[test]
    fn test_negative_powers_walk_left_in_order() {
        let x = x();
        let e: Expression = [x.pow(-3.0), x.pow(-1.0), x.pow(-2.0), x.pow(-5.0)]
            .into_iter()
            .collect();
        assert_eq!(powers(&e), vec![-5.0, -3.0, -2.0, -1.0, 0.0]);
    }

    #[test]
    fn test_equal_power_runs() {
        let x = x();
        let y = Symbol::new("y");
        let z = Symbol::new("z");

        let pos: Expression = [x.pow(2.0), y.pow(2.0), z.pow(2.0)].into_iter().collect();
        let order: Vec<_> = pos.symbols().iter().map(|s| s.to_string()).collect();
        assert_eq!(order, vec!["x", "y", "z"]);

        let neg: Expression = [x.pow(-2.0), y.pow(-2.0), z.pow(-2.0)].into_iter().collect();
        let order: Vec<_> = neg.symbols().iter().map(|s| s.to_string()).collect();
        assert_eq!(order, vec!["z", "y", "x"]);
    }

    #[test]
    fn test_zero_coefficients_are_kept() {
        let x = x();
        let e = x.pow(2.0) + 1.0 - x.pow(2.0);
        assert_eq!(e.len(), 1);
        assert_eq!(e.terms()[1].coefficient(), 0.0);
        assert_eq!(e.to_string(), "1");
        assert_eq!(e.evaluate_at(5.0), 1.0);
    }

    #[test]
    fn test_merge_matches_one_at_a_time() {
        let x = x();
        let y = Symbol::new("y");
        let base: Expression = [x.pow(-2.0), y.pow(-2.0), x.pow(1.0), Term::constant(3.0)]
            .into_iter()
            .collect();
        let other: Expression = [
            y.pow(-2.0),
            Term::new(2.0, x.clone(), -2.0),
            Term::new(5.0, y.clone(), -1.0),
            y.pow(1.0),
            Term::new(4.0, x.clone(), 3.0),
        ]
        .into_iter()
        .collect();

        let mut merged = base.clone();
        merged.merge(other.clone());

        let mut expected = base;
        for term in other {
            expected.insert(term);
        }
        assert_eq!(merged, expected);
    }

    #[test]
    fn test_negate_and_scale() {
        let e = demo();
        let n = e.negate();
        assert_eq!(powers(&n), powers(&e));
        assert_eq!(n.evaluate_at(2.0), -e.evaluate_at(2.0));

        let s = e.scaled(0.0);
        assert_eq!(s.len(), e.len());
        assert_eq!(s.evaluate_at(2.0), 0.0);
        assert_eq!(e.divided(2.0).constant(), 4.0);
    }

    #[test]
    fn test_demo_values() {
        let f = demo();
        assert_eq!(f.evaluate_at(1.0), 6.0);
        assert!((f.evaluate_at(2.0).value() - 20.19).abs() < 0.005);
        assert!(f.evaluate_at(0.0).is_nan());
    }

    #[test]
    fn test_binding_modes() {
        let x = x();
        let y = Symbol::new("y");
        let f = -5.0 * x.pow(-1.0) + x.pow(2.0) + 100.0 * &y;

        assert!(f.evaluate().is_err());
        assert_eq!(f.evaluate_at(1.0), 96.0);

        y.bind(2.0);
        assert_eq!(f.evaluate_or_default(1.0), 196.0);
        assert_eq!(
            f.evaluate(),
            Err(EvalError::UnboundSymbol("x".to_string()))
        );

        x.bind(1.0);
        assert_eq!(f.evaluate(), Ok(Scalar::new(196.0)));
        assert_eq!(f.evaluate_at(1.0), 96.0);
    }

    #[test]
    fn test_into_fn() {
        let f = demo().into_fn();
        assert_eq!(f(1.0), 6.0);
    }

    #[test]
    fn test_to_expr_matches_interpreter() {
        let f = demo();
        let lowered = f.to_expr(|s| Expr::var(&s.to_string()));
        for input in [0.5, 1.0, 2.0, 7.5] {
            let expected = f.evaluate_at(input).value();
            assert!((lowered.eval(input) - expected).abs() <= 1e-9 * expected.abs());
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(demo().to_string(), "-10/x^3 +1/x^2 +8 +x^0.25 +6x");
        assert_eq!(Expression::from(Term::constant(-2.0)).to_string(), "-2");
        assert_eq!((3.0 * x()).to_string().as_str(), "+3x");
        assert_eq!(Expression::from(3.0 * x()).to_string(), "3x");
    }
}
