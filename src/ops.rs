//! Operator overloads for building expressions.
//!
//! - `+` and `-` between any two of `f64`, [`Scalar`], [`Symbol`], [`Term`] and [`Expression`]
//!   produce an [`Expression`].
//! - `*` and `/` by a number scale a [`Symbol`] or [`Term`] into a [`Term`] and an [`Expression`]
//!   into an [`Expression`]. A number divided by a term is the scaled reciprocal.
//! - `*` and `/` between two of [`Symbol`] and [`Term`] combine powers of the same symbol and give
//!   `Option<Term>`: `x * x` is `Some(x^2)`, `x * y` is `None`. A constant operand scales the other.
//! - Unary `-` negates.
//!
//! Borrowed symbols and expressions are cloned; owned operands are consumed.

use std::ops::{Add, Div, Mul, Neg, Sub};

use crate::expression::Expression;
use crate::scalar::Scalar;
use crate::symbol::Symbol;
use crate::term::Term;

macro_rules! impl_additive_ops {
    // Right-hand side converts to a single term
    (term $lhs:ty, $rhs:ty, $to_lhs:expr, $to_rhs:expr) => {
        impl Add<$rhs> for $lhs {
            type Output = Expression;
            fn add(self, rhs: $rhs) -> Expression {
                let mut sum: Expression = $to_lhs(self);
                sum.insert($to_rhs(rhs));
                sum
            }
        }
        impl Sub<$rhs> for $lhs {
            type Output = Expression;
            fn sub(self, rhs: $rhs) -> Expression {
                let mut sum: Expression = $to_lhs(self);
                let term: Term = $to_rhs(rhs);
                sum.insert(term.negate());
                sum
            }
        }
    };
    // Right-hand side is a whole expression
    (expression $lhs:ty, $rhs:ty, $to_lhs:expr, $to_rhs:expr) => {
        impl Add<$rhs> for $lhs {
            type Output = Expression;
            fn add(self, rhs: $rhs) -> Expression {
                let mut sum: Expression = $to_lhs(self);
                let other: Expression = $to_rhs(rhs);
                sum.merge(other);
                sum
            }
        }
        impl Sub<$rhs> for $lhs {
            type Output = Expression;
            fn sub(self, rhs: $rhs) -> Expression {
                let mut sum: Expression = $to_lhs(self);
                let other: Expression = $to_rhs(rhs);
                sum.merge(other.negate());
                sum
            }
        }
    };
}

/// Product of two terms. Constants scale, powers of one symbol add.
fn product(lhs: Term, rhs: Term) -> Option<Term> {
    match (&lhs, &rhs) {
        (Term::Constant(k), _) => Some(rhs.scale(*k)),
        (_, Term::Constant(k)) => Some(lhs.scale(*k)),
        _ => lhs.try_multiply(&rhs),
    }
}

/// Quotient of two terms. A constant numerator gives the scaled reciprocal.
fn quotient(lhs: Term, rhs: Term) -> Option<Term> {
    match (&lhs, &rhs) {
        (_, Term::Constant(k)) => Some(lhs.divide_by(*k)),
        (Term::Constant(k), _) => Some(rhs.reciprocal_scaled(*k)),
        _ => lhs.try_divide(&rhs),
    }
}

macro_rules! impl_term_products {
    ($lhs:ty, $rhs:ty, $to_lhs:expr, $to_rhs:expr) => {
        impl Mul<$rhs> for $lhs {
            type Output = Option<Term>;
            fn mul(self, rhs: $rhs) -> Option<Term> {
                product($to_lhs(self), $to_rhs(rhs))
            }
        }
        impl Div<$rhs> for $lhs {
            type Output = Option<Term>;
            fn div(self, rhs: $rhs) -> Option<Term> {
                quotient($to_lhs(self), $to_rhs(rhs))
            }
        }
    };
}

macro_rules! impl_term_scaling {
    ($lhs:ty, $to_term:expr) => {
        impl Mul<f64> for $lhs {
            type Output = Term;
            fn mul(self, k: f64) -> Term {
                let term: Term = $to_term(self);
                term.scale(k)
            }
        }
        impl Mul<Scalar> for $lhs {
            type Output = Term;
            fn mul(self, k: Scalar) -> Term {
                let term: Term = $to_term(self);
                term.scale(k)
            }
        }
        impl Mul<$lhs> for f64 {
            type Output = Term;
            fn mul(self, rhs: $lhs) -> Term {
                let term: Term = $to_term(rhs);
                term.scale(self)
            }
        }
        impl Mul<$lhs> for Scalar {
            type Output = Term;
            fn mul(self, rhs: $lhs) -> Term {
                let term: Term = $to_term(rhs);
                term.scale(self)
            }
        }
        impl Div<f64> for $lhs {
            type Output = Term;
            fn div(self, k: f64) -> Term {
                let term: Term = $to_term(self);
                term.divide_by(k)
            }
        }
        impl Div<Scalar> for $lhs {
            type Output = Term;
            fn div(self, k: Scalar) -> Term {
                let term: Term = $to_term(self);
                term.divide_by(k)
            }
        }
        impl Div<$lhs> for f64 {
            type Output = Term;
            fn div(self, rhs: $lhs) -> Term {
                let term: Term = $to_term(rhs);
                term.reciprocal_scaled(self)
            }
        }
        impl Div<$lhs> for Scalar {
            type Output = Term;
            fn div(self, rhs: $lhs) -> Term {
                let term: Term = $to_term(rhs);
                term.reciprocal_scaled(self)
            }
        }
        impl Neg for $lhs {
            type Output = Term;
            fn neg(self) -> Term {
                let term: Term = $to_term(self);
                term.negate()
            }
        }
    };
}

macro_rules! impl_expression_scaling {
    ($lhs:ty) => {
        impl Mul<f64> for $lhs {
            type Output = Expression;
            fn mul(self, k: f64) -> Expression {
                self.scaled(k)
            }
        }
        impl Mul<Scalar> for $lhs {
            type Output = Expression;
            fn mul(self, k: Scalar) -> Expression {
                self.scaled(k)
            }
        }
        impl Mul<$lhs> for f64 {
            type Output = Expression;
            fn mul(self, rhs: $lhs) -> Expression {
                rhs.scaled(self)
            }
        }
        impl Mul<$lhs> for Scalar {
            type Output = Expression;
            fn mul(self, rhs: $lhs) -> Expression {
                rhs.scaled(self)
            }
        }
        impl Div<f64> for $lhs {
            type Output = Expression;
            fn div(self, k: f64) -> Expression {
                self.divided(k)
            }
        }
        impl Div<Scalar> for $lhs {
            type Output = Expression;
            fn div(self, k: Scalar) -> Expression {
                self.divided(k)
            }
        }
        impl Neg for $lhs {
            type Output = Expression;
            fn neg(self) -> Expression {
                self.negate()
            }
        }
    };
}

// Number on the left
impl_additive_ops!(term f64, Symbol, Expression::from, Term::variable);
impl_additive_ops!(term f64, &Symbol, Expression::from, |r: &Symbol| Term::variable(r.clone()));
impl_additive_ops!(term f64, Term, Expression::from, |r: Term| r);
impl_additive_ops!(expression f64, Expression, Expression::from, |r: Expression| r);
impl_additive_ops!(expression f64, &Expression, Expression::from, |r: &Expression| r.clone());
impl_additive_ops!(term Scalar, Symbol, Expression::from, Term::variable);
impl_additive_ops!(term Scalar, &Symbol, Expression::from, |r: &Symbol| Term::variable(r.clone()));
impl_additive_ops!(term Scalar, Term, Expression::from, |r: Term| r);
impl_additive_ops!(expression Scalar, Expression, Expression::from, |r: Expression| r);
impl_additive_ops!(expression Scalar, &Expression, Expression::from, |r: &Expression| r.clone());

// Symbol on the left
impl_additive_ops!(term Symbol, f64, Expression::from, Term::constant);
impl_additive_ops!(term Symbol, Scalar, Expression::from, Term::constant);
impl_additive_ops!(term Symbol, Symbol, Expression::from, Term::variable);
impl_additive_ops!(term Symbol, &Symbol, Expression::from, |r: &Symbol| Term::variable(r.clone()));
impl_additive_ops!(term Symbol, Term, Expression::from, |r: Term| r);
impl_additive_ops!(expression Symbol, Expression, Expression::from, |r: Expression| r);
impl_additive_ops!(expression Symbol, &Expression, Expression::from, |r: &Expression| r.clone());
impl_additive_ops!(term &Symbol, f64, |s: &Symbol| Expression::from(s.clone()), Term::constant);
impl_additive_ops!(term &Symbol, Scalar, |s: &Symbol| Expression::from(s.clone()), Term::constant);
impl_additive_ops!(term &Symbol, Symbol, |s: &Symbol| Expression::from(s.clone()), Term::variable);
impl_additive_ops!(term &Symbol, &Symbol, |s: &Symbol| Expression::from(s.clone()), |r: &Symbol| Term::variable(r.clone()));
impl_additive_ops!(term &Symbol, Term, |s: &Symbol| Expression::from(s.clone()), |r: Term| r);
impl_additive_ops!(expression &Symbol, Expression, |s: &Symbol| Expression::from(s.clone()), |r: Expression| r);
impl_additive_ops!(expression &Symbol, &Expression, |s: &Symbol| Expression::from(s.clone()), |r: &Expression| r.clone());

// Term on the left
impl_additive_ops!(term Term, f64, Expression::from, Term::constant);
impl_additive_ops!(term Term, Scalar, Expression::from, Term::constant);
impl_additive_ops!(term Term, Symbol, Expression::from, Term::variable);
impl_additive_ops!(term Term, &Symbol, Expression::from, |r: &Symbol| Term::variable(r.clone()));
impl_additive_ops!(term Term, Term, Expression::from, |r: Term| r);
impl_additive_ops!(expression Term, Expression, Expression::from, |r: Expression| r);
impl_additive_ops!(expression Term, &Expression, Expression::from, |r: &Expression| r.clone());

// Expression on the left
impl_additive_ops!(term Expression, f64, |s: Expression| s, Term::constant);
impl_additive_ops!(term Expression, Scalar, |s: Expression| s, Term::constant);
impl_additive_ops!(term Expression, Symbol, |s: Expression| s, Term::variable);
impl_additive_ops!(term Expression, &Symbol, |s: Expression| s, |r: &Symbol| Term::variable(r.clone()));
impl_additive_ops!(term Expression, Term, |s: Expression| s, |r: Term| r);
impl_additive_ops!(expression Expression, Expression, |s: Expression| s, |r: Expression| r);
impl_additive_ops!(expression Expression, &Expression, |s: Expression| s, |r: &Expression| r.clone());
impl_additive_ops!(term &Expression, f64, |s: &Expression| s.clone(), Term::constant);
impl_additive_ops!(term &Expression, Scalar, |s: &Expression| s.clone(), Term::constant);
impl_additive_ops!(term &Expression, Symbol, |s: &Expression| s.clone(), Term::variable);
impl_additive_ops!(term &Expression, &Symbol, |s: &Expression| s.clone(), |r: &Symbol| Term::variable(r.clone()));
impl_additive_ops!(term &Expression, Term, |s: &Expression| s.clone(), |r: Term| r);
impl_additive_ops!(expression &Expression, Expression, |s: &Expression| s.clone(), |r: Expression| r);
impl_additive_ops!(expression &Expression, &Expression, |s: &Expression| s.clone(), |r: &Expression| r.clone());

impl_term_scaling!(Term, |t: Term| t);
impl_term_scaling!(Symbol, Term::variable);
impl_term_scaling!(&Symbol, |s: &Symbol| Term::variable(s.clone()));

impl_term_products!(Term, Term, |t: Term| t, |t: Term| t);
impl_term_products!(Term, Symbol, |t: Term| t, Term::variable);
impl_term_products!(Term, &Symbol, |t: Term| t, |s: &Symbol| Term::variable(s.clone()));
impl_term_products!(Symbol, Term, Term::variable, |t: Term| t);
impl_term_products!(Symbol, Symbol, Term::variable, Term::variable);
impl_term_products!(Symbol, &Symbol, Term::variable, |s: &Symbol| Term::variable(s.clone()));
impl_term_products!(&Symbol, Term, |s: &Symbol| Term::variable(s.clone()), |t: Term| t);
impl_term_products!(&Symbol, Symbol, |s: &Symbol| Term::variable(s.clone()), Term::variable);
impl_term_products!(&Symbol, &Symbol, |s: &Symbol| Term::variable(s.clone()), |s: &Symbol| Term::variable(s.clone()));

impl_expression_scaling!(Expression);
impl_expression_scaling!(&Expression);
