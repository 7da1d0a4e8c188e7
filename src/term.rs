//! Additive components of an [`Expression`](crate::Expression).
//!
//! A [`Term`] is either a plain constant or `coefficient * symbol^power`. Both variants share one
//! combination contract, so an expression can merge, order and evaluate its terms without caring
//! which kind it holds.

use std::cmp::Ordering;
use std::fmt;

use crate::expr::Expr;
use crate::scalar::Scalar;
use crate::symbol::Symbol;

/// Largest integral power lowered to inline multiplications instead of a `pow` call.
const MAX_INLINE_POWER: f64 = 64.0;

/// A constant or a single symbol raised to a power, with a coefficient.
///
/// ```
/// use polyterm_jit::{Symbol, Term};
///
/// let x = Symbol::new("x");
/// let a = Term::new(3.0, x.clone(), 2.0);
/// let b = Term::new(4.0, x.clone(), 2.0);
///
/// let sum = a.try_add(&b).unwrap();
/// assert_eq!(sum.coefficient(), 7.0);
/// assert_eq!(sum.to_string(), "+7x^2");
///
/// // Different powers never combine.
/// assert!(a.try_add(&x.pow(3.0)).is_none());
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum Term {
    Constant(Scalar),
    Power {
        coefficient: Scalar,
        symbol: Symbol,
        power: Scalar,
    },
}

impl Term {
    pub fn constant(value: impl Into<Scalar>) -> Term {
        Term::Constant(value.into())
    }

    /// Creates `coefficient * symbol^power`.
    ///
    /// The result collapses to a constant when it cannot depend on the symbol: a zero coefficient
    /// gives `Constant(0)`, a zero power or the invalid symbol give `Constant(coefficient)`.
    pub fn new(coefficient: impl Into<Scalar>, symbol: Symbol, power: impl Into<Scalar>) -> Term {
        let coefficient = coefficient.into();
        let power = power.into();
        if coefficient == 0.0 {
            Term::Constant(Scalar::ZERO)
        } else if power == 0.0 || !symbol.is_valid() {
            Term::Constant(coefficient)
        } else {
            Term::Power {
                coefficient,
                symbol,
                power,
            }
        }
    }

    /// `1 * symbol^1`.
    pub fn variable(symbol: Symbol) -> Term {
        Term::new(Scalar::ONE, symbol, Scalar::ONE)
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Term::Constant(_))
    }

    /// True when [`Term::evaluate`] can produce a value from bound symbols alone.
    pub fn is_evaluatable(&self) -> bool {
        match self {
            Term::Constant(_) => true,
            Term::Power { symbol, .. } => symbol.has_value(),
        }
    }

    pub fn coefficient(&self) -> Scalar {
        match self {
            Term::Constant(value) => *value,
            Term::Power { coefficient, .. } => *coefficient,
        }
    }

    /// The power, zero for constants.
    pub fn power(&self) -> Scalar {
        match self {
            Term::Constant(_) => Scalar::ZERO,
            Term::Power { power, .. } => *power,
        }
    }

    pub fn symbol(&self) -> Option<&Symbol> {
        match self {
            Term::Constant(_) => None,
            Term::Power { symbol, .. } => Some(symbol),
        }
    }

    /// Replaces the coefficient without collapsing the variant.
    pub(crate) fn with_coefficient(&self, coefficient: Scalar) -> Term {
        match self {
            Term::Constant(_) => Term::Constant(coefficient),
            Term::Power { symbol, power, .. } => Term::Power {
                coefficient,
                symbol: symbol.clone(),
                power: *power,
            },
        }
    }

    /// Whether `self` and `other` can be merged into one term: both constants, or powers of the
    /// same symbol with the same power.
    pub fn can_combine(&self, other: &Term) -> bool {
        match (self, other) {
            (Term::Constant(_), Term::Constant(_)) => true,
            (
                Term::Power {
                    symbol: s1,
                    power: p1,
                    ..
                },
                Term::Power {
                    symbol: s2,
                    power: p2,
                    ..
                },
            ) => s1 == s2 && p1.value().total_cmp(&p2.value()) == Ordering::Equal,
            _ => false,
        }
    }

    /// Sum of two combinable terms. The result keeps the variant even if the coefficients cancel.
    pub fn try_add(&self, other: &Term) -> Option<Term> {
        self.can_combine(other)
            .then(|| self.with_coefficient(self.coefficient() + other.coefficient()))
    }

    pub fn try_subtract(&self, other: &Term) -> Option<Term> {
        self.can_combine(other)
            .then(|| self.with_coefficient(self.coefficient() - other.coefficient()))
    }

    /// Product of two constants, or of two powers of the same symbol.
    ///
    /// Powers add; a product whose powers cancel is a constant.
    pub fn try_multiply(&self, other: &Term) -> Option<Term> {
        match (self, other) {
            (Term::Constant(a), Term::Constant(b)) => Some(Term::Constant(*a * *b)),
            (
                Term::Power {
                    coefficient: c1,
                    symbol: s1,
                    power: p1,
                },
                Term::Power {
                    coefficient: c2,
                    symbol: s2,
                    power: p2,
                },
            ) if s1 == s2 => Some(Term::new(*c1 * *c2, s1.clone(), *p1 + *p2)),
            _ => None,
        }
    }

    /// Quotient of two constants, or of two powers of the same symbol.
    pub fn try_divide(&self, other: &Term) -> Option<Term> {
        match (self, other) {
            (Term::Constant(a), Term::Constant(b)) => Some(Term::Constant(*a / *b)),
            (
                Term::Power {
                    coefficient: c1,
                    symbol: s1,
                    power: p1,
                },
                Term::Power {
                    coefficient: c2,
                    symbol: s2,
                    power: p2,
                },
            ) if s1 == s2 => Some(Term::new(*c1 / *c2, s1.clone(), *p1 - *p2)),
            _ => None,
        }
    }

    pub fn negate(&self) -> Term {
        self.with_coefficient(-self.coefficient())
    }

    /// `k * self`.
    pub fn scale(&self, k: impl Into<Scalar>) -> Term {
        let k = k.into();
        match self {
            Term::Constant(value) => Term::Constant(*value * k),
            Term::Power {
                coefficient,
                symbol,
                power,
            } => Term::new(*coefficient * k, symbol.clone(), *power),
        }
    }

    /// `self / k`.
    pub fn divide_by(&self, k: impl Into<Scalar>) -> Term {
        let k = k.into();
        match self {
            Term::Constant(value) => Term::Constant(*value / k),
            Term::Power {
                coefficient,
                symbol,
                power,
            } => Term::new(*coefficient / k, symbol.clone(), *power),
        }
    }

    /// `k / self`, i.e. `(k / c) * symbol^-p`.
    pub fn reciprocal_scaled(&self, k: impl Into<Scalar>) -> Term {
        let k = k.into();
        match self {
            Term::Constant(value) => Term::Constant(k / *value),
            Term::Power {
                coefficient,
                symbol,
                power,
            } => Term::new(k / *coefficient, symbol.clone(), -*power),
        }
    }

    /// `self^k`, i.e. `c^k * symbol^(p*k)`.
    pub fn raise(&self, k: impl Into<Scalar>) -> Term {
        let k = k.into();
        match self {
            Term::Constant(value) => Term::Constant(value.pow(k)),
            Term::Power {
                coefficient,
                symbol,
                power,
            } => Term::new(coefficient.pow(k), symbol.clone(), *power * k),
        }
    }

    /// Evaluates the term, asking `binder` for the value of its symbol.
    ///
    /// Uses `powf` semantics: a negative base with a fractional power yields NaN.
    pub fn evaluate<F>(&self, binder: F) -> Scalar
    where
        F: Fn(&Symbol) -> Scalar,
    {
        match self {
            Term::Constant(value) => *value,
            Term::Power {
                coefficient,
                symbol,
                power,
            } => *coefficient * binder(symbol).pow(*power),
        }
    }

    /// Like [`Term::evaluate`] with a binder that may fail.
    pub fn try_evaluate<F, E>(&self, binder: F) -> Result<Scalar, E>
    where
        F: Fn(&Symbol) -> Result<Scalar, E>,
    {
        match self {
            Term::Constant(value) => Ok(*value),
            Term::Power {
                coefficient,
                symbol,
                power,
            } => Ok(*coefficient * binder(symbol)?.pow(*power)),
        }
    }

    /// Total order by power. Constants rank as power zero.
    pub fn cmp_power(&self, other: &Term) -> Ordering {
        self.power().value().total_cmp(&other.power().value())
    }

    /// Lowers the term into a compilable tree.
    ///
    /// `provider` supplies the node standing for the symbol. Integral powers up to 64 in
    /// magnitude are inlined as multiplications, every other power calls `pow`.
    pub fn to_expr<F>(&self, provider: F) -> Expr
    where
        F: Fn(&Symbol) -> Expr,
    {
        match self {
            Term::Constant(value) => Expr::Const(value.value()),
            Term::Power {
                coefficient,
                symbol,
                power,
            } => {
                let base = Box::new(provider(symbol));
                let raised = if power.is_integral() && power.abs() <= MAX_INLINE_POWER {
                    Expr::Pow(base, power.value() as i64)
                } else {
                    Expr::PowFloat(base, power.value())
                };
                Expr::Mul(Box::new(Expr::Const(coefficient.value())), Box::new(raised))
            }
        }
    }
}

impl From<Symbol> for Term {
    fn from(symbol: Symbol) -> Self {
        Term::variable(symbol)
    }
}

impl From<Scalar> for Term {
    fn from(value: Scalar) -> Self {
        Term::Constant(value)
    }
}

impl From<f64> for Term {
    fn from(value: f64) -> Self {
        Term::Constant(Scalar::new(value))
    }
}

/// Formats with at most two decimals and no trailing zeros.
pub(crate) fn format_number(value: f64) -> String {
    let mut s = format!("{value:.2}");
    if s.contains('.') {
        let trimmed = s.trim_end_matches('0').trim_end_matches('.').len();
        s.truncate(trimmed);
    }
    if s == "-0" {
        s = "0".to_string();
    }
    s
}

fn signed(value: f64) -> String {
    let s = format_number(value);
    if s.starts_with('-') {
        s
    } else {
        format!("+{s}")
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = self.coefficient().value();
        match self {
            _ if c == 0.0 => write!(f, "+0"),
            Term::Constant(_) => write!(f, "{}", signed(c)),
            Term::Power { symbol, power, .. } => {
                let p = power.value();
                if p < 0.0 {
                    write!(f, "{}/{symbol}", signed(c))?;
                    if p != -1.0 {
                        write!(f, "^{}", format_number(-p))?;
                    }
                    return Ok(());
                }
                if c == 1.0 {
                    write!(f, "+{symbol}")?;
                } else if c == -1.0 {
                    write!(f, "-{symbol}")?;
                } else {
                    write!(f, "{}{symbol}", signed(c))?;
                }
                if p != 1.0 {
                    write!(f, "^{}", format_number(p))?;
                }
                Ok(())
            }
        }
    }
}
