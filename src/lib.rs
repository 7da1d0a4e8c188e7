//! Canonical sums of single-symbol power terms, with interpreted and JIT-compiled evaluation.
//!
//! An [`Expression`] is a sum of `coefficient * symbol^power` terms plus a constant. Combining
//! symbols, numbers, terms and expressions with the usual operators keeps every expression in
//! canonical form: terms sorted by power, like terms merged, exactly one constant slot.
//!
//! Expressions can be evaluated directly, or compiled once with
//! [Cranelift](https://github.com/bytecodealliance/wasmtime/tree/main/cranelift) into a native
//! `f64 -> f64` function for repeated evaluation.
//!
//! # Features
//!
//! - Canonical like-term combination over constants and symbol powers
//! - Evaluation with explicit bindings, a single shared input, or bound symbol values
//! - JIT compilation with constant folding and fused multiply-add
//! - Batch and parallel evaluation of compiled functions
//!
//! # Example
//!
//! ```rust
//! use polyterm_jit::Symbol;
//!
//! let x = Symbol::new("x");
//! let f = 2.0 + 1.0 / x.pow(2.0) + 6.0 * &x + 6.0 - 10.0 * x.pow(-3.0) + x.pow(0.25);
//!
//! // Interpret
//! assert_eq!(f.evaluate_at(1.0), 6.0);
//!
//! // Compile once, evaluate many times
//! let compiled = f.compile().unwrap();
//! assert!((compiled.call(2.0) - 20.19).abs() < 0.005);
//! ```

pub use compiled::{CompiledFunction, SymbolBinding};
pub use errors::{BuilderError, CompileError, EvalError};
pub use expression::Expression;
pub use scalar::Scalar;
pub use symbol::{Identifier, Symbol};
pub use term::Term;

pub mod prelude {
    pub use crate::builder::{build_function, BuildOptions, OptLevel};
    pub use crate::compiled::{CompiledFunction, SymbolBinding};
    pub use crate::expr::Expr;
    pub use crate::expression::Expression;
    pub use crate::scalar::Scalar;
    pub use crate::symbol::Symbol;
    pub use crate::term::Term;
}

/// JIT compilation functionality using Cranelift
pub mod builder;
/// Compiled evaluators
pub mod compiled;
/// Error types for the various failure modes
pub mod errors;
/// Compilable expression tree and stack IR
pub mod expr;
/// Canonical term sums
pub mod expression;
/// Operator overloads
mod ops;
/// Functions for linking external functions to the expression tree
pub(crate) mod operators {
    pub(crate) mod pow;
}
/// Peephole optimisation of the stack IR
pub mod opt;
/// Numeric value type
pub mod scalar;
/// Named unknowns
pub mod symbol;
/// Constants and symbol powers
pub mod term;
/// Type aliases for compiled functions
pub mod types;

mod proptests;
