//! Native evaluators built from expressions.
//!
//! A [`CompiledFunction`] is produced by [`Expression::compile`](crate::Expression::compile) or
//! [`Expression::compile_unset`](crate::Expression::compile_unset). It holds a JIT-compiled
//! `f64 -> f64` closure and the text of the expression it was built from.
//!
//! # Example
//!
//! ```
//! use polyterm_jit::Symbol;
//!
//! let x = Symbol::new("x");
//! let y = Symbol::with_value("y", 2.0);
//! let f = x.pow(2.0) + 100.0 * &y;
//!
//! // Every symbol reads the input.
//! assert_eq!(f.compile().unwrap().call(3.0), 9.0 + 300.0);
//!
//! // Bound symbols are frozen, unbound ones read the input.
//! assert_eq!(f.compile_unset().unwrap().call(3.0), 9.0 + 200.0);
//! ```

use colored::Colorize;
use rayon::prelude::*;
use tracing::debug;

use crate::builder::{build_function_with, BuildOptions};
use crate::errors::CompileError;
use crate::expr::Expr;
use crate::expression::Expression;
use crate::scalar::Scalar;
use crate::symbol::Symbol;
use crate::types::JITFunction;

/// How symbols are lowered when compiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SymbolBinding {
    /// Every symbol reads the function input.
    #[default]
    Input,
    /// Bound symbols become literals captured at compile time. Unbound ones read the input.
    BoundAsLiteral,
}

/// A JIT-compiled expression.
///
/// Cloning is cheap: clones share the compiled code.
#[derive(Clone)]
pub struct CompiledFunction {
    source: String,
    binding: SymbolBinding,
    fun: JITFunction,
}

impl std::fmt::Debug for CompiledFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{{\n")?;
        writeln!(f, "    {}: {}\n", "Expression".cyan(), self.source)?;
        writeln!(f, "    {}: {:?}\n", "Binding".cyan(), self.binding)?;
        writeln!(f, "}}")?;
        Ok(())
    }
}

impl std::fmt::Display for CompiledFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", "compiled".green(), self.source)
    }
}

fn input_node(symbol: &Symbol) -> Expr {
    Expr::var(symbol.name().unwrap_or_default())
}

impl CompiledFunction {
    pub(crate) fn new(
        expression: &Expression,
        binding: SymbolBinding,
        options: &BuildOptions,
    ) -> Result<Self, CompileError> {
        let expr = match binding {
            SymbolBinding::Input => expression.to_expr(input_node),
            SymbolBinding::BoundAsLiteral => expression.to_expr(|symbol| {
                if symbol.has_value() {
                    Expr::Const(symbol.value().value())
                } else {
                    input_node(symbol)
                }
            }),
        };
        let fun = build_function_with(expr, options)?;
        let source = expression.to_string();
        debug!(%source, ?binding, "compiled expression");

        Ok(Self {
            source,
            binding,
            fun,
        })
    }

    /// Evaluates the compiled function at `x`.
    pub fn call(&self, x: f64) -> f64 {
        (self.fun)(x)
    }

    pub fn evaluate(&self, x: impl Into<Scalar>) -> Scalar {
        Scalar::new(self.call(x.into().value()))
    }

    /// Evaluates every input, writing results into `outputs`.
    ///
    /// # Errors
    /// Returns `CompileError::InvalidOutputLength` if `outputs` and `inputs` differ in length.
    pub fn eval_into(&self, inputs: &[f64], outputs: &mut [f64]) -> Result<(), CompileError> {
        if outputs.len() != inputs.len() {
            return Err(CompileError::InvalidOutputLength {
                expected: inputs.len(),
                got: outputs.len(),
            });
        }
        for (out, &x) in outputs.iter_mut().zip(inputs) {
            *out = (self.fun)(x);
        }
        Ok(())
    }

    /// Evaluates every input into a freshly allocated vector.
    pub fn eval_vec(&self, inputs: &[f64]) -> Vec<f64> {
        inputs.iter().map(|&x| (self.fun)(x)).collect()
    }

    /// Evaluates every input in parallel on the rayon pool.
    pub fn eval_par(&self, inputs: &[f64]) -> Vec<f64> {
        inputs.par_iter().map(|&x| (self.fun)(x)).collect()
    }

    /// Returns a reference to the compiled closure.
    pub fn fun(&self) -> &JITFunction {
        &self.fun
    }

    pub fn into_closure(self) -> JITFunction {
        self.fun
    }

    /// Text of the expression this function was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn binding(&self) -> SymbolBinding {
        self.binding
    }
}
