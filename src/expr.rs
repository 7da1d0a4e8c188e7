//! Compilable arithmetic tree for the JIT path.
//!
//! An [`Expression`](crate::Expression) is lowered into an [`Expr`] tree whose leaves are constants
//! and references to the single input parameter. The tree is then:
//!
//! - flattened into a linear stack IR ([`LinearOp`]),
//! - cleaned up by the peephole optimiser in [`crate::opt`],
//! - emitted as Cranelift IR by [`Expr::codegen`].
//!
//! # Expression Tree Structure
//! - Leaf nodes: `Const` and `Var`
//! - Unary operations: `Neg`
//! - Binary operations: `Add`, `Sub`, `Mul`, `Div`
//! - Powers: `Pow` (integer exponent, inlined as multiplications) and `PowFloat`
//!   (any other exponent, a call to the host `pow`)

use std::collections::HashMap;
use std::sync::Arc;

use cranelift::prelude::*;
use cranelift_codegen::ir::FuncRef;
use cranelift_module::Module;
use tracing::debug;

use crate::{errors::BuilderError, operators, opt};

/// Names the symbol a `Var` node stands for. Every variable reads the same input parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct VarRef {
    pub name: Arc<str>,
}

/// An expression tree node that can be compiled into native code.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A constant floating point value
    Const(f64),
    /// A reference to the input parameter
    Var(VarRef),
    /// Addition of two expressions
    Add(Box<Expr>, Box<Expr>),
    /// Subtraction of two expressions
    Sub(Box<Expr>, Box<Expr>),
    /// Multiplication of two expressions
    Mul(Box<Expr>, Box<Expr>),
    /// Division of two expressions
    Div(Box<Expr>, Box<Expr>),
    /// Negation of an expression
    Neg(Box<Expr>),
    /// Exponentiation of an expression by an integer constant
    Pow(Box<Expr>, i64),
    /// Exponentiation of an expression by a floating point constant
    PowFloat(Box<Expr>, f64),
}

/// Linear operation for flattened expression evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum LinearOp {
    /// Load constant value
    LoadConst(f64),
    /// Load the input parameter
    LoadInput,
    /// Add two values from stack positions
    Add,
    /// Subtract two values from stack positions
    Sub,
    /// Multiply two values from stack positions
    Mul,
    /// Divide two values from stack positions
    Div,
    /// Negate stack top
    Neg,
    /// Power operation with integer exponent
    PowConst(i64),
    /// Power operation with floating point exponent
    PowFloat(f64),
    /// a × b + c  (fused)
    Fma,
    /// a × b − c  (fused)
    Fmsub,
}

/// Flattened expression representation for efficient evaluation
#[derive(Debug, Clone)]
pub struct FlattenedExpr {
    /// Linear sequence of operations
    pub ops: Vec<LinearOp>,
    /// Whether any operation reads the input parameter
    pub reads_input: bool,
    /// Pre-computed constant result (if expression is constant)
    pub constant_result: Option<f64>,
}

impl Expr {
    /// Shorthand for a variable node.
    pub fn var(name: &str) -> Expr {
        Expr::Var(VarRef {
            name: Arc::from(name),
        })
    }

    /// Evaluates the tree directly, with every variable reading `input`.
    ///
    /// Powers use the same arithmetic as the generated code: integer exponents are
    /// computed by repeated multiplication, other exponents with `powf`.
    pub fn eval(&self, input: f64) -> f64 {
        match self {
            Expr::Const(v) => *v,
            Expr::Var(_) => input,
            Expr::Add(l, r) => l.eval(input) + r.eval(input),
            Expr::Sub(l, r) => l.eval(input) - r.eval(input),
            Expr::Mul(l, r) => l.eval(input) * r.eval(input),
            Expr::Div(l, r) => l.eval(input) / r.eval(input),
            Expr::Neg(e) => -e.eval(input),
            Expr::Pow(base, exp) => powi_by_squaring(base.eval(input), *exp),
            Expr::PowFloat(base, exp) => base.eval(input).powf(*exp),
        }
    }

    /// Converts expression tree to flattened linear operations.
    pub fn flatten(&self) -> FlattenedExpr {
        if let Some(constant) = self.try_evaluate_constant() {
            return FlattenedExpr {
                ops: vec![LinearOp::LoadConst(constant)],
                reads_input: false,
                constant_result: Some(constant),
            };
        }

        let mut ops = Vec::new();
        self.flatten_recursive(&mut ops);
        FlattenedExpr {
            reads_input: ops.contains(&LinearOp::LoadInput),
            ops,
            constant_result: None,
        }
    }

    /// Tries to evaluate expression as constant.
    ///
    /// Folding keeps IEEE semantics: a constant division by zero folds to ±∞ or NaN exactly as
    /// the interpreter would produce it.
    fn try_evaluate_constant(&self) -> Option<f64> {
        match self {
            Expr::Const(val) => Some(*val),
            Expr::Var(_) => None,
            Expr::Add(l, r) => Some(l.try_evaluate_constant()? + r.try_evaluate_constant()?),
            Expr::Sub(l, r) => Some(l.try_evaluate_constant()? - r.try_evaluate_constant()?),
            Expr::Mul(l, r) => Some(l.try_evaluate_constant()? * r.try_evaluate_constant()?),
            Expr::Div(l, r) => Some(l.try_evaluate_constant()? / r.try_evaluate_constant()?),
            Expr::Neg(e) => Some(-e.try_evaluate_constant()?),
            Expr::Pow(base, exp) => Some(powi_by_squaring(base.try_evaluate_constant()?, *exp)),
            Expr::PowFloat(base, exp) => Some(base.try_evaluate_constant()?.powf(*exp)),
        }
    }

    fn flatten_recursive(&self, ops: &mut Vec<LinearOp>) {
        match self {
            Expr::Const(val) => ops.push(LinearOp::LoadConst(*val)),
            Expr::Var(_) => ops.push(LinearOp::LoadInput),
            Expr::Add(l, r) => {
                l.flatten_recursive(ops);
                r.flatten_recursive(ops);
                ops.push(LinearOp::Add);
            }
            Expr::Sub(l, r) => {
                l.flatten_recursive(ops);
                r.flatten_recursive(ops);
                ops.push(LinearOp::Sub);
            }
            Expr::Mul(l, r) => {
                l.flatten_recursive(ops);
                r.flatten_recursive(ops);
                ops.push(LinearOp::Mul);
            }
            Expr::Div(l, r) => {
                l.flatten_recursive(ops);
                r.flatten_recursive(ops);
                ops.push(LinearOp::Div);
            }
            Expr::Neg(e) => {
                e.flatten_recursive(ops);
                ops.push(LinearOp::Neg);
            }
            Expr::Pow(base, exp) => {
                base.flatten_recursive(ops);
                ops.push(LinearOp::PowConst(*exp));
            }
            Expr::PowFloat(base, exp) => {
                base.flatten_recursive(ops);
                ops.push(LinearOp::PowFloat(*exp));
            }
        }
    }

    /// Generates Cranelift IR for this expression and returns the value holding the result.
    ///
    /// The tree is flattened, optimised and then emitted as one linear instruction sequence.
    /// `input` is the function parameter every `Var` reads.
    pub fn codegen(
        &self,
        builder: &mut FunctionBuilder,
        module: &mut dyn Module,
        input: Value,
    ) -> Result<Value, BuilderError> {
        let flattened = opt::optimize(self.flatten());
        debug!(
            ops = flattened.ops.len(),
            reads_input = flattened.reads_input,
            "emitting optimised stack IR"
        );
        if let Some(c) = flattened.constant_result {
            return Ok(builder.ins().f64const(c));
        }

        let mut value_stack: Vec<Value> = Vec::with_capacity(flattened.ops.len());
        let mut pow_ref: Option<FuncRef> = None;
        // Constants are materialised once per distinct bit pattern.
        let mut const_cache: HashMap<u64, Value> = HashMap::new();

        for op in &flattened.ops {
            match op {
                LinearOp::LoadConst(v) => {
                    let lit = *const_cache
                        .entry(v.to_bits())
                        .or_insert_with(|| builder.ins().f64const(*v));
                    value_stack.push(lit);
                }
                LinearOp::LoadInput => value_stack.push(input),
                LinearOp::Add => {
                    let (l, r) = pop_pair(&mut value_stack)?;
                    value_stack.push(builder.ins().fadd(l, r));
                }
                LinearOp::Sub => {
                    let (l, r) = pop_pair(&mut value_stack)?;
                    value_stack.push(builder.ins().fsub(l, r));
                }
                LinearOp::Mul => {
                    let (l, r) = pop_pair(&mut value_stack)?;
                    value_stack.push(builder.ins().fmul(l, r));
                }
                LinearOp::Div => {
                    let (l, r) = pop_pair(&mut value_stack)?;
                    value_stack.push(builder.ins().fdiv(l, r));
                }
                LinearOp::Neg => {
                    let v = pop(&mut value_stack)?;
                    value_stack.push(builder.ins().fneg(v));
                }
                LinearOp::PowConst(e) => {
                    let base = pop(&mut value_stack)?;
                    value_stack.push(generate_optimized_power(builder, base, *e));
                }
                LinearOp::PowFloat(e) => {
                    let base = pop(&mut value_stack)?;
                    let exponent = builder.ins().f64const(*e);
                    let func = match pow_ref {
                        Some(func) => func,
                        None => {
                            let fid = operators::pow::link_powf(module)
                                .map_err(BuilderError::DeclarationError)?;
                            let func = module.declare_func_in_func(fid, builder.func);
                            pow_ref = Some(func);
                            func
                        }
                    };
                    value_stack.push(operators::pow::call_powf(builder, func, base, exponent));
                }
                LinearOp::Fma => {
                    let c = pop(&mut value_stack)?;
                    let (a, b) = pop_pair(&mut value_stack)?;
                    value_stack.push(builder.ins().fma(a, b, c));
                }
                LinearOp::Fmsub => {
                    let c = pop(&mut value_stack)?;
                    let (a, b) = pop_pair(&mut value_stack)?;
                    let neg_c = builder.ins().fneg(c);
                    value_stack.push(builder.ins().fma(a, b, neg_c));
                }
            }
        }

        // The stack must contain exactly one value.
        match (value_stack.pop(), value_stack.is_empty()) {
            (Some(result), true) => Ok(result),
            _ => Err(BuilderError::FunctionError(
                "unbalanced value stack after codegen".to_string(),
            )),
        }
    }
}

fn pop(stack: &mut Vec<Value>) -> Result<Value, BuilderError> {
    stack
        .pop()
        .ok_or_else(|| BuilderError::FunctionError("value stack underflow".to_string()))
}

fn pop_pair(stack: &mut Vec<Value>) -> Result<(Value, Value), BuilderError> {
    let r = pop(stack)?;
    let l = pop(stack)?;
    Ok((l, r))
}

/// Binary exponentiation mirroring [`generate_optimized_power`] operation for operation.
pub(crate) fn powi_by_squaring(base: f64, exp: i64) -> f64 {
    match exp {
        0 => 1.0,
        1 => base,
        2 => base * base,
        3 => base * base * base,
        4 => {
            let square = base * base;
            square * square
        }
        -1 => 1.0 / base,
        -2 => 1.0 / (base * base),
        _ => {
            let mut result = 1.0;
            let mut current = base;
            let mut remaining = exp.unsigned_abs();
            while remaining > 0 {
                if remaining & 1 == 1 {
                    result *= current;
                }
                if remaining > 1 {
                    current *= current;
                }
                remaining >>= 1;
            }
            if exp < 0 {
                1.0 / result
            } else {
                result
            }
        }
    }
}

/// Generates optimized power operation with inlining for common exponents and binary exponentiation
fn generate_optimized_power(builder: &mut FunctionBuilder, base: Value, exp: i64) -> Value {
    match exp {
        0 => builder.ins().f64const(1.0),
        1 => base,
        2 => builder.ins().fmul(base, base),
        3 => {
            let square = builder.ins().fmul(base, base);
            builder.ins().fmul(square, base)
        }
        4 => {
            let square = builder.ins().fmul(base, base);
            builder.ins().fmul(square, square)
        }
        -1 => {
            let one = builder.ins().f64const(1.0);
            builder.ins().fdiv(one, base)
        }
        -2 => {
            let square = builder.ins().fmul(base, base);
            let one = builder.ins().f64const(1.0);
            builder.ins().fdiv(one, square)
        }
        _ => {
            let mut result = builder.ins().f64const(1.0);
            let mut current_base = base;
            let mut remaining = exp.unsigned_abs();

            while remaining > 0 {
                if remaining & 1 == 1 {
                    result = builder.ins().fmul(result, current_base);
                }
                if remaining > 1 {
                    current_base = builder.ins().fmul(current_base, current_base);
                }
                remaining >>= 1;
            }

            if exp < 0 {
                let one = builder.ins().f64const(1.0);
                builder.ins().fdiv(one, result)
            } else {
                result
            }
        }
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Const(val) => write!(f, "{val}"),
            Expr::Var(var_ref) => write!(f, "{}", var_ref.name),
            Expr::Add(left, right) => write!(f, "({left} + {right})"),
            Expr::Sub(left, right) => write!(f, "({left} - {right})"),
            Expr::Mul(left, right) => write!(f, "({left} * {right})"),
            Expr::Div(left, right) => write!(f, "({left} / {right})"),
            Expr::Neg(expr) => write!(f, "-({expr})"),
            Expr::Pow(base, exp) => write!(f, "({base}^{exp})"),
            Expr::PowFloat(base, exp) => write!(f, "({base}^{exp})"),
        }
    }
}
