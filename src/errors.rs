//! Error types for the polyterm-jit crate.
//!
//! This module defines the error types that can occur during evaluation and JIT compilation of
//! expressions. The main error types are:
//!
//! - `EvalError`: Errors during strict interpreted evaluation
//! - `BuilderError`: Errors during JIT compilation with Cranelift
//! - `CompileError`: High-level errors when compiling or batch-evaluating an expression
//!
//! Numeric domain problems (division by zero, a negative base raised to a fractional power) are
//! not errors: they propagate as NaN or infinity.

use cranelift_codegen::CodegenError;
use cranelift_module::ModuleError;
use thiserror::Error;

/// Errors that can occur while interpreting an expression.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// Strict evaluation reached a symbol that carries no value
    #[error("symbol `{0}` has no bound value")]
    UnboundSymbol(String),
}

/// Errors that can occur during JIT compilation of expressions.
///
/// This enum represents various failure modes in the process of turning an expression tree
/// into machine code using Cranelift as the JIT compiler backend.
#[derive(Error, Debug)]
pub enum BuilderError {
    /// Error when the target machine architecture is not supported
    #[error("host machine is not supported: {0}")]
    HostMachineNotSupported(String),
    /// Error during Cranelift code generation
    #[error("codegen error: {0}")]
    CodegenError(CodegenError),
    /// Error in the Cranelift JIT module
    #[error("module error: {0}")]
    ModuleError(ModuleError),
    /// Error when defining the JIT function
    #[error("function error: {0}")]
    FunctionError(String),
    /// Error when declaring the JIT function or one of its imports
    #[error("declaration error: {0}")]
    DeclarationError(String),
    /// Error when a Cranelift setting is rejected
    #[error("setting error: {0}")]
    SettingError(String),
}

/// High-level errors that can occur when compiling and running an expression.
#[derive(Debug, Error)]
pub enum CompileError {
    /// Error when JIT compiling the expression
    #[error("Failed to build JIT function")]
    Build(#[from] BuilderError),
    /// Error when the output buffer does not match the number of inputs
    #[error("Invalid output length: expected {expected}, got {got}")]
    InvalidOutputLength { expected: usize, got: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = EvalError::UnboundSymbol("y".to_string());
        assert_eq!(err.to_string(), "symbol `y` has no bound value");

        let err = CompileError::InvalidOutputLength {
            expected: 3,
            got: 2,
        };
        assert_eq!(err.to_string(), "Invalid output length: expected 3, got 2");
    }

    #[test]
    fn test_builder_error_converts() {
        let err: CompileError = BuilderError::FunctionError("boom".to_string()).into();
        assert!(matches!(err, CompileError::Build(BuilderError::FunctionError(_))));
    }
}
