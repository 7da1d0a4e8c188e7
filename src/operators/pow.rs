//! Functions for linking and calling the power function in JIT-compiled code.
//!
//! This module provides functionality to:
//! - Expose a C-ABI `pow` routine that the JIT module resolves by name
//! - Link that routine into a Cranelift module
//! - Generate Cranelift IR instructions to call it within compiled functions

use cranelift::prelude::FunctionBuilder;
use cranelift_codegen::ir::types::F64;
use cranelift_codegen::ir::{AbiParam, FuncRef, InstBuilder, Value};
use cranelift_module::{FuncId, Linkage, Module};

/// Symbol name the JIT module resolves to [`pow_f64`].
pub(crate) const POW_SYMBOL: &str = "pow";

/// Host implementation of `base^exponent` with `f64::powf` semantics.
pub(crate) extern "C" fn pow_f64(base: f64, exponent: f64) -> f64 {
    base.powf(exponent)
}

/// Declares the external power function in `module`.
///
/// The signature matches `pow(f64, f64) -> f64`. Declaring the same import
/// twice yields the same `FuncId`.
///
/// # Returns
/// * `Ok(FuncId)` - The function ID that can be used to call pow
/// * `Err(String)` - Error message if declaration fails
pub fn link_powf(module: &mut dyn Module) -> Result<FuncId, String> {
    let mut sig = module.make_signature();
    sig.params.push(AbiParam::new(F64)); // base
    sig.params.push(AbiParam::new(F64)); // exponent
    sig.returns.push(AbiParam::new(F64)); // result

    module
        .declare_function(POW_SYMBOL, Linkage::Import, &sig)
        .map_err(|e| e.to_string())
}

/// Emits a call to the linked power function and returns the result value.
///
/// `func` is the function reference obtained from `declare_func_in_func` for the
/// ID returned by [`link_powf`].
pub fn call_powf(
    builder: &mut FunctionBuilder,
    func: FuncRef,
    base: Value,
    exponent: Value,
) -> Value {
    let call = builder.ins().call(func, &[base, exponent]);
    builder.inst_results(call)[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pow_f64_matches_powf() {
        assert_eq!(pow_f64(2.0, 0.5), 2.0_f64.powf(0.5));
        assert_eq!(pow_f64(9.0, -1.0), 9.0_f64.powf(-1.0));
        assert!(pow_f64(-8.0, 1.0 / 3.0).is_nan());
    }
}
