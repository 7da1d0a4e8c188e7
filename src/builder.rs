//! This module provides functionality for JIT compilation of lowered expressions.
//! It uses Cranelift as the backend compiler to generate native machine code.
//!
//! The main entry points are:
//! - `build_function()` - Compiles an expression tree into a native `f64 -> f64` function
//! - `build_function_with()` - Same, with explicit [`BuildOptions`]
//! - `get_clif_ir()` - Returns the Cranelift IR text for an expression tree

use std::fmt;
use std::sync::Arc;

use cranelift::prelude::*;
use cranelift_codegen::Context;
use cranelift_jit::{JITBuilder, JITModule};
use cranelift_module::{Linkage, Module};
use isa::TargetIsa;
use tracing::debug;

use crate::{errors::BuilderError, expr::Expr, operators, types::JITFunction};

/// Cranelift optimisation level used when compiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptLevel {
    None,
    #[default]
    Speed,
    SpeedAndSize,
}

impl OptLevel {
    fn as_setting(self) -> &'static str {
        match self {
            OptLevel::None => "none",
            OptLevel::Speed => "speed",
            OptLevel::SpeedAndSize => "speed_and_size",
        }
    }
}

impl fmt::Display for OptLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_setting())
    }
}

/// Code generation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    pub opt_level: OptLevel,
    /// Run the Cranelift IR verifier before emitting code.
    pub verify: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            opt_level: OptLevel::Speed,
            verify: cfg!(debug_assertions),
        }
    }
}

/// Builds a JIT-compiled function from an expression tree with default options.
///
/// # Returns
/// A thread-safe function taking the input value and returning the result.
///
/// # Errors
/// Returns a `BuilderError` if compilation fails for any reason.
pub fn build_function(expr: Expr) -> Result<JITFunction, BuilderError> {
    build_function_with(expr, &BuildOptions::default())
}

/// Builds a JIT-compiled function from an expression tree.
///
/// Every `Var` node in `expr` reads the function's single `f64` parameter.
/// Compiled code stays mapped for the lifetime of the process, so the returned
/// closure may outlive every other value involved in building it.
pub fn build_function_with(expr: Expr, options: &BuildOptions) -> Result<JITFunction, BuilderError> {
    let isa = create_isa(options)?;
    let (mut module, mut ctx) = create_module_and_context(isa);
    build_function_body(&mut ctx, &expr, &mut module)?;
    let raw_fn = compile_and_finalize(&mut module, &mut ctx)?;
    debug!(opt_level = %options.opt_level, verify = options.verify, "finalized JIT function");

    Ok(Arc::new(move |input: f64| raw_fn(input)))
}

/// Returns the Cranelift IR generated for `expr`, without compiling it to machine code.
pub fn get_clif_ir(expr: Expr) -> Result<String, BuilderError> {
    let isa = create_isa(&BuildOptions::default())?;
    let (mut module, mut ctx) = create_module_and_context(isa);
    build_function_body(&mut ctx, &expr, &mut module)?;
    Ok(ctx.func.display().to_string())
}

/// Creates an Instruction Set Architecture (ISA) target for code generation.
///
/// Targets the host machine and configures the compilation flags.
///
/// # Errors
/// Returns a BuilderError if:
/// - The host machine architecture is not supported
/// - A flag is rejected
/// - Code generation configuration fails
pub(crate) fn create_isa(options: &BuildOptions) -> Result<Arc<dyn TargetIsa>, BuilderError> {
    let mut flag_builder = settings::builder();

    // cranelift-jit rejects position-independent code and expects non-colocated libcalls
    set_flag(&mut flag_builder, "use_colocated_libcalls", "false")?;
    set_flag(&mut flag_builder, "is_pic", "false")?;
    set_flag(&mut flag_builder, "opt_level", options.opt_level.as_setting())?;
    set_flag(
        &mut flag_builder,
        "enable_verifier",
        if options.verify { "true" } else { "false" },
    )?;

    let isa_builder = cranelift_native::builder()
        .map_err(|msg| BuilderError::HostMachineNotSupported(msg.to_string()))?;

    isa_builder
        .finish(settings::Flags::new(flag_builder))
        .map_err(BuilderError::CodegenError)
}

fn set_flag(builder: &mut settings::Builder, name: &str, value: &str) -> Result<(), BuilderError> {
    builder
        .set(name, value)
        .map_err(|e| BuilderError::SettingError(format!("{name}={value}: {e}")))
}

/// Creates a new JIT module and function context.
///
/// The module resolves the `pow` import to the host routine, and the context's
/// signature is `fn(f64) -> f64`.
pub(crate) fn create_module_and_context(isa: Arc<dyn TargetIsa>) -> (JITModule, Context) {
    let mut builder = JITBuilder::with_isa(isa, cranelift_module::default_libcall_names());
    builder.symbol(
        operators::pow::POW_SYMBOL,
        operators::pow::pow_f64 as *const u8,
    );

    let module = JITModule::new(builder);
    let mut ctx = module.make_context();

    let mut sig = module.make_signature();
    sig.params.push(AbiParam::new(types::F64));
    sig.returns.push(AbiParam::new(types::F64));
    ctx.func.signature = sig;

    (module, ctx)
}

/// Builds the function body by generating Cranelift IR from the expression tree.
///
/// This function:
/// 1. Creates a new function builder and entry block
/// 2. Binds the `f64` input parameter
/// 3. Generates code from the tree
/// 4. Adds a return instruction
fn build_function_body(
    ctx: &mut Context,
    ast: &Expr,
    module: &mut dyn Module,
) -> Result<(), BuilderError> {
    let mut builder_ctx = FunctionBuilderContext::new();
    let mut func_builder = FunctionBuilder::new(&mut ctx.func, &mut builder_ctx);

    let entry_block = func_builder.create_block();
    func_builder.append_block_params_for_function_params(entry_block);
    func_builder.switch_to_block(entry_block);
    func_builder.seal_block(entry_block);

    let input = func_builder.block_params(entry_block)[0];
    let result = ast.codegen(&mut func_builder, module, input)?;
    func_builder.ins().return_(&[result]);
    func_builder.finalize();

    Ok(())
}

/// Compiles and finalizes the function, returning a callable function pointer.
///
/// # Errors
/// Returns a BuilderError if:
/// - Function declaration fails
/// - Function definition fails
/// - Module finalization fails
fn compile_and_finalize(
    module: &mut JITModule,
    ctx: &mut Context,
) -> Result<extern "C" fn(f64) -> f64, BuilderError> {
    let func_id = module
        .declare_function("polyterm_fn", Linkage::Local, &ctx.func.signature)
        .map_err(|msg| BuilderError::DeclarationError(msg.to_string()))?;

    module
        .define_function(func_id, ctx)
        .map_err(|msg| BuilderError::FunctionError(msg.to_string()))?;

    module.clear_context(ctx);
    module
        .finalize_definitions()
        .map_err(BuilderError::ModuleError)?;

    // SAFETY: the function was compiled with the signature `fn(f64) -> f64` using the
    // host's default calling convention, and `JITModule` never unmaps finalized code
    // unless `free_memory` is called, which this crate never does.
    let func = unsafe {
        std::mem::transmute::<*const u8, extern "C" fn(f64) -> f64>(
            module.get_finalized_function(func_id),
        )
    };
    Ok(func)
}
