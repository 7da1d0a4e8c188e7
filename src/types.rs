use std::sync::Arc;

/// Type alias for a JIT-compiled single-input function.
///
/// This represents a function that:
/// - Takes the value every symbol of the compiled expression reads
/// - Returns a single f64 result
/// - Is both Send and Sync for thread safety
pub type JITFunction = Arc<dyn Fn(f64) -> f64 + Send + Sync>;
