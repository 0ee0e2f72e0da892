//! autobind header parser
//!
//! Turns C headers into constants, typedefs, enums, structs and function
//! signatures for one module alias. Parsing favours partial results: anything
//! that cannot be understood is skipped and the rest of the header is kept.

/// Compile a literal pattern once and reuse it
macro_rules! regex {
    ($pattern:expr) => {{
        static RE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
        RE.get_or_init(|| regex::Regex::new($pattern).unwrap())
    }};
}

pub mod decl;
pub mod defines;
mod diag;
pub mod enums;
pub mod eval;
pub mod functions;
pub mod headers;
pub mod normalize;
pub mod pipeline;
pub mod preprocessor;
pub mod structs;
pub mod typedefs;

pub use decl::CDeclParser;
pub use eval::CExprEvaluator;
pub use headers::HeaderDiscovery;
pub use pipeline::{LoadReport, LoadSource, ModuleLoader};
pub use preprocessor::{Architecture, MacroDefinition, Platform, PreprocessorState};
