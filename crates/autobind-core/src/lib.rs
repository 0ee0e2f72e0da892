//! autobind core
//!
//! Shared types, the per-alias binding registry and the interfaces autobind
//! consumes from the host interpreter.

pub mod config;
pub mod error;
pub mod interp;
pub mod registry;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use interp::{CallContextId, DeclarationParser, ExpressionEvaluator, FunctionInvoker};
pub use registry::{AliasTables, Registry};
pub use types::*;
