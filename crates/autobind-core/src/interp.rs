//! Interfaces consumed from the host interpreter
//!
//! autobind never evaluates expressions, parses declarations or runs
//! interpreted code itself. The host hands in implementations of these
//! traits.

use std::collections::HashMap;

use crate::error::Result;
use crate::registry::Registry;
use crate::types::{CFunctionSignature, Value};

/// Identifies the interpreter call context that registered a callback
pub type CallContextId = u64;

/// Evaluates a source snippet against a set of bindings
pub trait ExpressionEvaluator: Send + Sync {
    /// Evaluate `expr`; identifiers resolve through `bindings`
    fn evaluate(&self, expr: &str, bindings: &HashMap<String, Value>) -> Result<Value>;

    /// Operator used to join adjacent string literals
    fn concat_operator(&self) -> &str {
        "+"
    }
}

/// Turns a `type name(params)` declaration into a typed signature
pub trait DeclarationParser: Send + Sync {
    /// `registry` gives access to the alias's typedefs and structs
    fn parse(&self, declaration: &str, alias: &str, registry: &Registry) -> Result<CFunctionSignature>;
}

/// Looks up and calls interpreted functions
pub trait FunctionInvoker: Send + Sync {
    /// Whether `name` (fully qualified) resolves to a callable function
    fn function_exists(&self, name: &str) -> bool;

    /// Call `name` in `context`, returning every value it produced
    fn invoke(&self, name: &str, context: CallContextId, args: Vec<Value>) -> Result<Vec<Value>>;
}
