//! Callback signature strings
//!
//! A signature is written `params->ret`, parameters separated by commas,
//! e.g. `ptr,ptr->int`. An empty parameter list or `void` means no
//! parameters. Type names accept a few aliases; [`CallbackSignature::canonical`]
//! always renders the short form used by the trampoline table.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CallbackError, Result};

/// Native argument or return kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgKind {
    Ptr,
    Int,
    Double,
    Float,
    Str,
    Bool,
    Void,
}

impl ArgKind {
    /// Parse a type name, accepting aliases
    pub fn from_name(name: &str) -> Option<Self> {
        let trimmed = name.trim();
        let trimmed = trimmed.strip_prefix("const ").unwrap_or(trimmed);
        let compact: String = trimmed
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();

        let kind = match compact.as_str() {
            "ptr" | "pointer" | "void*" | "*" => ArgKind::Ptr,
            "int" | "i32" | "int32" | "cint" => ArgKind::Int,
            "double" | "f64" => ArgKind::Double,
            "float" | "f32" => ArgKind::Float,
            "string" | "str" | "cstring" | "char*" => ArgKind::Str,
            "bool" => ArgKind::Bool,
            "void" => ArgKind::Void,
            _ => return None,
        };
        Some(kind)
    }

    /// Short name used in canonical signatures
    pub fn name(self) -> &'static str {
        match self {
            ArgKind::Ptr => "ptr",
            ArgKind::Int => "int",
            ArgKind::Double => "double",
            ArgKind::Float => "float",
            ArgKind::Str => "string",
            ArgKind::Bool => "bool",
            ArgKind::Void => "void",
        }
    }
}

impl fmt::Display for ArgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parsed callback signature
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallbackSignature {
    params: Vec<ArgKind>,
    ret: ArgKind,
}

impl CallbackSignature {
    pub fn new(params: Vec<ArgKind>, ret: ArgKind) -> Self {
        Self { params, ret }
    }

    /// Parse `params->ret`
    ///
    /// Variadic and struct-by-value signatures, string returns and the
    /// `sigaction` handler shape are rejected as unsupported; a malformed
    /// string is an invalid signature.
    pub fn parse(signature: &str) -> Result<Self> {
        let trimmed = signature.trim();
        if trimmed.contains("struct<") {
            return Err(CallbackError::unsupported(signature, "struct-by-value callbacks are not supported"));
        }
        if trimmed.contains("...") {
            return Err(CallbackError::unsupported(signature, "variadic callbacks are not supported"));
        }
        if trimmed == "sigaction" {
            return Err(CallbackError::unsupported(signature, "signal handlers cannot call into the interpreter"));
        }

        let invalid = |reason: &str| CallbackError::InvalidSignature {
            signature: signature.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = trimmed.split("->").collect();
        if parts.len() != 2 {
            return Err(invalid("expected 'params->return'"));
        }

        let ret_text = parts[1].trim();
        if ret_text.is_empty() {
            return Err(invalid("missing return type"));
        }
        let ret = ArgKind::from_name(ret_text).ok_or_else(|| invalid(&format!("unknown type '{}'", ret_text)))?;

        let params_text = parts[0].trim();
        let mut params = Vec::new();
        if !params_text.is_empty() && !params_text.eq_ignore_ascii_case("void") {
            for piece in params_text.split(',') {
                let kind = ArgKind::from_name(piece)
                    .ok_or_else(|| invalid(&format!("unknown type '{}'", piece.trim())))?;
                if kind == ArgKind::Void {
                    return Err(invalid("'void' is only valid as the whole parameter list"));
                }
                params.push(kind);
            }
        }

        let parsed = Self { params, ret };
        if ret == ArgKind::Str {
            return Err(CallbackError::unsupported(signature, "string returns would need caller-owned memory"));
        }
        if parsed.is_signal_handler() {
            return Err(CallbackError::unsupported(signature, "signal handlers cannot call into the interpreter"));
        }
        Ok(parsed)
    }

    pub fn params(&self) -> &[ArgKind] {
        &self.params
    }

    pub fn ret(&self) -> ArgKind {
        self.ret
    }

    /// `void (*)(int, siginfo_t *, void *)`
    fn is_signal_handler(&self) -> bool {
        self.ret == ArgKind::Void && self.params == [ArgKind::Int, ArgKind::Ptr, ArgKind::Ptr]
    }

    /// Short-form rendering, e.g. `ptr,ptr->int` or `void->void`
    pub fn canonical(&self) -> String {
        let params = if self.params.is_empty() {
            "void".to_string()
        } else {
            self.params.iter().map(|k| k.name()).collect::<Vec<_>>().join(",")
        };
        format!("{}->{}", params, self.ret)
    }
}

impl fmt::Display for CallbackSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl FromStr for CallbackSignature {
    type Err = CallbackError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
