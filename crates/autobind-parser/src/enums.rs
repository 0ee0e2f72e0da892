//! Enum extraction
//!
//! Every `enum { ... }` becomes an [`EnumDef`] named `alias::Name`. Members
//! count up from zero, an explicit `= expr` resets the counter, and members
//! whose value cannot be evaluated are dropped without advancing it.

use std::collections::HashMap;

use autobind_core::{EnumDef, ExpressionEvaluator, Registry, Value};

use crate::decl::split_top_level;
use crate::defines::prepare_expression;
use crate::diag::Diagnostics;
use crate::normalize::matching_brace;

/// Parse all enums in `text` and register them for `alias`
///
/// Members of earlier enums may be used in later initializers. Returns the
/// number of enums registered.
pub(crate) fn parse_enums(
    text: &str,
    alias: &str,
    registry: &Registry,
    evaluator: &dyn ExpressionEvaluator,
    diag: &Diagnostics,
) -> usize {
    let head = regex!(r"\benum\b\s*([A-Za-z_]\w*)?\s*\{");
    let mut bindings: HashMap<String, Value> = registry.constants(alias).into_iter().collect();
    let mut count = 0;

    for (index, caps) in head.captures_iter(text).enumerate() {
        let whole = caps.get(0).map_or(0..0, |m| m.range());
        let open = whole.end - 1;
        let Some(close) = matching_brace(&text[open..]).map(|c| open + c) else {
            continue;
        };
        let body = &text[open + 1..close];

        let typedef_name = if text[..whole.start].trim_end().ends_with("typedef") {
            regex!(r"^\s*([A-Za-z_]\w*)\s*;")
                .captures(&text[close + 1..])
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
        } else {
            None
        };
        let name = caps
            .get(1)
            .map(|m| m.as_str().to_string())
            .or(typedef_name)
            .unwrap_or_else(|| format!("anon_enum_{}", index));

        let mut def = EnumDef::new(format!("{}::{}", alias, name), alias);
        let mut next = 0i64;

        for member in split_top_level(body).into_iter().filter(|m| !m.is_empty()) {
            let (member_name, init) = match member.split_once('=') {
                Some((n, e)) => (n.trim(), Some(e.trim())),
                None => (member, None),
            };
            if !is_identifier(member_name) {
                diag.skip(&format!("enum member in {}", name), member);
                continue;
            }

            let value = match init {
                None => next,
                Some(expr) => {
                    let prepared = prepare_expression(expr, evaluator.concat_operator());
                    match evaluator.evaluate(&prepared, &bindings) {
                        Ok(Value::Int(v)) => v,
                        Ok(Value::Float(v)) => v as i64,
                        Ok(Value::Bool(b)) => i64::from(b),
                        Ok(other) => {
                            diag.skip(
                                &format!("enum member {}::{}", name, member_name),
                                &format!("non-numeric value {}", other),
                            );
                            continue;
                        }
                        Err(e) => {
                            diag.skip(&format!("enum member {}::{}", name, member_name), &e.to_string());
                            continue;
                        }
                    }
                }
            };

            def.push(member_name, value);
            bindings.insert(member_name.to_string(), Value::Int(value));
            next = value.wrapping_add(1);
        }

        if def.is_empty() {
            continue;
        }
        diag.trace(|| format!("enum {} with {} members", def.name(), def.len()));
        registry.add_enum(def);
        count += 1;
    }
    count
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    chars
        .next()
        .map_or(false, |c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
