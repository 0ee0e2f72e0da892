//! `#define` collection and constant evaluation
//!
//! Object-like macros are recorded per alias (first definition wins), simple
//! type aliases become typedefs, and everything that looks like a constant
//! expression is evaluated over several passes so macros may refer to macros
//! defined after them.

use std::collections::HashMap;

use autobind_core::config::ParseConfig;
use autobind_core::{ExpressionEvaluator, Registry, Value};

use crate::diag::Diagnostics;

/// Macro values that are really type aliases (`#define uInt unsigned`)
pub const TYPE_ALIAS_TARGETS: &[&str] = &[
    "void", "char", "short", "int", "long", "float", "double", "signed", "unsigned", "size_t",
    "ssize_t", "ptrdiff_t", "wchar_t",
];

/// One object-like `#define` found in a header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Define {
    pub name: String,
    pub value: String,
}

/// Every object-like `#define NAME value` in `text`, in source order
///
/// Function-like macros and empty markers are left out.
pub fn scan_defines(text: &str) -> Vec<Define> {
    let pattern = regex!(r"(?m)^[ \t]*#[ \t]*define[ \t]+([A-Za-z_][A-Za-z0-9_]*)[ \t]+(.+)$");
    pattern
        .captures_iter(text)
        .filter_map(|caps| {
            let value = caps[2].trim();
            if value.is_empty() || is_parameter_list(value) {
                return None;
            }
            Some(Define {
                name: caps[1].to_string(),
                value: value.to_string(),
            })
        })
        .collect()
}

/// `(a, b) body` written with a space before the parameter list
fn is_parameter_list(value: &str) -> bool {
    if !value.starts_with('(') {
        return false;
    }
    match value.find(')') {
        Some(close) if close + 1 < value.len() => value[1..close]
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ' ' || c == ','),
        _ => false,
    }
}

/// Record the defines of one header into the registry
///
/// Returns how many new macros were recorded.
pub fn collect_defines(text: &str, alias: &str, registry: &Registry) -> usize {
    let mut recorded = 0;
    for define in scan_defines(text) {
        if TYPE_ALIAS_TARGETS.contains(&define.value.as_str()) {
            registry.set_typedef(alias, define.name, define.value);
            continue;
        }
        if registry.record_macro(alias, define.name, define.value) {
            recorded += 1;
        }
    }
    recorded
}

/// Reason a macro value is not treated as a constant expression
pub fn rejection_reason(value: &str) -> Option<&'static str> {
    let code = regex!(r#""(?:[^"\\]|\\.)*""#).replace_all(value, "\"\"");
    if code.contains('{') {
        return Some("initializer");
    }
    if code.contains("__") {
        return Some("compiler internal");
    }
    if code.contains('?') {
        return Some("conditional expression");
    }
    if regex!(r"\b(sizeof|typedef|extern|struct|union|enum|void|char|short|int|long|float|double|signed|unsigned|const|volatile)\b")
        .is_match(&code)
    {
        return Some("type expression");
    }
    if regex!(r"\b[A-Za-z_][A-Za-z0-9_]*\s*\(").is_match(&code) {
        return Some("function call");
    }
    None
}

/// Rewrite a C constant into something an evaluator can read
///
/// Integer and float suffixes are dropped and adjacent string literals are
/// joined with the evaluator's concatenation operator.
pub fn prepare_expression(value: &str, concat_operator: &str) -> String {
    let float_suffix = regex!(r"(\d+\.\d*(?:[eE][+-]?\d+)?|\.\d+(?:[eE][+-]?\d+)?|\d+[eE][+-]?\d+)[fFlL]\b");
    let int_suffix = regex!(r"\b(0[xX][0-9A-Fa-f]+|\d+)(?:[uU][lL]{0,2}|[lL]{1,2}[uU]?)\b");

    let text = float_suffix.replace_all(value.trim(), "$1");
    let mut text = int_suffix.replace_all(&text, "$1").into_owned();

    let adjacent = regex!(r#""([^"]*)"[ \t]+""#);
    let replacement = format!("\"$1\" {} \"", concat_operator);
    loop {
        let next = adjacent.replace_all(&text, replacement.as_str()).into_owned();
        if next == text {
            break;
        }
        text = next;
    }
    text
}

/// Evaluate every recorded macro of `alias` into the constants table
///
/// Each pass tries all macros not yet evaluated with the constants known so
/// far. Stops after `max_define_passes` passes or when a pass makes no
/// progress. Returns how many constants were produced.
pub(crate) fn evaluate_defines(
    alias: &str,
    registry: &Registry,
    evaluator: &dyn ExpressionEvaluator,
    config: &ParseConfig,
    diag: &Diagnostics,
) -> usize {
    // declaration order, so a chain resolves in one pass when written top-down
    let mut pending: Vec<(String, String)> = Vec::new();
    for (name, value) in registry.macros_in_order(alias) {
        if registry.constant(alias, &name).is_some() {
            continue;
        }
        match rejection_reason(&value) {
            Some(reason) => diag.trace(|| format!("macro {} not a constant ({})", name, reason)),
            None => {
                let expr = prepare_expression(&value, evaluator.concat_operator());
                pending.push((name, expr));
            }
        }
    }

    let mut bindings: HashMap<String, Value> = registry.constants(alias).into_iter().collect();
    let mut evaluated = 0;
    let mut failures: HashMap<String, String> = HashMap::new();

    for pass in 0..config.max_define_passes {
        let before = evaluated;
        pending.retain(|(name, expr)| match evaluator.evaluate(expr, &bindings) {
            Ok(value) => {
                diag.trace(|| format!("constant {} = {}", name, value));
                registry.set_constant(alias, name.clone(), value.clone());
                bindings.insert(name.clone(), value);
                failures.remove(name);
                evaluated += 1;
                false
            }
            Err(e) => {
                failures.insert(name.clone(), e.to_string());
                true
            }
        });
        diag.trace(|| format!("define pass {}: {} evaluated", pass + 1, evaluated - before));
        if evaluated == before || pending.is_empty() {
            break;
        }
    }

    for (name, _) in &pending {
        let reason = failures.get(name).map(String::as_str).unwrap_or("not evaluated");
        diag.skip(&format!("macro {}", name), reason);
    }
    evaluated
}

/// Remove every `#define` line once its content has been collected
pub fn drop_define_lines(text: &str) -> String {
    text.split('\n')
        .filter(|line| {
            let trimmed = line.trim_start();
            !(trimmed.starts_with('#') && trimmed[1..].trim_start().starts_with("define"))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::CExprEvaluator;
    use pretty_assertions::assert_eq;

    fn run(text: &str) -> Registry {
        let registry = Registry::new();
        collect_defines(text, "m", &registry);
        let config = ParseConfig::default();
        let diag = Diagnostics::new(&config);
        evaluate_defines("m", &registry, &CExprEvaluator, &config, &diag);
        registry
    }

    #[test]
    fn test_scan_skips_function_like() {
        let defines = scan_defines("#define A 1\n#define F(x) (x)\n#define G (a, b) a\n#define MARK\n");
        let names: Vec<&str> = defines.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["A"]);
    }

    #[test]
    fn test_forward_references_resolve() {
        let registry = run("#define DERIVED (BASE * 2)\n#define BASE 10\n");
        assert_eq!(registry.constant("m", "BASE"), Some(Value::Int(10)));
        assert_eq!(registry.constant("m", "DERIVED"), Some(Value::Int(20)));
    }

    #[test]
    fn test_chain_evaluates_in_declaration_order() {
        let mut text = String::from("#define M 1\n");
        let names: Vec<char> = ('A'..='M').rev().collect();
        for pair in names.windows(2) {
            text.push_str(&format!("#define {} ({} + 1)\n", pair[1], pair[0]));
        }
        let registry = Registry::new();
        collect_defines(&text, "m", &registry);
        let config = ParseConfig {
            max_define_passes: 1,
            ..ParseConfig::default()
        };
        let diag = Diagnostics::new(&config);

        assert_eq!(evaluate_defines("m", &registry, &CExprEvaluator, &config, &diag), 13);
        assert_eq!(registry.constant("m", "A"), Some(Value::Int(13)));
        assert_eq!(registry.constant("m", "L"), Some(Value::Int(2)));
    }

    #[test]
    fn test_first_definition_wins() {
        let registry = run("#define LEVEL 1\n#define LEVEL 2\n");
        assert_eq!(registry.constant("m", "LEVEL"), Some(Value::Int(1)));
    }

    #[test]
    fn test_type_alias_becomes_typedef() {
        let registry = run("#define uInt unsigned\n");
        assert_eq!(registry.typedef("m", "uInt").as_deref(), Some("unsigned"));
        assert_eq!(registry.constant("m", "uInt"), None);
    }

    #[test]
    fn test_suffixes_and_strings() {
        let registry = run("#define MAX 0xFFUL\n#define SCALE 2.5f\n#define VERSION \"1.\" \"2\"\n");
        assert_eq!(registry.constant("m", "MAX"), Some(Value::Int(255)));
        assert_eq!(registry.constant("m", "SCALE"), Some(Value::Float(2.5)));
        assert_eq!(registry.constant("m", "VERSION"), Some(Value::Str("1.2".into())));
    }

    #[test]
    fn test_rejected_values() {
        assert_eq!(rejection_reason("{ 0, 0 }"), Some("initializer"));
        assert_eq!(rejection_reason("foo(1)"), Some("function call"));
        assert_eq!(rejection_reason("(size_t)-1"), None);
        assert_eq!(rejection_reason("(unsigned int)-1"), Some("type expression"));
        assert_eq!(rejection_reason("a ? b : c"), Some("conditional expression"));
        assert_eq!(rejection_reason("\"(c) 2024\""), None);
        assert_eq!(rejection_reason("~0"), None);
    }

    #[test]
    fn test_unresolvable_macro_is_skipped() {
        let registry = run("#define A MISSING\n#define B 3\n");
        assert_eq!(registry.constant("m", "A"), None);
        assert_eq!(registry.constant("m", "B"), Some(Value::Int(3)));
    }

    #[test]
    fn test_prepare_expression() {
        assert_eq!(prepare_expression("1UL << 4", "+"), "1 << 4");
        assert_eq!(prepare_expression("\"a\" \"b\" \"c\"", ".."), "\"a\" .. \"b\" .. \"c\"");
        assert_eq!(prepare_expression("1.0e3L", "+"), "1.0e3");
    }

    #[test]
    fn test_drop_define_lines() {
        assert_eq!(drop_define_lines("#define A 1\nint f(void);\n  # define B 2"), "int f(void);");
    }
}
