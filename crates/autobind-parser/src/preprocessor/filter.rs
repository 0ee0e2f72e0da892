//! Conditional compilation
//!
//! Tracks `#if`/`#ifdef`/`#ifndef`/`#elif`/`#else`/`#endif` nesting and the set
//! of defined macros, and drops every line that sits in an inactive branch.

use std::collections::{HashMap, HashSet};

use autobind_core::{ExpressionEvaluator, Value};
use tracing::{debug, warn};

use super::platform::Platform;
use crate::defines::prepare_expression;

/// Nesting limit when a macro value refers to other macros
const MAX_MACRO_DEPTH: usize = 16;

#[derive(Debug, Clone, Copy)]
struct Frame {
    /// This branch is selected
    active: bool,
    /// Some branch of this conditional has already been selected
    taken: bool,
}

/// Defined macros plus the conditional stack
///
/// The bottom frame is always present and always active, so the state is
/// active exactly when every frame is.
#[derive(Debug, Clone)]
pub struct PreprocessorState {
    macros: HashMap<String, String>,
    stack: Vec<Frame>,
}

impl Default for PreprocessorState {
    fn default() -> Self {
        Self::new()
    }
}

impl PreprocessorState {
    /// Empty state with no macros defined
    pub fn new() -> Self {
        Self {
            macros: HashMap::new(),
            stack: vec![Frame {
                active: true,
                taken: true,
            }],
        }
    }

    /// State seeded with the platform's predefined macros
    pub fn for_platform(platform: &Platform) -> Self {
        let mut state = Self::new();
        for def in platform.predefined_macros() {
            state.define(&def.name, &def.value);
        }
        state
    }

    pub fn define(&mut self, name: &str, value: &str) {
        self.macros.insert(name.to_string(), value.to_string());
    }

    pub fn undefine(&mut self, name: &str) {
        self.macros.remove(name);
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    pub fn macro_value(&self, name: &str) -> Option<&str> {
        self.macros.get(name).map(String::as_str)
    }

    /// Number of open conditionals
    pub fn depth(&self) -> usize {
        self.stack.len() - 1
    }

    /// Whether lines at the current position are kept
    pub fn is_active(&self) -> bool {
        self.stack.iter().all(|f| f.active)
    }

    /// Filter one header, returning only the lines in active branches
    ///
    /// Conditional directives and `#undef` are consumed. `#define` lines in
    /// active branches update the macro set and are passed through, as are
    /// other directives. Conditionals left open at the end of `text` are
    /// closed.
    pub fn filter(&mut self, text: &str, evaluator: &dyn ExpressionEvaluator) -> String {
        let mut out = Vec::new();

        for line in text.split('\n') {
            let Some((keyword, rest)) = split_directive(line) else {
                if self.is_active() {
                    out.push(line);
                }
                continue;
            };

            match keyword {
                "ifdef" | "ifndef" => {
                    let name = first_word(rest);
                    let cond = self.is_defined(name) == (keyword == "ifdef");
                    self.push(cond);
                }
                "if" => {
                    let cond = self.is_active() && self.condition(rest, evaluator);
                    self.push(cond);
                }
                "elif" => self.elif(rest, evaluator),
                "else" => {
                    if self.stack.len() > 1 {
                        if let Some(top) = self.stack.last_mut() {
                            top.active = !top.taken;
                            top.taken = true;
                        }
                    } else {
                        debug!("#else without #if");
                    }
                }
                "endif" => {
                    if self.stack.len() > 1 {
                        self.stack.pop();
                    } else {
                        debug!("#endif without #if");
                    }
                }
                "define" if self.is_active() => {
                    self.record_define(rest);
                    out.push(line);
                }
                "undef" if self.is_active() => self.undefine(first_word(rest)),
                _ if self.is_active() => out.push(line),
                _ => {}
            }
        }

        if self.depth() > 0 {
            warn!("{} unterminated conditional(s) at end of header", self.depth());
            self.stack.truncate(1);
        }
        out.join("\n")
    }

    fn push(&mut self, cond: bool) {
        let parent_active = self.is_active();
        self.stack.push(Frame {
            active: parent_active && cond,
            // an inactive parent means no branch here can ever be selected
            taken: !parent_active || cond,
        });
    }

    fn elif(&mut self, expr: &str, evaluator: &dyn ExpressionEvaluator) {
        if self.stack.len() < 2 {
            debug!("#elif without #if");
            return;
        }
        let taken = self.stack[self.stack.len() - 1].taken;
        let cond = !taken && self.condition(expr, evaluator);
        if let Some(top) = self.stack.last_mut() {
            top.active = cond;
            top.taken = taken || cond;
        }
    }

    fn record_define(&mut self, rest: &str) {
        let name_end = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        let name = &rest[..name_end];
        if name.is_empty() {
            return;
        }
        let after = &rest[name_end..];
        // function-like macros only count as defined
        let value = if after.starts_with('(') { "" } else { after.trim() };
        self.define(name, value);
    }

    /// Evaluate an `#if` expression; anything unevaluable is false
    fn condition(&self, expr: &str, evaluator: &dyn ExpressionEvaluator) -> bool {
        let expanded = regex!(r"\bdefined\s*\(\s*([A-Za-z_][A-Za-z0-9_]*)\s*\)|\bdefined\s+([A-Za-z_][A-Za-z0-9_]*)")
            .replace_all(expr, |caps: &regex::Captures| {
                let name = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
                if self.is_defined(name) { "1" } else { "0" }
            });
        let prepared = prepare_expression(&expanded, evaluator.concat_operator());

        let mut bindings = HashMap::new();
        for name in identifiers(&prepared) {
            let mut seen = HashSet::new();
            let value = self.macro_binding(name, evaluator, &mut seen, 0);
            bindings.insert(name.to_string(), value);
        }

        match evaluator.evaluate(&prepared, &bindings) {
            Ok(value) => value.is_truthy(),
            Err(e) => {
                debug!("#if {} treated as false: {}", expr.trim(), e);
                false
            }
        }
    }

    /// Value of `name` inside an `#if`; undefined and empty macros are 0
    fn macro_binding<'a>(
        &'a self,
        name: &'a str,
        evaluator: &dyn ExpressionEvaluator,
        seen: &mut HashSet<&'a str>,
        depth: usize,
    ) -> Value {
        let Some(raw) = self.macros.get(name) else {
            return Value::Int(0);
        };
        if raw.is_empty() || depth > MAX_MACRO_DEPTH || !seen.insert(name) {
            return Value::Int(0);
        }
        let prepared = prepare_expression(raw, evaluator.concat_operator());
        let mut bindings = HashMap::new();
        for inner in identifiers(raw) {
            let value = self.macro_binding(inner, evaluator, seen, depth + 1);
            bindings.insert(inner.to_string(), value);
        }
        evaluator.evaluate(&prepared, &bindings).unwrap_or(Value::Int(0))
    }
}

/// `("ifdef", "FOO")` for `#  ifdef FOO`
fn split_directive(line: &str) -> Option<(&str, &str)> {
    let body = line.trim_start().strip_prefix('#')?.trim_start();
    let end = body
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(body.len());
    Some((&body[..end], body[end..].trim()))
}

fn first_word(text: &str) -> &str {
    text.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .next()
        .unwrap_or("")
}

/// Identifiers outside string and character literals
fn identifiers(expr: &str) -> Vec<&str> {
    let mut found = Vec::new();
    let bytes = expr.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'"' || b == b'\'' {
            i += 1;
            while i < bytes.len() && bytes[i] != b {
                if bytes[i] == b'\\' {
                    i += 1;
                }
                i += 1;
            }
            i += 1;
        } else if b.is_ascii_alphabetic() || b == b'_' {
            let start = i;
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            found.push(&expr[start..i]);
        } else if b.is_ascii_digit() {
            // skip number literals with their suffixes
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'.') {
                i += 1;
            }
        } else {
            i += 1;
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::CExprEvaluator;
    use crate::preprocessor::{Architecture, TargetOs};
    use pretty_assertions::assert_eq;

    fn filter(state: &mut PreprocessorState, text: &str) -> String {
        state.filter(text, &CExprEvaluator)
    }

    #[test]
    fn test_ifdef_else() {
        let mut state = PreprocessorState::new();
        state.define("FEATURE", "1");
        let text = "#ifdef FEATURE\nint a;\n#else\nint b;\n#endif\nint c;";
        assert_eq!(filter(&mut state, text), "int a;\nint c;");
        assert_eq!(state.depth(), 0);
    }

    #[test]
    fn test_ifndef_guard() {
        let mut state = PreprocessorState::new();
        let text = "#ifndef GUARD_H\n#define GUARD_H\nint x;\n#endif";
        assert_eq!(filter(&mut state, text), "#define GUARD_H\nint x;");
        assert!(state.is_defined("GUARD_H"));
        assert_eq!(filter(&mut state, text), "");
    }

    #[test]
    fn test_nested_inactive_parent() {
        let mut state = PreprocessorState::new();
        state.define("A", "1");
        let text = "#if 0\n#ifdef A\nint x;\n#else\nint y;\n#endif\n#endif\nint z;";
        assert_eq!(filter(&mut state, text), "int z;");
    }

    #[test]
    fn test_if_expression_and_elif() {
        let mut state = PreprocessorState::new();
        state.define("VERSION", "3");
        let text = "#if VERSION > 4\nint a;\n#elif VERSION == 3 && !defined(LEGACY)\nint b;\n#elif 1\nint c;\n#else\nint d;\n#endif";
        assert_eq!(filter(&mut state, text), "int b;");
    }

    #[test]
    fn test_defined_without_parens_and_undef() {
        let mut state = PreprocessorState::new();
        let text = "#define X\n#if defined X\nint a;\n#endif\n#undef X\n#if defined(X)\nint b;\n#endif";
        assert_eq!(filter(&mut state, text), "#define X\nint a;");
        assert!(!state.is_defined("X"));
    }

    #[test]
    fn test_unevaluable_condition_is_false() {
        let mut state = PreprocessorState::new();
        let text = "#if __GNUC_PREREQ(4, 8)\nint a;\n#else\nint b;\n#endif";
        assert_eq!(filter(&mut state, text), "int b;");
    }

    #[test]
    fn test_macro_values_chain() {
        let mut state = PreprocessorState::new();
        state.define("BASE", "0x10UL");
        state.define("LIMIT", "(BASE * 2)");
        let text = "#if LIMIT == 32\nint ok;\n#endif";
        assert_eq!(filter(&mut state, text), "int ok;");
    }

    #[test]
    fn test_platform_seeding() {
        let platform = Platform {
            os: TargetOs::Linux,
            arch: Architecture::X86_64,
        };
        let mut state = PreprocessorState::for_platform(&platform);
        let text = "#if defined(__linux__) && __GNUC__ >= 4\nint linux;\n#endif\n#ifdef __cplusplus\nextern \"C\" {\n#endif";
        assert_eq!(filter(&mut state, text), "int linux;");
    }

    #[test]
    fn test_unterminated_conditional_is_closed() {
        let mut state = PreprocessorState::new();
        filter(&mut state, "#ifdef MISSING\nint a;");
        assert_eq!(state.depth(), 0);
        assert!(state.is_active());
        assert_eq!(filter(&mut state, "int b;"), "int b;");
    }
}
