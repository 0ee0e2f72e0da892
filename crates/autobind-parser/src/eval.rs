//! C constant-expression evaluator
//!
//! Reference implementation of [`ExpressionEvaluator`] for hosts that do not
//! bring their own: integer and floating arithmetic, bitwise, shift,
//! comparison and logical operators with C precedence, string concatenation
//! through `+`, and identifier lookup in the supplied bindings.

use std::collections::HashMap;

use autobind_core::{Error, ExpressionEvaluator, Result, Value};

/// Operator groups from lowest to highest precedence
const LEVELS: &[&[&str]] = &[
    &["||"],
    &["&&"],
    &["|"],
    &["^"],
    &["&"],
    &["==", "!="],
    &["<=", ">=", "<", ">"],
    &["<<", ">>"],
    &["+", "-"],
    &["*", "/", "%"],
];

/// Expression evaluator for C constant expressions
#[derive(Debug, Clone, Copy, Default)]
pub struct CExprEvaluator;

impl CExprEvaluator {
    pub fn new() -> Self {
        Self
    }
}

impl ExpressionEvaluator for CExprEvaluator {
    fn evaluate(&self, expr: &str, bindings: &HashMap<String, Value>) -> Result<Value> {
        Eval { bindings }
            .eval_expr(expr)
            .map_err(|msg| Error::Evaluation(format!("{}: {}", expr.trim(), msg)))
    }
}

type EvalResult = std::result::Result<Value, String>;

struct Eval<'a> {
    bindings: &'a HashMap<String, Value>,
}

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn of(value: &Value) -> std::result::Result<Num, String> {
        match value {
            Value::Int(v) => Ok(Num::Int(*v)),
            Value::Float(v) => Ok(Num::Float(*v)),
            Value::Bool(b) => Ok(Num::Int(i64::from(*b))),
            Value::Pointer(p) => Ok(Num::Int(*p as i64)),
            other => Err(format!("expected a number, found {}", other.type_name())),
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Num::Int(v) => v as f64,
            Num::Float(v) => v,
        }
    }
}

fn as_int(value: &Value) -> std::result::Result<i64, String> {
    match Num::of(value)? {
        Num::Int(v) => Ok(v),
        Num::Float(_) => Err("integer operator applied to a float".to_string()),
    }
}

fn bool_value(b: bool) -> Value {
    Value::Int(i64::from(b))
}

impl Eval<'_> {
    fn eval_expr(&self, expr: &str) -> EvalResult {
        let expr = expr.trim();
        if expr.is_empty() {
            return Err("empty expression".to_string());
        }

        let mask = top_level_mask(expr)?;

        if wraps_whole(expr) {
            return self.eval_expr(&expr[1..expr.len() - 1]);
        }

        for ops in LEVELS {
            if let Some((pos, op)) = find_operator(expr, &mask, ops) {
                let left = &expr[..pos];
                let right = &expr[pos + op.len()..];
                return self.eval_binary(op, left, right);
            }
        }

        if let Some(rest) = expr.strip_prefix('!') {
            return Ok(bool_value(!self.eval_expr(rest)?.is_truthy()));
        }
        if let Some(rest) = expr.strip_prefix('~') {
            return Ok(Value::Int(!as_int(&self.eval_expr(rest)?)?));
        }
        if let Some(rest) = expr.strip_prefix('-') {
            return match Num::of(&self.eval_expr(rest)?)? {
                Num::Int(v) => Ok(Value::Int(v.wrapping_neg())),
                Num::Float(v) => Ok(Value::Float(-v)),
            };
        }
        if let Some(rest) = expr.strip_prefix('+') {
            let value = self.eval_expr(rest)?;
            Num::of(&value)?;
            return Ok(value);
        }

        self.eval_atom(expr)
    }

    fn eval_binary(&self, op: &str, left: &str, right: &str) -> EvalResult {
        // Logical operators short-circuit so the skipped side may be unknown
        match op {
            "||" => {
                if self.eval_expr(left)?.is_truthy() {
                    return Ok(bool_value(true));
                }
                return Ok(bool_value(self.eval_expr(right)?.is_truthy()));
            }
            "&&" => {
                if !self.eval_expr(left)?.is_truthy() {
                    return Ok(bool_value(false));
                }
                return Ok(bool_value(self.eval_expr(right)?.is_truthy()));
            }
            _ => {}
        }

        let a = self.eval_expr(left)?;
        let b = self.eval_expr(right)?;

        match op {
            "+" => {
                if let (Value::Str(x), Value::Str(y)) = (&a, &b) {
                    return Ok(Value::Str(format!("{}{}", x, y)));
                }
                arith(&a, &b, i64::wrapping_add, |x, y| x + y)
            }
            "-" => arith(&a, &b, i64::wrapping_sub, |x, y| x - y),
            "*" => arith(&a, &b, i64::wrapping_mul, |x, y| x * y),
            "/" => match (Num::of(&a)?, Num::of(&b)?) {
                (Num::Int(_), Num::Int(0)) => Err("division by zero".to_string()),
                (Num::Int(x), Num::Int(y)) => Ok(Value::Int(x.wrapping_div(y))),
                (x, y) => Ok(Value::Float(x.as_f64() / y.as_f64())),
            },
            "%" => {
                let (x, y) = (as_int(&a)?, as_int(&b)?);
                if y == 0 {
                    return Err("division by zero".to_string());
                }
                Ok(Value::Int(x.wrapping_rem(y)))
            }
            "<<" | ">>" => {
                let (x, y) = (as_int(&a)?, as_int(&b)?);
                if !(0..64).contains(&y) {
                    return Err(format!("shift count {} out of range", y));
                }
                let shifted = if op == "<<" { x.wrapping_shl(y as u32) } else { x >> y };
                Ok(Value::Int(shifted))
            }
            "&" => Ok(Value::Int(as_int(&a)? & as_int(&b)?)),
            "^" => Ok(Value::Int(as_int(&a)? ^ as_int(&b)?)),
            "|" => Ok(Value::Int(as_int(&a)? | as_int(&b)?)),
            "==" | "!=" => {
                let equal = match (&a, &b) {
                    (Value::Str(x), Value::Str(y)) => x == y,
                    _ => compare(&a, &b)? == std::cmp::Ordering::Equal,
                };
                Ok(bool_value(if op == "==" { equal } else { !equal }))
            }
            "<" | ">" | "<=" | ">=" => {
                let ord = compare(&a, &b)?;
                let result = match op {
                    "<" => ord.is_lt(),
                    ">" => ord.is_gt(),
                    "<=" => ord.is_le(),
                    _ => ord.is_ge(),
                };
                Ok(bool_value(result))
            }
            _ => Err(format!("unsupported operator '{}'", op)),
        }
    }

    fn eval_atom(&self, expr: &str) -> EvalResult {
        match expr {
            "NULL" | "nullptr" => return Ok(Value::Pointer(0)),
            "true" => return Ok(Value::Bool(true)),
            "false" => return Ok(Value::Bool(false)),
            _ => {}
        }

        if expr.starts_with('"') {
            return parse_string_literal(expr).ok_or_else(|| format!("malformed string literal {}", expr));
        }
        if expr.starts_with('\'') {
            return parse_char_literal(expr).ok_or_else(|| format!("malformed character literal {}", expr));
        }
        if expr.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
            return parse_number(expr).ok_or_else(|| format!("malformed number {}", expr));
        }
        if is_identifier(expr) {
            return self
                .bindings
                .get(expr)
                .cloned()
                .ok_or_else(|| format!("unknown identifier '{}'", expr));
        }
        Err(format!("cannot evaluate '{}'", expr))
    }
}

fn arith(
    a: &Value,
    b: &Value,
    int_op: fn(i64, i64) -> i64,
    float_op: fn(f64, f64) -> f64,
) -> EvalResult {
    match (Num::of(a)?, Num::of(b)?) {
        (Num::Int(x), Num::Int(y)) => Ok(Value::Int(int_op(x, y))),
        (x, y) => Ok(Value::Float(float_op(x.as_f64(), y.as_f64()))),
    }
}

fn compare(a: &Value, b: &Value) -> std::result::Result<std::cmp::Ordering, String> {
    match (Num::of(a)?, Num::of(b)?) {
        (Num::Int(x), Num::Int(y)) => Ok(x.cmp(&y)),
        (x, y) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .ok_or_else(|| "comparison with NaN".to_string()),
    }
}

/// `true` for every byte outside parentheses and literals
fn top_level_mask(expr: &str) -> std::result::Result<Vec<bool>, String> {
    let bytes = expr.as_bytes();
    let mut mask = vec![false; bytes.len()];
    let mut depth = 0i32;
    let mut quote: Option<u8> = None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match b {
            b'"' | b'\'' => quote = Some(b),
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth < 0 {
                    return Err("unbalanced parentheses".to_string());
                }
            }
            _ => mask[i] = depth == 0,
        }
        i += 1;
    }

    if depth != 0 {
        return Err("unbalanced parentheses".to_string());
    }
    if quote.is_some() {
        return Err("unterminated literal".to_string());
    }
    Ok(mask)
}

/// Whether the first `(` closes at the last byte
fn wraps_whole(expr: &str) -> bool {
    if !expr.starts_with('(') || !expr.ends_with(')') {
        return false;
    }
    let bytes = expr.as_bytes();
    let mut depth = 0i32;
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == q {
                quote = None;
            }
        } else {
            match b {
                b'"' | b'\'' => quote = Some(b),
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return i == bytes.len() - 1;
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }
    false
}

/// Rightmost top-level binary operator from `ops`, for left associativity
fn find_operator(expr: &str, mask: &[bool], ops: &[&'static str]) -> Option<(usize, &'static str)> {
    let bytes = expr.as_bytes();
    for i in (0..bytes.len()).rev() {
        if !mask[i] {
            continue;
        }
        for op in ops {
            if bytes[i..].starts_with(op.as_bytes()) && is_binary_at(expr, i, op) {
                return Some((i, op));
            }
        }
    }
    None
}

fn is_binary_at(expr: &str, i: usize, op: &str) -> bool {
    let bytes = expr.as_bytes();
    let prev = if i > 0 { bytes[i - 1] } else { 0 };
    let next = bytes.get(i + op.len()).copied().unwrap_or(0);

    let left = expr[..i].trim_end();
    let right = expr[i + op.len()..].trim_start();
    if left.is_empty() || right.is_empty() {
        return false;
    }

    match op {
        "|" => prev != b'|' && next != b'|' && next != b'=',
        "&" => prev != b'&' && next != b'&' && next != b'=',
        "^" => next != b'=',
        "<" => prev != b'<' && next != b'<' && next != b'=',
        ">" => prev != b'>' && prev != b'-' && next != b'>' && next != b'=',
        "<<" => prev != b'<' && next != b'<' && next != b'=',
        ">>" => prev != b'>' && next != b'>' && next != b'=',
        "<=" => prev != b'<',
        ">=" => prev != b'>',
        "==" => !matches!(prev, b'=' | b'!' | b'<' | b'>') && next != b'=',
        "+" | "-" => {
            let before = left.as_bytes()[left.len() - 1];
            if b"+-*/%<>=!&|^~(".contains(&before) {
                return false;
            }
            !is_exponent_sign(left)
        }
        _ => true,
    }
}

/// `left` ends inside a decimal float literal such as `1e`
fn is_exponent_sign(left: &str) -> bool {
    if !left.ends_with(['e', 'E']) {
        return false;
    }
    let token_start = left
        .rfind(|c: char| !(c.is_ascii_alphanumeric() || c == '.' || c == '_'))
        .map_or(0, |p| p + 1);
    let token = &left[token_start..];
    token.starts_with(|c: char| c.is_ascii_digit() || c == '.')
        && !token.starts_with("0x")
        && !token.starts_with("0X")
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    chars
        .next()
        .map_or(false, |c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Parse a C number literal, ignoring `u`/`l`/`f` suffixes
pub(crate) fn parse_number(text: &str) -> Option<Value> {
    let lower = text.to_ascii_lowercase();

    if let Some(hex) = lower.strip_prefix("0x") {
        let digits = hex.trim_end_matches(['u', 'l']);
        return u64::from_str_radix(digits, 16).ok().map(|v| Value::Int(v as i64));
    }
    if let Some(bin) = lower.strip_prefix("0b") {
        let digits = bin.trim_end_matches(['u', 'l']);
        return u64::from_str_radix(digits, 2).ok().map(|v| Value::Int(v as i64));
    }
    if lower.contains('.') || lower.contains('e') {
        let digits = lower.trim_end_matches(['f', 'l']);
        return digits.parse::<f64>().ok().map(Value::Float);
    }

    let digits = lower.trim_end_matches(['u', 'l']);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return u64::from_str_radix(&digits[1..], 8).ok().map(|v| Value::Int(v as i64));
    }
    digits
        .parse::<i64>()
        .ok()
        .or_else(|| digits.parse::<u64>().ok().map(|v| v as i64))
        .map(Value::Int)
}

fn unescape(c: char) -> Option<char> {
    Some(match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        '0' => '\0',
        'a' => '\x07',
        'b' => '\x08',
        'f' => '\x0c',
        'v' => '\x0b',
        '\\' => '\\',
        '\'' => '\'',
        '"' => '"',
        '?' => '?',
        _ => return None,
    })
}

fn parse_string_literal(text: &str) -> Option<Value> {
    let inner = text.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push(unescape(chars.next()?)?),
            '"' => return None,
            _ => out.push(c),
        }
    }
    Some(Value::Str(out))
}

fn parse_char_literal(text: &str) -> Option<Value> {
    let inner = text.strip_prefix('\'')?.strip_suffix('\'')?;
    let mut chars = inner.chars();
    let c = match chars.next()? {
        '\\' => {
            let rest: String = chars.collect();
            if let Some(hex) = rest.strip_prefix('x') {
                return u8::from_str_radix(hex, 16).ok().map(|b| Value::Int(i64::from(b)));
            }
            if rest.len() > 1 && rest.bytes().all(|b| (b'0'..=b'7').contains(&b)) {
                return u8::from_str_radix(&rest, 8).ok().map(|b| Value::Int(i64::from(b)));
            }
            let mut rest = rest.chars();
            let escaped = unescape(rest.next()?)?;
            if rest.next().is_some() {
                return None;
            }
            escaped
        }
        c => {
            if chars.next().is_some() {
                return None;
            }
            c
        }
    };
    Some(Value::Int(c as i64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(expr: &str) -> Value {
        CExprEvaluator.evaluate(expr, &HashMap::new()).unwrap()
    }

    fn eval_with(expr: &str, bindings: &[(&str, Value)]) -> Result<Value> {
        let map = bindings
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        CExprEvaluator.evaluate(expr, &map)
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval("1 + 2"), Value::Int(3));
        assert_eq!(eval("10 - 3 - 2"), Value::Int(5));
        assert_eq!(eval("8 * 2 / 4"), Value::Int(4));
        assert_eq!(eval("17 % 5"), Value::Int(2));
        assert_eq!(eval("2 + 3 * 4"), Value::Int(14));
        assert_eq!(eval("(2 + 3) * 4"), Value::Int(20));
        assert_eq!(eval("2 * -3"), Value::Int(-6));
        assert_eq!(eval("-(4)"), Value::Int(-4));
    }

    #[test]
    fn test_bitwise() {
        assert_eq!(eval("0xFF & 0x0F"), Value::Int(0x0F));
        assert_eq!(eval("0xF0 | 0x0F"), Value::Int(0xFF));
        assert_eq!(eval("0xFF ^ 0x0F"), Value::Int(0xF0));
        assert_eq!(eval("1 << 4"), Value::Int(16));
        assert_eq!(eval("16 >> 2"), Value::Int(4));
        assert_eq!(eval("~0"), Value::Int(-1));
        assert_eq!(eval("1 | 2 == 2"), Value::Int(1));
    }

    #[test]
    fn test_comparison_and_logic() {
        assert_eq!(eval("5 == 5"), Value::Int(1));
        assert_eq!(eval("5 != 3"), Value::Int(1));
        assert_eq!(eval("3 < 5 && 5 >= 5"), Value::Int(1));
        assert_eq!(eval("0 || 0"), Value::Int(0));
        assert_eq!(eval("!0"), Value::Int(1));
        assert_eq!(eval("1 << 2 > 3"), Value::Int(1));
    }

    #[test]
    fn test_short_circuit_skips_unknown() {
        assert_eq!(eval("0 && UNKNOWN"), Value::Int(0));
        assert_eq!(eval("1 || UNKNOWN"), Value::Int(1));
        assert!(eval_with("1 && UNKNOWN", &[]).is_err());
    }

    #[test]
    fn test_literals() {
        assert_eq!(eval("0xFFFFFFFFFFFFFFFF"), Value::Int(-1));
        assert_eq!(eval("010"), Value::Int(8));
        assert_eq!(eval("0b101"), Value::Int(5));
        assert_eq!(eval("100UL"), Value::Int(100));
        assert_eq!(eval("1.5f"), Value::Float(1.5));
        assert_eq!(eval("1e3"), Value::Float(1000.0));
        assert_eq!(eval("2.5e+1 + 1"), Value::Float(26.0));
        assert_eq!(eval("'A'"), Value::Int(65));
        assert_eq!(eval("'\\n'"), Value::Int(10));
        assert_eq!(eval("NULL"), Value::Pointer(0));
    }

    #[test]
    fn test_strings() {
        assert_eq!(eval("\"a+b\" + \"c\""), Value::Str("a+bc".into()));
        assert_eq!(eval("\"say \\\"hi\\\"\""), Value::Str("say \"hi\"".into()));
        assert!(eval_with("\"a\" \"b\"", &[]).is_err());
    }

    #[test]
    fn test_bindings() {
        let value = eval_with("BASE * 2", &[("BASE", Value::Int(10))]).unwrap();
        assert_eq!(value, Value::Int(20));
        let value = eval_with("SCALE * 2", &[("SCALE", Value::Float(0.5))]).unwrap();
        assert_eq!(value, Value::Float(1.0));
    }

    #[test]
    fn test_errors() {
        assert!(eval_with("1 / 0", &[]).is_err());
        assert!(eval_with("MISSING + 1", &[]).is_err());
        assert!(eval_with("(1 + 2", &[]).is_err());
        assert!(eval_with("foo(1)", &[]).is_err());
        assert!(eval_with("", &[]).is_err());
    }
}
