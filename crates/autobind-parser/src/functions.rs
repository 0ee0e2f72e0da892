//! Function prototype extraction

use autobind_core::{DeclarationParser, Registry};

use crate::diag::Diagnostics;
use crate::normalize::matching_paren;

/// Line prefixes that never start an exported prototype
const REJECTED_PREFIXES: &[&str] = &[
    "typedef",
    "#",
    "static",
    "extern inline",
    "extern __inline",
    "__attribute__",
];

const KEYWORDS: &[&str] = &[
    "if", "else", "while", "for", "do", "switch", "case", "return", "sizeof", "typedef", "struct",
    "union", "enum", "goto", "default",
];

/// Every `type name(params);` prototype in `text`, one normalized line each
pub fn find_prototypes(text: &str) -> Vec<String> {
    let candidate = regex!(r"([A-Za-z_][A-Za-z0-9_ \t\*]*)\(");
    let mut found = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || REJECTED_PREFIXES.iter().any(|p| trimmed.starts_with(p)) {
            continue;
        }

        let mut start = 0;
        while let Some(caps) = candidate.captures_at(trimmed, start) {
            let m = caps.get(0).map_or(0..0, |m| m.range());
            let open = m.end - 1;
            let Some(close) = matching_paren(&trimmed[open..]).map(|c| open + c) else {
                break;
            };
            if !trimmed[close + 1..].trim_start().starts_with(';') {
                start = m.end;
                continue;
            }
            start = close + 1;

            let head = caps[1].trim();
            let name = head
                .rsplit(|c: char| c.is_whitespace() || c == '*')
                .next()
                .unwrap_or_default();
            let return_type = head[..head.len() - name.len()].trim();
            if name.is_empty() || name.starts_with('_') || KEYWORDS.contains(&name) || return_type.is_empty() {
                continue;
            }

            let head = head.strip_prefix("extern").map_or(head, str::trim_start);
            found.push(format!("{}{}", head, &trimmed[open..=close]));
        }
    }
    found
}

/// Parse prototypes in `text` and register them as auto signatures
///
/// Manually declared signatures are never replaced. Returns the number of
/// signatures registered.
pub(crate) fn parse_functions(
    text: &str,
    alias: &str,
    registry: &Registry,
    declarations: &dyn DeclarationParser,
    diag: &Diagnostics,
) -> usize {
    let mut count = 0;
    for prototype in find_prototypes(text) {
        match declarations.parse(&prototype, alias, registry) {
            Ok(sig) => {
                let name = sig.name.clone();
                if registry.register_signature(alias, sig) {
                    diag.trace(|| format!("function {}", prototype));
                    count += 1;
                } else {
                    diag.trace(|| format!("function {} already declared manually", name));
                }
            }
            Err(e) => diag.skip("function", &e.to_string()),
        }
    }
    count
}
