//! Typedef extraction and resolution

use autobind_core::{DeclarationParser, Registry};

use crate::diag::Diagnostics;
use crate::normalize::matching_brace;

const QUALIFIERS: &[&str] = &["const", "volatile", "restrict", "__restrict", "struct", "union", "enum"];

/// Extract every typedef in `text` into the alias's tables
///
/// Tagged aggregates map to `struct Tag` / `union Tag` / `enum Tag` and
/// everything else is stored as its base type text. Function-pointer typedefs
/// are parsed last, so they may use any plain typedef from the same text, and
/// become signatures. Returns the number of typedefs recorded.
pub(crate) fn parse_typedefs(
    text: &str,
    alias: &str,
    registry: &Registry,
    declarations: &dyn DeclarationParser,
    diag: &Diagnostics,
) -> usize {
    let mut count = 0;

    let (masked, aggregates) = extract_aggregate_typedefs(text);
    for (name, base) in aggregates {
        diag.trace(|| format!("typedef {} = {}", name, base));
        registry.set_typedef(alias, name, base);
        count += 1;
    }

    let masked = regex!(r"\n\s*\*").replace_all(&masked, " *");
    let simple = regex!(r"\btypedef\s+([^;]+?)\s*([A-Za-z_]\w*)\s*;");
    for caps in simple.captures_iter(&masked) {
        let base = caps[1].trim();
        let name = &caps[2];
        if base.is_empty() || base.contains('(') || base.contains(['{', '}', '[', ',']) {
            continue;
        }
        diag.trace(|| format!("typedef {} = {}", name, base));
        registry.set_typedef(alias, name, base);
        count += 1;
    }

    let func_ptr = regex!(r"\btypedef\s+([^;(){}]+?)\(\s*\*\s*([A-Za-z_]\w*)\s*\)\s*(\([^;]*\))\s*;");
    for caps in func_ptr.captures_iter(text) {
        let name = &caps[2];
        let declaration = format!("{} {}{}", caps[1].trim(), name, &caps[3]);
        match declarations.parse(&declaration, alias, registry) {
            Ok(sig) => {
                diag.trace(|| format!("function pointer typedef {}", name));
                registry.set_func_ptr_sig(alias, name, sig);
                count += 1;
            }
            Err(e) => diag.skip(&format!("function pointer typedef {}", name), &e.to_string()),
        }
    }
    count
}

/// Find `typedef struct|union|enum [Tag] { ... } Name[, *PName];`
///
/// Returns `text` with those typedefs blanked out, plus `(name, base)` pairs.
/// Bodies containing nested braces are skipped, leaving the struct pass to
/// report them.
fn extract_aggregate_typedefs(text: &str) -> (String, Vec<(String, String)>) {
    let head = regex!(r"\btypedef\s+(struct|union|enum)\s*([A-Za-z_]\w*)?\s*\{");
    let tail = regex!(r"^\s*([A-Za-z_\s\*,]+?)\s*;");
    let mut masked = text.to_string();
    let mut found = Vec::new();

    for caps in head.captures_iter(text) {
        let whole = caps.get(0).map_or(0..0, |m| m.range());
        let open = whole.end - 1;
        let Some(close) = matching_brace(&text[open..]).map(|c| open + c) else {
            continue;
        };
        let body = &text[open + 1..close];
        if body.contains('{') {
            continue;
        }
        let Some(names) = tail.captures(&text[close + 1..]) else {
            continue;
        };
        let names_match = names.get(0).map_or(0..0, |m| m.range());
        let end = close + 1 + names_match.end;

        let kind = &caps[1];
        let declarators: Vec<&str> = names[1].split(',').map(str::trim).collect();
        let tag = caps
            .get(2)
            .map(|m| m.as_str().to_string())
            .or_else(|| declarators.iter().find(|d| !d.starts_with('*')).map(|d| d.to_string()));
        let Some(tag) = tag else { continue };

        for declarator in declarators {
            let stars = declarator.matches('*').count();
            let name = declarator.trim_start_matches(['*', ' ', '\t']).trim();
            if name.is_empty() {
                continue;
            }
            let base = format!("{} {}{}", kind, tag, " *".repeat(stars));
            found.push((name.to_string(), base));
        }

        masked.replace_range(whole.start..end, &" ".repeat(end - whole.start));
    }
    (masked, found)
}

enum Resolution {
    NotTypedef,
    Resolved(String),
    TooDeep,
}

/// Strip qualifiers and aggregate keywords, collapsing whitespace
fn clean(type_text: &str) -> String {
    type_text
        .split_whitespace()
        .filter(|w| !QUALIFIERS.contains(w))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split `uLong **` into `("uLong", 2)`
fn split_pointer(type_text: &str) -> (&str, usize) {
    let core = type_text.trim_end_matches(|c: char| c == '*' || c.is_whitespace());
    let stars = type_text[core.len()..].matches('*').count();
    (core, stars)
}

fn resolve_inner(registry: &Registry, alias: &str, name: &str, depth: usize, max_depth: usize) -> Resolution {
    if depth > max_depth {
        return Resolution::TooDeep;
    }
    let cleaned = clean(name);
    let Some(base) = registry.typedef(alias, &cleaned) else {
        return Resolution::NotTypedef;
    };

    let (core, stars) = split_pointer(&base);
    if clean(core) == cleaned {
        // typedef struct Foo Foo;
        return Resolution::Resolved(base);
    }
    match resolve_inner(registry, alias, core, depth + 1, max_depth) {
        Resolution::NotTypedef => Resolution::Resolved(base),
        Resolution::Resolved(inner) => Resolution::Resolved(format!("{}{}", inner, " *".repeat(stars))),
        Resolution::TooDeep => Resolution::TooDeep,
    }
}

/// Follow a typedef chain to the underlying type text
///
/// Qualifiers and `struct`/`union`/`enum` keywords are ignored for lookup.
/// Returns an empty string when `name` is not a typedef or its chain is
/// longer than `max_depth`; callers then use the name as written.
pub fn resolve_typedef(registry: &Registry, alias: &str, name: &str, max_depth: usize) -> String {
    match resolve_inner(registry, alias, name, 0, max_depth) {
        Resolution::Resolved(base) => base,
        Resolution::NotTypedef | Resolution::TooDeep => String::new(),
    }
}

/// Whether `name` is a typedef of `alias`, ignoring qualifiers
pub fn is_typedef(registry: &Registry, alias: &str, name: &str) -> bool {
    registry.typedef(alias, &clean(name)).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::CDeclParser;
    use autobind_core::config::ParseConfig;
    use autobind_core::CType;
    use pretty_assertions::assert_eq;

    fn parse(text: &str) -> Registry {
        let registry = Registry::new();
        let diag = Diagnostics::new(&ParseConfig::default());
        parse_typedefs(text, "m", &registry, &CDeclParser::new(), &diag);
        registry
    }

    #[test]
    fn test_simple_typedefs() {
        let registry = parse("typedef unsigned long uLong;\ntypedef uLong\n    *uLongp;\ntypedef char buf_t[16];");
        assert_eq!(registry.typedef("m", "uLong").as_deref(), Some("unsigned long"));
        assert_eq!(registry.typedef("m", "uLongp").as_deref(), Some("uLong *"));
        assert_eq!(registry.typedef("m", "buf_t"), None);
    }

    #[test]
    fn test_aggregate_typedefs() {
        let registry = parse(
            "typedef struct z_stream_s { int avail_in; char *next_in; } z_stream, *z_streamp;\n\
             typedef struct { int x; int y; } Point;\n\
             typedef enum { RED, GREEN } Color;\n\
             typedef struct Opaque Opaque;",
        );
        assert_eq!(registry.typedef("m", "z_stream").as_deref(), Some("struct z_stream_s"));
        assert_eq!(registry.typedef("m", "z_streamp").as_deref(), Some("struct z_stream_s *"));
        assert_eq!(registry.typedef("m", "Point").as_deref(), Some("struct Point"));
        assert_eq!(registry.typedef("m", "Color").as_deref(), Some("enum Color"));
        assert_eq!(registry.typedef("m", "Opaque").as_deref(), Some("struct Opaque"));
        assert_eq!(registry.typedef("m", "avail_in"), None);
    }

    #[test]
    fn test_function_pointer_typedef() {
        let registry = parse("typedef int (*compare_fn)(const void *a, const void *b);");
        let sig = registry.func_ptr_sig("m", "compare_fn").unwrap();
        assert_eq!(sig.return_type, CType::Int);
        assert_eq!(sig.param_types(), vec![&CType::Pointer, &CType::Pointer]);
        assert_eq!(registry.typedef("m", "compare_fn"), None);
    }

    #[test]
    fn test_resolve_chain_and_pointers() {
        let registry = parse("typedef unsigned int uInt;\ntypedef uInt myuint;\ntypedef myuint *myuintp;");
        assert_eq!(resolve_typedef(&registry, "m", "myuint", 10), "unsigned int");
        assert_eq!(resolve_typedef(&registry, "m", "const myuint", 10), "unsigned int");
        assert_eq!(resolve_typedef(&registry, "m", "myuintp", 10), "unsigned int *");
        assert_eq!(resolve_typedef(&registry, "m", "plain", 10), "");
        assert!(!is_typedef(&registry, "m", "plain"));
        assert!(is_typedef(&registry, "m", "const myuint"));
    }

    #[test]
    fn test_self_referential_typedef() {
        let registry = parse("typedef struct Node Node;");
        assert_eq!(resolve_typedef(&registry, "m", "Node", 10), "struct Node");
    }
}
