//! Comment stripping and declaration normalization

/// Marker macros that expand to nothing or to attributes
const MARKER_MACROS: &[&str] = &[
    "__BEGIN_DECLS",
    "__END_DECLS",
    "__THROW",
    "__THROWNL",
    "__wur",
    "__attribute_const__",
    "__attribute_pure__",
    "__attribute_malloc__",
    "__attribute_artificial__",
    "__attribute_maybe_unused__",
    "__attribute_warn_unused_result__",
    "__attribute_deprecated__",
    "__returns_nonnull",
    "__always_inline",
    "__extern_inline",
    "__restrict",
    "__COLD",
    "__LEAF",
    "__LEAF_ATTR",
    "ZEXTERN",
    "ZEXPORT",
    "ZEXPORTVA",
    "PNGAPI",
    "GLFWAPI",
    "CURL_EXTERN",
    "APIENTRY",
];

/// Marker macros followed by an argument list that is dropped with them
const MARKER_CALLS: &[&str] = &[
    "__attribute__",
    "__declspec",
    "__asm__",
    "__asm",
    "__nonnull",
    "__attr_access",
    "__attr_dealloc",
    "__attribute_format_arg__",
    "__attribute_alloc_size__",
    "__attribute_deprecated_msg__",
];

/// Export macros whose single argument is the return type
const RETURN_TYPE_MACROS: &[&str] = &[
    "FT_EXPORT",
    "FT_EXPORT_DEF",
    "FT_EXPORT_FUNC",
    "FT_BASE",
    "FT_BASE_DEF",
];

/// Remove `/* */` and `//` comments, leaving string and char literals alone
///
/// Newlines inside block comments are kept so line structure survives.
pub fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' | '\'' => {
                out.push(c);
                while let Some(inner) = chars.next() {
                    out.push(inner);
                    if inner == '\\' {
                        if let Some(escaped) = chars.next() {
                            out.push(escaped);
                        }
                    } else if inner == c || inner == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                out.push(' ');
                let mut prev = '\0';
                for inner in chars.by_ref() {
                    if inner == '\n' {
                        out.push('\n');
                    }
                    if prev == '*' && inner == '/' {
                        break;
                    }
                    prev = inner;
                }
            }
            '/' if chars.peek() == Some(&'/') => {
                for inner in chars.by_ref() {
                    if inner == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Join backslash-continued lines into one logical line
pub fn join_continuations(text: &str) -> String {
    let mut result: Vec<String> = Vec::new();
    let mut lines = text.split('\n');

    while let Some(line) = lines.next() {
        let mut current = line.trim_end_matches([' ', '\t', '\r']).to_string();
        while current.ends_with('\\') {
            current.pop();
            current.truncate(current.trim_end().len());
            match lines.next() {
                Some(next) => {
                    current.push(' ');
                    current.push_str(next.trim_start_matches([' ', '\t']));
                    current = current.trim_end_matches([' ', '\t', '\r']).to_string();
                }
                None => break,
            }
        }
        result.push(current);
    }
    result.join("\n")
}

/// Every `#define` with its continuation lines, in source order
///
/// Returns `(name, full definition text)`. Function-like macros are included
/// under their bare name.
pub fn extract_original_macros(text: &str) -> Vec<(String, String)> {
    let mut found = Vec::new();
    let lines: Vec<&str> = text.split('\n').collect();
    let mut i = 0;

    while i < lines.len() {
        let trimmed = lines[i].trim();
        let directive = match trimmed.strip_prefix('#') {
            Some(rest) => rest.trim_start(),
            None => {
                i += 1;
                continue;
            }
        };
        let body = match directive.strip_prefix("define") {
            Some(rest) if rest.starts_with([' ', '\t']) => rest.trim_start(),
            _ => {
                i += 1;
                continue;
            }
        };

        let mut definition = vec![lines[i]];
        while lines[i].trim_end_matches([' ', '\t', '\r']).ends_with('\\') && i + 1 < lines.len() {
            i += 1;
            definition.push(lines[i]);
        }

        let name_end = body.find([' ', '\t', '(']).unwrap_or(body.len());
        let name = &body[..name_end];
        if !name.is_empty() {
            found.push((name.to_string(), definition.join("\n")));
        }
        i += 1;
    }
    found
}

/// Strip marker, attribute and export macros that get in the way of
/// prototype matching
pub fn remove_marker_macros(text: &str) -> String {
    let mut text = text.to_string();

    for name in RETURN_TYPE_MACROS {
        text = replace_calls(&text, name, |args| format!("{} ", args.trim()));
    }
    for name in MARKER_CALLS {
        text = replace_calls(&text, name, |_| " ".to_string());
    }

    let words = regex!(&format!(r"\b(?:{})\b", MARKER_MACROS.join("|")));
    let text = words.replace_all(&text, "");
    regex!(r"[ \t]{2,}").replace_all(&text, " ").into_owned()
}

/// Replace every `name(args)` (balanced parentheses) with `f(args)`
fn replace_calls<F>(text: &str, name: &str, f: F) -> String
where
    F: Fn(&str) -> String,
{
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(pos) = find_word(rest, name) {
        let after = &rest[pos + name.len()..];
        let open = after.len() - after.trim_start().len();
        if !after[open..].starts_with('(') {
            out.push_str(&rest[..pos + name.len()]);
            rest = after;
            continue;
        }
        match matching_paren(&after[open..]) {
            Some(close) => {
                out.push_str(&rest[..pos]);
                out.push_str(&f(&after[open + 1..open + close]));
                rest = &after[open + close + 1..];
            }
            None => {
                out.push_str(&rest[..pos + name.len()]);
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Byte offset of `word` in `text` as a whole identifier
fn find_word(text: &str, word: &str) -> Option<usize> {
    let is_ident = |c: char| c.is_ascii_alphanumeric() || c == '_';
    let mut start = 0;
    while let Some(found) = text[start..].find(word) {
        let pos = start + found;
        let before_ok = text[..pos].chars().next_back().map_or(true, |c| !is_ident(c));
        let after_ok = text[pos + word.len()..].chars().next().map_or(true, |c| !is_ident(c));
        if before_ok && after_ok {
            return Some(pos);
        }
        start = pos + word.len();
    }
    None
}

/// Offset of the `)` matching the `(` at offset 0
pub(crate) fn matching_paren(text: &str) -> Option<usize> {
    matching_close(text, '(', ')')
}

/// Offset of the `}` matching the `{` at offset 0
pub(crate) fn matching_brace(text: &str) -> Option<usize> {
    matching_close(text, '{', '}')
}

fn matching_close(text: &str, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in text.char_indices() {
        match c {
            c if c == open => depth += 1,
            c if c == close => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

const MAX_FOLDED_LINES: usize = 64;

/// Fold prototypes spanning several lines into one line each
///
/// A fold starts at a line with an unterminated `(` or at a line that looks
/// like a bare return type. It ends once parentheses balance and a `;` or `{`
/// is reached. Lines that turn out not to be part of a declaration are
/// emitted unchanged.
pub fn normalize_function_declarations(text: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut buffer: Vec<String> = Vec::new();

    for line in text.split('\n') {
        let trimmed = line.trim();

        if !buffer.is_empty() {
            if trimmed.starts_with('#') {
                out.append(&mut buffer);
                out.push(line.to_string());
                continue;
            }
            if trimmed.is_empty() {
                continue;
            }

            let has_paren = buffer.iter().any(|l| l.contains('(')) || trimmed.contains('(');
            if !has_paren && !looks_like_type_fragment(trimmed) {
                out.append(&mut buffer);
            } else {
                buffer.push(trimmed.to_string());
                let joined = buffer.join(" ");
                let balanced = paren_balance(&joined) <= 0;
                if balanced && joined.contains('(') && (trimmed.contains(';') || trimmed.ends_with('{')) {
                    out.push(joined);
                    buffer.clear();
                } else if buffer.len() >= MAX_FOLDED_LINES {
                    out.append(&mut buffer);
                }
                continue;
            }
        }

        if trimmed.is_empty() || trimmed.starts_with('#') {
            out.push(line.to_string());
            continue;
        }

        let opens_declaration = trimmed.contains('(')
            && paren_balance(trimmed) > 0
            && !trimmed.ends_with(';')
            && !trimmed.ends_with('{');
        let unterminated_call = trimmed.contains('(')
            && paren_balance(trimmed) == 0
            && !trimmed.ends_with(';')
            && !trimmed.ends_with('{')
            && !trimmed.ends_with('}');

        if opens_declaration || unterminated_call || looks_like_type_fragment(trimmed) {
            buffer.push(trimmed.to_string());
        } else {
            out.push(line.to_string());
        }
    }
    out.append(&mut buffer);
    out.join("\n")
}

/// A line made only of identifiers and `*`, e.g. `extern const char *`
fn looks_like_type_fragment(line: &str) -> bool {
    let first_ok = line
        .chars()
        .next()
        .map_or(false, |c| c.is_ascii_alphabetic() || c == '_');
    first_ok
        && !line.starts_with("typedef")
        && line
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '*' || c == ' ' || c == '\t')
}

fn paren_balance(text: &str) -> i32 {
    text.chars().fold(0, |acc, c| match c {
        '(' => acc + 1,
        ')' => acc - 1,
        _ => acc,
    })
}
