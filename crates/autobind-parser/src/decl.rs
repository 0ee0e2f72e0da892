//! C declaration parser
//!
//! Turns a single prototype such as `int deflate(z_streamp strm, int flush)`
//! into a [`CFunctionSignature`], resolving typedefs, function-pointer
//! typedefs and known structs through the registry.

use autobind_core::{CFunctionSignature, CParam, CType, DeclarationParser, Error, Registry, Result};

use crate::normalize::matching_paren;
use crate::typedefs::{is_typedef, resolve_typedef};

/// Words dropped before a type is looked up
const IGNORED_WORDS: &[&str] = &[
    "const",
    "volatile",
    "restrict",
    "__restrict",
    "__restrict__",
    "__const",
    "__extension__",
    "extern",
    "static",
    "register",
    "inline",
    "__inline",
    "__inline__",
];

/// Words that can end a type, so they are never taken as a parameter name
const TYPE_WORDS: &[&str] = &[
    "void", "char", "short", "int", "long", "float", "double", "signed", "unsigned", "_Bool", "bool",
];

/// Nesting limit when one resolved type leads to another lookup
const MAX_RESOLVE_DEPTH: usize = 4;

/// Reference [`DeclarationParser`] for C prototypes
#[derive(Debug, Clone, Copy)]
pub struct CDeclParser {
    max_typedef_depth: usize,
}

impl Default for CDeclParser {
    fn default() -> Self {
        Self::new()
    }
}

impl CDeclParser {
    pub fn new() -> Self {
        Self { max_typedef_depth: 10 }
    }

    pub fn with_max_typedef_depth(max_typedef_depth: usize) -> Self {
        Self { max_typedef_depth }
    }
}

impl DeclarationParser for CDeclParser {
    fn parse(&self, declaration: &str, alias: &str, registry: &Registry) -> Result<CFunctionSignature> {
        let decl = declaration.trim().trim_end_matches(';').trim();
        let invalid = |detail: &str| Error::Declaration(format!("{}: {}", detail, decl));

        let open = decl.find('(').ok_or_else(|| invalid("missing '('"))?;
        let close = open + matching_paren(&decl[open..]).ok_or_else(|| invalid("unbalanced parentheses"))?;
        if !decl[close + 1..].trim().is_empty() {
            return Err(invalid("unexpected text after parameter list"));
        }

        let head = decl[..open].trim_end();
        let name_start = head
            .rfind(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .map_or(0, |p| p + 1);
        let name = &head[name_start..];
        if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(invalid("missing function name"));
        }
        let return_text = head[..name_start].trim();
        if return_text.is_empty() {
            return Err(invalid("missing return type"));
        }

        let (return_type, return_struct_name) =
            resolve_ctype(return_text, alias, registry, self.max_typedef_depth)?;

        let mut sig = CFunctionSignature::new(name, return_type);
        sig.return_struct_name = return_struct_name;

        let params = split_top_level(&decl[open + 1..close]);
        let only_void = params.len() == 1 && (params[0].is_empty() || params[0] == "void");
        if !only_void {
            for (i, param) in params.iter().enumerate() {
                if *param == "..." {
                    if i + 1 != params.len() {
                        return Err(invalid("'...' must be the last parameter"));
                    }
                    sig.variadic = true;
                    continue;
                }
                sig.params.push(self.parse_param(param, alias, registry)?);
            }
        }
        Ok(sig)
    }
}

impl CDeclParser {
    fn parse_param(&self, text: &str, alias: &str, registry: &Registry) -> Result<CParam> {
        if text.is_empty() {
            return Err(Error::Declaration("empty parameter".to_string()));
        }

        if text.contains('(') {
            let name = regex!(r"\(\s*\*\s*([A-Za-z_]\w*)?\s*\)")
                .captures(text)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string());
            let mut param = CParam::new(CType::FuncPtr);
            param.name = name;
            return Ok(param);
        }

        let array = regex!(r"\[[^\]]*\]");
        let decayed = array.is_match(text);
        let stripped = array.replace_all(text, "");
        let (type_text, name) = split_param_name(&stripped);
        // arrays decay to pointers
        let type_text = if decayed {
            format!("{} *", type_text)
        } else {
            type_text.to_string()
        };
        let (ctype, struct_name) = resolve_ctype(&type_text, alias, registry, self.max_typedef_depth)?;
        Ok(CParam {
            name: name.map(str::to_string),
            ctype,
            struct_name,
        })
    }
}

/// Split `const char *path` into `("const char *", Some("path"))`
fn split_param_name(text: &str) -> (&str, Option<&str>) {
    let trimmed = text.trim();
    let name_start = trimmed
        .rfind(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .map_or(0, |p| p + 1);
    let candidate = &trimmed[name_start..];
    let type_text = trimmed[..name_start].trim();

    let words: Vec<&str> = type_text
        .split(|c: char| c.is_whitespace() || c == '*')
        .filter(|w| !w.is_empty())
        .collect();
    let only_keywords = words
        .iter()
        .all(|w| IGNORED_WORDS.contains(w) || matches!(*w, "struct" | "union" | "enum"));

    if candidate.is_empty() || TYPE_WORDS.contains(&candidate) || words.is_empty() || only_keywords {
        return (trimmed, None);
    }
    (type_text, Some(candidate))
}

/// Split on commas outside parentheses, trimming each part
pub(crate) fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(text[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(text[start..].trim());
    parts
}

/// Resolve a type spelling to a [`CType`] plus the struct name behind it
///
/// `char *` is a C string, other pointers are opaque. Structs and unions by
/// value must already be registered.
pub fn resolve_ctype(
    text: &str,
    alias: &str,
    registry: &Registry,
    max_typedef_depth: usize,
) -> Result<(CType, Option<String>)> {
    resolve_at_depth(text, alias, registry, max_typedef_depth, 0)
}

fn resolve_at_depth(
    text: &str,
    alias: &str,
    registry: &Registry,
    max_typedef_depth: usize,
    depth: usize,
) -> Result<(CType, Option<String>)> {
    let stars = text.matches('*').count();
    let words: Vec<&str> = text
        .split(|c: char| c.is_whitespace() || c == '*')
        .filter(|w| !w.is_empty() && !IGNORED_WORDS.contains(w))
        .collect();
    let base = words.join(" ");
    if base.is_empty() {
        return Err(Error::Declaration(format!("missing type in '{}'", text.trim())));
    }

    if let [kind @ ("struct" | "union"), tag, ..] = words.as_slice() {
        let tag = tag.to_string();
        if stars > 0 {
            return Ok((CType::Pointer, Some(tag)));
        }
        return match registry.struct_def(&tag) {
            Some(_) => Ok((CType::Struct(tag.clone()), Some(tag))),
            None => Err(Error::Declaration(format!("unknown {} {} passed by value", kind, tag))),
        };
    }
    if words.first() == Some(&"enum") {
        let ctype = if stars > 0 { CType::Pointer } else { CType::Int };
        return Ok((ctype, None));
    }

    if let Some(ctype) = CType::from_c_name(&base) {
        let ctype = match (stars, ctype) {
            (0, ctype) => ctype,
            (1, CType::Char) => CType::CString,
            _ => CType::Pointer,
        };
        return Ok((ctype, None));
    }

    if registry.struct_def(&base).is_some() {
        if stars > 0 {
            return Ok((CType::Pointer, Some(base)));
        }
        return Ok((CType::Struct(base.clone()), Some(base)));
    }

    if registry.func_ptr_sig(alias, &base).is_some() {
        let ctype = if stars > 0 { CType::Pointer } else { CType::FuncPtr };
        return Ok((ctype, None));
    }

    let resolved = match resolve_typedef(registry, alias, &base, max_typedef_depth) {
        r if !r.is_empty() => r,
        _ if is_typedef(registry, alias, &base) => {
            return Err(Error::Declaration(format!("typedef chain for {} is too deep", base)));
        }
        _ => base.clone(),
    };
    if resolved != base && depth < MAX_RESOLVE_DEPTH {
        let spelled = format!("{}{}", resolved, "*".repeat(stars));
        return resolve_at_depth(&spelled, alias, registry, max_typedef_depth, depth + 1);
    }

    if words.len() > 1 {
        return Err(Error::Declaration(format!("unknown type '{}'", base)));
    }
    if stars > 0 {
        // pointer to an opaque type such as FILE
        return Ok((CType::Pointer, None));
    }
    Err(Error::Declaration(format!("unknown type '{}'", base)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use autobind_core::StructDef;
    use pretty_assertions::assert_eq;

    fn parse(registry: &Registry, decl: &str) -> Result<CFunctionSignature> {
        CDeclParser::new().parse(decl, "m", registry)
    }

    #[test]
    fn test_scalar_and_string() {
        let registry = Registry::new();
        let sig = parse(&registry, "const char *zlibVersion(void);").unwrap();
        assert_eq!(sig.name, "zlibVersion");
        assert_eq!(sig.return_type, CType::CString);
        assert!(sig.params.is_empty());

        let sig = parse(&registry, "double sin(double)").unwrap();
        assert_eq!(sig.param_types(), vec![&CType::Double]);
        assert_eq!(sig.params[0].name, None);

        let sig = parse(&registry, "unsigned long crc32(unsigned long crc, const unsigned char *buf, unsigned int len)").unwrap();
        assert_eq!(sig.return_type, CType::ULong);
        assert_eq!(sig.param_types(), vec![&CType::ULong, &CType::Pointer, &CType::UInt]);
        assert_eq!(sig.params[1].name.as_deref(), Some("buf"));
    }

    #[test]
    fn test_variadic() {
        let registry = Registry::new();
        let sig = parse(&registry, "int printf(const char *fmt, ...)").unwrap();
        assert!(sig.variadic);
        assert_eq!(sig.param_types(), vec![&CType::CString]);
        assert!(parse(&registry, "int bad(..., int x)").is_err());
    }

    #[test]
    fn test_typedef_and_struct_pointer() {
        let registry = Registry::new();
        registry.set_typedef("m", "z_streamp", "struct z_stream_s *");
        registry.set_typedef("m", "uInt", "unsigned int");
        let sig = parse(&registry, "int inflateInit_(z_streamp strm, uInt size)").unwrap();
        assert_eq!(sig.param_types(), vec![&CType::Pointer, &CType::UInt]);
        assert_eq!(sig.param_struct_names(), vec![Some("z_stream_s"), None]);

        let sig = parse(&registry, "struct tm *localtime(const time_t *t)").unwrap();
        assert_eq!(sig.return_type, CType::Pointer);
        assert_eq!(sig.return_struct_name.as_deref(), Some("tm"));
        assert_eq!(sig.param_types(), vec![&CType::Pointer]);
    }

    #[test]
    fn test_function_pointer_params() {
        let registry = Registry::new();
        let sig = parse(
            &registry,
            "void qsort(void *base, size_t n, size_t size, int (*compar)(const void *, const void *))",
        )
        .unwrap();
        assert_eq!(
            sig.param_types(),
            vec![&CType::Pointer, &CType::SizeT, &CType::SizeT, &CType::FuncPtr]
        );
        assert_eq!(sig.params[3].name.as_deref(), Some("compar"));

        registry.set_func_ptr_sig("m", "alloc_func", CFunctionSignature::new("alloc_func", CType::Pointer));
        let sig = parse(&registry, "void set_alloc(alloc_func fn)").unwrap();
        assert_eq!(sig.param_types(), vec![&CType::FuncPtr]);
    }

    #[test]
    fn test_struct_by_value() {
        let registry = Registry::new();
        registry.add_struct(StructDef {
            name: "Point".into(),
            fields: Vec::new(),
            size: 8,
            alignment: 4,
            origin_alias: "m".into(),
            is_union: false,
        });
        let sig = parse(&registry, "Point make_point(int x, int y)").unwrap();
        assert_eq!(sig.return_type, CType::Struct("Point".into()));
        assert_eq!(sig.return_struct_name.as_deref(), Some("Point"));

        assert!(parse(&registry, "struct Missing get(void)").is_err());
        assert!(parse(&registry, "union U get(void)").is_err());

        registry.add_struct(StructDef {
            name: "U".into(),
            fields: Vec::new(),
            size: 8,
            alignment: 8,
            origin_alias: "m".into(),
            is_union: true,
        });
        let sig = parse(&registry, "union U get(void)").unwrap();
        assert_eq!(sig.return_type, CType::Struct("U".into()));
    }

    #[test]
    fn test_unknown_name_is_not_a_deep_typedef() {
        let registry = Registry::new();
        let err = resolve_ctype("mystery_t", "m", &registry, 10).unwrap_err();
        assert!(err.to_string().contains("unknown type 'mystery_t'"));

        registry.set_typedef("m", "a_t", "b_t");
        registry.set_typedef("m", "b_t", "a_t");
        let err = resolve_ctype("a_t", "m", &registry, 10).unwrap_err();
        assert!(err.to_string().contains("too deep"));
    }

    #[test]
    fn test_arrays_and_unknowns() {
        let registry = Registry::new();
        let sig = parse(&registry, "int sum(int values[], int n)").unwrap();
        assert_eq!(sig.param_types(), vec![&CType::Pointer, &CType::Int]);
        assert_eq!(sig.params[0].name.as_deref(), Some("values"));

        assert!(parse(&registry, "Unknown make(void)").is_err());
        assert!(parse(&registry, "int (void)").is_err());
        assert!(parse(&registry, "no_parens").is_err());
    }

    #[test]
    fn test_typedef_depth_limit() {
        let registry = Registry::new();
        registry.set_typedef("m", "t0", "int");
        for i in 1..=10 {
            registry.set_typedef("m", format!("t{}", i), format!("t{}", i - 1));
        }
        // t9 is ten typedefs deep, t10 is eleven
        assert_eq!(resolve_ctype("t9", "m", &registry, 10).unwrap().0, CType::Int);
        assert!(resolve_ctype("t10", "m", &registry, 10).is_err());
    }
}
