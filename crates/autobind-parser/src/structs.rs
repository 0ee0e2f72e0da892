//! Struct and union definitions with natural C layout
//!
//! Structs lay fields out in order, each aligned to its own alignment. Union
//! members all sit at offset 0 and the union is as large as its largest
//! member. Both are padded to their strictest member alignment.

use autobind_core::{CType, Registry, StructDef, StructField, Value};

use crate::decl::resolve_ctype;
use crate::diag::Diagnostics;
use crate::eval::parse_number;
use crate::normalize::matching_brace;

const OVERFLOW: &str = "size overflows";

fn align_up(offset: usize, align: usize) -> Option<usize> {
    if align <= 1 {
        Some(offset)
    } else {
        Some(offset.checked_add(align - 1)? / align * align)
    }
}

/// Split `*name[4][2]` into `("*", "name", ["4", "2"])`
fn split_declarator(text: &str) -> Option<(&str, &str, Vec<&str>)> {
    let text = text.trim();
    let (head, dims) = match text.find('[') {
        Some(pos) => (&text[..pos], &text[pos..]),
        None => (text, ""),
    };
    let head = head.trim_end();
    let name_start = head
        .rfind(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .map_or(0, |p| p + 1);
    let name = &head[name_start..];
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }

    let mut sizes = Vec::new();
    let mut rest = dims.trim();
    while let Some(inner) = rest.strip_prefix('[') {
        let close = inner.find(']')?;
        sizes.push(inner[..close].trim());
        rest = inner[close + 1..].trim_start();
    }
    if !rest.is_empty() {
        return None;
    }
    Some((&head[..name_start], name, sizes))
}

/// Member declarations of a body, split on `;` outside nested braces
fn split_members(body: &str) -> Vec<&str> {
    let mut members = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in body.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ';' if depth == 0 => {
                members.push(body[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    members.push(body[start..].trim());
    members.retain(|m| !m.is_empty());
    members
}

fn kind_name(is_union: bool) -> &'static str {
    if is_union {
        "union"
    } else {
        "struct"
    }
}

/// Laid-out body of a struct or union
struct Layout {
    fields: Vec<StructField>,
    size: usize,
    alignment: usize,
}

/// One member before it is placed; `flattened` holds the fields of an
/// anonymous struct or union, relative to the member's start
struct Member {
    field: Option<StructField>,
    flattened: Vec<StructField>,
    size: usize,
    align: usize,
}

impl Member {
    fn field(
        name: &str,
        ctype: CType,
        struct_name: Option<String>,
        array_len: Option<usize>,
        size: usize,
        align: usize,
    ) -> Self {
        Member {
            field: Some(StructField {
                name: name.to_string(),
                ctype,
                struct_name,
                array_len,
                offset: 0,
            }),
            flattened: Vec::new(),
            size,
            align,
        }
    }
}

struct StructParser<'a> {
    alias: &'a str,
    registry: &'a Registry,
    max_typedef_depth: usize,
}

impl StructParser<'_> {
    fn array_len(&self, dims: &[&str]) -> Result<Option<usize>, String> {
        if dims.is_empty() {
            return Ok(None);
        }
        let mut total = 1usize;
        for dim in dims {
            let value = parse_number(dim).or_else(|| self.registry.constant(self.alias, dim));
            let n = match value {
                Some(Value::Int(n)) if n > 0 => n,
                _ => return Err(format!("array size '{}' is not a known constant", dim)),
            };
            total = usize::try_from(n)
                .ok()
                .and_then(|n| total.checked_mul(n))
                .ok_or_else(|| format!("array size {} {}", dims.join("x"), OVERFLOW))?;
        }
        Ok(Some(total))
    }

    fn layout(&self, ctype: &CType) -> Result<(usize, usize), String> {
        if let CType::Struct(name) = ctype {
            return self
                .registry
                .struct_def(name)
                .map(|def| (def.size, def.alignment))
                .ok_or_else(|| format!("unknown struct {}", name));
        }
        match (ctype.size(), ctype.alignment()) {
            (Some(size), Some(align)) => Ok((size, align)),
            _ => Err(format!("field of type {} has no size", ctype)),
        }
    }

    /// Element size times array length
    fn total_size(size: usize, array_len: Option<usize>, name: &str) -> Result<usize, String> {
        size.checked_mul(array_len.unwrap_or(1))
            .ok_or_else(|| format!("field {}: {}", name, OVERFLOW))
    }

    /// Lay out the members of `body`
    ///
    /// Inline definitions found on the way are appended to `inline` so they
    /// can be registered once the enclosing definition succeeds.
    fn aggregate(
        &self,
        name: &str,
        body: &str,
        is_union: bool,
        inline: &mut Vec<StructDef>,
    ) -> Result<Layout, String> {
        let mut fields = Vec::new();
        let mut end = 0usize;
        let mut max_align = 1;

        for decl in split_members(body) {
            for member in self.members(name, decl, inline)? {
                let start = if is_union {
                    0
                } else {
                    align_up(end, member.align).ok_or(OVERFLOW)?
                };
                max_align = max_align.max(member.align);
                if let Some(mut field) = member.field {
                    field.offset = start;
                    fields.push(field);
                }
                for mut field in member.flattened {
                    field.offset += start;
                    fields.push(field);
                }
                let member_end = start.checked_add(member.size).ok_or(OVERFLOW)?;
                end = end.max(member_end);
            }
        }

        Ok(Layout {
            fields,
            size: align_up(end, max_align).ok_or(OVERFLOW)?,
            alignment: max_align,
        })
    }

    /// Members declared by one `;`-terminated declaration of `owner`
    fn members(&self, owner: &str, decl: &str, inline: &mut Vec<StructDef>) -> Result<Vec<Member>, String> {
        if let Some(caps) = regex!(r"^(struct|union)\b\s*([A-Za-z_]\w*)?\s*\{").captures(decl) {
            let open = caps.get(0).map_or(0, |m| m.end() - 1);
            let close = matching_brace(&decl[open..])
                .map(|c| open + c)
                .ok_or_else(|| format!("unbalanced braces in '{}'", decl))?;
            let is_union = &caps[1] == "union";
            let tag = caps.get(2).map(|m| m.as_str());
            let body = &decl[open + 1..close];
            return self.inline_members(owner, tag, is_union, body, &decl[close + 1..], inline);
        }
        if decl.contains(':') {
            return Err(format!("bitfield in '{}'", decl));
        }
        if let Some(caps) =
            regex!(r"^[^()]+\(\s*\*\s*([A-Za-z_]\w*)\s*((?:\[[^\]]*\]\s*)*)\)\s*\([^;]*\)$").captures(decl)
        {
            let name = &caps[1];
            let dims: Vec<&str> = regex!(r"\[([^\]]*)\]")
                .captures_iter(&caps[2])
                .filter_map(|d| d.get(1).map(|m| m.as_str().trim()))
                .collect();
            let array_len = self.array_len(&dims)?;
            let (size, align) = self.layout(&CType::FuncPtr)?;
            let size = Self::total_size(size, array_len, name)?;
            return Ok(vec![Member::field(name, CType::FuncPtr, None, array_len, size, align)]);
        }
        if decl.contains('(') {
            return Err(format!("cannot parse field '{}'", decl));
        }

        let mut declarators = decl.split(',');
        let first = declarators.next().unwrap_or_default();
        let (type_part, name, dims) =
            split_declarator(first).ok_or_else(|| format!("cannot parse field '{}'", decl))?;
        let base_type = type_part.trim_end_matches(|c: char| c == '*' || c.is_whitespace());

        let mut entries = vec![(type_part.to_string(), name, dims)];
        for extra in declarators {
            let (stars, name, dims) =
                split_declarator(extra).ok_or_else(|| format!("cannot parse field '{}'", decl))?;
            entries.push((format!("{} {}", base_type, stars.trim()), name, dims));
        }

        let mut members = Vec::with_capacity(entries.len());
        for (type_text, name, dims) in entries {
            let (ctype, struct_name) = resolve_ctype(&type_text, self.alias, self.registry, self.max_typedef_depth)
                .map_err(|e| format!("field {}: {}", name, e))?;
            let array_len = self.array_len(&dims)?;
            let (size, align) = self.layout(&ctype)?;
            let size = Self::total_size(size, array_len, name)?;
            members.push(Member::field(name, ctype, struct_name, array_len, size, align));
        }
        Ok(members)
    }

    /// `struct|union [Tag] { body } declarators` written inside another body
    ///
    /// Without declarators the members are flattened into the owner. Named
    /// inline definitions take their tag or `owner.field` as their name.
    fn inline_members(
        &self,
        owner: &str,
        tag: Option<&str>,
        is_union: bool,
        body: &str,
        declarators: &str,
        inline: &mut Vec<StructDef>,
    ) -> Result<Vec<Member>, String> {
        let declarators: Vec<&str> = declarators.split(',').map(str::trim).filter(|d| !d.is_empty()).collect();
        let Some(first) = declarators.first() else {
            let layout = self.aggregate(owner, body, is_union, inline)?;
            return Ok(vec![Member {
                field: None,
                flattened: layout.fields,
                size: layout.size,
                align: layout.alignment,
            }]);
        };

        let first_name = split_declarator(first)
            .map(|(_, name, _)| name)
            .ok_or_else(|| format!("cannot parse field '{}'", first))?;
        let inner_name = match tag {
            Some(tag) => tag.to_string(),
            None => format!("{}.{}", owner, first_name),
        };
        let layout = self.aggregate(&inner_name, body, is_union, inline)?;

        let mut members = Vec::with_capacity(declarators.len());
        for declarator in &declarators {
            let (stars, name, dims) =
                split_declarator(declarator).ok_or_else(|| format!("cannot parse field '{}'", declarator))?;
            let array_len = self.array_len(&dims)?;
            let (ctype, size, align) = if stars.contains('*') {
                let (size, align) = self.layout(&CType::Pointer)?;
                (CType::Pointer, size, align)
            } else {
                (CType::Struct(inner_name.clone()), layout.size, layout.alignment)
            };
            let size = Self::total_size(size, array_len, name)?;
            members.push(Member::field(name, ctype, Some(inner_name.clone()), array_len, size, align));
        }

        inline.push(StructDef {
            name: inner_name,
            fields: layout.fields,
            size: layout.size,
            alignment: layout.alignment,
            origin_alias: self.alias.to_string(),
            is_union,
        });
        Ok(members)
    }
}

/// Parse every struct and union definition in `text` and register it
///
/// Definitions with bitfields, unknown field types, unresolvable array sizes
/// or sizes that overflow are skipped and recorded as import errors.
/// Function-pointer fields are pointer-sized. Inline definitions are laid out
/// in place and registered alongside their owner. A definition is registered
/// under its typedef name and also under its tag when the two differ.
/// Returns how many top-level definitions were registered.
pub(crate) fn parse_structs(
    text: &str,
    alias: &str,
    registry: &Registry,
    max_typedef_depth: usize,
    diag: &Diagnostics,
) -> usize {
    let head = regex!(r"\b(typedef\s+)?(struct|union)\b\s*([A-Za-z_]\w*)?\s*\{");
    let parser = StructParser {
        alias,
        registry,
        max_typedef_depth,
    };
    let mut count = 0;

    for caps in head.captures_iter(text) {
        let open = caps.get(0).map_or(0, |m| m.end() - 1);
        let Some(close) = matching_brace(&text[open..]).map(|c| open + c) else {
            continue;
        };
        let body = &text[open + 1..close];
        let is_union = &caps[2] == "union";
        let kind = kind_name(is_union);

        let tag = caps.get(3).map(|m| m.as_str());
        let typedef_name = if caps.get(1).is_some() {
            regex!(r"^\s*([A-Za-z_]\w*)")
                .captures(&text[close + 1..])
                .and_then(|c| c.get(1))
                .map(|m| m.as_str())
        } else {
            None
        };
        let Some(name) = typedef_name.or(tag) else {
            continue;
        };

        let mut inline = Vec::new();
        match parser.aggregate(name, body, is_union, &mut inline) {
            Ok(layout) => {
                let def = StructDef {
                    name: name.to_string(),
                    fields: layout.fields,
                    size: layout.size,
                    alignment: layout.alignment,
                    origin_alias: alias.to_string(),
                    is_union,
                };
                diag.trace(|| format!("{} {} ({} bytes)", kind, name, def.size));
                for nested in inline {
                    registry.add_struct(nested);
                }
                if let Some(tag) = tag.filter(|t| *t != name) {
                    registry.add_struct(StructDef {
                        name: tag.to_string(),
                        ..def.clone()
                    });
                }
                registry.add_struct(def);
                count += 1;
            }
            Err(reason) => {
                let reason = format!("{} {}: {}", kind, name, reason);
                diag.skip(kind, &reason);
                registry.push_import_error(alias, reason);
            }
        }
    }
    count
}
