//! Core type definitions

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

const QUALIFIERS: &[&str] = &[
    "const",
    "volatile",
    "restrict",
    "__restrict",
    "__restrict__",
    "__const",
    "__extension__",
];

/// A C type as seen at the FFI boundary
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CType {
    Void,
    Bool,
    Char,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    LongLong,
    ULongLong,
    Float,
    Double,
    LongDouble,
    SizeT,
    SSizeT,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    /// Any data pointer
    Pointer,
    /// `char *` / `const char *`
    CString,
    /// Pointer to a function
    FuncPtr,
    /// Struct or union passed by value
    Struct(String),
}

impl CType {
    /// Map a scalar C type spelling (qualifiers allowed) to a `CType`
    pub fn from_c_name(name: &str) -> Option<CType> {
        let tokens: Vec<&str> = name
            .split_whitespace()
            .filter(|t| !QUALIFIERS.contains(t))
            .collect();
        let unsigned = tokens.contains(&"unsigned");
        let signed = tokens.contains(&"signed");
        let mut rest: Vec<&str> = tokens
            .iter()
            .copied()
            .filter(|t| *t != "unsigned" && *t != "signed")
            .collect();
        if rest.len() > 1 {
            rest.retain(|t| *t != "int");
        }

        let ty = match rest.as_slice() {
            [] if unsigned => CType::UInt,
            [] if signed => CType::Int,
            ["int"] => pick(unsigned, CType::Int, CType::UInt),
            ["char"] => pick(unsigned, CType::Char, CType::UChar),
            ["short"] => pick(unsigned, CType::Short, CType::UShort),
            ["long"] => pick(unsigned, CType::Long, CType::ULong),
            ["long", "long"] => pick(unsigned, CType::LongLong, CType::ULongLong),
            _ if unsigned || signed => return None,
            ["long", "double"] => CType::LongDouble,
            ["void"] => CType::Void,
            ["_Bool"] | ["bool"] => CType::Bool,
            ["float"] => CType::Float,
            ["double"] => CType::Double,
            ["size_t"] | ["uintptr_t"] => CType::SizeT,
            ["ssize_t"] | ["intptr_t"] | ["ptrdiff_t"] | ["off_t"] => CType::SSizeT,
            ["int8_t"] => CType::I8,
            ["uint8_t"] => CType::U8,
            ["int16_t"] => CType::I16,
            ["uint16_t"] => CType::U16,
            ["int32_t"] => CType::I32,
            ["uint32_t"] => CType::U32,
            ["int64_t"] => CType::I64,
            ["uint64_t"] => CType::U64,
            _ => return None,
        };
        Some(ty)
    }

    /// Size in bytes on the host, `None` for `void` and by-value structs
    pub fn size(&self) -> Option<usize> {
        let size = match self {
            CType::Void | CType::Struct(_) => return None,
            CType::Bool | CType::Char | CType::UChar | CType::I8 | CType::U8 => 1,
            CType::Short | CType::UShort | CType::I16 | CType::U16 => 2,
            CType::Int | CType::UInt | CType::I32 | CType::U32 | CType::Float => 4,
            CType::LongLong | CType::ULongLong | CType::I64 | CType::U64 | CType::Double => 8,
            CType::Long | CType::ULong => std::mem::size_of::<std::ffi::c_long>(),
            CType::LongDouble => 16,
            CType::SizeT
            | CType::SSizeT
            | CType::Pointer
            | CType::CString
            | CType::FuncPtr => std::mem::size_of::<usize>(),
        };
        Some(size)
    }

    /// Natural alignment; scalars align to their size
    pub fn alignment(&self) -> Option<usize> {
        self.size()
    }

    pub fn is_integer(&self) -> bool {
        !matches!(
            self,
            CType::Void
                | CType::Float
                | CType::Double
                | CType::LongDouble
                | CType::Pointer
                | CType::CString
                | CType::FuncPtr
                | CType::Struct(_)
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, CType::Float | CType::Double | CType::LongDouble)
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, CType::Pointer | CType::CString | CType::FuncPtr)
    }
}

fn pick(unsigned: bool, signed_ty: CType, unsigned_ty: CType) -> CType {
    if unsigned {
        unsigned_ty
    } else {
        signed_ty
    }
}

impl fmt::Display for CType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CType::Void => "void",
            CType::Bool => "bool",
            CType::Char => "char",
            CType::UChar => "unsigned char",
            CType::Short => "short",
            CType::UShort => "unsigned short",
            CType::Int => "int",
            CType::UInt => "unsigned int",
            CType::Long => "long",
            CType::ULong => "unsigned long",
            CType::LongLong => "long long",
            CType::ULongLong => "unsigned long long",
            CType::Float => "float",
            CType::Double => "double",
            CType::LongDouble => "long double",
            CType::SizeT => "size_t",
            CType::SSizeT => "ssize_t",
            CType::I8 => "int8_t",
            CType::U8 => "uint8_t",
            CType::I16 => "int16_t",
            CType::U16 => "uint16_t",
            CType::I32 => "int32_t",
            CType::U32 => "uint32_t",
            CType::I64 => "int64_t",
            CType::U64 => "uint64_t",
            CType::Pointer => "void *",
            CType::CString => "char *",
            CType::FuncPtr => "void (*)()",
            CType::Struct(name) => return write!(f, "struct {}", name),
        };
        f.write_str(name)
    }
}

/// Function parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CParam {
    /// Parameter name, if the prototype spelled one
    pub name: Option<String>,
    /// Parameter type
    pub ctype: CType,
    /// Struct name behind a struct or struct-pointer parameter
    pub struct_name: Option<String>,
}

impl CParam {
    pub fn new(ctype: CType) -> Self {
        Self {
            name: None,
            ctype,
            struct_name: None,
        }
    }
}

/// Where a signature came from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureOrigin {
    /// Declared by user code; never replaced by discovery
    Manual,
    /// Discovered from a header
    #[default]
    Auto,
}

/// Resolved C function signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CFunctionSignature {
    /// Function name
    pub name: String,
    /// Parameters in order
    pub params: Vec<CParam>,
    /// Return type
    pub return_type: CType,
    /// Struct name behind a struct or struct-pointer return
    pub return_struct_name: Option<String>,
    /// Trailing `...`
    pub variadic: bool,
    /// Manual or auto-discovered
    pub origin: SignatureOrigin,
}

impl CFunctionSignature {
    pub fn new(name: impl Into<String>, return_type: CType) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            return_type,
            return_struct_name: None,
            variadic: false,
            origin: SignatureOrigin::Auto,
        }
    }

    /// Parameter types in order
    pub fn param_types(&self) -> Vec<&CType> {
        self.params.iter().map(|p| &p.ctype).collect()
    }

    /// Struct names per parameter, `None` where the parameter is not a struct
    pub fn param_struct_names(&self) -> Vec<Option<&str>> {
        self.params.iter().map(|p| p.struct_name.as_deref()).collect()
    }
}

/// Struct field with its computed offset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructField {
    /// Field name
    pub name: String,
    /// Field type
    pub ctype: CType,
    /// Struct name for nested struct fields
    pub struct_name: Option<String>,
    /// Element count for fixed arrays
    pub array_len: Option<usize>,
    /// Byte offset from the start of the struct
    pub offset: usize,
}

/// Struct or union definition with natural C layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructDef {
    /// Name (typedef name when present, else tag)
    pub name: String,
    /// Fields in declaration order
    pub fields: Vec<StructField>,
    /// Total size including tail padding
    pub size: usize,
    /// Alignment of the whole struct
    pub alignment: usize,
    /// Module alias whose headers defined it
    pub origin_alias: String,
    /// Every field sits at offset 0
    #[serde(default)]
    pub is_union: bool,
}

/// Runtime enum table
///
/// Lookup is by member name while declaration order is kept for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDef {
    name: String,
    namespace: String,
    values: HashMap<String, i64>,
    order: Vec<String>,
}

impl EnumDef {
    /// Create an empty enum; `name` is the namespaced name (`alias::Name`)
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            values: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Add or update a member, keeping its first position
    pub fn push(&mut self, member: impl Into<String>, value: i64) {
        let member = member.into();
        if self.values.insert(member.clone(), value).is_none() {
            self.order.push(member);
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn get(&self, member: &str) -> Option<i64> {
        self.values.get(member).copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Members in declaration order
    pub fn members(&self) -> impl Iterator<Item = (&str, i64)> + '_ {
        self.order
            .iter()
            .filter_map(move |m| self.values.get(m).map(|v| (m.as_str(), *v)))
    }
}

/// Serializable form of [`EnumDef`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumData {
    pub name: String,
    pub namespace: String,
    pub values: BTreeMap<String, i64>,
    pub order: Vec<String>,
}

impl From<&EnumDef> for EnumData {
    fn from(def: &EnumDef) -> Self {
        Self {
            name: def.name.clone(),
            namespace: def.namespace.clone(),
            values: def.values.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            order: def.order.clone(),
        }
    }
}

impl From<EnumData> for EnumDef {
    fn from(data: EnumData) -> Self {
        let mut def = EnumDef::new(data.name, data.namespace);
        for member in &data.order {
            if let Some(value) = data.values.get(member) {
                def.push(member.clone(), *value);
            }
        }
        // Members missing from `order` keep a stable, sorted position
        for (member, value) in data.values {
            if !def.values.contains_key(&member) {
                def.push(member, value);
            }
        }
        def
    }
}

/// Interpreter value crossing the binding layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Pointer(usize),
}

impl Value {
    /// Integer view of numeric values; floats truncate toward zero
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Float(v) => Some(*v as i64),
            Value::Bool(v) => Some(i64::from(*v)),
            Value::Pointer(v) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// C truthiness: zero, null, nil and the empty string are false
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Int(v) => *v != 0,
            Value::Float(v) => *v != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Pointer(p) => *p != 0,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Pointer(_) => "pointer",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Pointer(p) => write!(f, "0x{:x}", p),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_from_c_name() {
        assert_eq!(CType::from_c_name("int"), Some(CType::Int));
        assert_eq!(CType::from_c_name("unsigned"), Some(CType::UInt));
        assert_eq!(CType::from_c_name("const unsigned long int"), Some(CType::ULong));
        assert_eq!(CType::from_c_name("long long"), Some(CType::LongLong));
        assert_eq!(CType::from_c_name("unsigned char"), Some(CType::UChar));
        assert_eq!(CType::from_c_name("long double"), Some(CType::LongDouble));
        assert_eq!(CType::from_c_name("uint32_t"), Some(CType::U32));
        assert_eq!(CType::from_c_name("unsigned double"), None);
        assert_eq!(CType::from_c_name("png_structp"), None);
    }

    #[test]
    fn test_scalar_sizes() {
        assert_eq!(CType::Char.size(), Some(1));
        assert_eq!(CType::Int.size(), Some(4));
        assert_eq!(CType::Pointer.size(), Some(std::mem::size_of::<usize>()));
        assert_eq!(CType::Void.size(), None);
        assert!(CType::Short.is_integer());
        assert!(!CType::Double.is_integer());
    }

    #[test]
    fn test_enum_keeps_order() {
        let mut def = EnumDef::new("gl::Mode", "gl");
        def.push("C", 6);
        def.push("A", 0);
        def.push("C", 7);
        let members: Vec<_> = def.members().collect();
        assert_eq!(members, vec![("C", 7), ("A", 0)]);
    }

    #[test]
    fn test_enum_dto_mapping() {
        let mut def = EnumDef::new("z::Level", "z");
        def.push("LOW", 0);
        def.push("HIGH", 9);

        let data = EnumData::from(&def);
        assert_eq!(data.order, vec!["LOW".to_string(), "HIGH".to_string()]);

        let back = EnumDef::from(data);
        assert_eq!(back, def);
    }

    #[test]
    fn test_enum_dto_tolerates_missing_order() {
        let data = EnumData {
            name: "x::E".into(),
            namespace: "x".into(),
            values: [("B".to_string(), 1), ("A".to_string(), 0)].into_iter().collect(),
            order: vec!["B".into(), "GONE".into()],
        };
        let def = EnumDef::from(data);
        let names: Vec<_> = def.members().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["B", "A"]);
    }

    #[test]
    fn test_value_truthiness() {
        assert!(!Value::Int(0).is_truthy());
        assert!(Value::Float(0.5).is_truthy());
        assert!(!Value::Nil.is_truthy());
        assert_eq!(Value::Float(6.9).as_i64(), Some(6));
    }
}
