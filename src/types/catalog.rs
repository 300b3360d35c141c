//! Fixed tables: primitive spellings and standard container templates.

/// Name of the synthetic constructor that marks a `std::string` instantiation.
pub const STRING_TEMPLATE: &str = "basic_string";

/// Map a parser's fundamental-type spelling to its canonical atomic name.
pub fn canonical_primitive(spelling: &str) -> Option<&'static str> {
    let name = match spelling {
        "char" | "signed char" => "char",
        "unsigned char" => "uchar",
        "short int" => "int16",
        "short unsigned int" => "uint16",
        "int" => "int32",
        "unsigned int" => "uint32",
        "long int" | "long long int" => "int64",
        "long unsigned int" | "long long unsigned int" => "uint64",
        "float" => "float32",
        "double" => "float64",
        "complex" | "complex double" => "complex128",
        "void" => "void",
        "bool" => "bool",
        _ => return None,
    };
    Some(name)
}

/// Role of one template argument slot, named after the synthetic member
/// typedef the parser emits for it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TemplateRole {
    ValueType,
    KeyType,
    MappedType,
    FirstType,
    SecondType,
}

impl TemplateRole {
    pub fn member_name(self) -> &'static str {
        match self {
            Self::ValueType => "value_type",
            Self::KeyType => "key_type",
            Self::MappedType => "mapped_type",
            Self::FirstType => "first_type",
            Self::SecondType => "second_type",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TemplateShape {
    /// Known container: arguments are read from these role members, in order.
    Known(&'static [TemplateRole]),
    /// Not in the catalog; kept as an opaque name.
    Opaque,
}

impl TemplateShape {
    pub fn arity(self) -> Option<usize> {
        match self {
            Self::Known(roles) => Some(roles.len()),
            Self::Opaque => None,
        }
    }
}

use TemplateRole::*;

const SEQUENCE: &[TemplateRole] = &[ValueType];
const MAPPING: &[TemplateRole] = &[KeyType, MappedType];
const SET: &[TemplateRole] = &[KeyType];
const PAIR: &[TemplateRole] = &[FirstType, SecondType];

pub fn template_shape(name: &str) -> TemplateShape {
    match name {
        "array" | "deque" | "forward_list" | "list" | "vector" => TemplateShape::Known(SEQUENCE),
        "map" | "multimap" | "unordered_map" | "unordered_multimap" => TemplateShape::Known(MAPPING),
        "set" | "multiset" | "unordered_set" | "unordered_multiset" => TemplateShape::Known(SET),
        "pair" => TemplateShape::Known(PAIR),
        _ => TemplateShape::Opaque,
    }
}

/// True for names spelled like a template instantiation, e.g. `map<int, double>`.
pub fn is_instantiation_spelling(name: &str) -> bool {
    name.contains('<') && name.ends_with('>')
}

/// `std::map<int, double>` → `map`.
pub fn template_base_name(name: &str) -> &str {
    let head = name.split('<').next().unwrap_or(name);
    head.rsplit("::").next().unwrap_or(head).trim()
}
