//! The description document: a language-agnostic record of one C++ class.
//!
//! Serialized form (JSON):
//! ```text
//! {
//!   "name": "Toaster",
//!   "parents": ["FCComp"],
//!   "namespace": "bright",
//!   "attrs": {"n_slices": "int32", "rate": "float64"},
//!   "methods": [
//!     {"name": "Toaster", "args": [], "returns": null},
//!     {"name": "write", "args": [{"name": "filename", "type": "str", "default": "\"toaster.txt\""}], "returns": "void"}
//!   ],
//!   "docstrings": {"class": "I am a toaster!", "methods": {"write": "persists the toaster state."}},
//!   "extra": {"pyx": "toaster = Toaster()"}
//! }
//! ```
//! Every top-level key is optional so that partial descriptions (library
//! defaults, hand-written overrides) can be merged; see [`crate::merge`].
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{ApiGenError, Result};
use crate::types::TypeTerm;

/// Literal spellings that denote a null pointer default.
const NULL_LITERALS: &[&str] = &["NULL", "nullptr", "__null", "0"];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argument {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeTerm,
    /// Default-value literal as written in the source. `None` means the
    /// argument has no default; a null literal is `Some("NULL")` etc.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl Argument {
    pub fn new(name: impl Into<String>, ty: TypeTerm) -> Self {
        Self { name: name.into(), ty, default: None }
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// An explicit null-pointer default, distinct from having no default.
    pub fn has_null_default(&self) -> bool {
        self.ty.is_pointer()
            && self
                .default
                .as_deref()
                .is_some_and(|text| NULL_LITERALS.contains(&text.trim()))
    }
}

/// Identity of one overload: method name plus ordered arguments.
///
/// Equality, hashing and ordering look at the name and each argument's
/// `(name, type)` only; default values never take part.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MethodKey {
    pub name: String,
    #[serde(default)]
    pub args: Vec<Argument>,
}

impl MethodKey {
    pub fn new(name: impl Into<String>, args: Vec<Argument>) -> Self {
        Self { name: name.into(), args }
    }

    pub fn bare(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new())
    }

    pub fn is_destructor(&self) -> bool {
        self.name.starts_with('~')
    }

    /// Index of the first argument of the trailing run of defaults
    /// (`args.len()` when nothing is defaulted).
    pub fn first_defaulted(&self) -> usize {
        self.args
            .iter()
            .rposition(|arg| arg.default.is_none())
            .map_or(0, |i| i + 1)
    }
}

impl PartialEq for MethodKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MethodKey {}

impl Hash for MethodKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.args.len().hash(state);
        for arg in &self.args {
            arg.name.hash(state);
            arg.ty.hash(state);
        }
    }
}

impl PartialOrd for MethodKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Name, then argument count, then argument types, then argument names.
impl Ord for MethodKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(&other.name)
            .then_with(|| self.args.len().cmp(&other.args.len()))
            .then_with(|| self.args.iter().map(|a| &a.ty).cmp(other.args.iter().map(|a| &a.ty)))
            .then_with(|| self.args.iter().map(|a| &a.name).cmp(other.args.iter().map(|a| &a.name)))
    }
}

impl fmt::Display for MethodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", arg.name, arg.ty)?;
            if let Some(default) = &arg.default {
                write!(f, " = {default}")?;
            }
        }
        f.write_str(")")
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Docstrings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub methods: BTreeMap<String, String>,
}

pub type Methods = BTreeMap<MethodKey, Option<TypeTerm>>;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Description {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Immediate bases only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parents: Option<Vec<TypeTerm>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default)]
    pub attrs: BTreeMap<String, TypeTerm>,
    /// Return type per overload; `None` marks a constructor or destructor.
    #[serde(default, with = "method_entries")]
    pub methods: Methods,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docstrings: Option<Docstrings>,
    /// Backend fragments, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<IndexMap<String, serde_json::Value>>,
}

impl Description {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: Some(name.into()), ..Self::default() }
    }

    /// Insert or replace an overload. A replaced entry's key is swapped too,
    /// so the newest default values survive.
    pub fn insert_method(&mut self, key: MethodKey, returns: Option<TypeTerm>) {
        self.methods.remove(&key);
        self.methods.insert(key, returns);
    }

    pub fn name_str(&self) -> Result<&str> {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => Ok(name),
            Some(_) => Err(ApiGenError::invalid("class name is empty")),
            None => Err(ApiGenError::invalid("class name is missing")),
        }
    }

    /// Checks that hold for partial descriptions too: nothing present may be
    /// empty, and defaults must form a trailing run.
    pub fn validate_partial(&self) -> Result<()> {
        if self.name.as_deref() == Some("") {
            return Err(ApiGenError::invalid("class name is empty"));
        }
        if self.attrs.keys().any(|name| name.is_empty()) {
            return Err(ApiGenError::invalid("attribute with empty name"));
        }
        for key in self.methods.keys() {
            if key.name.is_empty() {
                return Err(ApiGenError::invalid("method with empty name"));
            }
            let trailing = key.first_defaulted();
            if key.args[..trailing].iter().any(|arg| arg.default.is_some()) {
                return Err(ApiGenError::invalid(format!(
                    "`{key}` has a defaulted argument followed by a mandatory one"
                )));
            }
        }
        Ok(())
    }

    /// Full well-formedness: partial checks plus a non-empty name.
    pub fn validate(&self) -> Result<()> {
        self.name_str()?;
        self.validate_partial()
    }

    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.as_ref()?.get(key)?.as_str()
    }
}

/// `methods` travels as a list of `{name, args, returns}` entries since JSON
/// object keys cannot hold a structured key.
mod method_entries {
    use super::{Argument, MethodKey, Methods};
    use crate::types::TypeTerm;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize)]
    struct EntryRef<'a> {
        name: &'a str,
        args: &'a [Argument],
        returns: &'a Option<TypeTerm>,
    }

    #[derive(Deserialize)]
    struct Entry {
        name: String,
        #[serde(default)]
        args: Vec<Argument>,
        #[serde(default)]
        returns: Option<TypeTerm>,
    }

    pub fn serialize<S: Serializer>(methods: &Methods, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(methods.iter().map(|(key, returns)| EntryRef {
            name: &key.name,
            args: &key.args,
            returns,
        }))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Methods, D::Error> {
        let entries = Vec::<Entry>::deserialize(deserializer)?;
        let mut methods = Methods::new();
        for entry in entries {
            let key = MethodKey::new(entry.name, entry.args);
            methods.remove(&key);
            methods.insert(key, entry.returns);
        }
        Ok(methods)
    }
}
