//! Recursive type algebra for C++ types.
//!
//! A [`TypeTerm`] is one of three shapes:
//! - an atomic name (`int32`, `float64`, `str`, or an arbitrary class name),
//! - a template instantiation (`map<int32, float64>`),
//! - a refinement wrapping exactly one base term (`int32 *`, `Material &`).
//!
//! Terms are plain values: equality, ordering and hashing are structural, so
//! they can be de-duplicated and sorted without any side table. Classification
//! from AST nodes lives in [`classify`]; the fixed spelling tables in
//! [`catalog`].
pub mod catalog;
pub mod classify;

use std::fmt;
use serde::{Deserialize, Serialize};

pub use catalog::{TemplateRole, TemplateShape};
pub use classify::{classify, TypeClassifier};

/// Canonical atomic name of the string type.
pub const STR: &str = "str";
/// Canonical atomic name of `void`.
pub const VOID: &str = "void";

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeTerm {
    Atomic(String),
    Template {
        #[serde(rename = "template")]
        name: String,
        args: Vec<TypeTerm>,
    },
    Refined {
        refine: Refinement,
        base: Box<TypeTerm>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Refinement {
    Pointer,
    Reference,
}

impl TypeTerm {
    pub fn atomic(name: impl Into<String>) -> Self {
        Self::Atomic(name.into())
    }

    pub fn template(name: impl Into<String>, args: Vec<TypeTerm>) -> Self {
        Self::Template { name: name.into(), args }
    }

    pub fn refined(base: TypeTerm, refine: Refinement) -> Self {
        Self::Refined { refine, base: Box::new(base) }
    }

    pub fn pointer(base: TypeTerm) -> Self {
        Self::refined(base, Refinement::Pointer)
    }

    pub fn reference(base: TypeTerm) -> Self {
        Self::refined(base, Refinement::Reference)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Self::Atomic(name) if name == VOID)
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Self::Refined { refine: Refinement::Pointer, .. })
    }

    /// Innermost term once every refinement is peeled off.
    pub fn strip_refinements(&self) -> &TypeTerm {
        match self {
            Self::Refined { base, .. } => base.strip_refinements(),
            other => other,
        }
    }
}

impl fmt::Display for TypeTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Atomic(name) => f.write_str(name),
            Self::Template { name, args } => {
                write!(f, "{name}<")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(">")
            }
            Self::Refined { refine: Refinement::Pointer, base } => write!(f, "{base} *"),
            Self::Refined { refine: Refinement::Reference, base } => write!(f, "{base} &"),
        }
    }
}

// ------------------------------- Tests ------------------------------------ //
