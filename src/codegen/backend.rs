//! The rendering-backend seam: everything language-specific lives behind
//! [`Backend`].
use std::collections::BTreeSet;

use crate::desc::{Description, MethodKey};
use crate::types::TypeTerm;

/// One import a rendered type needs.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Import {
    pub module: String,
    pub symbol: Option<String>,
    pub alias: Option<String>,
}

impl Import {
    pub fn module(module: impl Into<String>) -> Self {
        Self { module: module.into(), symbol: None, alias: None }
    }

    pub fn symbol(module: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self { module: module.into(), symbol: Some(symbol.into()), alias: None }
    }

    pub fn aliased(module: impl Into<String>, symbol: impl Into<String>, alias: impl Into<String>) -> Self {
        Self { module: module.into(), symbol: Some(symbol.into()), alias: Some(alias.into()) }
    }

    /// Whether this import binds `name` in the importing module.
    pub fn provides(&self, name: &str) -> bool {
        match (&self.symbol, &self.alias) {
            (_, Some(alias)) => alias == name,
            (Some(symbol), None) => symbol == name,
            (None, None) => false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArtifactKind {
    /// Foreign declarations of the C++ class.
    Header,
    /// Declaration of the wrapper class.
    Declaration,
    /// Wrapper implementation.
    Implementation,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedAttr {
    pub name: String,
    pub ty: TypeTerm,
    pub type_text: String,
    pub line: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedSignature {
    pub key: MethodKey,
    pub returns: Option<TypeTerm>,
    pub arg_types: Vec<String>,
    pub line: String,
}

/// Everything a backend template may draw on. Lines are already sorted and
/// imports already de-duplicated.
#[derive(Clone, Debug)]
pub struct RenderContext<'d> {
    pub desc: &'d Description,
    pub name: &'d str,
    pub namespace: Option<&'d str>,
    pub parents: &'d [TypeTerm],
    pub header_filename: String,
    pub attrs: Vec<RenderedAttr>,
    /// Constructors and destructors.
    pub constructors: Vec<RenderedSignature>,
    pub methods: Vec<RenderedSignature>,
    pub imports: Vec<String>,
}

impl RenderContext<'_> {
    pub fn attr_lines(&self) -> Vec<String> {
        self.attrs.iter().map(|attr| attr.line.clone()).collect()
    }

    pub fn constructor_lines(&self) -> Vec<String> {
        self.constructors.iter().map(|sig| sig.line.clone()).collect()
    }

    pub fn method_lines(&self) -> Vec<String> {
        self.methods.iter().map(|sig| sig.line.clone()).collect()
    }
}

pub trait Backend: Send + Sync {
    /// Spell a type term in the target language. Total over the algebra.
    fn render_type(&self, term: &TypeTerm) -> String;

    /// Imports needed to use `term`; composite terms union their parts.
    fn imports_for(&self, term: &TypeTerm) -> BTreeSet<Import>;

    fn render_import(&self, import: &Import) -> String;

    fn render_attr(&self, name: &str, type_text: &str) -> String;

    /// `returns` is `None` for constructors and destructors.
    fn render_signature(
        &self,
        name: &str,
        arg_types: &[String],
        returns: Option<&str>,
        exception_marker: Option<&str>,
    ) -> String;

    fn file_name(&self, kind: ArtifactKind, class_name: &str) -> String;

    fn render_header(&self, cx: &RenderContext<'_>) -> String;

    fn render_declaration(&self, cx: &RenderContext<'_>) -> String;

    fn render_implementation(&self, cx: &RenderContext<'_>) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provided_names() {
        assert!(Import::symbol("cpp_toaster", "Toaster").provides("Toaster"));
        assert!(!Import::aliased("libcpp.string", "string", "std_string").provides("string"));
        assert!(Import::aliased("libcpp.string", "string", "std_string").provides("std_string"));
        assert!(!Import::module("cpp_toaster").provides("cpp_toaster"));
    }
}
