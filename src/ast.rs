//! AST document model and node resolution.
//!
//! The document is a flat list of id-addressed nodes produced by an external
//! C++ parser. Node kinds form a closed union; anything the describer has no
//! use for deserializes to [`NodeKind::Unknown`] and is skipped by
//! [`dispatch`].
use std::collections::BTreeSet;
use indexmap::IndexMap;
use serde::Deserialize;
use tracing::{trace, warn};

use crate::error::{ApiGenError, Result};

pub type NodeId = String;

// ————————————————————————————————————————————————————————————————————————————
// DOCUMENT
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AstDocument {
    #[serde(default)]
    pub nodes: Vec<AstNode>,
}

impl AstDocument {
    /// Whether some `File` node has this name or id.
    pub fn has_file(&self, name_or_id: &str) -> bool {
        self.nodes
            .iter()
            .any(|node| matches!(&node.kind, NodeKind::File(file) if file.name == name_or_id || node.id == name_or_id))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AstNode {
    pub id: NodeId,
    #[serde(flatten)]
    pub kind: NodeKind,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind")]
pub enum NodeKind {
    Namespace(NamespaceNode),
    File(FileNode),
    Class(RecordNode),
    Struct(RecordNode),
    Field(FieldNode),
    Constructor(FunctionNode),
    Destructor(FunctionNode),
    Method(FunctionNode),
    Typedef(TypedefNode),
    FundamentalType(FundamentalTypeNode),
    PointerType(DerivedTypeNode),
    ReferenceType(DerivedTypeNode),
    ArrayType(DerivedTypeNode),
    CvQualifiedType(DerivedTypeNode),
    Enumeration(EnumerationNode),
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    Public,
    Protected,
    Private,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamespaceNode {
    pub name: String,
    #[serde(default)]
    pub context: Option<NodeId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileNode {
    pub name: String,
}

/// A class or struct.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordNode {
    pub name: String,
    #[serde(default)]
    pub context: Option<NodeId>,
    #[serde(default)]
    pub file: Option<NodeId>,
    #[serde(default)]
    pub access: Option<Access>,
    #[serde(default)]
    pub members: Vec<NodeId>,
    #[serde(default)]
    pub bases: Vec<NodeId>,
    /// Forward declarations carry no members.
    #[serde(default)]
    pub incomplete: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldNode {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: NodeId,
    pub context: NodeId,
    #[serde(default)]
    pub access: Option<Access>,
    #[serde(default)]
    pub file: Option<NodeId>,
}

/// Constructor, destructor or method.
#[derive(Debug, Clone, Deserialize)]
pub struct FunctionNode {
    pub name: String,
    #[serde(default)]
    pub context: Option<NodeId>,
    #[serde(default)]
    pub access: Option<Access>,
    #[serde(default)]
    pub returns: Option<NodeId>,
    #[serde(default)]
    pub arguments: Vec<ArgumentNode>,
    #[serde(default)]
    pub file: Option<NodeId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArgumentNode {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub ty: NodeId,
    #[serde(default)]
    pub default: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TypedefNode {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: NodeId,
    #[serde(default)]
    pub context: Option<NodeId>,
    #[serde(default)]
    pub access: Option<Access>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FundamentalTypeNode {
    pub name: String,
}

/// Pointer, reference, array and cv-qualified types all wrap one base type.
#[derive(Debug, Clone, Deserialize)]
pub struct DerivedTypeNode {
    #[serde(rename = "type")]
    pub ty: NodeId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnumerationNode {
    pub name: String,
    #[serde(default)]
    pub context: Option<NodeId>,
    #[serde(default)]
    pub access: Option<Access>,
}

impl NodeKind {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Namespace(_) => "Namespace",
            Self::File(_) => "File",
            Self::Class(_) => "Class",
            Self::Struct(_) => "Struct",
            Self::Field(_) => "Field",
            Self::Constructor(_) => "Constructor",
            Self::Destructor(_) => "Destructor",
            Self::Method(_) => "Method",
            Self::Typedef(_) => "Typedef",
            Self::FundamentalType(_) => "FundamentalType",
            Self::PointerType(_) => "PointerType",
            Self::ReferenceType(_) => "ReferenceType",
            Self::ArrayType(_) => "ArrayType",
            Self::CvQualifiedType(_) => "CvQualifiedType",
            Self::Enumeration(_) => "Enumeration",
            Self::Unknown => "Unknown",
        }
    }
}

impl AstNode {
    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Namespace(n) => Some(&n.name),
            NodeKind::File(n) => Some(&n.name),
            NodeKind::Class(n) | NodeKind::Struct(n) => Some(&n.name),
            NodeKind::Field(n) => Some(&n.name),
            NodeKind::Constructor(n) | NodeKind::Destructor(n) | NodeKind::Method(n) => Some(&n.name),
            NodeKind::Typedef(n) => Some(&n.name),
            NodeKind::FundamentalType(n) => Some(&n.name),
            NodeKind::Enumeration(n) => Some(&n.name),
            NodeKind::PointerType(_)
            | NodeKind::ReferenceType(_)
            | NodeKind::ArrayType(_)
            | NodeKind::CvQualifiedType(_)
            | NodeKind::Unknown => None,
        }
    }

    pub fn access(&self) -> Option<Access> {
        match &self.kind {
            NodeKind::Class(n) | NodeKind::Struct(n) => n.access,
            NodeKind::Field(n) => n.access,
            NodeKind::Constructor(n) | NodeKind::Destructor(n) | NodeKind::Method(n) => n.access,
            NodeKind::Typedef(n) => n.access,
            NodeKind::Enumeration(n) => n.access,
            _ => None,
        }
    }

    pub fn file(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Class(n) | NodeKind::Struct(n) => n.file.as_deref(),
            NodeKind::Field(n) => n.file.as_deref(),
            NodeKind::Constructor(n) | NodeKind::Destructor(n) | NodeKind::Method(n) => n.file.as_deref(),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&RecordNode> {
        match &self.kind {
            NodeKind::Class(n) | NodeKind::Struct(n) => Some(n),
            _ => None,
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// VISITOR
// ————————————————————————————————————————————————————————————————————————————

/// Per-kind visitor. Every method defaults to "no contribution"; implementers
/// override only the kinds they care about and [`dispatch`] routes to them.
///
/// `Context` is threaded by value through recursive calls, so visitors never
/// keep traversal state in fields.
pub trait NodeVisitor<'doc> {
    type Context: Copy;
    type Output;

    fn visit_namespace(&mut self, _id: &'doc str, _node: &'doc NamespaceNode, _cx: Self::Context) -> Result<Option<Self::Output>> {
        Ok(None)
    }
    fn visit_file(&mut self, _id: &'doc str, _node: &'doc FileNode, _cx: Self::Context) -> Result<Option<Self::Output>> {
        Ok(None)
    }
    fn visit_class(&mut self, _id: &'doc str, _node: &'doc RecordNode, _cx: Self::Context) -> Result<Option<Self::Output>> {
        Ok(None)
    }
    fn visit_struct(&mut self, id: &'doc str, node: &'doc RecordNode, cx: Self::Context) -> Result<Option<Self::Output>> {
        self.visit_class(id, node, cx)
    }
    fn visit_field(&mut self, _id: &'doc str, _node: &'doc FieldNode, _cx: Self::Context) -> Result<Option<Self::Output>> {
        Ok(None)
    }
    fn visit_constructor(&mut self, _id: &'doc str, _node: &'doc FunctionNode, _cx: Self::Context) -> Result<Option<Self::Output>> {
        Ok(None)
    }
    fn visit_destructor(&mut self, _id: &'doc str, _node: &'doc FunctionNode, _cx: Self::Context) -> Result<Option<Self::Output>> {
        Ok(None)
    }
    fn visit_method(&mut self, _id: &'doc str, _node: &'doc FunctionNode, _cx: Self::Context) -> Result<Option<Self::Output>> {
        Ok(None)
    }
    fn visit_typedef(&mut self, _id: &'doc str, _node: &'doc TypedefNode, _cx: Self::Context) -> Result<Option<Self::Output>> {
        Ok(None)
    }
    fn visit_fundamental_type(&mut self, _id: &'doc str, _node: &'doc FundamentalTypeNode, _cx: Self::Context) -> Result<Option<Self::Output>> {
        Ok(None)
    }
    fn visit_pointer_type(&mut self, _id: &'doc str, _node: &'doc DerivedTypeNode, _cx: Self::Context) -> Result<Option<Self::Output>> {
        Ok(None)
    }
    fn visit_reference_type(&mut self, _id: &'doc str, _node: &'doc DerivedTypeNode, _cx: Self::Context) -> Result<Option<Self::Output>> {
        Ok(None)
    }
    fn visit_array_type(&mut self, _id: &'doc str, _node: &'doc DerivedTypeNode, _cx: Self::Context) -> Result<Option<Self::Output>> {
        Ok(None)
    }
    fn visit_cv_qualified_type(&mut self, _id: &'doc str, _node: &'doc DerivedTypeNode, _cx: Self::Context) -> Result<Option<Self::Output>> {
        Ok(None)
    }
    fn visit_enumeration(&mut self, _id: &'doc str, _node: &'doc EnumerationNode, _cx: Self::Context) -> Result<Option<Self::Output>> {
        Ok(None)
    }
}

/// Route a node to the visitor method for its kind.
pub fn dispatch<'doc, V>(visitor: &mut V, node: &'doc AstNode, cx: V::Context) -> Result<Option<V::Output>>
where
    V: NodeVisitor<'doc> + ?Sized,
{
    let id = node.id.as_str();
    match &node.kind {
        NodeKind::Namespace(n) => visitor.visit_namespace(id, n, cx),
        NodeKind::File(n) => visitor.visit_file(id, n, cx),
        NodeKind::Class(n) => visitor.visit_class(id, n, cx),
        NodeKind::Struct(n) => visitor.visit_struct(id, n, cx),
        NodeKind::Field(n) => visitor.visit_field(id, n, cx),
        NodeKind::Constructor(n) => visitor.visit_constructor(id, n, cx),
        NodeKind::Destructor(n) => visitor.visit_destructor(id, n, cx),
        NodeKind::Method(n) => visitor.visit_method(id, n, cx),
        NodeKind::Typedef(n) => visitor.visit_typedef(id, n, cx),
        NodeKind::FundamentalType(n) => visitor.visit_fundamental_type(id, n, cx),
        NodeKind::PointerType(n) => visitor.visit_pointer_type(id, n, cx),
        NodeKind::ReferenceType(n) => visitor.visit_reference_type(id, n, cx),
        NodeKind::ArrayType(n) => visitor.visit_array_type(id, n, cx),
        NodeKind::CvQualifiedType(n) => visitor.visit_cv_qualified_type(id, n, cx),
        NodeKind::Enumeration(n) => visitor.visit_enumeration(id, n, cx),
        NodeKind::Unknown => {
            trace!("skipping node {id} of unrecognized kind");
            Ok(None)
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// RESOLVER
// ————————————————————————————————————————————————————————————————————————————

/// Id index over one document, optionally restricted to a set of origin files.
#[derive(Debug, Clone)]
pub struct Resolver<'doc> {
    index: IndexMap<&'doc str, &'doc AstNode>,
    only_in: BTreeSet<&'doc str>,
}

impl<'doc> Resolver<'doc> {
    pub fn new(document: &'doc AstDocument) -> Self {
        let mut index = IndexMap::with_capacity(document.nodes.len());
        for node in &document.nodes {
            if index.contains_key(node.id.as_str()) {
                warn!("duplicate node id `{}`; keeping the first occurrence", node.id);
                continue;
            }
            index.insert(node.id.as_str(), node);
        }
        Self { index, only_in: BTreeSet::new() }
    }

    /// Restrict class lookup to the given files. Entries may be file names or
    /// file node ids. An empty set leaves lookup unrestricted.
    pub fn restricted_to<I, S>(mut self, files: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for entry in files {
            let entry = entry.as_ref();
            let id = self
                .index
                .values()
                .find_map(|&node| match &node.kind {
                    NodeKind::File(file) if file.name == entry || node.id == entry => Some(node.id.as_str()),
                    _ => None,
                })
                .ok_or_else(|| ApiGenError::UnknownOriginFile(entry.to_string()))?;
            self.only_in.insert(id);
        }
        Ok(self)
    }

    pub fn resolve(&self, id: &str) -> Result<&'doc AstNode> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| ApiGenError::UnresolvedReference(id.to_string()))
    }

    pub fn is_restricted(&self) -> bool {
        !self.only_in.is_empty()
    }

    /// Whether a node originates from one of the allowed files.
    pub fn in_scope(&self, node: &AstNode) -> bool {
        if self.only_in.is_empty() {
            return true;
        }
        node.file().is_some_and(|file| self.only_in.contains(file))
    }

    /// Complete class/struct definitions with the given name, in document order.
    pub fn records_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'doc AstNode> + 'a {
        self.index.values().copied().filter(move |node| {
            node.as_record().is_some_and(|record| record.name == name && !record.incomplete)
        })
    }

    pub fn members(&self, record: &'doc RecordNode) -> Result<Vec<&'doc AstNode>> {
        record.members.iter().map(|id| self.resolve(id)).collect()
    }

    /// Members declared `public`; everything else is filtered before dispatch.
    pub fn public_members(&self, record: &'doc RecordNode) -> Result<Vec<&'doc AstNode>> {
        let mut out = self.members(record)?;
        out.retain(|node| node.access() == Some(Access::Public));
        Ok(out)
    }

    /// Walk the enclosing-context chain from `context`, joining namespace
    /// names outermost first. The global namespace `::` is not part of the path.
    pub fn namespace_path(&self, context: Option<&str>) -> Result<Option<String>> {
        let mut segments = Vec::new();
        let mut next = context;
        let mut steps = 0;
        while let Some(id) = next {
            steps += 1;
            if steps > self.index.len() {
                break; // cyclic context chain
            }
            let node = self.resolve(id)?;
            next = match &node.kind {
                NodeKind::Namespace(ns) => {
                    if ns.name != "::" && !ns.name.is_empty() {
                        segments.push(ns.name.as_str());
                    }
                    ns.context.as_deref()
                }
                NodeKind::Class(record) | NodeKind::Struct(record) => record.context.as_deref(),
                _ => None,
            };
        }
        if segments.is_empty() {
            return Ok(None);
        }
        segments.reverse();
        Ok(Some(segments.join("::")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document() -> AstDocument {
        serde_json::from_value(json!({
            "nodes": [
                {"id": "_1", "kind": "Namespace", "name": "::"},
                {"id": "_2", "kind": "Namespace", "name": "pyne", "context": "_1"},
                {"id": "_3", "kind": "Namespace", "name": "bright", "context": "_2"},
                {"id": "f1", "kind": "File", "name": "Toaster.h"},
                {"id": "f2", "kind": "File", "name": "other.h"},
                {"id": "_10", "kind": "Class", "name": "Toaster", "context": "_3", "file": "f1",
                 "members": ["_11", "_12", "_13"]},
                {"id": "_11", "kind": "Field", "name": "rate", "type": "_20", "context": "_10", "access": "public"},
                {"id": "_12", "kind": "Field", "name": "secret", "type": "_20", "context": "_10", "access": "private"},
                {"id": "_13", "kind": "OperatorMethod", "name": "=", "access": "public"},
                {"id": "_20", "kind": "FundamentalType", "name": "double"},
                {"id": "_20", "kind": "FundamentalType", "name": "int"}
            ]
        }))
        .unwrap()
    }

    struct Names;

    impl<'doc> NodeVisitor<'doc> for Names {
        type Context = ();
        type Output = &'doc str;

        fn visit_field(&mut self, _id: &'doc str, node: &'doc FieldNode, _cx: ()) -> Result<Option<&'doc str>> {
            Ok(Some(node.name.as_str()))
        }
    }

    #[test]
    fn unknown_kinds_deserialize_and_are_skipped() {
        let doc = document();
        let resolver = Resolver::new(&doc);
        let op = resolver.resolve("_13").unwrap();
        assert!(matches!(op.kind, NodeKind::Unknown));
        assert_eq!(dispatch(&mut Names, op, ()).unwrap(), None);
        let field = resolver.resolve("_11").unwrap();
        assert_eq!(dispatch(&mut Names, field, ()).unwrap(), Some("rate"));
    }

    #[test]
    fn resolve_missing_and_duplicate_ids() {
        let doc = document();
        let resolver = Resolver::new(&doc);
        assert!(matches!(resolver.resolve("_99"), Err(ApiGenError::UnresolvedReference(id)) if id == "_99"));
        assert_eq!(resolver.resolve("_20").unwrap().name(), Some("double"));
    }

    #[test]
    fn public_members_only() {
        let doc = document();
        let resolver = Resolver::new(&doc);
        let class = resolver.resolve("_10").unwrap().as_record().unwrap();
        let names: Vec<_> = resolver
            .public_members(class)
            .unwrap()
            .iter()
            .filter_map(|n| n.name())
            .collect();
        assert_eq!(names, vec!["rate"]);
    }

    #[test]
    fn only_in_restriction() {
        let doc = document();
        let resolver = Resolver::new(&doc).restricted_to(["other.h"]).unwrap();
        let class = resolver.resolve("_10").unwrap();
        assert!(!resolver.in_scope(class));
        let resolver = Resolver::new(&doc).restricted_to(["f1"]).unwrap();
        assert!(resolver.in_scope(class));
        assert!(matches!(
            Resolver::new(&doc).restricted_to(["missing.h"]),
            Err(ApiGenError::UnknownOriginFile(_))
        ));
    }

    #[test]
    fn namespace_chain() {
        let doc = document();
        let resolver = Resolver::new(&doc);
        assert_eq!(resolver.namespace_path(Some("_3")).unwrap().as_deref(), Some("pyne::bright"));
        assert_eq!(resolver.namespace_path(Some("_1")).unwrap(), None);
        assert_eq!(resolver.namespace_path(None).unwrap(), None);
    }
}
