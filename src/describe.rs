//! Class describer: one depth-first walk over a class node and its public
//! members, producing a [`Description`].
//!
//! Traversal context (current class, current function, depth) travels in a
//! [`Frame`] passed by value; the only mutable state is the description being
//! filled in, owned by a describer that lives for a single call.
use tracing::{debug, trace, warn};

use crate::ast::{dispatch, ArgumentNode, AstDocument, AstNode, FieldNode, FunctionNode, NodeVisitor, RecordNode, Resolver};
use crate::desc::{Argument, Description, MethodKey};
use crate::error::{ApiGenError, Result};
use crate::types::{catalog, TypeClassifier, TypeTerm, VOID};

/// Describe the class or struct `class_name`, looking only at definitions
/// that originate from `only_in` (file names or file ids; empty = anywhere).
pub fn describe<S: AsRef<str>>(document: &AstDocument, class_name: &str, only_in: &[S]) -> Result<Description> {
    let resolver = Resolver::new(document).restricted_to(only_in)?;
    let target = locate(&resolver, class_name)?;
    let mut describer = ClassDescriber::new(&resolver, &target.id, class_name);
    dispatch(&mut describer, target, Frame::root())?;
    Ok(describer.desc)
}

fn locate<'doc>(resolver: &Resolver<'doc>, class_name: &str) -> Result<&'doc AstNode> {
    let candidates: Vec<&AstNode> = resolver.records_named(class_name).collect();
    if candidates.is_empty() {
        return Err(ApiGenError::ClassNotFound(class_name.to_string()));
    }
    let in_scope: Vec<&AstNode> = candidates.into_iter().filter(|node| resolver.in_scope(node)).collect();
    match in_scope.as_slice() {
        [node] => Ok(*node),
        _ => Err(ApiGenError::AmbiguousOrigin {
            class: class_name.to_string(),
            matches: in_scope.len(),
        }),
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Frame<'doc> {
    pub depth: usize,
    pub class: Option<&'doc str>,
    pub function: Option<&'doc str>,
}

impl<'doc> Frame<'doc> {
    pub fn root() -> Self {
        Self::default()
    }

    fn descend(self) -> Self {
        Self { depth: self.depth + 1, ..self }
    }

    fn in_class(self, name: &'doc str) -> Self {
        Self { class: Some(name), function: None, ..self }
    }

    fn in_function(self, name: &'doc str) -> Self {
        Self { function: Some(name), ..self }
    }

    fn scope(&self) -> String {
        match (self.class, self.function) {
            (Some(class), Some(function)) => format!("{class}::{function}"),
            (Some(class), None) => class.to_string(),
            (None, Some(function)) => function.to_string(),
            (None, None) => String::new(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FunctionKind {
    Constructor,
    Destructor,
    Method,
}

struct ClassDescriber<'r, 'doc> {
    resolver: &'r Resolver<'doc>,
    target_id: &'doc str,
    desc: Description,
}

impl<'r, 'doc> ClassDescriber<'r, 'doc> {
    fn new(resolver: &'r Resolver<'doc>, target_id: &'doc str, class_name: &str) -> Self {
        Self { resolver, target_id, desc: Description::named(class_name) }
    }

    fn classify(&self, id: &str, frame: Frame<'doc>) -> Result<Option<TypeTerm>> {
        TypeClassifier::new(self.resolver).classify_id(id, frame.depth)
    }

    fn log(&self, frame: Frame<'doc>, kind: &str, id: &str, name: &str) {
        debug!("{:indent$}{kind} {id}: {name}", "", indent = frame.depth * 2);
    }

    fn visit_function(
        &mut self,
        kind: FunctionKind,
        node: &'doc FunctionNode,
        frame: Frame<'doc>,
    ) -> Result<Option<()>> {
        if node.name.starts_with('_') {
            trace!("skipping private-by-convention function `{}`", node.name);
            return Ok(None);
        }
        let frame = frame.in_function(&node.name);

        let mut args = Vec::with_capacity(node.arguments.len());
        for arg in &node.arguments {
            match self.visit_argument(arg, frame.descend())? {
                Some(arg) => args.push(arg),
                None => {
                    warn!("dropping `{}`: signature has an unnamed or inexpressible parameter", frame.scope());
                    return Ok(None);
                }
            }
        }

        let (name, returns) = match kind {
            FunctionKind::Constructor => (node.name.clone(), None),
            FunctionKind::Destructor => (destructor_name(&node.name), None),
            FunctionKind::Method => {
                let returns = match node.returns.as_deref() {
                    Some(id) => match self.classify(id, frame)? {
                        Some(term) => term,
                        None => {
                            warn!("dropping `{}`: return type is not expressible", frame.scope());
                            return Ok(None);
                        }
                    },
                    None => TypeTerm::atomic(VOID),
                };
                (node.name.clone(), Some(returns))
            }
        };

        self.desc.insert_method(MethodKey::new(name, args), returns);
        Ok(Some(()))
    }

    /// `None` when the parameter cannot be recorded, which invalidates the
    /// whole signature. Unnamed parameters are compiler-made; their type is
    /// never looked at.
    fn visit_argument(&self, node: &'doc ArgumentNode, frame: Frame<'doc>) -> Result<Option<Argument>> {
        let name = node.name.as_deref().unwrap_or("");
        self.log(frame, "Argument", &node.ty, name);
        if name.is_empty() {
            return Ok(None);
        }
        let Some(ty) = self.classify(&node.ty, frame)? else {
            return Ok(None);
        };
        Ok(Some(Argument {
            name: name.to_string(),
            ty,
            default: node.default.clone(),
        }))
    }
}

impl<'r, 'doc> NodeVisitor<'doc> for ClassDescriber<'r, 'doc> {
    type Context = Frame<'doc>;
    type Output = ();

    fn visit_class(&mut self, id: &'doc str, node: &'doc RecordNode, frame: Frame<'doc>) -> Result<Option<()>> {
        if id != self.target_id {
            trace!("nested record `{}` contributes nothing", node.name);
            return Ok(None);
        }
        self.log(frame, "Class", id, &node.name);
        let frame = frame.in_class(&node.name);

        let mut parents = Vec::with_capacity(node.bases.len());
        for base in &node.bases {
            match self.classify(base, frame.descend())? {
                Some(term) => parents.push(term),
                None => debug!("base `{base}` of `{}` is not expressible; skipped", node.name),
            }
        }
        self.desc.parents = Some(parents);
        self.desc.namespace = self.resolver.namespace_path(node.context.as_deref())?;

        if catalog::is_instantiation_spelling(&node.name) {
            let term = self.classify(id, frame)?;
            debug!("`{}` instantiates {:?}", node.name, term);
        }

        for member in self.resolver.public_members(node)? {
            dispatch(self, member, frame.descend())?;
        }
        Ok(Some(()))
    }

    fn visit_field(&mut self, id: &'doc str, node: &'doc FieldNode, frame: Frame<'doc>) -> Result<Option<()>> {
        self.log(frame, "Field", id, &node.name);
        if node.context != self.target_id {
            debug!("field `{}` is declared elsewhere; skipped", node.name);
            return Ok(None);
        }
        match self.classify(&node.ty, frame)? {
            Some(term) => {
                self.desc.attrs.insert(node.name.clone(), term);
                Ok(Some(()))
            }
            None => {
                debug!("field `{}` has an inexpressible type; skipped", node.name);
                Ok(None)
            }
        }
    }

    fn visit_constructor(&mut self, id: &'doc str, node: &'doc FunctionNode, frame: Frame<'doc>) -> Result<Option<()>> {
        self.log(frame, "Constructor", id, &node.name);
        self.visit_function(FunctionKind::Constructor, node, frame)
    }

    fn visit_destructor(&mut self, id: &'doc str, node: &'doc FunctionNode, frame: Frame<'doc>) -> Result<Option<()>> {
        self.log(frame, "Destructor", id, &node.name);
        self.visit_function(FunctionKind::Destructor, node, frame)
    }

    fn visit_method(&mut self, id: &'doc str, node: &'doc FunctionNode, frame: Frame<'doc>) -> Result<Option<()>> {
        self.log(frame, "Method", id, &node.name);
        self.visit_function(FunctionKind::Method, node, frame)
    }
}

fn destructor_name(name: &str) -> String {
    if name.starts_with('~') {
        name.to_string()
    } else {
        format!("~{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    /// A trimmed-down parser dump of a `Toaster` class in namespace `bright`.
    fn toaster_nodes() -> Vec<Value> {
        vec![
            json!({"id": "_1", "kind": "Namespace", "name": "::"}),
            json!({"id": "_2", "kind": "Namespace", "name": "bright", "context": "_1"}),
            json!({"id": "f1", "kind": "File", "name": "Toaster.h"}),
            json!({"id": "f2", "kind": "File", "name": "vendor/Toaster.h"}),
            json!({"id": "_base", "kind": "Class", "name": "FCComp", "context": "_2", "file": "f1"}),
            json!({"id": "_10", "kind": "Class", "name": "Toaster", "context": "_2", "file": "f1",
                   "bases": ["_base"],
                   "members": ["_11", "_12", "_13", "_14", "_15", "_16", "_17", "_18", "_19", "_20", "_21", "_22"]}),
            json!({"id": "_11", "kind": "Field", "name": "n_slices", "type": "t_ulong", "context": "_10", "access": "public"}),
            json!({"id": "_12", "kind": "Field", "name": "rate", "type": "t_double", "context": "_10", "access": "public"}),
            json!({"id": "_13", "kind": "Field", "name": "secret", "type": "t_double", "context": "_10", "access": "private"}),
            json!({"id": "_14", "kind": "Field", "name": "name", "type": "t_string", "context": "_base", "access": "public"}),
            json!({"id": "_15", "kind": "Constructor", "name": "Toaster", "access": "public", "context": "_10", "arguments": []}),
            json!({"id": "_16", "kind": "Destructor", "name": "Toaster", "access": "public", "context": "_10"}),
            json!({"id": "_17", "kind": "Method", "name": "write", "access": "public", "context": "_10", "returns": "t_void",
                   "arguments": [{"name": "filename", "type": "t_string", "default": "\"toaster.txt\""}]}),
            json!({"id": "_18", "kind": "Method", "name": "calc", "access": "public", "context": "_10", "returns": "t_mat",
                   "arguments": [{"name": "incomp", "type": "t_map_ref"}]}),
            json!({"id": "_19", "kind": "Method", "name": "calc", "access": "public", "context": "_10", "returns": "t_mat",
                   "arguments": [{"type": "t_int"}, {"name": "n", "type": "t_int"}]}),
            json!({"id": "_20", "kind": "Method", "name": "_hidden", "access": "public", "context": "_10", "returns": "t_void"}),
            json!({"id": "_21", "kind": "OperatorMethod", "name": "=", "access": "public", "context": "_10"}),
            json!({"id": "_22", "kind": "Method", "name": "tick", "access": "protected", "context": "_10", "returns": "t_void"}),
            json!({"id": "t_ulong", "kind": "FundamentalType", "name": "long unsigned int"}),
            json!({"id": "t_double", "kind": "FundamentalType", "name": "double"}),
            json!({"id": "t_int", "kind": "FundamentalType", "name": "int"}),
            json!({"id": "t_void", "kind": "FundamentalType", "name": "void"}),
            json!({"id": "t_string", "kind": "Typedef", "name": "string", "type": "_str"}),
            json!({"id": "_str", "kind": "Class", "name": "basic_string<char>", "members": []}),
            json!({"id": "t_mat", "kind": "Class", "name": "Material", "file": "f2"}),
            json!({"id": "t_map", "kind": "Class", "name": "map<int,double>", "members": ["m1", "m2", "m3"]}),
            json!({"id": "m1", "kind": "Constructor", "name": "map", "access": "public"}),
            json!({"id": "m2", "kind": "Typedef", "name": "key_type", "type": "t_int", "access": "public"}),
            json!({"id": "m3", "kind": "Typedef", "name": "mapped_type", "type": "t_double", "access": "public"}),
            json!({"id": "t_cmap", "kind": "CvQualifiedType", "type": "t_map", "const": "1"}),
            json!({"id": "t_map_ref", "kind": "ReferenceType", "type": "t_cmap"}),
        ]
    }

    fn document(nodes: Vec<Value>) -> AstDocument {
        serde_json::from_value(json!({ "nodes": nodes })).unwrap()
    }

    fn toaster() -> Description {
        describe(&document(toaster_nodes()), "Toaster", &["Toaster.h"]).unwrap()
    }

    #[test]
    fn class_level_facts() {
        let desc = toaster();
        assert_eq!(desc.name.as_deref(), Some("Toaster"));
        assert_eq!(desc.parents, Some(vec![TypeTerm::atomic("FCComp")]));
        assert_eq!(desc.namespace.as_deref(), Some("bright"));
        assert!(desc.validate().is_ok());
    }

    #[test]
    fn public_own_fields_only() {
        let desc = toaster();
        let names: Vec<_> = desc.attrs.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["n_slices", "rate"]);
        assert_eq!(desc.attrs["n_slices"], TypeTerm::atomic("uint64"));
    }

    #[test]
    fn constructors_destructors_and_methods() {
        let desc = toaster();
        assert_eq!(desc.methods.get(&MethodKey::bare("Toaster")), Some(&None));
        assert_eq!(desc.methods.get(&MethodKey::bare("~Toaster")), Some(&None));

        let write = MethodKey::new("write", vec![Argument::new("filename", TypeTerm::atomic("str"))]);
        let (key, returns) = desc.methods.get_key_value(&write).unwrap();
        assert_eq!(key.args[0].default.as_deref(), Some("\"toaster.txt\""));
        assert_eq!(returns, &Some(TypeTerm::atomic(VOID)));

        let calc = MethodKey::new(
            "calc",
            vec![Argument::new(
                "incomp",
                TypeTerm::reference(TypeTerm::template(
                    "map",
                    vec![TypeTerm::atomic("int32"), TypeTerm::atomic("float64")],
                )),
            )],
        );
        assert_eq!(desc.methods.get(&calc), Some(&Some(TypeTerm::atomic("Material"))));
    }

    #[test]
    fn unnamed_parameter_drops_whole_signature() {
        let desc = toaster();
        let calcs: Vec<_> = desc.methods.keys().filter(|k| k.name == "calc").collect();
        assert_eq!(calcs.len(), 1, "calc(int32, <unnamed>) must not be recorded");
        assert_eq!(calcs[0].args.len(), 1);
    }

    #[test]
    fn skipped_members() {
        let desc = toaster();
        assert!(desc.methods.keys().all(|k| k.name != "_hidden" && k.name != "tick" && k.name != "="));
        assert_eq!(desc.methods.len(), 4);
    }

    #[test]
    fn missing_class() {
        let err = describe(&document(toaster_nodes()), "Oven", &["Toaster.h"]).unwrap_err();
        assert!(matches!(err, ApiGenError::ClassNotFound(name) if name == "Oven"));
    }

    #[test]
    fn ambiguous_origin() {
        let mut nodes = toaster_nodes();
        nodes.push(json!({"id": "_dup", "kind": "Class", "name": "Toaster", "file": "f2", "members": []}));
        let doc = document(nodes);

        let err = describe(&doc, "Toaster", &["Toaster.h", "vendor/Toaster.h"]).unwrap_err();
        assert!(matches!(err, ApiGenError::AmbiguousOrigin { matches: 2, .. }));

        // restricting to one origin disambiguates
        assert!(describe(&doc, "Toaster", &["Toaster.h"]).is_ok());

        let err = describe(&doc, "FCComp", &["vendor/Toaster.h"]).unwrap_err();
        assert!(matches!(err, ApiGenError::AmbiguousOrigin { matches: 0, .. }));
    }

    #[test]
    fn forward_declarations_are_ignored() {
        let mut nodes = toaster_nodes();
        nodes.push(json!({"id": "_fwd", "kind": "Class", "name": "Toaster", "file": "f1", "incomplete": true}));
        assert!(describe(&document(nodes), "Toaster", &["Toaster.h"]).is_ok());
    }

    #[test]
    fn dangling_member_reference() {
        let mut nodes = toaster_nodes();
        nodes[5]["members"].as_array_mut().unwrap().push(json!("_404"));
        let err = describe(&document(nodes), "Toaster", &["Toaster.h"]).unwrap_err();
        assert!(matches!(err, ApiGenError::UnresolvedReference(id) if id == "_404"));
    }

    #[test]
    fn unknown_primitive_propagates() {
        let mut nodes = toaster_nodes();
        nodes.push(json!({"id": "t_wide", "kind": "FundamentalType", "name": "wchar_t"}));
        nodes[6]["type"] = json!("t_wide");
        let err = describe(&document(nodes), "Toaster", &["Toaster.h"]).unwrap_err();
        assert!(matches!(err, ApiGenError::UnknownPrimitiveType(name) if name == "wchar_t"));
    }

    #[test]
    fn unnamed_parameter_type_is_never_classified() {
        let mut nodes = toaster_nodes();
        nodes.push(json!({"id": "t_wide", "kind": "FundamentalType", "name": "wchar_t"}));
        nodes.push(json!({"id": "t_bogus", "kind": "Class", "name": "bogus<int>", "members": []}));
        nodes[14]["arguments"] = json!([{"name": "n", "type": "t_int"}, {"type": "t_wide"}]);
        nodes[13]["arguments"] = json!([{"type": "t_bogus"}, {"name": "n", "type": "t_wide"}]);
        nodes[13]["returns"] = json!("t_wide");

        let desc = describe(&document(nodes), "Toaster", &["Toaster.h"]).unwrap();
        assert!(desc.methods.keys().all(|k| k.name != "calc"));
        assert_eq!(desc.methods.len(), 3);
    }

    #[test]
    fn describe_is_deterministic() {
        let doc = document(toaster_nodes());
        let a = serde_json::to_string(&describe(&doc, "Toaster", &["Toaster.h"]).unwrap()).unwrap();
        let b = serde_json::to_string(&describe(&doc, "Toaster", &["Toaster.h"]).unwrap()).unwrap();
        assert_eq!(a, b);
    }
}
