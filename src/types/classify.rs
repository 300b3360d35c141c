//! AST type node → [`TypeTerm`].
use tracing::{debug, warn};

use super::catalog::{self, TemplateShape, STRING_TEMPLATE};
use super::{TypeTerm, STR};
use crate::ast::{
    dispatch, DerivedTypeNode, EnumerationNode, FundamentalTypeNode, NodeKind, NodeVisitor, RecordNode, Resolver,
    TypedefNode,
};
use crate::error::{ApiGenError, Result};

/// Deeper chains than this are treated as unclassifiable (cyclic typedefs).
const MAX_TYPE_DEPTH: usize = 64;

/// Classify the type node `id`. `Ok(None)` means the node is not a type the
/// algebra can express (function types, unknown kinds); callers drop
/// whatever depended on it.
pub fn classify(resolver: &Resolver<'_>, id: &str) -> Result<Option<TypeTerm>> {
    TypeClassifier::new(resolver).classify_id(id, 0)
}

pub struct TypeClassifier<'r, 'doc> {
    resolver: &'r Resolver<'doc>,
}

impl<'r, 'doc> TypeClassifier<'r, 'doc> {
    pub fn new(resolver: &'r Resolver<'doc>) -> Self {
        Self { resolver }
    }

    pub fn classify_id(&mut self, id: &str, depth: usize) -> Result<Option<TypeTerm>> {
        if depth > MAX_TYPE_DEPTH {
            warn!("type chain through `{id}` exceeds {MAX_TYPE_DEPTH} levels; giving up");
            return Ok(None);
        }
        let node = self.resolver.resolve(id)?;
        debug!("{:indent$}{} {}: {}", "", node.kind.tag(), id, node.name().unwrap_or(""), indent = depth * 2);
        dispatch(self, node, depth + 1)
    }

    /// Resolve `map<int, double>`-style records through their synthetic members:
    /// the constructor names the template, role typedefs name the arguments.
    fn classify_instantiation(&mut self, record: &'doc RecordNode, depth: usize) -> Result<TypeTerm> {
        let members = self.resolver.members(record)?;
        let base = catalog::template_base_name(&record.name);
        let template = members
            .iter()
            .find_map(|member| match &member.kind {
                NodeKind::Constructor(ctor) if ctor.name == base => Some(ctor.name.as_str()),
                _ => None,
            })
            .ok_or_else(|| {
                ApiGenError::malformed_template(&record.name, format!("no synthetic `{base}` constructor"))
            })?;

        if template == STRING_TEMPLATE {
            return Ok(TypeTerm::atomic(STR));
        }

        match catalog::template_shape(template) {
            TemplateShape::Opaque => {
                debug!("template `{template}` is not catalogued; keeping `{}` opaque", record.name);
                Ok(TypeTerm::atomic(record.name.clone()))
            }
            TemplateShape::Known(roles) => {
                let mut args = Vec::with_capacity(roles.len());
                for role in roles {
                    let role_name = role.member_name();
                    let member = members
                        .iter()
                        .find(|member| member.name() == Some(role_name))
                        .ok_or_else(|| {
                            ApiGenError::malformed_template(&record.name, format!("missing `{role_name}` member"))
                        })?;
                    let arg = self.classify_id(&member.id, depth)?.ok_or_else(|| {
                        ApiGenError::malformed_template(&record.name, format!("`{role_name}` does not name a type"))
                    })?;
                    args.push(arg);
                }
                Ok(TypeTerm::template(template, args))
            }
        }
    }
}

impl<'r, 'doc> NodeVisitor<'doc> for TypeClassifier<'r, 'doc> {
    type Context = usize;
    type Output = TypeTerm;

    fn visit_fundamental_type(&mut self, _id: &'doc str, node: &'doc FundamentalTypeNode, _depth: usize) -> Result<Option<TypeTerm>> {
        catalog::canonical_primitive(&node.name)
            .map(|name| Some(TypeTerm::atomic(name)))
            .ok_or_else(|| ApiGenError::UnknownPrimitiveType(node.name.clone()))
    }

    fn visit_pointer_type(&mut self, _id: &'doc str, node: &'doc DerivedTypeNode, depth: usize) -> Result<Option<TypeTerm>> {
        Ok(self.classify_id(&node.ty, depth)?.map(TypeTerm::pointer))
    }

    fn visit_array_type(&mut self, _id: &'doc str, node: &'doc DerivedTypeNode, depth: usize) -> Result<Option<TypeTerm>> {
        // Extents are not carried; an array decays to a pointer.
        Ok(self.classify_id(&node.ty, depth)?.map(TypeTerm::pointer))
    }

    fn visit_reference_type(&mut self, _id: &'doc str, node: &'doc DerivedTypeNode, depth: usize) -> Result<Option<TypeTerm>> {
        Ok(self.classify_id(&node.ty, depth)?.map(TypeTerm::reference))
    }

    fn visit_cv_qualified_type(&mut self, _id: &'doc str, node: &'doc DerivedTypeNode, depth: usize) -> Result<Option<TypeTerm>> {
        self.classify_id(&node.ty, depth)
    }

    fn visit_typedef(&mut self, _id: &'doc str, node: &'doc TypedefNode, depth: usize) -> Result<Option<TypeTerm>> {
        if node.name == "string" {
            return Ok(Some(TypeTerm::atomic(STR)));
        }
        self.classify_id(&node.ty, depth)
    }

    fn visit_class(&mut self, _id: &'doc str, node: &'doc RecordNode, depth: usize) -> Result<Option<TypeTerm>> {
        if catalog::is_instantiation_spelling(&node.name) {
            return self.classify_instantiation(node, depth).map(Some);
        }
        Ok(Some(TypeTerm::atomic(node.name.clone())))
    }

    fn visit_enumeration(&mut self, _id: &'doc str, node: &'doc EnumerationNode, _depth: usize) -> Result<Option<TypeTerm>> {
        Ok(Some(TypeTerm::atomic(node.name.clone())))
    }
}
