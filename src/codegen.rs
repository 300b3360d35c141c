//! Binding code generation: [`Description`] → three text artifacts.
//!
//! The generator owns ordering and expansion (default arguments, overload
//! sorting, import de-duplication); spelling is delegated to a [`Backend`].
pub mod backend;
pub mod cython;
pub mod template;

use std::collections::BTreeSet;

use tracing::{debug, trace};

pub use backend::{ArtifactKind, Backend, Import, RenderContext, RenderedAttr, RenderedSignature};
pub use cython::CythonBackend;

use crate::desc::{Description, MethodKey, Methods};
use crate::error::Result;
use crate::types::TypeTerm;

/// Exception marker appended to every declared signature unless disabled.
pub const DEFAULT_EXCEPTION_MARKER: &str = "+";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifact {
    pub file_name: String,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifacts {
    pub header: Artifact,
    pub declaration: Artifact,
    pub implementation: Artifact,
}

impl Artifacts {
    pub fn iter(&self) -> impl Iterator<Item = &Artifact> {
        [&self.header, &self.declaration, &self.implementation].into_iter()
    }
}

/// Expand trailing defaults into every legal overload, longest first.
///
/// `k` arguments with the last `d` defaulted yield `d + 1` keys with
/// `k, k-1, .., k-d` arguments. Defaults are stripped from the results.
pub fn expand_default_args(key: &MethodKey) -> Vec<MethodKey> {
    let mandatory = key.first_defaulted();
    (mandatory..=key.args.len())
        .rev()
        .map(|len| {
            let args = key.args[..len]
                .iter()
                .map(|arg| {
                    let mut arg = arg.clone();
                    arg.default = None;
                    arg
                })
                .collect();
            MethodKey::new(key.name.clone(), args)
        })
        .collect()
}

/// Expanded overloads sorted by (name, arg count, arg types). Keys that
/// collide after expansion keep the first in that order.
pub fn expanded_signatures(methods: &Methods) -> Vec<(MethodKey, Option<TypeTerm>)> {
    let mut out: Vec<(MethodKey, Option<TypeTerm>)> = methods
        .iter()
        .flat_map(|(key, returns)| expand_default_args(key).into_iter().map(move |k| (k, returns.clone())))
        .collect();
    out.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    out.dedup_by(|later, earlier| later.0 == earlier.0);
    out
}

pub struct Generator<B> {
    backend: B,
}

impl<B: Backend> Generator<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn generate(&self, desc: &Description, exception_marker: Option<&str>) -> Result<Artifacts> {
        desc.validate()?;
        let name = desc.name_str()?;
        let backend = &self.backend;
        let mut imports: BTreeSet<Import> = BTreeSet::new();

        let parents = desc.parents.as_deref().unwrap_or(&[]);
        for parent in parents {
            imports.extend(backend.imports_for(parent));
        }

        let mut attrs = Vec::with_capacity(desc.attrs.len());
        for (attr, ty) in &desc.attrs {
            if attr.starts_with('_') {
                trace!("attribute `{attr}` is private by convention");
                continue;
            }
            let type_text = backend.render_type(ty);
            imports.extend(backend.imports_for(ty));
            attrs.push(RenderedAttr {
                name: attr.clone(),
                ty: ty.clone(),
                line: backend.render_attr(attr, &type_text),
                type_text,
            });
        }

        let mut constructors = Vec::new();
        let mut methods = Vec::new();
        for (key, returns) in expanded_signatures(&desc.methods) {
            if key.name.starts_with('_') {
                trace!("method `{}` is private by convention", key.name);
                continue;
            }
            let arg_types: Vec<String> = key.args.iter().map(|arg| backend.render_type(&arg.ty)).collect();
            for arg in &key.args {
                imports.extend(backend.imports_for(&arg.ty));
            }
            let return_text = returns.as_ref().map(|ty| {
                imports.extend(backend.imports_for(ty));
                backend.render_type(ty)
            });
            let line = backend.render_signature(&key.name, &arg_types, return_text.as_deref(), exception_marker);
            let signature = RenderedSignature { key, returns, arg_types, line };
            match signature.returns {
                None => constructors.push(signature),
                Some(_) => methods.push(signature),
            }
        }

        imports.retain(|import| {
            let keep = !import.provides(name);
            if !keep {
                debug!("dropping self-import of `{name}` from `{}`", import.module);
            }
            keep
        });
        let imports: Vec<String> = imports
            .iter()
            .map(|import| backend.render_import(import))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let cx = RenderContext {
            desc,
            name,
            namespace: desc.namespace.as_deref(),
            parents,
            header_filename: desc
                .extra_str("header_filename")
                .map_or_else(|| format!("{name}.h"), str::to_string),
            attrs,
            constructors,
            methods,
            imports,
        };
        debug!(
            "rendering `{name}`: {} attrs, {} constructors, {} methods, {} imports",
            cx.attrs.len(),
            cx.constructors.len(),
            cx.methods.len(),
            cx.imports.len()
        );

        let artifact = |kind: ArtifactKind, text: String| Artifact { file_name: backend.file_name(kind, name), text };
        Ok(Artifacts {
            header: artifact(ArtifactKind::Header, backend.render_header(&cx)),
            declaration: artifact(ArtifactKind::Declaration, backend.render_declaration(&cx)),
            implementation: artifact(ArtifactKind::Implementation, backend.render_implementation(&cx)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desc::Argument;
    use crate::error::ApiGenError;
    use proptest::prelude::*;

    fn str_arg(name: &str) -> Argument {
        Argument::new(name, TypeTerm::atomic("str"))
    }

    fn int_arg(name: &str) -> Argument {
        Argument::new(name, TypeTerm::atomic("int32"))
    }

    #[test]
    fn write_expands_to_two_overloads() {
        let key = MethodKey::new("write", vec![str_arg("filename").with_default("\"out.txt\"")]);
        let expanded = expand_default_args(&key);
        assert_eq!(expanded, vec![MethodKey::new("write", vec![str_arg("filename")]), MethodKey::bare("write")]);
        assert!(expanded.iter().flat_map(|k| &k.args).all(|arg| arg.default.is_none()));
    }

    #[test]
    fn no_defaults_no_expansion() {
        let key = MethodKey::new("calc", vec![int_arg("a"), int_arg("b")]);
        assert_eq!(expand_default_args(&key), vec![key]);
    }

    proptest! {
        #[test]
        fn expansion_is_size_correct(k in 0usize..6, d_seed in 0usize..6) {
            let d = d_seed.min(k);
            let args = (0..k)
                .map(|i| {
                    let arg = int_arg(&format!("a{i}"));
                    if i >= k - d { arg.with_default(i.to_string()) } else { arg }
                })
                .collect();
            let expanded = expand_default_args(&MethodKey::new("f", args));
            prop_assert_eq!(expanded.len(), d + 1);
            let counts: Vec<usize> = expanded.iter().map(|key| key.args.len()).collect();
            let expected: Vec<usize> = (k - d..=k).rev().collect();
            prop_assert_eq!(counts, expected);
        }
    }

    #[test]
    fn signatures_are_sorted_and_deduplicated() {
        let mut methods = Methods::new();
        methods.insert(
            MethodKey::new("write", vec![str_arg("filename").with_default("\"out.txt\"")]),
            Some(TypeTerm::atomic("void")),
        );
        methods.insert(MethodKey::bare("write"), Some(TypeTerm::atomic("int32")));
        methods.insert(MethodKey::new("calc", vec![int_arg("n")]), Some(TypeTerm::atomic("float64")));
        methods.insert(MethodKey::bare("Toaster"), None);

        let sigs = expanded_signatures(&methods);
        let rendered: Vec<String> = sigs.iter().map(|(key, _)| key.to_string()).collect();
        assert_eq!(rendered, vec!["Toaster()", "calc(n: int32)", "write()", "write(filename: str)"]);
        // two `write()` overloads collide; ties order by return type and the first survives
        assert_eq!(sigs.len(), 4);
        assert_eq!(sigs[2].1, Some(TypeTerm::atomic("int32")));
    }

    #[test]
    fn malformed_description_is_rejected() {
        let generator = Generator::new(CythonBackend::default());
        let err = generator.generate(&Description::default(), Some(DEFAULT_EXCEPTION_MARKER)).unwrap_err();
        assert!(matches!(err, ApiGenError::InvalidDescription(_)));
    }
}
