//! Cython backend: `cpp_<name>.pxd` (extern declarations), `<name>.pxd`
//! (extension type) and `<name>.pyx` (wrapper implementation).
use std::collections::BTreeSet;

use super::backend::{ArtifactKind, Backend, Import, RenderContext, RenderedSignature};
use super::template::{fill, indent, Vars};
use crate::desc::Docstrings;
use crate::types::{Refinement, TypeTerm};

const WARNING: &str = "\
################################################
#                 Warning!                     #
# This file was generated by apigen.           #
# Edit the description, not this file.        #
################################################
";

const HEADER: &str = r#"{warning}{imports}

cdef extern from "{header_filename}"{namespace_clause}:

    cdef cppclass {name}{parents_clause}:
        # constructors
{constructors_block}

        # attributes
{attrs_block}

        # methods
{methods_block}
{extra}"#;

const DECLARATION: &str = r#"{warning}{imports}

cdef class {name}{parents_clause}:
    cdef {cpp_module}.{name} * _inst
    cdef public bint _free_inst
{extra}"#;

const IMPLEMENTATION: &str = r#"{warning}"""{module_docstring}
"""
{imports}

cdef class {name}{parents_clause}:
    """{class_docstring}"""

    # constructors
    def __cinit__(self, *args, **kwargs):
        self._inst = NULL
        self._free_inst = True

{init_block}

    def __dealloc__(self):
        if self._free_inst:
            free(self._inst)

    # attributes
{attrs_block}

    # methods
{methods_block}
{extra}"#;

#[derive(Clone, Debug, Default)]
pub struct CythonBackend;

impl CythonBackend {
    fn cpp_module(class_name: &str) -> String {
        format!("cpp_{}", class_name.to_lowercase())
    }

    fn primitive(name: &str) -> Option<(&'static str, Option<Import>)> {
        let spelled = match name {
            "bool" => return Some(("cpp_bool", Some(Import::aliased("libcpp", "bool", "cpp_bool")))),
            "str" => return Some(("std_string", Some(Import::aliased("libcpp.string", "string", "std_string")))),
            "char" => "char",
            "uchar" => "unsigned char",
            "int16" => "short",
            "uint16" => "unsigned short",
            "int32" => "int",
            "uint32" => "unsigned int",
            "int64" => "long",
            "uint64" => "unsigned long",
            "float32" => "float",
            "float64" => "double",
            "complex128" => "double complex",
            "void" => "void",
            _ => return None,
        };
        Some((spelled, None))
    }

    /// libcpp module and local alias of a standard container.
    fn container(name: &str) -> Option<(&'static str, &'static str)> {
        Some(match name {
            "vector" => ("libcpp.vector", "cpp_vector"),
            "map" => ("libcpp.map", "cpp_map"),
            "set" => ("libcpp.set", "cpp_set"),
            "list" => ("libcpp.list", "cpp_list"),
            "deque" => ("libcpp.deque", "cpp_deque"),
            "pair" => ("libcpp.utility", "cpp_pair"),
            "unordered_map" => ("libcpp.unordered_map", "cpp_unordered_map"),
            "unordered_set" => ("libcpp.unordered_set", "cpp_unordered_set"),
            _ => return None,
        })
    }

    fn is_plain_class(name: &str) -> bool {
        !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    }

    /// Extension-type spelling used for `cdef class` parents.
    fn render_parent(&self, term: &TypeTerm) -> String {
        match term {
            TypeTerm::Atomic(name) => name.clone(),
            other => self.render_type(other),
        }
    }

    fn parents_clause(parents: &[String]) -> String {
        if parents.is_empty() {
            String::new()
        } else {
            format!("({})", parents.join(", "))
        }
    }

    fn docstring(cx: &RenderContext<'_>, slot: impl FnOnce(&Docstrings) -> Option<&String>, what: &str) -> String {
        cx.desc
            .docstrings
            .as_ref()
            .and_then(slot)
            .cloned()
            .unwrap_or_else(|| format!("no docstring for {what}, please file a bug report!"))
    }

    fn extra(cx: &RenderContext<'_>, key: &str) -> String {
        cx.desc.extra_str(key).map(|text| format!("\n{text}\n")).unwrap_or_default()
    }

    /// Arity dispatch over overloads; the first overload of each arity wins.
    fn dispatch_block(signatures: &[&RenderedSignature], call: impl Fn(&RenderedSignature, &str) -> String, what: &str) -> Vec<String> {
        let mut lines = Vec::new();
        let mut seen = BTreeSet::new();
        for sig in signatures {
            let arity = sig.key.args.len();
            if !seen.insert(arity) {
                continue;
            }
            let keyword = if lines.is_empty() { "if" } else { "elif" };
            let args = (0..arity).map(|i| format!("args[{i}]")).collect::<Vec<_>>().join(", ");
            lines.push(format!("{keyword} len(args) == {arity}:"));
            lines.push(format!("    {}", call(sig, &args)));
        }
        if lines.is_empty() {
            lines.push("pass".to_string());
        } else {
            lines.push("else:".to_string());
            lines.push(format!("    raise TypeError(\"no overload of {what} takes {{0}} arguments\".format(len(args)))"));
        }
        lines
    }
}

impl Backend for CythonBackend {
    fn render_type(&self, term: &TypeTerm) -> String {
        match term {
            TypeTerm::Atomic(name) => Self::primitive(name).map_or_else(|| name.clone(), |(spelled, _)| spelled.to_string()),
            TypeTerm::Template { name, args } => {
                let args = args.iter().map(|arg| self.render_type(arg)).collect::<Vec<_>>().join(", ");
                let name = Self::container(name).map_or(name.as_str(), |(_, alias)| alias);
                format!("{name}[{args}]")
            }
            TypeTerm::Refined { refine: Refinement::Pointer, base } => format!("{} *", self.render_type(base)),
            TypeTerm::Refined { refine: Refinement::Reference, base } => format!("{} &", self.render_type(base)),
        }
    }

    fn imports_for(&self, term: &TypeTerm) -> BTreeSet<Import> {
        let mut out = BTreeSet::new();
        match term {
            TypeTerm::Atomic(name) => match Self::primitive(name) {
                Some((_, import)) => out.extend(import),
                None if Self::is_plain_class(name) => {
                    out.insert(Import::symbol(Self::cpp_module(name), name.clone()));
                }
                // opaque template spellings and qualified names carry no import
                None => {}
            },
            TypeTerm::Template { name, args } => {
                if let Some((module, alias)) = Self::container(name) {
                    out.insert(Import::aliased(module, name.clone(), alias));
                }
                for arg in args {
                    out.extend(self.imports_for(arg));
                }
            }
            TypeTerm::Refined { base, .. } => out.extend(self.imports_for(base)),
        }
        out
    }

    fn render_import(&self, import: &Import) -> String {
        match (&import.symbol, &import.alias) {
            (None, _) => format!("cimport {}", import.module),
            (Some(symbol), None) => format!("from {} cimport {symbol}", import.module),
            (Some(symbol), Some(alias)) => format!("from {} cimport {symbol} as {alias}", import.module),
        }
    }

    fn render_attr(&self, name: &str, type_text: &str) -> String {
        format!("{type_text} {name}")
    }

    fn render_signature(&self, name: &str, arg_types: &[String], returns: Option<&str>, exception_marker: Option<&str>) -> String {
        let except = exception_marker.map(|marker| format!(" except {marker}")).unwrap_or_default();
        let call = format!("{name}({}){except}", arg_types.join(", "));
        match returns {
            Some(returns) => format!("{returns} {call}"),
            None => call,
        }
    }

    fn file_name(&self, kind: ArtifactKind, class_name: &str) -> String {
        let lower = class_name.to_lowercase();
        match kind {
            ArtifactKind::Header => format!("cpp_{lower}.pxd"),
            ArtifactKind::Declaration => format!("{lower}.pxd"),
            ArtifactKind::Implementation => format!("{lower}.pyx"),
        }
    }

    fn render_header(&self, cx: &RenderContext<'_>) -> String {
        let parents: Vec<String> = cx.parents.iter().map(|p| self.render_type(p)).collect();
        // Cython declares no destructors; it calls `delete` itself.
        let constructors: Vec<String> = cx
            .constructors
            .iter()
            .filter(|sig| !sig.key.is_destructor())
            .map(|sig| sig.line.clone())
            .collect();
        let vars = Vars::from([
            ("warning", WARNING.to_string()),
            ("imports", cx.imports.join("\n")),
            ("header_filename", cx.header_filename.clone()),
            ("namespace_clause", cx.namespace.map(|ns| format!(" namespace \"{ns}\"")).unwrap_or_default()),
            ("name", cx.name.to_string()),
            ("parents_clause", Self::parents_clause(&parents)),
            ("constructors_block", indent(&constructors, 8)),
            ("attrs_block", indent(&cx.attr_lines(), 8)),
            ("methods_block", indent(&cx.method_lines(), 8)),
            ("extra", Self::extra(cx, "cpppxd")),
        ]);
        fill(HEADER, &vars)
    }

    fn render_declaration(&self, cx: &RenderContext<'_>) -> String {
        let cpp_module = Self::cpp_module(cx.name);
        let mut imports = BTreeSet::from([self.render_import(&Import::module(&cpp_module))]);
        for parent in cx.parents {
            if let TypeTerm::Atomic(name) = parent {
                imports.insert(self.render_import(&Import::symbol(name.to_lowercase(), name.clone())));
            }
        }
        let parents: Vec<String> = cx.parents.iter().map(|p| self.render_parent(p)).collect();
        let vars = Vars::from([
            ("warning", WARNING.to_string()),
            ("imports", imports.into_iter().collect::<Vec<_>>().join("\n")),
            ("name", cx.name.to_string()),
            ("parents_clause", Self::parents_clause(&parents)),
            ("cpp_module", cpp_module),
            ("extra", Self::extra(cx, "pxd")),
        ]);
        fill(DECLARATION, &vars)
    }

    fn render_implementation(&self, cx: &RenderContext<'_>) -> String {
        let name = cx.name;
        let cpp_module = Self::cpp_module(name);

        let mut imports: BTreeSet<String> = cx.imports.iter().cloned().collect();
        imports.insert(self.render_import(&Import::symbol("libc.stdlib", "free")));
        imports.insert(self.render_import(&Import::module(&cpp_module)));

        let constructors: Vec<&RenderedSignature> = cx.constructors.iter().filter(|sig| !sig.key.is_destructor()).collect();
        let mut init = vec![
            "def __init__(self, *args):".to_string(),
            format!("    \"\"\"{}\"\"\"", Self::docstring(cx, |d| d.methods.get(name), name)),
        ];
        let dispatch = Self::dispatch_block(&constructors, |_, args| format!("self._inst = new {cpp_module}.{name}({args})"), name);
        init.push(indent(&dispatch, 4));

        let mut attrs = Vec::new();
        for attr in &cx.attrs {
            let doc = Self::docstring(cx, |d| d.attrs.get(&attr.name), &attr.name);
            attrs.push(format!("property {}:", attr.name));
            attrs.push(format!("    \"\"\"{doc}\"\"\""));
            attrs.push("    def __get__(self):".to_string());
            attrs.push(format!("        return self._inst.{}", attr.name));
            attrs.push(String::new());
            attrs.push("    def __set__(self, value):".to_string());
            attrs.push(format!("        self._inst.{} = value", attr.name));
            attrs.push(String::new());
        }

        let mut methods = Vec::new();
        let mut by_name: Vec<(&str, Vec<&RenderedSignature>)> = Vec::new();
        for sig in &cx.methods {
            match by_name.last_mut() {
                Some((last, group)) if *last == sig.key.name => group.push(sig),
                _ => by_name.push((sig.key.name.as_str(), vec![sig])),
            }
        }
        for (method, group) in by_name {
            let doc = Self::docstring(cx, |d| d.methods.get(method), method);
            let call = |sig: &RenderedSignature, args: &str| {
                let returns = sig.returns.as_ref().is_some_and(|ty| !ty.is_void());
                let call = format!("self._inst.{method}({args})");
                if returns { format!("return {call}") } else { call }
            };
            methods.push(format!("def {method}(self, *args):"));
            methods.push(format!("    \"\"\"{doc}\"\"\""));
            methods.push(indent(&Self::dispatch_block(&group, call, method), 4));
            methods.push(String::new());
        }

        let parents: Vec<String> = cx.parents.iter().map(|p| self.render_parent(p)).collect();
        let vars = Vars::from([
            ("warning", WARNING.to_string()),
            (
                "module_docstring",
                Self::docstring(cx, |d| d.module.as_ref(), &format!("module {}", name.to_lowercase())),
            ),
            ("imports", imports.into_iter().collect::<Vec<_>>().join("\n")),
            ("name", name.to_string()),
            ("parents_clause", Self::parents_clause(&parents)),
            ("class_docstring", Self::docstring(cx, |d| d.class.as_ref(), name)),
            ("init_block", indent(&init, 4)),
            ("attrs_block", indent(&attrs, 4)),
            ("methods_block", indent(&methods, 4)),
            ("extra", Self::extra(cx, "pyx")),
        ]);
        fill(IMPLEMENTATION, &vars)
    }
}
