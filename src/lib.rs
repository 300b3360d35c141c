//! Binding generation for C++ classes: an external parser's AST dump is
//! described ([`describe`]), descriptions are layered ([`merge`]) and the
//! result is rendered into wrapper sources ([`codegen`]).
pub mod ast;
pub mod batch;
pub mod codegen;
pub mod desc;
pub mod describe;
pub mod error;
pub mod merge;
pub mod parser;
pub mod path_de;
pub mod types;

pub use codegen::{Artifact, Artifacts, Backend, CythonBackend, Generator};
pub use desc::{Argument, Description, Docstrings, MethodKey};
pub use describe::describe;
pub use error::{ApiGenError, Result};
pub use merge::merge;
pub use types::{Refinement, TypeTerm};
