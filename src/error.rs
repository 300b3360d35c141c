//! Error taxonomy shared by every pipeline stage.
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ApiGenError>;

/// Every failure is terminal for the class being processed; nothing retries.
#[derive(Error, Debug)]
pub enum ApiGenError {
    #[error("class or struct `{0}` not found in the AST document")]
    ClassNotFound(String),

    #[error("class `{class}` is not uniquely defined within the allowed files ({matches} matching definitions)")]
    AmbiguousOrigin { class: String, matches: usize },

    #[error("unresolved node reference `{0}`")]
    UnresolvedReference(String),

    #[error("only-in entry `{0}` does not name a file of the AST document")]
    UnknownOriginFile(String),

    #[error("unknown primitive type spelling `{0}`")]
    UnknownPrimitiveType(String),

    #[error("malformed template instantiation `{name}`: {reason}")]
    MalformedTemplateInstantiation { name: String, reason: String },

    #[error("external parser failed: {0}")]
    ExternalParserFailure(String),

    #[error("invalid description: {0}")]
    InvalidDescription(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Json(String),
}

impl ApiGenError {
    pub(crate) fn malformed_template(name: &str, reason: impl Into<String>) -> Self {
        Self::MalformedTemplateInstantiation {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidDescription(reason.into())
    }
}
