//! The external AST-producing parser. Parsing C++ is not done here; a
//! configured program turns a source file into an [`AstDocument`].
use std::path::Path;
use std::process::Command;

use tracing::debug;

use crate::ast::AstDocument;
use crate::error::{ApiGenError, Result};
use crate::path_de;

pub trait ExternalParser: Send + Sync {
    fn parse(&self, source: &Path) -> Result<AstDocument>;
}

/// Runs `program args.. <source>` and reads a JSON AST document from stdout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandParser {
    program: String,
    args: Vec<String>,
}

impl CommandParser {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self { program: program.into(), args }
    }

    /// Split a whitespace-separated command line (no quoting).
    pub fn from_command_line(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace().map(str::to_string);
        let program = words
            .next()
            .ok_or_else(|| ApiGenError::ExternalParserFailure("empty parser command".to_string()))?;
        Ok(Self::new(program, words.collect()))
    }
}

impl ExternalParser for CommandParser {
    fn parse(&self, source: &Path) -> Result<AstDocument> {
        debug!("running `{} {}` on {}", self.program, self.args.join(" "), source.display());
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(source)
            .output()
            .map_err(|err| ApiGenError::ExternalParserFailure(format!("could not run `{}`: {err}", self.program)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ApiGenError::ExternalParserFailure(format!(
                "`{}` exited with {} on {}: {}",
                self.program,
                output.status,
                source.display(),
                stderr.trim()
            )));
        }
        path_de::from_slice_with_path(&output.stdout).map_err(|err| {
            ApiGenError::ExternalParserFailure(format!("`{}` produced an unreadable AST: {err}", self.program))
        })
    }
}
