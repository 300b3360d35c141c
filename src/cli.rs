//! CLI: AST → describe → merge → generate
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use apigen::ast::AstDocument;
use apigen::batch::{self, BatchReport};
use apigen::codegen::{CythonBackend, DEFAULT_EXCEPTION_MARKER, Generator};
use apigen::desc::Description;
use apigen::merge::merge;
use apigen::parser::{CommandParser, ExternalParser};
use apigen::path_de;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// describe C++ classes from an AST dump, merge descriptions and generate Cython bindings
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    /// debug logging (overrides RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// describe classes and print (or write) their descriptions as JSON
    Describe(DescribeOut),
    /// merge description files, lowest precedence first
    Merge(MergeOut),
    /// generate binding artifacts from descriptions or straight from an AST
    Generate(GenerateOut),
}

#[derive(Args, Debug, Clone, Default)]
struct AstInput {
    /// AST documents (JSON). May be literal paths or quoted glob patterns
    #[arg(long, num_args = 1..)]
    ast: Vec<String>,

    /// C++ sources handed to --parser-cmd instead of pre-built AST documents
    #[arg(long, num_args = 1.., requires = "parser_cmd")]
    source: Vec<String>,

    /// external parser command line; each source path is appended to it
    #[arg(long)]
    parser_cmd: Option<String>,

    /// classes or structs to describe
    #[arg(long, short, num_args = 1..)]
    class: Vec<String>,

    /// restrict class lookup to these originating files (names or file ids)
    #[arg(long, num_args = 1..)]
    only_in: Vec<String>,
}

#[derive(Args, Debug, Clone, Default)]
struct Precedence {
    /// descriptions merged below every class (e.g. library defaults)
    #[arg(long, num_args = 1..)]
    base: Vec<PathBuf>,

    /// descriptions merged above every class (e.g. hand-written overrides)
    #[arg(long = "override", num_args = 1..)]
    overrides: Vec<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct DescribeOut {
    #[command(flatten)]
    input: AstInput,

    /// output directory, one `<class>.json` per class (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct MergeOut {
    /// description files, lowest precedence first
    #[arg(long, num_args = 1.., required = true)]
    desc: Vec<PathBuf>,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct GenerateOut {
    #[command(flatten)]
    input: AstInput,

    /// description files to generate from, alongside any described classes.
    /// May be literal paths or quoted glob patterns
    #[arg(long, num_args = 1..)]
    desc: Vec<String>,

    #[command(flatten)]
    precedence: Precedence,

    /// exception marker appended to declared signatures
    #[arg(long, default_value = DEFAULT_EXCEPTION_MARKER, conflicts_with = "no_except")]
    exception_marker: String,

    /// declare signatures without an exception clause
    #[arg(long)]
    no_except: bool,

    /// directory the artifacts are written to
    #[arg(short, long)]
    out: PathBuf,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl AstInput {
    /// Pre-built documents must all load. Parsed sources fail one at a time;
    /// each failure is reported under its path and the rest carry on.
    fn load_documents(&self) -> Result<BatchReport<AstDocument>> {
        let mut documents = Vec::new();
        for path in resolve_file_path_patterns(&self.ast)? {
            let document = path_de::load_json_file(&path)
                .with_context(|| format!("failed to load AST document {}", path.display()))?;
            documents.push((path.display().to_string(), document));
        }
        let mut report = BatchReport { succeeded: documents, failed: Vec::new() };
        if !self.source.is_empty() {
            let command = self.parser_cmd.as_deref().unwrap_or_default();
            let parser = CommandParser::from_command_line(command)?;
            let sources = resolve_file_path_patterns(&self.source)?;
            let mut parsed = batch::run_batch(&sources, |path| (path.display().to_string(), parser.parse(path)));
            report.succeeded.append(&mut parsed.succeeded);
            report.failed.append(&mut parsed.failed);
        }
        Ok(report)
    }

    fn is_empty(&self) -> bool {
        self.ast.is_empty() && self.source.is_empty()
    }

    fn describe(&self) -> Result<BatchReport<Description>> {
        if self.class.is_empty() {
            bail!("no --class given");
        }
        let loaded = self.load_documents()?;
        if loaded.total() == 0 {
            bail!("no AST documents given (use --ast or --source)");
        }
        let documents: Vec<AstDocument> = loaded.succeeded.into_iter().map(|(_, doc)| doc).collect();
        let mut report = batch::describe_all(&documents, &self.class, &self.only_in);
        let mut failed = loaded.failed;
        failed.append(&mut report.failed);
        report.failed = failed;
        Ok(report)
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn init_tracing(&self) {
        let filter = if self.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
        };
        tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
    }

    pub fn run(&self) -> Result<()> {
        match &self.cmd {
            Command::Describe(target) => {
                let report = target.input.describe()?;
                for (name, desc) in &report.succeeded {
                    let json = serde_json::to_string_pretty(desc)?;
                    match target.out.as_ref() {
                        Some(dir) => {
                            let path = dir.join(format!("{name}.json"));
                            write_file(&path, &json)?;
                            print_success(name, &[path.as_path()]);
                        }
                        None => println!("{json}"),
                    }
                }
                finish(&report)
            }
            Command::Merge(target) => {
                let descriptions = load_descriptions(&target.desc)?;
                let merged = merge(&descriptions)?;
                let json = serde_json::to_string_pretty(&merged)?;
                match target.out.as_ref() {
                    Some(out) => write_file(out, &json),
                    None => {
                        println!("{json}");
                        Ok(())
                    }
                }
            }
            Command::Generate(target) => {
                if target.input.is_empty() && target.desc.is_empty() {
                    bail!("nothing to generate (use --desc, --ast or --source)");
                }
                let base = load_descriptions(&target.precedence.base)?;
                let overrides = load_descriptions(&target.precedence.overrides)?;

                let mut descriptions = Vec::new();
                let mut failed = Vec::new();
                if !target.input.is_empty() {
                    let described = target.input.describe()?;
                    descriptions.extend(described.succeeded.into_iter().map(|(_, desc)| desc));
                    failed.extend(described.failed);
                }
                for path in resolve_file_path_patterns(&target.desc)? {
                    let desc: Description = path_de::load_json_file(&path)
                        .with_context(|| format!("failed to load description {}", path.display()))?;
                    descriptions.push(desc);
                }

                let mut merged = Vec::with_capacity(descriptions.len());
                for (i, desc) in descriptions.iter().enumerate() {
                    match layered(&base, &overrides, desc) {
                        Ok(desc) => merged.push(desc),
                        Err(err) => {
                            let label = desc.name.clone().unwrap_or_else(|| format!("<description #{i}>"));
                            failed.push((label, err));
                        }
                    }
                }

                let marker = (!target.no_except).then_some(target.exception_marker.as_str());
                let generator = Generator::new(CythonBackend);
                let mut report = batch::generate_all(&generator, &merged, marker);
                for (name, artifacts) in &report.succeeded {
                    let mut written = Vec::new();
                    for artifact in artifacts.iter() {
                        let path = target.out.join(&artifact.file_name);
                        write_file(&path, &artifact.text)?;
                        written.push(path);
                    }
                    let written: Vec<&Path> = written.iter().map(PathBuf::as_path).collect();
                    print_success(name, &written);
                }
                failed.append(&mut report.failed);
                report.failed = failed;
                finish(&report)
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn load_descriptions(paths: &[PathBuf]) -> Result<Vec<Description>> {
    paths
        .iter()
        .map(|path| path_de::load_json_file(path).with_context(|| format!("failed to load description {}", path.display())))
        .collect()
}

/// Merge `desc` between the base and override layers.
fn layered(base: &[Description], overrides: &[Description], desc: &Description) -> apigen::error::Result<Description> {
    merge(base.iter().chain(std::iter::once(desc)).chain(overrides))
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

fn print_success(name: &str, paths: &[&Path]) {
    let paths: Vec<String> = paths.iter().map(|path| path.display().to_string()).collect();
    eprintln!("{} {} → {}", "✓".green().bold(), name.bold(), paths.join(", "));
}

/// Print per-class failures and turn any into a non-zero exit.
fn finish<T>(report: &BatchReport<T>) -> Result<()> {
    for (name, err) in &report.failed {
        eprintln!("{} {}: {err}", "✗".red().bold(), name.bold());
    }
    if report.is_clean() {
        return Ok(());
    }
    Err(anyhow!("{} of {} classes failed", report.failed.len(), report.total()))
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{' ))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                // Pattern was explicitly a glob but matched nothing -> surface as an error
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
