//! Many classes at once. Each class fails or succeeds on its own; a failure
//! never aborts the rest of the run.
use rayon::prelude::*;
use tracing::warn;

use crate::ast::AstDocument;
use crate::codegen::{Artifacts, Backend, Generator};
use crate::desc::Description;
use crate::describe::describe;
use crate::error::{ApiGenError, Result};

#[derive(Debug)]
pub struct BatchReport<T> {
    /// In input order.
    pub succeeded: Vec<(String, T)>,
    /// In input order.
    pub failed: Vec<(String, ApiGenError)>,
}

impl<T> BatchReport<T> {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

/// Run `job` over every item in parallel. `job` labels its item and returns
/// the outcome; the report keeps input order.
pub fn run_batch<I, T, F>(items: &[I], job: F) -> BatchReport<T>
where
    I: Sync,
    T: Send,
    F: Fn(&I) -> (String, Result<T>) + Sync,
{
    let results: Vec<(String, Result<T>)> = items.par_iter().map(&job).collect();

    let mut report = BatchReport { succeeded: Vec::new(), failed: Vec::new() };
    for (label, result) in results {
        match result {
            Ok(value) => report.succeeded.push((label, value)),
            Err(err) => {
                warn!("{label}: {err}");
                report.failed.push((label, err));
            }
        }
    }
    report
}

/// Describe each class, looking through `documents` in order. The first
/// document that yields the class wins. Only-in entries apply to the
/// documents that contain them; an entry found in no document fails every
/// class.
pub fn describe_all<S: AsRef<str> + Sync>(
    documents: &[AstDocument],
    class_names: &[String],
    only_in: &[S],
) -> BatchReport<Description> {
    let unknown = only_in
        .iter()
        .map(|f| f.as_ref())
        .find(|file| !documents.iter().any(|doc| doc.has_file(file)));
    run_batch(class_names, |name| {
        if let Some(file) = unknown {
            return (name.clone(), Err(ApiGenError::UnknownOriginFile(file.to_string())));
        }
        let mut missing = None;
        for document in documents {
            let scoped: Vec<&str> = only_in.iter().map(|f| f.as_ref()).filter(|f| document.has_file(f)).collect();
            if !only_in.is_empty() && scoped.is_empty() {
                continue;
            }
            match describe(document, name, &scoped) {
                Ok(desc) => return (name.clone(), Ok(desc)),
                // Absent here, or present only outside the allowed files:
                // a later document may still have it.
                Err(err @ (ApiGenError::ClassNotFound(_) | ApiGenError::AmbiguousOrigin { matches: 0, .. })) => {
                    missing.get_or_insert(err);
                }
                Err(err) => return (name.clone(), Err(err)),
            }
        }
        let err = missing.unwrap_or_else(|| ApiGenError::ClassNotFound(name.clone()));
        (name.clone(), Err(err))
    })
}

pub fn generate_all<B: Backend>(
    generator: &Generator<B>,
    descriptions: &[Description],
    exception_marker: Option<&str>,
) -> BatchReport<Artifacts> {
    let items: Vec<(usize, &Description)> = descriptions.iter().enumerate().collect();
    run_batch(&items, |&(i, desc)| {
        let label = desc.name.clone().unwrap_or_else(|| format!("<description #{i}>"));
        (label, generator.generate(desc, exception_marker))
    })
}
