//! `{placeholder}` substitution for backend templates.
use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::warn;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([a-z_]+)\}").unwrap());

pub type Vars<'a> = BTreeMap<&'a str, String>;

/// Replace every `{name}` with its value. Unknown placeholders are left in
/// place.
pub fn fill(template: &str, vars: &Vars<'_>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| match vars.get(&caps[1]) {
            Some(value) => value.clone(),
            None => {
                warn!("template placeholder `{}` has no value", &caps[1]);
                caps[0].to_string()
            }
        })
        .into_owned()
}

/// Indent each non-empty line by `width` spaces and join with newlines.
pub fn indent<S: AsRef<str>>(lines: &[S], width: usize) -> String {
    let pad = " ".repeat(width);
    lines
        .iter()
        .flat_map(|line| line.as_ref().split('\n'))
        .map(|line| if line.is_empty() { String::new() } else { format!("{pad}{line}") })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_known_and_keeps_unknown() {
        let vars = Vars::from([("name", "Toaster".to_string())]);
        assert_eq!(fill("cdef class {name}({parents}):", &vars), "cdef class Toaster({parents}):");
    }

    #[test]
    fn values_are_not_rescanned() {
        let vars = Vars::from([("a", "{b}".to_string()), ("b", "x".to_string())]);
        assert_eq!(fill("{a}{b}", &vars), "{b}x");
    }

    #[test]
    fn indents_multiline_entries() {
        assert_eq!(indent(&["a", "b\n\nc"], 4), "    a\n    b\n\n    c");
        assert_eq!(indent::<&str>(&[], 4), "");
    }
}
