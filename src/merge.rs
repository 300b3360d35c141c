//! Precedence merge of partial descriptions.
//!
//! Inputs are ordered low → high precedence. Map-valued keys (`attrs`,
//! `methods`, docstring sub-maps) are unioned with later entries winning;
//! every other key is replaced wholesale by the last description defining it.
use tracing::debug;

use crate::desc::{Description, Docstrings, MethodKey, Methods};
use crate::error::{ApiGenError, Result};

pub fn merge<'a, I>(descriptions: I) -> Result<Description>
where
    I: IntoIterator<Item = &'a Description>,
{
    let mut merged: Option<Description> = None;
    for (rank, desc) in descriptions.into_iter().enumerate() {
        desc.validate_partial()?;
        debug!("merging description #{rank} ({})", desc.name.as_deref().unwrap_or("<unnamed>"));
        merged = Some(match merged {
            None => desc.clone(),
            Some(low) => overlay(low, desc),
        });
    }
    let mut merged = merged.ok_or_else(|| ApiGenError::invalid("nothing to merge"))?;

    let name = merged.name_str()?.to_string();
    for key in sanitize_methods(&mut merged.methods, &name) {
        debug!("dropping inherited constructor/destructor `{key}` from `{name}`");
    }
    merged.validate()?;
    Ok(merged)
}

/// Remove constructor/destructor entries (`None` return) whose name does not
/// end with `class_name`. Returns the removed keys in order.
pub fn sanitize_methods(methods: &mut Methods, class_name: &str) -> Vec<MethodKey> {
    let doomed: Vec<MethodKey> = methods
        .iter()
        .filter(|(key, returns)| returns.is_none() && !key.name.ends_with(class_name))
        .map(|(key, _)| key.clone())
        .collect();
    for key in &doomed {
        methods.remove(key);
    }
    doomed
}

fn overlay(mut low: Description, high: &Description) -> Description {
    if high.name.is_some() {
        low.name = high.name.clone();
    }
    if high.parents.is_some() {
        low.parents = high.parents.clone();
    }
    if high.namespace.is_some() {
        low.namespace = high.namespace.clone();
    }
    if high.extra.is_some() {
        low.extra = high.extra.clone();
    }
    low.attrs.extend(high.attrs.iter().map(|(name, ty)| (name.clone(), ty.clone())));
    for (key, returns) in &high.methods {
        low.insert_method(key.clone(), returns.clone());
    }
    low.docstrings = overlay_docstrings(low.docstrings, high.docstrings.as_ref());
    low
}

fn overlay_docstrings(low: Option<Docstrings>, high: Option<&Docstrings>) -> Option<Docstrings> {
    let Some(high) = high else {
        return low;
    };
    let mut low = low.unwrap_or_default();
    if high.module.is_some() {
        low.module = high.module.clone();
    }
    if high.class.is_some() {
        low.class = high.class.clone();
    }
    low.attrs.extend(high.attrs.iter().map(|(k, v)| (k.clone(), v.clone())));
    low.methods.extend(high.methods.iter().map(|(k, v)| (k.clone(), v.clone())));
    Some(low)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desc::Argument;
    use crate::types::TypeTerm;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn ctor(name: &str) -> MethodKey {
        MethodKey::bare(name)
    }

    #[test]
    fn inherited_constructor_is_sanitized() {
        let mut base = Description::default();
        base.methods.insert(ctor("Foo"), None);
        let mut over = Description::named("Bar");
        over.methods.insert(ctor("Bar"), None);

        let merged = merge([&base, &over]).unwrap();
        assert_eq!(merged.name.as_deref(), Some("Bar"));
        assert_eq!(merged.methods.len(), 1);
        assert_eq!(merged.methods.get(&ctor("Bar")), Some(&None));
    }

    #[test]
    fn sanitize_keeps_destructors_and_methods() {
        let mut methods = Methods::new();
        methods.insert(ctor("Bar"), None);
        methods.insert(ctor("~Bar"), None);
        methods.insert(ctor("~Foo"), None);
        methods.insert(ctor("Foo"), Some(TypeTerm::atomic("int32")));
        let removed = sanitize_methods(&mut methods, "Bar");
        assert_eq!(removed, vec![ctor("~Foo")]);
        assert_eq!(methods.len(), 3);
    }

    #[test]
    fn later_entries_win() {
        let write = MethodKey::new("write", vec![Argument::new("filename", TypeTerm::atomic("str"))]);
        let mut low = Description::named("Toaster");
        low.attrs.insert("rate".into(), TypeTerm::atomic("float32"));
        low.namespace = Some("bright".into());
        low.methods.insert(write.clone(), Some(TypeTerm::atomic("void")));

        let mut high = Description::default();
        high.attrs.insert("rate".into(), TypeTerm::atomic("float64"));
        let defaulted = MethodKey::new(
            "write",
            vec![Argument::new("filename", TypeTerm::atomic("str")).with_default("\"out.txt\"")],
        );
        high.methods.insert(defaulted, Some(TypeTerm::atomic("int32")));

        let merged = merge([&low, &high]).unwrap();
        assert_eq!(merged.attrs["rate"], TypeTerm::atomic("float64"));
        assert_eq!(merged.namespace.as_deref(), Some("bright"));
        let (key, returns) = merged.methods.get_key_value(&write).unwrap();
        assert_eq!(key.args[0].default.as_deref(), Some("\"out.txt\""));
        assert_eq!(returns, &Some(TypeTerm::atomic("int32")));
    }

    #[test]
    fn docstrings_merge_per_slot() {
        let mut low = Description::named("Toaster");
        low.docstrings = Some(Docstrings {
            module: Some("low module".into()),
            class: Some("low class".into()),
            attrs: BTreeMap::from([("rate".into(), "low rate".into()), ("n".into(), "slices".into())]),
            methods: BTreeMap::new(),
        });
        let mut high = Description::default();
        high.docstrings = Some(Docstrings {
            class: Some("high class".into()),
            attrs: BTreeMap::from([("rate".into(), "high rate".into())]),
            ..Docstrings::default()
        });

        let docs = merge([&low, &high]).unwrap().docstrings.unwrap();
        assert_eq!(docs.module.as_deref(), Some("low module"));
        assert_eq!(docs.class.as_deref(), Some("high class"));
        assert_eq!(docs.attrs["rate"], "high rate");
        assert_eq!(docs.attrs["n"], "slices");
    }

    #[test]
    fn rejects_malformed() {
        assert!(matches!(merge(std::iter::empty::<&Description>()), Err(ApiGenError::InvalidDescription(_))));
        let unnamed = Description::default();
        assert!(matches!(merge([&unnamed]), Err(ApiGenError::InvalidDescription(_))));
        let empty = Description::named("");
        assert!(matches!(merge([&empty]), Err(ApiGenError::InvalidDescription(_))));
    }

    #[test]
    fn inputs_are_not_mutated() {
        let mut base = Description::default();
        base.methods.insert(ctor("Foo"), None);
        let snapshot = base.clone();
        let _ = merge([&base, &Description::named("Bar")]).unwrap();
        assert_eq!(base, snapshot);
    }

    // ————————————————————————————————————————————————————————————————————————
    // LAWS
    // ————————————————————————————————————————————————————————————————————————

    fn term() -> impl Strategy<Value = TypeTerm> {
        prop::sample::select(vec!["int32", "float64", "str", "Material"]).prop_map(TypeTerm::atomic)
    }

    fn method() -> impl Strategy<Value = (MethodKey, Option<TypeTerm>)> {
        let names = vec!["Bar", "~Bar", "Foo", "~Foo", "calc", "write"];
        (
            prop::sample::select(names),
            prop::collection::vec((prop::sample::select(vec!["a", "b"]), term()), 0..3),
            prop::option::of(term()),
        )
            .prop_map(|(name, args, returns)| {
                let args = args.into_iter().map(|(n, t)| Argument::new(n, t)).collect();
                (MethodKey::new(name, args), returns)
            })
    }

    fn docstrings() -> impl Strategy<Value = Docstrings> {
        (
            prop::option::of("[a-z]{1,6}"),
            prop::collection::btree_map(prop::sample::select(vec!["rate", "n"]).prop_map(String::from), "[a-z]{1,6}", 0..2),
        )
            .prop_map(|(class, attrs)| Docstrings { class, attrs, ..Docstrings::default() })
    }

    /// Every generated description names the same class, so sanitization
    /// sees the same name at every level of nesting.
    fn description() -> impl Strategy<Value = Description> {
        (
            prop::collection::btree_map(prop::sample::select(vec!["rate", "n", "_cache"]).prop_map(String::from), term(), 0..3),
            prop::collection::vec(method(), 0..4),
            prop::option::of(prop::sample::select(vec!["bright", "pyne::bright"]).prop_map(String::from)),
            prop::option::of(prop::collection::vec(term(), 0..2)),
            prop::option::of(docstrings()),
        )
            .prop_map(|(attrs, methods, namespace, parents, docstrings)| {
                let mut desc = Description::named("Bar");
                desc.attrs = attrs;
                for (key, returns) in methods {
                    desc.insert_method(key, returns);
                }
                desc.namespace = namespace;
                desc.parents = parents;
                desc.docstrings = docstrings;
                desc
            })
    }

    proptest! {
        #[test]
        fn merge_is_associative(a in description(), b in description(), c in description()) {
            let flat = merge([&a, &b, &c]).unwrap();
            let nested = merge([&merge([&a, &b]).unwrap(), &c]).unwrap();
            prop_assert_eq!(&flat, &nested);
        }

        #[test]
        fn merge_is_idempotent(a in description()) {
            let a = merge([&a]).unwrap();
            prop_assert_eq!(merge([&a, &a]).unwrap(), a);
        }

        #[test]
        fn merge_is_deterministic(a in description(), b in description()) {
            let first = serde_json::to_string(&merge([&a, &b]).unwrap()).unwrap();
            let second = serde_json::to_string(&merge([&a, &b]).unwrap()).unwrap();
            prop_assert_eq!(first, second);
        }

        #[test]
        fn sanitization_removes_only_foreign_constructors(a in description()) {
            let merged = merge([&a]).unwrap();
            for (key, returns) in &a.methods {
                let kept = merged.methods.contains_key(key);
                prop_assert_eq!(kept, returns.is_some() || key.name.ends_with("Bar"));
            }
        }
    }
}
