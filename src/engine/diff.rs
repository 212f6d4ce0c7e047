//! Generic structural diffing between run-to-run values
//!
//! A pure, engine-state-free deep comparison of two JSON values producing an
//! ordered list of `(path, kind, old, new)` records. The transform pipeline
//! uses it to tell each plugin how its slice of the data bag changed since
//! the previous completed run.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::domain::DataBag;

/// Kind of a single structural change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Removed,
    Changed,
}

/// One structural difference between two values
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    /// Dotted path from the root, array indices in brackets
    /// (e.g. `objects[2].name`)
    pub path: String,

    pub kind: ChangeKind,

    /// Value at `path` in the old document, absent for additions
    pub old: Option<Value>,

    /// Value at `path` in the new document, absent for removals
    pub new: Option<Value>,
}

/// Per-bucket diffs of a plugin's bag slice, keyed by bucket name
pub type BagDiff = BTreeMap<String, Vec<Change>>;

/// Computes the ordered structural differences between two JSON values.
///
/// `diff(x, x)` is empty for every `x`.
pub fn diff(old: &Value, new: &Value) -> Vec<Change> {
    let mut changes = Vec::new();
    walk("", old, new, &mut changes);
    changes
}

/// Diffs each bucket of `old` against the same bucket of `new`.
///
/// Buckets present in only one bag are diffed against `null`, so a bucket
/// appearing or vanishing shows up as a single add/remove at its root.
pub fn diff_bags(old: &DataBag, new: &DataBag) -> BagDiff {
    let old_buckets: BTreeMap<_, _> = old.buckets().into_iter().collect();
    let new_buckets: BTreeMap<_, _> = new.buckets().into_iter().collect();

    let mut result = BagDiff::new();

    for (name, old_value) in &old_buckets {
        let new_value = new_buckets.get(name).cloned().unwrap_or(Value::Null);
        let changes = diff(old_value, &new_value);
        if !changes.is_empty() {
            result.insert(name.clone(), changes);
        }
    }

    for (name, new_value) in &new_buckets {
        if old_buckets.contains_key(name) {
            continue;
        }
        let changes = diff(&Value::Null, new_value);
        if !changes.is_empty() {
            result.insert(name.clone(), changes);
        }
    }

    result
}

fn walk(path: &str, old: &Value, new: &Value, changes: &mut Vec<Change>) {
    match (old, new) {
        (Value::Object(old_map), Value::Object(new_map)) => {
            for (key, old_value) in old_map {
                let child = join_key(path, key);
                match new_map.get(key) {
                    Some(new_value) => walk(&child, old_value, new_value, changes),
                    None => changes.push(Change {
                        path: child,
                        kind: ChangeKind::Removed,
                        old: Some(old_value.clone()),
                        new: None,
                    }),
                }
            }
            for (key, new_value) in new_map {
                if !old_map.contains_key(key) {
                    changes.push(Change {
                        path: join_key(path, key),
                        kind: ChangeKind::Added,
                        old: None,
                        new: Some(new_value.clone()),
                    });
                }
            }
        }
        (Value::Array(old_items), Value::Array(new_items)) => {
            let shared = old_items.len().min(new_items.len());
            for index in 0..shared {
                let child = format!("{}[{}]", path, index);
                walk(&child, &old_items[index], &new_items[index], changes);
            }
            for (index, old_value) in old_items.iter().enumerate().skip(shared) {
                changes.push(Change {
                    path: format!("{}[{}]", path, index),
                    kind: ChangeKind::Removed,
                    old: Some(old_value.clone()),
                    new: None,
                });
            }
            for (index, new_value) in new_items.iter().enumerate().skip(shared) {
                changes.push(Change {
                    path: format!("{}[{}]", path, index),
                    kind: ChangeKind::Added,
                    old: None,
                    new: Some(new_value.clone()),
                });
            }
        }
        (old, new) if old == new => {}
        (old, new) => changes.push(Change {
            path: path.to_string(),
            kind: ChangeKind::Changed,
            old: Some(old.clone()),
            new: Some(new.clone()),
        }),
    }
}

fn join_key(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identical_values_produce_no_changes() {
        let value = json!({"a": [1, {"b": "c"}], "d": null});
        assert!(diff(&value, &value).is_empty());
    }

    #[test]
    fn scalar_change_is_reported_at_its_path() {
        let old = json!({"entry": {"name": "A"}});
        let new = json!({"entry": {"name": "a"}});

        let changes = diff(&old, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path, "entry.name");
        assert_eq!(changes[0].kind, ChangeKind::Changed);
        assert_eq!(changes[0].old, Some(json!("A")));
        assert_eq!(changes[0].new, Some(json!("a")));
    }

    #[test]
    fn added_and_removed_keys() {
        let old = json!({"keep": 1, "drop": 2});
        let new = json!({"keep": 1, "gain": 3});

        let changes = diff(&old, &new);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].path, "drop");
        assert_eq!(changes[0].kind, ChangeKind::Removed);
        assert_eq!(changes[1].path, "gain");
        assert_eq!(changes[1].kind, ChangeKind::Added);
    }

    #[test]
    fn array_growth_is_ordered() {
        let old = json!([1]);
        let new = json!([1, 2, 3]);

        let changes = diff(&old, &new);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].path, "[1]");
        assert_eq!(changes[1].path, "[2]");
        assert!(changes.iter().all(|c| c.kind == ChangeKind::Added));
    }

    #[test]
    fn type_change_is_a_single_change() {
        let changes = diff(&json!({"a": 1}), &json!({"a": [1]}));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path, "a");
        assert_eq!(changes[0].kind, ChangeKind::Changed);
    }

    #[test]
    fn bag_diff_reports_only_changed_buckets() {
        let old = DataBag::new();
        let mut new = DataBag::new();
        new.objects.push(json!({"name": "A"}));

        let diffs = diff_bags(&old, &new);
        assert_eq!(diffs.len(), 1);
        assert!(diffs.contains_key("objects"));
        assert_eq!(diffs["objects"][0].kind, ChangeKind::Added);
    }

    #[test]
    fn bag_diff_of_equal_bags_is_empty() {
        let mut bag = DataBag::new();
        bag.models.push(json!({"source": "cms"}));

        assert!(diff_bags(&bag, &bag.clone()).is_empty());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn arb_json() -> impl Strategy<Value = Value> {
            let leaf = prop_oneof![
                Just(Value::Null),
                any::<bool>().prop_map(Value::Bool),
                any::<i64>().prop_map(|n| json!(n)),
                "[a-z]{0,8}".prop_map(Value::String),
            ];
            leaf.prop_recursive(4, 32, 8, |inner| {
                prop_oneof![
                    prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                    prop::collection::btree_map("[a-z]{1,4}", inner, 0..4).prop_map(|m| {
                        Value::Object(m.into_iter().collect())
                    }),
                ]
            })
        }

        proptest! {
            #[test]
            fn diff_of_value_with_itself_is_empty(value in arb_json()) {
                prop_assert!(diff(&value, &value).is_empty());
            }

            #[test]
            fn diff_is_symmetric_in_size(a in arb_json(), b in arb_json()) {
                prop_assert_eq!(diff(&a, &b).len(), diff(&b, &a).len());
            }
        }
    }
}
