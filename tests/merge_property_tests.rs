//! Property-based tests for deep merge
//!
//! Agreement and invoice updates are applied as deep merges, so the merge rules
//! decide what survives an update. These tests generate flat and one-level
//! nested documents and check the rules hold for all of them.

use proptest::prelude::*;
use serde_json::{Map, Value};
use ufa_ledger::merge::{Document, merge};

/// Strategy to generate a scalar JSON value
fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(Value::from),
        "[a-z0-9]{0,6}".prop_map(Value::String),
    ]
}

/// Strategy to generate a document of scalars and one-level nested objects
fn document_strategy() -> impl Strategy<Value = Document> {
    let nested = prop::collection::btree_map("[a-c]", scalar_strategy(), 0..3)
        .prop_map(|fields| Value::Object(fields.into_iter().collect::<Map<_, _>>()));
    let value = prop_oneof![3 => scalar_strategy(), 1 => nested];
    prop::collection::btree_map("[a-f]", value, 0..6).prop_map(|fields| fields.into_iter().collect())
}

// PROPERTY TESTS
proptest! {
    /// Property: keys the patch does not mention are carried over unchanged
    #[test]
    fn prop_untouched_keys_survive(existing in document_strategy(), patch in document_strategy()) {
        if let Ok(merged) = merge(&existing, &patch) {
            for (key, value) in existing.iter().filter(|(key, _)| !patch.contains_key(*key)) {
                prop_assert_eq!(merged.get(key), Some(value));
            }
        }
    }

    /// Property: a scalar in the patch always wins
    #[test]
    fn prop_scalar_patch_values_win(existing in document_strategy(), patch in document_strategy()) {
        if let Ok(merged) = merge(&existing, &patch) {
            for (key, value) in patch.iter().filter(|(_, value)| !value.is_object()) {
                prop_assert_eq!(merged.get(key), Some(value));
            }
        }
    }

    /// Property: merging into an empty document yields the patch
    #[test]
    fn prop_merge_into_empty_is_patch(patch in document_strategy()) {
        prop_assert_eq!(merge(&Document::new(), &patch).unwrap(), patch);
    }

    /// Property: an object patch over a scalar is always a conflict
    #[test]
    fn prop_object_over_scalar_conflicts(key in "[a-f]", scalar in scalar_strategy(), inner in document_strategy()) {
        let mut existing = Document::new();
        existing.insert(key.clone(), scalar);
        let mut patch = Document::new();
        patch.insert(key, Value::Object(inner));

        prop_assert!(merge(&existing, &patch).is_err());
    }
}
