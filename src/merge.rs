//! Recursive partial-field merge of JSON documents.
use super::error::MergeConflict;
use serde_json::{Map, Value};

pub type Document = Map<String, Value>;

/// Merge `patch` onto a copy of `existing`.
///
/// Scalars, nulls and arrays replace what is there. Objects are inserted when
/// the key is absent or null and merged key by key when both sides are objects. An
/// object landing on a non-object value is a [`MergeConflict`].
pub fn merge(existing: &Document, patch: &Document) -> Result<Document, MergeConflict> {
    let mut merged = existing.clone();
    merge_into(&mut merged, patch, "")?;
    Ok(merged)
}

fn merge_into(target: &mut Document, patch: &Document, prefix: &str) -> Result<(), MergeConflict> {
    for (key, incoming) in patch {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };

        if let Value::Object(fields) = incoming {
            match target.get_mut(key) {
                Some(Value::Object(current)) => {
                    merge_into(current, fields, &path)?;
                    continue;
                }
                None | Some(Value::Null) => {}
                Some(_) => return Err(MergeConflict { path }),
            }
        }
        target.insert(key.clone(), incoming.clone());
    }
    Ok(())
}
