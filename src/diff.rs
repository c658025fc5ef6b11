//! Comparison of a target locale against the source locale
//!
//! Two views are offered. [`missing_keys`] works on flattened maps and lists
//! the paths that still need a translation. [`structural_status`] compares
//! whole trees after sorting their keys, which is what the `outdated`
//! diagnostic reports.

use std::fmt;

use serde_json::Value;

use crate::tree::{FlatMap, KeyTree, flatten};

/// Outcome of comparing a target tree with the source tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuralStatus {
    Ok,
    MissingFile,
    Outdated,
}

impl fmt::Display for StructuralStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StructuralStatus::Ok => write!(f, "OK"),
            StructuralStatus::MissingFile => write!(f, "MISSING"),
            StructuralStatus::Outdated => write!(f, "MAY BE OUTDATED (structure differs)"),
        }
    }
}

/// Per-language result of the missing-key diagnostic
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissingReport {
    Complete,
    MissingFile,
    Missing(Vec<String>),
}

/// Absent, `null` and `""` all count as "no translation"
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

/// Paths with content in `source` but blank in `target`, ascending
pub fn missing_keys(source: &FlatMap, target: &FlatMap) -> Vec<String> {
    source
        .iter()
        .filter(|(path, value)| !is_blank(Some(*value)) && is_blank(target.get(path.as_str())))
        .map(|(path, _)| path.clone())
        .collect()
}

/// Recursively rebuild every object with its keys in ascending order
pub fn normalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            Value::Object(
                keys.into_iter()
                    .map(|key| (key.clone(), normalize(&map[key.as_str()])))
                    .collect(),
            )
        }
        other => other.clone(),
    }
}

/// Canonical JSON text of a tree: sorted keys, no whitespace
pub fn canonical(tree: &KeyTree) -> String {
    normalize(&Value::Object(tree.clone())).to_string()
}

/// Compare canonical forms; leaf values count, so translated content differs
pub fn structural_status(source: &KeyTree, target: Option<&KeyTree>) -> StructuralStatus {
    match target {
        None => StructuralStatus::MissingFile,
        Some(target) if canonical(source) == canonical(target) => StructuralStatus::Ok,
        Some(_) => StructuralStatus::Outdated,
    }
}

/// Same tree with every leaf replaced by `null`
pub fn shape(tree: &KeyTree) -> KeyTree {
    tree.iter()
        .map(|(key, value)| {
            let value = match value {
                Value::Object(child) => Value::Object(shape(child)),
                _ => Value::Null,
            };
            (key.clone(), value)
        })
        .collect()
}

/// Like [`structural_status`] but ignoring leaf values
pub fn shape_status(source: &KeyTree, target: Option<&KeyTree>) -> StructuralStatus {
    let target_shape = target.map(shape);
    structural_status(&shape(source), target_shape.as_ref())
}

/// Missing-key diagnostic for one target language
pub fn missing_report(source: &KeyTree, target: Option<&KeyTree>) -> MissingReport {
    let Some(target) = target else {
        return MissingReport::MissingFile;
    };
    let missing = missing_keys(&flatten(source), &flatten(target));
    if missing.is_empty() {
        MissingReport::Complete
    } else {
        MissingReport::Missing(missing)
    }
}
