//! Conversion between nested locale trees and flat dotted-path maps
//!
//! A locale file is a tree of JSON objects whose leaves are translations:
//!
//! ```json
//! { "menu": { "file": "File", "quit": "Quit" }, "title": "Editor" }
//! ```
//!
//! Diffing and batching work on the flat form instead:
//!
//! ```text
//! menu.file → "File"
//! menu.quit → "Quit"
//! title     → "Editor"
//! ```
//!
//! Arrays are leaves and are never traversed into. Empty objects carry no
//! leaves, so they do not survive a `flatten`/`unflatten` cycle.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// Nested key/value tree of one language
pub type KeyTree = Map<String, Value>;

/// Dotted key-path → leaf value
pub type FlatMap = BTreeMap<String, Value>;

/// Separator between path segments
pub const KEY_SEPARATOR: char = '.';

/// Flatten a tree into dotted paths, depth first
pub fn flatten(tree: &KeyTree) -> FlatMap {
    let mut out = FlatMap::new();
    flatten_into(tree, None, &mut out);
    out
}

fn flatten_into(tree: &KeyTree, prefix: Option<&str>, out: &mut FlatMap) {
    for (key, value) in tree {
        let path = match prefix {
            Some(prefix) => format!("{}{}{}", prefix, KEY_SEPARATOR, key),
            None => key.clone(),
        };
        match value {
            Value::Object(child) => flatten_into(child, Some(&path), out),
            leaf => {
                out.insert(path, leaf.clone());
            }
        }
    }
}

/// Rebuild a tree from dotted paths
///
/// Paths are applied in ascending order and a later path overwrites whatever
/// an earlier one left in its way. When both `a` and `a.b` are present, `a`
/// sorts first, so the nested object built for `a.b` replaces the leaf `a`.
pub fn unflatten(flat: &FlatMap) -> KeyTree {
    let mut root = KeyTree::new();
    for (path, value) in flat {
        let segments: Vec<&str> = path.split(KEY_SEPARATOR).collect();
        insert_path(&mut root, &segments, value.clone());
    }
    root
}

fn insert_path(node: &mut KeyTree, segments: &[&str], value: Value) {
    match segments {
        [] => {}
        [leaf] => {
            node.insert((*leaf).to_string(), value);
        }
        [head, rest @ ..] => {
            let slot = node
                .entry((*head).to_string())
                .or_insert_with(|| Value::Object(KeyTree::new()));
            if let Value::Object(child) = slot {
                insert_path(child, rest, value);
            } else {
                // A leaf sits where an object is needed
                let mut child = KeyTree::new();
                insert_path(&mut child, rest, value);
                *slot = Value::Object(child);
            }
        }
    }
}
