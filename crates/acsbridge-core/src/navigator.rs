// ── Tree navigator ──
//
// Dotted-path reads over a `ConfigNode` tree. Absence is a normal
// outcome and is reported through `Lookup::Missing` or the caller's
// fallback, never through an error.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{Children, ConfigNode, Leaf, Scalar};

/// Result of walking a dotted path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup<'a> {
    /// Some segment does not exist.
    Missing,
    /// A leaf exists but holds no value (`Null` or `""`).
    Empty(&'a Leaf),
    /// A leaf with a value.
    Value(&'a Leaf),
    /// The path names an object.
    Container(&'a Children),
}

impl<'a> Lookup<'a> {
    pub fn exists(&self) -> bool {
        !matches!(self, Self::Missing)
    }

    /// The leaf at the path, empty or not.
    pub fn leaf(&self) -> Option<&'a Leaf> {
        match *self {
            Self::Empty(leaf) | Self::Value(leaf) => Some(leaf),
            Self::Missing | Self::Container(_) => None,
        }
    }
}

/// What [`get`] hands back: an unwrapped scalar or the container itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Found<'a> {
    Scalar(&'a Scalar),
    Container(&'a Children),
}

fn walk<'a>(root: &'a ConfigNode, path: &str) -> Option<&'a ConfigNode> {
    let path = path.trim_end_matches('.');
    if path.is_empty() {
        return Some(root);
    }
    path.split('.').try_fold(root, |node, segment| node.child(segment))
}

/// Walk `path` and classify what is there.
pub fn lookup<'a>(root: &'a ConfigNode, path: &str) -> Lookup<'a> {
    match walk(root, path) {
        None => Lookup::Missing,
        Some(ConfigNode::Container { children }) => Lookup::Container(children),
        Some(ConfigNode::Leaf(leaf)) if leaf.value.is_empty() => Lookup::Empty(leaf),
        Some(ConfigNode::Leaf(leaf)) => Lookup::Value(leaf),
    }
}

/// Value at `path`, or `fallback` when the path is missing or the leaf is empty.
pub fn get<'a>(root: &'a ConfigNode, path: &str, fallback: Found<'a>) -> Found<'a> {
    match lookup(root, path) {
        Lookup::Value(leaf) => Found::Scalar(&leaf.value),
        Lookup::Container(children) => Found::Container(children),
        Lookup::Missing | Lookup::Empty(_) => fallback,
    }
}

/// Scalar shorthand for [`get`]: containers also yield `fallback`.
pub fn get_scalar<'a>(root: &'a ConfigNode, path: &str, fallback: &'a Scalar) -> &'a Scalar {
    match lookup(root, path) {
        Lookup::Value(leaf) => &leaf.value,
        _ => fallback,
    }
}

pub fn exists(root: &ConfigNode, path: &str) -> bool {
    lookup(root, path).exists()
}

// ── Flattened listing ───────────────────────────────────────────────

/// One leaf of the tree with its full path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterInfo {
    pub path: String,
    pub value: Scalar,
    pub wire_type: String,
    pub writable: bool,
    pub observed_at: Option<DateTime<Utc>>,
}

impl ParameterInfo {
    /// Second path segment (`WiFi`, `LANDevice`, `DeviceInfo`, ...), or the
    /// first when the path has only one.
    pub fn category(&self) -> &str {
        let mut segments = self.path.split('.');
        let first = segments.next().unwrap_or_default();
        segments.next().unwrap_or(first)
    }
}

fn collect(node: &ConfigNode, prefix: &mut String, out: &mut Vec<ParameterInfo>) {
    match node {
        ConfigNode::Leaf(leaf) => out.push(ParameterInfo {
            path: prefix.clone(),
            value: leaf.value.clone(),
            wire_type: leaf.wire_type.clone(),
            writable: leaf.writable,
            observed_at: leaf.observed_at,
        }),
        ConfigNode::Container { children } => {
            for (name, child) in children {
                let restore = prefix.len();
                if !prefix.is_empty() {
                    prefix.push('.');
                }
                prefix.push_str(name);
                collect(child, prefix, out);
                prefix.truncate(restore);
            }
        }
    }
}

/// Every leaf under `root`, ordered by path segments.
pub fn flatten(root: &ConfigNode) -> Vec<ParameterInfo> {
    let mut out = Vec::new();
    collect(root, &mut String::new(), &mut out);
    out
}

pub fn writable_only(params: Vec<ParameterInfo>) -> Vec<ParameterInfo> {
    params.into_iter().filter(|p| p.writable).collect()
}

pub fn group_by_category(params: Vec<ParameterInfo>) -> BTreeMap<String, Vec<ParameterInfo>> {
    let mut groups: BTreeMap<String, Vec<ParameterInfo>> = BTreeMap::new();
    for param in params {
        groups
            .entry(param.category().to_owned())
            .or_default()
            .push(param);
    }
    groups
}
