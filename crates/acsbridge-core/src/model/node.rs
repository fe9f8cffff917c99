// ── Configuration tree nodes ──
//
// A device tree is a strict Leaf/Container variant. Every path resolves
// to exactly one node kind, so callers match instead of probing for
// `_value` wrappers.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Child map of a container node, ordered by segment name.
pub type Children = BTreeMap<String, ConfigNode>;

// ── Scalar ──────────────────────────────────────────────────────────

/// A single parameter value as reported by the device or edited by an
/// operator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    #[default]
    Null,
}

impl Scalar {
    /// `Null` and the empty string both count as "no value".
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Loose equality used when diffing edits: `6`, `6u64` and `"6"` are
    /// the same setting value.
    pub fn same_as(&self, other: &Self) -> bool {
        self == other || self.to_string() == other.to_string()
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::UInt(u) => write!(f, "{u}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
            Self::Null => Ok(()),
        }
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Scalar {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<u64> for Scalar {
    fn from(u: u64) -> Self {
        Self::UInt(u)
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

// ── Leaf ────────────────────────────────────────────────────────────

/// A terminal parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leaf {
    pub value: Scalar,
    /// Wire type tag exactly as reported (`xsd:string`, `xsd:unsignedInt`, ...).
    pub wire_type: String,
    pub writable: bool,
    pub observed_at: Option<DateTime<Utc>>,
}

impl Leaf {
    /// A writable leaf with no observation timestamp.
    pub fn new(value: impl Into<Scalar>, wire_type: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            wire_type: wire_type.into(),
            writable: true,
            observed_at: None,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }
}

// ── ConfigNode ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigNode {
    Leaf(Leaf),
    Container { children: Children },
}

impl Default for ConfigNode {
    fn default() -> Self {
        Self::container()
    }
}

impl ConfigNode {
    /// An empty container.
    pub fn container() -> Self {
        Self::Container {
            children: Children::new(),
        }
    }

    pub fn as_leaf(&self) -> Option<&Leaf> {
        match self {
            Self::Leaf(leaf) => Some(leaf),
            Self::Container { .. } => None,
        }
    }

    pub fn children(&self) -> Option<&Children> {
        match self {
            Self::Container { children } => Some(children),
            Self::Leaf(_) => None,
        }
    }

    pub fn child(&self, segment: &str) -> Option<&ConfigNode> {
        self.children().and_then(|c| c.get(segment))
    }

    /// Place `leaf` at a dotted path, creating intermediate containers.
    ///
    /// Returns `false` when a segment along the way is already a leaf.
    pub fn insert(&mut self, path: &str, leaf: Leaf) -> bool {
        let segments: Vec<&str> = path.trim_end_matches('.').split('.').collect();
        let Some((last, parents)) = segments.split_last() else {
            return false;
        };

        let mut node = self;
        for segment in parents {
            let Self::Container { children } = node else {
                return false;
            };
            node = children
                .entry((*segment).to_owned())
                .or_insert_with(Self::container);
        }

        match node {
            Self::Container { children } => {
                children.insert((*last).to_owned(), Self::Leaf(leaf));
                true
            }
            Self::Leaf(_) => false,
        }
    }

    /// Builder-style variant of [`insert`](Self::insert).
    pub fn with(mut self, path: &str, leaf: Leaf) -> Self {
        self.insert(path, leaf);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_means_null_or_blank_text() {
        assert!(Scalar::Null.is_empty());
        assert!(Scalar::from("").is_empty());
        assert!(!Scalar::from(" ").is_empty());
        assert!(!Scalar::Bool(false).is_empty());
        assert!(!Scalar::UInt(0).is_empty());
    }

    #[test]
    fn same_as_ignores_numeric_representation() {
        assert!(Scalar::Int(6).same_as(&Scalar::UInt(6)));
        assert!(Scalar::UInt(6).same_as(&Scalar::from("6")));
        assert!(Scalar::Bool(true).same_as(&Scalar::from("true")));
        assert!(!Scalar::Bool(true).same_as(&Scalar::from("1")));
    }

    #[test]
    fn insert_builds_intermediate_containers() {
        let root = ConfigNode::container()
            .with("Device.WiFi.SSID.1.SSID", Leaf::new("Home", "xsd:string"))
            .with("Device.WiFi.SSID.1.Enable", Leaf::new(true, "xsd:boolean"));

        let ssid = root
            .child("Device")
            .and_then(|n| n.child("WiFi"))
            .and_then(|n| n.child("SSID"))
            .and_then(|n| n.child("1"))
            .expect("SSID.1 container");
        assert_eq!(ssid.children().map(Children::len), Some(2));
    }

    #[test]
    fn insert_refuses_to_descend_through_a_leaf() {
        let mut root =
            ConfigNode::container().with("Device.DeviceInfo", Leaf::new("x", "xsd:string"));
        assert!(!root.insert("Device.DeviceInfo.Manufacturer", Leaf::new("ZTE", "xsd:string")));
        let info = root.child("Device").and_then(|n| n.child("DeviceInfo"));
        assert!(info.and_then(ConfigNode::as_leaf).is_some());
    }
}
