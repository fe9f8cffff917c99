// ── Path catalog ──
//
// Single registry mapping each logical key to its ordered candidate
// paths. Read and write candidates are kept apart: a key may be readable
// from a status field but writable only through a config field.

mod builtin;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use tracing::warn;

use crate::codec::ValueSpec;
use crate::model::{DataModel, LogicalKey};

/// Functional grouping of logical keys.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Category {
    Device,
    Wan,
    Lan,
    Wifi,
    Management,
}

/// One concrete location for a logical key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathCandidate {
    pub path: String,
    /// Documentation only; resolution order is list order.
    pub generation: DataModel,
    /// Vendor family that uses this location, when it is not generic.
    pub variant: Option<String>,
}

impl PathCandidate {
    pub fn new(path: impl Into<String>, generation: DataModel) -> Self {
        Self {
            path: path.into(),
            generation,
            variant: None,
        }
    }

    pub fn vendor(mut self, variant: &str) -> Self {
        self.variant = Some(variant.to_owned());
        self
    }

    /// Generation inferred from the root segment.
    fn from_path(path: &str) -> Self {
        let generation = if path.starts_with("Device.") {
            DataModel::Tr181
        } else {
            DataModel::Tr098
        };
        Self::new(path, generation)
    }
}

/// Everything the resolver and codec need to know about one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub key: LogicalKey,
    pub category: Category,
    pub label: String,
    pub value: ValueSpec,
    /// Candidates for display, most preferred first.
    pub read: Vec<PathCandidate>,
    /// Candidates for writes. Empty for read-only keys.
    pub write: Vec<PathCandidate>,
}

impl CatalogEntry {
    pub fn is_writable(&self) -> bool {
        !self.write.is_empty()
    }
}

/// Operator-supplied extra candidates, tried before the built-in ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogOverride {
    pub key: String,
    #[serde(default)]
    pub read: Vec<String>,
    #[serde(default)]
    pub write: Vec<String>,
}

/// Immutable catalog, shared behind an `Arc` by every component.
#[derive(Debug, Clone)]
pub struct PathCatalog {
    entries: IndexMap<LogicalKey, CatalogEntry>,
}

impl Default for PathCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PathCatalog {
    /// The built-in catalog.
    pub fn builtin() -> Self {
        Self::from_entries(builtin::entries())
    }

    /// A catalog with exactly these entries, in this order.
    pub fn from_entries(entries: impl IntoIterator<Item = CatalogEntry>) -> Self {
        Self {
            entries: entries.into_iter().map(|e| (e.key.clone(), e)).collect(),
        }
    }

    /// Built-in catalog with operator overrides applied.
    pub fn with_overrides(overrides: &[CatalogOverride]) -> Self {
        let mut catalog = Self::builtin();
        for o in overrides {
            catalog.apply_override(o);
        }
        catalog
    }

    fn apply_override(&mut self, o: &CatalogOverride) {
        let Some(entry) = self.entries.get_mut(o.key.as_str()) else {
            warn!(key = %o.key, "ignoring catalog override for unknown key");
            return;
        };

        fn prepend(list: &mut Vec<PathCandidate>, extra: &[String]) {
            let mut merged: Vec<PathCandidate> =
                extra.iter().map(|p| PathCandidate::from_path(p)).collect();
            merged.extend(
                list.drain(..)
                    .filter(|c| !extra.iter().any(|p| p == &c.path)),
            );
            *list = merged;
        }

        prepend(&mut entry.read, &o.read);
        prepend(&mut entry.write, &o.write);
    }

    pub fn get(&self, key: &str) -> Option<&CatalogEntry> {
        self.entries.get(key)
    }

    /// Read candidates for `key`; empty for unknown keys.
    pub fn candidates(&self, key: &str) -> &[PathCandidate] {
        self.get(key).map_or(&[], |e| e.read.as_slice())
    }

    pub fn write_candidates(&self, key: &str) -> &[PathCandidate] {
        self.get(key).map_or(&[], |e| e.write.as_slice())
    }

    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values()
    }

    /// Keys in catalog order, optionally restricted to one category.
    pub fn keys(&self, category: Option<Category>) -> Vec<&LogicalKey> {
        self.entries
            .values()
            .filter(|e| category.is_none_or(|c| e.category == c))
            .map(|e| &e.key)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
