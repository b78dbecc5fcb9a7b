//! Offline catalogue source backed by a JSON snapshot
//!
//! Snapshot layout:
//! ```json
//! { "classes": [ClassRecord], "items": [TaggedItem], "patterns": [Pattern] }
//! ```
//! `items` defaults to the proposals of `patterns` when omitted.

use std::collections::{HashMap, VecDeque};
use std::path::Path;

use async_trait::async_trait;
use dpr_common::{ClassRecord, Pattern, TaggedItem, TaxonomyTree};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{group_by_pattern_class, BackendError, CatalogueSource};

/// Snapshot document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub classes: Vec<ClassRecord>,
    #[serde(default)]
    pub items: Vec<TaggedItem>,
    #[serde(default)]
    pub patterns: Vec<Pattern>,
}

/// In-memory source serving a loaded snapshot
#[derive(Debug, Clone)]
pub struct SnapshotSource {
    snapshot: Snapshot,
}

impl SnapshotSource {
    pub fn new(mut snapshot: Snapshot) -> Self {
        if snapshot.items.is_empty() {
            snapshot.items = snapshot
                .patterns
                .iter()
                .flat_map(|p| p.proposals().cloned())
                .collect();
        }
        Self { snapshot }
    }

    pub fn from_file(path: &Path) -> Result<Self, BackendError> {
        let content = std::fs::read_to_string(path)?;
        let snapshot: Snapshot = serde_json::from_str(&content)
            .map_err(|e| BackendError::Parse(format!("{}: {}", path.display(), e)))?;
        info!(
            classes = snapshot.classes.len(),
            items = snapshot.items.len(),
            patterns = snapshot.patterns.len(),
            "Loaded catalogue snapshot from {}",
            path.display()
        );
        Ok(Self::new(snapshot))
    }
}

#[async_trait]
impl CatalogueSource for SnapshotSource {
    fn name(&self) -> &'static str {
        "snapshot"
    }

    async fn health_check(&self) -> bool {
        true
    }

    /// Records reachable from `root_class` through the declared children
    ///
    /// When the root itself has no record, its children are the records
    /// naming it as parent.
    async fn load_taxonomy(&self, root_class: &str) -> Result<Vec<ClassRecord>, BackendError> {
        let by_id: HashMap<&str, &ClassRecord> = self
            .snapshot
            .classes
            .iter()
            .map(|r| (r.id.as_str(), r))
            .collect();

        let mut out = Vec::new();
        let mut queue: VecDeque<&str> = match by_id.get(root_class) {
            Some(root) => {
                out.push((*root).clone());
                root.children.iter().map(String::as_str).collect()
            }
            None => self
                .snapshot
                .classes
                .iter()
                .filter(|r| r.parent.as_deref() == Some(root_class))
                .map(|r| r.id.as_str())
                .collect(),
        };

        while let Some(id) = queue.pop_front() {
            // Dangling children are skipped; tree validation reports them on the parent
            let Some(record) = by_id.get(id) else {
                continue;
            };
            if out.len() > self.snapshot.classes.len() {
                break;
            }
            out.push((*record).clone());
            queue.extend(record.children.iter().map(String::as_str));
        }
        Ok(out)
    }

    async fn load_tagged_items(
        &self,
        filter_class_ids: &[String],
    ) -> Result<Vec<TaggedItem>, BackendError> {
        Ok(self
            .snapshot
            .items
            .iter()
            .filter(|item| filter_class_ids.iter().all(|c| item.class_ids.contains(c)))
            .cloned()
            .collect())
    }

    async fn load_patterns(&self, pattern_tree: &TaxonomyTree) -> Result<Vec<Pattern>, BackendError> {
        if self.snapshot.patterns.is_empty() {
            return Ok(group_by_pattern_class(self.snapshot.items.clone(), pattern_tree));
        }
        Ok(self.snapshot.patterns.clone())
    }
}
