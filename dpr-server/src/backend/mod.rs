//! Taxonomy and catalogue sources
//!
//! The engine never talks to the graph store itself. A `CatalogueSource`
//! materializes class records and tagged items up front; failures stay here
//! and are turned into empty inputs by the caller.

use async_trait::async_trait;
use dpr_common::{ClassRecord, Pattern, TaggedItem, TaxonomyTree, Variant};
use thiserror::Error;

pub mod snapshot;
pub mod sparql;

pub use snapshot::SnapshotSource;
pub use sparql::SparqlClient;

/// Source errors
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Backend returned {0}: {1}")]
    Status(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where the taxonomy and the catalogue come from
#[async_trait]
pub trait CatalogueSource: Send + Sync {
    /// Short name for logs and the health endpoint
    fn name(&self) -> &'static str;

    /// Whether the source currently answers queries
    async fn health_check(&self) -> bool;

    /// Every class below `root_class`, with ordered children
    async fn load_taxonomy(&self, root_class: &str) -> Result<Vec<ClassRecord>, BackendError>;

    /// Items typed with every class in `filter_class_ids`
    ///
    /// An empty filter returns the whole catalogue. The first class is the
    /// primary constraint; the rest narrow it conjunctively.
    async fn load_tagged_items(
        &self,
        filter_class_ids: &[String],
    ) -> Result<Vec<TaggedItem>, BackendError>;

    /// Catalogue grouped into patterns
    ///
    /// Defaults to one pattern per pattern class, each item being one variant
    /// holding itself as its single proposal.
    async fn load_patterns(&self, pattern_tree: &TaxonomyTree) -> Result<Vec<Pattern>, BackendError> {
        let items = self.load_tagged_items(&[]).await?;
        Ok(group_by_pattern_class(items, pattern_tree))
    }
}

/// Group items under the most specific pattern class they are typed with
///
/// Items with no class inside `pattern_tree` are left out. Patterns appear in
/// the order their first item appears.
pub fn group_by_pattern_class(items: Vec<TaggedItem>, pattern_tree: &TaxonomyTree) -> Vec<Pattern> {
    let mut patterns: Vec<Pattern> = Vec::new();

    for item in items {
        let class = item
            .class_ids
            .iter()
            .filter(|c| pattern_tree.contains(c) && *c != pattern_tree.root_id())
            .max_by_key(|c| pattern_tree.ancestors_of(c).map(|a| a.len()).unwrap_or(0));
        let Some(class) = class.cloned() else {
            continue;
        };

        let variant = Variant {
            key: item.key.clone(),
            label: item.label.clone(),
            proposals: vec![item],
        };
        match patterns.iter_mut().find(|p| p.key == class) {
            Some(pattern) => pattern.variants.push(variant),
            None => patterns.push(Pattern {
                label: pattern_tree
                    .get(&class)
                    .map(|n| n.label.clone())
                    .unwrap_or_else(|| class.clone()),
                key: class,
                variants: vec![variant],
            }),
        }
    }
    patterns
}
