//! Catalogue loaded once at startup
//!
//! Fetch failures degrade to empty inputs so the engine always starts; a
//! taxonomy that arrives but violates the tree invariants is kept as an error
//! and refuses every session that needs it.

use std::sync::Arc;

use dpr_common::config::BackendConfig;
use dpr_common::{Error, Pattern, TaggedItem, TaxonomyTree};
use tracing::{error, info, warn};

use crate::backend::CatalogueSource;

/// A taxonomy, or the reason it could not be built
pub type TreeSlot = std::result::Result<Arc<TaxonomyTree>, String>;

/// Everything the engine reads during a session
#[derive(Debug, Clone)]
pub struct Catalogue {
    /// Quiz questions
    pub problems: TreeSlot,
    /// Selector tabs for exploration
    pub classes: TreeSlot,
    /// Pattern classes, used for grouping and class paths
    pub pattern_classes: Arc<TaxonomyTree>,
    pub items: Arc<Vec<TaggedItem>>,
    pub patterns: Arc<Vec<Pattern>>,
}

impl Catalogue {
    /// Build directly from materialized parts
    pub fn new(
        problems: TreeSlot,
        classes: TreeSlot,
        pattern_classes: Arc<TaxonomyTree>,
        items: Vec<TaggedItem>,
        patterns: Vec<Pattern>,
    ) -> Self {
        Self {
            problems,
            classes,
            pattern_classes,
            items: Arc::new(items),
            patterns: Arc::new(patterns),
        }
    }

    /// Fetch everything from `source`
    pub async fn load(source: &dyn CatalogueSource, config: &BackendConfig) -> Self {
        let problems = load_tree(source, &config.problem_root).await;
        let classes = load_tree(source, &config.explore_root).await;
        let pattern_classes = load_tree(source, &config.pattern_root)
            .await
            .unwrap_or_else(|_| Arc::new(TaxonomyTree::empty(&config.pattern_root)));

        let items = match source.load_tagged_items(&[]).await {
            Ok(items) => items,
            Err(e) => {
                warn!("Failed to load catalogue items from {}: {}", source.name(), e);
                Vec::new()
            }
        };
        let patterns = match source.load_patterns(&pattern_classes).await {
            Ok(patterns) => patterns,
            Err(e) => {
                warn!("Failed to load patterns from {}: {}", source.name(), e);
                Vec::new()
            }
        };

        info!(
            items = items.len(),
            patterns = patterns.len(),
            "Catalogue loaded from {}",
            source.name()
        );
        Self::new(problems, classes, pattern_classes, items, patterns)
    }

    pub fn problems(&self) -> dpr_common::Result<Arc<TaxonomyTree>> {
        self.problems.clone().map_err(Error::MalformedTree)
    }

    pub fn classes(&self) -> dpr_common::Result<Arc<TaxonomyTree>> {
        self.classes.clone().map_err(Error::MalformedTree)
    }
}

async fn load_tree(source: &dyn CatalogueSource, root: &str) -> TreeSlot {
    let records = match source.load_taxonomy(root).await {
        Ok(records) => records,
        Err(e) => {
            warn!("Failed to load taxonomy {} from {}: {}", root, source.name(), e);
            return Ok(Arc::new(TaxonomyTree::empty(root)));
        }
    };
    match TaxonomyTree::build(root, records) {
        Ok(tree) => {
            info!(root = %root, nodes = tree.len(), "Taxonomy ready");
            Ok(Arc::new(tree))
        }
        Err(e) => {
            error!("Cannot load classification {}: {}", root, e);
            Err(e.to_string())
        }
    }
}
