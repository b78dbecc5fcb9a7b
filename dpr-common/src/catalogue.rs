//! Catalogue models: tagged items and their pattern grouping

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// An item classified under one or more taxonomy nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedItem {
    pub key: String,
    pub label: String,
    /// Direct class memberships (not necessarily leaves)
    #[serde(default)]
    pub class_ids: BTreeSet<String>,
}

impl TaggedItem {
    pub fn new(key: impl Into<String>, label: impl Into<String>, class_ids: &[&str]) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            class_ids: class_ids.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Case-insensitive substring match on the label
    pub fn label_contains(&self, search: &str) -> bool {
        search.is_empty() || self.label.to_lowercase().contains(&search.to_lowercase())
    }
}

/// A variant of a pattern; each proposal is a classified item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub key: String,
    pub label: String,
    #[serde(default)]
    pub proposals: Vec<TaggedItem>,
}

/// A canonical pattern grouping its variants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub key: String,
    pub label: String,
    #[serde(default)]
    pub variants: Vec<Variant>,
}

impl Pattern {
    pub fn proposal_count(&self) -> usize {
        self.variants.iter().map(|v| v.proposals.len()).sum()
    }

    pub fn proposals(&self) -> impl Iterator<Item = &TaggedItem> {
        self.variants.iter().flat_map(|v| v.proposals.iter())
    }

    /// Short summary such as "2 variants / 1 proposal"
    pub fn stats(&self) -> String {
        let variants = self.variants.len();
        let proposals = self.proposal_count();
        if variants == 0 {
            return "No variants and proposals.".to_string();
        }
        let variant_part = format!("{} variant{}", variants, plural(variants));
        if proposals == 0 {
            format!("{} / No proposals.", variant_part)
        } else {
            format!("{} / {} proposal{}", variant_part, proposals, plural(proposals))
        }
    }
}

fn plural(n: usize) -> &'static str {
    if n > 1 {
        "s"
    } else {
        ""
    }
}
