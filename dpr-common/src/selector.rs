//! Hierarchical selector filter
//!
//! The user narrows the catalogue by picking one child under a class, then
//! optionally one child under that child, and so on. Each pick is stored as a
//! `parent -> child` entry; a run of entries forms a selection chain whose
//! last link is the active filter for that branch. Items pass when they belong
//! to the subtree of every active selector.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::catalogue::{Pattern, TaggedItem, Variant};
use crate::taxonomy::TaxonomyTree;
use crate::Result;

/// Ordered `parent -> chosen child` entries
///
/// Entry order is the order in which parents were first selected.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SelectorState {
    entries: Vec<(String, String)>,
}

impl SelectorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    /// Child chosen under `parent`, if any
    pub fn get(&self, parent: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(p, _)| p == parent)
            .map(|(_, c)| c.as_str())
    }

    /// Set the child chosen under `parent`, replacing any earlier choice
    ///
    /// Replacing a choice drops the selections chained below the old child,
    /// so every entry stays on an unbroken chain. Returns the dropped entries.
    pub fn select(&mut self, parent: &str, child: &str) -> Vec<(String, String)> {
        let old = match self.get(parent) {
            Some(old) if old == child => return Vec::new(),
            Some(old) => Some(old.to_string()),
            None => None,
        };
        let dropped = match &old {
            Some(old) => self.remove_chain_below(old),
            None => Vec::new(),
        };

        match self.entries.iter_mut().find(|(p, _)| p == parent) {
            Some(entry) => entry.1 = child.to_string(),
            None => self.entries.push((parent.to_string(), child.to_string())),
        }
        dropped
    }

    /// Remove the entry targeting `class_id` and every entry chained below it
    ///
    /// Returns the removed entries, upstream first.
    pub fn deselect(&mut self, class_id: &str) -> Vec<(String, String)> {
        let mut removed = Vec::new();
        if let Some(pos) = self.entries.iter().position(|(_, c)| c == class_id) {
            removed.push(self.entries.remove(pos));
        }
        removed.extend(self.remove_chain_below(class_id));
        removed
    }

    /// Remove the entries chained below `class_id`, top first
    fn remove_chain_below(&mut self, class_id: &str) -> Vec<(String, String)> {
        let mut removed = Vec::new();
        let mut key = class_id.to_string();
        while let Some(pos) = self.entries.iter().position(|(p, _)| *p == key) {
            let entry = self.entries.remove(pos);
            key = entry.1.clone();
            removed.push(entry);
        }
        removed
    }

    /// Most specific choice of every chain
    ///
    /// A chosen id that is itself a key with a further choice is an
    /// intermediate link and is left out.
    pub fn active_selectors(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, child)| self.get(child).is_none())
            .map(|(_, child)| child.as_str())
            .collect()
    }

    /// Chosen ids below `root`, following the chain down
    pub fn chain_from(&self, root: &str) -> Vec<&str> {
        let mut chain = Vec::new();
        let mut key = root;
        while let Some(next) = self.get(key) {
            if chain.len() > self.entries.len() {
                break;
            }
            chain.push(next);
            key = next;
        }
        chain
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// True when `item` belongs to `selector` or any class below it
pub fn matches(tree: &TaxonomyTree, selector: &str, item: &TaggedItem) -> bool {
    if item.class_ids.contains(selector) {
        return true;
    }
    match tree.get(selector) {
        Some(node) => node.children.iter().any(|child| matches(tree, child, item)),
        None => false,
    }
}

/// One exploration session's filter state
#[derive(Debug, Clone)]
pub struct SelectorFilterEngine {
    tree: Arc<TaxonomyTree>,
    state: SelectorState,
    search: String,
    page: usize,
}

impl SelectorFilterEngine {
    pub fn new(tree: Arc<TaxonomyTree>) -> Self {
        Self {
            tree,
            state: SelectorState::new(),
            search: String::new(),
            page: 1,
        }
    }

    pub fn tree(&self) -> &TaxonomyTree {
        &self.tree
    }

    pub fn state(&self) -> &SelectorState {
        &self.state
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    /// Current page (1-indexed); reset to 1 whenever the filter changes
    pub fn page(&self) -> usize {
        self.page
    }

    pub fn set_page(&mut self, page: usize) {
        self.page = page.max(1);
    }

    /// Choose `child_id` under `parent_id`
    ///
    /// Only existence is checked; callers offer the legal children.
    pub fn select(&mut self, parent_id: &str, child_id: &str) -> Result<()> {
        self.tree.node(parent_id)?;
        self.tree.node(child_id)?;
        let dropped = self.state.select(parent_id, child_id);
        self.page = 1;
        debug!(parent = %parent_id, child = %child_id, dropped = dropped.len(), "Selector chosen");
        Ok(())
    }

    /// Drop `class_id` and every selection made below it
    pub fn deselect(&mut self, class_id: &str) -> Vec<(String, String)> {
        let removed = self.state.deselect(class_id);
        self.page = 1;
        debug!(class = %class_id, removed = removed.len(), "Selector removed");
        removed
    }

    /// Clear every selection and return to the first page
    pub fn reset_selection(&mut self) {
        self.state.clear();
        self.page = 1;
        debug!("Selectors reset");
    }

    pub fn set_search(&mut self, search: &str) {
        if self.search != search {
            self.search = search.to_string();
            self.page = 1;
        }
    }

    pub fn active_selectors(&self) -> Vec<&str> {
        self.state.active_selectors()
    }

    /// Selections made under a selector tab, top to bottom
    pub fn choice_chain(&self, root: &str) -> Vec<&str> {
        self.state.chain_from(root)
    }

    pub fn matches(&self, selector: &str, item: &TaggedItem) -> bool {
        matches(&self.tree, selector, item)
    }

    /// True when `item` falls under every active selector
    pub fn passes(&self, item: &TaggedItem) -> bool {
        self.active_selectors()
            .into_iter()
            .all(|selector| self.matches(selector, item))
    }

    /// Items whose label contains `search_text` and that pass every active
    /// selector, in input order
    pub fn filter<'a>(&self, items: &'a [TaggedItem], search_text: &str) -> Vec<&'a TaggedItem> {
        items
            .iter()
            .filter(|item| item.label_contains(search_text) && self.passes(item))
            .collect()
    }

    /// `filter` using the session's own search text
    pub fn filtered<'a>(&self, items: &'a [TaggedItem]) -> Vec<&'a TaggedItem> {
        self.filter(items, &self.search)
    }

    /// Patterns narrowed by label search and selectors
    ///
    /// The search applies to the pattern label. Proposals failing a selector
    /// are pruned, then variants left without proposals, then patterns left
    /// without variants. Empty groups are dropped even with no selector.
    pub fn filter_patterns(&self, patterns: &[Pattern], search_text: &str) -> Vec<Pattern> {
        let selectors = self.active_selectors();
        patterns
            .iter()
            .filter(|p| {
                search_text.is_empty()
                    || p.label.to_lowercase().contains(&search_text.to_lowercase())
            })
            .filter_map(|pattern| {
                let variants: Vec<Variant> = pattern
                    .variants
                    .iter()
                    .filter_map(|variant| {
                        let proposals: Vec<TaggedItem> = variant
                            .proposals
                            .iter()
                            .filter(|p| selectors.iter().all(|s| self.matches(s, p)))
                            .cloned()
                            .collect();
                        (!proposals.is_empty()).then(|| Variant {
                            proposals,
                            ..variant.clone()
                        })
                    })
                    .collect();
                (!variants.is_empty()).then(|| Pattern {
                    variants,
                    ..pattern.clone()
                })
            })
            .collect()
    }
}
