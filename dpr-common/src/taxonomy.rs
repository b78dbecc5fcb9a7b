//! Taxonomy tree shared by the quiz and the selector filter
//!
//! Nodes live in an arena (`Vec<TaxonomyNode>`) indexed by id. The structure is
//! validated once at construction and is immutable afterwards; per-session
//! state such as quiz answers is kept outside the tree.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Class description as delivered by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassRecord {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub parent: Option<String>,
    /// Ordered child ids; order defines traversal and display order
    #[serde(default)]
    pub children: Vec<String>,
    /// Marks classes offered as selector tabs
    #[serde(default)]
    pub initial: bool,
}

impl ClassRecord {
    pub fn new(id: impl Into<String>, parent: Option<&str>, children: &[&str]) -> Self {
        Self {
            id: id.into(),
            label: None,
            parent: parent.map(str::to_string),
            children: children.iter().map(|c| c.to_string()).collect(),
            initial: false,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn initial(mut self) -> Self {
        self.initial = true;
        self
    }
}

/// One validated node of the taxonomy
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaxonomyNode {
    pub id: String,
    pub label: String,
    pub parent: Option<String>,
    pub children: Vec<String>,
    pub initial: bool,
}

impl TaxonomyNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Rooted class hierarchy with arena storage
#[derive(Debug, Clone)]
pub struct TaxonomyTree {
    root: String,
    nodes: Vec<TaxonomyNode>,
    index: HashMap<String, usize>,
}

impl TaxonomyTree {
    /// Tree holding only the root sentinel
    ///
    /// Used when the backend is unavailable so that sessions can still be
    /// constructed (and immediately have nothing to ask or filter).
    pub fn empty(root_id: &str) -> Self {
        let root = TaxonomyNode {
            id: root_id.to_string(),
            label: label_from_id(root_id),
            parent: None,
            children: Vec::new(),
            initial: false,
        };
        Self {
            root: root_id.to_string(),
            index: HashMap::from([(root_id.to_string(), 0)]),
            nodes: vec![root],
        }
    }

    /// Build and validate a tree from backend records
    ///
    /// The root may be supplied among `records`; when it is not, a sentinel
    /// root is synthesized whose children are the records naming `root_id` as
    /// parent, in input order.
    ///
    /// # Errors
    /// `Error::MalformedTree` on duplicate ids, missing child references,
    /// parent/child disagreement, dangling parents, extra roots or cycles.
    pub fn build(root_id: &str, records: Vec<ClassRecord>) -> Result<Self> {
        let mut nodes = Vec::with_capacity(records.len() + 1);
        let mut index = HashMap::with_capacity(records.len() + 1);

        if !records.iter().any(|r| r.id == root_id) {
            let children = records
                .iter()
                .filter(|r| r.parent.as_deref() == Some(root_id))
                .map(|r| r.id.clone())
                .collect();
            index.insert(root_id.to_string(), 0);
            nodes.push(TaxonomyNode {
                id: root_id.to_string(),
                label: label_from_id(root_id),
                parent: None,
                children,
                initial: false,
            });
        }

        for record in records {
            if index.contains_key(&record.id) {
                return Err(Error::MalformedTree(format!("duplicate class id {}", record.id)));
            }
            let parent = if record.id == root_id { None } else { record.parent };
            index.insert(record.id.clone(), nodes.len());
            nodes.push(TaxonomyNode {
                label: record
                    .label
                    .filter(|l| !l.trim().is_empty())
                    .unwrap_or_else(|| label_from_id(&record.id)),
                id: record.id,
                parent,
                children: record.children,
                initial: record.initial,
            });
        }

        let tree = Self {
            root: root_id.to_string(),
            nodes,
            index,
        };
        tree.validate()?;

        tracing::debug!(root = %tree.root, nodes = tree.nodes.len(), "Taxonomy tree built");
        Ok(tree)
    }

    fn validate(&self) -> Result<()> {
        let mut listed = HashSet::new();

        for node in &self.nodes {
            for child_id in &node.children {
                let child = self.get(child_id).ok_or_else(|| {
                    Error::MalformedTree(format!("{} lists missing child {}", node.id, child_id))
                })?;
                if child.parent.as_deref() != Some(node.id.as_str()) {
                    return Err(Error::MalformedTree(format!(
                        "{} lists {} as child but its parent is {:?}",
                        node.id, child_id, child.parent
                    )));
                }
                if !listed.insert(child_id.as_str()) {
                    return Err(Error::MalformedTree(format!("{} listed more than once", child_id)));
                }
            }
        }

        for node in &self.nodes {
            if node.id == self.root {
                continue;
            }
            match node.parent.as_deref() {
                None => {
                    return Err(Error::MalformedTree(format!(
                        "{} has no parent but {} is the root",
                        node.id, self.root
                    )))
                }
                Some(parent) if !self.index.contains_key(parent) => {
                    return Err(Error::MalformedTree(format!(
                        "{} references missing parent {}",
                        node.id, parent
                    )))
                }
                Some(parent) if !listed.contains(node.id.as_str()) => {
                    return Err(Error::MalformedTree(format!(
                        "{} is not listed among the children of {}",
                        node.id, parent
                    )))
                }
                Some(_) => {}
            }
        }

        // Ancestor walks longer than the node count can only loop
        for node in &self.nodes {
            let mut steps = 0;
            let mut current = node;
            while let Some(parent) = current.parent.as_deref() {
                steps += 1;
                if steps > self.nodes.len() {
                    return Err(Error::MalformedTree(format!("cycle through {}", node.id)));
                }
                current = &self.nodes[self.index[parent]];
            }
            if current.id != self.root {
                return Err(Error::MalformedTree(format!(
                    "{} is not reachable from {}",
                    node.id, self.root
                )));
            }
        }

        Ok(())
    }

    pub fn root_id(&self) -> &str {
        &self.root
    }

    /// Number of nodes including the root
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the tree holds nothing but its root
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&TaxonomyNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    /// Like `get`, reporting unknown ids as errors
    pub fn node(&self, id: &str) -> Result<&TaxonomyNode> {
        self.get(id).ok_or_else(|| Error::UnknownNode(id.to_string()))
    }

    pub fn children_of(&self, id: &str) -> Result<&[String]> {
        Ok(&self.node(id)?.children)
    }

    pub fn parent_of(&self, id: &str) -> Result<Option<&str>> {
        Ok(self.node(id)?.parent.as_deref())
    }

    pub fn is_leaf(&self, id: &str) -> Result<bool> {
        Ok(self.node(id)?.is_leaf())
    }

    /// Ids from `id` up to the root, both inclusive, ordered child to root
    pub fn ancestors_of(&self, id: &str) -> Result<Vec<&str>> {
        let mut chain = Vec::new();
        let mut current = Some(self.node(id)?);
        while let Some(node) = current {
            chain.push(node.id.as_str());
            current = node.parent.as_deref().and_then(|p| self.get(p));
        }
        Ok(chain)
    }

    /// Direct children of the root in declared order
    ///
    /// Every root child is a quiz entry point, leaves included; a leaf entry
    /// point is asked as a single question.
    pub fn top_level_questions(&self) -> Vec<&str> {
        self.nodes[self.index[&self.root]]
            .children
            .iter()
            .map(String::as_str)
            .collect()
    }

    /// Root children flagged `initial` that have something to choose from
    pub fn selector_roots(&self) -> Vec<&TaxonomyNode> {
        self.top_level_questions()
            .into_iter()
            .filter_map(|id| self.get(id))
            .filter(|n| n.initial && !n.is_leaf())
            .collect()
    }

    /// Strict descendants of `id` in pre-order (parent before children,
    /// children in declared order)
    pub fn descendants_preorder(&self, id: &str) -> Result<Vec<&str>> {
        let node = self.node(id)?;
        let mut out = Vec::new();
        let mut stack: Vec<&str> = node.children.iter().rev().map(String::as_str).collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            if let Some(n) = self.get(next) {
                stack.extend(n.children.iter().rev().map(String::as_str));
            }
        }
        Ok(out)
    }

    /// Every node in pre-order starting at the root
    pub fn preorder(&self) -> Vec<&TaxonomyNode> {
        let mut out = Vec::with_capacity(self.nodes.len());
        out.push(&self.nodes[self.index[&self.root]]);
        if let Ok(ids) = self.descendants_preorder(&self.root) {
            out.extend(ids.into_iter().filter_map(|id| self.get(id)));
        }
        out
    }

    /// Labels from `id` up to (excluding) the root
    ///
    /// Unknown ids yield an empty path.
    pub fn class_path_labels(&self, id: &str) -> Vec<&str> {
        self.ancestors_of(id)
            .unwrap_or_default()
            .into_iter()
            .filter(|a| *a != self.root)
            .filter_map(|a| self.get(a).map(|n| n.label.as_str()))
            .collect()
    }
}

/// Derive a display label from a class id such as `onto:DataMinimization`
///
/// Takes the local name after the last `#`, `/` or `:` and splits CamelCase
/// into words.
pub fn label_from_id(id: &str) -> String {
    let local = id.rsplit(&['#', '/', ':'][..]).next().unwrap_or(id);
    let mut label = String::with_capacity(local.len() + 4);
    let mut prev: Option<char> = None;
    for c in local.chars() {
        if c == '_' || c == '-' {
            if !label.ends_with(' ') && !label.is_empty() {
                label.push(' ');
            }
            prev = Some(' ');
            continue;
        }
        if let Some(p) = prev {
            if c.is_uppercase() && (p.is_lowercase() || p.is_ascii_digit()) {
                label.push(' ');
            }
        }
        label.push(c);
        prev = Some(c);
    }
    label
}
