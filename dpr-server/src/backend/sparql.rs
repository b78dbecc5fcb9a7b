//! SPARQL-over-HTTP client for the pattern ontology store
//!
//! Queries are sent as form-encoded POSTs (`query=...`) and answered in the
//! SPARQL JSON results format. Class ids are kept in prefixed form
//! (`onto:Problem`); full IRIs returned by the store are compacted with the
//! same prefixes.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use dpr_common::{ClassRecord, TaggedItem};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{BackendError, CatalogueSource};

const USER_AGENT: &str = concat!("dpr-server/", env!("CARGO_PKG_VERSION"));

/// Prefixes declared on every query and used to compact result IRIs
pub const PREFIXES: [(&str, &str); 5] = [
    ("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#"),
    ("rdfs", "http://www.w3.org/2000/01/rdf-schema#"),
    ("owl", "http://www.w3.org/2002/07/owl#"),
    ("xsd", "http://www.w3.org/2001/XMLSchema#"),
    ("onto", "http://www.semanticweb.org/nicolas/ontologies/2021/8/patterns#"),
];

/// SPARQL JSON results document
#[derive(Debug, Deserialize)]
struct SparqlResponse {
    results: SparqlResults,
}

#[derive(Debug, Deserialize)]
struct SparqlResults {
    bindings: Vec<HashMap<String, SparqlTerm>>,
}

#[derive(Debug, Deserialize)]
struct SparqlTerm {
    value: String,
}

/// Graph store client
pub struct SparqlClient {
    http_client: reqwest::Client,
    endpoint: String,
    /// Default primary class for unfiltered item queries
    pattern_root: String,
}

impl SparqlClient {
    pub fn new(endpoint: &str, pattern_root: &str) -> Result<Self, BackendError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| BackendError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: endpoint.to_string(),
            pattern_root: pattern_root.to_string(),
        })
    }

    async fn select(&self, query: &str) -> Result<Vec<HashMap<String, String>>, BackendError> {
        let body = format!("{}\n{}", prefix_block(), query);
        debug!(endpoint = %self.endpoint, "Sending SPARQL query");

        let response = self
            .http_client
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, "application/sparql-results+json")
            .form(&[("query", body)])
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(BackendError::Status(status.as_u16(), error_text));
        }

        let parsed: SparqlResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()))?;

        Ok(parsed
            .results
            .bindings
            .into_iter()
            .map(|row| row.into_iter().map(|(k, v)| (k, v.value)).collect())
            .collect())
    }

    /// Direct subclasses of `class` with their optional labels, ordered by id
    async fn subclasses(&self, class: &str) -> Result<Vec<(String, Option<String>)>, BackendError> {
        let rows = self.select(&subclass_query(class)).await?;
        let mut seen = HashSet::new();
        Ok(rows
            .into_iter()
            .filter_map(|mut row| {
                let subject = compact_iri(&row.remove("subject")?);
                let label = row.remove("label");
                seen.insert(subject.clone()).then_some((subject, label))
            })
            .collect())
    }
}

#[async_trait]
impl CatalogueSource for SparqlClient {
    fn name(&self) -> &'static str {
        "sparql"
    }

    async fn health_check(&self) -> bool {
        match self.select("SELECT ?s ?p ?v WHERE { ?s ?p ?v } LIMIT 1").await {
            Ok(_) => true,
            Err(e) => {
                warn!("Graph store health check failed: {}", e);
                false
            }
        }
    }

    /// Breadth-first walk of `rdfs:subClassOf` starting at `root_class`
    ///
    /// A class reached through a second parent keeps its first parent only.
    async fn load_taxonomy(&self, root_class: &str) -> Result<Vec<ClassRecord>, BackendError> {
        let mut records: Vec<ClassRecord> = vec![ClassRecord::new(root_class, None, &[])];
        let mut positions: HashMap<String, usize> = HashMap::from([(root_class.to_string(), 0)]);
        let mut queue = VecDeque::from([root_class.to_string()]);

        while let Some(class) = queue.pop_front() {
            let children = self.subclasses(&class).await?;
            let parent_pos = positions[&class];

            for (child, label) in children {
                if positions.contains_key(&child) {
                    warn!(class = %child, parent = %class, "Ignoring additional superclass");
                    continue;
                }
                records[parent_pos].children.push(child.clone());
                positions.insert(child.clone(), records.len());
                records.push(ClassRecord {
                    id: child.clone(),
                    label,
                    parent: Some(class.clone()),
                    children: Vec::new(),
                    initial: class == root_class,
                });
                queue.push_back(child);
            }
        }

        debug!(root = %root_class, classes = records.len(), "Loaded class tree");
        Ok(records)
    }

    async fn load_tagged_items(
        &self,
        filter_class_ids: &[String],
    ) -> Result<Vec<TaggedItem>, BackendError> {
        let rows = self
            .select(&item_query(filter_class_ids, &self.pattern_root))
            .await?;

        let mut items: Vec<TaggedItem> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        for mut row in rows {
            let Some(entity) = row.remove("entity").map(|e| compact_iri(&e)) else {
                continue;
            };
            let pos = *positions.entry(entity.clone()).or_insert_with(|| {
                items.push(TaggedItem {
                    label: dpr_common::taxonomy::label_from_id(&entity),
                    key: entity.clone(),
                    class_ids: Default::default(),
                });
                items.len() - 1
            });
            if let Some(label) = row.remove("label") {
                items[pos].label = label;
            }
            if let Some(class) = row.remove("class") {
                items[pos].class_ids.insert(compact_iri(&class));
            }
        }
        Ok(items)
    }
}

fn prefix_block() -> String {
    PREFIXES
        .iter()
        .map(|(prefix, iri)| format!("PREFIX {}: <{}>", prefix, iri))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Shorten an IRI with a known prefix; unknown IRIs are returned unchanged
pub fn compact_iri(iri: &str) -> String {
    PREFIXES
        .iter()
        .find_map(|(prefix, ns)| iri.strip_prefix(ns).map(|local| format!("{}:{}", prefix, local)))
        .unwrap_or_else(|| iri.to_string())
}

/// Render a class id as a query term
fn term(id: &str) -> String {
    if id.contains("://") {
        format!("<{}>", id)
    } else {
        id.to_string()
    }
}

fn subclass_query(class: &str) -> String {
    format!(
        "SELECT ?subject ?label WHERE {{ ?subject rdfs:subClassOf {} OPTIONAL {{ ?subject rdfs:label ?label }} }} ORDER BY ?subject",
        term(class)
    )
}

/// Item query with a positional primary class and conjunctive extras
///
/// No filter selects every instance of `default_class`.
pub fn item_query(filter_class_ids: &[String], default_class: &str) -> String {
    let (first, additional) = match filter_class_ids.split_first() {
        Some((first, rest)) => (first.as_str(), rest),
        None => (default_class, &[][..]),
    };
    let additional_classes: String = additional
        .iter()
        .map(|c| format!("{{ ?entity rdf:type {} }}", term(c)))
        .collect();

    format!(
        "SELECT ?entity ?label ?class WHERE {{ {{ ?entity rdf:type {} }}. {} ?entity rdf:type ?class . OPTIONAL {{ ?entity rdfs:label ?label }} }} ORDER BY ?entity",
        term(first),
        additional_classes
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact_iri() {
        assert_eq!(
            compact_iri("http://www.semanticweb.org/nicolas/ontologies/2021/8/patterns#Problem"),
            "onto:Problem"
        );
        assert_eq!(compact_iri("http://www.w3.org/2002/07/owl#Thing"), "owl:Thing");
        assert_eq!(compact_iri("http://example.org/x"), "http://example.org/x");
    }

    #[test]
    fn test_item_query_without_filter_uses_default_class() {
        let query = item_query(&[], "onto:Pattern");
        assert!(query.contains("{ ?entity rdf:type onto:Pattern }."));
        assert_eq!(query.matches("rdf:type").count(), 2);
    }

    #[test]
    fn test_item_query_first_class_is_primary() {
        let filter = vec![
            "onto:Privacy".to_string(),
            "onto:Web".to_string(),
            "http://example.org/Extra".to_string(),
        ];
        let query = item_query(&filter, "onto:Pattern");
        assert!(query.contains("{ ?entity rdf:type onto:Privacy }."));
        assert!(query.contains(
            "{ ?entity rdf:type onto:Web }{ ?entity rdf:type <http://example.org/Extra> }"
        ));
        assert!(!query.contains("onto:Pattern"));
    }

    #[test]
    fn test_prefix_block_declares_onto() {
        assert!(prefix_block().contains(
            "PREFIX onto: <http://www.semanticweb.org/nicolas/ontologies/2021/8/patterns#>"
        ));
    }

    #[test]
    fn test_parse_results_document() {
        let doc = r#"{
            "head": {"vars": ["subject", "label"]},
            "results": {"bindings": [
                {"subject": {"type": "uri", "value": "http://x/A"},
                 "label": {"type": "literal", "value": "A"}}
            ]}
        }"#;
        let parsed: SparqlResponse = serde_json::from_str(doc).unwrap();
        assert_eq!(parsed.results.bindings.len(), 1);
        assert_eq!(parsed.results.bindings[0]["label"].value, "A");
    }
}
