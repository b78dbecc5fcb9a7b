//! # Design Pattern Recommender - Common Library
//!
//! Hierarchical decision and filtering engine shared by the service:
//! - Taxonomy tree (validated class hierarchy)
//! - Adaptive quiz state machine and branch scoring
//! - Hierarchical selector filter over tagged items
//! - Result ranking and score labels
//! - Catalogue models, pagination and configuration loading

pub mod catalogue;
pub mod config;
pub mod error;
pub mod pagination;
pub mod quiz;
pub mod ranking;
pub mod selector;
pub mod taxonomy;

pub use catalogue::{Pattern, TaggedItem, Variant};
pub use error::{Error, Result};
pub use quiz::{QuizSession, QuizState};
pub use selector::{SelectorFilterEngine, SelectorState};
pub use taxonomy::{ClassRecord, TaxonomyNode, TaxonomyTree};
