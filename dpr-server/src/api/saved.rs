//! Saved items

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use dpr_common::{TaggedItem, TaxonomyTree};
use serde::Serialize;
use tracing::info;

use crate::store::SavedItem;
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Serialize)]
pub struct SavedItemView {
    pub key: String,
    pub label: String,
    pub class_ids: Vec<String>,
    /// Labels from the most specific pattern class up to the top level
    pub class_path: Vec<String>,
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct SavedListResponse {
    pub items: Vec<SavedItemView>,
    /// Set when the saved items file could not be read
    pub warning: Option<String>,
}

/// Path of the deepest pattern class the item is tagged with
fn class_path(tree: &TaxonomyTree, item: &TaggedItem) -> Vec<String> {
    item.class_ids
        .iter()
        .map(|c| tree.class_path_labels(c))
        .max_by_key(|path| path.len())
        .unwrap_or_default()
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn view(tree: &TaxonomyTree, saved: &SavedItem) -> SavedItemView {
    SavedItemView {
        key: saved.item.key.clone(),
        label: saved.item.label.clone(),
        class_ids: saved.item.class_ids.iter().cloned().collect(),
        class_path: class_path(tree, &saved.item),
        saved_at: saved.saved_at,
    }
}

/// GET /api/saved
pub async fn list_saved(State(state): State<AppState>) -> Json<SavedListResponse> {
    let store = state.saved.lock().await;
    let tree = &state.catalogue.pattern_classes;
    Json(SavedListResponse {
        items: store.list().map(|saved| view(tree, saved)).collect(),
        warning: store.load_warning().map(str::to_string),
    })
}

/// PUT /api/saved/:key
pub async fn save_item(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(item): Json<TaggedItem>,
) -> ApiResult<Json<SavedItemView>> {
    if item.key != key {
        return Err(ApiError::BadRequest(format!(
            "item key {} does not match path {}",
            item.key, key
        )));
    }

    let mut store = state.saved.lock().await;
    let saved = store.save(item)?;
    info!(key = %key, "Item saved");
    Ok(Json(view(&state.catalogue.pattern_classes, saved)))
}

/// DELETE /api/saved/:key
pub async fn remove_item(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<StatusCode> {
    let mut store = state.saved.lock().await;
    if store.remove(&key)? {
        info!(key = %key, "Item removed from saved");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("saved item {}", key)))
    }
}

/// Build saved item routes
pub fn saved_routes() -> Router<AppState> {
    Router::new()
        .route("/api/saved", get(list_saved))
        .route("/api/saved/:key", axum::routing::put(save_item).delete(remove_item))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dpr_common::ClassRecord;

    #[test]
    fn test_class_path_uses_deepest_class() {
        let tree = TaxonomyTree::build(
            "onto:Pattern",
            vec![
                ClassRecord::new("onto:Pattern", None, &["onto:Minimize"]),
                ClassRecord::new("onto:Minimize", Some("onto:Pattern"), &["onto:Strip"]),
                ClassRecord::new("onto:Strip", Some("onto:Minimize"), &[]),
            ],
        )
        .unwrap();
        let item = TaggedItem::new("k", "Strip metadata", &["onto:Minimize", "onto:Strip", "other"]);
        assert_eq!(class_path(&tree, &item), vec!["Strip", "Minimize"]);
    }
}
