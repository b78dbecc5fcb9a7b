//! Exploration sessions: selector-driven pattern filtering

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use dpr_common::pagination::Pagination;
use dpr_common::{Pattern, SelectorFilterEngine, TaggedItem, TaxonomyTree};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::PageInfo;
use crate::{ApiError, ApiResult, AppState};

/// A node reference for display
#[derive(Debug, Clone, Serialize)]
pub struct NodeRef {
    pub id: String,
    pub label: String,
    pub is_leaf: bool,
}

impl NodeRef {
    fn of(tree: &TaxonomyTree, id: &str) -> Option<Self> {
        tree.get(id).map(|n| NodeRef {
            id: n.id.clone(),
            label: n.label.clone(),
            is_leaf: n.is_leaf(),
        })
    }
}

/// A selector tab with its immediate choices
#[derive(Debug, Serialize)]
pub struct SelectorTab {
    pub id: String,
    pub label: String,
    pub children: Vec<NodeRef>,
}

#[derive(Debug, Serialize)]
pub struct TaxonomyResponse {
    pub root: String,
    pub tabs: Vec<SelectorTab>,
    /// Every node below the root in pre-order
    pub nodes: Vec<NodeRef>,
}

/// The choices made under one selector tab
#[derive(Debug, Serialize)]
pub struct ChoiceChain {
    pub tab: String,
    pub chain: Vec<NodeRef>,
}

/// Snapshot of an exploration session
#[derive(Debug, Serialize)]
pub struct ExploreStatus {
    pub session_id: Uuid,
    pub selections: Vec<ChoiceChain>,
    pub active_selectors: Vec<NodeRef>,
    pub search: String,
    pub page: usize,
}

impl ExploreStatus {
    fn of(session_id: Uuid, engine: &SelectorFilterEngine) -> Self {
        let tree = engine.tree();
        let selections = tree
            .selector_roots()
            .into_iter()
            .map(|tab| ChoiceChain {
                tab: tab.id.clone(),
                chain: engine
                    .choice_chain(&tab.id)
                    .into_iter()
                    .filter_map(|id| NodeRef::of(tree, id))
                    .collect(),
            })
            .filter(|c| !c.chain.is_empty())
            .collect();

        Self {
            session_id,
            selections,
            active_selectors: engine
                .active_selectors()
                .into_iter()
                .filter_map(|id| NodeRef::of(tree, id))
                .collect(),
            search: engine.search().to_string(),
            page: engine.page(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SelectRequest {
    pub parent: String,
    pub child: String,
}

#[derive(Debug, Deserialize)]
pub struct DeselectRequest {
    pub class_id: String,
}

/// Listing query; omitted fields keep the session's current values
#[derive(Debug, Deserialize)]
pub struct ListingQuery {
    pub search: Option<String>,
    pub page: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct PatternView {
    #[serde(flatten)]
    pub pattern: Pattern,
    pub stats: String,
}

#[derive(Debug, Serialize)]
pub struct PatternPage {
    #[serde(flatten)]
    pub page_info: PageInfo,
    pub search: String,
    pub patterns: Vec<PatternView>,
}

#[derive(Debug, Serialize)]
pub struct ItemPage {
    #[serde(flatten)]
    pub page_info: PageInfo,
    pub search: String,
    pub items: Vec<TaggedItem>,
}

#[derive(Debug, Deserialize)]
pub struct ItemsQuery {
    /// Comma-separated class ids every returned item must carry
    #[serde(default)]
    pub classes: String,
}

fn session_not_found(id: Uuid) -> ApiError {
    ApiError::NotFound(format!("explore session {}", id))
}

fn apply_listing_query(engine: &mut SelectorFilterEngine, query: &ListingQuery) {
    if let Some(search) = &query.search {
        engine.set_search(search);
    }
    if let Some(page) = query.page {
        engine.set_page(page);
    }
}

/// GET /api/taxonomy
///
/// Selector tabs are the flagged top-level classes that have children.
pub async fn get_taxonomy(State(state): State<AppState>) -> ApiResult<Json<TaxonomyResponse>> {
    let tree = state.catalogue.classes()?;
    let tabs = tree
        .selector_roots()
        .into_iter()
        .map(|tab| SelectorTab {
            id: tab.id.clone(),
            label: tab.label.clone(),
            children: tab
                .children
                .iter()
                .filter_map(|c| NodeRef::of(&tree, c))
                .collect(),
        })
        .collect();
    let nodes = tree
        .preorder()
        .into_iter()
        .skip(1)
        .filter_map(|n| NodeRef::of(&tree, &n.id))
        .collect();

    Ok(Json(TaxonomyResponse {
        root: tree.root_id().to_string(),
        tabs,
        nodes,
    }))
}

/// POST /api/explore
pub async fn create_session(
    State(state): State<AppState>,
) -> ApiResult<(StatusCode, Json<ExploreStatus>)> {
    let tree = state.catalogue.classes()?;
    let id = Uuid::new_v4();
    let engine = SelectorFilterEngine::new(tree);
    let status = ExploreStatus::of(id, &engine);

    state.explore_sessions.lock().await.insert(id, engine);
    info!(session_id = %id, "Explore session created");
    Ok((StatusCode::CREATED, Json(status)))
}

/// GET /api/explore/:id
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ExploreStatus>> {
    let mut sessions = state.explore_sessions.lock().await;
    let engine = sessions.get(&id).ok_or_else(|| session_not_found(id))?;
    Ok(Json(ExploreStatus::of(id, engine)))
}

/// DELETE /api/explore/:id
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .explore_sessions
        .lock()
        .await
        .remove(&id)
        .ok_or_else(|| session_not_found(id))?;
    info!(session_id = %id, "Explore session closed");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/explore/:id/select
pub async fn select(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SelectRequest>,
) -> ApiResult<Json<ExploreStatus>> {
    let mut sessions = state.explore_sessions.lock().await;
    let engine = sessions.get_mut(&id).ok_or_else(|| session_not_found(id))?;
    engine.select(&request.parent, &request.child)?;
    Ok(Json(ExploreStatus::of(id, engine)))
}

/// POST /api/explore/:id/deselect
///
/// Removes the selection of `class_id` and every choice made below it.
pub async fn deselect(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<DeselectRequest>,
) -> ApiResult<Json<ExploreStatus>> {
    let mut sessions = state.explore_sessions.lock().await;
    let engine = sessions.get_mut(&id).ok_or_else(|| session_not_found(id))?;
    engine.deselect(&request.class_id);
    Ok(Json(ExploreStatus::of(id, engine)))
}

/// POST /api/explore/:id/reset
///
/// Clears every selection; the search text is kept.
pub async fn reset_selection(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ExploreStatus>> {
    let mut sessions = state.explore_sessions.lock().await;
    let engine = sessions.get_mut(&id).ok_or_else(|| session_not_found(id))?;
    engine.reset_selection();
    Ok(Json(ExploreStatus::of(id, engine)))
}

/// GET /api/explore/:id/patterns?search=TEXT&page=N
pub async fn list_patterns(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ListingQuery>,
) -> ApiResult<Json<PatternPage>> {
    let mut sessions = state.explore_sessions.lock().await;
    let engine = sessions.get_mut(&id).ok_or_else(|| session_not_found(id))?;
    apply_listing_query(engine, &query);

    let patterns = engine.filter_patterns(&state.catalogue.patterns, engine.search());
    let p = Pagination::new(patterns.len(), state.settings.explore_page_size, engine.page());
    engine.set_page(p.page);

    let page = p
        .slice(&patterns)
        .iter()
        .map(|pattern| PatternView {
            stats: pattern.stats(),
            pattern: pattern.clone(),
        })
        .collect();

    Ok(Json(PatternPage {
        page_info: PageInfo::from((patterns.len(), p)),
        search: engine.search().to_string(),
        patterns: page,
    }))
}

/// GET /api/explore/:id/items?search=TEXT&page=N
///
/// Flat view of the catalogue items passing the session's selectors.
pub async fn list_items(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ListingQuery>,
) -> ApiResult<Json<ItemPage>> {
    let mut sessions = state.explore_sessions.lock().await;
    let engine = sessions.get_mut(&id).ok_or_else(|| session_not_found(id))?;
    apply_listing_query(engine, &query);

    let items = engine.filtered(&state.catalogue.items);
    let p = Pagination::new(items.len(), state.settings.explore_page_size, engine.page());
    engine.set_page(p.page);

    Ok(Json(ItemPage {
        page_info: PageInfo::from((items.len(), p)),
        search: engine.search().to_string(),
        items: p.slice(&items).iter().map(|item| (*item).clone()).collect(),
    }))
}

/// GET /api/items?classes=A,B
///
/// Queries the catalogue source directly for items carrying every class.
pub async fn query_items(
    State(state): State<AppState>,
    Query(query): Query<ItemsQuery>,
) -> ApiResult<Json<Vec<TaggedItem>>> {
    let classes: Vec<String> = query
        .classes
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect();
    let items = state.source.load_tagged_items(&classes).await?;
    Ok(Json(items))
}

/// Build exploration routes
pub fn explore_routes() -> Router<AppState> {
    Router::new()
        .route("/api/taxonomy", get(get_taxonomy))
        .route("/api/items", get(query_items))
        .route("/api/explore", post(create_session))
        .route("/api/explore/:id", get(get_session).delete(delete_session))
        .route("/api/explore/:id/select", post(select))
        .route("/api/explore/:id/deselect", post(deselect))
        .route("/api/explore/:id/reset", post(reset_selection))
        .route("/api/explore/:id/patterns", get(list_patterns))
        .route("/api/explore/:id/items", get(list_items))
}
