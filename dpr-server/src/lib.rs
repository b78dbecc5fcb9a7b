//! dpr-server library - pattern recommendation and exploration service
//!
//! Hosts quiz and exploration sessions over a catalogue loaded once at
//! startup. Each session owns its mutable state (answers or selections); the
//! taxonomies are shared read-only.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use dpr_common::config::ServerConfig;
use dpr_common::{QuizSession, SelectorFilterEngine};
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::info;

pub mod api;
pub mod backend;
pub mod catalogue;
pub mod error;
pub mod sessions;
pub mod store;

pub use crate::error::{ApiError, ApiResult};

use crate::backend::CatalogueSource;
use crate::catalogue::Catalogue;
use crate::sessions::SessionMap;
use crate::store::SavedItemStore;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub catalogue: Arc<Catalogue>,
    /// Source used for live item queries and health checks
    pub source: Arc<dyn CatalogueSource>,
    pub saved: Arc<Mutex<SavedItemStore>>,
    pub quiz_sessions: Arc<Mutex<SessionMap<QuizSession>>>,
    pub explore_sessions: Arc<Mutex<SessionMap<SelectorFilterEngine>>>,
    pub settings: ServerConfig,
}

impl AppState {
    pub fn new(
        catalogue: Catalogue,
        source: Arc<dyn CatalogueSource>,
        saved: SavedItemStore,
        settings: ServerConfig,
    ) -> Self {
        Self {
            catalogue: Arc::new(catalogue),
            source,
            saved: Arc::new(Mutex::new(saved)),
            quiz_sessions: Arc::new(Mutex::new(SessionMap::with_ttl_minutes(
                settings.session_ttl_minutes,
            ))),
            explore_sessions: Arc::new(Mutex::new(SessionMap::with_ttl_minutes(
                settings.session_ttl_minutes,
            ))),
            settings,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::quiz_routes())
        .merge(api::explore_routes())
        .merge(api::saved_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Periodically drop idle quiz and explore sessions
pub fn spawn_session_cleanup(state: AppState, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let now = chrono::Utc::now();
            let quiz = state.quiz_sessions.lock().await.cleanup_stale(now);
            let explore = state.explore_sessions.lock().await.cleanup_stale(now);
            if quiz + explore > 0 {
                info!(quiz, explore, "Dropped idle sessions");
            }
        }
    })
}
