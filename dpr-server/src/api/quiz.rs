//! Quiz sessions and recommendations
//!
//! Each session walks the problem taxonomy independently. Recommendations are
//! only available once the quiz is completed.

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use dpr_common::pagination::Pagination;
use dpr_common::quiz::HistoryEntry;
use dpr_common::ranking::{self, RankedEntry};
use dpr_common::{Error, QuizSession, QuizState, TaggedItem};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::{default_page, PageInfo};
use crate::{ApiError, ApiResult, AppState};

/// Question reference as shown to the user
#[derive(Debug, Serialize)]
pub struct QuestionView {
    pub id: String,
    pub label: String,
    pub is_leaf: bool,
}

/// Snapshot of a quiz session
#[derive(Debug, Serialize)]
pub struct QuizStatus {
    pub session_id: Uuid,
    pub state: QuizState,
    pub step: usize,
    pub answered: usize,
    pub total_questions: usize,
    pub current_question: Option<QuestionView>,
    pub history: Vec<HistoryEntry>,
}

impl QuizStatus {
    fn of(session_id: Uuid, session: &QuizSession) -> Self {
        Self {
            session_id,
            state: session.state(),
            step: session.step(),
            answered: session.answered_count(),
            total_questions: session.total_questions(),
            current_question: session
                .current_question()
                .filter(|_| session.state() == QuizState::InProgress)
                .map(|n| QuestionView {
                    id: n.id.clone(),
                    label: n.label.clone(),
                    is_leaf: n.is_leaf(),
                }),
            history: session.history().to_vec(),
        }
    }
}

/// Body of POST /api/quiz/:id/answer
#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    /// Answer in `[-1, 1]`; negative marks the question as not applicable
    pub value: f64,
    /// Apply the value to every unanswered sub-question as well
    #[serde(default)]
    pub skip: bool,
}

#[derive(Debug, Deserialize)]
pub struct RecommendationQuery {
    #[serde(default)]
    pub search: String,
    #[serde(default = "default_page")]
    pub page: usize,
}

/// One recommended item
#[derive(Debug, Serialize)]
pub struct Recommendation {
    pub key: String,
    pub label: String,
    pub score: f64,
    pub rank_label: &'static str,
    /// Labels of the answered problems that led to this item
    pub problems: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RecommendationResponse {
    #[serde(flatten)]
    pub page_info: PageInfo,
    pub search: String,
    pub results: Vec<Recommendation>,
}

/// One answered question in an export
#[derive(Debug, Serialize)]
pub struct ExportedAnswer {
    pub id: String,
    pub label: String,
    pub parent: Option<String>,
    pub answer: f64,
}

/// Downloadable record of a completed quiz
#[derive(Debug, Serialize)]
pub struct QuizExport {
    pub session_id: Uuid,
    pub exported_at: DateTime<Utc>,
    pub state: QuizState,
    /// Answers in pre-order of the problem taxonomy
    pub answers: Vec<ExportedAnswer>,
    pub history: Vec<HistoryEntry>,
    pub recommendations: Vec<Recommendation>,
}

/// Score every item tagged with an eligible leaf
///
/// An item's score is the best score among the leaves it is tagged with.
/// Items are returned ranked, highest score first.
pub fn recommend<'a>(
    session: &QuizSession,
    items: &'a [TaggedItem],
) -> Vec<RankedEntry<&'a TaggedItem>> {
    let leaf_scores: HashMap<String, f64> = session.leaf_scores().into_iter().collect();
    let scored = items.iter().filter_map(|item| {
        item.class_ids
            .iter()
            .filter_map(|c| leaf_scores.get(c).copied())
            .reduce(f64::max)
            .map(|score| (item, score))
    });
    ranking::rank(scored)
}

fn session_not_found(id: Uuid) -> ApiError {
    ApiError::NotFound(format!("quiz session {}", id))
}

fn require_completed(session: &QuizSession, operation: &'static str) -> ApiResult<()> {
    if session.state() != QuizState::Completed {
        return Err(Error::InvalidTransition {
            operation,
            state: session.state().as_str(),
        }
        .into());
    }
    Ok(())
}

fn to_recommendation(session: &QuizSession, entry: &RankedEntry<&TaggedItem>) -> Recommendation {
    let tree = session.tree();
    Recommendation {
        key: entry.key.key.clone(),
        label: entry.key.label.clone(),
        score: entry.score,
        rank_label: entry.label,
        problems: entry
            .key
            .class_ids
            .iter()
            .filter(|c| tree.is_leaf(c).unwrap_or(false) && session.answer_of(c).is_some())
            .filter_map(|c| tree.get(c).map(|n| n.label.clone()))
            .collect(),
    }
}

/// POST /api/quiz
///
/// Fails with 500 when the problem taxonomy could not be loaded.
pub async fn create_session(
    State(state): State<AppState>,
) -> ApiResult<(StatusCode, Json<QuizStatus>)> {
    let tree = state.catalogue.problems()?;
    let id = Uuid::new_v4();
    let session = QuizSession::new(tree);
    let status = QuizStatus::of(id, &session);

    state.quiz_sessions.lock().await.insert(id, session);
    info!(session_id = %id, "Quiz session created");
    Ok((StatusCode::CREATED, Json(status)))
}

/// GET /api/quiz/:id
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<QuizStatus>> {
    let mut sessions = state.quiz_sessions.lock().await;
    let session = sessions.get(&id).ok_or_else(|| session_not_found(id))?;
    Ok(Json(QuizStatus::of(id, session)))
}

/// DELETE /api/quiz/:id
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .quiz_sessions
        .lock()
        .await
        .remove(&id)
        .ok_or_else(|| session_not_found(id))?;
    info!(session_id = %id, "Quiz session closed");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/quiz/:id/start
pub async fn start_quiz(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<QuizStatus>> {
    let mut sessions = state.quiz_sessions.lock().await;
    let session = sessions.get_mut(&id).ok_or_else(|| session_not_found(id))?;
    session.start()?;
    Ok(Json(QuizStatus::of(id, session)))
}

/// POST /api/quiz/:id/answer
pub async fn answer_question(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AnswerRequest>,
) -> ApiResult<Json<QuizStatus>> {
    if !(-1.0..=1.0).contains(&request.value) {
        return Err(ApiError::BadRequest(format!(
            "answer must be between -1 and 1, got {}",
            request.value
        )));
    }

    let mut sessions = state.quiz_sessions.lock().await;
    let session = sessions.get_mut(&id).ok_or_else(|| session_not_found(id))?;
    session.answer(request.value, request.skip)?;
    Ok(Json(QuizStatus::of(id, session)))
}

/// POST /api/quiz/:id/reset
pub async fn reset_quiz(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<QuizStatus>> {
    let mut sessions = state.quiz_sessions.lock().await;
    let session = sessions.get_mut(&id).ok_or_else(|| session_not_found(id))?;
    session.reset();
    Ok(Json(QuizStatus::of(id, session)))
}

/// GET /api/quiz/:id/recommendations?search=TEXT&page=N
///
/// 409 until the quiz is completed.
pub async fn recommendations(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<RecommendationQuery>,
) -> ApiResult<Json<RecommendationResponse>> {
    let mut sessions = state.quiz_sessions.lock().await;
    let session = sessions.get(&id).ok_or_else(|| session_not_found(id))?;
    require_completed(session, "recommend")?;

    let ranked: Vec<RankedEntry<&TaggedItem>> = recommend(session, &state.catalogue.items)
        .into_iter()
        .filter(|entry| entry.key.label_contains(&query.search))
        .collect();

    let p = Pagination::new(
        ranked.len(),
        state.settings.recommendation_page_size,
        query.page,
    );
    let results = p
        .slice(&ranked)
        .iter()
        .map(|entry| to_recommendation(session, entry))
        .collect();

    Ok(Json(RecommendationResponse {
        page_info: PageInfo::from((ranked.len(), p)),
        search: query.search,
        results,
    }))
}

/// GET /api/quiz/:id/export
///
/// Answers and the full ranked list as a `recommendations.json` download.
pub async fn export_quiz(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let mut sessions = state.quiz_sessions.lock().await;
    let session = sessions.get(&id).ok_or_else(|| session_not_found(id))?;
    require_completed(session, "export")?;

    let answers = session
        .tree()
        .preorder()
        .into_iter()
        .filter_map(|node| {
            session.answer_of(&node.id).map(|answer| ExportedAnswer {
                id: node.id.clone(),
                label: node.label.clone(),
                parent: node.parent.clone(),
                answer,
            })
        })
        .collect();
    let recommendations = recommend(session, &state.catalogue.items)
        .iter()
        .map(|entry| to_recommendation(session, entry))
        .collect();

    let export = QuizExport {
        session_id: id,
        exported_at: Utc::now(),
        state: session.state(),
        answers,
        history: session.history().to_vec(),
        recommendations,
    };
    info!(session_id = %id, "Quiz exported");
    Ok((
        [(
            header::CONTENT_DISPOSITION,
            "attachment; filename=\"recommendations.json\"",
        )],
        Json(export),
    ))
}

/// Build quiz routes
pub fn quiz_routes() -> Router<AppState> {
    Router::new()
        .route("/api/quiz", post(create_session))
        .route("/api/quiz/:id", get(get_session).delete(delete_session))
        .route("/api/quiz/:id/start", post(start_quiz))
        .route("/api/quiz/:id/answer", post(answer_question))
        .route("/api/quiz/:id/reset", post(reset_quiz))
        .route("/api/quiz/:id/recommendations", get(recommendations))
        .route("/api/quiz/:id/export", get(export_quiz))
}
