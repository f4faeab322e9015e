//! Dashboard HTTP API

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::client::HrApi;
use crate::error::{DashboardError, DashboardResult};
use crate::form::{FormView, SubmitError};
use crate::models::{ApiResponse, AtRiskQuery, EmployeeQuery, PredictionInput, TrendPeriod};
use crate::session::{normalize_query, QueryHistory, QueryRecord, SessionStore};
use crate::suggest;

const DEFAULT_SUGGESTION_LIMIT: usize = 4;

#[derive(Clone)]
pub struct AppState {
    pub api: Arc<dyn HrApi>,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(api: Arc<dyn HrApi>) -> Self {
        Self {
            api,
            sessions: SessionStore::new(),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session).delete(delete_session))
        .route("/api/sessions/:id/queries", post(run_query).get(list_queries))
        .route("/api/sessions/:id/form", get(get_form).patch(update_form))
        .route("/api/sessions/:id/form/submit", post(submit_form))
        .route("/api/nlp/suggestions", get(nlp_suggestions))
        .route("/api/nlp/examples", get(nlp_examples))
        .route("/api/nlp/llm-status", get(llm_status))
        .route("/api/predictions/batch", post(predict_batch))
        .route("/api/predictions/model-info", get(model_info))
        .route("/api/employees", get(list_employees))
        .route("/api/employees/at-risk", get(at_risk_employees))
        .route("/api/employees/reasons", get(absence_reasons))
        .route("/api/employees/:id", get(employee_records))
        .route("/api/analytics/summary", get(analytics_summary))
        .route("/api/analytics/trends/:period", get(analytics_trends))
        .route("/api/analytics/distribution", get(analytics_distribution))
        .route("/api/analytics/by-reason", get(analytics_by_reason))
        .route("/api/analytics/by-education", get(analytics_by_education))
        .route("/api/analytics/feature-importance", get(analytics_feature_importance))
        .route("/api/analytics/correlations", get(analytics_correlations))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

type Envelope = DashboardResult<Json<ApiResponse>>;

fn ok(message: impl Into<String>, data: impl Serialize) -> Envelope {
    Ok(Json(ApiResponse::success(message, data)))
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let upstream = match state.api.health().await {
        Ok(health) => serde_json::to_value(health).unwrap_or(Value::Null),
        Err(err) => {
            warn!(error = %err, "upstream health check failed");
            Value::Null
        }
    };

    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "upstream_reachable": !upstream.is_null(),
        "upstream": upstream,
        "active_sessions": state.sessions.len().await,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

// Sessions

#[derive(Debug, Serialize)]
struct SessionView<'a> {
    id: Uuid,
    created_at: DateTime<Utc>,
    history: &'a QueryHistory,
    form: FormView,
}

async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<ApiResponse>) {
    let id = state.sessions.create().await;
    info!(session_id = %id, "session created");
    (
        StatusCode::CREATED,
        Json(ApiResponse::success("Session created", serde_json::json!({ "session_id": id }))),
    )
}

async fn get_session(State(state): State<AppState>, Path(id): Path<Uuid>) -> Envelope {
    let session = state
        .sessions
        .snapshot(id)
        .await
        .ok_or(DashboardError::SessionNotFound(id))?;

    ok(
        "Session loaded",
        SessionView {
            id: session.id,
            created_at: session.created_at,
            history: &session.history,
            form: session.form.view(),
        },
    )
}

/// Equivalent of reloading the tab: history and form state are dropped
async fn delete_session(State(state): State<AppState>, Path(id): Path<Uuid>) -> Envelope {
    if !state.sessions.remove(id).await {
        return Err(DashboardError::SessionNotFound(id));
    }
    info!(session_id = %id, "session discarded");
    ok("Session discarded", Value::Null)
}

// NLP queries

#[derive(Debug, Deserialize)]
pub struct QueryInput {
    pub query: String,
}

async fn run_query(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<QueryInput>,
) -> Envelope {
    let query = normalize_query(&input.query).map_err(DashboardError::InvalidQuery)?;
    if !state.sessions.contains(id).await {
        return Err(DashboardError::SessionNotFound(id));
    }

    let response = state
        .api
        .nlp_query(&query)
        .await
        .map_err(DashboardError::QueryFailed)?;

    let record: QueryRecord = state
        .sessions
        .with_session(id, |session| session.history.record(&query, response).clone())
        .await
        .ok_or(DashboardError::SessionNotFound(id))?;

    info!(
        session_id = %id,
        result_type = %record.response.result_type,
        intent = %record.response.intent,
        "query recorded"
    );
    ok(record.response.message.clone(), record)
}

async fn list_queries(State(state): State<AppState>, Path(id): Path<Uuid>) -> Envelope {
    let history = state
        .sessions
        .read_session(id, |session| session.history.clone())
        .await
        .ok_or(DashboardError::SessionNotFound(id))?;

    let message = if history.is_empty() {
        "No queries yet".to_string()
    } else {
        format!("{} queries", history.len())
    };
    ok(message, history)
}

#[derive(Debug, Deserialize)]
pub struct SuggestionParams {
    pub q: Option<String>,
    pub limit: Option<usize>,
}

async fn nlp_suggestions(
    State(state): State<AppState>,
    Query(params): Query<SuggestionParams>,
) -> Envelope {
    let candidates = state.api.nlp_suggestions().await?;
    let limit = params.limit.unwrap_or(DEFAULT_SUGGESTION_LIMIT);
    let ranked = suggest::rank(params.q.as_deref().unwrap_or(""), &candidates, limit);
    ok("Suggestions", serde_json::json!({ "suggestions": ranked }))
}

async fn nlp_examples(State(state): State<AppState>) -> Envelope {
    let examples = state.api.nlp_examples().await?;
    ok("Examples", serde_json::json!({ "examples": examples }))
}

async fn llm_status(State(state): State<AppState>) -> Envelope {
    ok("LLM status", state.api.llm_status().await?)
}

// Prediction form

#[derive(Debug, Deserialize)]
pub struct FormUpdate {
    #[serde(default)]
    pub values: Option<Map<String, Value>>,
    #[serde(default)]
    pub show_advanced: Option<bool>,
}

async fn get_form(State(state): State<AppState>, Path(id): Path<Uuid>) -> Envelope {
    let view = state
        .sessions
        .read_session(id, |session| session.form.view())
        .await
        .ok_or(DashboardError::SessionNotFound(id))?;
    ok("Prediction form", view)
}

async fn update_form(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(update): Json<FormUpdate>,
) -> Envelope {
    let outcome = state
        .sessions
        .with_session(id, |session| {
            if let Some(show) = update.show_advanced {
                session.form.set_advanced(show);
            }
            match &update.values {
                Some(values) => session.form.update(values).map(|_| session.form.view()),
                None => Ok(session.form.view()),
            }
        })
        .await
        .ok_or(DashboardError::SessionNotFound(id))?;

    let view = outcome.map_err(DashboardError::Validation)?;
    ok("Prediction form updated", view)
}

async fn submit_form(State(state): State<AppState>, Path(id): Path<Uuid>) -> Envelope {
    let input: PredictionInput = state
        .sessions
        .with_session(id, |session| session.form.begin_submit())
        .await
        .ok_or(DashboardError::SessionNotFound(id))?
        .map_err(|err| match err {
            SubmitError::Invalid(errors) => DashboardError::Validation(errors),
            SubmitError::Pending => DashboardError::SubmissionPending,
        })?;

    info!(session_id = %id, age = input.age, reason = input.reason_for_absence, "submitting prediction");
    let submission = state.sessions.submission(id);

    match state.api.predict_single(&input).await {
        Ok(result) => {
            info!(
                session_id = %id,
                predicted_hours = result.predicted_hours,
                risk_level = ?result.risk_level,
                "prediction received"
            );
            let view = state
                .sessions
                .with_session(id, |session| {
                    session.form.complete(result);
                    session.form.view()
                })
                .await;
            submission.finish();
            ok("Prediction complete", view.ok_or(DashboardError::SessionNotFound(id))?)
        }
        Err(err) => {
            state
                .sessions
                .with_session(id, |session| session.form.fail())
                .await;
            submission.finish();
            Err(DashboardError::PredictionFailed(err))
        }
    }
}

// Pass-through views

#[derive(Debug, Deserialize)]
pub struct BatchInput {
    pub employees: Vec<PredictionInput>,
}

async fn predict_batch(State(state): State<AppState>, Json(input): Json<BatchInput>) -> Envelope {
    let batch = state.api.predict_batch(&input.employees).await?;
    ok(format!("{} predictions", batch.predictions.len()), batch)
}

async fn model_info(State(state): State<AppState>) -> Envelope {
    ok("Model info", state.api.model_info().await?)
}

async fn list_employees(
    State(state): State<AppState>,
    Query(query): Query<EmployeeQuery>,
) -> Envelope {
    let page = state.api.list_employees(&query).await?;
    ok(format!("{} employees", page.total), page)
}

async fn at_risk_employees(
    State(state): State<AppState>,
    Query(query): Query<AtRiskQuery>,
) -> Envelope {
    let page = state.api.at_risk_employees(&query).await?;
    ok(format!("{} at-risk records", page.total), page)
}

async fn absence_reasons(State(state): State<AppState>) -> Envelope {
    let reasons = state.api.absence_reasons().await?;
    ok("Absence reasons", serde_json::json!({ "reasons": reasons }))
}

async fn employee_records(State(state): State<AppState>, Path(id): Path<i64>) -> Envelope {
    let records = state.api.employee_records(id).await?;
    ok(format!("{} records", records.summary.total_records), records)
}

async fn analytics_summary(State(state): State<AppState>) -> Envelope {
    ok("Summary", state.api.summary().await?)
}

async fn analytics_trends(
    State(state): State<AppState>,
    Path(period): Path<TrendPeriod>,
) -> Envelope {
    let trends = state.api.trends(period).await?;
    ok(trends.metric.clone(), trends)
}

async fn analytics_distribution(State(state): State<AppState>) -> Envelope {
    ok("Absence distribution", state.api.absence_distribution().await?)
}

async fn analytics_by_reason(State(state): State<AppState>) -> Envelope {
    let stats = state.api.stats_by_reason().await?;
    ok("Absence by reason", serde_json::json!({ "by_reason": stats }))
}

async fn analytics_by_education(State(state): State<AppState>) -> Envelope {
    let stats = state.api.stats_by_education().await?;
    ok("Absence by education", serde_json::json!({ "by_education": stats }))
}

async fn analytics_feature_importance(State(state): State<AppState>) -> Envelope {
    let report = state.api.feature_importance().await?;
    let message = report
        .message
        .clone()
        .unwrap_or_else(|| "Feature importance".to_string());
    ok(message, report)
}

async fn analytics_correlations(State(state): State<AppState>) -> Envelope {
    ok("Correlations", state.api.correlations().await?)
}
