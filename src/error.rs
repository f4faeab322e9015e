use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::client::ClientError;
use crate::form::ValidationErrors;
use crate::models::ApiResponse;

pub const REQUEST_FAILED: &str = "Request failed. Please try again.";
pub const QUERY_FAILED: &str = "Query failed. Please try again.";

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("upstream request failed: {0}")]
    Upstream(#[from] ClientError),

    #[error("query failed: {0}")]
    QueryFailed(ClientError),

    #[error("prediction failed: {0}")]
    PredictionFailed(ClientError),

    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("{0}")]
    InvalidQuery(String),

    #[error("session {0} not found")]
    SessionNotFound(Uuid),

    #[error("a prediction is already in progress for this session")]
    SubmissionPending,
}

impl DashboardError {
    pub fn status(&self) -> StatusCode {
        match self {
            DashboardError::Upstream(ClientError::BatchTooLarge(_)) => StatusCode::BAD_REQUEST,
            DashboardError::Upstream(_)
            | DashboardError::QueryFailed(_)
            | DashboardError::PredictionFailed(_) => StatusCode::BAD_GATEWAY,
            DashboardError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            DashboardError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            DashboardError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            DashboardError::SubmissionPending => StatusCode::CONFLICT,
        }
    }
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            DashboardError::Upstream(ClientError::BatchTooLarge(_)) => {
                ApiResponse::error(self.to_string(), None)
            }
            DashboardError::Upstream(err) => {
                warn!(error = %err, "upstream request failed");
                ApiResponse::error(REQUEST_FAILED, None)
            }
            DashboardError::QueryFailed(err) => {
                warn!(error = %err, "nlp query failed");
                ApiResponse::error(QUERY_FAILED, None)
            }
            DashboardError::PredictionFailed(err) => {
                warn!(error = %err, "prediction failed");
                ApiResponse::error(crate::form::PREDICTION_FAILED, None)
            }
            DashboardError::Validation(errors) => {
                ApiResponse::error("Validation failed", serde_json::to_value(errors).ok())
            }
            _ => ApiResponse::error(self.to_string(), None),
        };
        (status, Json(body)).into_response()
    }
}

pub type DashboardResult<T> = Result<T, DashboardError>;
