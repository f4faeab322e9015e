//! Client for the upstream HR analytics API

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::models::{
    AbsenceReason, AtRiskQuery, BatchPredictionRequest, BatchPredictionResult, CorrelationMatrix,
    Distribution, DashboardSummary, EducationStats, EmployeePage, EmployeeQuery, EmployeeRecords,
    ExampleList, ExampleQuery, FeatureImportance, LlmStatus, ModelInfo, NlpQueryRequest,
    NlpQueryResponse, PredictionInput, PredictionResult, ReasonStats, SuggestionList,
    TrendPeriod, TrendSeries, UpstreamHealth,
};

pub const API_PREFIX: &str = "/api/v1";
pub const MAX_BATCH_SIZE: usize = 100;

/// Errors talking to the upstream API
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Upstream returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid upstream payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Batch of {0} exceeds the limit of {max} employees", max = MAX_BATCH_SIZE)]
    BatchTooLarge(usize),
}

/// Every upstream endpoint the dashboard consumes
#[async_trait]
pub trait HrApi: Send + Sync {
    async fn health(&self) -> Result<UpstreamHealth, ClientError>;

    async fn predict_single(&self, input: &PredictionInput) -> Result<PredictionResult, ClientError>;
    async fn predict_batch(&self, inputs: &[PredictionInput]) -> Result<BatchPredictionResult, ClientError>;
    async fn model_info(&self) -> Result<ModelInfo, ClientError>;

    async fn list_employees(&self, query: &EmployeeQuery) -> Result<EmployeePage, ClientError>;
    async fn at_risk_employees(&self, query: &AtRiskQuery) -> Result<EmployeePage, ClientError>;
    async fn employee_records(&self, employee_id: i64) -> Result<EmployeeRecords, ClientError>;
    async fn absence_reasons(&self) -> Result<Vec<AbsenceReason>, ClientError>;

    async fn summary(&self) -> Result<DashboardSummary, ClientError>;
    async fn trends(&self, period: TrendPeriod) -> Result<TrendSeries, ClientError>;
    async fn absence_distribution(&self) -> Result<Distribution, ClientError>;
    async fn stats_by_reason(&self) -> Result<Vec<ReasonStats>, ClientError>;
    async fn stats_by_education(&self) -> Result<Vec<EducationStats>, ClientError>;
    async fn feature_importance(&self) -> Result<FeatureImportance, ClientError>;
    async fn correlations(&self) -> Result<CorrelationMatrix, ClientError>;

    async fn nlp_query(&self, query: &str) -> Result<NlpQueryResponse, ClientError>;
    async fn nlp_suggestions(&self) -> Result<Vec<String>, ClientError>;
    async fn llm_status(&self) -> Result<LlmStatus, ClientError>;
    async fn nlp_examples(&self) -> Result<Vec<ExampleQuery>, ClientError>;
}

/// reqwest-backed [`HrApi`]
pub struct HttpHrApi {
    client: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct ReasonList {
    reasons: Vec<AbsenceReason>,
}

#[derive(Deserialize)]
struct ByReason {
    by_reason: Vec<ReasonStats>,
}

#[derive(Deserialize)]
struct ByEducation {
    by_education: Vec<EducationStats>,
}

impl HttpHrApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Absolute URL for an endpoint path below the API prefix
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}{}/{}",
            self.base_url.trim_end_matches('/'),
            API_PREFIX,
            path.trim_start_matches('/')
        )
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        // Decode in two steps so shape mismatches surface as Decode, not Transport
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = self.endpoint(path);
        debug!(url = %url, "GET upstream");
        self.send(self.client.get(url)).await
    }
}

#[async_trait]
impl HrApi for HttpHrApi {
    async fn health(&self) -> Result<UpstreamHealth, ClientError> {
        self.get("health").await
    }

    async fn predict_single(&self, input: &PredictionInput) -> Result<PredictionResult, ClientError> {
        let url = self.endpoint("predictions/single");
        debug!(url = %url, age = input.age, "POST prediction");
        self.send(self.client.post(url).json(input)).await
    }

    async fn predict_batch(&self, inputs: &[PredictionInput]) -> Result<BatchPredictionResult, ClientError> {
        if inputs.len() > MAX_BATCH_SIZE {
            return Err(ClientError::BatchTooLarge(inputs.len()));
        }
        let url = self.endpoint("predictions/batch");
        debug!(url = %url, size = inputs.len(), "POST batch prediction");
        self.send(self.client.post(url).json(&BatchPredictionRequest { employees: inputs }))
            .await
    }

    async fn model_info(&self) -> Result<ModelInfo, ClientError> {
        self.get("predictions/model-info").await
    }

    async fn list_employees(&self, query: &EmployeeQuery) -> Result<EmployeePage, ClientError> {
        let url = self.endpoint("employees");
        self.send(self.client.get(url).query(query)).await
    }

    async fn at_risk_employees(&self, query: &AtRiskQuery) -> Result<EmployeePage, ClientError> {
        let url = self.endpoint("employees/at-risk");
        self.send(self.client.get(url).query(query)).await
    }

    async fn employee_records(&self, employee_id: i64) -> Result<EmployeeRecords, ClientError> {
        self.get(&format!("employees/{}", employee_id)).await
    }

    async fn absence_reasons(&self) -> Result<Vec<AbsenceReason>, ClientError> {
        let list: ReasonList = self.get("employees/reasons/list").await?;
        Ok(list.reasons)
    }

    async fn summary(&self) -> Result<DashboardSummary, ClientError> {
        self.get("analytics/summary").await
    }

    async fn trends(&self, period: TrendPeriod) -> Result<TrendSeries, ClientError> {
        self.get(&format!("analytics/trends/{}", period.as_str())).await
    }

    async fn absence_distribution(&self) -> Result<Distribution, ClientError> {
        self.get("analytics/distribution/absence").await
    }

    async fn stats_by_reason(&self) -> Result<Vec<ReasonStats>, ClientError> {
        let stats: ByReason = self.get("analytics/by-reason").await?;
        Ok(stats.by_reason)
    }

    async fn stats_by_education(&self) -> Result<Vec<EducationStats>, ClientError> {
        let stats: ByEducation = self.get("analytics/by-education").await?;
        Ok(stats.by_education)
    }

    async fn feature_importance(&self) -> Result<FeatureImportance, ClientError> {
        self.get("analytics/feature-importance").await
    }

    async fn correlations(&self) -> Result<CorrelationMatrix, ClientError> {
        self.get("analytics/correlations").await
    }

    async fn nlp_query(&self, query: &str) -> Result<NlpQueryResponse, ClientError> {
        let url = self.endpoint("nlp/query");
        let body = NlpQueryRequest {
            query: query.to_string(),
        };
        self.send(self.client.post(url).json(&body)).await
    }

    async fn nlp_suggestions(&self) -> Result<Vec<String>, ClientError> {
        let list: SuggestionList = self.get("nlp/suggestions").await?;
        Ok(list.suggestions)
    }

    async fn llm_status(&self) -> Result<LlmStatus, ClientError> {
        self.get("nlp/llm-status").await
    }

    async fn nlp_examples(&self) -> Result<Vec<ExampleQuery>, ClientError> {
        let list: ExampleList = self.get("nlp/examples").await?;
        Ok(list.examples)
    }
}
