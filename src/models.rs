use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Envelope for every dashboard API response
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: String,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

impl ApiResponse {
    pub fn success(message: impl Into<String>, data: impl Serialize) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
            data: serde_json::to_value(data).ok(),
        }
    }

    pub fn error(message: impl Into<String>, data: Option<serde_json::Value>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            data,
        }
    }
}

/// One absence record as served by the employees endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub id: i64,
    pub reason_for_absence: i64,
    pub reason_description: String,
    pub month_of_absence: i64,
    pub day_of_week: i64,
    pub seasons: i64,
    pub transportation_expense: f64,
    pub distance_from_residence: f64,
    pub service_time: i64,
    pub age: i64,
    pub workload_average: f64,
    pub hit_target: i64,
    pub disciplinary_failure: i64,
    pub education: i64,
    pub son: i64,
    pub social_drinker: i64,
    pub social_smoker: i64,
    pub pet: i64,
    pub weight: f64,
    pub height: f64,
    pub bmi: f64,
    pub absenteeism_hours: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployeePage {
    pub employees: Vec<Employee>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

/// Filters and paging for the employee listing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmployeeQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_age: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_age: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_absence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_absence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub education: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AtRiskQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployeeSummary {
    pub employee_id: i64,
    pub total_records: u64,
    pub total_absence_hours: f64,
    pub average_absence_hours: f64,
    pub age: i64,
    pub service_time: i64,
}

/// All absence records of a single employee id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployeeRecords {
    pub summary: EmployeeSummary,
    pub records: Vec<Employee>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbsenceReason {
    pub code: i64,
    pub description: String,
}

/// Model features submitted for a prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionInput {
    pub reason_for_absence: i64,
    pub month_of_absence: i64,
    pub day_of_week: i64,
    pub seasons: i64,
    pub transportation_expense: f64,
    pub distance_from_residence: f64,
    pub service_time: i64,
    pub age: i64,
    pub workload_average: f64,
    pub hit_target: i64,
    pub disciplinary_failure: i64,
    pub education: i64,
    pub son: i64,
    pub social_drinker: i64,
    pub social_smoker: i64,
    pub pet: i64,
    pub weight: f64,
    pub height: f64,
    pub bmi: f64,
}

/// Ordinal severity of a predicted absence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureFactor {
    pub feature: String,
    pub contribution: f64,
    pub direction: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub predicted_hours: f64,
    pub risk_level: RiskLevel,
    pub confidence_interval: (f64, f64),
    #[serde(default)]
    pub feature_contributions: BTreeMap<String, f64>,
    /// Ranked, strongest contribution first
    #[serde(default)]
    pub top_factors: Vec<FeatureFactor>,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub explanation_source: String,
    pub timestamp: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchPredictionRequest<'a> {
    pub employees: &'a [PredictionInput],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_employees: u64,
    pub average_predicted_hours: f64,
    pub max_predicted_hours: f64,
    #[serde(default)]
    pub risk_distribution: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchPredictionResult {
    pub predictions: Vec<PredictionResult>,
    pub summary: BatchSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    #[serde(default)]
    pub metrics: serde_json::Value,
    #[serde(default)]
    pub feature_importance: BTreeMap<String, f64>,
    pub feature_count: u64,
    /// `critical` is unbounded upstream and may arrive as null
    #[serde(default)]
    pub risk_thresholds: BTreeMap<String, Option<f64>>,
}

/// Natural-language query as sent upstream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NlpQueryRequest {
    pub query: String,
}

/// Upstream answer to a natural-language query.
///
/// `data` is deliberately untyped: its shape depends on `result_type` and
/// on the upstream handler that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NlpQueryResponse {
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default)]
    pub intent: String,
    #[serde(default)]
    pub confidence: f64,
    pub result_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub interpretation: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionList {
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExampleQuery {
    pub query: String,
    pub description: String,
    pub expected_result_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExampleList {
    pub examples: Vec<ExampleQuery>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmStatus {
    pub available: bool,
    #[serde(default)]
    pub models: Vec<String>,
    #[serde(default)]
    pub configured_model: Option<String>,
    #[serde(default)]
    pub model_ready: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamHealth {
    pub status: String,
    #[serde(default)]
    pub model_loaded: bool,
    #[serde(default)]
    pub version: Option<String>,
}

/// Headline numbers for the dashboard landing page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub total_records: u64,
    pub unique_employees: u64,
    pub total_absence_hours: f64,
    pub average_absence_hours: f64,
    pub median_absence_hours: f64,
    pub max_absence_hours: f64,
    pub at_risk_count: u64,
    pub at_risk_percentage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendPeriod {
    Monthly,
    Weekday,
}

impl TrendPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendPeriod::Monthly => "monthly",
            TrendPeriod::Weekday => "weekday",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendPoint {
    pub period: String,
    pub period_num: i64,
    pub value: f64,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendSeries {
    pub metric: String,
    pub data: Vec<TrendPoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionBucket {
    pub range_start: f64,
    pub range_end: f64,
    pub count: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Distribution {
    pub field: String,
    pub buckets: Vec<DistributionBucket>,
    #[serde(default)]
    pub stats: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasonStats {
    pub reason_code: i64,
    pub reason_description: String,
    pub average_hours: f64,
    pub total_hours: f64,
    pub record_count: u64,
    pub unique_employees: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EducationStats {
    pub education_level: i64,
    pub education_label: String,
    pub average_hours: f64,
    pub total_hours: f64,
    pub record_count: u64,
    pub unique_employees: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportanceEntry {
    pub feature: String,
    pub importance: f64,
}

/// Global feature importance; empty with a message when no model is loaded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureImportance {
    #[serde(default, deserialize_with = "importance_entries")]
    pub feature_importance: Vec<ImportanceEntry>,
    #[serde(default)]
    pub total_features: Option<u64>,
    #[serde(default)]
    pub message: Option<String>,
}

// Upstream sends `{}` instead of `[]` when the model is missing.
fn importance_entries<'de, D>(deserializer: D) -> Result<Vec<ImportanceEntry>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Entries {
        List(Vec<ImportanceEntry>),
        Map(BTreeMap<String, f64>),
    }

    Ok(match Entries::deserialize(deserializer)? {
        Entries::List(list) => list,
        Entries::Map(map) => map
            .into_iter()
            .map(|(feature, importance)| ImportanceEntry { feature, importance })
            .collect(),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationCell {
    pub x: String,
    pub y: String,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    pub correlations: Vec<CorrelationCell>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_ordering() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert!(RiskLevel::High < RiskLevel::Critical);
    }

    #[test]
    fn test_prediction_result_from_upstream_json() {
        let raw = serde_json::json!({
            "predicted_hours": 6.4,
            "risk_level": "medium",
            "confidence_interval": [4.1, 8.7],
            "feature_contributions": {"age": 0.8, "bmi": -0.3},
            "top_factors": [
                {"feature": "age", "contribution": 0.8, "direction": "increases", "description": "Older employee"}
            ],
            "explanation": "Moderate risk",
            "explanation_source": "fallback",
            "timestamp": "2024-03-01T10:15:30.123456"
        });

        let result: PredictionResult = serde_json::from_value(raw).unwrap();
        assert_eq!(result.risk_level, RiskLevel::Medium);
        assert_eq!(result.confidence_interval, (4.1, 8.7));
        assert_eq!(result.top_factors[0].feature, "age");
    }

    #[test]
    fn test_nlp_response_tolerates_missing_fields() {
        let raw = serde_json::json!({"result_type": "text"});
        let response: NlpQueryResponse = serde_json::from_value(raw).unwrap();

        assert!(response.success);
        assert_eq!(response.data, serde_json::Value::Null);
        assert!(response.message.is_empty());
    }

    #[test]
    fn test_feature_importance_accepts_empty_object() {
        let raw = serde_json::json!({
            "feature_importance": {},
            "message": "Model not loaded. Train the model to see feature importance."
        });
        let report: FeatureImportance = serde_json::from_value(raw).unwrap();

        assert!(report.feature_importance.is_empty());
        assert!(report.message.is_some());
    }
}
