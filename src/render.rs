//! Turns loosely-typed NLP query responses into render-ready view models.
//!
//! The upstream handlers disagree on payload shape even under the same
//! `result_type` tag, so every strategy here extracts fields tolerantly and
//! degrades to an [`RenderedResult::Empty`] placeholder instead of failing.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::models::NlpQueryResponse;

pub const NO_RESULTS: &str = "No results found";
pub const NO_DATA: &str = "No data available";
pub const PLACEHOLDER: &str = "-";

/// Discriminator carried in `NlpQueryResponse::result_type`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultType {
    Table,
    Metric,
    ChartData,
    Text,
    Unrecognized(String),
}

impl ResultType {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "table" => ResultType::Table,
            "metric" => ResultType::Metric,
            "chart_data" => ResultType::ChartData,
            "text" => ResultType::Text,
            other => ResultType::Unrecognized(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Grouped,
    Trend,
    Comparison,
}

impl ChartKind {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "grouped" => Some(ChartKind::Grouped),
            "trend" => Some(ChartKind::Trend),
            "comparison" => Some(ChartKind::Comparison),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub key: &'static str,
    pub label: &'static str,
}

/// View model for one query response
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderedResult {
    Table {
        columns: Vec<Column>,
        rows: Vec<Vec<String>>,
    },
    Metric {
        label: String,
        value: f64,
        display: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        sample_size: Option<u64>,
    },
    Chart {
        chart: ChartKind,
        label: String,
        series: Vec<SeriesPoint>,
    },
    Text {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        link: Option<String>,
    },
    Empty {
        message: String,
    },
}

impl RenderedResult {
    fn empty(message: &str) -> Self {
        RenderedResult::Empty {
            message: message.to_string(),
        }
    }
}

struct TableColumn {
    key: &'static str,
    label: &'static str,
    /// Key used by the raw dataset rows
    source_label: &'static str,
}

const TABLE_COLUMNS: &[TableColumn] = &[
    TableColumn { key: "id", label: "ID", source_label: "ID" },
    TableColumn { key: "age", label: "Age", source_label: "Age" },
    TableColumn { key: "reason_for_absence", label: "Reason", source_label: "Reason for absence" },
    TableColumn { key: "month_of_absence", label: "Month", source_label: "Month of absence" },
    TableColumn { key: "service_time", label: "Service Time", source_label: "Service time" },
    TableColumn { key: "bmi", label: "BMI", source_label: "Body mass index" },
    TableColumn { key: "absenteeism_hours", label: "Absence Hours", source_label: "Absenteeism time in hours" },
];

/// Selects a strategy from the response's `result_type` and renders it
pub fn render(response: &NlpQueryResponse) -> RenderedResult {
    match ResultType::from_tag(&response.result_type) {
        ResultType::Table => render_table(&response.data),
        ResultType::Metric => render_metric(&response.data, &response.message),
        ResultType::ChartData => render_chart(&response.data, &response.message),
        ResultType::Text => render_text(&response.data, &response.message),
        ResultType::Unrecognized(tag) => {
            debug!(result_type = %tag, "rendering unrecognized result type as text");
            RenderedResult::Text {
                message: response.message.clone(),
                link: None,
            }
        }
    }
}

fn render_table(data: &Value) -> RenderedResult {
    let Some(records) = data.as_array() else {
        return RenderedResult::empty(NO_DATA);
    };
    if records.is_empty() {
        return RenderedResult::empty(NO_RESULTS);
    }

    let columns = TABLE_COLUMNS
        .iter()
        .map(|c| Column { key: c.key, label: c.label })
        .collect();

    let rows = records
        .iter()
        .map(|record| {
            TABLE_COLUMNS
                .iter()
                .map(|column| match record.as_object() {
                    Some(fields) => cell(fields, column),
                    None => PLACEHOLDER.to_string(),
                })
                .collect()
        })
        .collect();

    RenderedResult::Table { columns, rows }
}

fn cell(fields: &Map<String, Value>, column: &TableColumn) -> String {
    [column.key, column.source_label]
        .iter()
        .filter_map(|key| fields.get(*key))
        .find(|value| !value.is_null())
        .map(display_value)
        .unwrap_or_else(|| PLACEHOLDER.to_string())
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Number(n) => n.as_f64().map(format_number).unwrap_or_else(|| n.to_string()),
        Value::String(s) if s.trim().is_empty() => PLACEHOLDER.to_string(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => (if *b { "Yes" } else { "No" }).to_string(),
        Value::Null => PLACEHOLDER.to_string(),
        other => other.to_string(),
    }
}

/// Integral values print without a fraction, others with at most two decimals
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        return format!("{}", value as i64);
    }
    let fixed = format!("{:.2}", value);
    fixed.trim_end_matches('0').trim_end_matches('.').to_string()
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

fn non_blank(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn render_metric(data: &Value, message: &str) -> RenderedResult {
    let Some(value) = data.get("value").and_then(as_number) else {
        return RenderedResult::empty(NO_DATA);
    };

    let label = non_blank(data.get("label"))
        .or_else(|| Some(message.trim().to_string()).filter(|m| !m.is_empty()))
        .unwrap_or_else(|| "Result".to_string());

    RenderedResult::Metric {
        label,
        value,
        display: format_number(value),
        sample_size: data.get("sample_size").and_then(Value::as_u64),
    }
}

fn render_chart(data: &Value, message: &str) -> RenderedResult {
    let Some(kind) = data.get("type").and_then(Value::as_str).and_then(ChartKind::from_tag) else {
        return RenderedResult::empty(NO_DATA);
    };

    let series = match kind {
        ChartKind::Grouped => grouped_series(data),
        ChartKind::Trend => trend_series(data),
        ChartKind::Comparison => comparison_series(data),
    };
    if series.is_empty() {
        return RenderedResult::empty(NO_DATA);
    }

    let label = non_blank(data.get("label"))
        .or_else(|| non_blank(data.get("target")))
        .unwrap_or_else(|| message.trim().to_string());

    RenderedResult::Chart {
        chart: kind,
        label,
        series,
    }
}

// {"groups": {"<group>": <number>, ...}}
fn grouped_series(data: &Value) -> Vec<SeriesPoint> {
    let Some(groups) = data.get("groups").and_then(Value::as_object) else {
        return Vec::new();
    };
    groups
        .iter()
        .filter_map(|(name, value)| {
            as_number(value).map(|value| SeriesPoint {
                name: name.clone(),
                value,
            })
        })
        .collect()
}

// {"data": [{"period": "January", "period_num": 1, "mean": 4.2, ...}, ...]}
fn trend_series(data: &Value) -> Vec<SeriesPoint> {
    let Some(points) = data.get("data").and_then(Value::as_array) else {
        return Vec::new();
    };
    points
        .iter()
        .filter_map(|point| {
            let name = non_blank(point.get("period"))
                .or_else(|| point.get("period_num").filter(|v| !v.is_null()).map(display_value))?;
            let value = ["mean", "value", "total"]
                .iter()
                .find_map(|key| point.get(*key).and_then(as_number))?;
            Some(SeriesPoint { name, value })
        })
        .collect()
}

// {"data": {"<group>": {"mean": 5.1, "count": 40, "std": 2.0}, ...}}
fn comparison_series(data: &Value) -> Vec<SeriesPoint> {
    let Some(groups) = data.get("data").and_then(Value::as_object) else {
        return Vec::new();
    };
    groups
        .iter()
        .filter_map(|(name, stats)| {
            stats.get("mean").and_then(as_number).map(|value| SeriesPoint {
                name: name.clone(),
                value,
            })
        })
        .collect()
}

fn render_text(data: &Value, message: &str) -> RenderedResult {
    let message = Some(message.to_string())
        .filter(|m| !m.trim().is_empty())
        .or_else(|| non_blank(data.get("response")));

    match message {
        Some(message) => RenderedResult::Text {
            message,
            link: non_blank(data.get("redirect")),
        },
        None => RenderedResult::empty(NO_DATA),
    }
}
