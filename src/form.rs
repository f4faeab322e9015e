//! Prediction form: field schema, edit state and submission gating.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::models::{PredictionInput, PredictionResult};

pub const PREDICTION_FAILED: &str = "Prediction failed. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    Decimal,
    Choice(&'static [(i64, &'static str)]),
}

/// Declarative constraints for one `PredictionInput` field
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub default: f64,
    pub advanced: bool,
}

const YES_NO: &[(i64, &str)] = &[(0, "No"), (1, "Yes")];

const WEEKDAYS: &[(i64, &str)] = &[
    (2, "Monday"),
    (3, "Tuesday"),
    (4, "Wednesday"),
    (5, "Thursday"),
    (6, "Friday"),
];

const SEASONS: &[(i64, &str)] = &[(1, "Summer"), (2, "Autumn"), (3, "Winter"), (4, "Spring")];

const EDUCATION: &[(i64, &str)] = &[
    (1, "High School"),
    (2, "Graduate"),
    (3, "Postgraduate"),
    (4, "Master/Doctor"),
];

const MONTHS: &[(i64, &str)] = &[
    (0, "Unknown"),
    (1, "January"),
    (2, "February"),
    (3, "March"),
    (4, "April"),
    (5, "May"),
    (6, "June"),
    (7, "July"),
    (8, "August"),
    (9, "September"),
    (10, "October"),
    (11, "November"),
    (12, "December"),
];

/// ICD chapters (1-21) and administrative reasons (22-28)
const REASONS: &[(i64, &str)] = &[
    (0, "Unknown"),
    (1, "Infectious diseases"),
    (2, "Neoplasms"),
    (3, "Blood diseases"),
    (4, "Endocrine diseases"),
    (5, "Mental disorders"),
    (6, "Nervous system"),
    (7, "Eye diseases"),
    (8, "Ear diseases"),
    (9, "Circulatory system"),
    (10, "Respiratory system"),
    (11, "Digestive system"),
    (12, "Skin diseases"),
    (13, "Musculoskeletal"),
    (14, "Genitourinary"),
    (15, "Pregnancy"),
    (16, "Perinatal conditions"),
    (17, "Congenital malformations"),
    (18, "Abnormal findings"),
    (19, "Injury/poisoning"),
    (20, "External causes"),
    (21, "Health factors"),
    (22, "Patient follow-up"),
    (23, "Medical consultation"),
    (24, "Blood donation"),
    (25, "Lab examination"),
    (26, "Unjustified absence"),
    (27, "Physiotherapy"),
    (28, "Dental consultation"),
];

pub const FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "reason_for_absence",
        label: "Reason for Absence",
        kind: FieldKind::Choice(REASONS),
        min: None,
        max: None,
        default: 23.0,
        advanced: false,
    },
    FieldSpec {
        name: "month_of_absence",
        label: "Month",
        kind: FieldKind::Choice(MONTHS),
        min: None,
        max: None,
        default: 7.0,
        advanced: false,
    },
    FieldSpec {
        name: "day_of_week",
        label: "Day of Week",
        kind: FieldKind::Choice(WEEKDAYS),
        min: None,
        max: None,
        default: 3.0,
        advanced: false,
    },
    FieldSpec {
        name: "seasons",
        label: "Season",
        kind: FieldKind::Choice(SEASONS),
        min: None,
        max: None,
        default: 1.0,
        advanced: false,
    },
    FieldSpec {
        name: "age",
        label: "Age",
        kind: FieldKind::Integer,
        min: Some(18.0),
        max: Some(70.0),
        default: 33.0,
        advanced: false,
    },
    FieldSpec {
        name: "service_time",
        label: "Service Time (years)",
        kind: FieldKind::Integer,
        min: Some(0.0),
        max: None,
        default: 13.0,
        advanced: false,
    },
    FieldSpec {
        name: "distance_from_residence",
        label: "Distance to Work (km)",
        kind: FieldKind::Decimal,
        min: Some(0.0),
        max: None,
        default: 36.0,
        advanced: false,
    },
    FieldSpec {
        name: "transportation_expense",
        label: "Transportation Expense",
        kind: FieldKind::Decimal,
        min: Some(0.0),
        max: None,
        default: 289.0,
        advanced: false,
    },
    FieldSpec {
        name: "workload_average",
        label: "Average Daily Workload",
        kind: FieldKind::Decimal,
        min: Some(0.0),
        max: None,
        default: 239.554,
        advanced: true,
    },
    FieldSpec {
        name: "hit_target",
        label: "Hit Target (%)",
        kind: FieldKind::Integer,
        min: Some(0.0),
        max: Some(100.0),
        default: 97.0,
        advanced: true,
    },
    FieldSpec {
        name: "disciplinary_failure",
        label: "Disciplinary Failure",
        kind: FieldKind::Choice(YES_NO),
        min: None,
        max: None,
        default: 0.0,
        advanced: true,
    },
    FieldSpec {
        name: "education",
        label: "Education",
        kind: FieldKind::Choice(EDUCATION),
        min: None,
        max: None,
        default: 1.0,
        advanced: true,
    },
    FieldSpec {
        name: "son",
        label: "Children",
        kind: FieldKind::Integer,
        min: Some(0.0),
        max: None,
        default: 2.0,
        advanced: true,
    },
    FieldSpec {
        name: "social_drinker",
        label: "Social Drinker",
        kind: FieldKind::Choice(YES_NO),
        min: None,
        max: None,
        default: 1.0,
        advanced: true,
    },
    FieldSpec {
        name: "social_smoker",
        label: "Social Smoker",
        kind: FieldKind::Choice(YES_NO),
        min: None,
        max: None,
        default: 0.0,
        advanced: true,
    },
    FieldSpec {
        name: "pet",
        label: "Pets",
        kind: FieldKind::Integer,
        min: Some(0.0),
        max: None,
        default: 1.0,
        advanced: true,
    },
    FieldSpec {
        name: "weight",
        label: "Weight (kg)",
        kind: FieldKind::Decimal,
        min: Some(0.0),
        max: None,
        default: 90.0,
        advanced: true,
    },
    FieldSpec {
        name: "height",
        label: "Height (cm)",
        kind: FieldKind::Decimal,
        min: Some(0.0),
        max: None,
        default: 172.0,
        advanced: true,
    },
    FieldSpec {
        name: "bmi",
        label: "BMI",
        kind: FieldKind::Decimal,
        min: Some(0.0),
        max: None,
        default: 30.0,
        advanced: true,
    },
];

pub fn field(name: &str) -> Option<&'static FieldSpec> {
    FIELDS.iter().find(|f| f.name == name)
}

impl FieldSpec {
    /// Checks a single value against this field's constraints
    pub fn check(&self, value: f64) -> Result<(), String> {
        if !value.is_finite() {
            return Err("Must be a number".to_string());
        }

        match self.kind {
            FieldKind::Choice(options) => {
                if options.iter().any(|(code, _)| *code as f64 == value) {
                    Ok(())
                } else {
                    let codes: Vec<String> = options.iter().map(|(code, _)| code.to_string()).collect();
                    Err(format!("Must be one of {}", codes.join(", ")))
                }
            }
            FieldKind::Integer if value.fract() != 0.0 => Err("Must be a whole number".to_string()),
            FieldKind::Integer | FieldKind::Decimal => match (self.min, self.max) {
                (Some(min), Some(max)) if value < min || value > max => {
                    Err(format!("Must be between {} and {}", min, max))
                }
                (Some(min), None) if value < min => Err(format!("Must be at least {}", min)),
                (None, Some(max)) if value > max => Err(format!("Must be at most {}", max)),
                _ => Ok(()),
            },
        }
    }
}

/// Field name to message
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(pub BTreeMap<String, String>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    fn insert(&mut self, field: &str, message: impl Into<String>) {
        self.0.insert(field.to_string(), message.into());
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
        write!(f, "{}", parts.join("; "))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitError {
    Invalid(ValidationErrors),
    Pending,
}

/// Edit state of the prediction form for one session
#[derive(Debug, Clone)]
pub struct PredictionForm {
    values: BTreeMap<&'static str, f64>,
    show_advanced: bool,
    errors: ValidationErrors,
    pending: bool,
    result: Option<PredictionResult>,
    error: Option<String>,
}

impl Default for PredictionForm {
    fn default() -> Self {
        Self::new()
    }
}

impl PredictionForm {
    pub fn new() -> Self {
        Self {
            values: FIELDS.iter().map(|f| (f.name, f.default)).collect(),
            show_advanced: false,
            errors: ValidationErrors::default(),
            pending: false,
            result: None,
            error: None,
        }
    }

    pub fn value(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    #[cfg(test)]
    pub fn result(&self) -> Option<&PredictionResult> {
        self.result.as_ref()
    }

    #[cfg(test)]
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn set_advanced(&mut self, show: bool) {
        self.show_advanced = show;
    }

    /// Applies edited values. Numbers, numeric strings and booleans are
    /// accepted; everything else is reported per field. Range checks wait
    /// for [`validate`](Self::validate).
    pub fn update(&mut self, values: &Map<String, Value>) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();

        for (name, raw) in values {
            let Some(spec) = field(name) else {
                errors.insert(name, "Unknown field");
                continue;
            };
            match parse_value(raw) {
                Some(value) => {
                    self.values.insert(spec.name, value);
                }
                None => errors.insert(spec.name, "Must be a number"),
            }
        }

        self.errors = errors.clone();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Checks every field, hidden advanced ones included
    pub fn validate(&self) -> Result<PredictionInput, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        for spec in FIELDS {
            let value = self.values.get(spec.name).copied().unwrap_or(spec.default);
            if let Err(message) = spec.check(value) {
                errors.insert(spec.name, message);
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        let int = |name: &str| self.value(name).unwrap_or_default() as i64;
        let dec = |name: &str| self.value(name).unwrap_or_default();

        Ok(PredictionInput {
            reason_for_absence: int("reason_for_absence"),
            month_of_absence: int("month_of_absence"),
            day_of_week: int("day_of_week"),
            seasons: int("seasons"),
            transportation_expense: dec("transportation_expense"),
            distance_from_residence: dec("distance_from_residence"),
            service_time: int("service_time"),
            age: int("age"),
            workload_average: dec("workload_average"),
            hit_target: int("hit_target"),
            disciplinary_failure: int("disciplinary_failure"),
            education: int("education"),
            son: int("son"),
            social_drinker: int("social_drinker"),
            social_smoker: int("social_smoker"),
            pet: int("pet"),
            weight: dec("weight"),
            height: dec("height"),
            bmi: dec("bmi"),
        })
    }

    /// Validates and marks the form pending. Nothing is sent from here:
    /// the caller performs the single upstream attempt and reports back.
    pub fn begin_submit(&mut self) -> Result<PredictionInput, SubmitError> {
        if self.pending {
            return Err(SubmitError::Pending);
        }
        match self.validate() {
            Ok(input) => {
                self.errors = ValidationErrors::default();
                self.pending = true;
                Ok(input)
            }
            Err(errors) => {
                self.errors = errors.clone();
                Err(SubmitError::Invalid(errors))
            }
        }
    }

    /// Replaces any previously displayed result
    pub fn complete(&mut self, result: PredictionResult) {
        self.pending = false;
        self.result = Some(result);
        self.error = None;
    }

    pub fn fail(&mut self) {
        self.pending = false;
        self.error = Some(PREDICTION_FAILED.to_string());
    }

    /// The request was abandoned before an outcome arrived
    pub fn cancel(&mut self) {
        self.pending = false;
    }

    pub fn view(&self) -> FormView {
        let fields = FIELDS
            .iter()
            .filter(|spec| self.show_advanced || !spec.advanced)
            .map(|spec| FieldView {
                name: spec.name,
                label: spec.label,
                kind: match spec.kind {
                    FieldKind::Integer => "integer",
                    FieldKind::Decimal => "decimal",
                    FieldKind::Choice(_) => "choice",
                },
                options: match spec.kind {
                    FieldKind::Choice(options) => options
                        .iter()
                        .map(|(value, label)| ChoiceView { value: *value, label: *label })
                        .collect(),
                    _ => Vec::new(),
                },
                min: spec.min,
                max: spec.max,
                value: self.values.get(spec.name).copied().unwrap_or(spec.default),
                advanced: spec.advanced,
                error: self.errors.get(spec.name).map(str::to_string),
            })
            .collect();

        FormView {
            show_advanced: self.show_advanced,
            fields,
            errors: self.errors.clone(),
            pending: self.pending,
            result: self.result.clone(),
            error: self.error.clone(),
        }
    }
}

fn parse_value(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChoiceView {
    pub value: i64,
    pub label: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldView {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<ChoiceView>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub value: f64,
    pub advanced: bool,
    pub error: Option<String>,
}

/// Render-ready snapshot of the form
#[derive(Debug, Clone, Serialize)]
pub struct FormView {
    pub show_advanced: bool,
    pub fields: Vec<FieldView>,
    /// All field errors, including ones on hidden fields
    pub errors: ValidationErrors,
    pub pending: bool,
    pub result: Option<PredictionResult>,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RiskLevel;
    use serde_json::json;

    fn edits(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn sample_result(hours: f64, risk: RiskLevel) -> PredictionResult {
        PredictionResult {
            predicted_hours: hours,
            risk_level: risk,
            confidence_interval: (hours - 1.0, hours + 1.0),
            feature_contributions: BTreeMap::new(),
            top_factors: Vec::new(),
            explanation: format!("{} hours", hours),
            explanation_source: "fallback".to_string(),
            timestamp: chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        let input = PredictionForm::new().validate().unwrap();
        assert_eq!(input.age, 33);
        assert_eq!(input.day_of_week, 3);
        assert_eq!(input.workload_average, 239.554);
    }

    #[test]
    fn test_age_below_range_rejected() {
        let mut form = PredictionForm::new();
        form.update(&edits(json!({"age": 17}))).unwrap();

        let err = form.begin_submit().unwrap_err();
        let SubmitError::Invalid(errors) = err else {
            panic!("expected validation errors");
        };
        assert_eq!(errors.get("age"), Some("Must be between 18 and 70"));
        assert!(!form.is_pending());
    }

    #[test]
    fn test_day_of_week_must_be_weekday_code() {
        let mut form = PredictionForm::new();
        form.update(&edits(json!({"day_of_week": "7"}))).unwrap();

        let errors = form.validate().unwrap_err();
        assert_eq!(errors.get("day_of_week"), Some("Must be one of 2, 3, 4, 5, 6"));
    }

    #[test]
    fn test_integer_fields_reject_fractions() {
        let mut form = PredictionForm::new();
        form.update(&edits(json!({"son": 1.5, "bmi": 27.3}))).unwrap();

        let errors = form.validate().unwrap_err();
        assert_eq!(errors.get("son"), Some("Must be a whole number"));
        assert_eq!(errors.get("bmi"), None);
    }

    #[test]
    fn test_update_reports_unknown_and_unparsable() {
        let mut form = PredictionForm::new();
        let errors = form
            .update(&edits(json!({"salary": 10, "age": "abc", "pet": "2"})))
            .unwrap_err();

        assert_eq!(errors.get("salary"), Some("Unknown field"));
        assert_eq!(errors.get("age"), Some("Must be a number"));
        assert_eq!(form.value("pet"), Some(2.0));
        assert_eq!(form.value("age"), Some(33.0));
    }

    #[test]
    fn test_hidden_advanced_fields_still_validated() {
        let mut form = PredictionForm::new();
        form.update(&edits(json!({"hit_target": 120}))).unwrap();
        assert!(!form.view().fields.iter().any(|f| f.name == "hit_target"));

        let errors = form.validate().unwrap_err();
        assert!(errors.get("hit_target").is_some());
        assert!(form.begin_submit().is_err());
        assert_eq!(form.view().errors.get("hit_target"), Some("Must be between 0 and 100"));
    }

    #[test]
    fn test_advanced_toggle_controls_visible_fields() {
        let mut form = PredictionForm::new();
        let basic = form.view().fields.len();

        form.set_advanced(true);
        let all = form.view().fields.len();

        assert_eq!(all, FIELDS.len());
        assert!(basic < all);
        assert!(form.view().fields.iter().any(|f| f.advanced));
    }

    #[test]
    fn test_second_submit_while_pending_refused() {
        let mut form = PredictionForm::new();
        form.begin_submit().unwrap();

        assert_eq!(form.begin_submit().unwrap_err(), SubmitError::Pending);

        form.fail();
        assert!(form.begin_submit().is_ok());
    }

    #[test]
    fn test_success_replaces_previous_result() {
        let mut form = PredictionForm::new();

        form.begin_submit().unwrap();
        form.complete(sample_result(20.0, RiskLevel::Critical));

        form.begin_submit().unwrap();
        form.complete(sample_result(3.0, RiskLevel::Low));

        assert_eq!(form.result(), Some(&sample_result(3.0, RiskLevel::Low)));
        assert!(form.view().error.is_none());
    }

    #[test]
    fn test_failure_keeps_result_and_sets_banner() {
        let mut form = PredictionForm::new();
        form.begin_submit().unwrap();
        form.complete(sample_result(5.0, RiskLevel::Medium));

        form.begin_submit().unwrap();
        form.fail();

        let view = form.view();
        assert_eq!(view.error.as_deref(), Some(PREDICTION_FAILED));
        assert_eq!(view.result.map(|r| r.predicted_hours), Some(5.0));
        assert!(!view.pending);
    }

    #[test]
    fn test_cancel_unlocks_without_banner() {
        let mut form = PredictionForm::new();
        form.begin_submit().unwrap();
        form.cancel();

        assert!(!form.is_pending());
        assert!(form.view().error.is_none());
        assert!(form.begin_submit().is_ok());
    }
}
