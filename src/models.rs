// src/models.rs
use serde::{Serialize, Serializer, Deserialize};
use chrono::NaiveDate;

/// A `market_data` row as it comes out of storage, before date normalization.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawObservation {
    pub index_name: String,
    pub date: String,
    pub high: f64,
    pub close: f64,
}

/// One trading day for one index, keyed by its canonical calendar date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    pub index_name: String,
    pub date: NaiveDate,
    pub high: f64,
    pub close: f64,
}

impl Observation {
    pub fn new(index_name: impl Into<String>, date: NaiveDate, high: f64, close: f64) -> Self {
        Observation {
            index_name: index_name.into(),
            date,
            high,
            close,
        }
    }
}

/// Drawdown and recovery figures for one index in one calendar year.
///
/// `days_to_threshold_breach` and `recovery_days` are always populated. When the
/// matching flag is false the value is the span to the last available date,
/// a lower bound rather than an observed event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub index_name: String,
    pub year: i32,
    pub yearly_high: f64,
    pub peak_date: NaiveDate,
    #[serde(serialize_with = "serialize_pct")]
    pub max_drawdown_pct: f64,
    pub drawdown_date: NaiveDate,
    pub days_to_threshold_breach: i64,
    pub threshold_breached: bool,
    pub recovery_days: i64,
    pub recovered: bool,
}

/// Two decimals on the wire, except that a real decline never prints as 0.00.
fn serialize_pct<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    let rounded = (value * 100.0).round() / 100.0;
    if rounded == 0.0 && *value > 0.0 {
        serializer.serialize_f64(*value)
    } else {
        serializer.serialize_f64(rounded)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateRow {
    pub date_captured: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectoralRow {
    pub date_captured: NaiveDate,
    pub duration: String,
    pub sector: String,
    pub market_cap_change: Option<f64>,
}

/// Body of the date-filtered POST endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct DateQuery {
    pub date: Option<String>,
}

/// `{ success, data }` / `{ success, error }` wrapper shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Envelope { success: true, data: Some(data), error: None }
    }
}

impl Envelope<()> {
    pub fn failure(message: impl Into<String>) -> Self {
        Envelope { success: false, data: None, error: Some(message.into()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_success_shape() {
        let body = serde_json::to_value(Envelope::ok(vec![1, 2])).unwrap();
        assert_eq!(body, json!({ "success": true, "data": [1, 2] }));
    }

    #[test]
    fn envelope_failure_shape() {
        let body = serde_json::to_value(Envelope::failure("Failed to fetch dates")).unwrap();
        assert_eq!(body, json!({ "success": false, "error": "Failed to fetch dates" }));
    }

    fn result_with_drawdown(pct: f64) -> AnalysisResult {
        let day = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        AnalysisResult {
            index_name: "IDX".into(),
            year: 2023,
            yearly_high: 100.0,
            peak_date: day,
            max_drawdown_pct: pct,
            drawdown_date: day,
            days_to_threshold_breach: 0,
            threshold_breached: false,
            recovery_days: 0,
            recovered: false,
        }
    }

    #[test]
    fn drawdown_pct_is_rounded_to_two_places() {
        let body = serde_json::to_value(result_with_drawdown(12.34567)).unwrap();
        assert_eq!(body["max_drawdown_pct"], json!(12.35));
    }

    #[test]
    fn tiny_drawdown_does_not_print_as_zero() {
        let body = serde_json::to_value(result_with_drawdown(0.001)).unwrap();
        assert_eq!(body["max_drawdown_pct"], json!(0.001));

        let body = serde_json::to_value(result_with_drawdown(0.0)).unwrap();
        assert_eq!(body["max_drawdown_pct"], json!(0.0));
    }

    #[test]
    fn dates_serialize_as_calendar_days() {
        let row = DateRow { date_captured: NaiveDate::from_ymd_opt(2024, 3, 5).unwrap() };
        assert_eq!(serde_json::to_value(row).unwrap(), json!({ "date_captured": "2024-03-05" }));
    }
}
