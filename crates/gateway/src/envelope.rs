use chrono::{SecondsFormat, Utc};
use core_types::Row;
use serde::Serialize;
use serde_json::Value;

/// The single response shape for every operation.
///
/// Payload fields are flattened beside the envelope fields, so a table listing
/// serializes as `{"success":true,"database":..,"tables":[..],"count":..,"timestamp":..}`.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseEnvelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub payload: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: String,
}

impl<T: Serialize> ResponseEnvelope<T> {
    pub fn success(message: Option<&str>, payload: T) -> Self {
        Self {
            success: true,
            message: message.map(str::to_string),
            payload: Some(payload),
            error: None,
            timestamp: timestamp(),
        }
    }
}

impl ResponseEnvelope<()> {
    pub fn failure(message: &str, error: Option<String>) -> Self {
        Self {
            success: false,
            message: Some(message.to_string()),
            payload: None,
            error,
            timestamp: timestamp(),
        }
    }
}

/// The current instant as RFC 3339 UTC with millisecond precision.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestPayload {
    pub result: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TablesPayload {
    pub database: String,
    pub tables: Vec<Value>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryPayload {
    pub data: Vec<Row>,
    pub count: usize,
    /// Present only for statements that returned no rows.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affected_rows: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use serde_json::json;

    #[test]
    fn success_flattens_the_payload_in_order() {
        let envelope = ResponseEnvelope::success(
            None,
            TablesPayload {
                database: "shop".to_string(),
                tables: vec![json!("orders")],
                count: 1,
            },
        );
        let value = serde_json::to_value(&envelope).unwrap();
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["success", "database", "tables", "count", "timestamp"]);
        assert_eq!(value["tables"], json!(["orders"]));
    }

    #[test]
    fn failure_without_detail_omits_error() {
        let value =
            serde_json::to_value(ResponseEnvelope::failure("SQL query parameter is required", None))
                .unwrap();
        assert_eq!(value["success"], json!(false));
        assert_eq!(value["message"], json!("SQL query parameter is required"));
        assert!(value.get("error").is_none());
    }

    #[test]
    fn failure_with_detail_carries_it() {
        let envelope = ResponseEnvelope::failure("Query execution failed", Some("boom".to_string()));
        let value = serde_json::to_value(envelope).unwrap();
        assert_eq!(value["error"], json!("boom"));
    }

    #[test]
    fn timestamp_is_rfc3339_utc_with_millis() {
        let ts = timestamp();
        assert!(ts.ends_with('Z'));
        // 2024-01-01T00:00:00.000Z
        assert_eq!(ts.len(), 24);
        assert!(DateTime::parse_from_rfc3339(&ts).is_ok());
    }

    #[test]
    fn affected_rows_are_omitted_for_row_results() {
        let payload = QueryPayload {
            data: vec![],
            count: 0,
            affected_rows: None,
        };
        let value = serde_json::to_value(payload).unwrap();
        assert!(value.get("affected_rows").is_none());
    }
}
