//! Standard response envelope helpers.
//!
//! Every outcome, success or failure, is wrapped in the same envelope:
//! `{"success": bool, "data" | "error": ..., "timestamp": epoch millis}`.

use crate::error::ErrorCode;
use axum::{http::StatusCode, Json};
use serde::Serialize;
use serde_json::Value;

#[derive(Serialize)]
pub struct SuccessBody {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    pub timestamp: i64,
}

#[derive(Serialize)]
pub struct FailureBody {
    pub success: bool,
    pub error: ErrorBody,
    pub timestamp: i64,
}

#[derive(Serialize)]
pub struct ErrorBody {
    #[serde(rename = "errorCode")]
    pub error_code: String,
    #[serde(rename = "errorName")]
    pub error_name: String,
    #[serde(rename = "errorDetail")]
    pub error_detail: String,
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// 200 OK with a data payload.
pub fn success(data: Value) -> (StatusCode, Json<SuccessBody>) {
    (
        StatusCode::OK,
        Json(SuccessBody {
            success: true,
            data: Some(data),
            timestamp: now_millis(),
        }),
    )
}

/// 201 Created with a data payload.
pub fn created(data: Value) -> (StatusCode, Json<SuccessBody>) {
    (
        StatusCode::CREATED,
        Json(SuccessBody {
            success: true,
            data: Some(data),
            timestamp: now_millis(),
        }),
    )
}

/// Failure envelope body; the caller pairs it with a status code.
/// `error_name` is the offending field/column/resource, "-" if none applies.
pub fn failure_body(code: ErrorCode, error_name: &str, error_detail: &str) -> FailureBody {
    let name = if error_name.is_empty() { "-" } else { error_name };
    FailureBody {
        success: false,
        error: ErrorBody {
            error_code: code.as_str().to_string(),
            error_name: name.to_string(),
            error_detail: error_detail.to_string(),
        },
        timestamp: now_millis(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_envelope_shape() {
        let (status, Json(body)) = success(json!([{"id": 1}]));
        assert_eq!(status, StatusCode::OK);
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["success"], json!(true));
        assert_eq!(v["data"], json!([{"id": 1}]));
        assert!(v["timestamp"].is_i64());
    }

    #[test]
    fn created_envelope_is_201() {
        let (status, _) = created(json!({"status": "created"}));
        assert_eq!(status, StatusCode::CREATED);
    }

    #[test]
    fn failure_envelope_shape() {
        let body = failure_body(ErrorCode::UnknownColumn, "nickname", "column 'nickname' does not exist in table 'users'");
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["success"], json!(false));
        assert_eq!(v["error"]["errorCode"], json!("UnknownColumn"));
        assert_eq!(v["error"]["errorName"], json!("nickname"));
        assert!(v["timestamp"].is_i64());
    }

    #[test]
    fn empty_error_name_becomes_dash() {
        let body = failure_body(ErrorCode::InternalError, "", "boom");
        assert_eq!(body.error.error_name, "-");
    }
}
