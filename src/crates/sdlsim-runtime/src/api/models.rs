//! Data transfer objects for the canvas service
//!
//! Wire-format agnostic: a REST or gRPC shell binds these 1:1. Operations
//! report failure in-band, as `success = false` plus `error_message` and a
//! stable `error_code`, instead of transport-level errors, reserving
//! transport failures for actual programming bugs.

use crate::error::CanvasError;
use chrono::{DateTime, Utc};
use sdlsim_core::params::ParamValue;
use sdlsim_core::trace::TraceEvent;
use serde::{Deserialize, Serialize};

/// Uniform envelope for every service operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ServiceResponse<T> {
    pub fn ok(data: T) -> Self {
        ServiceResponse {
            success: true,
            error_message: None,
            error_code: None,
            data: Some(data),
        }
    }

    pub fn err(err: &CanvasError) -> Self {
        ServiceResponse {
            success: false,
            error_message: Some(err.to_string()),
            error_code: Some(err.code().to_string()),
            data: None,
        }
    }

    pub fn from_result(result: crate::error::Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(err) => Self::err(&err),
        }
    }
}

/// Canvas summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanvasInfo {
    pub id: String,
    pub active_system: Option<String>,
    pub generator_count: usize,
    pub metric_count: usize,
    pub created_at: DateTime<Utc>,
}

/// One parameter path/value pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterUpdate {
    pub path: String,
    pub value: ParamValue,
}

/// Batch parameter write; applied in order, stopping at the first failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSetParametersRequest {
    pub updates: Vec<ParameterUpdate>,
}

/// Synchronous evaluation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    pub var_name: String,
    pub target: String,
    pub runs: usize,
}

/// Aggregate view of a stored result series
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub var_name: String,
    pub runs: usize,
    pub successes: usize,
    pub mean_latency: f64,
    pub min_latency: f64,
    pub max_latency: f64,
}

/// One traced trial
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceData {
    pub target: String,
    pub success: bool,
    pub latency: f64,
    pub result: serde_json::Value,
    pub events: Vec<TraceEvent>,
}

/// Metric query window
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryMetricsRequest {
    pub metric_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_ok() {
        let resp = ServiceResponse::ok(3usize);
        assert!(resp.success);
        assert_eq!(resp.data, Some(3));
        assert!(resp.error_message.is_none());
    }

    #[test]
    fn test_envelope_err_carries_code() {
        let resp: ServiceResponse<()> =
            ServiceResponse::err(&CanvasError::CanvasNotFound("c9".into()));
        assert!(!resp.success);
        assert_eq!(resp.error_code.as_deref(), Some("CANVAS_NOT_FOUND"));
        assert!(resp.error_message.unwrap().contains("c9"));
    }

    #[test]
    fn test_envelope_serialization_skips_empty_fields() {
        let resp = ServiceResponse::ok("x");
        let json = serde_json::to_value(&resp).unwrap();
        assert!(json.get("error_message").is_none());
        assert_eq!(json["success"], true);
    }
}
