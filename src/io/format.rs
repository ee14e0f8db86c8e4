//! Format definitions for CLI output.

use crate::error::IndexError;
use crate::io::exit_code::ExitCode;
use serde::Serialize;

/// Output format for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text (default)
    Text,
    /// JSON for scripts
    Json,
}

impl OutputFormat {
    #[must_use]
    pub fn from_json_flag(json: bool) -> Self {
        if json { Self::Json } else { Self::Text }
    }

    #[must_use]
    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json)
    }
}

/// Standard JSON response envelope.
#[derive(Debug, Serialize)]
pub struct JsonResponse<T = serde_json::Value>
where
    T: Serialize,
{
    /// "success" or "error"
    pub status: String,

    /// Result code ("OK" or an error status code)
    pub code: String,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    /// Recovery suggestions (only for errors)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,

    /// Exit code for shell scripts
    pub exit_code: u8,
}

impl<T> JsonResponse<T>
where
    T: Serialize,
{
    pub fn success(data: T) -> Self {
        Self {
            status: "success".to_string(),
            code: "OK".to_string(),
            message: "Operation completed successfully".to_string(),
            data: Some(data),
            suggestions: Vec::new(),
            exit_code: ExitCode::Success as u8,
        }
    }
}

impl JsonResponse<serde_json::Value> {
    /// Create an error response from IndexError.
    pub fn from_error(error: &IndexError) -> Self {
        Self {
            status: "error".to_string(),
            code: error.status_code(),
            message: error.to_string(),
            data: None,
            suggestions: error
                .recovery_suggestions()
                .iter()
                .map(|s| s.to_string())
                .collect(),
            exit_code: ExitCode::from_error(error) as u8,
        }
    }
}

impl JsonResponse<serde_json::Value> {
    /// Error response for failures outside the index taxonomy.
    pub fn general_error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            code: "GENERAL_ERROR".to_string(),
            message: message.into(),
            data: None,
            suggestions: Vec::new(),
            exit_code: ExitCode::GeneralError as u8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_carries_code_and_suggestions() {
        let response = JsonResponse::from_error(&IndexError::InvalidK { k: 0 });
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["status"], "error");
        assert_eq!(json["code"], "INVALID_K");
        assert_eq!(json["exit_code"], 6);
        assert!(json.get("data").is_none());
        assert!(!json["suggestions"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_success_response_omits_suggestions() {
        let json = serde_json::to_value(JsonResponse::success(vec![1, 2])).unwrap();
        assert_eq!(json["code"], "OK");
        assert_eq!(json["data"], serde_json::json!([1, 2]));
        assert!(json.get("suggestions").is_none());
    }

    #[test]
    fn test_general_error_response() {
        let json = serde_json::to_value(JsonResponse::general_error("no settings")).unwrap();
        assert_eq!(json["code"], "GENERAL_ERROR");
        assert_eq!(json["exit_code"], 1);
        assert_eq!(json["message"], "no settings");
    }
}
