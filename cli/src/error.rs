use serde::Deserialize;
use serde_json::Value;

/// Structured error body returned by the gateway and the registry
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    pub error: Option<String>,
    pub error_code: Option<String>,
    pub request_id: Option<String>,
    pub details: Option<Value>,
}

impl ErrorResponse {
    /// One-line rendering for log and error messages
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if let Some(code) = &self.error_code {
            parts.push(format!("error_code={}", code));
        }
        if let Some(error) = &self.error {
            parts.push(format!("error={}", error));
        }
        if let Some(details) = &self.details {
            parts.push(format!("details={}", details));
        }
        if parts.is_empty() {
            parts.push("no details".to_string());
        }
        parts.join(" ")
    }
}
