use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One JSON-RPC frame from the agent. The transport (stdio line or HTTP
/// POST body) carries exactly one frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpRequest {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpResponse {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<McpError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl McpError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            data: None,
        }
    }
}

impl McpResponse {
    pub fn ok(id: String, value: Value) -> Self {
        Self {
            id,
            result: Some(value),
            error: None,
        }
    }

    pub fn error(id: String, code: &str, message: String) -> Self {
        Self {
            id,
            result: None,
            error: Some(McpError::new(code, message)),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_parses_with_and_without_params() {
        let request: McpRequest =
            serde_json::from_str(r#"{"id":"1","method":"list_resources"}"#).unwrap();
        assert_eq!(request.method, "list_resources");
        assert!(request.params.is_null());

        let request: McpRequest = serde_json::from_str(
            r#"{"id":"2","method":"read_resource","params":{"uri":"review://rev_x"}}"#,
        )
        .unwrap();
        assert_eq!(request.params["uri"], "review://rev_x");
    }

    #[test]
    fn response_omits_absent_halves() {
        let ok = McpResponse::ok("1".to_string(), json!({"success": true}));
        let text = ok.to_json();
        assert!(text.contains("\"result\""));
        assert!(!text.contains("\"error\""));

        let err = McpResponse::error("1".to_string(), "not_found", "review not found".into());
        let text = err.to_json();
        assert!(text.contains("\"error\""));
        assert!(!text.contains("\"result\""));
    }
}
