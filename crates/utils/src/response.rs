use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Envelope every API handler responds with.
#[derive(Debug, Serialize, Deserialize, TS)]
pub struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    message: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Creates a successful response, with `data` and no message.
    pub fn success(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    /// Creates an error response, with `message` and no data.
    pub fn error(message: &str) -> Self {
        ApiResponse {
            success: false,
            data: None,
            message: Some(message.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_envelope_serializes_message_only() {
        let response: ApiResponse<()> = ApiResponse::error("invoice not found");
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["message"], "invoice not found");
        assert!(value["data"].is_null());
    }

    #[test]
    fn success_envelope_carries_data() {
        let response: ApiResponse<Vec<u32>> = ApiResponse::success(vec![1, 2]);
        assert!(response.is_success());
        assert_eq!(response.data(), Some(&vec![1, 2]));
        assert_eq!(response.message(), None);
    }
}
