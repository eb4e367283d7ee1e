use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// One stored option as the backend returns it. Values are always strings on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionEntry {
    pub key: String,
    pub value: String,
}

impl OptionEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Common `{ success, message, data }` envelope every endpoint answers with.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Turn `success: false` into an [`AppError::Api`] carrying the server message.
    pub fn into_result(self) -> Result<Option<T>, AppError> {
        if self.success {
            Ok(self.data)
        } else {
            Err(AppError::Api {
                status: 200,
                message: if self.message.is_empty() {
                    "request rejected by server".into()
                } else {
                    self.message
                },
            })
        }
    }
}

#[derive(Serialize)]
pub(crate) struct OptionWriteBody<'a> {
    pub key: &'a str,
    pub value: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_defaults_missing_fields() {
        let resp: ApiResponse<Vec<OptionEntry>> = serde_json::from_str(r#"{"success":true}"#).unwrap();
        assert!(resp.success);
        assert!(resp.message.is_empty());
        assert_eq!(resp.into_result().unwrap(), None);
    }

    #[test]
    fn test_envelope_without_data_decodes_for_any_payload() {
        fn decode<T: serde::de::DeserializeOwned>(raw: &str) -> ApiResponse<T> {
            serde_json::from_str(raw).unwrap()
        }
        let resp: ApiResponse<serde_json::Value> = decode(r#"{"success":true,"message":"bind"}"#);
        assert_eq!(resp.message, "bind");
        assert!(resp.data.is_none());
    }

    #[test]
    fn test_rejected_envelope_keeps_server_message() {
        let resp: ApiResponse<()> =
            serde_json::from_str(r#"{"success":false,"message":"no permission"}"#).unwrap();
        let err = resp.into_result().unwrap_err();
        assert_eq!(err.to_string(), "API error (200): no permission");
    }

    #[test]
    fn test_option_list_decodes() {
        let resp: ApiResponse<Vec<OptionEntry>> = serde_json::from_str(
            r#"{"success":true,"message":"","data":[{"key":"QuotaForNewUser","value":"100"}]}"#,
        )
        .unwrap();
        assert_eq!(
            resp.into_result().unwrap(),
            Some(vec![OptionEntry::new("QuotaForNewUser", "100")])
        );
    }
}
