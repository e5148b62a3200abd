use serde::{Deserialize, Serialize};

/// Twilio Message resource, as returned by the Messages API.
///
/// Only the fields we read are modeled; Twilio returns more.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub sid: String,
    pub status: String,
    #[serde(default)]
    pub error_code: Option<i64>,
    #[serde(default)]
    pub error_message: Option<String>,
}
