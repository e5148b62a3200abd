use axum::{extract::Extension, http::StatusCode, Json};
use serde::Serialize;

use crate::domains::messaging::DispatchOutcome;
use crate::server::app::AppState;

#[derive(Serialize)]
pub struct ProcessMessagesResponse {
    pub success: bool,
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<DispatchOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Dispatcher trigger endpoint
///
/// Runs one dispatch pass over the current batch of due messages. Invoked
/// by the in-process cron and available for manual triggering; no body
/// required. Per-message failures land in `results`, not in the HTTP
/// status.
pub async fn process_messages_handler(
    Extension(state): Extension<AppState>,
) -> (StatusCode, Json<ProcessMessagesResponse>) {
    match state.deps.dispatcher().dispatch_due_messages().await {
        Ok(report) => (
            StatusCode::OK,
            Json(ProcessMessagesResponse {
                success: true,
                processed: report.processed,
                successful: report.successful,
                failed: report.failed,
                results: report.results,
                error: None,
            }),
        ),
        Err(e) => {
            tracing::error!("Dispatch pass failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ProcessMessagesResponse {
                    success: false,
                    processed: 0,
                    successful: 0,
                    failed: 0,
                    results: Vec::new(),
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}
