//! Job endpoints: deferred analysis with polling
//!
//! POST /jobs submits a request for background execution and returns the job
//! id immediately; GET /jobs/{id} polls its state. Completed jobs are also
//! delivered to the webhook URL when one was provided.

use crate::error::AppError;
use crate::handlers::AppState;
use crate::handlers::analyze::AnalyzeRequest;
use crate::jobs::JobRecord;
use crate::middleware::RequestId;
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Job submission body: an analyze request plus an optional webhook URL
#[derive(Debug, Deserialize)]
pub struct SubmitJobRequest {
    #[serde(flatten)]
    request: AnalyzeRequest,
    #[serde(default)]
    webhook_url: Option<String>,
}

/// Response for a submitted job
#[derive(Debug, Serialize)]
pub struct SubmitJobResponse {
    pub job_id: Uuid,
}

/// POST /jobs handler
pub async fn submit(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(body): Json<SubmitJobRequest>,
) -> Result<(StatusCode, Json<SubmitJobResponse>), AppError> {
    if let Some(url) = &body.webhook_url {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(AppError::Validation(format!(
                "webhook_url must be an http(s) URL, got '{}'",
                url
            )));
        }
    }

    let analysis_request = body.request.into_analysis_request(request_id.as_uuid());
    let job_id = state
        .jobs()
        .submit(analysis_request, body.webhook_url)
        .await;

    Ok((StatusCode::ACCEPTED, Json(SubmitJobResponse { job_id })))
}

/// GET /jobs/{id} handler
pub async fn get(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobRecord>, AppError> {
    match state.jobs().get(job_id).await {
        Some(record) => Ok(Json(record)),
        None => Err(AppError::JobNotFound(job_id.to_string())),
    }
}
