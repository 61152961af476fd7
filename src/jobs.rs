//! In-process job queue for deferred analysis
//!
//! `submit` records a job, spawns a worker task that runs the router, and
//! returns immediately with the job id. Callers poll `get`, or receive the
//! result via webhook when they provided a delivery URL. Job state lives in
//! process memory only; like health state, it resets on restart.

use crate::providers::{AnalysisRequest, AnalysisResult};
use crate::router::FailoverRouter;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Lifecycle of one submitted job
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Completed { result: AnalysisResult },
    Failed { error: String },
}

impl JobState {
    /// Label for logs and the polling response
    pub fn label(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Completed { .. } => "completed",
            JobState::Failed { .. } => "failed",
        }
    }
}

/// One job record, returned by polling
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub job_id: Uuid,
    #[serde(flatten)]
    pub state: JobState,
}

/// Payload POSTed to the webhook URL when a job finishes
#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    job_id: Uuid,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a AnalysisResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

/// In-process job queue
pub struct JobQueue {
    jobs: Arc<RwLock<HashMap<Uuid, JobRecord>>>,
    router: Arc<FailoverRouter>,
    http: reqwest::Client,
}

impl JobQueue {
    pub fn new(router: Arc<FailoverRouter>) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            router,
            http: reqwest::Client::new(),
        }
    }

    /// Submit a request for deferred execution.
    ///
    /// Returns the job id immediately; the router runs on a spawned task.
    pub async fn submit(
        self: &Arc<Self>,
        request: AnalysisRequest,
        webhook_url: Option<String>,
    ) -> Uuid {
        let job_id = Uuid::new_v4();
        {
            let mut jobs = self.jobs.write().await;
            jobs.insert(
                job_id,
                JobRecord {
                    job_id,
                    state: JobState::Queued,
                },
            );
        }

        tracing::info!(
            job_id = %job_id,
            request_id = %request.request_id,
            has_webhook = webhook_url.is_some(),
            "Job submitted"
        );

        let queue = Arc::clone(self);
        tokio::spawn(async move {
            queue.run(job_id, request, webhook_url).await;
        });

        job_id
    }

    /// Poll one job's current state.
    pub async fn get(&self, job_id: Uuid) -> Option<JobRecord> {
        self.jobs.read().await.get(&job_id).cloned()
    }

    async fn run(&self, job_id: Uuid, request: AnalysisRequest, webhook_url: Option<String>) {
        self.set_state(job_id, JobState::Running).await;

        let state = match self.router.route(&request).await {
            Ok(result) => JobState::Completed { result },
            Err(err) => {
                tracing::error!(job_id = %job_id, error = %err, "Job failed");
                JobState::Failed {
                    error: err.to_string(),
                }
            }
        };

        tracing::info!(job_id = %job_id, status = state.label(), "Job finished");
        self.set_state(job_id, state.clone()).await;

        if let Some(url) = webhook_url {
            self.deliver_webhook(job_id, &state, &url).await;
        }
    }

    async fn set_state(&self, job_id: Uuid, state: JobState) {
        let mut jobs = self.jobs.write().await;
        if let Some(record) = jobs.get_mut(&job_id) {
            record.state = state;
        }
    }

    /// Best-effort webhook delivery: one retry, failures are logged and
    /// never affect the stored job state (polling remains authoritative).
    async fn deliver_webhook(&self, job_id: Uuid, state: &JobState, url: &str) {
        let (result, error) = match state {
            JobState::Completed { result } => (Some(result), None),
            JobState::Failed { error } => (None, Some(error.as_str())),
            // run() only delivers terminal states
            JobState::Queued | JobState::Running => return,
        };

        let payload = WebhookPayload {
            job_id,
            status: state.label(),
            result,
            error,
        };

        for attempt in 1..=2u32 {
            match self.http.post(url).json(&payload).send().await {
                Ok(response) if response.status().is_success() => {
                    tracing::info!(job_id = %job_id, url, attempt, "Webhook delivered");
                    return;
                }
                Ok(response) => {
                    tracing::warn!(
                        job_id = %job_id,
                        url,
                        attempt,
                        status = response.status().as_u16(),
                        "Webhook endpoint rejected delivery"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        job_id = %job_id,
                        url,
                        attempt,
                        error = %e,
                        "Webhook delivery failed"
                    );
                }
            }
        }

        tracing::error!(job_id = %job_id, url, "Webhook delivery abandoned after retries");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_state_labels() {
        assert_eq!(JobState::Queued.label(), "queued");
        assert_eq!(JobState::Running.label(), "running");
        assert_eq!(
            JobState::Failed {
                error: "x".to_string()
            }
            .label(),
            "failed"
        );
    }

    #[test]
    fn test_job_record_serializes_flattened_state() {
        let record = JobRecord {
            job_id: Uuid::new_v4(),
            state: JobState::Failed {
                error: "all providers failed".to_string(),
            },
        };
        let json = serde_json::to_value(&record).expect("serialize");
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"], "all providers failed");
    }
}
