//! Caller-facing dispatch surface
//!
//! Ties the account selector, the failover executor, and the upstream client
//! into the operations the gateway exposes. Each dispatch is stateless: a
//! fresh candidate read, one executor run, a handle or a typed failure back.

use std::sync::Arc;
use std::time::Instant;

use flow_pool::{Error, Executor, OperationKind, Result, Selector, UpstreamError};
use flow_store::{Account, AccountStore};
use tracing::warn;
use uuid::Uuid;

use crate::client::FlowClient;
use crate::status;
use crate::types::{GenerationInput, JobStatus, OperationHandle};

pub struct Dispatcher {
    selector: Selector,
    executor: Executor,
    client: FlowClient,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn AccountStore>, client: FlowClient) -> Self {
        Self {
            selector: Selector::new(store.clone()),
            executor: Executor::new(store),
            client,
        }
    }

    /// Upload one image payload under any available account; returns the
    /// upstream media id. Uploads do not consume quota.
    pub async fn upload_image(&self, image_base64: &str) -> Result<String> {
        let kind = OperationKind::UploadImage;
        let accounts = self.selector.select(false).await?;
        let client = &self.client;
        let data = image_base64.to_string();
        let started = Instant::now();

        let result = self
            .executor
            .execute(accounts, kind, move |account| {
                let data = data.clone();
                async move { client.upload_image(&account, &data).await }
            })
            .await;
        record(kind, started, &result);
        result
    }

    /// Dispatch one video generation and return its pinned handle.
    ///
    /// Reference images are uploaded under the attempting account right
    /// before its generation call, so a failover never reuses media ids
    /// across accounts.
    pub async fn create_generation(&self, input: GenerationInput) -> Result<OperationHandle> {
        require_prompt(&input)?;
        let kind = if input.has_references() {
            OperationKind::CreateVideoWithRefs
        } else {
            OperationKind::CreateVideo
        };
        let accounts = self.selector.select(false).await?;
        let scene_id = Uuid::new_v4().to_string();
        let client = &self.client;
        let started = Instant::now();

        let result = self
            .executor
            .execute(accounts, kind, move |account| {
                let input = input.clone();
                let scene_id = scene_id.clone();
                async move {
                    let reference_ids =
                        upload_references(client, &account, &input.reference_images).await?;
                    let task_id = client
                        .create_video(&account, &input, &scene_id, &reference_ids)
                        .await?;
                    Ok(OperationHandle {
                        task_id,
                        scene_id,
                        account_id: account.id,
                    })
                }
            })
            .await;
        record(kind, started, &result);
        result
    }

    /// Dispatch one flow image generation and return its pinned handle.
    pub async fn create_flow_image(&self, input: GenerationInput) -> Result<OperationHandle> {
        require_prompt(&input)?;
        let kind = OperationKind::CreateFlowImage;
        let accounts = self.selector.select(false).await?;
        let scene_id = Uuid::new_v4().to_string();
        let client = &self.client;
        let started = Instant::now();

        let result = self
            .executor
            .execute(accounts, kind, move |account| {
                let input = input.clone();
                let scene_id = scene_id.clone();
                async move {
                    let task_id = client.create_flow_image(&account, &input, &scene_id).await?;
                    Ok(OperationHandle {
                        task_id,
                        scene_id,
                        account_id: account.id,
                    })
                }
            })
            .await;
        record(kind, started, &result);
        result
    }

    /// Upscale a generated flow image.
    pub async fn upscale_image(&self, media_id: &str) -> Result<OperationHandle> {
        self.upscale(media_id, OperationKind::UpscaleFlowImage).await
    }

    /// Upscale a generated video.
    pub async fn upscale_video(&self, media_id: &str) -> Result<OperationHandle> {
        self.upscale(media_id, OperationKind::UpscaleVideo).await
    }

    async fn upscale(&self, media_id: &str, kind: OperationKind) -> Result<OperationHandle> {
        let accounts = self.selector.select(false).await?;
        let scene_id = Uuid::new_v4().to_string();
        let client = &self.client;
        let media_id = media_id.to_string();
        let started = Instant::now();

        let result = self
            .executor
            .execute(accounts, kind, move |account| {
                let media_id = media_id.clone();
                let scene_id = scene_id.clone();
                async move {
                    let task_id = match kind {
                        OperationKind::UpscaleVideo => {
                            client.upscale_video(&account, &media_id, &scene_id).await?
                        }
                        _ => client.upscale_image(&account, &media_id, &scene_id).await?,
                    };
                    Ok(OperationHandle {
                        task_id,
                        scene_id,
                        account_id: account.id,
                    })
                }
            })
            .await;
        record(kind, started, &result);
        result
    }

    /// Poll one dispatched job. Never errors: every outcome is a `JobStatus`
    /// so a poll loop on a timer cannot crash.
    ///
    /// Status checks are pinned to the handle's account and never fail over.
    /// Transient upstream failures report `Processing` (the caller polls
    /// again); a lost account or lost operation access is terminal.
    pub async fn check_status(&self, handle: &OperationHandle) -> JobStatus {
        let accounts = match self.selector.select(true).await {
            Ok(accounts) => accounts,
            Err(e) => {
                return JobStatus::Failed {
                    message: format!("account lookup for task {} failed: {e}", handle.task_id),
                };
            }
        };
        let Some(account) = accounts.into_iter().find(|a| a.id == handle.account_id) else {
            return JobStatus::Failed {
                message: format!(
                    "account {} is no longer available for task {}",
                    handle.account_id, handle.task_id
                ),
            };
        };

        let client = &self.client;
        let task_id = handle.task_id.clone();
        let result = self
            .executor
            .execute(vec![account], OperationKind::CheckStatus, move |account| {
                let task_id = task_id.clone();
                async move { client.fetch_operation(&account, &task_id).await }
            })
            .await;

        match result {
            Ok(response) => status::normalize(&response),
            // Any 5xx on a poll is a server blip, not a verdict on the job;
            // 500/502 arrive via the retryable path below, the rest here.
            Err(Error::Fatal(UpstreamError::Status { code, message })) if code >= 500 => {
                warn!(task_id = %handle.task_id, code, %message, "status poll failed transiently");
                JobStatus::Processing
            }
            Err(Error::Fatal(e)) => JobStatus::Failed {
                message: e.to_string(),
            },
            Err(Error::AllAccountsFailed {
                last: Some(e @ UpstreamError::AccessLost { .. }),
                ..
            }) => JobStatus::Failed {
                message: e.to_string(),
            },
            // Zero attempts means the pinned account was skipped outright
            // (credentials present but no project); polling again cannot
            // change that, so terminate the loop.
            Err(Error::AllAccountsFailed { attempted: 0, .. }) => JobStatus::Failed {
                message: format!(
                    "account {} can no longer poll task {}",
                    handle.account_id, handle.task_id
                ),
            },
            Err(e) => {
                warn!(task_id = %handle.task_id, error = %e, "status poll failed transiently");
                JobStatus::Processing
            }
        }
    }
}

/// An empty prompt can never generate; reject it before touching the pool.
fn require_prompt(input: &GenerationInput) -> Result<()> {
    if input.prompt.trim().is_empty() {
        return Err(Error::Fatal(UpstreamError::InvalidRequest(
            "prompt must not be empty".into(),
        )));
    }
    Ok(())
}

/// Upload each reference image under `account`, skipping individual
/// failures. Zero successes with a non-empty set is fatal; generation must
/// not silently fall back to text-only.
async fn upload_references(
    client: &FlowClient,
    account: &Account,
    references: &[String],
) -> std::result::Result<Vec<String>, UpstreamError> {
    let mut media_ids = Vec::with_capacity(references.len());
    for (index, data) in references.iter().enumerate() {
        match client.upload_image(account, data).await {
            Ok(media_id) => media_ids.push(media_id),
            Err(e) => {
                warn!(account_id = %account.id, index, error = %e, "reference upload failed");
            }
        }
    }
    if media_ids.is_empty() && !references.is_empty() {
        return Err(UpstreamError::ReferenceUploadFailed(format!(
            "0 of {} reference images uploaded",
            references.len()
        )));
    }
    Ok(media_ids)
}

fn record<T>(kind: OperationKind, started: Instant, result: &Result<T>) {
    let outcome = if result.is_ok() { "ok" } else { "error" };
    metrics::counter!(
        "dispatch_requests_total",
        "kind" => kind.as_str(),
        "outcome" => outcome
    )
    .increment(1);
    metrics::histogram!("dispatch_duration_seconds", "kind" => kind.as_str())
        .record(started.elapsed().as_secs_f64());
}
