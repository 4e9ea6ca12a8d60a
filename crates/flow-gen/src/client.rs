//! Upstream generation API client
//!
//! One adapter method per upstream operation. Every method is a pure
//! function of (account credentials, request payload): it builds the
//! authenticated request, performs exactly one HTTP call, and normalizes the
//! outcome into a typed `UpstreamError` at the call site. Nothing here
//! decides retries; that is the executor's job.

use std::time::{SystemTime, UNIX_EPOCH};

use flow_pool::UpstreamError;
use flow_pool::upstream::truncate;
use flow_store::Account;
use tracing::debug;

use crate::routing::{self, FrameInputs};
use crate::types::GenerationInput;

/// Response fields a task identifier may appear under, first populated wins.
const TASK_ID_POINTERS: &[&str] = &[
    "/operations/0/operation/name",
    "/operation/name",
    "/name",
    "/taskId",
];

/// Response fields an uploaded media id may appear under.
const MEDIA_ID_POINTERS: &[&str] = &["/mediaId", "/media/mediaId", "/result/mediaId"];

/// Client over the two upstream generation bases (video API and flow image
/// API). Credentials travel per call, not per client: the same client serves
/// every account in the pool.
pub struct FlowClient {
    http: reqwest::Client,
    video_base: String,
    image_base: String,
}

impl FlowClient {
    pub fn new(http: reqwest::Client, video_base: String, image_base: String) -> Self {
        Self {
            http,
            video_base: video_base.trim_end_matches('/').to_string(),
            image_base: image_base.trim_end_matches('/').to_string(),
        }
    }

    /// Upload one image payload; returns the upstream media id.
    pub async fn upload_image(
        &self,
        account: &Account,
        image_base64: &str,
    ) -> Result<String, UpstreamError> {
        let url = format!("{}/v1/media:upload", self.image_base);
        let payload = serde_json::json!({
            "clientContext": client_context(account),
            "imageBytes": image_base64,
        });
        let body = self.post_json(account, &url, &payload).await?;
        extract_first(&body, MEDIA_ID_POINTERS).ok_or_else(|| {
            UpstreamError::MalformedResponse(format!(
                "upload response carries no media id: {}",
                truncate(&body.to_string(), 200)
            ))
        })
    }

    /// Trigger an asynchronous video generation; returns the upstream task id.
    ///
    /// `reference_ids` are media ids already uploaded under this same
    /// account; they must not be reused across accounts.
    pub async fn create_video(
        &self,
        account: &Account,
        input: &GenerationInput,
        scene_id: &str,
        reference_ids: &[String],
    ) -> Result<String, UpstreamError> {
        let frames = FrameInputs::classify(input.start_image.as_deref(), input.end_image.as_deref());
        let resolved = routing::route(frames, input.aspect_ratio);
        let model = input.model.as_deref().unwrap_or(resolved.model);

        let mut request = serde_json::json!({
            "aspectRatio": input.aspect_ratio.as_wire(),
            "videoModelKey": model,
            "toolName": resolved.tool,
            "textInput": { "prompt": input.prompt },
            "metadata": { "sceneId": scene_id },
        });
        if let Some(media_id) = &input.start_image {
            request["startImage"] = serde_json::json!({ "mediaId": media_id });
        }
        if let Some(media_id) = &input.end_image {
            request["endImage"] = serde_json::json!({ "mediaId": media_id });
        }
        if !reference_ids.is_empty() {
            request["referenceImages"] = serde_json::json!(
                reference_ids
                    .iter()
                    .map(|id| serde_json::json!({ "mediaId": id }))
                    .collect::<Vec<_>>()
            );
        }

        let url = format!("{}/v1/video:batchAsyncGenerate", self.video_base);
        let payload = serde_json::json!({
            "clientContext": client_context(account),
            "requests": [request],
        });
        debug!(account_id = %account.id, model, tool = resolved.tool, "dispatching video generation");
        let body = self.post_json(account, &url, &payload).await?;
        require_task_id(&body)
    }

    /// Trigger a flow image generation; returns the upstream task id.
    pub async fn create_flow_image(
        &self,
        account: &Account,
        input: &GenerationInput,
        scene_id: &str,
    ) -> Result<String, UpstreamError> {
        let url = format!("{}/v1/flowImage:generate", self.image_base);
        let payload = serde_json::json!({
            "clientContext": client_context(account),
            "prompt": input.prompt,
            "aspectRatio": input.aspect_ratio.as_wire(),
            "imageModelKey": input.model.as_deref().unwrap_or("flow_image_default"),
            "sceneId": scene_id,
        });
        let body = self.post_json(account, &url, &payload).await?;
        require_task_id(&body)
    }

    /// Upscale a previously generated flow image; returns the upstream task id.
    pub async fn upscale_image(
        &self,
        account: &Account,
        media_id: &str,
        scene_id: &str,
    ) -> Result<String, UpstreamError> {
        let url = format!("{}/v1/flowImage:upscale", self.image_base);
        let payload = serde_json::json!({
            "clientContext": client_context(account),
            "mediaId": media_id,
            "sceneId": scene_id,
        });
        let body = self.post_json(account, &url, &payload).await?;
        require_task_id(&body)
    }

    /// Upscale a previously generated video; returns the upstream task id.
    pub async fn upscale_video(
        &self,
        account: &Account,
        media_id: &str,
        scene_id: &str,
    ) -> Result<String, UpstreamError> {
        let url = format!("{}/v1/video:asyncUpscale", self.video_base);
        let payload = serde_json::json!({
            "clientContext": client_context(account),
            "mediaId": media_id,
            "sceneId": scene_id,
        });
        let body = self.post_json(account, &url, &payload).await?;
        require_task_id(&body)
    }

    /// Fetch the raw status of one in-flight operation.
    ///
    /// Status endpoints are account-scoped: a 403/404 here means the account
    /// lost access to the operation, not that the route is wrong.
    pub async fn fetch_operation(
        &self,
        account: &Account,
        task_id: &str,
    ) -> Result<serde_json::Value, UpstreamError> {
        let url = format!("{}/v1/video:batchCheckAsyncGenerationStatus", self.video_base);
        let payload = serde_json::json!({
            "operations": [{ "operation": { "name": task_id } }],
        });
        let (status, text) = self.post_raw(account, &url, &payload).await?;
        if status == 403 || status == 404 {
            return Err(UpstreamError::AccessLost {
                code: status,
                message: truncate(&text, 200),
            });
        }
        if !(200..300).contains(&status) {
            return Err(UpstreamError::from_status(status, text));
        }
        parse_json(&text)
    }

    /// POST `payload`, expecting a 2xx JSON body.
    async fn post_json(
        &self,
        account: &Account,
        url: &str,
        payload: &serde_json::Value,
    ) -> Result<serde_json::Value, UpstreamError> {
        let (status, text) = self.post_raw(account, url, payload).await?;
        if !(200..300).contains(&status) {
            return Err(UpstreamError::from_status(status, text));
        }
        parse_json(&text)
    }

    /// POST `payload` with the account's credentials; transport failures are
    /// mapped here, status handling is the caller's.
    async fn post_raw(
        &self,
        account: &Account,
        url: &str,
        payload: &serde_json::Value,
    ) -> Result<(u16, String), UpstreamError> {
        let mut request = self
            .http
            .post(url)
            .bearer_auth(&account.access_token)
            .json(payload);
        if let Some(cookies) = &account.auth_cookies {
            request = request.header(reqwest::header::COOKIE, cookies);
        }
        let response = request
            .send()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;
        Ok((status, text))
    }
}

/// Per-request upstream context: the account's project plus a session marker
/// derived from current time, used for upstream idempotency/tracing only.
fn client_context(account: &Account) -> serde_json::Value {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    serde_json::json!({
        "projectId": account.project_id,
        "sessionId": format!(";{millis}"),
    })
}

fn parse_json(text: &str) -> Result<serde_json::Value, UpstreamError> {
    serde_json::from_str(text)
        .map_err(|_| UpstreamError::MalformedResponse(truncate(text, 200)))
}

fn extract_first(body: &serde_json::Value, pointers: &[&str]) -> Option<String> {
    pointers
        .iter()
        .filter_map(|p| body.pointer(p))
        .filter_map(|v| v.as_str())
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn require_task_id(body: &serde_json::Value) -> Result<String, UpstreamError> {
    extract_first(body, TASK_ID_POINTERS).ok_or_else(|| {
        UpstreamError::MissingTaskId(truncate(&body.to_string(), 200))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::post;
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;

    fn account(id: &str) -> Account {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "accessToken": format!("tok_{id}"),
            "authCookies": "SID=abc",
            "projectId": format!("proj_{id}"),
        }))
        .unwrap()
    }

    /// Mock upstream that records the last request and serves a canned
    /// response from each route.
    async fn start_mock_upstream(
        generate_status: StatusCode,
        generate_body: &'static str,
    ) -> (String, Arc<Mutex<Option<(HeaderMap, serde_json::Value)>>>) {
        let seen = Arc::new(Mutex::new(None));
        let seen_clone = seen.clone();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let app = Router::new()
            .route(
                "/v1/video:batchAsyncGenerate",
                post(move |headers: HeaderMap, body: String| async move {
                    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
                    *seen_clone.lock().unwrap() = Some((headers, json));
                    (generate_status, generate_body).into_response()
                }),
            )
            .route(
                "/v1/media:upload",
                post(|| async { (StatusCode::OK, r#"{"mediaId":"m-77"}"#) }),
            )
            .route(
                "/v1/flowImage:generate",
                post(|| async { (StatusCode::OK, r#"{"name":"img-task-1"}"#) }),
            )
            .route(
                "/v1/video:batchCheckAsyncGenerationStatus",
                post(|| async { (StatusCode::NOT_FOUND, "operation not found") }),
            );

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}"), seen)
    }

    fn client(base: &str) -> FlowClient {
        FlowClient::new(reqwest::Client::new(), base.to_string(), base.to_string())
    }

    fn text_input(prompt: &str) -> GenerationInput {
        serde_json::from_value(serde_json::json!({ "prompt": prompt })).unwrap()
    }

    #[tokio::test]
    async fn create_video_sends_credentials_and_returns_task_id() {
        let body = r#"{"operations":[{"operation":{"name":"T-1"}}]}"#;
        let (base, seen) = start_mock_upstream(StatusCode::OK, body).await;

        let task_id = client(&base)
            .create_video(&account("a"), &text_input("sunrise"), "scene-1", &[])
            .await
            .unwrap();
        assert_eq!(task_id, "T-1");

        let (headers, payload) = seen.lock().unwrap().take().unwrap();
        assert_eq!(headers["authorization"], "Bearer tok_a");
        assert_eq!(headers["cookie"], "SID=abc");
        assert_eq!(payload["clientContext"]["projectId"], "proj_a");
        assert_eq!(payload["requests"][0]["videoModelKey"], "veo_3_0_t2v_fast");
        assert_eq!(payload["requests"][0]["toolName"], "TEXT_TO_VIDEO");
        assert_eq!(payload["requests"][0]["metadata"]["sceneId"], "scene-1");
        assert!(
            payload["clientContext"]["sessionId"]
                .as_str()
                .unwrap()
                .starts_with(';')
        );
    }

    #[tokio::test]
    async fn model_override_bypasses_the_routing_table() {
        let body = r#"{"operations":[{"operation":{"name":"T-2"}}]}"#;
        let (base, seen) = start_mock_upstream(StatusCode::OK, body).await;

        let mut input = text_input("x");
        input.model = Some("experimental_model".into());
        client(&base)
            .create_video(&account("a"), &input, "s", &[])
            .await
            .unwrap();

        let (_, payload) = seen.lock().unwrap().take().unwrap();
        assert_eq!(payload["requests"][0]["videoModelKey"], "experimental_model");
    }

    #[tokio::test]
    async fn reference_ids_travel_in_the_request() {
        let body = r#"{"operations":[{"operation":{"name":"T-3"}}]}"#;
        let (base, seen) = start_mock_upstream(StatusCode::OK, body).await;

        client(&base)
            .create_video(
                &account("a"),
                &text_input("x"),
                "s",
                &["m-1".to_string(), "m-2".to_string()],
            )
            .await
            .unwrap();

        let (_, payload) = seen.lock().unwrap().take().unwrap();
        let refs = payload["requests"][0]["referenceImages"].as_array().unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0]["mediaId"], "m-1");
    }

    #[tokio::test]
    async fn empty_task_id_is_missing_task_id() {
        let body = r#"{"operations":[{"operation":{"name":""}}]}"#;
        let (base, _) = start_mock_upstream(StatusCode::OK, body).await;

        let err = client(&base)
            .create_video(&account("a"), &text_input("x"), "s", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::MissingTaskId(_)), "got: {err}");
    }

    #[tokio::test]
    async fn html_body_on_success_is_malformed_response() {
        let (base, _) = start_mock_upstream(StatusCode::OK, "<html>login</html>").await;

        let err = client(&base)
            .create_video(&account("a"), &text_input("x"), "s", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::MalformedResponse(_)), "got: {err}");
    }

    #[tokio::test]
    async fn rate_limit_becomes_retryable_status() {
        let (base, _) = start_mock_upstream(StatusCode::TOO_MANY_REQUESTS, "slow down").await;

        let err = client(&base)
            .create_video(&account("a"), &text_input("x"), "s", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::Status { code: 429, .. }), "got: {err}");
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn exhaustion_marker_in_error_body_is_resource_exhausted() {
        let body = r#"{"error":{"status":"RESOURCE_EXHAUSTED","message":"quota"}}"#;
        let (base, _) = start_mock_upstream(StatusCode::BAD_REQUEST, body).await;

        let err = client(&base)
            .create_video(&account("a"), &text_input("x"), "s", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::ResourceExhausted(_)), "got: {err}");
    }

    #[tokio::test]
    async fn upload_returns_media_id() {
        let (base, _) = start_mock_upstream(StatusCode::OK, "{}").await;

        let media_id = client(&base)
            .upload_image(&account("a"), "aGVsbG8=")
            .await
            .unwrap();
        assert_eq!(media_id, "m-77");
    }

    #[tokio::test]
    async fn flow_image_generate_returns_task_id() {
        let (base, _) = start_mock_upstream(StatusCode::OK, "{}").await;

        let task_id = client(&base)
            .create_flow_image(&account("a"), &text_input("a cat"), "s")
            .await
            .unwrap();
        assert_eq!(task_id, "img-task-1");
    }

    #[tokio::test]
    async fn status_poll_404_is_access_lost() {
        let (base, _) = start_mock_upstream(StatusCode::OK, "{}").await;

        let err = client(&base)
            .fetch_operation(&account("a"), "T-9")
            .await
            .unwrap_err();
        assert!(
            matches!(err, UpstreamError::AccessLost { code: 404, .. }),
            "got: {err}"
        );
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn unreachable_upstream_is_transport_error() {
        let c = FlowClient::new(
            reqwest::Client::new(),
            "http://127.0.0.1:1".to_string(),
            "http://127.0.0.1:1".to_string(),
        );
        let err = c
            .create_video(&account("a"), &text_input("x"), "s", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::Transport(_)), "got: {err}");
        assert!(err.is_retryable());
    }
}
