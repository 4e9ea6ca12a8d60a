//! Upstream status normalization
//!
//! Collapses the upstream operation-status vocabulary into the three-state
//! `JobStatus`. Unknown tokens are treated as still processing so a newly
//! introduced upstream state never crashes or terminates a poll loop.

use flow_pool::upstream::truncate;
use tracing::warn;

use crate::types::JobStatus;

/// Status tokens that mean the generation finished with output.
const SUCCESS_TOKENS: &[&str] = &[
    "MEDIA_GENERATION_STATUS_SUCCESSFUL",
    "MEDIA_GENERATION_STATUS_COMPLETED",
    "MEDIA_GENERATION_STATUS_DONE",
];

/// Status token that means the generation terminally failed.
const FAILED_TOKEN: &str = "MEDIA_GENERATION_STATUS_FAILED";

/// Fields the status token may appear under.
const STATUS_POINTERS: &[&str] = &["/status", "/operation/metadata/status", "/metadata/status"];

/// Fields a playable media URL may appear under, first populated wins.
const MEDIA_URL_POINTERS: &[&str] = &[
    "/operation/metadata/video/fifeUrl",
    "/operation/metadata/video/servingBaseUri",
    "/operation/result/video/fifeUrl",
    "/operation/result/video/videoUrl",
    "/mediaUrl",
];

/// Fields the generated media id may appear under.
const MEDIA_ID_POINTERS: &[&str] = &["/operation/metadata/video/mediaId", "/mediaId"];

/// Fields an upstream failure message may appear under.
const ERROR_MESSAGE_POINTERS: &[&str] = &["/error/message", "/operation/error/message"];

/// Normalize one raw status response into a `JobStatus`.
///
/// A nominally successful status without a resolvable media URL is demoted
/// to `Failed` with a truncated snapshot of the raw response; a completed
/// status is never returned without a payload.
pub fn normalize(response: &serde_json::Value) -> JobStatus {
    let entry = response.pointer("/operations/0").unwrap_or(response);

    let token = first_string(entry, STATUS_POINTERS).unwrap_or_default();

    if SUCCESS_TOKENS.contains(&token.as_str()) {
        return match first_string(entry, MEDIA_URL_POINTERS) {
            Some(media_url) => JobStatus::Completed {
                media_url,
                media_id: first_string(entry, MEDIA_ID_POINTERS),
            },
            None => {
                let snapshot = truncate(&entry.to_string(), 300);
                warn!(status = %token, "successful status without media url");
                JobStatus::Failed {
                    message: format!("generation reported {token} but no media url was present: {snapshot}"),
                }
            }
        };
    }

    if token == FAILED_TOKEN {
        let message = first_string(entry, ERROR_MESSAGE_POINTERS)
            .unwrap_or_else(|| String::from("generation failed upstream"));
        return JobStatus::Failed { message };
    }

    JobStatus::Processing
}

fn first_string(value: &serde_json::Value, pointers: &[&str]) -> Option<String> {
    pointers
        .iter()
        .filter_map(|p| value.pointer(p))
        .filter_map(|v| v.as_str())
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successful_status_with_url_completes() {
        let response = serde_json::json!({
            "operations": [{
                "status": "MEDIA_GENERATION_STATUS_SUCCESSFUL",
                "operation": {
                    "metadata": { "video": { "fifeUrl": "https://cdn/v.mp4", "mediaId": "m-1" } }
                }
            }]
        });
        assert_eq!(
            normalize(&response),
            JobStatus::Completed {
                media_url: "https://cdn/v.mp4".into(),
                media_id: Some("m-1".into()),
            }
        );
    }

    #[test]
    fn first_populated_url_field_wins() {
        let response = serde_json::json!({
            "status": "MEDIA_GENERATION_STATUS_DONE",
            "operation": {
                "metadata": { "video": { "fifeUrl": "", "servingBaseUri": "https://cdn/base" } },
                "result": { "video": { "videoUrl": "https://cdn/other" } }
            }
        });
        match normalize(&response) {
            JobStatus::Completed { media_url, .. } => {
                assert_eq!(media_url, "https://cdn/base", "empty fields are skipped");
            }
            other => panic!("expected completed, got: {other:?}"),
        }
    }

    #[test]
    fn success_without_url_downgrades_to_failed() {
        let response = serde_json::json!({
            "operations": [{ "status": "MEDIA_GENERATION_STATUS_SUCCESSFUL" }]
        });
        match normalize(&response) {
            JobStatus::Failed { message } => {
                assert!(message.contains("no media url"), "got: {message}");
                assert!(
                    message.contains("MEDIA_GENERATION_STATUS_SUCCESSFUL"),
                    "diagnostic names the upstream token: {message}"
                );
            }
            other => panic!("expected failed, got: {other:?}"),
        }
    }

    #[test]
    fn failed_status_carries_upstream_message() {
        let response = serde_json::json!({
            "status": "MEDIA_GENERATION_STATUS_FAILED",
            "error": { "message": "prompt rejected" }
        });
        assert_eq!(
            normalize(&response),
            JobStatus::Failed { message: "prompt rejected".into() }
        );
    }

    #[test]
    fn failed_status_without_message_gets_a_generic_one() {
        let response = serde_json::json!({ "status": "MEDIA_GENERATION_STATUS_FAILED" });
        match normalize(&response) {
            JobStatus::Failed { message } => assert_eq!(message, "generation failed upstream"),
            other => panic!("expected failed, got: {other:?}"),
        }
    }

    #[test]
    fn pending_and_unknown_tokens_keep_processing() {
        for token in ["MEDIA_GENERATION_STATUS_PENDING", "MEDIA_GENERATION_STATUS_ACTIVE", "SOMETHING_NEW"] {
            let response = serde_json::json!({ "status": token });
            assert_eq!(normalize(&response), JobStatus::Processing, "token: {token}");
        }
    }

    #[test]
    fn statusless_response_is_processing() {
        assert_eq!(normalize(&serde_json::json!({})), JobStatus::Processing);
    }

    #[test]
    fn normalization_is_idempotent() {
        let response = serde_json::json!({
            "operations": [{
                "status": "MEDIA_GENERATION_STATUS_COMPLETED",
                "operation": { "result": { "video": { "fifeUrl": "https://cdn/v.mp4" } } }
            }]
        });
        assert_eq!(normalize(&response), normalize(&response));
    }
}
