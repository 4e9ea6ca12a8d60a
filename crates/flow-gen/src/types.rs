//! Caller-facing request and result types

use serde::{Deserialize, Serialize};

/// Output orientation; selects the portrait or landscape model variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AspectRatio {
    #[default]
    Landscape,
    Portrait,
}

impl AspectRatio {
    /// Wire token the upstream generation API expects.
    pub fn as_wire(&self) -> &'static str {
        match self {
            AspectRatio::Landscape => "VIDEO_ASPECT_RATIO_LANDSCAPE",
            AspectRatio::Portrait => "VIDEO_ASPECT_RATIO_PORTRAIT",
        }
    }
}

/// One generation request as submitted by the caller. Transient, never
/// persisted.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationInput {
    pub prompt: String,

    pub aspect_ratio: AspectRatio,

    /// Media id of an already-uploaded first frame.
    pub start_image: Option<String>,

    /// Media id of an already-uploaded last frame.
    pub end_image: Option<String>,

    /// Raw base64 reference image payloads, uploaded one by one under the
    /// attempting account before the generation call.
    pub reference_images: Vec<String>,

    /// Explicit model override; when absent the routing table decides.
    pub model: Option<String>,
}

impl GenerationInput {
    pub fn has_references(&self) -> bool {
        !self.reference_images.is_empty()
    }
}

/// The pinned (taskId, accountId) pair a caller must keep to poll a
/// dispatched job. `scene_id` is the local correlation id embedded in the
/// upstream request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationHandle {
    pub task_id: String,
    pub scene_id: String,
    pub account_id: String,
}

/// Normalized poll result. Terminal states carry everything the caller's
/// credit ledger needs to decide on a refund.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobStatus {
    Processing,
    Completed {
        media_url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        media_id: Option<String>,
    },
    Failed {
        message: String,
    },
}

impl JobStatus {
    /// Whether further polling is expected.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Processing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_input_accepts_minimal_payload() {
        let input: GenerationInput =
            serde_json::from_str(r#"{"prompt":"a red balloon"}"#).unwrap();
        assert_eq!(input.prompt, "a red balloon");
        assert_eq!(input.aspect_ratio, AspectRatio::Landscape);
        assert!(input.start_image.is_none());
        assert!(!input.has_references());
    }

    #[test]
    fn generation_input_parses_full_payload() {
        let input: GenerationInput = serde_json::from_str(
            r#"{
                "prompt": "dawn over the harbor",
                "aspectRatio": "portrait",
                "startImage": "media-1",
                "endImage": "media-2",
                "referenceImages": ["aGk=", "eW8="],
                "model": "custom_model"
            }"#,
        )
        .unwrap();
        assert_eq!(input.aspect_ratio, AspectRatio::Portrait);
        assert_eq!(input.start_image.as_deref(), Some("media-1"));
        assert_eq!(input.reference_images.len(), 2);
        assert_eq!(input.model.as_deref(), Some("custom_model"));
    }

    #[test]
    fn operation_handle_round_trips_camel_case() {
        let handle = OperationHandle {
            task_id: "T-1".into(),
            scene_id: "scene".into(),
            account_id: "acct".into(),
        };
        let json = serde_json::to_value(&handle).unwrap();
        assert_eq!(json["taskId"], "T-1");
        assert_eq!(json["accountId"], "acct");
        let back: OperationHandle = serde_json::from_value(json).unwrap();
        assert_eq!(back, handle);
    }

    #[test]
    fn job_status_serializes_tagged() {
        let done = JobStatus::Completed {
            media_url: "https://cdn/video.mp4".into(),
            media_id: None,
        };
        let json = serde_json::to_value(&done).unwrap();
        assert_eq!(json["state"], "completed");
        assert_eq!(json["media_url"], "https://cdn/video.mp4");
        assert!(json.get("media_id").is_none());

        assert!(done.is_terminal());
        assert!(JobStatus::Failed { message: "x".into() }.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
    }
}
