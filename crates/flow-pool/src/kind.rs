//! Operation kinds and their quota policy

/// Every operation the executor can drive against an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    UploadImage,
    CreateVideo,
    CreateVideoWithRefs,
    CreateFlowImage,
    UpscaleFlowImage,
    UpscaleVideo,
    CheckStatus,
}

impl OperationKind {
    /// Whether a dispatch of this kind counts against the account's quota.
    ///
    /// Uploads and status polls are free; everything that triggers a billable
    /// generation upstream consumes quota. The increment happens before the
    /// attempt resolves, so a failed attempt may still consume a unit.
    pub fn consumes_quota(&self) -> bool {
        matches!(
            self,
            OperationKind::CreateVideo
                | OperationKind::CreateVideoWithRefs
                | OperationKind::CreateFlowImage
                | OperationKind::UpscaleFlowImage
                | OperationKind::UpscaleVideo
        )
    }

    /// Stable label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::UploadImage => "upload_image",
            OperationKind::CreateVideo => "create_video",
            OperationKind::CreateVideoWithRefs => "create_video_with_refs",
            OperationKind::CreateFlowImage => "create_flow_image",
            OperationKind::UpscaleFlowImage => "upscale_flow_image",
            OperationKind::UpscaleVideo => "upscale_video",
            OperationKind::CheckStatus => "check_status",
        }
    }
}
