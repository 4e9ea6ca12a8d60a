//! Model and endpoint routing decision table
//!
//! Routing is a total function of the frame inputs and the aspect ratio:
//! 4 input classes × 2 aspect classes map to exactly 8 fixed routes. The
//! table replaces nested optional-field conditionals so the mapping stays
//! exhaustively testable.

use crate::types::AspectRatio;

/// Which frame attachments the request carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameInputs {
    TextOnly,
    FirstFrame,
    LastFrame,
    FirstAndLast,
}

impl FrameInputs {
    pub fn classify(start: Option<&str>, end: Option<&str>) -> Self {
        match (start, end) {
            (None, None) => FrameInputs::TextOnly,
            (Some(_), None) => FrameInputs::FirstFrame,
            (None, Some(_)) => FrameInputs::LastFrame,
            (Some(_), Some(_)) => FrameInputs::FirstAndLast,
        }
    }
}

/// One resolved route: the model identifier and the upstream tool name sent
/// with the generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub model: &'static str,
    pub tool: &'static str,
}

/// Resolve the route for a frame/aspect combination.
pub fn route(inputs: FrameInputs, aspect: AspectRatio) -> Route {
    use AspectRatio::{Landscape, Portrait};
    use FrameInputs::{FirstAndLast, FirstFrame, LastFrame, TextOnly};

    match (inputs, aspect) {
        (TextOnly, Landscape) => Route {
            model: "veo_3_0_t2v_fast",
            tool: "TEXT_TO_VIDEO",
        },
        (TextOnly, Portrait) => Route {
            model: "veo_3_0_t2v_fast_portrait",
            tool: "TEXT_TO_VIDEO",
        },
        (FirstFrame, Landscape) => Route {
            model: "veo_3_0_i2v_fast",
            tool: "IMAGE_TO_VIDEO",
        },
        (FirstFrame, Portrait) => Route {
            model: "veo_3_0_i2v_fast_portrait",
            tool: "IMAGE_TO_VIDEO",
        },
        (LastFrame, Landscape) => Route {
            model: "veo_3_0_l2v_fast",
            tool: "IMAGE_TO_VIDEO",
        },
        (LastFrame, Portrait) => Route {
            model: "veo_3_0_l2v_fast_portrait",
            tool: "IMAGE_TO_VIDEO",
        },
        (FirstAndLast, Landscape) => Route {
            model: "veo_2_1_fl2v",
            tool: "FRAMES_TO_VIDEO",
        },
        (FirstAndLast, Portrait) => Route {
            model: "veo_2_1_fl2v_portrait",
            tool: "FRAMES_TO_VIDEO",
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_INPUTS: [FrameInputs; 4] = [
        FrameInputs::TextOnly,
        FrameInputs::FirstFrame,
        FrameInputs::LastFrame,
        FrameInputs::FirstAndLast,
    ];
    const ALL_ASPECTS: [AspectRatio; 2] = [AspectRatio::Landscape, AspectRatio::Portrait];

    #[test]
    fn classify_covers_all_optional_shapes() {
        assert_eq!(FrameInputs::classify(None, None), FrameInputs::TextOnly);
        assert_eq!(
            FrameInputs::classify(Some("m1"), None),
            FrameInputs::FirstFrame
        );
        assert_eq!(
            FrameInputs::classify(None, Some("m2")),
            FrameInputs::LastFrame
        );
        assert_eq!(
            FrameInputs::classify(Some("m1"), Some("m2")),
            FrameInputs::FirstAndLast
        );
    }

    #[test]
    fn eight_combinations_yield_eight_distinct_models() {
        let mut models = Vec::new();
        for inputs in ALL_INPUTS {
            for aspect in ALL_ASPECTS {
                models.push(route(inputs, aspect).model);
            }
        }
        assert_eq!(models.len(), 8);
        let mut deduped = models.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), 8, "every combination needs its own model");
    }

    #[test]
    fn portrait_variants_share_the_tool_of_their_landscape_twin() {
        for inputs in ALL_INPUTS {
            let landscape = route(inputs, AspectRatio::Landscape);
            let portrait = route(inputs, AspectRatio::Portrait);
            assert_eq!(landscape.tool, portrait.tool);
            assert_ne!(landscape.model, portrait.model);
        }
    }

    #[test]
    fn dual_frame_requests_use_the_frames_tool() {
        let r = route(FrameInputs::FirstAndLast, AspectRatio::Landscape);
        assert_eq!(r.tool, "FRAMES_TO_VIDEO");
        assert_eq!(r.model, "veo_2_1_fl2v");
    }

    #[test]
    fn text_only_requests_use_the_text_tool() {
        let r = route(FrameInputs::TextOnly, AspectRatio::Portrait);
        assert_eq!(r.tool, "TEXT_TO_VIDEO");
        assert_eq!(r.model, "veo_3_0_t2v_fast_portrait");
    }
}
