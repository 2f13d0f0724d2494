use serde::Serialize;

use super::{CaptureStream, Dimensions};

/// Label shown before any dimensions are known.
pub const PLACEHOLDER_LABEL: &str = "MP";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionEstimate {
    pub megapixels: f64,
    pub label: String,
}

impl ResolutionEstimate {
    pub fn unknown() -> Self {
        Self {
            megapixels: 0.0,
            label: PLACEHOLDER_LABEL.to_string(),
        }
    }

    pub fn from_dimensions(dimensions: Dimensions) -> Self {
        let megapixels = f64::from(dimensions.width) * f64::from(dimensions.height) / 1_000_000.0;
        if megapixels <= 0.0 {
            return Self::unknown();
        }
        Self {
            megapixels,
            label: format_label(megapixels),
        }
    }
}

/// Everything the estimator may look at, in preference order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolutionSources {
    pub track_settings: Option<Dimensions>,
    pub playback: Option<Dimensions>,
    pub capabilities: Option<Dimensions>,
}

impl ResolutionSources {
    pub fn from_stream(stream: &dyn CaptureStream) -> Self {
        Self {
            track_settings: stream.track_settings(),
            playback: stream.playback_size(),
            capabilities: stream.capabilities(),
        }
    }
}

pub fn estimate(sources: &ResolutionSources) -> ResolutionEstimate {
    [
        sources.track_settings,
        sources.playback,
        sources.capabilities,
    ]
    .into_iter()
    .flatten()
    .find_map(Dimensions::non_zero)
    .map(ResolutionEstimate::from_dimensions)
    .unwrap_or_else(ResolutionEstimate::unknown)
}

fn format_label(megapixels: f64) -> String {
    let rounded = if megapixels >= 10.0 {
        megapixels.round()
    } else {
        (megapixels * 10.0).round() / 10.0
    };

    if rounded.fract() == 0.0 {
        format!("{rounded:.0}{PLACEHOLDER_LABEL}")
    } else {
        format!("{rounded:.1}{PLACEHOLDER_LABEL}")
    }
}
