use serde::{Deserialize, Deserializer, Serialize};

use super::error::AnalysisError;

/// Identifier handed out by a worker for every posted request.
pub type RequestId = u64;

/// Work item for the analysis worker. The sample buffer is moved in and owned
/// by the worker for the duration of one computation.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum AnalysisRequest {
    Amplitude {
        samples: Vec<f32>,
        sample_rate: f64,
        #[serde(deserialize_with = "count_or_zero")]
        target_point_count: usize,
    },
    Frequency {
        samples: Vec<f32>,
        sample_rate: f64,
        #[serde(deserialize_with = "count_or_zero")]
        bar_count: usize,
        #[serde(deserialize_with = "count_or_zero")]
        window_size: usize,
    },
}

/// Counts arrive as JSON integers; negative values mean "nothing to compute".
fn count_or_zero<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Unsigned(u64),
        Signed(i64),
    }

    Ok(match Count::deserialize(deserializer)? {
        Count::Unsigned(n) => usize::try_from(n).unwrap_or(usize::MAX),
        Count::Signed(_) => 0,
    })
}

impl AnalysisRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisRequest::Amplitude { .. } => "amplitude",
            AnalysisRequest::Frequency { .. } => "frequency",
        }
    }
}

/// One plotted waveform vertex.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AmplitudePoint {
    pub time_ms: f64,
    pub amplitude: f32,
}

/// One plotted spectrum bar. `level` is always within [0, 255].
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrequencyBar {
    pub band_label: String,
    pub level: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", content = "series", rename_all = "camelCase")]
pub enum AnalysisResult {
    Amplitude(Vec<AmplitudePoint>),
    Frequency(Vec<FrequencyBar>),
}

impl AnalysisResult {
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisResult::Amplitude(_) => "amplitude",
            AnalysisResult::Frequency(_) => "frequency",
        }
    }

    pub fn len(&self) -> usize {
        match self {
            AnalysisResult::Amplitude(points) => points.len(),
            AnalysisResult::Frequency(bars) => bars.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Message sent back by the worker: exactly one per request, tagged with the
/// id returned when the request was posted.
#[derive(Debug)]
pub struct AnalysisResponse {
    pub id: RequestId,
    pub outcome: Result<AnalysisResult, AnalysisError>,
}
