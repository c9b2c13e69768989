use alloc::{string::String, vec::Vec};

use serde::{Deserialize, Serialize};

use super::config::PinchConfig;

pub const TEMPLATE_FORMAT_VERSION: u16 = 1;

/// Where a recorded template came from.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateSource {
    pub session_id: String,
    pub created_unix_ms: u64,
    pub mark_ms: u64,
}

/// Reference waveform of one gesture, sampled at `sample_rate_hz` with the
/// peak `pre_ms` after the first sample.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PinchTemplate {
    #[serde(default = "default_version")]
    pub version: u16,
    pub sample_rate_hz: f32,
    pub pre_ms: u64,
    pub post_ms: u64,
    pub samples: Vec<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<TemplateSource>,
}

fn default_version() -> u16 {
    TEMPLATE_FORMAT_VERSION
}

impl PinchTemplate {
    /// Bare waveform captured with the detector's own geometry, as found in
    /// array-of-arrays template files.
    pub fn from_samples(samples: Vec<f32>, config: &PinchConfig) -> Self {
        Self {
            version: TEMPLATE_FORMAT_VERSION,
            sample_rate_hz: config.signal.sample_rate_hz,
            pre_ms: config.matcher.pre_ms,
            post_ms: config.matcher.post_ms,
            samples,
            source: None,
        }
    }

    /// Index of the peak sample within `samples`.
    pub fn peak_offset(&self) -> f32 {
        libm::roundf(self.pre_ms as f32 * self.sample_rate_hz / 1000.0)
    }

    pub fn is_metadata_valid(&self) -> bool {
        self.version == TEMPLATE_FORMAT_VERSION
            && self.sample_rate_hz.is_finite()
            && self.sample_rate_hz > 0.0
            && self.peak_offset() < self.samples.len() as f32
    }
}
