use core::fmt;

use serde::{Deserialize, Serialize};

pub const WARP_STEPS: usize = 3;
pub const MAX_SHIFT_TOLERANCE: u8 = 4;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignalConfig {
    pub sample_rate_hz: f32,
    pub band_low_hz: f32,
    pub band_high_hz: f32,
    pub accel_weight: f32,
    pub gyro_weight: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BaselineConfig {
    pub window_ms: u64,
    pub gate_k: f32,
    /// Release bound as a fraction of the gate height over baseline.
    pub release_ratio: f32,
    pub min_sigma: f32,
    pub gate_ramp_ms: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PeakConfig {
    pub refractory_ms: u64,
    pub min_width_ms: u64,
    pub max_width_ms: u64,
    pub pre_quiet_ms: u64,
    pub ignore_start_ms: u64,
    pub ignore_end_ms: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GateConfig {
    pub amplitude_surplus_thresh: f32,
    pub isi_threshold_ms: u64,
    pub isi_override_ncc: f32,
    pub gyro_veto_thresh: f32,
    pub gyro_veto_hold_ms: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatcherConfig {
    pub ncc_thresh: f32,
    pub early_exit_ncc: f32,
    pub pre_ms: u64,
    pub post_ms: u64,
    pub warp_factors: [f32; WARP_STEPS],
    pub shift_tolerance: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PinchConfig {
    pub signal: SignalConfig,
    pub baseline: BaselineConfig,
    pub peak: PeakConfig,
    pub gates: GateConfig,
    pub matcher: MatcherConfig,
}

include!(concat!(env!("OUT_DIR"), "/pinch_config.rs"));

pub fn active_config() -> &'static PinchConfig {
    &COMPILED_PINCH_CONFIG
}

impl Default for PinchConfig {
    fn default() -> Self {
        COMPILED_PINCH_CONFIG
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ConfigError {
    SampleRate(f32),
    Band { low_hz: f32, high_hz: f32 },
    AboveNyquist { high_hz: f32, nyquist_hz: f32 },
    Weights,
    NonPositive(&'static str),
    OutOfRange(&'static str),
    WidthRange { min_ms: u64, max_ms: u64 },
    WindowTooShort(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SampleRate(rate) => write!(f, "sample rate {rate} Hz is not positive"),
            Self::Band { low_hz, high_hz } => {
                write!(f, "band-pass cutoffs {low_hz}..{high_hz} Hz are not ordered")
            }
            Self::AboveNyquist {
                high_hz,
                nyquist_hz,
            } => write!(
                f,
                "band-pass high cutoff {high_hz} Hz must be below Nyquist ({nyquist_hz} Hz)"
            ),
            Self::Weights => f.write_str("fusion weights must be non-negative, not both zero"),
            Self::NonPositive(field) => write!(f, "{field} must be positive"),
            Self::OutOfRange(field) => write!(f, "{field} is out of range"),
            Self::WidthRange { min_ms, max_ms } => {
                write!(f, "candidate width range {min_ms}..{max_ms} ms is empty")
            }
            Self::WindowTooShort(field) => {
                write!(f, "{field} is shorter than one sample period")
            }
        }
    }
}

fn positive(value: f32) -> bool {
    value.is_finite() && value > 0.0
}

fn unit(value: f32) -> bool {
    value.is_finite() && value > 0.0 && value <= 1.0
}

impl PinchConfig {
    /// Rejects configurations the engine cannot run with. Called once by
    /// `Detector::new`; nothing on the per-sample path re-checks.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.signal;
        if !positive(s.sample_rate_hz) {
            return Err(ConfigError::SampleRate(s.sample_rate_hz));
        }
        if !positive(s.band_low_hz) || !(s.band_high_hz > s.band_low_hz) {
            return Err(ConfigError::Band {
                low_hz: s.band_low_hz,
                high_hz: s.band_high_hz,
            });
        }
        let nyquist_hz = s.sample_rate_hz * 0.5;
        if !(s.band_high_hz < nyquist_hz) {
            return Err(ConfigError::AboveNyquist {
                high_hz: s.band_high_hz,
                nyquist_hz,
            });
        }
        let weights_ok = s.accel_weight.is_finite()
            && s.gyro_weight.is_finite()
            && s.accel_weight >= 0.0
            && s.gyro_weight >= 0.0
            && (s.accel_weight > 0.0 || s.gyro_weight > 0.0);
        if !weights_ok {
            return Err(ConfigError::Weights);
        }

        let b = &self.baseline;
        if self.ms_to_samples(b.window_ms) < 2 {
            return Err(ConfigError::WindowTooShort("baseline.window_ms"));
        }
        if !positive(b.gate_k) {
            return Err(ConfigError::NonPositive("baseline.gate_k"));
        }
        if !unit(b.release_ratio) {
            return Err(ConfigError::OutOfRange("baseline.release_ratio"));
        }
        if !positive(b.min_sigma) {
            return Err(ConfigError::NonPositive("baseline.min_sigma"));
        }

        let p = &self.peak;
        if p.refractory_ms == 0 {
            return Err(ConfigError::NonPositive("peak.refractory_ms"));
        }
        if p.min_width_ms == 0 {
            return Err(ConfigError::NonPositive("peak.min_width_ms"));
        }
        if p.max_width_ms < p.min_width_ms {
            return Err(ConfigError::WidthRange {
                min_ms: p.min_width_ms,
                max_ms: p.max_width_ms,
            });
        }

        let g = &self.gates;
        if !(g.amplitude_surplus_thresh.is_finite() && g.amplitude_surplus_thresh >= 0.0) {
            return Err(ConfigError::OutOfRange("gates.amplitude_surplus_thresh"));
        }
        if !unit(g.isi_override_ncc) {
            return Err(ConfigError::OutOfRange("gates.isi_override_ncc"));
        }
        if !positive(g.gyro_veto_thresh) {
            return Err(ConfigError::NonPositive("gates.gyro_veto_thresh"));
        }

        let m = &self.matcher;
        if !unit(m.ncc_thresh) {
            return Err(ConfigError::OutOfRange("matcher.ncc_thresh"));
        }
        if !unit(m.early_exit_ncc) || m.early_exit_ncc < m.ncc_thresh {
            return Err(ConfigError::OutOfRange("matcher.early_exit_ncc"));
        }
        if self.pre_samples() == 0 {
            return Err(ConfigError::WindowTooShort("matcher.pre_ms"));
        }
        if self.post_samples() == 0 {
            return Err(ConfigError::WindowTooShort("matcher.post_ms"));
        }
        if !m
            .warp_factors
            .iter()
            .all(|f| f.is_finite() && (0.5..=2.0).contains(f))
        {
            return Err(ConfigError::OutOfRange("matcher.warp_factors"));
        }
        if m.shift_tolerance > MAX_SHIFT_TOLERANCE {
            return Err(ConfigError::OutOfRange("matcher.shift_tolerance"));
        }

        Ok(())
    }

    pub fn ms_to_samples(&self, ms: u64) -> usize {
        libm::roundf(ms as f32 * self.signal.sample_rate_hz / 1000.0) as usize
    }

    pub fn baseline_window_samples(&self) -> usize {
        self.ms_to_samples(self.baseline.window_ms)
    }

    pub fn pre_samples(&self) -> usize {
        self.ms_to_samples(self.matcher.pre_ms)
    }

    pub fn post_samples(&self) -> usize {
        self.ms_to_samples(self.matcher.post_ms)
    }

    /// Length of every extracted window and every expanded template.
    pub fn window_len(&self) -> usize {
        self.pre_samples() + self.post_samples() + 1
    }
}
