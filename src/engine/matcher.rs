use alloc::{boxed::Box, vec};
use core::fmt;

use super::{config::PinchConfig, template::PinchTemplate};

pub const MAX_TEMPLATES: usize = 32;
const FLAT_EPSILON: f32 = 1.0e-9;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TemplateError {
    Empty,
    TooMany { count: usize, max: usize },
    NoSamples { index: usize },
    NonFinite { index: usize },
    InvalidMetadata { index: usize },
    Flat { index: usize },
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("template bank is empty"),
            Self::TooMany { count, max } => {
                write!(f, "template bank holds {count} templates, at most {max} allowed")
            }
            Self::NoSamples { index } => write!(f, "template {index} has no samples"),
            Self::NonFinite { index } => write!(f, "template {index} has non-finite samples"),
            Self::InvalidMetadata { index } => {
                write!(f, "template {index} has invalid version, sample rate or peak offset")
            }
            Self::Flat { index } => write!(f, "template {index} has no variation in the window"),
        }
    }
}

/// Shifts to zero mean and scales to unit L2 norm. Returns `false` and leaves
/// the buffer zeroed when it carries no variation.
pub fn z_normalize(buf: &mut [f32]) -> bool {
    if buf.is_empty() {
        return false;
    }
    let mean = buf.iter().sum::<f32>() / buf.len() as f32;
    let mut energy = 0.0f32;
    for x in buf.iter_mut() {
        *x -= mean;
        energy += *x * *x;
    }
    let norm = libm::sqrtf(energy);
    if !norm.is_finite() || norm <= FLAT_EPSILON {
        buf.fill(0.0);
        return false;
    }
    for x in buf.iter_mut() {
        *x /= norm;
    }
    true
}

/// Pearson correlation of two equal-length signals, in `[-1, 1]`. Returns 0
/// for mismatched lengths or a flat input.
pub fn normalized_cross_correlation(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let n = a.len() as f32;
    let mean_a = a.iter().sum::<f32>() / n;
    let mean_b = b.iter().sum::<f32>() / n;
    let (mut ab, mut aa, mut bb) = (0.0f32, 0.0f32, 0.0f32);
    for (&x, &y) in a.iter().zip(b) {
        let (dx, dy) = (x - mean_a, y - mean_b);
        ab += dx * dy;
        aa += dx * dx;
        bb += dy * dy;
    }
    let denom = libm::sqrtf(aa * bb);
    if !denom.is_finite() || denom <= FLAT_EPSILON {
        return 0.0;
    }
    (ab / denom).clamp(-1.0, 1.0)
}

/// Samples `template` at window position `j` (relative to the peak, in
/// detector samples), stretched by `warp` and displaced by `shift` samples.
/// Positions outside the recorded span take the nearest edge value.
fn resample_at(
    template: &PinchTemplate,
    detector_rate_hz: f32,
    j: f32,
    warp: f32,
    shift: f32,
) -> f32 {
    let samples = &template.samples;
    let seconds = (j - shift) / detector_rate_hz / warp;
    let pos = template.peak_offset() + seconds * template.sample_rate_hz;
    let last = (samples.len() - 1) as f32;
    let pos = pos.clamp(0.0, last);
    let lo = libm::floorf(pos) as usize;
    let hi = (lo + 1).min(samples.len() - 1);
    let frac = pos - lo as f32;
    samples[lo] + (samples[hi] - samples[lo]) * frac
}

/// Pre-expanded, validated set of reference waveforms.
///
/// Each template is resampled to the detector window, expanded over the warp
/// grid and the shift tolerance, and z-normalised once at construction.
/// Scoring is one normalisation of the window plus one dot product per
/// expanded template.
#[derive(Clone, Debug)]
pub struct TemplateBank {
    window_len: usize,
    source_count: usize,
    early_exit_ncc: f32,
    vectors: Box<[f32]>,
}

impl TemplateBank {
    pub fn new(templates: &[PinchTemplate], config: &PinchConfig) -> Result<Self, TemplateError> {
        if templates.is_empty() {
            return Err(TemplateError::Empty);
        }
        if templates.len() > MAX_TEMPLATES {
            return Err(TemplateError::TooMany {
                count: templates.len(),
                max: MAX_TEMPLATES,
            });
        }

        let window_len = config.window_len();
        let pre_n = config.pre_samples() as f32;
        let rate = config.signal.sample_rate_hz;
        let m = &config.matcher;
        let shift = i32::from(m.shift_tolerance);
        let per_template = m.warp_factors.len() * (2 * shift as usize + 1);
        let mut vectors = vec![0.0f32; templates.len() * per_template * window_len];

        let mut next = 0usize;
        for (index, template) in templates.iter().enumerate() {
            if template.samples.is_empty() {
                return Err(TemplateError::NoSamples { index });
            }
            if !template.samples.iter().all(|x| x.is_finite()) {
                return Err(TemplateError::NonFinite { index });
            }
            if !template.is_metadata_valid() {
                return Err(TemplateError::InvalidMetadata { index });
            }
            for &warp in &m.warp_factors {
                for s in -shift..=shift {
                    let out = &mut vectors[next..next + window_len];
                    next += window_len;
                    for (k, slot) in out.iter_mut().enumerate() {
                        *slot = resample_at(template, rate, k as f32 - pre_n, warp, s as f32);
                    }
                    if !z_normalize(out) {
                        return Err(TemplateError::Flat { index });
                    }
                }
            }
        }

        Ok(Self {
            window_len,
            source_count: templates.len(),
            early_exit_ncc: m.early_exit_ncc,
            vectors: vectors.into_boxed_slice(),
        })
    }

    pub fn window_len(&self) -> usize {
        self.window_len
    }

    /// Number of templates the bank was built from.
    pub fn source_count(&self) -> usize {
        self.source_count
    }

    /// Number of expanded vectors.
    pub fn len(&self) -> usize {
        self.vectors.len() / self.window_len
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &[f32]> + '_ {
        self.vectors.chunks_exact(self.window_len)
    }

    /// Best correlation of `window` against the bank, stopping at the first
    /// score at or above the early-exit level. `window` is z-normalised in
    /// place; a flat or wrongly sized window scores 0.
    pub fn best_match(&self, window: &mut [f32]) -> f32 {
        if window.len() != self.window_len || !z_normalize(window) {
            return 0.0;
        }
        let mut best = -1.0f32;
        for vector in self.iter() {
            let score: f32 = vector.iter().zip(window.iter()).map(|(a, b)| a * b).sum();
            if score > best {
                best = score;
                if best >= self.early_exit_ncc {
                    break;
                }
            }
        }
        best.clamp(-1.0, 1.0)
    }
}

#[cfg(test)]
mod tests;
