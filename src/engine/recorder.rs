use alloc::{string::String, vec, vec::Vec};
use core::fmt;

use super::{
    config::{ConfigError, PinchConfig},
    features::SignalChain,
    matcher::z_normalize,
    ring::RingBuffer,
    template::{PinchTemplate, TemplateSource, TEMPLATE_FORMAT_VERSION},
    types::{FusedSample, SensorFrame},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecorderError {
    Empty,
    /// The mark lies outside the retained span of the session.
    MarkOutOfRange { mark_ms: u64 },
    /// The window around the mark runs past the retained samples.
    WindowUnavailable { mark_ms: u64 },
    Flat { mark_ms: u64 },
}

impl fmt::Display for RecorderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("no samples recorded"),
            Self::MarkOutOfRange { mark_ms } => {
                write!(f, "mark at {mark_ms} ms is outside the recorded span")
            }
            Self::WindowUnavailable { mark_ms } => {
                write!(f, "window around {mark_ms} ms is not fully recorded")
            }
            Self::Flat { mark_ms } => write!(f, "window around {mark_ms} ms has no variation"),
        }
    }
}

/// Capture-mode companion of the detector: keeps the fused signal of a whole
/// session and cuts normalised windows around externally marked peaks.
///
/// It runs its own front end so it can live on another thread; it shares no
/// state with any detector.
pub struct TemplateRecorder {
    config: PinchConfig,
    session_id: String,
    created_unix_ms: u64,
    chain: SignalChain,
    ring: RingBuffer<(u64, f32)>,
}

impl TemplateRecorder {
    /// `session_ms` sizes the buffer; older samples are overwritten once a
    /// session runs longer.
    pub fn new(
        config: PinchConfig,
        session_id: impl Into<String>,
        created_unix_ms: u64,
        session_ms: u64,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let capacity = config.ms_to_samples(session_ms) + config.window_len();
        Ok(Self {
            chain: SignalChain::new(&config),
            ring: RingBuffer::new(capacity),
            session_id: session_id.into(),
            created_unix_ms,
            config,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    pub fn push_frame(&mut self, frame: &SensorFrame) {
        let sample = self.chain.push(frame);
        self.push_fused(sample);
    }

    pub fn push_fused(&mut self, sample: FusedSample) {
        if sample.value.is_finite() {
            self.ring.push((sample.now_ms, sample.value));
        }
    }

    pub fn reset(&mut self) {
        self.chain.reset();
        self.ring.clear();
    }

    /// Position (from the oldest retained sample) of the sample closest to
    /// `mark_ms`; ties go to the earlier sample.
    fn nearest(&self, mark_ms: u64) -> Result<usize, RecorderError> {
        let time_at = |i: usize| self.ring.get(i).map_or(u64::MAX, |(t, _)| t);
        let len = self.ring.len();
        if len == 0 {
            return Err(RecorderError::Empty);
        }
        if mark_ms < time_at(0) || mark_ms > time_at(len - 1) {
            return Err(RecorderError::MarkOutOfRange { mark_ms });
        }

        let (mut lo, mut hi) = (0usize, len - 1);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if time_at(mid) < mark_ms {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        if lo > 0 && mark_ms - time_at(lo - 1) <= time_at(lo) - mark_ms {
            return Ok(lo - 1);
        }
        Ok(lo)
    }

    pub fn extract(&self, mark_ms: u64) -> Result<PinchTemplate, RecorderError> {
        let centre = self.nearest(mark_ms)?;
        let pre_n = self.config.pre_samples();
        let post_n = self.config.post_samples();
        if centre < pre_n || centre + post_n >= self.ring.len() {
            return Err(RecorderError::WindowUnavailable { mark_ms });
        }

        let mut samples = vec![0.0f32; self.config.window_len()];
        for (k, slot) in samples.iter_mut().enumerate() {
            *slot = self.ring.get(centre - pre_n + k).map_or(0.0, |(_, v)| v);
        }
        if !z_normalize(&mut samples) {
            return Err(RecorderError::Flat { mark_ms });
        }

        Ok(PinchTemplate {
            version: TEMPLATE_FORMAT_VERSION,
            sample_rate_hz: self.config.signal.sample_rate_hz,
            pre_ms: self.config.matcher.pre_ms,
            post_ms: self.config.matcher.post_ms,
            samples,
            source: Some(TemplateSource {
                session_id: self.session_id.clone(),
                created_unix_ms: self.created_unix_ms,
                mark_ms,
            }),
        })
    }

    /// Every mark that yields a window, in mark order. Marks that fail are
    /// skipped and logged.
    pub fn extract_all(&self, marks: &[u64]) -> Vec<PinchTemplate> {
        marks
            .iter()
            .filter_map(|&mark_ms| match self.extract(mark_ms) {
                Ok(template) => Some(template),
                Err(err) => {
                    log::debug!("recorder: skipping mark {mark_ms}: {err}");
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::matcher::TemplateBank;

    fn bump(k: i64) -> f32 {
        let d = k as f32 / 2.0;
        libm::expf(-0.5 * d * d)
    }

    /// Flat 1.0 signal at 50 Hz with bumps centred on the given indices.
    fn recorder_with(len: usize, peaks: &[usize]) -> TemplateRecorder {
        let mut rec =
            TemplateRecorder::new(PinchConfig::default(), "session-7", 1_700_000_000_000, 60_000)
                .expect("recorder");
        for i in 0..len {
            let value = peaks
                .iter()
                .map(|&p| 4.0 * bump(i as i64 - p as i64))
                .sum::<f32>();
            rec.push_fused(FusedSample {
                now_ms: i as u64 * 20,
                value: 1.0 + value,
                gyro_magnitude: 0.0,
            });
        }
        rec
    }

    #[test]
    fn extracts_normalised_window_with_provenance() {
        let rec = recorder_with(200, &[100]);
        let template = rec.extract(2_000).expect("template");
        let cfg = PinchConfig::default();
        assert_eq!(template.samples.len(), cfg.window_len());
        assert_eq!(template.sample_rate_hz, 50.0);
        assert_eq!(template.pre_ms, cfg.matcher.pre_ms);

        let mean = template.samples.iter().sum::<f32>() / template.samples.len() as f32;
        let norm = template.samples.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!(mean.abs() < 1e-5);
        assert!((norm - 1.0).abs() < 1e-4);

        let peak = template
            .samples
            .iter()
            .enumerate()
            .fold((0, f32::MIN), |best, (i, &v)| if v > best.1 { (i, v) } else { best });
        assert_eq!(peak.0, cfg.pre_samples());

        let source = template.source.expect("provenance");
        assert_eq!(source.session_id, "session-7");
        assert_eq!(source.created_unix_ms, 1_700_000_000_000);
        assert_eq!(source.mark_ms, 2_000);
    }

    #[test]
    fn mark_between_samples_snaps_to_nearest() {
        let rec = recorder_with(200, &[100]);
        let exact = rec.extract(2_000).expect("exact");
        let near = rec.extract(2_009).expect("near");
        assert_eq!(exact.samples, near.samples);
        let later = rec.extract(2_011).expect("later");
        assert_ne!(exact.samples, later.samples);
    }

    #[test]
    fn failures_are_reported_and_skipped_in_batches() {
        let rec = recorder_with(200, &[60, 150]);
        assert_eq!(
            rec.extract(40).err(),
            Some(RecorderError::WindowUnavailable { mark_ms: 40 })
        );
        assert_eq!(
            rec.extract(3_900).err(),
            Some(RecorderError::WindowUnavailable { mark_ms: 3_900 })
        );
        assert_eq!(
            rec.extract(9_000).err(),
            Some(RecorderError::MarkOutOfRange { mark_ms: 9_000 })
        );

        let all = rec.extract_all(&[40, 1_200, 9_000, 3_000]);
        let marks: Vec<u64> = all
            .iter()
            .filter_map(|t| t.source.as_ref().map(|s| s.mark_ms))
            .collect();
        assert_eq!(marks, [1_200, 3_000]);
    }

    #[test]
    fn flat_and_empty_sessions() {
        let empty = recorder_with(0, &[]);
        assert_eq!(empty.extract(0).err(), Some(RecorderError::Empty));

        let flat = recorder_with(100, &[]);
        assert_eq!(
            flat.extract(1_000).err(),
            Some(RecorderError::Flat { mark_ms: 1_000 })
        );
    }

    #[test]
    fn extracted_template_matches_its_own_gesture() {
        let rec = recorder_with(200, &[100]);
        let template = rec.extract(2_000).expect("template");
        let cfg = PinchConfig::default();
        let bank = TemplateBank::new(&[template], &cfg).expect("bank");
        let mut window: Vec<f32> = (0..cfg.window_len() as i64)
            .map(|k| 7.0 + 2.0 * bump(k - cfg.pre_samples() as i64))
            .collect();
        assert!(bank.best_match(&mut window) >= cfg.matcher.early_exit_ncc);
    }

    #[test]
    fn reset_forgets_the_session() {
        let mut rec = recorder_with(200, &[100]);
        assert_eq!(rec.len(), 200);
        rec.reset();
        assert!(rec.is_empty());
        assert_eq!(rec.extract(2_000).err(), Some(RecorderError::Empty));
    }
}
