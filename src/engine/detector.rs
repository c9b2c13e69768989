use alloc::{boxed::Box, vec};
use core::fmt;

use heapless::Deque;

use super::{
    baseline::{NoiseFloor, StreamingBaseline},
    config::{ConfigError, PinchConfig},
    features::SignalChain,
    gates::{assess_candidate, AcceptedMark, CandidateAssessment, MotionVeto},
    matcher::{TemplateBank, TemplateError},
    peak_hsm::{Excursion, PeakDetector, PeakInput, PeakPhase},
    ring::RingBuffer,
    template::PinchTemplate,
    trace::{CandidateTrace, DetectorDiagnostics, DetectorTrace},
    types::{Candidate, FusedSample, PinchEvent, RejectReason, SensorFrame},
};

/// Candidates waiting for their post-peak samples.
pub const PENDING_CAPACITY: usize = 4;
/// Accepted events waiting out the end bookend.
pub const HELD_CAPACITY: usize = 4;
/// Extra ring slots beyond the longest excursion plus one match window.
const RING_SLACK: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DetectorError {
    Config(ConfigError),
    Template(TemplateError),
}

impl fmt::Display for DetectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(err) => write!(f, "invalid config: {err}"),
            Self::Template(err) => write!(f, "invalid template bank: {err}"),
        }
    }
}

impl From<ConfigError> for DetectorError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl From<TemplateError> for DetectorError {
    fn from(err: TemplateError) -> Self {
        Self::Template(err)
    }
}

/// Streaming pinch detector. Feed one frame per sample with [`process`];
/// call [`finish`] when the stream ends.
///
/// A band-pass + Teager-Kaiser front end fuses the frames into one
/// transient-energy signal, an O(1) robust baseline tracks its noise floor, a
/// small state machine finds excursions, and surviving candidates are checked
/// against a bank of recorded waveforms. All buffers are sized in
/// [`Detector::new`]; the per-sample path does not allocate.
///
/// ```ignore
/// let mut detector = Detector::new(PinchConfig::default(), &templates)?;
/// for frame in frames {
///     if let Some(event) = detector.process(&frame) {
///         // haptic tick
///     }
/// }
/// detector.finish();
/// ```
///
/// [`process`]: Detector::process
/// [`finish`]: Detector::finish
pub struct Detector {
    config: PinchConfig,
    chain: SignalChain,
    ring: RingBuffer<f32>,
    baseline: StreamingBaseline,
    peak: PeakDetector,
    veto: MotionVeto,
    bank: TemplateBank,
    window: Box<[f32]>,
    pending: Deque<Candidate, PENDING_CAPACITY>,
    held: Deque<PinchEvent, HELD_CAPACITY>,
    stream_start_ms: Option<u64>,
    last_accepted: Option<AcceptedMark>,
    diagnostics: DetectorDiagnostics,
    last_trace: DetectorTrace,
    last_candidate: Option<CandidateTrace>,
}

impl Detector {
    pub fn new(config: PinchConfig, templates: &[PinchTemplate]) -> Result<Self, DetectorError> {
        config.validate()?;
        let bank = TemplateBank::new(templates, &config)?;
        let ring_capacity =
            config.window_len() + config.ms_to_samples(config.peak.max_width_ms) + RING_SLACK;
        log::debug!(
            "detector: {} templates expanded to {}, window {} samples, ring {}",
            bank.source_count(),
            bank.len(),
            config.window_len(),
            ring_capacity
        );
        Ok(Self {
            chain: SignalChain::new(&config),
            ring: RingBuffer::new(ring_capacity),
            baseline: StreamingBaseline::new(
                config.baseline_window_samples(),
                config.baseline.min_sigma,
            ),
            peak: PeakDetector::new(&config),
            veto: MotionVeto::new(&config.gates),
            window: vec![0.0f32; bank.window_len()].into_boxed_slice(),
            bank,
            pending: Deque::new(),
            held: Deque::new(),
            stream_start_ms: None,
            last_accepted: None,
            diagnostics: DetectorDiagnostics::default(),
            last_trace: DetectorTrace::default(),
            last_candidate: None,
            config,
        })
    }

    pub fn process(&mut self, frame: &SensorFrame) -> Option<PinchEvent> {
        let sample = self.chain.push(frame);
        self.process_fused(sample)
    }

    /// Runs everything after the fusion stage. Non-finite samples are
    /// dropped without touching any state.
    pub fn process_fused(&mut self, sample: FusedSample) -> Option<PinchEvent> {
        if !sample.value.is_finite() {
            log::debug!("detector: dropping non-finite sample at {}", sample.now_ms);
            return None;
        }
        self.diagnostics.samples += 1;
        let index = self.ring.total_pushed();
        self.ring.push(sample.value);
        self.stream_start_ms.get_or_insert(sample.now_ms);
        self.veto.observe(sample.now_ms, sample.gyro_magnitude);

        // The gate for this sample comes from the floor before it; the floor
        // only learns from samples seen entirely below the gate.
        let was_idle = self.peak.phase() == PeakPhase::BelowGate;
        let input = PeakInput {
            now_ms: sample.now_ms,
            index,
            value: sample.value,
            floor: self.baseline.is_ready().then(|| self.baseline.floor()),
        };
        if let Some(excursion) = self.peak.step(&input) {
            self.admit(excursion);
        }
        if was_idle && self.peak.phase() == PeakPhase::BelowGate {
            self.baseline.update(sample.value);
        }

        self.evaluate_pending(index);
        let released = self.release_held(sample.now_ms);
        self.update_trace(&sample, released.is_some());
        released
    }

    /// Ends the stream: events still inside the end bookend and candidates
    /// still waiting for their window are discarded. Returns how many were
    /// dropped.
    pub fn finish(&mut self) -> usize {
        let mut dropped = 0;
        while let Some(candidate) = self.pending.pop_front() {
            self.reject(&candidate, Self::early(RejectReason::BookendEnd));
            dropped += 1;
        }
        while let Some(event) = self.held.pop_front() {
            log::debug!(
                "detector: dropping event at {} inside end bookend",
                event.peak_ms
            );
            self.diagnostics.record_rejection(RejectReason::BookendEnd);
            dropped += 1;
        }
        dropped
    }

    pub fn reset(&mut self) {
        self.chain.reset();
        self.ring.clear();
        self.baseline.reset();
        self.peak.reset();
        self.veto.reset();
        self.window.fill(0.0);
        self.pending.clear();
        self.held.clear();
        self.stream_start_ms = None;
        self.last_accepted = None;
        self.diagnostics = DetectorDiagnostics::default();
        self.last_trace = DetectorTrace::default();
        self.last_candidate = None;
    }

    pub fn config(&self) -> &PinchConfig {
        &self.config
    }

    pub fn bank(&self) -> &TemplateBank {
        &self.bank
    }

    /// Current noise floor; meaningful once [`Detector::is_warm`] is true.
    pub fn stats(&self) -> NoiseFloor {
        self.baseline.floor()
    }

    pub fn is_warm(&self) -> bool {
        self.baseline.is_ready()
    }

    pub fn phase(&self) -> PeakPhase {
        self.peak.phase()
    }

    pub fn diagnostics(&self) -> &DetectorDiagnostics {
        &self.diagnostics
    }

    pub fn last_trace(&self) -> &DetectorTrace {
        &self.last_trace
    }

    pub fn last_candidate(&self) -> Option<&CandidateTrace> {
        self.last_candidate.as_ref()
    }

    fn early(reason: RejectReason) -> CandidateAssessment {
        CandidateAssessment {
            reason,
            ..CandidateAssessment::default()
        }
    }

    fn admit(&mut self, excursion: Excursion) {
        self.diagnostics.candidates += 1;
        let candidate = Candidate {
            start_ms: excursion.start_ms,
            peak_ms: excursion.peak_ms,
            end_ms: excursion.end_ms,
            peak_index: excursion.peak_index,
            peak_value: excursion.peak_value,
            gate: excursion.gate,
            sigma: excursion.sigma,
            baseline: excursion.baseline,
            gyro_vetoed: self.veto.vetoes(excursion.start_ms),
        };

        let peak = &self.config.peak;
        let width = candidate.width_ms();
        let since_start = candidate
            .peak_ms
            .saturating_sub(self.stream_start_ms.unwrap_or(candidate.peak_ms));
        let early = if width < peak.min_width_ms {
            Some(RejectReason::TooNarrow)
        } else if width > peak.max_width_ms {
            Some(RejectReason::TooWide)
        } else if since_start < peak.ignore_start_ms {
            Some(RejectReason::BookendStart)
        } else {
            None
        };
        if let Some(reason) = early {
            self.reject(&candidate, Self::early(reason));
            return;
        }

        if let Err(candidate) = self.pending.push_back(candidate) {
            log::warn!(
                "detector: pending queue full, dropping candidate at {}",
                candidate.peak_ms
            );
            self.reject(&candidate, Self::early(RejectReason::QueueFull));
        }
    }

    fn evaluate_pending(&mut self, newest_index: u64) {
        let post_n = self.config.post_samples() as u64;
        while let Some(front) = self.pending.front().copied() {
            if newest_index < front.peak_index + post_n {
                break;
            }
            self.pending.pop_front();
            self.evaluate(front);
        }
    }

    fn evaluate(&mut self, candidate: Candidate) {
        let pre_n = self.config.pre_samples() as u64;
        let window_ready = candidate
            .peak_index
            .checked_sub(pre_n)
            .is_some_and(|first| self.ring.copy_range(first, &mut self.window));
        if !window_ready {
            self.reject(&candidate, Self::early(RejectReason::NoWindow));
            return;
        }

        self.diagnostics.record_gate_score(candidate.gate_score());
        let bank = &self.bank;
        let window = &mut self.window;
        let assessment = assess_candidate(
            &candidate,
            self.last_accepted,
            &self.config.gates,
            &self.config.matcher,
            || bank.best_match(window),
        );
        if let Some(ncc) = assessment.ncc {
            self.diagnostics.record_ncc(ncc);
        }
        if !assessment.accepted {
            self.reject(&candidate, assessment);
            return;
        }
        if self.held.is_full() {
            log::warn!(
                "detector: held queue full, dropping event at {}",
                candidate.peak_ms
            );
            self.reject(&candidate, Self::early(RejectReason::QueueFull));
            return;
        }

        let ncc = assessment.ncc.unwrap_or_default();
        let event = PinchEvent {
            peak_ms: candidate.peak_ms,
            start_ms: candidate.start_ms,
            end_ms: candidate.end_ms,
            confidence: assessment.confidence,
            gate_score: candidate.gate_score(),
            ncc,
        };
        log::info!(
            "detector: pinch at {} conf={:.3} ncc={:.3} score={:.2}{}",
            event.peak_ms,
            event.confidence,
            event.ncc,
            event.gate_score,
            if assessment.spacing_waived {
                " (spacing waived)"
            } else {
                ""
            }
        );
        self.last_accepted = Some(AcceptedMark {
            peak_ms: event.peak_ms,
            ncc,
        });
        self.diagnostics.record_accept(&event);
        self.last_candidate = Some(Self::candidate_trace(&candidate, &assessment));
        let _ = self.held.push_back(event);
    }

    fn release_held(&mut self, now_ms: u64) -> Option<PinchEvent> {
        let ignore_end_ms = self.config.peak.ignore_end_ms;
        let due = self
            .held
            .front()
            .is_some_and(|event| now_ms >= event.peak_ms.saturating_add(ignore_end_ms));
        if !due {
            return None;
        }
        let event = self.held.pop_front()?;
        self.diagnostics.emitted += 1;
        Some(event)
    }

    fn reject(&mut self, candidate: &Candidate, assessment: CandidateAssessment) {
        log::debug!(
            "detector: candidate {}..{} peak {} rejected: {}",
            candidate.start_ms,
            candidate.end_ms,
            candidate.peak_ms,
            assessment.reason.as_str()
        );
        self.diagnostics.record_rejection(assessment.reason);
        self.last_candidate = Some(Self::candidate_trace(candidate, &assessment));
    }

    fn candidate_trace(candidate: &Candidate, assessment: &CandidateAssessment) -> CandidateTrace {
        CandidateTrace {
            start_ms: candidate.start_ms,
            peak_ms: candidate.peak_ms,
            end_ms: candidate.end_ms,
            peak_value: candidate.peak_value,
            gate: candidate.gate,
            sigma: candidate.sigma,
            baseline: candidate.baseline,
            surplus_sigma: candidate.surplus_sigma(),
            ncc: assessment.ncc,
            confidence: assessment.confidence,
            gyro_vetoed: candidate.gyro_vetoed,
            spacing_waived: assessment.spacing_waived,
            accepted: assessment.accepted,
            reason: assessment.reason,
        }
    }

    fn update_trace(&mut self, sample: &FusedSample, emitted: bool) {
        let floor = self.baseline.floor();
        self.last_trace = DetectorTrace {
            now_ms: sample.now_ms,
            fused: sample.value,
            baseline: floor.baseline,
            sigma: floor.sigma,
            gate: self.peak.gate(),
            phase: self.peak.phase(),
            gyro_magnitude: sample.gyro_magnitude,
            gyro_loud_run: self.veto.loud_run(),
            refractory: sample.now_ms < self.peak.refractory_until_ms(),
            pending: self.pending.len() as u8,
            held: self.held.len() as u8,
            emitted,
        };
    }
}

#[cfg(test)]
mod tests;
