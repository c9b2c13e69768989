use super::{
    config::{GateConfig, MatcherConfig},
    types::{Candidate, RejectReason},
};

/// Weight of the template score in the blended confidence; the amplitude
/// component takes the rest.
pub const NCC_CONFIDENCE_WEIGHT: f32 = 0.6;
/// Surplus over the gate, in sigma, that saturates the amplitude score.
pub const AMPLITUDE_SCORE_FULL_SIGMA: f32 = 3.0;

/// Angular-rate run-length tracker behind the motion veto.
#[derive(Clone, Copy, Debug, Default)]
pub struct MotionVeto {
    thresh: f32,
    hold_ms: u64,
    loud_run: u32,
    last_loud_ms: Option<u64>,
}

impl MotionVeto {
    pub fn new(cfg: &GateConfig) -> Self {
        Self {
            thresh: cfg.gyro_veto_thresh,
            hold_ms: cfg.gyro_veto_hold_ms,
            loud_run: 0,
            last_loud_ms: None,
        }
    }

    pub fn observe(&mut self, now_ms: u64, gyro_magnitude: f32) {
        if gyro_magnitude > self.thresh {
            self.loud_run = self.loud_run.saturating_add(1);
            self.last_loud_ms = Some(now_ms);
        } else {
            self.loud_run = 0;
        }
    }

    /// Consecutive loud samples up to and including the latest one.
    pub fn loud_run(&self) -> u32 {
        self.loud_run
    }

    /// True when motion was seen during the candidate or within the hold
    /// window before `start_ms`.
    pub fn vetoes(&self, start_ms: u64) -> bool {
        self.last_loud_ms
            .is_some_and(|last| last.saturating_add(self.hold_ms) > start_ms)
    }

    pub fn reset(&mut self) {
        self.loud_run = 0;
        self.last_loud_ms = None;
    }
}

/// Peak time and template score of the last accepted event.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AcceptedMark {
    pub peak_ms: u64,
    pub ncc: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CandidateAssessment {
    pub accepted: bool,
    pub reason: RejectReason,
    /// `None` when the chain stopped before the template scan.
    pub ncc: Option<f32>,
    pub amplitude_score: f32,
    pub confidence: f32,
    pub spacing_waived: bool,
}

impl CandidateAssessment {
    fn rejected(reason: RejectReason, ncc: Option<f32>, amplitude_score: f32) -> Self {
        Self {
            accepted: false,
            reason,
            ncc,
            amplitude_score,
            confidence: 0.0,
            spacing_waived: false,
        }
    }
}

pub fn amplitude_score(candidate: &Candidate) -> f32 {
    (candidate.surplus_sigma() / AMPLITUDE_SCORE_FULL_SIGMA).clamp(0.0, 1.0)
}

pub fn blended_confidence(ncc: f32, amplitude_score: f32) -> f32 {
    NCC_CONFIDENCE_WEIGHT * ncc + (1.0 - NCC_CONFIDENCE_WEIGHT) * amplitude_score
}

/// Runs the post-window gate chain: amplitude surplus, spacing, motion veto,
/// template score. The first failing gate decides the reason.
///
/// The template score is computed right after the surplus gate because the
/// spacing waiver depends on it; `score` is not called for candidates that
/// are already too weak.
pub fn assess_candidate(
    candidate: &Candidate,
    last_accepted: Option<AcceptedMark>,
    gates: &GateConfig,
    matcher: &MatcherConfig,
    score: impl FnOnce() -> f32,
) -> CandidateAssessment {
    let amp = amplitude_score(candidate);
    let surplus = candidate.peak_value - candidate.gate;
    if surplus < gates.amplitude_surplus_thresh * candidate.sigma {
        return CandidateAssessment::rejected(RejectReason::WeakAmplitude, None, amp);
    }

    let ncc = score();

    let mut spacing_waived = false;
    if let Some(last) = last_accepted {
        let gap_ms = candidate.peak_ms.saturating_sub(last.peak_ms);
        if gap_ms < gates.isi_threshold_ms {
            let override_ncc = gates.isi_override_ncc;
            if ncc >= override_ncc && last.ncc >= override_ncc {
                spacing_waived = true;
            } else {
                return CandidateAssessment::rejected(RejectReason::Spacing, Some(ncc), amp);
            }
        }
    }

    if candidate.gyro_vetoed {
        return CandidateAssessment::rejected(RejectReason::GyroVeto, Some(ncc), amp);
    }

    if ncc < matcher.ncc_thresh {
        return CandidateAssessment::rejected(RejectReason::LowNcc, Some(ncc), amp);
    }

    CandidateAssessment {
        accepted: true,
        reason: RejectReason::None,
        ncc: Some(ncc),
        amplitude_score: amp,
        confidence: blended_confidence(ncc, amp),
        spacing_waived,
    }
}
