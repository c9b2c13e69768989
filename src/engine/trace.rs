use serde::{Deserialize, Serialize};

use super::{
    peak_hsm::PeakPhase,
    types::{PinchEvent, RejectReason},
};

/// Snapshot of the detector after one sample.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectorTrace {
    pub now_ms: u64,
    pub fused: f32,
    pub baseline: f32,
    pub sigma: f32,
    /// `f32::INFINITY` while the noise floor is degenerate.
    pub gate: f32,
    pub phase: PeakPhase,
    pub gyro_magnitude: f32,
    pub gyro_loud_run: u32,
    pub refractory: bool,
    pub pending: u8,
    pub held: u8,
    pub emitted: bool,
}

/// Outcome of the most recent candidate, whichever stage decided it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateTrace {
    pub start_ms: u64,
    pub peak_ms: u64,
    pub end_ms: u64,
    pub peak_value: f32,
    pub gate: f32,
    pub sigma: f32,
    pub baseline: f32,
    pub surplus_sigma: f32,
    pub ncc: Option<f32>,
    pub confidence: f32,
    pub gyro_vetoed: bool,
    pub spacing_waived: bool,
    pub accepted: bool,
    pub reason: RejectReason,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectorDiagnostics {
    pub samples: u64,
    pub candidates: u32,
    pub accepted: u32,
    pub emitted: u32,
    pub rejections: [u32; RejectReason::COUNT],
    /// Mean gate score over candidates that reached the gate chain.
    pub mean_gate_score: f32,
    /// Mean template score over candidates that were scanned.
    pub mean_ncc: f32,
    /// Mean confidence over accepted candidates.
    pub mean_confidence: f32,
    gate_scored: u32,
    ncc_scored: u32,
}

fn running_mean(mean: &mut f32, count: u32, x: f32) {
    *mean += (x - *mean) / count as f32;
}

impl DetectorDiagnostics {
    pub fn rejections_for(&self, reason: RejectReason) -> u32 {
        self.rejections[reason.as_u8() as usize]
    }

    pub fn total_rejections(&self) -> u32 {
        self.rejections.iter().sum()
    }

    pub(crate) fn record_rejection(&mut self, reason: RejectReason) {
        let slot = &mut self.rejections[reason.as_u8() as usize];
        *slot = slot.saturating_add(1);
    }

    pub(crate) fn record_gate_score(&mut self, gate_score: f32) {
        self.gate_scored += 1;
        running_mean(&mut self.mean_gate_score, self.gate_scored, gate_score);
    }

    pub(crate) fn record_ncc(&mut self, ncc: f32) {
        self.ncc_scored += 1;
        running_mean(&mut self.mean_ncc, self.ncc_scored, ncc);
    }

    pub(crate) fn record_accept(&mut self, event: &PinchEvent) {
        self.accepted += 1;
        running_mean(&mut self.mean_confidence, self.accepted, event.confidence);
    }
}
