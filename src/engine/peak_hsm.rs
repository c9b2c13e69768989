use serde::{Deserialize, Serialize};
use statig::{blocking::IntoStateMachineExt as _, prelude::*};

use super::{baseline::NoiseFloor, config::PinchConfig};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[repr(u8)]
pub enum PeakPhase {
    #[default]
    BelowGate = 0,
    Rising = 1,
    Falling = 2,
}

/// One fused sample as seen by the peak machine. `floor` is `None` while the
/// noise estimate is degenerate, which makes the gate unreachable.
#[derive(Clone, Copy, Debug)]
pub struct PeakInput {
    pub now_ms: u64,
    pub index: u64,
    pub value: f32,
    pub floor: Option<NoiseFloor>,
}

/// Excursion record carried by `rising` and `falling`. Gate, sigma, baseline
/// and release bound are frozen at the crossing.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Excursion {
    pub start_ms: u64,
    pub peak_ms: u64,
    pub peak_index: u64,
    pub peak_value: f32,
    pub gate: f32,
    pub sigma: f32,
    pub baseline: f32,
    pub release: f32,
    pub end_ms: u64,
}

impl Excursion {
    fn track_peak(&mut self, input: &PeakInput) {
        self.peak_ms = input.now_ms;
        self.peak_index = input.index;
        self.peak_value = input.value;
    }
}

#[derive(Default)]
pub struct PeakContext {
    pub candidate: Option<Excursion>,
}

/// Public handle around the state machine; one `step` per fused sample.
pub struct PeakDetector {
    machine: statig::blocking::StateMachine<PeakHsm>,
    config: PinchConfig,
}

impl PeakDetector {
    pub fn new(config: &PinchConfig) -> Self {
        Self {
            machine: PeakHsm::new(config).state_machine(),
            config: *config,
        }
    }

    /// Feeds one sample and returns the closed excursion, if this sample
    /// ended one.
    pub fn step(&mut self, input: &PeakInput) -> Option<Excursion> {
        let mut context = PeakContext::default();
        self.machine.handle_with_context(input, &mut context);
        context.candidate
    }

    pub fn phase(&self) -> PeakPhase {
        self.machine.inner().phase
    }

    /// Gate used for the latest below-gate sample.
    pub fn gate(&self) -> f32 {
        self.machine.inner().last_gate
    }

    pub fn refractory_until_ms(&self) -> u64 {
        self.machine.inner().refractory_until_ms
    }

    pub fn reset(&mut self) {
        self.machine = PeakHsm::new(&self.config).state_machine();
    }
}

struct PeakHsm {
    gate_k: f32,
    release_k: f32,
    gate_ramp_ms: u64,
    refractory_ms: u64,
    max_width_ms: u64,
    pre_quiet_ms: u64,
    first_ms: Option<u64>,
    ramp_start_ms: Option<u64>,
    refractory_until_ms: u64,
    last_above_gate_ms: Option<u64>,
    last_gate: f32,
    phase: PeakPhase,
}

impl PeakHsm {
    fn new(config: &PinchConfig) -> Self {
        let b = &config.baseline;
        Self {
            gate_k: b.gate_k,
            release_k: b.release_ratio * b.gate_k,
            gate_ramp_ms: b.gate_ramp_ms,
            refractory_ms: config.peak.refractory_ms,
            max_width_ms: config.peak.max_width_ms,
            pre_quiet_ms: config.peak.pre_quiet_ms,
            first_ms: None,
            ramp_start_ms: None,
            refractory_until_ms: 0,
            last_above_gate_ms: None,
            last_gate: f32::INFINITY,
            phase: PeakPhase::BelowGate,
        }
    }

    /// Gate multiplier, eased from twice the configured value down to it over
    /// the ramp. The ramp starts on the first sample with a usable floor and
    /// starts over whenever the floor drops out.
    fn effective_k(&self, now_ms: u64) -> f32 {
        let Some(first) = self.ramp_start_ms else {
            return 2.0 * self.gate_k;
        };
        if self.gate_ramp_ms == 0 {
            return self.gate_k;
        }
        let elapsed = now_ms.saturating_sub(first).min(self.gate_ramp_ms);
        let progress = elapsed as f32 / self.gate_ramp_ms as f32;
        self.gate_k * (2.0 - progress)
    }

    fn quiet_long_enough(&self, now_ms: u64) -> bool {
        let since = self
            .last_above_gate_ms
            .or(self.first_ms)
            .unwrap_or(now_ms);
        now_ms.saturating_sub(since) >= self.pre_quiet_ms
    }

    fn should_close(&self, excursion: &Excursion, input: &PeakInput) -> bool {
        input.value < excursion.release
            || input.now_ms.saturating_sub(excursion.start_ms) > self.max_width_ms
    }

    fn close(&mut self, excursion: &Excursion, context: &mut PeakContext, now_ms: u64) {
        let mut done = *excursion;
        done.end_ms = now_ms;
        self.refractory_until_ms = now_ms.saturating_add(self.refractory_ms);
        self.phase = PeakPhase::BelowGate;
        log::trace!(
            "peak: excursion closed start={} peak={} end={}",
            done.start_ms,
            done.peak_ms,
            done.end_ms
        );
        context.candidate = Some(done);
    }

    fn note_above(&mut self, excursion: &Excursion, input: &PeakInput) {
        if input.value > excursion.gate {
            self.last_above_gate_ms = Some(input.now_ms);
        }
    }
}

#[state_machine(initial = "State::below_gate()")]
impl PeakHsm {
    #[state]
    fn below_gate(&mut self, event: &PeakInput) -> Outcome<State> {
        self.first_ms.get_or_insert(event.now_ms);
        self.phase = PeakPhase::BelowGate;

        let Some(floor) = event.floor else {
            self.ramp_start_ms = None;
            self.last_gate = f32::INFINITY;
            return Handled;
        };
        self.ramp_start_ms.get_or_insert(event.now_ms);
        let gate = floor.baseline + self.effective_k(event.now_ms) * floor.sigma;
        self.last_gate = gate;
        if event.value <= gate {
            return Handled;
        }

        let armed =
            event.now_ms >= self.refractory_until_ms && self.quiet_long_enough(event.now_ms);
        self.last_above_gate_ms = Some(event.now_ms);
        if !armed {
            return Handled;
        }

        self.phase = PeakPhase::Rising;
        log::trace!(
            "peak: gate crossed at {} ({:.3} > {:.3})",
            event.now_ms,
            event.value,
            gate
        );
        Transition(State::rising(Excursion {
            start_ms: event.now_ms,
            peak_ms: event.now_ms,
            peak_index: event.index,
            peak_value: event.value,
            gate,
            sigma: floor.sigma,
            baseline: floor.baseline,
            release: floor.baseline + self.release_k * floor.sigma,
            end_ms: event.now_ms,
        }))
    }

    #[state]
    fn rising(
        &mut self,
        excursion: &mut Excursion,
        context: &mut PeakContext,
        event: &PeakInput,
    ) -> Outcome<State> {
        self.note_above(excursion, event);
        if self.should_close(excursion, event) {
            self.close(excursion, context, event.now_ms);
            return Transition(State::below_gate());
        }
        if event.value > excursion.peak_value {
            excursion.track_peak(event);
            return Handled;
        }
        self.phase = PeakPhase::Falling;
        Transition(State::falling(*excursion))
    }

    #[state]
    fn falling(
        &mut self,
        excursion: &mut Excursion,
        context: &mut PeakContext,
        event: &PeakInput,
    ) -> Outcome<State> {
        self.note_above(excursion, event);
        if self.should_close(excursion, event) {
            self.close(excursion, context, event.now_ms);
            return Transition(State::below_gate());
        }
        if event.value > excursion.peak_value {
            let mut resumed = *excursion;
            resumed.track_peak(event);
            self.phase = PeakPhase::Rising;
            return Transition(State::rising(resumed));
        }
        Handled
    }
}
