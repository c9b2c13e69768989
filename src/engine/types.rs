use serde::{Deserialize, Serialize};

/// One IMU sample: acceleration in m/s^2, angular rate in rad/s.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorFrame {
    pub now_ms: u64,
    pub accel: [f32; 3],
    pub gyro: [f32; 3],
}

/// Output of the fusion stage together with the raw angular-rate magnitude
/// the gyro veto needs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FusedSample {
    pub now_ms: u64,
    pub value: f32,
    pub gyro_magnitude: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PinchEvent {
    pub peak_ms: u64,
    pub start_ms: u64,
    pub end_ms: u64,
    pub confidence: f32,
    /// Peak height over baseline in sigma units.
    pub gate_score: f32,
    pub ncc: f32,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[repr(u8)]
pub enum RejectReason {
    #[default]
    None = 0,
    TooNarrow = 1,
    TooWide = 2,
    BookendStart = 3,
    BookendEnd = 4,
    WeakAmplitude = 5,
    Spacing = 6,
    GyroVeto = 7,
    NoWindow = 8,
    LowNcc = 9,
    QueueFull = 10,
}

impl RejectReason {
    pub const COUNT: usize = 11;

    pub const ALL: [RejectReason; Self::COUNT] = [
        RejectReason::None,
        RejectReason::TooNarrow,
        RejectReason::TooWide,
        RejectReason::BookendStart,
        RejectReason::BookendEnd,
        RejectReason::WeakAmplitude,
        RejectReason::Spacing,
        RejectReason::GyroVeto,
        RejectReason::NoWindow,
        RejectReason::LowNcc,
        RejectReason::QueueFull,
    ];

    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            RejectReason::None => "none",
            RejectReason::TooNarrow => "too_narrow",
            RejectReason::TooWide => "too_wide",
            RejectReason::BookendStart => "bookend_start",
            RejectReason::BookendEnd => "bookend_end",
            RejectReason::WeakAmplitude => "weak_amplitude",
            RejectReason::Spacing => "spacing",
            RejectReason::GyroVeto => "gyro_veto",
            RejectReason::NoWindow => "no_window",
            RejectReason::LowNcc => "low_ncc",
            RejectReason::QueueFull => "queue_full",
        }
    }
}

/// An excursion that left the peak machine and passed the width check.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Candidate {
    pub start_ms: u64,
    pub peak_ms: u64,
    pub end_ms: u64,
    pub peak_index: u64,
    pub peak_value: f32,
    pub gate: f32,
    pub sigma: f32,
    pub baseline: f32,
    pub gyro_vetoed: bool,
}

impl Candidate {
    pub fn width_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }

    /// Peak height above the gate, in sigma units.
    pub fn surplus_sigma(&self) -> f32 {
        if self.sigma > 0.0 {
            (self.peak_value - self.gate) / self.sigma
        } else {
            0.0
        }
    }

    pub fn gate_score(&self) -> f32 {
        if self.sigma > 0.0 {
            (self.peak_value - self.baseline) / self.sigma
        } else {
            0.0
        }
    }
}
