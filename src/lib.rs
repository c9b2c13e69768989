#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod engine;

pub use engine::{
    active_config, normalized_cross_correlation, CandidateTrace, ConfigError, Detector,
    DetectorDiagnostics, DetectorError, DetectorTrace, FusedSample, NoiseFloor, PeakPhase,
    PinchConfig, PinchEvent, PinchTemplate, RecorderError, RejectReason, RingBuffer, SensorFrame,
    TemplateBank, TemplateError, TemplateRecorder, TemplateSource,
};
