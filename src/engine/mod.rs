pub mod baseline;
pub mod config;
pub mod detector;
pub mod features;
pub mod filter;
pub mod gates;
pub mod matcher;
pub mod peak_hsm;
pub mod recorder;
pub mod ring;
pub mod template;
pub mod trace;
pub mod types;

pub use baseline::NoiseFloor;
pub use config::{active_config, ConfigError, PinchConfig};
pub use detector::{Detector, DetectorError};
pub use matcher::{normalized_cross_correlation, TemplateBank, TemplateError};
pub use peak_hsm::PeakPhase;
pub use recorder::{RecorderError, TemplateRecorder};
pub use ring::RingBuffer;
pub use template::{PinchTemplate, TemplateSource};
pub use trace::{CandidateTrace, DetectorDiagnostics, DetectorTrace};
pub use types::{FusedSample, PinchEvent, RejectReason, SensorFrame};
