use alloc::vec::Vec;

use super::*;

const PERIOD_MS: u64 = 20;
const BUMP_AT: usize = 500;

fn bump_shape(k: i64) -> f32 {
    let d = k as f32 / 2.0;
    libm::expf(-0.5 * d * d)
}

fn bump_template(config: &PinchConfig) -> PinchTemplate {
    let pre = config.pre_samples() as i64;
    let samples = (0..config.window_len() as i64)
        .map(|k| bump_shape(k - pre))
        .collect();
    PinchTemplate::from_samples(samples, config)
}

/// Noisy floor around 10.0 with a clean bump of `height` centred on
/// `BUMP_AT`.
fn stream(len: usize, height: f32) -> Vec<FusedSample> {
    let mut state = 0x2545_f491u32;
    (0..len)
        .map(|i| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let noise = (state >> 8) as f32 / (1u32 << 23) as f32 - 1.0;
            let k = i as i64 - BUMP_AT as i64;
            let value = if (-8..=12).contains(&k) {
                10.0 + height * bump_shape(k)
            } else {
                10.0 + noise
            };
            FusedSample {
                now_ms: i as u64 * PERIOD_MS,
                value,
                gyro_magnitude: 0.0,
            }
        })
        .collect()
}

fn detector(config: PinchConfig) -> Detector {
    let templates = [bump_template(&config)];
    Detector::new(config, &templates).expect("valid detector")
}

#[test]
fn construction_rejects_bad_config_and_empty_bank() {
    let cfg = PinchConfig::default();
    let mut bad = cfg;
    bad.signal.band_high_hz = 40.0;
    let templates = [bump_template(&cfg)];
    assert!(matches!(
        Detector::new(bad, &templates),
        Err(DetectorError::Config(ConfigError::AboveNyquist { .. }))
    ));
    assert!(matches!(
        Detector::new(cfg, &[]),
        Err(DetectorError::Template(TemplateError::Empty))
    ));
}

#[test]
fn construction_errors_compare_by_value() {
    let cfg = PinchConfig::default();
    let mut bad = cfg;
    bad.signal.band_high_hz = 40.0;
    let templates = [bump_template(&cfg)];
    assert_eq!(
        Detector::new(bad, &templates).err(),
        Some(DetectorError::from(ConfigError::AboveNyquist {
            high_hz: 40.0,
            nyquist_hz: 25.0,
        }))
    );
    assert_eq!(
        Detector::new(cfg, &[]).err(),
        Some(DetectorError::from(TemplateError::Empty))
    );
    assert_ne!(
        DetectorError::from(ConfigError::Weights),
        DetectorError::from(ConfigError::SampleRate(0.0))
    );
}

#[test]
fn constant_frames_never_trigger() {
    let mut det = detector(PinchConfig::default());
    for n in 0..3_000u64 {
        let frame = SensorFrame {
            now_ms: n * PERIOD_MS,
            accel: [0.3, -0.1, 9.81],
            gyro: [0.02, 0.0, -0.01],
        };
        assert_eq!(det.process(&frame), None);
    }
    assert_eq!(det.finish(), 0);
    assert_eq!(det.diagnostics().candidates, 0);
    assert_eq!(det.diagnostics().samples, 3_000);
    assert!(!det.is_warm());
}

#[test]
fn clean_bump_is_emitted_after_its_window_and_end_bookend() {
    let mut det = detector(PinchConfig::default());
    let mut events = Vec::new();
    let mut emitted_at = None;
    for (i, sample) in stream(800, 10.0).into_iter().enumerate() {
        if let Some(event) = det.process_fused(sample) {
            events.push(event);
            emitted_at = Some(i);
        }
    }
    assert_eq!(events.len(), 1);
    let event = events[0];
    assert_eq!(event.peak_ms, BUMP_AT as u64 * PERIOD_MS);
    assert!(event.ncc >= det.config().matcher.early_exit_ncc, "ncc {}", event.ncc);
    assert!(event.start_ms < event.peak_ms && event.peak_ms < event.end_ms);
    // Matched once 12 post-peak samples exist; the 200 ms hold is already over.
    assert_eq!(emitted_at, Some(BUMP_AT + 12));

    let d = det.diagnostics();
    assert_eq!(d.candidates, 1);
    assert_eq!(d.accepted, 1);
    assert_eq!(d.emitted, 1);
    assert_eq!(d.total_rejections(), 0);
    let last = det.last_candidate().expect("candidate trace");
    assert!(last.accepted);
    assert_eq!(last.reason, RejectReason::None);
}

#[test]
fn finish_drops_events_still_inside_end_bookend() {
    let mut cfg = PinchConfig::default();
    cfg.peak.ignore_end_ms = 1_000;
    let mut det = detector(cfg);
    for sample in stream(BUMP_AT + 25, 10.0) {
        assert_eq!(det.process_fused(sample), None);
    }
    assert_eq!(det.diagnostics().accepted, 1);
    assert_eq!(det.last_trace().held, 1);

    assert_eq!(det.finish(), 1);
    assert_eq!(det.diagnostics().rejections_for(RejectReason::BookendEnd), 1);
    assert_eq!(det.diagnostics().emitted, 0);
}

#[test]
fn non_finite_samples_are_ignored() {
    let mut det = detector(PinchConfig::default());
    let out = det.process_fused(FusedSample {
        now_ms: 0,
        value: f32::NAN,
        gyro_magnitude: 0.0,
    });
    assert_eq!(out, None);
    assert_eq!(det.diagnostics().samples, 0);
    assert_eq!(det.last_trace(), &DetectorTrace::default());
}

#[test]
fn reset_clears_diagnostics_and_replays_identically() {
    let mut det = detector(PinchConfig::default());
    let input = stream(800, 10.0);
    let first: Vec<PinchEvent> = input
        .iter()
        .filter_map(|s| det.process_fused(*s))
        .collect();
    let first_diag = *det.diagnostics();

    det.reset();
    assert_eq!(det.diagnostics(), &DetectorDiagnostics::default());
    assert_eq!(det.phase(), PeakPhase::BelowGate);
    assert!(!det.is_warm());

    let second: Vec<PinchEvent> = input
        .iter()
        .filter_map(|s| det.process_fused(*s))
        .collect();
    assert_eq!(first, second);
    assert_eq!(&first_diag, det.diagnostics());
}
