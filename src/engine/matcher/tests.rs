use alloc::vec::Vec;

use super::*;

fn gaussian(len: usize, centre: f32, width: f32) -> Vec<f32> {
    (0..len)
        .map(|k| {
            let d = (k as f32 - centre) / width;
            libm::expf(-0.5 * d * d)
        })
        .collect()
}

fn bump_template(config: &PinchConfig) -> PinchTemplate {
    PinchTemplate::from_samples(
        gaussian(config.window_len(), config.pre_samples() as f32, 2.0),
        config,
    )
}

fn noise(len: usize, seed: u32) -> Vec<f32> {
    let mut state = seed;
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            (state >> 8) as f32 / (1u32 << 24) as f32
        })
        .collect()
}

#[test]
fn every_expanded_template_has_window_length() {
    let cfg = PinchConfig::default();
    let mut long = bump_template(&cfg);
    long.samples = gaussian(57, 20.0, 3.0);
    long.pre_ms = 400;
    let bank = TemplateBank::new(&[bump_template(&cfg), long], &cfg).expect("bank");

    let shifts = 2 * cfg.matcher.shift_tolerance as usize + 1;
    assert_eq!(bank.source_count(), 2);
    assert_eq!(bank.len(), 2 * cfg.matcher.warp_factors.len() * shifts);
    assert!(bank.iter().all(|v| v.len() == cfg.window_len()));
}

#[test]
fn expanded_templates_are_zero_mean_unit_norm() {
    let cfg = PinchConfig::default();
    let bank = TemplateBank::new(&[bump_template(&cfg)], &cfg).expect("bank");
    for v in bank.iter() {
        let mean = v.iter().sum::<f32>() / v.len() as f32;
        let norm = libm::sqrtf(v.iter().map(|x| x * x).sum::<f32>());
        assert!(mean.abs() < 1e-5);
        assert!((norm - 1.0).abs() < 1e-4);
    }
}

#[test]
fn score_is_invariant_to_positive_scaling() {
    let cfg = PinchConfig::default();
    let bank = TemplateBank::new(&[bump_template(&cfg)], &cfg).expect("bank");
    let window = noise(cfg.window_len(), 42);

    for scale in [0.001f32, 0.5, 3.0, 1_000.0] {
        let mut a = window.clone();
        let mut b: Vec<f32> = window.iter().map(|x| x * scale).collect();
        let diff = (bank.best_match(&mut a) - bank.best_match(&mut b)).abs();
        assert!(diff < 1e-5, "scale {scale}: {diff}");

        let scaled: Vec<f32> = window.iter().map(|x| x * scale).collect();
        let template = &bank_template_vector(&bank);
        let direct = normalized_cross_correlation(&window, template);
        let direct_scaled = normalized_cross_correlation(&scaled, template);
        assert!((direct - direct_scaled).abs() < 1e-5);
    }
}

fn bank_template_vector(bank: &TemplateBank) -> Vec<f32> {
    bank.iter().next().map(<[f32]>::to_vec).unwrap_or_default()
}

#[test]
fn matching_shape_scores_high_even_when_offset_by_one_sample() {
    let cfg = PinchConfig::default();
    let bank = TemplateBank::new(&[bump_template(&cfg)], &cfg).expect("bank");
    let centre = cfg.pre_samples() as f32;

    let mut exact = gaussian(cfg.window_len(), centre, 2.0);
    assert!(bank.best_match(&mut exact) >= cfg.matcher.early_exit_ncc);

    let mut late = gaussian(cfg.window_len(), centre + 1.0, 2.0);
    assert!(bank.best_match(&mut late) >= cfg.matcher.early_exit_ncc);

    let mut unrelated = noise(cfg.window_len(), 9);
    assert!(bank.best_match(&mut unrelated) < cfg.matcher.early_exit_ncc);
}

#[test]
fn template_recorded_at_another_rate_is_resampled() {
    let cfg = PinchConfig::default();
    // Same bump in time, captured at 100 Hz: 16 samples before the peak.
    let template = PinchTemplate {
        sample_rate_hz: 100.0,
        samples: gaussian(41, 16.0, 4.0),
        ..bump_template(&cfg)
    };
    let bank = TemplateBank::new(&[template], &cfg).expect("bank");
    let mut window = gaussian(cfg.window_len(), cfg.pre_samples() as f32, 2.0);
    assert!(bank.best_match(&mut window) >= cfg.matcher.early_exit_ncc);
}

#[test]
fn flat_or_mis_sized_window_scores_zero() {
    let cfg = PinchConfig::default();
    let bank = TemplateBank::new(&[bump_template(&cfg)], &cfg).expect("bank");
    let mut flat = alloc::vec![2.5f32; cfg.window_len()];
    assert_eq!(bank.best_match(&mut flat), 0.0);
    let mut short = alloc::vec![1.0f32, 2.0, 3.0];
    assert_eq!(bank.best_match(&mut short), 0.0);
    assert_eq!(normalized_cross_correlation(&[1.0, 1.0], &[1.0, 2.0]), 0.0);
    assert_eq!(normalized_cross_correlation(&[1.0, 2.0], &[1.0, 2.0, 3.0]), 0.0);
}

#[test]
fn bank_construction_errors() {
    let cfg = PinchConfig::default();
    let good = bump_template(&cfg);

    assert_eq!(TemplateBank::new(&[], &cfg).err(), Some(TemplateError::Empty));

    let many: Vec<PinchTemplate> = (0..MAX_TEMPLATES + 1).map(|_| good.clone()).collect();
    assert_eq!(
        TemplateBank::new(&many, &cfg).err(),
        Some(TemplateError::TooMany {
            count: MAX_TEMPLATES + 1,
            max: MAX_TEMPLATES
        })
    );

    let mut empty = good.clone();
    empty.samples.clear();
    assert_eq!(
        TemplateBank::new(&[good.clone(), empty], &cfg).err(),
        Some(TemplateError::NoSamples { index: 1 })
    );

    let mut nan = good.clone();
    nan.samples[3] = f32::NAN;
    assert_eq!(
        TemplateBank::new(&[nan], &cfg).err(),
        Some(TemplateError::NonFinite { index: 0 })
    );

    let mut bad_rate = good.clone();
    bad_rate.sample_rate_hz = 0.0;
    assert_eq!(
        TemplateBank::new(&[bad_rate], &cfg).err(),
        Some(TemplateError::InvalidMetadata { index: 0 })
    );

    let mut flat = good;
    flat.samples.fill(1.0);
    assert_eq!(
        TemplateBank::new(&[flat], &cfg).err(),
        Some(TemplateError::Flat { index: 0 })
    );
}
