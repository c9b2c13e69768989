use core::f32::consts::PI;

use super::*;

fn frame(now_ms: u64, accel: [f32; 3], gyro: [f32; 3]) -> SensorFrame {
    SensorFrame {
        now_ms,
        accel,
        gyro,
    }
}

#[test]
fn tkeo_of_pure_tone_is_amplitude_frequency_product() {
    // For x[n] = A cos(w n) the operator yields A^2 sin^2(w).
    let amp = 2.0f32;
    let w = 0.3f32;
    let mut op = Tkeo::default();
    let mut last = 0.0;
    for n in 0..20 {
        last = op.process(amp * libm::cosf(w * n as f32));
    }
    let expected = amp * amp * libm::sinf(w) * libm::sinf(w);
    assert!(libm::fabsf(last - expected) < 1e-4, "{last} vs {expected}");
}

#[test]
fn tkeo_favours_sharp_over_smooth_motion() {
    let mut slow = Tkeo::default();
    let mut fast = Tkeo::default();
    let mut slow_max = 0.0f32;
    let mut fast_max = 0.0f32;
    for n in 0..100 {
        let t = n as f32;
        slow_max = slow_max.max(slow.process(libm::sinf(2.0 * PI * 0.5 * t / 50.0)));
        fast_max = fast_max.max(fast.process(libm::sinf(2.0 * PI * 8.0 * t / 50.0)));
    }
    assert!(fast_max > 20.0 * slow_max);
}

#[test]
fn tkeo_needs_two_samples_of_history() {
    let mut op = Tkeo::default();
    assert_eq!(op.process(5.0), 0.0);
    assert_eq!(op.process(5.0), 0.0);
    assert_eq!(op.process(5.0), 0.0);
    op.reset();
    assert_eq!(op.process(1.0), 0.0);
}

#[test]
fn fusion_is_weighted_l2_norm() {
    assert_eq!(fuse(3.0, 2.0, 1.0, 2.0), 5.0);
    assert_eq!(fuse(0.0, 0.0, 1.0, 2.0), 0.0);
}

#[test]
fn device_at_rest_fuses_to_zero() {
    let mut chain = SignalChain::new(&PinchConfig::default());
    for n in 0..200u64 {
        let out = chain.push(&frame(n * 20, [0.1, -0.2, 9.81], [0.01, 0.0, -0.02]));
        assert!(out.value < 1e-6, "fused {}", out.value);
    }
}

#[test]
fn angular_rate_burst_raises_fused_energy_and_magnitude() {
    let mut chain = SignalChain::new(&PinchConfig::default());
    let mut peak = 0.0f32;
    let mut magnitude = 0.0f32;
    for n in 0..100u64 {
        let burst = if (50..56).contains(&n) {
            4.0 * libm::sinf(2.0 * PI * 6.0 * n as f32 / 50.0)
        } else {
            0.0
        };
        let out = chain.push(&frame(n * 20, [0.0, 0.0, 9.81], [burst, 0.0, 0.0]));
        peak = peak.max(out.value);
        magnitude = magnitude.max(out.gyro_magnitude);
    }
    assert!(peak > 1.0, "peak {peak}");
    assert!(magnitude > 3.0);
}

#[test]
fn fused_energy_is_stamped_with_the_frame_it_describes() {
    let mut chain = SignalChain::new(&PinchConfig::default());
    let outputs: alloc::vec::Vec<FusedSample> = (0..20u64)
        .map(|n| {
            let gyro = if n == 10 { [3.0, 0.0, 0.0] } else { [0.0; 3] };
            chain.push(&frame(n * 20, [0.0; 3], gyro))
        })
        .collect();

    assert_eq!(outputs[0].now_ms, 0);
    assert_eq!(outputs[1].now_ms, 0);
    assert_eq!(outputs[11].now_ms, 200);
    assert!(outputs[..11].iter().all(|o| o.value == 0.0));
    assert!(outputs[11].value > 0.0);
    assert_eq!(outputs[10].gyro_magnitude, 0.0);
    assert_eq!(outputs[11].gyro_magnitude, 3.0);

    chain.reset();
    assert_eq!(chain.push(&frame(1_000, [0.0; 3], [0.0; 3])).now_ms, 1_000);
}
