use core::f32::consts::{FRAC_1_SQRT_2, PI};

/// RBJ cookbook second-order section with a Butterworth Q.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    pub a1: f32,
    pub a2: f32,
}

impl BiquadCoeffs {
    fn angular_terms(sample_rate_hz: f32, cutoff_hz: f32) -> (f32, f32) {
        let w0 = 2.0 * PI * cutoff_hz / sample_rate_hz;
        let alpha = libm::sinf(w0) / (2.0 * FRAC_1_SQRT_2);
        (libm::cosf(w0), alpha)
    }

    pub fn lowpass(sample_rate_hz: f32, cutoff_hz: f32) -> Self {
        let (cos_w0, alpha) = Self::angular_terms(sample_rate_hz, cutoff_hz);
        let a0 = 1.0 + alpha;
        let b = (1.0 - cos_w0) / 2.0;
        Self {
            b0: b / a0,
            b1: 2.0 * b / a0,
            b2: b / a0,
            a1: -2.0 * cos_w0 / a0,
            a2: (1.0 - alpha) / a0,
        }
    }

    pub fn highpass(sample_rate_hz: f32, cutoff_hz: f32) -> Self {
        let (cos_w0, alpha) = Self::angular_terms(sample_rate_hz, cutoff_hz);
        let a0 = 1.0 + alpha;
        let b = (1.0 + cos_w0) / 2.0;
        Self {
            b0: b / a0,
            b1: -2.0 * b / a0,
            b2: b / a0,
            a1: -2.0 * cos_w0 / a0,
            a2: (1.0 - alpha) / a0,
        }
    }

    pub fn dc_gain(&self) -> f32 {
        let den = 1.0 + self.a1 + self.a2;
        if den == 0.0 {
            return 0.0;
        }
        (self.b0 + self.b1 + self.b2) / den
    }
}

/// Transposed direct form II section.
#[derive(Clone, Copy, Debug, Default)]
pub struct Biquad {
    coeffs: BiquadCoeffs,
    z1: f32,
    z2: f32,
}

impl Biquad {
    pub fn new(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            z1: 0.0,
            z2: 0.0,
        }
    }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let c = &self.coeffs;
        let y = c.b0 * x + self.z1;
        self.z1 = c.b1 * x - c.a1 * y + self.z2;
        self.z2 = c.b2 * x - c.a2 * y;
        y
    }

    /// Loads the state the section would hold after an infinitely long run
    /// of `x`, and returns the matching steady output.
    pub fn prime(&mut self, x: f32) -> f32 {
        let c = &self.coeffs;
        let y = c.dc_gain() * x;
        self.z1 = y - c.b0 * x;
        self.z2 = c.b2 * x - c.a2 * y;
        y
    }

    pub fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }
}

/// High-pass at the low cutoff followed by low-pass at the high cutoff.
#[derive(Clone, Copy, Debug)]
pub struct BandPass {
    stages: [Biquad; 2],
    primed: bool,
}

impl BandPass {
    pub fn new(sample_rate_hz: f32, low_hz: f32, high_hz: f32) -> Self {
        Self {
            stages: [
                Biquad::new(BiquadCoeffs::highpass(sample_rate_hz, low_hz)),
                Biquad::new(BiquadCoeffs::lowpass(sample_rate_hz, high_hz)),
            ],
            primed: false,
        }
    }

    /// The first sample primes the cascade as if it had been held forever, so
    /// a device at rest (gravity on the accelerometer, gyro bias) does not
    /// produce a power-on step.
    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        if !self.primed {
            self.primed = true;
            let mid = self.stages[0].prime(x);
            return self.stages[1].prime(mid);
        }
        let mid = self.stages[0].process(x);
        self.stages[1].process(mid)
    }

    pub fn reset(&mut self) {
        for stage in &mut self.stages {
            stage.reset();
        }
        self.primed = false;
    }
}
