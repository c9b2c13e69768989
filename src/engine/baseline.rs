/// Scale from MAD to a Gaussian-equivalent sigma.
pub const MAD_TO_SIGMA: f32 = 1.4826;
/// Scale from mean absolute deviation to MAD for Gaussian noise.
const MEAN_ABS_DEV_TO_MAD: f32 = 0.8453;
const BASELINE_STEP_PER_WINDOW: f32 = 4.0;
const MAD_STEP_PER_WINDOW: f32 = 2.0;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NoiseFloor {
    pub baseline: f32,
    pub sigma: f32,
}

/// O(1) noise-floor estimate for the fused signal.
///
/// Warm-up runs a mean and mean absolute deviation over the first `window`
/// samples. After that a frugal median tracker moves the baseline by
/// `eta_b * sigma` toward each sample and the MAD scales by `1 +/- eta_m`
/// depending on which side of it the residual falls. Only residual signs
/// drive tracking, so one outlier moves the estimate by one bounded step. A
/// collapsed spread restarts warm-up.
#[derive(Clone, Debug)]
pub struct StreamingBaseline {
    window: u32,
    min_sigma: f32,
    eta_baseline: f32,
    eta_mad: f32,
    warm_count: u32,
    warm: bool,
    baseline: f32,
    mean_abs_dev: f32,
    mad: f32,
}

impl StreamingBaseline {
    pub fn new(window_samples: usize, min_sigma: f32) -> Self {
        let window = window_samples.max(2) as u32;
        Self {
            window,
            min_sigma,
            eta_baseline: BASELINE_STEP_PER_WINDOW / window as f32,
            eta_mad: (MAD_STEP_PER_WINDOW / window as f32).min(0.5),
            warm_count: 0,
            warm: false,
            baseline: 0.0,
            mean_abs_dev: 0.0,
            mad: 0.0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.window as usize, self.min_sigma);
    }

    pub fn sigma(&self) -> f32 {
        self.mad * MAD_TO_SIGMA
    }

    pub fn baseline(&self) -> f32 {
        self.baseline
    }

    /// True once a warm-up has completed and the spread is usable.
    pub fn is_ready(&self) -> bool {
        self.warm && self.sigma() >= self.min_sigma
    }

    pub fn floor(&self) -> NoiseFloor {
        NoiseFloor {
            baseline: self.baseline,
            sigma: self.sigma(),
        }
    }

    pub fn update(&mut self, x: f32) {
        if !x.is_finite() {
            return;
        }
        if self.warm {
            self.track(x);
        } else {
            self.warm_up(x);
        }
        if self.warm && self.sigma() < self.min_sigma {
            self.warm = false;
            self.warm_count = 0;
        }
    }

    fn warm_up(&mut self, x: f32) {
        self.warm_count += 1;
        if self.warm_count == 1 {
            self.baseline = x;
            self.mean_abs_dev = 0.0;
        } else {
            let n = self.warm_count as f32;
            self.baseline += (x - self.baseline) / n;
            self.mean_abs_dev += (libm::fabsf(x - self.baseline) - self.mean_abs_dev) / n;
        }
        self.mad = self.mean_abs_dev * MEAN_ABS_DEV_TO_MAD;
        if self.warm_count >= self.window {
            self.warm = true;
        }
    }

    fn track(&mut self, x: f32) {
        let residual = x - self.baseline;
        let step = self.eta_baseline * self.sigma();
        if residual > 0.0 {
            self.baseline += step;
        } else if residual < 0.0 {
            self.baseline -= step;
        }

        let dev = libm::fabsf(residual);
        if dev > self.mad {
            self.mad *= 1.0 + self.eta_mad;
        } else if dev < self.mad {
            self.mad *= 1.0 - self.eta_mad;
        }
    }
}
