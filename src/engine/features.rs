use super::{
    config::PinchConfig,
    filter::BandPass,
    types::{FusedSample, SensorFrame},
};

/// Three-point Teager-Kaiser energy operator, evaluated one sample late so it
/// only ever looks backwards: `psi[n-1] = x[n-1]^2 - x[n-2] * x[n]`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Tkeo {
    x1: f32,
    x2: f32,
    seen: u8,
}

impl Tkeo {
    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let psi = if self.seen >= 2 {
            self.x1 * self.x1 - self.x2 * x
        } else {
            self.seen += 1;
            0.0
        };
        self.x2 = self.x1;
        self.x1 = x;
        psi
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Weighted L2 fusion of the two sensor energies.
#[inline]
pub fn fuse(accel_energy: f32, gyro_energy: f32, accel_weight: f32, gyro_weight: f32) -> f32 {
    let a = accel_weight * accel_energy;
    let g = gyro_weight * gyro_energy;
    libm::sqrtf(a * a + g * g)
}

pub fn gyro_magnitude(gyro: [f32; 3]) -> f32 {
    libm::sqrtf(gyro[0] * gyro[0] + gyro[1] * gyro[1] + gyro[2] * gyro[2])
}

/// Per-axis band-pass and energy operator for all six IMU channels, reduced
/// to one fused scalar per frame.
///
/// The operator runs one frame late, so the value produced while pushing frame
/// `n` describes frame `n - 1`. The output carries that frame's timestamp and
/// angular-rate magnitude, making the chain's latency one sample period.
#[derive(Clone, Debug)]
pub struct SignalChain {
    accel_filters: [BandPass; 3],
    gyro_filters: [BandPass; 3],
    accel_tkeo: [Tkeo; 3],
    gyro_tkeo: [Tkeo; 3],
    accel_weight: f32,
    gyro_weight: f32,
    /// Timestamp and angular-rate magnitude of the previous frame.
    previous: Option<(u64, f32)>,
}

impl SignalChain {
    pub fn new(config: &PinchConfig) -> Self {
        let s = &config.signal;
        let band = BandPass::new(s.sample_rate_hz, s.band_low_hz, s.band_high_hz);
        Self {
            accel_filters: [band; 3],
            gyro_filters: [band; 3],
            accel_tkeo: [Tkeo::default(); 3],
            gyro_tkeo: [Tkeo::default(); 3],
            accel_weight: s.accel_weight,
            gyro_weight: s.gyro_weight,
            previous: None,
        }
    }

    pub fn push(&mut self, frame: &SensorFrame) -> FusedSample {
        let accel_energy =
            channel_energy(&mut self.accel_filters, &mut self.accel_tkeo, frame.accel);
        let gyro_energy = channel_energy(&mut self.gyro_filters, &mut self.gyro_tkeo, frame.gyro);
        let current = (frame.now_ms, gyro_magnitude(frame.gyro));
        let (now_ms, magnitude) = self.previous.replace(current).unwrap_or(current);
        FusedSample {
            now_ms,
            value: fuse(accel_energy, gyro_energy, self.accel_weight, self.gyro_weight),
            gyro_magnitude: magnitude,
        }
    }

    pub fn reset(&mut self) {
        for f in self.accel_filters.iter_mut().chain(self.gyro_filters.iter_mut()) {
            f.reset();
        }
        for t in self.accel_tkeo.iter_mut().chain(self.gyro_tkeo.iter_mut()) {
            t.reset();
        }
        self.previous = None;
    }
}

/// Summed operator output over three axes, clamped at zero: the operator
/// dips negative on smooth segments and that carries no transient energy.
fn channel_energy(filters: &mut [BandPass; 3], tkeo: &mut [Tkeo; 3], axes: [f32; 3]) -> f32 {
    let mut energy = 0.0;
    for ((filter, op), x) in filters.iter_mut().zip(tkeo.iter_mut()).zip(axes) {
        energy += op.process(filter.process(x));
    }
    energy.max(0.0)
}

#[cfg(test)]
mod tests;
