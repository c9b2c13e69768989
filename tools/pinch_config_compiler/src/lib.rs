use std::{fmt, fs, path::Path};

use serde::Deserialize;

pub const WARP_STEPS: usize = 3;

#[derive(Debug)]
pub enum ConfigCompilerError {
    Io(String),
    Parse(String),
    Validation(String),
}

impl fmt::Display for ConfigCompilerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "io error: {msg}"),
            Self::Parse(msg) => write!(f, "parse error: {msg}"),
            Self::Validation(msg) => write!(f, "validation error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigCompilerError {}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PinchConfigFile {
    pub signal: SignalSection,
    pub baseline: BaselineSection,
    pub peak: PeakSection,
    pub gates: GateSection,
    pub matcher: MatcherSection,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignalSection {
    pub sample_rate_hz: f32,
    pub band_low_hz: f32,
    pub band_high_hz: f32,
    pub accel_weight: f32,
    pub gyro_weight: f32,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BaselineSection {
    pub window_ms: u64,
    pub gate_k: f32,
    pub release_ratio: f32,
    pub min_sigma: f32,
    pub gate_ramp_ms: u64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PeakSection {
    pub refractory_ms: u64,
    pub min_width_ms: u64,
    pub max_width_ms: u64,
    pub pre_quiet_ms: u64,
    pub ignore_start_ms: u64,
    pub ignore_end_ms: u64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GateSection {
    pub amplitude_surplus_thresh: f32,
    pub isi_threshold_ms: u64,
    pub isi_override_ncc: f32,
    pub gyro_veto_thresh: f32,
    pub gyro_veto_hold_ms: u64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatcherSection {
    pub ncc_thresh: f32,
    pub early_exit_ncc: f32,
    pub pre_ms: u64,
    pub post_ms: u64,
    pub warp_factors: Vec<f32>,
    pub shift_tolerance: u8,
}

pub fn parse_config_str(source: &str) -> Result<PinchConfigFile, ConfigCompilerError> {
    toml::from_str(source).map_err(|e| ConfigCompilerError::Parse(e.to_string()))
}

pub fn parse_config_file(path: &Path) -> Result<PinchConfigFile, ConfigCompilerError> {
    let source = fs::read_to_string(path)
        .map_err(|e| ConfigCompilerError::Io(format!("{}: {e}", path.display())))?;
    parse_config_str(&source)
}

fn check(ok: bool, msg: &str) -> Result<(), ConfigCompilerError> {
    if ok {
        Ok(())
    } else {
        Err(ConfigCompilerError::Validation(msg.to_string()))
    }
}

fn positive(value: f32) -> bool {
    value.is_finite() && value > 0.0
}

fn unit(value: f32) -> bool {
    value.is_finite() && value > 0.0 && value <= 1.0
}

pub fn validate_config(cfg: &PinchConfigFile) -> Result<(), ConfigCompilerError> {
    let signal = &cfg.signal;
    check(
        positive(signal.sample_rate_hz),
        "signal.sample_rate_hz must be positive",
    )?;
    check(
        positive(signal.band_low_hz),
        "signal.band_low_hz must be positive",
    )?;
    check(
        signal.band_high_hz.is_finite() && signal.band_high_hz > signal.band_low_hz,
        "signal.band_high_hz must be > signal.band_low_hz",
    )?;
    check(
        signal.band_high_hz < signal.sample_rate_hz * 0.5,
        "signal.band_high_hz must be below the Nyquist frequency",
    )?;
    check(
        signal.accel_weight.is_finite()
            && signal.gyro_weight.is_finite()
            && signal.accel_weight >= 0.0
            && signal.gyro_weight >= 0.0
            && (signal.accel_weight > 0.0 || signal.gyro_weight > 0.0),
        "signal weights must be non-negative with at least one non-zero weight",
    )?;

    let baseline = &cfg.baseline;
    check(baseline.window_ms > 0, "baseline.window_ms must be > 0")?;
    check(positive(baseline.gate_k), "baseline.gate_k must be positive")?;
    check(
        unit(baseline.release_ratio),
        "baseline.release_ratio must be in (0, 1]",
    )?;
    check(
        positive(baseline.min_sigma),
        "baseline.min_sigma must be positive",
    )?;

    let peak = &cfg.peak;
    check(peak.refractory_ms > 0, "peak.refractory_ms must be > 0")?;
    check(peak.min_width_ms > 0, "peak.min_width_ms must be > 0")?;
    check(
        peak.max_width_ms >= peak.min_width_ms,
        "peak.max_width_ms must be >= peak.min_width_ms",
    )?;

    let gates = &cfg.gates;
    check(
        gates.amplitude_surplus_thresh.is_finite() && gates.amplitude_surplus_thresh >= 0.0,
        "gates.amplitude_surplus_thresh must be >= 0",
    )?;
    check(
        unit(gates.isi_override_ncc),
        "gates.isi_override_ncc must be in (0, 1]",
    )?;
    check(
        positive(gates.gyro_veto_thresh),
        "gates.gyro_veto_thresh must be positive",
    )?;

    let matcher = &cfg.matcher;
    check(unit(matcher.ncc_thresh), "matcher.ncc_thresh must be in (0, 1]")?;
    check(
        unit(matcher.early_exit_ncc) && matcher.early_exit_ncc >= matcher.ncc_thresh,
        "matcher.early_exit_ncc must be in [matcher.ncc_thresh, 1]",
    )?;
    check(
        matcher.pre_ms > 0 && matcher.post_ms > 0,
        "matcher.pre_ms and matcher.post_ms must be > 0",
    )?;
    check(
        matcher.warp_factors.len() == WARP_STEPS,
        "matcher.warp_factors must list exactly 3 factors",
    )?;
    check(
        matcher
            .warp_factors
            .iter()
            .all(|f| f.is_finite() && *f >= 0.5 && *f <= 2.0),
        "matcher.warp_factors must be within [0.5, 2.0]",
    )?;
    check(
        matcher.shift_tolerance <= 4,
        "matcher.shift_tolerance must be <= 4",
    )?;

    Ok(())
}

fn lit(value: f32) -> String {
    format!("{value:?}")
}

pub fn render_generated_config(cfg: &PinchConfigFile) -> String {
    let s = &cfg.signal;
    let b = &cfg.baseline;
    let p = &cfg.peak;
    let g = &cfg.gates;
    let m = &cfg.matcher;
    let warp = m
        .warp_factors
        .iter()
        .map(|f| lit(*f))
        .collect::<Vec<_>>()
        .join(", ");

    let mut out = String::new();
    out.push_str("// @generated by pinch_config_compiler. Do not edit.\n");
    out.push_str("pub const COMPILED_PINCH_CONFIG: PinchConfig = PinchConfig {\n");
    out.push_str("    signal: SignalConfig {\n");
    out.push_str(&format!("        sample_rate_hz: {},\n", lit(s.sample_rate_hz)));
    out.push_str(&format!("        band_low_hz: {},\n", lit(s.band_low_hz)));
    out.push_str(&format!("        band_high_hz: {},\n", lit(s.band_high_hz)));
    out.push_str(&format!("        accel_weight: {},\n", lit(s.accel_weight)));
    out.push_str(&format!("        gyro_weight: {},\n", lit(s.gyro_weight)));
    out.push_str("    },\n");
    out.push_str("    baseline: BaselineConfig {\n");
    out.push_str(&format!("        window_ms: {},\n", b.window_ms));
    out.push_str(&format!("        gate_k: {},\n", lit(b.gate_k)));
    out.push_str(&format!("        release_ratio: {},\n", lit(b.release_ratio)));
    out.push_str(&format!("        min_sigma: {},\n", lit(b.min_sigma)));
    out.push_str(&format!("        gate_ramp_ms: {},\n", b.gate_ramp_ms));
    out.push_str("    },\n");
    out.push_str("    peak: PeakConfig {\n");
    out.push_str(&format!("        refractory_ms: {},\n", p.refractory_ms));
    out.push_str(&format!("        min_width_ms: {},\n", p.min_width_ms));
    out.push_str(&format!("        max_width_ms: {},\n", p.max_width_ms));
    out.push_str(&format!("        pre_quiet_ms: {},\n", p.pre_quiet_ms));
    out.push_str(&format!("        ignore_start_ms: {},\n", p.ignore_start_ms));
    out.push_str(&format!("        ignore_end_ms: {},\n", p.ignore_end_ms));
    out.push_str("    },\n");
    out.push_str("    gates: GateConfig {\n");
    out.push_str(&format!(
        "        amplitude_surplus_thresh: {},\n",
        lit(g.amplitude_surplus_thresh)
    ));
    out.push_str(&format!("        isi_threshold_ms: {},\n", g.isi_threshold_ms));
    out.push_str(&format!("        isi_override_ncc: {},\n", lit(g.isi_override_ncc)));
    out.push_str(&format!("        gyro_veto_thresh: {},\n", lit(g.gyro_veto_thresh)));
    out.push_str(&format!("        gyro_veto_hold_ms: {},\n", g.gyro_veto_hold_ms));
    out.push_str("    },\n");
    out.push_str("    matcher: MatcherConfig {\n");
    out.push_str(&format!("        ncc_thresh: {},\n", lit(m.ncc_thresh)));
    out.push_str(&format!("        early_exit_ncc: {},\n", lit(m.early_exit_ncc)));
    out.push_str(&format!("        pre_ms: {},\n", m.pre_ms));
    out.push_str(&format!("        post_ms: {},\n", m.post_ms));
    out.push_str(&format!("        warp_factors: [{warp}],\n"));
    out.push_str(&format!("        shift_tolerance: {},\n", m.shift_tolerance));
    out.push_str("    },\n");
    out.push_str("};\n");
    out
}

/// Parses `config/pinch.toml`, checks it against the rules the detector
/// enforces at construction, and renders the `const` the library pulls in
/// with `include!`.
pub fn generate_from_path(path: &Path) -> Result<String, ConfigCompilerError> {
    let cfg = parse_config_file(path)?;
    validate_config(&cfg)?;
    Ok(render_generated_config(&cfg))
}
