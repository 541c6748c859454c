//! Layered service configuration: built-in defaults, then an optional file,
//! then `FLOWGUARD__*` environment variables.

use anyhow::{bail, Context, Result};
use config::{Config, ConfigBuilder, Environment, File};
use config::builder::DefaultState;
use flowguard_core::{ClassifierConfig, DetectorConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_ENV: &str = "FLOWGUARD_CONFIG_FILE";
const ENV_PREFIX: &str = "FLOWGUARD";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub service_name: String,
    pub log_level: String,
    #[serde(default)]
    pub scenario_file: Option<PathBuf>,
    pub pretty: bool,
    pub preset_sources: usize,
    pub detector: DetectorSettings,
    pub classifier: ClassifierSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorSettings {
    pub window_size: usize,
    pub baseline_window_count: usize,
    pub z_threshold: f64,
    pub epsilon: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierSettings {
    pub amplification_min_severity: f64,
    pub long_duration_secs: f64,
    pub moderate_min_severity: f64,
    pub moderate_max_severity: f64,
    pub volumetric_min_severity: f64,
}

fn defaults() -> Result<ConfigBuilder<DefaultState>> {
    let c = ClassifierConfig::default();
    let d = DetectorConfig::default();
    Ok(Config::builder()
        .set_default("service_name", "flowguard-detect")?
        .set_default("log_level", "info")?
        .set_default("pretty", false)?
        .set_default("preset_sources", 3_i64)?
        .set_default("detector.window_size", d.window_size as i64)?
        .set_default("detector.baseline_window_count", 2_i64)?
        .set_default("detector.z_threshold", 3.0)?
        .set_default("detector.epsilon", d.epsilon)?
        .set_default("classifier.amplification_min_severity", c.amplification_min_severity)?
        .set_default("classifier.long_duration_secs", c.long_duration.as_secs_f64())?
        .set_default("classifier.moderate_min_severity", c.moderate_min_severity)?
        .set_default("classifier.moderate_max_severity", c.moderate_max_severity)?
        .set_default("classifier.volumetric_min_severity", c.volumetric_min_severity)?)
}

/// Resolve settings. An explicit `file` wins over `FLOWGUARD_CONFIG_FILE`;
/// an explicit file must exist, the env-named one may be absent.
pub fn load_settings(file: Option<&Path>) -> Result<Settings> {
    let mut builder = defaults()?;
    if let Some(path) = file {
        builder = builder.add_source(File::from(path).required(true));
    } else if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
        builder = builder.add_source(File::with_name(&path).required(false));
    }
    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__").try_parsing(true));
    let cfg = builder.build().context("building configuration")?;
    from_config(cfg)
}

/// Settings from an in-memory YAML document layered over the defaults.
pub fn from_yaml(doc: &str) -> Result<Settings> {
    let cfg = defaults()?.add_source(File::from_str(doc, config::FileFormat::Yaml)).build().context("parsing configuration")?;
    from_config(cfg)
}

fn from_config(cfg: Config) -> Result<Settings> {
    let settings: Settings = cfg.try_deserialize().context("deserializing configuration")?;
    settings.validate()?;
    Ok(settings)
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        let d = &self.detector;
        if d.baseline_window_count == 0 {
            bail!("detector.baseline_window_count must be at least 1");
        }
        if !d.z_threshold.is_finite() || d.z_threshold <= 0.0 {
            bail!("detector.z_threshold must be positive, got {}", d.z_threshold);
        }
        let c = &self.classifier;
        for (key, v) in [
            ("amplification_min_severity", c.amplification_min_severity),
            ("moderate_min_severity", c.moderate_min_severity),
            ("moderate_max_severity", c.moderate_max_severity),
            ("volumetric_min_severity", c.volumetric_min_severity),
        ] {
            if !(0.0..=1.0).contains(&v) {
                bail!("classifier.{key} must be within [0, 1], got {v}");
            }
        }
        if c.moderate_min_severity >= c.moderate_max_severity {
            bail!("classifier.moderate_min_severity must be below moderate_max_severity");
        }
        long_duration(c.long_duration_secs)?;
        if self.preset_sources == 0 {
            bail!("preset_sources must be at least 1");
        }
        Ok(())
    }

    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig { window_size: self.detector.window_size, epsilon: self.detector.epsilon }
    }

    pub fn classifier_config(&self) -> Result<ClassifierConfig> {
        let c = &self.classifier;
        Ok(ClassifierConfig {
            amplification_min_severity: c.amplification_min_severity,
            long_duration: long_duration(c.long_duration_secs)?,
            moderate_min_severity: c.moderate_min_severity,
            moderate_max_severity: c.moderate_max_severity,
            volumetric_min_severity: c.volumetric_min_severity,
        })
    }
}

fn long_duration(secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .with_context(|| format!("classifier.long_duration_secs must be a representable non-negative number, got {secs}"))
}
