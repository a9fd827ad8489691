use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{Result, TransformError};
use crate::transform::Band;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub bench: BenchConfig,
}

/// Transform engine settings. Defaults: band [100, 1000) Hz, 16 DFT shards, 8 FFT shards.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_min_frequency")]
    pub min_frequency: u32,
    #[serde(default = "default_max_frequency")]
    pub max_frequency: u32,
    /// Shard count for the distributed DFT
    #[serde(default = "default_dft_workers")]
    pub dft_workers: usize,
    /// Shard count for the distributed FFT (power of two)
    #[serde(default = "default_fft_workers")]
    pub fft_workers: usize,
}

#[derive(Debug, Deserialize)]
pub struct BenchConfig {
    #[serde(default = "default_trials")]
    pub trials: usize,
    #[serde(default = "default_top")]
    pub top: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_frequency: default_min_frequency(),
            max_frequency: default_max_frequency(),
            dft_workers: default_dft_workers(),
            fft_workers: default_fft_workers(),
        }
    }
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            trials: default_trials(),
            top: default_top(),
        }
    }
}

impl EngineConfig {
    pub fn band(&self) -> Band {
        Band::new(self.min_frequency, self.max_frequency)
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_frequency >= self.max_frequency {
            return Err(TransformError::InvalidConfig(format!(
                "min_frequency ({}) must be below max_frequency ({})",
                self.min_frequency, self.max_frequency
            )));
        }
        if self.dft_workers == 0 {
            return Err(TransformError::InvalidConfig(
                "dft_workers must be at least 1".into(),
            ));
        }
        if !self.fft_workers.is_power_of_two() {
            return Err(TransformError::InvalidConfig(format!(
                "fft_workers must be a power of two, got {}",
                self.fft_workers
            )));
        }
        Ok(())
    }
}

fn default_min_frequency() -> u32 { 100 }
fn default_max_frequency() -> u32 { 1000 }
fn default_dft_workers() -> usize { 16 }
fn default_fft_workers() -> usize { 8 }
fn default_trials() -> usize { 10 }
fn default_top() -> usize { 5 }

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(err) => {
            log::warn!("Invalid config {}: {}", path.display(), err);
            None
        }
    }
}

/// Explicit path, else `spectra.toml` in the working directory, else the
/// per-user config file.
pub fn find_config(explicit: Option<PathBuf>) -> Option<PathBuf> {
    explicit.or_else(|| {
        let local = PathBuf::from("spectra.toml");
        if local.exists() {
            return Some(local);
        }
        if let Some(home) = dirs::home_dir() {
            let xdg = home.join(".config").join("spectra").join("config.toml");
            if xdg.exists() {
                return Some(xdg);
            }
        }
        if let Some(config_dir) = dirs::config_dir() {
            let platform = config_dir.join("spectra").join("config.toml");
            if platform.exists() {
                return Some(platform);
            }
        }
        None
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_engine_settings() {
        let engine = EngineConfig::default();
        assert_eq!(engine.band(), Band::new(100, 1000));
        assert_eq!(engine.dft_workers, 16);
        assert_eq!(engine.fft_workers, 8);
        assert!(engine.validate().is_ok());
    }

    #[test]
    fn parses_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [engine]
            max_frequency = 2000
            fft_workers = 4

            [bench]
            trials = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.engine.min_frequency, 100);
        assert_eq!(config.engine.max_frequency, 2000);
        assert_eq!(config.engine.fft_workers, 4);
        assert_eq!(config.bench.trials, 3);
        assert_eq!(config.bench.top, 5);
    }

    #[test]
    fn rejects_bad_engine_settings() {
        let inverted = EngineConfig { min_frequency: 500, max_frequency: 500, ..Default::default() };
        assert!(inverted.validate().is_err());

        let no_dft = EngineConfig { dft_workers: 0, ..Default::default() };
        assert!(no_dft.validate().is_err());

        let odd_fft = EngineConfig { fft_workers: 6, ..Default::default() };
        assert!(odd_fft.validate().is_err());
    }
}
