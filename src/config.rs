use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::correlation::{CorrelationModel, PivotPolicy};
use crate::simulation::{
    DEFAULT_BATCH_SIZE, DEFAULT_ITERATIONS, DEFAULT_KELLY_SHARE, MAX_ITERATIONS, SimulationOptions,
};

const MAX_BATCH_SIZE: u32 = 100_000;
const MAX_THREADS: usize = 64;

/// Tunables for the simulator. The core never reads these itself; the binary
/// loads them and hands over [`SimulationOptions`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelConfig {
    pub iterations: u32,
    pub kelly_share: f64,
    pub batch_size: u32,
    pub threads: Option<usize>,
    pub pivot_policy: PivotPolicy,
    pub correlation: CorrelationModel,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            kelly_share: DEFAULT_KELLY_SHARE,
            batch_size: DEFAULT_BATCH_SIZE,
            threads: None,
            pivot_policy: PivotPolicy::Clamp,
            correlation: CorrelationModel::default(),
        }
    }
}

impl ModelConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`ModelConfig::from_env`] with an arbitrary key source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let iterations = parsed("SGP_ITERATIONS")
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(defaults.iterations);
        let kelly_share = parsed("SGP_KELLY_SHARE")
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|v| v.is_finite())
            .unwrap_or(defaults.kelly_share);
        let batch_size = parsed("SGP_BATCH_SIZE")
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(defaults.batch_size);
        let threads = parsed("SGP_THREADS").and_then(|v| v.parse::<usize>().ok());
        let strict = parsed("SGP_STRICT_PSD")
            .map(|v| {
                let t = v.to_ascii_lowercase();
                !(t == "0" || t == "false" || t == "off" || t == "no")
            })
            .unwrap_or(false);

        Self {
            iterations,
            kelly_share,
            batch_size,
            threads,
            pivot_policy: if strict {
                PivotPolicy::Strict
            } else {
                PivotPolicy::Clamp
            },
            correlation: defaults.correlation,
        }
        .sanitized()
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read model config {}", path.display()))?;
        let config: ModelConfig = serde_json::from_str(&raw)
            .with_context(|| format!("parse model config {}", path.display()))?;
        Ok(config.sanitized())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).context("create config dir")?;
            }
        }
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(self).context("serialize model config")?;
        fs::write(&tmp, json).context("write model config")?;
        fs::rename(&tmp, path).context("swap model config")?;
        Ok(())
    }

    /// Pull every knob back into a range the simulator accepts.
    pub fn sanitized(mut self) -> Self {
        self.iterations = self.iterations.clamp(1, MAX_ITERATIONS);
        self.batch_size = self.batch_size.clamp(1, MAX_BATCH_SIZE);
        self.kelly_share = if self.kelly_share.is_finite() {
            self.kelly_share.clamp(0.0, 1.0)
        } else {
            DEFAULT_KELLY_SHARE
        };
        self.threads = self.threads.filter(|n| *n > 0).map(|n| n.min(MAX_THREADS));
        self
    }

    pub fn simulation_options(&self, seed: u64) -> SimulationOptions {
        SimulationOptions {
            iterations: self.iterations,
            seed,
            kelly_share: self.kelly_share,
            correlation: self.correlation,
            pivot_policy: self.pivot_policy,
            batch_size: self.batch_size,
            threads: self.threads,
        }
    }
}
