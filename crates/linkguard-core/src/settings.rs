use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Result};
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::input::{FileInputProvider, DEFAULT_ALLOWED_EXTENSIONS, DEFAULT_MAX_FILE_BYTES};
use crate::signals::{FixedSignals, RandomSignals, SignalOdds, SignalProvider};

/// How the engine obtains non-heuristic signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalMode {
    /// Simulated draws with reference probabilities.
    #[default]
    Random,
    /// The configured [`FixedSignals`] for every scan.
    Fixed,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalSettings {
    pub mode: SignalMode,
    /// Seed for reproducible random draws.
    pub seed: Option<u64>,
    pub odds: SignalOdds,
    pub fixed: FixedSignals,
}

/// Engine configuration, typically layered from a config file and `LINKGUARD_*` variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Directory with `threat_domains.txt` / `patterns.json`; built-in tables when unset.
    pub patterns_dir: Option<PathBuf>,
    pub max_file_bytes: u64,
    pub allowed_extensions: Vec<String>,
    pub signals: SignalSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            patterns_dir: None,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            signals: SignalSettings::default(),
        }
    }
}

impl EngineSettings {
    pub fn validate(&self) -> Result<()> {
        if self.max_file_bytes == 0 {
            bail!("max_file_bytes must be greater than zero");
        }
        if self.allowed_extensions.is_empty() {
            bail!("allowed_extensions must list at least one extension");
        }
        if let Some(ext) = self
            .allowed_extensions
            .iter()
            .find(|ext| ext.trim_start_matches('.').trim().is_empty())
        {
            bail!("allowed_extensions contains an empty entry `{ext}`");
        }
        let odds = &self.signals.odds;
        for (name, p) in [
            ("new_domain", odds.new_domain),
            ("ml_anomaly", odds.ml_anomaly),
            ("whois_valid", odds.whois_valid),
            ("no_redirects", odds.no_redirects),
            ("suspicious_scripts", odds.suspicious_scripts),
            ("hidden_iframes", odds.hidden_iframes),
            ("form_secure", odds.form_secure),
        ] {
            if !(0.0..=1.0).contains(&p) {
                bail!("signals.odds.{name} must be within 0.0..=1.0 (got {p})");
            }
        }
        Ok(())
    }

    /// Build the signal provider described by these settings.
    pub fn signal_provider(&self) -> Arc<dyn SignalProvider> {
        match self.signals.mode {
            SignalMode::Fixed => Arc::new(self.signals.fixed.clone()),
            SignalMode::Random => {
                let rng = match self.signals.seed {
                    Some(seed) => StdRng::seed_from_u64(seed),
                    None => StdRng::from_entropy(),
                };
                Arc::new(RandomSignals::with_rng(rng, self.signals.odds))
            }
        }
    }

    pub fn input_provider(&self) -> FileInputProvider {
        FileInputProvider::new(self.max_file_bytes, self.allowed_extensions.iter().cloned())
    }
}
