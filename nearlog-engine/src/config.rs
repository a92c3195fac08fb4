use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::expansion::{CancelFlag, Expander, ExpansionMode};
use crate::heuristics::SecondaryHeuristic;

/// Paramètres du moteur, passés explicitement à chaque appel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Nombre de candidats de la prédiction finale.
    pub output_count: usize,
    /// Nombre de candidats générés à chaque pas du backtest.
    pub backtest_target_count: usize,
    /// Taille du classement benchmark conservé.
    pub benchmark_top_k: usize,
    /// Voisins temporels pris de chaque côté d'une correspondance.
    pub near_match_window: usize,
    pub incremental_days: usize,
    pub periods_per_day: usize,
    pub expansion_mode: ExpansionMode,
    pub max_level: Option<u32>,
    /// Heuristiques secondaires de la génération finale.
    pub secondary: Vec<SecondaryHeuristic>,
    /// Heuristiques secondaires utilisées pendant le backtest.
    pub backtest_secondary: Vec<SecondaryHeuristic>,
    pub parallel_backtest: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            output_count: 8900,
            backtest_target_count: 9400,
            benchmark_top_k: 15,
            near_match_window: 1,
            incremental_days: 14,
            periods_per_day: 1,
            expansion_mode: ExpansionMode::Full,
            max_level: None,
            secondary: vec![SecondaryHeuristic::Mix],
            backtest_secondary: Vec::new(),
            parallel_backtest: true,
        }
    }
}

impl EngineConfig {
    /// Nombre de périodes rejouées en mode incrémental.
    pub fn incremental_window(&self) -> usize {
        self.incremental_days * self.periods_per_day
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.output_count == 0 {
            return Err(EngineError::InvalidConfig("output_count doit être > 0".into()));
        }
        if self.backtest_target_count == 0 {
            return Err(EngineError::InvalidConfig("backtest_target_count doit être > 0".into()));
        }
        if self.benchmark_top_k == 0 {
            return Err(EngineError::InvalidConfig("benchmark_top_k doit être > 0".into()));
        }
        if self.max_level == Some(0) {
            return Err(EngineError::InvalidConfig("max_level doit être > 0".into()));
        }
        Ok(())
    }

    pub fn expander(&self, cancel: Option<CancelFlag>) -> Expander {
        let expander = Expander::new(self.expansion_mode).with_max_level(self.max_level);
        match cancel {
            Some(flag) => expander.with_cancel(flag),
            None => expander,
        }
    }
}

pub fn save_config(config: &EngineConfig, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, json)
        .with_context(|| format!("Impossible d'écrire {:?}", path))?;
    Ok(())
}

pub fn load_config(path: &Path) -> Result<EngineConfig> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Impossible de lire {:?}", path))?;
    let config: EngineConfig = serde_json::from_str(&json)
        .with_context(|| format!("Configuration invalide dans {:?}", path))?;
    config.validate()?;
    Ok(config)
}
