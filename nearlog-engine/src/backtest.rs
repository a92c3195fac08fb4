use rayon::prelude::*;

use nearlog_db::models::HistoricalRecord;

use crate::benchmark::{Benchmark, PatternCounter};
use crate::config::EngineConfig;
use crate::pipeline::CandidatePipeline;
use crate::provenance::PatternType;
use crate::store::CandidateStore;

/// Rejoue l'historique période par période. Pour prédire `history[i]`, seul
/// `history[..i]` est visible et `history[i - 1]` sert de référence.
#[derive(Debug, Clone)]
pub struct BacktestRunner {
    pipeline: CandidatePipeline,
    parallel: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BacktestSummary {
    pub start_index: usize,
    /// Nombre de prédictions évaluées.
    pub evaluated: usize,
    /// Prédictions dont l'ensemble contenait le vrai code.
    pub hits: usize,
    /// Compteur cumulé, graine incluse.
    pub counter: PatternCounter,
}

impl BacktestSummary {
    pub fn benchmark(&self, k: usize) -> Benchmark {
        Benchmark::from_counter(&self.counter, k)
    }
}

impl BacktestRunner {
    pub fn new(pipeline: CandidatePipeline, parallel: bool) -> Self {
        Self { pipeline, parallel }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(CandidatePipeline::for_backtest(config), config.parallel_backtest)
    }

    /// Nombre d'index évalués par `run` pour une séquence de longueur `len`.
    pub fn steps(len: usize, start_index: usize) -> usize {
        len.saturating_sub(1).saturating_sub(start_index.max(1))
    }

    /// Ensemble de candidats construit pour prédire `history[index]`. `None` si `index` vaut 0
    /// ou dépasse la séquence.
    pub fn predict_at(&self, history: &[HistoricalRecord], index: usize, target: usize) -> Option<CandidateStore> {
        if index == 0 || index >= history.len() {
            return None;
        }
        let known = &history[..index];
        let reference = history[index - 1].code;
        Some(self.pipeline.generate(known, reference, target).candidates)
    }

    /// Type de motif crédité si `history[index]` figure parmi les candidats.
    pub fn evaluate_at(&self, history: &[HistoricalRecord], index: usize, target: usize) -> Option<PatternType> {
        let candidates = self.predict_at(history, index, target)?;
        candidates
            .get(&history[index].code)
            .map(|provenance| provenance.pattern_type())
    }

    pub fn run(&self, history: &[HistoricalRecord], start_index: usize, target: usize) -> BacktestSummary {
        self.run_seeded(history, start_index, target, PatternCounter::new(), || {})
    }

    /// Évalue les index `start_index..len - 1` (au moins 1). Le compteur part de `seed`
    /// et `on_step` est appelé après chaque évaluation, éventuellement depuis un autre thread.
    pub fn run_seeded<F>(
        &self,
        history: &[HistoricalRecord],
        start_index: usize,
        target: usize,
        seed: PatternCounter,
        on_step: F,
    ) -> BacktestSummary
    where
        F: Fn() + Sync,
    {
        let start = start_index.max(1);
        let end = history.len().saturating_sub(1);

        let step = |i: usize| {
            let hit = self.evaluate_at(history, i, target);
            on_step();
            hit
        };

        // Résultats collectés dans l'ordre des index, fusionnés par un seul accumulateur.
        let outcomes: Vec<Option<PatternType>> = if start >= end {
            Vec::new()
        } else if self.parallel {
            (start..end).into_par_iter().map(step).collect()
        } else {
            (start..end).map(step).collect()
        };

        let mut counter = seed;
        let mut hits = 0;
        for pattern in outcomes.iter().flatten() {
            counter.increment(pattern);
            hits += 1;
        }

        log::info!(
            "Backtest : {} prédictions évaluées depuis l'index {}, {} réussites",
            outcomes.len(),
            start,
            hits
        );

        BacktestSummary {
            start_index: start,
            evaluated: outcomes.len(),
            hits,
            counter,
        }
    }
}

/// Premier index rejoué en mode incrémental.
pub fn incremental_start(len: usize, window: usize) -> usize {
    len.saturating_sub(window).max(1)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BacktestPlan {
    pub start_index: usize,
    pub seed: PatternCounter,
    pub incremental: bool,
}

/// Avec un benchmark antérieur, seule la fenêtre récente est rejouée et les scores
/// précédents servent de graine ; sinon backtest complet depuis l'index 1.
pub fn plan(history_len: usize, config: &EngineConfig, prior: Option<&Benchmark>) -> BacktestPlan {
    match prior {
        Some(benchmark) if !benchmark.is_empty() => BacktestPlan {
            start_index: incremental_start(history_len, config.incremental_window()),
            seed: benchmark.to_counter(),
            incremental: true,
        },
        _ => BacktestPlan {
            start_index: 1,
            seed: PatternCounter::new(),
            incremental: false,
        },
    }
}
