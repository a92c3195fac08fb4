use nearlog_db::models::{Code, HistoricalRecord};

use crate::benchmark::Benchmark;
use crate::config::EngineConfig;
use crate::error::{require_history, EngineError};
use crate::expansion::{CancelFlag, Expander, ExpansionReport};
use crate::heuristics::SecondaryHeuristic;
use crate::matcher::scan_all;
use crate::output::FinalCandidates;
use crate::store::CandidateStore;

/// Chaîne de génération : correspondances proches, heuristiques secondaires, expansion.
#[derive(Debug, Clone)]
pub struct CandidatePipeline {
    pub window: usize,
    pub secondary: Vec<SecondaryHeuristic>,
    pub expander: Expander,
}

#[derive(Debug, Clone)]
pub struct Generation {
    pub candidates: CandidateStore,
    /// Taille de la graine avant expansion.
    pub seed_size: usize,
    pub report: ExpansionReport,
}

impl CandidatePipeline {
    pub fn new(window: usize, secondary: Vec<SecondaryHeuristic>, expander: Expander) -> Self {
        Self { window, secondary, expander }
    }

    pub fn for_generation(config: &EngineConfig, cancel: Option<CancelFlag>) -> Self {
        Self::new(config.near_match_window, config.secondary.clone(), config.expander(cancel))
    }

    pub fn for_backtest(config: &EngineConfig) -> Self {
        Self::new(config.near_match_window, config.backtest_secondary.clone(), config.expander(None))
    }

    /// Graine : correspondances proches de `reference` dans `history`, puis chaque
    /// heuristique secondaire appliquée aux trouvailles, dans l'ordre configuré.
    pub fn seed(&self, history: &[HistoricalRecord], reference: Code) -> CandidateStore {
        let mut store = CandidateStore::new();
        scan_all(&mut store, history, reference, self.window);

        if !self.secondary.is_empty() {
            let findings = store.clone();
            for heuristic in &self.secondary {
                let fresh = heuristic.apply(&findings, history, reference);
                let added = store.merge(fresh);
                log::debug!("Heuristique {:?} : {} nouveaux candidats", heuristic, added);
            }
        }
        store
    }

    pub fn generate(&self, history: &[HistoricalRecord], reference: Code, target: usize) -> Generation {
        let seed = self.seed(history, reference);
        let seed_size = seed.len();
        let expansion = self.expander.expand(&seed, target);
        Generation {
            candidates: expansion.candidates,
            seed_size,
            report: expansion.report,
        }
    }
}

/// Prédiction finale à partir de tout l'historique : le dernier code sert de référence,
/// la liste est tronquée à `output_count` dans l'ordre d'insertion puis réordonnée selon
/// le benchmark.
pub fn generate_next(
    history: &[HistoricalRecord],
    config: &EngineConfig,
    benchmark: &Benchmark,
    cancel: Option<CancelFlag>,
) -> Result<FinalCandidates, EngineError> {
    require_history(history.len())?;
    config.validate()?;

    let last = history[history.len() - 1];
    let pipeline = CandidatePipeline::for_generation(config, cancel);
    let generation = pipeline.generate(history, last.code, config.output_count);

    if !generation.report.reached() {
        log::warn!("Génération : {}", generation.report);
    }

    let mut output = FinalCandidates::build(generation, benchmark, config.output_count);
    output.reference = Some(last);
    Ok(output)
}
