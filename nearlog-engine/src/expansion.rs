use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use nearlog_db::models::Code;

use crate::provenance::Provenance;
use crate::store::CandidateStore;

/// Stratégie de perturbation des chiffres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExpansionMode {
    /// Produit cartésien : les 4 positions varient simultanément de ±niveau au plus.
    #[default]
    Full,
    /// Une seule position varie à la fois, les 3 autres restent fixes.
    Single,
}

impl fmt::Display for ExpansionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpansionMode::Full => write!(f, "full"),
            ExpansionMode::Single => write!(f, "single"),
        }
    }
}

/// Drapeau d'annulation coopératif, vérifié entre deux niveaux.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    TargetReached,
    /// Un niveau n'a produit aucun nouveau candidat.
    Stalled,
    LevelCap,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpansionReport {
    pub target: usize,
    pub achieved: usize,
    pub levels_run: u32,
    /// Taille de l'ensemble après chaque niveau fusionné.
    pub level_sizes: Vec<usize>,
    pub stop: StopReason,
}

impl ExpansionReport {
    pub fn reached(&self) -> bool {
        self.stop == StopReason::TargetReached
    }
}

impl fmt::Display for ExpansionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reached() {
            write!(f, "target reached: {} candidates", self.achieved)
        } else {
            write!(f, "target not reached, achieved {} of {} ({:?})", self.achieved, self.target, self.stop)
        }
    }
}

#[derive(Debug, Clone)]
pub struct Expansion {
    pub candidates: CandidateStore,
    pub report: ExpansionReport,
}

/// Expansion combinatoire par niveaux.
///
/// Les sources de chaque niveau sont les codes de la graine ; un code généré n'est jamais
/// ré-expansé. Un code n'est ajouté que s'il est absent de l'ensemble courant et du lot
/// du niveau. Le lot est fusionné à la fin du niveau.
#[derive(Debug, Clone, Default)]
pub struct Expander {
    pub mode: ExpansionMode,
    pub max_level: Option<u32>,
    pub cancel: Option<CancelFlag>,
}

impl Expander {
    pub fn new(mode: ExpansionMode) -> Self {
        Self { mode, max_level: None, cancel: None }
    }

    pub fn with_max_level(mut self, max_level: Option<u32>) -> Self {
        self.max_level = max_level;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn expand(&self, seed: &CandidateStore, target: usize) -> Expansion {
        let sources = seed.codes();
        let mut candidates = seed.clone();
        let mut level_sizes = Vec::new();
        let mut levels_run = 0;

        let stop = if candidates.len() >= target {
            StopReason::TargetReached
        } else {
            let mut level = 1u32;
            loop {
                if self.cancel.as_ref().is_some_and(|c| c.is_cancelled()) {
                    log::info!("Expansion annulée avant le niveau {}", level);
                    break StopReason::Cancelled;
                }
                if self.max_level.is_some_and(|max| level > max) {
                    break StopReason::LevelCap;
                }

                log::debug!("Expansion niveau {} ({}) : {} / {} candidats", level, self.mode, candidates.len(), target);
                let pending = self.expand_level(&sources, &candidates, level, target);
                if pending.is_empty() {
                    log::info!("Le niveau {} n'a produit aucun nouveau candidat, arrêt à {} / {}", level, candidates.len(), target);
                    break StopReason::Stalled;
                }

                candidates.merge(pending);
                level_sizes.push(candidates.len());
                levels_run = level;

                if candidates.len() >= target {
                    break StopReason::TargetReached;
                }
                level += 1;
            }
        };

        let report = ExpansionReport {
            target,
            achieved: candidates.len(),
            levels_run,
            level_sizes,
            stop,
        };
        Expansion { candidates, report }
    }

    fn expand_level(
        &self,
        sources: &[Code],
        current: &CandidateStore,
        level: u32,
        target: usize,
    ) -> CandidateStore {
        let mut pending = CandidateStore::new();
        let full = |pending: &CandidateStore| current.len() + pending.len() >= target;

        for &source in sources {
            if full(&pending) {
                break;
            }
            let proposals = match self.mode {
                ExpansionMode::Full => cross_product(source, level),
                ExpansionMode::Single => single_digit(source, level),
            };
            for (code, provenance) in proposals {
                if current.contains(&code) {
                    continue;
                }
                if pending.add(code, provenance) && full(&pending) {
                    break;
                }
            }
        }
        pending
    }
}

/// Valeurs admissibles pour un chiffre au niveau donné : l'original et chaque delta
/// dans ±1..=niveau restant dans 0..=9. Toujours un intervalle contigu.
fn digit_options(digit: u8, level: u32) -> std::ops::RangeInclusive<u8> {
    let level = level.min(9) as u8;
    digit.saturating_sub(level)..=(digit + level).min(9)
}

fn cross_product(source: Code, level: u32) -> Vec<(Code, Provenance)> {
    let digits = source.digits();
    let mut out = Vec::new();
    for a in digit_options(digits[0], level) {
        for b in digit_options(digits[1], level) {
            for c in digit_options(digits[2], level) {
                for d in digit_options(digits[3], level) {
                    let new = [a, b, c, d];
                    if new == digits {
                        continue;
                    }
                    let Some(code) = Code::from_digits(new) else { continue };
                    let deltas: [i8; 4] = std::array::from_fn(|i| new[i] as i8 - digits[i] as i8);
                    out.push((code, Provenance::CrossExpansion { level, source, deltas }));
                }
            }
        }
    }
    out
}

fn single_digit(source: Code, level: u32) -> Vec<(Code, Provenance)> {
    let digits = source.digits();
    let mut out = Vec::new();
    let mut push = |position: usize, value: i16| {
        if !(0..=9).contains(&value) {
            return;
        }
        let mut new = digits;
        new[position] = value as u8;
        if let Some(code) = Code::from_digits(new) {
            out.push((code, Provenance::DigitExpansion { level, source }));
        }
    };

    for position in 0..4 {
        let original = digits[position] as i16;
        for up in 1..=level as i16 {
            for down in 1..=level as i16 {
                push(position, original + up);
                push(position, original - down);
            }
        }
    }
    out
}
