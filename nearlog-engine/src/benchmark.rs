use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::provenance::PatternType;

/// Compteur de réussites par type de motif, ordonné par première apparition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternCounter {
    entries: Vec<(PatternType, u64)>,
    index: HashMap<PatternType, usize>,
}

impl PatternCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, pattern: &PatternType, by: u64) {
        match self.index.get(pattern) {
            Some(&i) => self.entries[i].1 += by,
            None => {
                self.index.insert(pattern.clone(), self.entries.len());
                self.entries.push((pattern.clone(), by));
            }
        }
    }

    pub fn increment(&mut self, pattern: &PatternType) {
        self.add(pattern, 1);
    }

    /// Fusion additive : les types inconnus sont ajoutés à la fin, dans l'ordre de `other`.
    pub fn merge(&mut self, other: &PatternCounter) {
        for (pattern, score) in &other.entries {
            self.add(pattern, *score);
        }
    }

    pub fn get(&self, pattern: &PatternType) -> u64 {
        self.index.get(pattern).map(|&i| self.entries[i].1).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.entries.iter().map(|(_, s)| s).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PatternType, u64)> {
        self.entries.iter().map(|(p, s)| (p, *s))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkEntry {
    pub pattern_type: PatternType,
    pub score: u64,
}

/// Les `k` meilleurs types, score décroissant. Tri stable : à égalité, l'ordre de
/// première apparition dans le compteur est conservé.
pub fn top_k(counter: &PatternCounter, k: usize) -> Vec<BenchmarkEntry> {
    let mut ranked: Vec<BenchmarkEntry> = counter
        .iter()
        .map(|(pattern_type, score)| BenchmarkEntry { pattern_type: pattern_type.clone(), score })
        .collect();
    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked.truncate(k);
    ranked
}

/// Classement benchmark : au plus K types distincts, score décroissant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Benchmark {
    entries: Vec<BenchmarkEntry>,
}

impl Benchmark {
    pub fn from_counter(counter: &PatternCounter, k: usize) -> Self {
        Self { entries: top_k(counter, k) }
    }

    pub fn entries(&self) -> &[BenchmarkEntry] {
        &self.entries
    }

    pub fn contains(&self, pattern: &PatternType) -> bool {
        self.entries.iter().any(|e| &e.pattern_type == pattern)
    }

    pub fn patterns(&self) -> Vec<&PatternType> {
        self.entries.iter().map(|e| &e.pattern_type).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Compteur de départ d'un backtest incrémental : les scores précédents, dans l'ordre
    /// du classement.
    pub fn to_counter(&self) -> PatternCounter {
        let mut counter = PatternCounter::new();
        for entry in &self.entries {
            counter.add(&entry.pattern_type, entry.score);
        }
        counter
    }
}

/// Forme persistée : tableau JSON plat. Les fichiers anciens ne contiennent que les
/// noms de types ; chacun compte alors pour 1 point.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PersistedEntry {
    Scored(BenchmarkEntry),
    Legacy(PatternType),
}

pub struct BenchmarkStore {
    path: PathBuf,
}

impl BenchmarkStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn for_game(dir: &Path, game_code: &str) -> Self {
        Self::new(dir.join(format!("{}_benchmark_patterns.json", game_code)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fichier absent, illisible, JSON invalide ou liste vide : `None`. Jamais fatal,
    /// l'appelant repasse alors en backtest complet.
    pub fn load(&self) -> Option<Benchmark> {
        if !self.path.exists() {
            return None;
        }
        let json = match std::fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) => {
                log::warn!("Benchmark {:?} illisible : {}", self.path, e);
                return None;
            }
        };
        let persisted: Vec<PersistedEntry> = match serde_json::from_str(&json) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Benchmark {:?} invalide, ignoré : {}", self.path, e);
                return None;
            }
        };
        if persisted.is_empty() {
            return None;
        }

        let mut counter = PatternCounter::new();
        for entry in persisted {
            match entry {
                PersistedEntry::Scored(e) => counter.add(&e.pattern_type, e.score),
                PersistedEntry::Legacy(p) => counter.increment(&p),
            }
        }
        let k = counter.len();
        Some(Benchmark::from_counter(&counter, k))
    }

    pub fn persist(&self, benchmark: &Benchmark) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Impossible de créer le répertoire {:?}", parent))?;
            }
        }
        let json = serde_json::to_string_pretty(benchmark.entries())?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Impossible d'écrire le benchmark {:?}", self.path))?;
        log::info!("Benchmark enregistré dans {:?} ({} types)", self.path, benchmark.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(s: &str) -> PatternType {
        PatternType::new(s)
    }

    fn counter(items: &[(&str, u64)]) -> PatternCounter {
        let mut c = PatternCounter::new();
        for &(p, s) in items {
            c.add(&pt(p), s);
        }
        c
    }

    #[test]
    fn test_counter_accumulates() {
        let mut c = PatternCounter::new();
        c.increment(&pt("mix"));
        c.increment(&pt("jump"));
        c.increment(&pt("mix"));
        assert_eq!(c.get(&pt("mix")), 2);
        assert_eq!(c.get(&pt("jump")), 1);
        assert_eq!(c.get(&pt("difference")), 0);
        assert_eq!(c.total(), 3);
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn test_top_k_ties_keep_first_seen() {
        let c = counter(&[("a", 2), ("b", 3), ("c", 2), ("d", 1)]);
        let ranked: Vec<String> = top_k(&c, 3).iter().map(|e| e.pattern_type.to_string()).collect();
        assert_eq!(ranked, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_merge_is_additive() {
        let mut a = counter(&[("x", 1), ("y", 4)]);
        a.merge(&counter(&[("y", 1), ("z", 2)]));
        assert_eq!(a.get(&pt("y")), 5);
        assert_eq!(a.iter().map(|(p, _)| p.to_string()).collect::<Vec<_>>(), vec!["x", "y", "z"]);
    }

    #[test]
    fn test_benchmark_contains_and_seed_counter() {
        let b = Benchmark::from_counter(&counter(&[("mix", 1), ("expansion level 1", 7)]), 15);
        assert!(b.contains(&pt("mix")));
        assert!(!b.contains(&pt("jump")));
        let seeded = b.to_counter();
        assert_eq!(seeded.iter().next().map(|(p, s)| (p.to_string(), s)), Some(("expansion level 1".to_string(), 7)));
    }

    #[test]
    fn test_persist_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = BenchmarkStore::for_game(dir.path(), "NCD");
        let b = Benchmark::from_counter(&counter(&[("mix", 3), ("jump", 5)]), 15);
        store.persist(&b).unwrap();
        assert!(store.path().ends_with("NCD_benchmark_patterns.json"));

        let loaded = store.load().unwrap();
        assert_eq!(loaded, b);
    }

    #[test]
    fn test_load_legacy_flat_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = BenchmarkStore::new(dir.path().join("legacy.json"));
        std::fs::write(store.path(), r#"["expansion level 1", "near-match 2-digit prefix"]"#).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(loaded.entries().iter().all(|e| e.score == 1));
        assert_eq!(loaded.patterns()[0].as_str(), "expansion level 1");
    }

    #[test]
    fn test_load_collapses_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let store = BenchmarkStore::new(dir.path().join("dup.json"));
        std::fs::write(
            store.path(),
            r#"[{"pattern_type": "mix", "score": 2}, {"pattern_type": "jump", "score": 3}, "mix"]"#,
        ).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.entries()[0].score, 3);
        assert_eq!(loaded.entries()[1].pattern_type.as_str(), "jump");
    }

    #[test]
    fn test_load_absent_or_corrupt_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let missing = BenchmarkStore::new(dir.path().join("missing.json"));
        assert!(missing.load().is_none());

        let corrupt = BenchmarkStore::new(dir.path().join("corrupt.json"));
        std::fs::write(corrupt.path(), "{not json").unwrap();
        assert!(corrupt.load().is_none());

        let empty = BenchmarkStore::new(dir.path().join("empty.json"));
        std::fs::write(empty.path(), "[]").unwrap();
        assert!(empty.load().is_none());

        let wrong_shape = BenchmarkStore::new(dir.path().join("object.json"));
        std::fs::write(wrong_shape.path(), r#"{"mix": 3}"#).unwrap();
        assert!(wrong_shape.load().is_none());
    }
}
