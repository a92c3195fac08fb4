use nearlog_db::models::HistoricalRecord;

use crate::benchmark::Benchmark;
use crate::expansion::ExpansionReport;
use crate::pipeline::Generation;
use crate::store::Candidate;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedCandidate {
    pub candidate: Candidate,
    /// Le type de motif figure dans le classement benchmark courant.
    pub benchmark: bool,
}

impl RankedCandidate {
    pub fn render_line(&self) -> String {
        let mut line = format!("{} --> {}", self.candidate.code, self.candidate.provenance);
        if self.benchmark {
            line.push_str(" [BENCHMARK]");
        }
        line
    }
}

/// Réordonne les candidats : ceux dont le type est dans le benchmark d'abord, les autres
/// ensuite, l'ordre relatif étant conservé dans chaque groupe.
pub fn prioritize(candidates: Vec<Candidate>, benchmark: &Benchmark) -> Vec<RankedCandidate> {
    let (mut first, rest): (Vec<RankedCandidate>, Vec<RankedCandidate>) = candidates
        .into_iter()
        .map(|candidate| {
            let benchmark = benchmark.contains(&candidate.pattern_type());
            RankedCandidate { candidate, benchmark }
        })
        .partition(|r| r.benchmark);
    first.extend(rest);
    first
}

/// Liste finale de la prédiction.
#[derive(Debug, Clone)]
pub struct FinalCandidates {
    entries: Vec<RankedCandidate>,
    pub report: ExpansionReport,
    pub seed_size: usize,
    /// Dernier tirage connu, utilisé comme référence.
    pub reference: Option<HistoricalRecord>,
}

impl FinalCandidates {
    /// Garde les `count` premiers candidats dans l'ordre d'insertion, puis les réordonne
    /// selon le benchmark. La sortie est toujours une permutation de ce préfixe.
    pub fn build(generation: Generation, benchmark: &Benchmark, count: usize) -> Self {
        let mut candidates = generation.candidates.into_candidates();
        candidates.truncate(count);
        Self {
            entries: prioritize(candidates, benchmark),
            report: generation.report,
            seed_size: generation.seed_size,
            reference: None,
        }
    }

    /// Vue priorisée.
    pub fn entries(&self) -> &[RankedCandidate] {
        &self.entries
    }

    /// Vue « raw » : mêmes candidats, triés par code.
    pub fn raw_sorted(&self) -> Vec<&RankedCandidate> {
        let mut sorted: Vec<&RankedCandidate> = self.entries.iter().collect();
        sorted.sort_by_key(|r| r.candidate.code);
        sorted
    }

    pub fn benchmark_count(&self) -> usize {
        self.entries.iter().filter(|r| r.benchmark).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn render_lines(&self) -> Vec<String> {
        self.entries.iter().map(RankedCandidate::render_line).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmark::PatternCounter;
    use crate::expansion::StopReason;
    use crate::provenance::{PatternType, Position, Provenance, Width};
    use nearlog_db::models::Code;

    fn code(s: &str) -> Code {
        Code::normalize(s).unwrap()
    }

    fn candidates() -> Vec<Candidate> {
        vec![
            Candidate { code: code("5000"), provenance: Provenance::Mix { source: code("0050") } },
            Candidate {
                code: code("1234"),
                provenance: Provenance::NearMatch { width: Width::Two, position: Position::Prefix, pattern: "12".into() },
            },
            Candidate { code: code("0001"), provenance: Provenance::Mix { source: code("0100") } },
            Candidate { code: code("0777"), provenance: Provenance::DigitExpansion { level: 1, source: code("0778") } },
        ]
    }

    fn benchmark(types: &[&str]) -> Benchmark {
        let mut counter = PatternCounter::new();
        for t in types {
            counter.increment(&PatternType::new(*t));
        }
        Benchmark::from_counter(&counter, 15)
    }

    #[test]
    fn test_prioritize_is_stable_partition() {
        let ranked = prioritize(candidates(), &benchmark(&["mix"]));
        let codes: Vec<String> = ranked.iter().map(|r| r.candidate.code.to_string()).collect();
        assert_eq!(codes, vec!["5000", "0001", "1234", "0777"]);
        assert!(ranked[0].benchmark && ranked[1].benchmark);
        assert!(!ranked[2].benchmark);
    }

    #[test]
    fn test_prioritize_empty_benchmark_keeps_order() {
        let ranked = prioritize(candidates(), &Benchmark::default());
        let codes: Vec<String> = ranked.iter().map(|r| r.candidate.code.to_string()).collect();
        assert_eq!(codes, vec!["5000", "1234", "0001", "0777"]);
        assert!(ranked.iter().all(|r| !r.benchmark));
    }

    fn generation(candidates: Vec<Candidate>) -> Generation {
        let report = ExpansionReport {
            target: candidates.len(),
            achieved: candidates.len(),
            levels_run: 0,
            level_sizes: Vec::new(),
            stop: StopReason::TargetReached,
        };
        Generation {
            seed_size: candidates.len(),
            candidates: candidates.into_iter().map(|c| (c.code, c.provenance)).collect(),
            report,
        }
    }

    #[test]
    fn test_build_truncates_before_prioritizing() {
        let output = FinalCandidates::build(generation(candidates()), &benchmark(&["expansion level 1"]), 2);
        let codes: Vec<String> = output.entries().iter().map(|r| r.candidate.code.to_string()).collect();
        // 0777 est au benchmark mais hors des 2 premiers : il n'est pas repêché
        assert_eq!(codes, vec!["5000", "1234"]);
        assert_eq!(output.benchmark_count(), 0);

        let output = FinalCandidates::build(generation(candidates()), &benchmark(&["mix"]), 2);
        let codes: Vec<String> = output.entries().iter().map(|r| r.candidate.code.to_string()).collect();
        assert_eq!(codes, vec!["5000", "1234"]);
        assert_eq!(output.benchmark_count(), 1);
    }

    #[test]
    fn test_raw_sorted_same_codes_by_code() {
        let output = FinalCandidates::build(generation(candidates()), &benchmark(&["mix"]), 10);
        let prioritized: Vec<String> = output.entries().iter().map(|r| r.candidate.code.to_string()).collect();
        assert_eq!(prioritized, vec!["5000", "0001", "1234", "0777"]);

        let raw: Vec<String> = output.raw_sorted().iter().map(|r| r.candidate.code.to_string()).collect();
        assert_eq!(raw, vec!["0001", "0777", "1234", "5000"]);
        assert!(output.raw_sorted()[0].benchmark);
        assert_eq!(output.len(), 4);
    }

    #[test]
    fn test_render_line() {
        let ranked = prioritize(candidates(), &benchmark(&["expansion level 1"]));
        assert_eq!(ranked[0].render_line(), "0777 --> expansion level 1 from 0778 [BENCHMARK]");
        assert_eq!(ranked[2].render_line(), "1234 --> near-match 2-digit prefix 12");
    }
}
