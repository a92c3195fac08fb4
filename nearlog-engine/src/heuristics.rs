use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use nearlog_db::models::{Code, HistoricalRecord};

use crate::provenance::Provenance;
use crate::store::CandidateStore;

/// Heuristiques secondaires appliquées après la recherche de correspondances proches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SecondaryHeuristic {
    /// Toutes les permutations de chaque trouvaille.
    Permutation,
    /// Cinq échanges de positions fixes de chaque trouvaille.
    Mix,
    /// Référence + chaque écart consécutif observé.
    Difference,
    /// Référence + les sauts les plus fréquents sur 1 à 3 périodes.
    Jump,
}

const JUMP_SPAN: usize = 3;
const TOP_JUMPS: usize = 10;

impl SecondaryHeuristic {
    /// Applique l'heuristique sur `store` (les trouvailles courantes) et retourne les
    /// nouveaux candidats, sans doublon avec `store` ni entre eux.
    pub fn apply(
        &self,
        store: &CandidateStore,
        history: &[HistoricalRecord],
        reference: Code,
    ) -> CandidateStore {
        let proposals: Vec<(Code, Provenance)> = match self {
            SecondaryHeuristic::Permutation => {
                let mut findings = store.codes();
                findings.sort();
                findings
                    .into_iter()
                    .flat_map(|source| {
                        permutations(source)
                            .into_iter()
                            .map(move |p| (p, Provenance::Permutation { source }))
                    })
                    .collect()
            }
            SecondaryHeuristic::Mix => store
                .codes()
                .into_iter()
                .flat_map(|source| {
                    mix_variations(source)
                        .into_iter()
                        .map(move |v| (v, Provenance::Mix { source }))
                })
                .collect(),
            SecondaryHeuristic::Difference => offset_candidates(reference, &consecutive_differences(history))
                .into_iter()
                .map(|(code, delta)| (code, Provenance::Difference { delta }))
                .collect(),
            SecondaryHeuristic::Jump => offset_candidates(reference, &frequent_jumps(history, JUMP_SPAN, TOP_JUMPS))
                .into_iter()
                .map(|(code, delta)| (code, Provenance::Jump { delta }))
                .collect(),
        };

        let mut fresh = CandidateStore::new();
        for (code, provenance) in proposals {
            if !store.contains(&code) {
                fresh.add(code, provenance);
            }
        }
        fresh
    }
}

/// Réarrangements distincts des chiffres de `code`, en ordre croissant, `code` exclu.
pub fn permutations(code: Code) -> Vec<Code> {
    let mut digits = code.digits();
    digits.sort();
    let mut out = Vec::new();
    loop {
        if let Some(c) = Code::from_digits(digits) {
            if c != code {
                out.push(c);
            }
        }
        if !next_permutation(&mut digits) {
            break;
        }
    }
    out
}

fn next_permutation(digits: &mut [u8]) -> bool {
    let n = digits.len();
    let Some(i) = (0..n - 1).rev().find(|&i| digits[i] < digits[i + 1]) else {
        return false;
    };
    let j = (i + 1..n).rev().find(|&j| digits[j] > digits[i]).unwrap_or(i + 1);
    digits.swap(i, j);
    digits[i + 1..].reverse();
    true
}

/// `abcd` -> `cdab`, `bcda`, `abdc`, `dcab`, `bacd`. Code d'origine et doublons exclus.
pub fn mix_variations(code: Code) -> Vec<Code> {
    let [a, b, c, d] = code.digits();
    let mut out: Vec<Code> = Vec::with_capacity(5);
    for digits in [[c, d, a, b], [b, c, d, a], [a, b, d, c], [d, c, a, b], [b, a, c, d]] {
        if let Some(v) = Code::from_digits(digits) {
            if v != code && !out.contains(&v) {
                out.push(v);
            }
        }
    }
    out
}

/// Écarts numériques entre codes consécutifs, distincts, dans l'ordre de première apparition.
pub fn consecutive_differences(history: &[HistoricalRecord]) -> Vec<i64> {
    let mut seen = Vec::new();
    for pair in history.windows(2) {
        let diff = pair[1].code.value() as i64 - pair[0].code.value() as i64;
        if !seen.contains(&diff) {
            seen.push(diff);
        }
    }
    seen
}

/// Sauts non nuls entre chaque code et les `span` précédents ; les `top` plus fréquents,
/// égalités départagées par première apparition.
pub fn frequent_jumps(history: &[HistoricalRecord], span: usize, top: usize) -> Vec<i64> {
    let mut counts: HashMap<i64, usize> = HashMap::new();
    let mut order: Vec<i64> = Vec::new();

    for i in 0..history.len() {
        for j in 1..=span {
            if i < j {
                break;
            }
            let diff = history[i].code.value() as i64 - history[i - j].code.value() as i64;
            if diff == 0 {
                continue;
            }
            let count = counts.entry(diff).or_insert(0);
            if *count == 0 {
                order.push(diff);
            }
            *count += 1;
        }
    }

    // Tri stable : à égalité, l'ordre de première apparition est conservé.
    order.sort_by(|a, b| counts[b].cmp(&counts[a]));
    order.truncate(top);
    order
}

fn offset_candidates(reference: Code, deltas: &[i64]) -> Vec<(Code, i64)> {
    deltas
        .iter()
        .filter_map(|&delta| Code::from_value(reference.value() as i64 + delta).map(|c| (c, delta)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(s: &str) -> Code {
        Code::normalize(s).unwrap()
    }

    fn strings(codes: &[Code]) -> Vec<String> {
        codes.iter().map(|c| c.to_string()).collect()
    }

    fn history(codes: &[&str]) -> Vec<HistoricalRecord> {
        codes
            .iter()
            .enumerate()
            .map(|(i, c)| HistoricalRecord::parse(i as i64 + 1, c).unwrap())
            .collect()
    }

    #[test]
    fn test_permutations_distinct_sorted() {
        let perms = permutations(code("1123"));
        // 4!/2! = 12 réarrangements, moins l'original
        assert_eq!(perms.len(), 11);
        assert!(perms.windows(2).all(|w| w[0] < w[1]));
        assert!(!perms.contains(&code("1123")));
        assert!(perms.contains(&code("3211")));
    }

    #[test]
    fn test_permutations_of_repdigit() {
        assert!(permutations(code("7777")).is_empty());
    }

    #[test]
    fn test_mix_variations() {
        assert_eq!(strings(&mix_variations(code("1234"))), vec!["3412", "2341", "1243", "4312", "2134"]);
        // 1122 -> 2211, 1221, 1122(orig), 2211(dup), 1122(orig)
        assert_eq!(strings(&mix_variations(code("1122"))), vec!["2211", "1221"]);
    }

    #[test]
    fn test_consecutive_differences() {
        let h = history(&["1000", "1100", "1000", "1100", "0900"]);
        assert_eq!(consecutive_differences(&h), vec![100, -100, -200]);
    }

    #[test]
    fn test_frequent_jumps_ties_first_seen() {
        let h = history(&["0010", "0020", "0030"]);
        // i=1: +10 ; i=2: +10, +20
        assert_eq!(frequent_jumps(&h, 3, 10), vec![10, 20]);
        assert_eq!(frequent_jumps(&h, 3, 1), vec![10]);
    }

    #[test]
    fn test_apply_difference_drops_out_of_range() {
        let h = history(&["9990", "0000", "9999"]);
        let store = CandidateStore::new();
        let fresh = SecondaryHeuristic::Difference.apply(&store, &h, code("0005"));
        // écarts -9990 et +9999 : les deux sortent de 0..=9999
        assert!(fresh.is_empty());

        let fresh = SecondaryHeuristic::Difference.apply(&store, &h, code("9990"));
        let codes: Vec<String> = fresh.iter().map(|c| c.code.to_string()).collect();
        assert_eq!(codes, vec!["0000"]);
        assert_eq!(fresh.iter().next().unwrap().provenance.to_string(), "difference -9990");
    }

    #[test]
    fn test_apply_mix_skips_existing() {
        let mut store = CandidateStore::new();
        store.add(code("1234"), Provenance::Jump { delta: 1 });
        store.add(code("3412"), Provenance::Jump { delta: 2 });
        let fresh = SecondaryHeuristic::Mix.apply(&store, &[], code("1234"));
        assert!(!fresh.contains(&code("3412")));
        assert!(!fresh.contains(&code("1234")));
        assert_eq!(fresh.get(&code("2341")).map(|p| p.to_string()), Some("mix of 1234".to_string()));
    }
}
