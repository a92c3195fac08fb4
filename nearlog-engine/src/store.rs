use std::collections::HashMap;

use nearlog_db::models::Code;

use crate::provenance::{PatternType, Provenance};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub code: Code,
    pub provenance: Provenance,
}

impl Candidate {
    pub fn pattern_type(&self) -> PatternType {
        self.provenance.pattern_type()
    }
}

/// Ensemble ordonné de candidats, indexé par code.
///
/// Politique d'insertion : le premier écrivain gagne. `add` sur un code déjà présent ne
/// fait rien et la provenance d'origine est conservée, même si la nouvelle est plus
/// spécifique. Les scores du benchmark dépendent de cette règle.
///
/// L'itération suit l'ordre d'insertion.
#[derive(Debug, Clone, Default)]
pub struct CandidateStore {
    entries: Vec<Candidate>,
    index: HashMap<Code, usize>,
}

impl CandidateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
        }
    }

    /// Retourne `true` si le code était absent et a été ajouté.
    pub fn add(&mut self, code: Code, provenance: Provenance) -> bool {
        if self.index.contains_key(&code) {
            return false;
        }
        self.index.insert(code, self.entries.len());
        self.entries.push(Candidate { code, provenance });
        true
    }

    /// Applique `add` à chaque entrée de `other`, dans son ordre.
    pub fn merge(&mut self, other: CandidateStore) -> usize {
        let mut added = 0;
        for candidate in other.entries {
            if self.add(candidate.code, candidate.provenance) {
                added += 1;
            }
        }
        added
    }

    pub fn contains(&self, code: &Code) -> bool {
        self.index.contains_key(code)
    }

    pub fn get(&self, code: &Code) -> Option<&Provenance> {
        self.index.get(code).map(|&i| &self.entries[i].provenance)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candidate> {
        self.entries.iter()
    }

    pub fn codes(&self) -> Vec<Code> {
        self.entries.iter().map(|c| c.code).collect()
    }

    /// Vue « raw » : tous les candidats triés par code.
    pub fn sorted_by_code(&self) -> Vec<&Candidate> {
        let mut sorted: Vec<&Candidate> = self.entries.iter().collect();
        sorted.sort_by_key(|c| c.code);
        sorted
    }

    pub fn into_candidates(self) -> Vec<Candidate> {
        self.entries
    }
}

impl Extend<(Code, Provenance)> for CandidateStore {
    fn extend<T: IntoIterator<Item = (Code, Provenance)>>(&mut self, iter: T) {
        for (code, provenance) in iter {
            self.add(code, provenance);
        }
    }
}

impl FromIterator<(Code, Provenance)> for CandidateStore {
    fn from_iter<T: IntoIterator<Item = (Code, Provenance)>>(iter: T) -> Self {
        let mut store = CandidateStore::new();
        store.extend(iter);
        store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(s: &str) -> Code {
        Code::normalize(s).unwrap()
    }

    fn mix(s: &str) -> Provenance {
        Provenance::Mix { source: code(s) }
    }

    #[test]
    fn test_add_first_writer_wins() {
        let mut store = CandidateStore::new();
        assert!(store.add(code("1234"), mix("4321")));
        assert!(!store.add(code("1234"), Provenance::Jump { delta: 3 }));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&code("1234")), Some(&mix("4321")));
    }

    #[test]
    fn test_insertion_order() {
        let store: CandidateStore = vec![
            (code("9000"), mix("0009")),
            (code("0001"), mix("1000")),
            (code("5000"), mix("0005")),
        ]
        .into_iter()
        .collect();
        let codes: Vec<String> = store.iter().map(|c| c.code.to_string()).collect();
        assert_eq!(codes, vec!["9000", "0001", "5000"]);

        let sorted: Vec<String> = store.sorted_by_code().iter().map(|c| c.code.to_string()).collect();
        assert_eq!(sorted, vec!["0001", "5000", "9000"]);
    }

    #[test]
    fn test_merge_preserves_first_seen() {
        let mut a = CandidateStore::new();
        a.add(code("1111"), mix("1111"));
        a.add(code("2222"), mix("2222"));

        let mut b = CandidateStore::new();
        b.add(code("2222"), Provenance::Jump { delta: 1 });
        b.add(code("3333"), Provenance::Jump { delta: 2 });

        let added = a.merge(b);
        assert_eq!(added, 1);
        assert_eq!(a.len(), 3);
        assert_eq!(a.get(&code("2222")), Some(&mix("2222")));
        assert_eq!(a.codes().last().map(|c| c.to_string()), Some("3333".to_string()));
    }

    #[test]
    fn test_contains_and_empty() {
        let mut store = CandidateStore::with_capacity(4);
        assert!(store.is_empty());
        store.add(code("0000"), mix("0000"));
        assert!(store.contains(&code("0000")));
        assert!(!store.contains(&code("0001")));
    }
}
