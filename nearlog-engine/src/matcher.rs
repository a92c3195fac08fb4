use nearlog_db::models::{Code, HistoricalRecord};

use crate::provenance::{Position, Provenance, Width};
use crate::store::CandidateStore;

/// Recherche dans `history` tous les codes qui partagent avec `reference` la sous-séquence
/// de `width` chiffres à `position`, ainsi que leurs `window` voisins temporels de chaque côté
/// (bornés aux extrémités de la séquence).
///
/// Un code peut apparaître plusieurs fois dans le résultat ; c'est la destination qui
/// déduplique (voir `add_near_matches`).
pub fn find_near_matches(
    history: &[HistoricalRecord],
    reference: Code,
    position: Position,
    width: Width,
    window: usize,
) -> Vec<(Code, Provenance)> {
    let start = position.start(width);
    let pattern = reference.window(start, width.size());
    let provenance = Provenance::NearMatch {
        width,
        position,
        pattern: pattern.iter().map(|d| d.to_string()).collect(),
    };

    let mut found = Vec::new();
    for (idx, record) in history.iter().enumerate() {
        if record.code.window(start, width.size()) != pattern {
            continue;
        }
        let lo = idx.saturating_sub(window);
        let hi = (idx + window).min(history.len() - 1);
        for neighbour in &history[lo..=hi] {
            found.push((neighbour.code, provenance.clone()));
        }
    }
    found
}

/// Ajoute les correspondances dans `store`, premier écrivain gagnant. Retourne le nombre
/// de nouveaux codes.
pub fn add_near_matches(
    store: &mut CandidateStore,
    history: &[HistoricalRecord],
    reference: Code,
    position: Position,
    width: Width,
    window: usize,
) -> usize {
    let before = store.len();
    store.extend(find_near_matches(history, reference, position, width, window));
    store.len() - before
}

/// Balayage complet : largeurs {2, 3} × positions {prefix, middle, suffix}, dans cet ordre.
pub fn scan_all(
    store: &mut CandidateStore,
    history: &[HistoricalRecord],
    reference: Code,
    window: usize,
) -> usize {
    let mut added = 0;
    for width in Width::ALL {
        for position in Position::ALL {
            added += add_near_matches(store, history, reference, position, width, window);
        }
    }
    added
}
