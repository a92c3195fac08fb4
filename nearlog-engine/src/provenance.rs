use std::fmt;

use serde::{Deserialize, Serialize};

use nearlog_db::models::Code;

/// Position de la sous-séquence recherchée dans un code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Position {
    Prefix,
    Middle,
    Suffix,
}

impl Position {
    pub const ALL: [Position; 3] = [Position::Prefix, Position::Middle, Position::Suffix];

    /// Index de départ de la sous-séquence de longueur `width` dans un code de 4 chiffres.
    pub fn start(&self, width: Width) -> usize {
        match self {
            Position::Prefix => 0,
            Position::Middle => 1,
            Position::Suffix => 4 - width.size(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Position::Prefix => "prefix",
            Position::Middle => "middle",
            Position::Suffix => "suffix",
        }
    }

    fn from_name(name: &str) -> Option<Position> {
        Position::ALL.into_iter().find(|p| p.name() == name)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Largeur de motif : 2 ou 3 chiffres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Width {
    Two,
    Three,
}

impl Width {
    pub const ALL: [Width; 2] = [Width::Two, Width::Three];

    pub fn size(&self) -> usize {
        match self {
            Width::Two => 2,
            Width::Three => 3,
        }
    }

    fn from_len(len: usize) -> Option<Width> {
        match len {
            2 => Some(Width::Two),
            3 => Some(Width::Three),
            _ => None,
        }
    }
}

/// Origine d'un candidat. Le libellé (`Display`) est la forme lisible qui est affichée ;
/// la catégorie (`pattern_type`) sert uniquement à l'agrégation du benchmark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provenance {
    NearMatch {
        width: Width,
        position: Position,
        pattern: String,
    },
    Permutation {
        source: Code,
    },
    Mix {
        source: Code,
    },
    Difference {
        delta: i64,
    },
    Jump {
        delta: i64,
    },
    /// Variante produit cartésien : delta signé appliqué à chaque position.
    CrossExpansion {
        level: u32,
        source: Code,
        deltas: [i8; 4],
    },
    /// Variante un-chiffre-à-la-fois : seulement la source et le niveau.
    DigitExpansion {
        level: u32,
        source: Code,
    },
}

impl Provenance {
    pub fn pattern_type(&self) -> PatternType {
        let name = match self {
            Provenance::NearMatch { width, position, .. } => {
                format!("near-match {}-digit {}", width.size(), position)
            }
            Provenance::Permutation { .. } => "permutation".to_string(),
            Provenance::Mix { .. } => "mix".to_string(),
            Provenance::Difference { .. } => "difference".to_string(),
            Provenance::Jump { .. } => "jump".to_string(),
            Provenance::CrossExpansion { level, .. } | Provenance::DigitExpansion { level, .. } => {
                format!("expansion level {}", level)
            }
        };
        PatternType(name)
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::NearMatch { width, position, pattern } => {
                write!(f, "near-match {}-digit {} {}", width.size(), position, pattern)
            }
            Provenance::Permutation { source } => write!(f, "permutation of {}", source),
            Provenance::Mix { source } => write!(f, "mix of {}", source),
            Provenance::Difference { delta } => write!(f, "difference {:+}", delta),
            Provenance::Jump { delta } => write!(f, "jump {:+}", delta),
            Provenance::CrossExpansion { level, source, deltas } => {
                let mods = deltas
                    .iter()
                    .map(|&d| if d == 0 { "0".to_string() } else { format!("{:+}", d) })
                    .collect::<Vec<_>>()
                    .join(",");
                write!(f, "expansion level {} from {} ({})", level, source, mods)
            }
            Provenance::DigitExpansion { level, source } => {
                write!(f, "expansion level {} from {}", level, source)
            }
        }
    }
}

/// Catégorie normalisée d'une provenance. Jamais utilisée comme identité d'un candidat.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatternType(String);

impl PatternType {
    pub fn new(name: impl Into<String>) -> Self {
        PatternType(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Normalise un libellé libre. Un libellé inconnu devient sa propre catégorie.
    pub fn from_label(label: &str) -> PatternType {
        let parts: Vec<&str> = label.split_whitespace().collect();
        match parts.as_slice() {
            ["expansion", "level", level, ..] => PatternType(format!("expansion level {}", level)),
            ["near-match", width, position, ..]
                if width
                    .strip_suffix("-digit")
                    .and_then(|w| w.parse::<usize>().ok())
                    .and_then(Width::from_len)
                    .is_some()
                    && Position::from_name(position).is_some() =>
            {
                PatternType(format!("near-match {} {}", width, position))
            }
            ["permutation", "of", ..] => PatternType("permutation".to_string()),
            ["mix", "of", ..] => PatternType("mix".to_string()),
            ["difference", ..] => PatternType("difference".to_string()),
            ["jump", ..] => PatternType("jump".to_string()),
            _ => PatternType(label.to_string()),
        }
    }
}

impl fmt::Display for PatternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
