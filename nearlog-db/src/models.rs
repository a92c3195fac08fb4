use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

pub const CODE_WIDTH: usize = 4;
pub const CODE_SPACE: usize = 10_000;

/// Résultat à 4 chiffres. Chaque chiffre est dans 0..=9, les zéros de tête sont conservés.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Code([u8; CODE_WIDTH]);

impl Code {
    /// Construit un code à partir de chiffres déjà validés. Retourne None si un chiffre dépasse 9.
    pub fn from_digits(digits: [u8; CODE_WIDTH]) -> Option<Code> {
        if digits.iter().all(|&d| d <= 9) {
            Some(Code(digits))
        } else {
            None
        }
    }

    /// Normalise une saisie brute : trim, 1 à 4 chiffres ASCII, complétée à gauche par des zéros.
    pub fn normalize(raw: &str) -> Result<Code> {
        let s = raw.trim();
        if s.is_empty() {
            bail!("Code vide");
        }
        if s.len() > CODE_WIDTH {
            bail!("Code '{}' trop long ({} caractères, maximum {})", s, s.len(), CODE_WIDTH);
        }
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            bail!("Code '{}' contient des caractères non numériques", s);
        }
        let mut digits = [0u8; CODE_WIDTH];
        let offset = CODE_WIDTH - s.len();
        for (i, b) in s.bytes().enumerate() {
            digits[offset + i] = b - b'0';
        }
        Ok(Code(digits))
    }

    /// 0..=9999 -> code, None hors plage.
    pub fn from_value(value: i64) -> Option<Code> {
        if !(0..CODE_SPACE as i64).contains(&value) {
            return None;
        }
        let mut v = value as u16;
        let mut digits = [0u8; CODE_WIDTH];
        for slot in digits.iter_mut().rev() {
            *slot = (v % 10) as u8;
            v /= 10;
        }
        Some(Code(digits))
    }

    pub fn digits(&self) -> [u8; CODE_WIDTH] {
        self.0
    }

    pub fn value(&self) -> u16 {
        self.0.iter().fold(0u16, |acc, &d| acc * 10 + d as u16)
    }

    /// Sous-chaîne `[start, start + len)` des chiffres.
    pub fn window(&self, start: usize, len: usize) -> &[u8] {
        &self.0[start..start + len]
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for d in self.0 {
            write!(f, "{}", d)?;
        }
        Ok(())
    }
}

impl FromStr for Code {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Code::normalize(s)
    }
}

impl TryFrom<String> for Code {
    type Error = anyhow::Error;

    fn try_from(s: String) -> Result<Self> {
        Code::normalize(&s)
    }
}

impl From<Code> for String {
    fn from(code: Code) -> String {
        code.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoricalRecord {
    pub period: i64,
    pub code: Code,
}

impl HistoricalRecord {
    pub fn new(period: i64, code: Code) -> Self {
        Self { period, code }
    }

    pub fn parse(period: i64, raw_code: &str) -> Result<Self> {
        Ok(Self {
            period,
            code: Code::normalize(raw_code)?,
        })
    }
}

/// Ligne écartée lors du chargement : la période et la raison.
#[derive(Debug, Clone)]
pub struct RejectedRecord {
    pub period: i64,
    pub raw: String,
    pub reason: String,
}

/// Construit un historique ordonné par période à partir de lignes brutes.
/// Une ligne invalide est écartée sans interrompre le reste.
pub fn build_history<I, S>(rows: I) -> (Vec<HistoricalRecord>, Vec<RejectedRecord>)
where
    I: IntoIterator<Item = (i64, S)>,
    S: AsRef<str>,
{
    let mut records = Vec::new();
    let mut rejected = Vec::new();

    for (period, raw) in rows {
        match HistoricalRecord::parse(period, raw.as_ref()) {
            Ok(record) => records.push(record),
            Err(e) => {
                log::warn!("Période {} écartée : {}", period, e);
                rejected.push(RejectedRecord {
                    period,
                    raw: raw.as_ref().to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }

    records.sort_by_key(|r| r.period);
    (records, rejected)
}

/// Historique déterministe pour les tests : codes dérivés de l'index, périodes 1..=n.
pub fn make_test_history(n: usize) -> Vec<HistoricalRecord> {
    (0..n)
        .map(|i| {
            let value = ((i * 1237 + 481) % CODE_SPACE) as i64;
            HistoricalRecord {
                period: i as i64 + 1,
                code: Code::from_value(value).unwrap_or(Code([0; CODE_WIDTH])),
            }
        })
        .collect()
}
