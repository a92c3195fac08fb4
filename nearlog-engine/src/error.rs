use thiserror::Error;

/// Préconditions que l'appelant doit pouvoir distinguer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("Historique insuffisant : {found} entrée(s), au moins {required} requises")]
    InsufficientHistory { found: usize, required: usize },

    #[error("Configuration invalide : {0}")]
    InvalidConfig(String),
}

pub const MIN_HISTORY: usize = 2;

pub fn require_history(len: usize) -> Result<(), EngineError> {
    if len < MIN_HISTORY {
        return Err(EngineError::InsufficientHistory { found: len, required: MIN_HISTORY });
    }
    Ok(())
}
