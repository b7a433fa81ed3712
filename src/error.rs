use thiserror::Error;

/// Recoverable failures of the probability core. None of these abort the
/// process; callers surface them as "insufficient data" or a bad request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EdgeError {
    #[error("invalid odds: {0}")]
    InvalidOdds(String),

    #[error("argument outside (0, 1): {0}")]
    DomainError(f64),

    #[error("at least one leg is required to simulate a parlay")]
    EmptyLegSet,

    #[error("no baseline data for player {player_id}")]
    MissingBaseline { player_id: u32 },

    #[error("correlation matrix is not positive semi-definite (pivot {pivot:.6} at row {index})")]
    NonPositiveSemiDefinite { index: usize, pivot: f64 },

    #[error("leg `{id}` has an invalid {field}")]
    InvalidLeg { id: String, field: &'static str },

    #[error("signal `{name}` is not a finite number")]
    InvalidSignal { name: &'static str },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, EdgeError>;
