use thiserror::Error;

/// Errors surfaced by the diffusion engine.
///
/// `Configuration` is raised while building a compartmental graph or model,
/// never during stepping. `InvalidNetwork` is raised when a network breaks
/// the multiplex precondition, either up front in
/// `determine_initial_states` or as a fatal invariant check mid-step.
/// A coin flip that fails to trigger a transition is normal control flow,
/// not an error.
#[derive(Debug, Error)]
pub enum CascadeError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid network: {0}")]
    InvalidNetwork(String),
}

pub type Result<T> = std::result::Result<T, CascadeError>;
