use deckhand_core::errors::ProviderError;

/// Infrastructure failures that abort a job. Quality problems never land
/// here; they become issues and warnings priced by the critic.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("manifest error: {0}")]
    Manifest(String),

    #[error("{0}")]
    Internal(String),
}
