use repute_types::Address;
use thiserror::Error;

/// Errors surfaced by the registry and its stores.
///
/// The state machine itself only fails on counter overflow; everything else
/// comes from persistence.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("rating counter for {address} cannot be incremented further")]
    RatingCountOverflow { address: Address },

    #[error("registry storage error: {0}")]
    Storage(String),

    #[error("registry snapshot encoding error: {0}")]
    Codec(String),
}
