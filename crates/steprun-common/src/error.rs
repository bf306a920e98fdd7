//! Error types shared across steprun crates

use thiserror::Error;

/// Main error type for shared steprun utilities
#[derive(Debug, Error)]
pub enum Error {
    /// The cryptographically secure random source failed
    #[error("failed to generate cryptographically secure random bytes: RNG unavailable")]
    RandomSource,

    /// A Kubernetes resource quantity could not be parsed
    #[error("invalid quantity '{quantity}': {message}")]
    InvalidQuantity {
        /// The quantity as written
        quantity: String,
        /// What is wrong with it
        message: String,
    },
}

impl Error {
    /// Create an invalid quantity error
    pub fn invalid_quantity(quantity: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidQuantity {
            quantity: quantity.into(),
            message: message.into(),
        }
    }
}
