use thiserror::Error;

use crate::traits::{FulfilmentError, VerificationError};

#[derive(Debug, Error)]
pub enum PaymentFlowError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] FulfilmentError),
    #[error("Provider verification error: {0}")]
    VerificationError(#[from] VerificationError),
    #[error("Payment {reference} was made through {expected}, but the callback came from {actual}")]
    ProviderMismatch { reference: String, expected: String, actual: String },
}
