use km_common::Money;
use thiserror::Error;

use crate::db_types::PaymentMethod;

/// What a provider had to say about a payment reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// The provider confirmed the payment and reported this settled amount. The engine, not the adapter, decides
    /// whether the amount is acceptable.
    Verified { amount: Money },
    /// The provider definitively rejected or abandoned the payment.
    Failed { reason: String },
    /// The provider has seen the payment but has not settled it yet. The caller should retry later.
    Pending,
}

#[derive(Debug, Error)]
pub enum VerificationError {
    /// The provider could not be reached, or returned a server-side error. The payment's state is unknown and the
    /// confirmation must be retried.
    #[error("Payment provider is unavailable: {0}")]
    ProviderUnavailable(String),
    /// The provider responded, but with a payload we could not interpret.
    #[error("Unintelligible response from payment provider: {0}")]
    InvalidResponse(String),
}

/// The seam between the confirmation flow and the payment providers.
///
/// Implementations must be read-only with respect to the payment: asking a provider about a reference must never
/// change anything on the provider's side, because the engine calls this on every webhook re-delivery.
#[allow(async_fn_in_trait)]
pub trait ProviderVerification {
    /// The payment method this adapter speaks for.
    fn method(&self) -> PaymentMethod;

    /// Ask the provider for the status of the payment with the given reference.
    async fn verify(&self, reference: &str) -> Result<VerificationOutcome, VerificationError>;
}
