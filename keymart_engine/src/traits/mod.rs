//! # Database management and control.
//!
//! This module defines the interface contracts that payment engine database *backends* must implement.
//!
//! ## Fulfilment
//! A paid order is fulfilled by claiming unused license keys from each product's pool and attaching them to the
//! order's items. The [`FulfilmentDatabase`] trait provides the mechanisms for doing this exclusively and
//! idempotently, along with the surrounding order, product and payment bookkeeping.
//!
//! ## Verification
//! The [`ProviderVerification`] trait is the seam between the confirmation flow and the payment providers. Each
//! provider adapter implements it; the engine never talks to a provider directly.
mod data_objects;
mod fulfilment_database;
mod verification;

pub use data_objects::{AllocationReport, ItemAllocation};
pub use fulfilment_database::{FulfilmentDatabase, FulfilmentError};
pub use verification::{ProviderVerification, VerificationError, VerificationOutcome};
