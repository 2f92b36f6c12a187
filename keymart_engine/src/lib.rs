//! KeyMart Payment Engine
//!
//! The KeyMart payment engine is the core of a store that sells digital goods backed by pools of single-use license
//! keys. It owns the two flows with real correctness requirements:
//!
//! 1. **Payment confirmation** ([`PaymentFlowApi`]): a payment reference arrives from a provider callback or IPN
//!    webhook, the matching provider adapter is asked to verify it, and on an exact amount match the payment, order
//!    and key allocations are committed in a single transaction. Re-delivered webhooks are safe no-ops.
//! 2. **Key allocation**: a paid order claims unused keys from each product's pool, exclusively and idempotently,
//!    tolerating partial stock shortages. No key is ever issued twice, and stock never oversells.
//!
//! The library is divided into two main sections:
//! 1. Database management and control ([`mod@sqlite`]). SQLite is the supported backend; the schema and queries are
//!    written so that a Postgres backend can implement the same traits. You should never need to access the database
//!    directly. Instead, use the public API provided by the engine. The exception is the data types used in the
//!    database, which are defined in the [`db_types`] module and are public.
//! 2. The engine public API ([`mod@kme_api`]). Backends implement the traits in [`traits`] to drive it.
//!
//! The engine also emits events when purchases complete, when a key pool runs short, and when a payment fails
//! verification. A simple hook system ([`events`]) lets the hosting application subscribe to these and send
//! notifications.
pub mod db_types;
pub mod events;
pub mod helpers;
mod kme_api;
#[cfg(feature = "sqlite")]
mod sqlite;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use kme_api::{
    errors::PaymentFlowError,
    payment_flow_api::{ConfirmationResult, PaymentFlowApi},
};
