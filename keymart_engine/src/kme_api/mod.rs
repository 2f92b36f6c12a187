//! # KeyMart payment engine public API
//!
//! The `kme_api` module exposes the programmatic API for the KeyMart payment engine.
//!
//! * [`payment_flow_api`] is the primary API for confirming payments in response to provider callbacks and IPN
//!   webhooks, and for driving key allocation.
//!
//! # API usage
//!
//! An API instance is created by supplying a database backend that implements the backend traits the API requires.
//!
//! ```rust,ignore
//! use keymart_engine::{PaymentFlowApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! // SqliteDatabase implements FulfilmentDatabase
//! let api = PaymentFlowApi::new(db, producers);
//! let result = api.confirm_payment(&adapter, "d34dB33f1234").await?;
//! ```
pub mod errors;
pub mod payment_flow_api;
