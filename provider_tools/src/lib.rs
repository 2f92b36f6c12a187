//! Payment provider adapters for the KeyMart payment gateway.
//!
//! Each provider gets a thin client over its REST API plus an implementation of
//! [`keymart_engine::traits::ProviderVerification`], so the engine can verify payments without knowing anything about
//! the wire formats. Response parsing is kept in plain functions so it can be tested against canned JSON without a
//! network in sight.
mod config;
mod error;
mod exchange;
mod nowpayments;
mod paystack;

pub use config::{ExchangeRateConfig, NowPaymentsConfig, PaymentEnvironment, PaystackConfig};
pub use error::ProviderApiError;
pub use exchange::{ExchangeRateApi, ExchangeRates};
pub use nowpayments::{NowPaymentsApi, NowPaymentsInvoice};
pub use paystack::{PaystackApi, PaystackCheckout};
