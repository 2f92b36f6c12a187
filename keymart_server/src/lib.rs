//! # KeyMart server
//! This module hosts the HTTP gateway for the KeyMart payment engine. It is responsible for:
//! * Starting provider checkouts (Paystack hosted pages, NOWPayments invoices) for pending orders.
//! * Receiving redirect callbacks and IPN webhooks, and driving the payment confirmation flow.
//! * Forwarding engine events (completed purchases, key shortages, failed payments) to the notification sink.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/paystack/pay/{order_id}`: Starts a Paystack checkout for the order.
//! * `/paystack/verify/{reference}`: The redirect callback; verifies the payment and allocates keys.
//! * `/nowpayments/pay/{order_id}`: Creates a NOWPayments invoice for the order.
//! * `/nowpayments/ipn`: The IPN webhook; verifies the payment and allocates keys.
//! * `/exchange/{currency}`: Returns the current exchange rate against the store's base currency.
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod notifier;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
