//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause
//! the current worker to stop processing new requests. Any long, non-cpu-bound operation (I/O, database operations,
//! provider round trips) must be expressed as futures or asynchronous functions.
use actix_web::{get, post, web, HttpResponse, Responder};
use keymart_engine::{PaymentFlowApi, SqliteDatabase};
use log::*;
use provider_tools::{ExchangeRateApi, NowPaymentsApi, PaystackApi};

use crate::{
    data_objects::{CheckoutResponse, ConfirmationSummary, IpnPayload, PaystackCheckoutRequest},
    errors::ServerError,
};

type FlowApi = PaymentFlowApi<SqliteDatabase>;

#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

/// Route handler for starting a Paystack checkout.
///
/// Fetches (or creates) the payment record for the order and opens a hosted checkout page for it. The buyer is
/// redirected to the returned `checkout_url`; Paystack sends them back to `/paystack/verify/{reference}` afterwards.
#[post("/paystack/pay/{order_id}")]
pub async fn paystack_pay(
    path: web::Path<i64>,
    body: web::Json<PaystackCheckoutRequest>,
    api: web::Data<FlowApi>,
    paystack: web::Data<PaystackApi>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ Starting Paystack checkout for order {order_id}");
    let payment = api.payment_for_order(order_id).await?;
    let checkout = paystack.initialize_transaction(&body.email, payment.amount, &payment.reference).await?;
    info!("💻️ Paystack checkout open for order {order_id}, reference {}", payment.reference);
    Ok(HttpResponse::Ok()
        .json(CheckoutResponse { checkout_url: checkout.authorization_url, reference: payment.reference }))
}

/// Route handler for the Paystack redirect callback.
///
/// Runs the full confirmation flow: the reference is verified against Paystack's records, and on an exact amount
/// match the order is marked paid and keys are allocated. Safe to hit repeatedly.
#[get("/paystack/verify/{reference}")]
pub async fn paystack_verify(
    path: web::Path<String>,
    api: web::Data<FlowApi>,
    paystack: web::Data<PaystackApi>,
) -> Result<HttpResponse, ServerError> {
    let reference = path.into_inner();
    debug!("💻️ Verification callback for Paystack payment {reference}");
    let result = api.confirm_payment(paystack.get_ref(), &reference).await?;
    Ok(HttpResponse::Ok().json(ConfirmationSummary::from(result)))
}

/// Route handler for creating a NOWPayments invoice for an order.
#[post("/nowpayments/pay/{order_id}")]
pub async fn nowpayments_pay(
    path: web::Path<i64>,
    api: web::Data<FlowApi>,
    nowpayments: web::Data<NowPaymentsApi>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ Creating NOWPayments invoice for order {order_id}");
    let payment = api.payment_for_order(order_id).await?;
    let description = format!("KeyMart order #{order_id}");
    let invoice = nowpayments.create_invoice(&payment.reference, payment.amount, &description).await?;
    info!("💻️ NOWPayments invoice open for order {order_id}, reference {}", payment.reference);
    Ok(HttpResponse::Ok()
        .json(CheckoutResponse { checkout_url: invoice.invoice_url, reference: payment.reference }))
}

/// Route handler for the NOWPayments IPN webhook.
///
/// The payload's status fields are advisory only. The payment is re-verified against the NOWPayments API before any
/// state changes, so a forged or stale IPN can never mark an order paid. NOWPayments re-delivers the IPN until it
/// receives a 2xx, and every re-delivery is a safe no-op once the payment reaches a terminal state.
#[post("/nowpayments/ipn")]
pub async fn nowpayments_ipn(
    body: web::Json<IpnPayload>,
    api: web::Data<FlowApi>,
    nowpayments: web::Data<NowPaymentsApi>,
) -> Result<HttpResponse, ServerError> {
    let reference = body.order_id.clone();
    debug!("💻️ IPN delivery for payment {reference} (advisory status: {:?})", body.payment_status);
    let result = api.confirm_payment(nowpayments.get_ref(), &reference).await?;
    Ok(HttpResponse::Ok().json(ConfirmationSummary::from(result)))
}

/// Route handler for looking up the current exchange rate against the store's base currency. Storefronts use this
/// to display localised prices; the engine itself only ever deals in the base currency.
#[get("/exchange/{currency}")]
pub async fn exchange_rate(
    path: web::Path<String>,
    exchange: web::Data<ExchangeRateApi>,
) -> Result<HttpResponse, ServerError> {
    let currency = path.into_inner().to_uppercase();
    debug!("💻️ Exchange rate lookup for {currency}");
    let rates = exchange.fetch_rates().await?;
    let rate = rates.rate_for(&currency)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "base": rates.base_code,
        "currency": currency,
        "rate": rate,
    })))
}
