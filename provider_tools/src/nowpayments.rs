use std::{str::FromStr, sync::Arc};

use keymart_engine::{
    db_types::PaymentMethod,
    traits::{ProviderVerification, VerificationError, VerificationOutcome},
};
use km_common::{Money, USD_CURRENCY_CODE};
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::{config::NowPaymentsConfig, error::ProviderApiError};

/// Client for the NOWPayments REST API. Crypto settlement is asynchronous; NOWPayments re-delivers IPN callbacks
/// until we acknowledge, and each delivery triggers a fresh verification through this client.
#[derive(Clone)]
pub struct NowPaymentsApi {
    config: NowPaymentsConfig,
    client: Arc<Client>,
}

/// A hosted invoice page. The buyer picks their coin and pays at `invoice_url`.
#[derive(Debug, Clone, Deserialize)]
pub struct NowPaymentsInvoice {
    pub id: String,
    pub invoice_url: String,
}

#[derive(Debug, Deserialize)]
struct PaymentStatusResponse {
    payment_status: String,
    price_amount: Value,
}

impl NowPaymentsApi {
    pub fn new(config: NowPaymentsConfig) -> Result<Self, ProviderApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        let val = HeaderValue::from_str(config.api_key.reveal())
            .map_err(|e| ProviderApiError::Initialization(e.to_string()))?;
        headers.insert("x-api-key", val);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| ProviderApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    /// Creates a hosted invoice for the payment. The payment reference travels in `order_id`, so IPN callbacks can
    /// be correlated with the payment record.
    pub async fn create_invoice(
        &self,
        reference: &str,
        amount: Money,
        description: &str,
    ) -> Result<NowPaymentsInvoice, ProviderApiError> {
        let body = serde_json::json!({
            "price_amount": format!("{}.{:02}", amount.cents() / 100, amount.cents() % 100),
            "price_currency": USD_CURRENCY_CODE,
            "order_id": reference,
            "order_description": description,
            "ipn_callback_url": self.config.ipn_callback_url,
            "success_url": self.config.success_url,
            "cancel_url": self.config.cancel_url,
        });
        debug!("🪙️ Creating NOWPayments invoice for payment {reference}");
        self.rest_query(Method::POST, "/invoice", Some(body)).await
    }

    async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> Result<T, ProviderApiError> {
        let url = self.url(path);
        trace!("🪙️ Sending REST query: {url}");
        let mut req = self.client.request(method, url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| ProviderApiError::RestResponseError(e.to_string()))?;
        if response.status().is_success() {
            response.json::<T>().await.map_err(|e| ProviderApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| ProviderApiError::RestResponseError(e.to_string()))?;
            Err(ProviderApiError::QueryError { status, message })
        }
    }
}

impl ProviderVerification for NowPaymentsApi {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::NowPayments
    }

    async fn verify(&self, reference: &str) -> Result<VerificationOutcome, VerificationError> {
        let path = format!("/payment/{reference}");
        debug!("🪙️ Checking NOWPayments status for payment {reference}");
        let response: PaymentStatusResponse = self
            .rest_query(Method::GET, &path, None::<()>)
            .await
            .map_err(|e| VerificationError::ProviderUnavailable(e.to_string()))?;
        interpret_status(response)
    }
}

fn interpret_status(response: PaymentStatusResponse) -> Result<VerificationOutcome, VerificationError> {
    let outcome = match response.payment_status.as_str() {
        "confirmed" | "finished" => {
            let amount = money_from_value(&response.price_amount)?;
            VerificationOutcome::Verified { amount }
        },
        "failed" | "refunded" | "expired" => {
            VerificationOutcome::Failed { reason: format!("Payment is {}", response.payment_status) }
        },
        // "waiting", "confirming", "sending", "partially_paid" all still settle or resolve.
        _ => VerificationOutcome::Pending,
    };
    Ok(outcome)
}

/// NOWPayments serialises `price_amount` as a bare number in some responses and a string in others.
fn money_from_value(value: &Value) -> Result<Money, VerificationError> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        other => return Err(VerificationError::InvalidResponse(format!("Unexpected price_amount: {other}"))),
    };
    Money::from_str(&text).map_err(|e| VerificationError::InvalidResponse(e.to_string()))
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse(json: &str) -> PaymentStatusResponse {
        serde_json::from_str(json).expect("Invalid test fixture")
    }

    #[test]
    fn confirmed_payment_is_verified() {
        let response = parse(r#"{ "payment_status": "confirmed", "price_amount": 19.99 }"#);
        let outcome = interpret_status(response).unwrap();
        assert_eq!(outcome, VerificationOutcome::Verified { amount: Money::from_cents(1999) });
    }

    #[test]
    fn string_amounts_parse_too() {
        let response = parse(r#"{ "payment_status": "finished", "price_amount": "120.50" }"#);
        let outcome = interpret_status(response).unwrap();
        assert_eq!(outcome, VerificationOutcome::Verified { amount: Money::from_cents(12_050) });
    }

    #[test]
    fn waiting_payment_is_pending() {
        let response = parse(r#"{ "payment_status": "waiting", "price_amount": 19.99 }"#);
        assert_eq!(interpret_status(response).unwrap(), VerificationOutcome::Pending);
    }

    #[test]
    fn partially_paid_is_pending() {
        let response = parse(r#"{ "payment_status": "partially_paid", "price_amount": 19.99 }"#);
        assert_eq!(interpret_status(response).unwrap(), VerificationOutcome::Pending);
    }

    #[test]
    fn expired_payment_fails() {
        let response = parse(r#"{ "payment_status": "expired", "price_amount": 19.99 }"#);
        let outcome = interpret_status(response).unwrap();
        assert_eq!(outcome, VerificationOutcome::Failed { reason: "Payment is expired".to_string() });
    }
}
