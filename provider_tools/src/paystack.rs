use std::sync::Arc;

use keymart_engine::{
    db_types::PaymentMethod,
    traits::{ProviderVerification, VerificationError, VerificationOutcome},
};
use km_common::Money;
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{config::PaystackConfig, error::ProviderApiError};

/// Client for the Paystack REST API. Card payments settle synchronously, so verification is a single round trip
/// made from the redirect callback.
///
/// Paystack reports amounts in kobo, which are hundredths of the base currency unit, the same scale [`Money`] uses.
#[derive(Clone)]
pub struct PaystackApi {
    config: PaystackConfig,
    client: Arc<Client>,
}

/// The hosted checkout page returned by `initialize_transaction`. The buyer is redirected to `authorization_url`.
#[derive(Debug, Clone, Deserialize)]
pub struct PaystackCheckout {
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
}

#[derive(Debug, Deserialize)]
struct PaystackResponse<T> {
    status: bool,
    message: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    status: String,
    amount: i64,
    gateway_response: Option<String>,
}

impl PaystackApi {
    pub fn new(config: PaystackConfig) -> Result<Self, ProviderApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        let bearer = format!("Bearer {}", config.secret_key.reveal());
        let val = HeaderValue::from_str(&bearer).map_err(|e| ProviderApiError::Initialization(e.to_string()))?;
        headers.insert("Authorization", val);
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

    /// Creates a hosted checkout page for the payment. Paystack will redirect the buyer to the configured callback
    /// URL, with the reference appended, once they complete (or abandon) the card flow.
    pub async fn initialize_transaction(
        &self,
        email: &str,
        amount: Money,
        reference: &str,
    ) -> Result<PaystackCheckout, ProviderApiError> {
        let callback_url = format!("{}/{reference}", self.config.callback_url);
        let body = serde_json::json!({
            "email": email,
            "amount": amount.cents(),
            "reference": reference,
            "callback_url": callback_url,
        });
        debug!("💳️ Initializing Paystack transaction {reference}");
        let response: PaystackResponse<PaystackCheckout> =
            self.rest_query(Method::POST, "/transaction/initialize", Some(body)).await?;
        if !response.status {
            let message = response.message.unwrap_or_else(|| "No error message given".to_string());
            return Err(ProviderApiError::QueryError { status: 200, message });
        }
        response.data.ok_or_else(|| ProviderApiError::JsonError("Checkout response carried no data".to_string()))
    }

    async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> Result<T, ProviderApiError> {
        let url = self.url(path);
        trace!("💳️ Sending REST query: {url}");
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

impl ProviderVerification for PaystackApi {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::Paystack
    }

    async fn verify(&self, reference: &str) -> Result<VerificationOutcome, VerificationError> {
        let path = format!("/transaction/verify/{reference}");
        debug!("💳️ Verifying Paystack transaction {reference}");
        let response: PaystackResponse<VerifyData> =
            self.rest_query(Method::GET, &path, None::<()>).await.map_err(as_verification_error)?;
        interpret_verification(response)
    }
}

fn as_verification_error(e: ProviderApiError) -> VerificationError {
    match e {
        ProviderApiError::QueryError { status, message } if status < 500 => {
            VerificationError::InvalidResponse(format!("Error {status}. {message}"))
        },
        other => VerificationError::ProviderUnavailable(other.to_string()),
    }
}

fn interpret_verification(response: PaystackResponse<VerifyData>) -> Result<VerificationOutcome, VerificationError> {
    if !response.status {
        let reason = response.message.unwrap_or_else(|| "Paystack rejected the verification".to_string());
        return Ok(VerificationOutcome::Failed { reason });
    }
    let data = response
        .data
        .ok_or_else(|| VerificationError::InvalidResponse("Verification response carried no data".to_string()))?;
    let outcome = match data.status.as_str() {
        "success" => VerificationOutcome::Verified { amount: Money::from_cents(data.amount) },
        "failed" | "reversed" => {
            let reason = data.gateway_response.unwrap_or(data.status);
            VerificationOutcome::Failed { reason }
        },
        // "pending", "ongoing", "abandoned" and friends can all still settle.
        _ => VerificationOutcome::Pending,
    };
    Ok(outcome)
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse(json: &str) -> PaystackResponse<VerifyData> {
        serde_json::from_str(json).expect("Invalid test fixture")
    }

    #[test]
    fn successful_verification() {
        let response = parse(
            r#"{
                "status": true,
                "message": "Verification successful",
                "data": { "status": "success", "amount": 459900, "gateway_response": "Successful" }
            }"#,
        );
        let outcome = interpret_verification(response).unwrap();
        assert_eq!(outcome, VerificationOutcome::Verified { amount: Money::from_cents(459_900) });
    }

    #[test]
    fn declined_card() {
        let response = parse(
            r#"{
                "status": true,
                "message": "Verification successful",
                "data": { "status": "failed", "amount": 1000, "gateway_response": "Declined" }
            }"#,
        );
        let outcome = interpret_verification(response).unwrap();
        assert_eq!(outcome, VerificationOutcome::Failed { reason: "Declined".to_string() });
    }

    #[test]
    fn abandoned_checkout_is_pending() {
        let response = parse(
            r#"{
                "status": true,
                "message": "Verification successful",
                "data": { "status": "abandoned", "amount": 1000, "gateway_response": null }
            }"#,
        );
        let outcome = interpret_verification(response).unwrap();
        assert_eq!(outcome, VerificationOutcome::Pending);
    }

    #[test]
    fn unknown_reference() {
        let response = parse(r#"{ "status": false, "message": "Transaction reference not found", "data": null }"#);
        let outcome = interpret_verification(response).unwrap();
        assert_eq!(outcome, VerificationOutcome::Failed {
            reason: "Transaction reference not found".to_string()
        });
    }
}
