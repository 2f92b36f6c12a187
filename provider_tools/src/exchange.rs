use std::{collections::HashMap, sync::Arc};

use km_common::Money;
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
};
use serde::Deserialize;

use crate::{config::ExchangeRateConfig, error::ProviderApiError};

/// Client for the exchange rate service. Prices are stored in USD; display prices in other currencies are derived
/// from the `conversion_rates` table this returns.
#[derive(Clone)]
pub struct ExchangeRateApi {
    config: ExchangeRateConfig,
    client: Arc<Client>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeRates {
    pub base_code: String,
    pub conversion_rates: HashMap<String, f64>,
}

impl ExchangeRates {
    pub fn rate_for(&self, currency: &str) -> Result<f64, ProviderApiError> {
        self.conversion_rates
            .get(currency)
            .copied()
            .ok_or_else(|| ProviderApiError::UnsupportedCurrency(currency.to_string()))
    }

    /// Converts a USD amount for display in the target currency, rounding to the nearest cent.
    pub fn convert(&self, amount: Money, currency: &str) -> Result<Money, ProviderApiError> {
        let rate = self.rate_for(currency)?;
        if !rate.is_finite() || rate <= 0.0 {
            return Err(ProviderApiError::InvalidCurrencyAmount(format!("Rate {rate} for {currency}")));
        }
        #[allow(clippy::cast_possible_truncation)]
        let cents = (amount.cents() as f64 * rate).round() as i64;
        Ok(Money::from_cents(cents))
    }
}

impl ExchangeRateApi {
    pub fn new(config: ExchangeRateConfig) -> Result<Self, ProviderApiError> {
        let mut headers = HeaderMap::with_capacity(1);
        let val = HeaderValue::from_str(config.api_key.reveal())
            .map_err(|e| ProviderApiError::Initialization(e.to_string()))?;
        headers.insert("apikey", val);
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| ProviderApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub async fn fetch_rates(&self) -> Result<ExchangeRates, ProviderApiError> {
        debug!("💱️ Fetching exchange rates");
        let response = self
            .client
            .get(&self.config.api_url)
            .send()
            .await
            .map_err(|e| ProviderApiError::RestResponseError(e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| ProviderApiError::RestResponseError(e.to_string()))?;
            return Err(ProviderApiError::QueryError { status, message });
        }
        let rates =
            response.json::<ExchangeRates>().await.map_err(|e| ProviderApiError::JsonError(e.to_string()))?;
        info!("💱️ Fetched {} exchange rates against {}", rates.conversion_rates.len(), rates.base_code);
        Ok(rates)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn fixture() -> ExchangeRates {
        serde_json::from_str(
            r#"{
                "base_code": "USD",
                "conversion_rates": { "USD": 1.0, "NGN": 1601.5, "EUR": 0.92 }
            }"#,
        )
        .expect("Invalid test fixture")
    }

    #[test]
    fn rates_parse_from_canned_response() {
        let rates = fixture();
        assert_eq!(rates.base_code, "USD");
        assert_eq!(rates.rate_for("NGN").unwrap(), 1601.5);
        assert!(matches!(rates.rate_for("ZWL"), Err(ProviderApiError::UnsupportedCurrency(_))));
    }

    #[test]
    fn conversion_rounds_to_the_nearest_cent() {
        let rates = fixture();
        // $19.99 * 1601.5 = ₦32013.985
        assert_eq!(rates.convert(Money::from_cents(1999), "NGN").unwrap(), Money::from_cents(3_201_399));
        assert_eq!(rates.convert(Money::from_whole(100), "USD").unwrap(), Money::from_whole(100));
    }
}
