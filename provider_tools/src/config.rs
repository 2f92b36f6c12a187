use km_common::Secret;
use log::*;

/// Which provider environment the adapters talk to. The enum drives the default base URLs handed to the adapter
/// constructors; explicit `KM_*_BASE_URL` overrides always win.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PaymentEnvironment {
    #[default]
    Sandbox,
    Production,
}

impl PaymentEnvironment {
    pub fn from_env_or_default() -> Self {
        match std::env::var("KM_ENVIRONMENT").as_deref() {
            Ok("production") | Ok("Production") => PaymentEnvironment::Production,
            Ok(other) => {
                warn!("Unrecognised KM_ENVIRONMENT '{other}'. Using sandbox.");
                PaymentEnvironment::Sandbox
            },
            Err(_) => {
                warn!("KM_ENVIRONMENT not set. Using sandbox.");
                PaymentEnvironment::Sandbox
            },
        }
    }

    /// NOWPayments runs a dedicated sandbox host with its own set of API keys.
    pub fn nowpayments_base_url(&self) -> &'static str {
        match self {
            PaymentEnvironment::Sandbox => "https://api-sandbox.nowpayments.io/v1",
            PaymentEnvironment::Production => "https://api.nowpayments.io/v1",
        }
    }

    /// Paystack has no separate sandbox host; the mode is selected by the key prefix (`sk_test_` vs `sk_live_`).
    pub fn paystack_key_prefix(&self) -> &'static str {
        match self {
            PaymentEnvironment::Sandbox => "sk_test_",
            PaymentEnvironment::Production => "sk_live_",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PaystackConfig {
    pub secret_key: Secret<String>,
    pub base_url: String,
    /// Where Paystack redirects the buyer after checkout. The payment reference is appended to this.
    pub callback_url: String,
}

impl PaystackConfig {
    pub fn new_from_env_or_default(environment: PaymentEnvironment) -> Self {
        let secret_key = std::env::var("KM_PAYSTACK_SECRET_KEY").unwrap_or_else(|_| {
            warn!("KM_PAYSTACK_SECRET_KEY not set, using a useless default");
            format!("{}00000000000000", environment.paystack_key_prefix())
        });
        if !secret_key.starts_with(environment.paystack_key_prefix()) {
            warn!(
                "KM_PAYSTACK_SECRET_KEY does not look like a {environment:?} key. Paystack selects its mode from \
                 the key prefix, so payments will not run against the {environment:?} environment."
            );
        }
        let secret_key = Secret::new(secret_key);
        let base_url = std::env::var("KM_PAYSTACK_BASE_URL").unwrap_or_else(|_| {
            info!("KM_PAYSTACK_BASE_URL not set, using the public API");
            "https://api.paystack.co".to_string()
        });
        let callback_url = std::env::var("KM_PAYSTACK_CALLBACK_URL").unwrap_or_else(|_| {
            warn!("KM_PAYSTACK_CALLBACK_URL not set, using a useless default");
            "http://localhost:8360/paystack/verify".to_string()
        });
        Self { secret_key, base_url, callback_url }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NowPaymentsConfig {
    pub api_key: Secret<String>,
    pub base_url: String,
    /// Where NOWPayments delivers IPN callbacks.
    pub ipn_callback_url: String,
    pub success_url: String,
    pub cancel_url: String,
}

impl NowPaymentsConfig {
    pub fn new_from_env_or_default(environment: PaymentEnvironment) -> Self {
        let api_key = Secret::new(std::env::var("KM_NOWPAYMENTS_API_KEY").unwrap_or_else(|_| {
            warn!("KM_NOWPAYMENTS_API_KEY not set, using a useless default");
            "00000000-0000-0000".to_string()
        }));
        let base_url = std::env::var("KM_NOWPAYMENTS_BASE_URL").unwrap_or_else(|_| {
            info!("KM_NOWPAYMENTS_BASE_URL not set, using the {environment:?} host");
            environment.nowpayments_base_url().to_string()
        });
        let ipn_callback_url = std::env::var("KM_NOWPAYMENTS_IPN_URL").unwrap_or_else(|_| {
            warn!("KM_NOWPAYMENTS_IPN_URL not set, using a useless default");
            "http://localhost:8360/nowpayments/ipn".to_string()
        });
        let success_url = std::env::var("KM_PAYMENT_SUCCESS_URL")
            .unwrap_or_else(|_| "http://localhost:8360/payment-complete".to_string());
        let cancel_url = std::env::var("KM_PAYMENT_CANCEL_URL")
            .unwrap_or_else(|_| "http://localhost:8360/payment-failed".to_string());
        Self { api_key, base_url, ipn_callback_url, success_url, cancel_url }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExchangeRateConfig {
    pub api_url: String,
    pub api_key: Secret<String>,
}

impl ExchangeRateConfig {
    pub fn new_from_env_or_default() -> Self {
        let api_url = std::env::var("KM_EXCHANGE_RATE_API_URL").unwrap_or_else(|_| {
            warn!("KM_EXCHANGE_RATE_API_URL not set, using a useless default");
            "https://v6.exchangerate-api.com/v6/latest/USD".to_string()
        });
        let api_key = Secret::new(std::env::var("KM_EXCHANGE_RATE_API_KEY").unwrap_or_else(|_| {
            warn!("KM_EXCHANGE_RATE_API_KEY not set, using a useless default");
            "00000000000000".to_string()
        }));
        Self { api_url, api_key }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn environment_selects_the_nowpayments_host() {
        assert_eq!(PaymentEnvironment::Sandbox.nowpayments_base_url(), "https://api-sandbox.nowpayments.io/v1");
        assert_eq!(PaymentEnvironment::Production.nowpayments_base_url(), "https://api.nowpayments.io/v1");
    }

    #[test]
    fn environment_selects_the_paystack_key_mode() {
        assert_eq!(PaymentEnvironment::Sandbox.paystack_key_prefix(), "sk_test_");
        assert_eq!(PaymentEnvironment::Production.paystack_key_prefix(), "sk_live_");
    }

    #[test]
    fn nowpayments_config_defaults_to_the_environment_host() {
        std::env::remove_var("KM_NOWPAYMENTS_BASE_URL");
        let config = NowPaymentsConfig::new_from_env_or_default(PaymentEnvironment::Sandbox);
        assert_eq!(config.base_url, "https://api-sandbox.nowpayments.io/v1");
        let config = NowPaymentsConfig::new_from_env_or_default(PaymentEnvironment::Production);
        assert_eq!(config.base_url, "https://api.nowpayments.io/v1");
    }
}
