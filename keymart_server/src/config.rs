use std::env;

use log::*;
use provider_tools::{ExchangeRateConfig, NowPaymentsConfig, PaymentEnvironment, PaystackConfig};

const DEFAULT_KM_HOST: &str = "127.0.0.1";
const DEFAULT_KM_PORT: u16 = 8360;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub environment: PaymentEnvironment,
    pub paystack: PaystackConfig,
    pub nowpayments: NowPaymentsConfig,
    pub exchange: ExchangeRateConfig,
    /// Buffer size for the notification event channels.
    pub event_buffer_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_KM_HOST.to_string(),
            port: DEFAULT_KM_PORT,
            database_url: String::default(),
            environment: PaymentEnvironment::default(),
            paystack: PaystackConfig::default(),
            nowpayments: NowPaymentsConfig::default(),
            exchange: ExchangeRateConfig::default(),
            event_buffer_size: 25,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("KM_HOST").ok().unwrap_or_else(|| DEFAULT_KM_HOST.into());
        let port = env::var("KM_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for KM_PORT. {e} Using the default, {DEFAULT_KM_PORT}, instead."
                    );
                    DEFAULT_KM_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_KM_PORT);
        let database_url = env::var("KM_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ KM_DATABASE_URL is not set. Please set it to the URL for the KeyMart database.");
            String::default()
        });
        let environment = PaymentEnvironment::from_env_or_default();
        if environment == PaymentEnvironment::Sandbox {
            warn!("🪛️ The server is running against provider sandboxes. No real money will move.");
        }
        let paystack = PaystackConfig::new_from_env_or_default(environment);
        let nowpayments = NowPaymentsConfig::new_from_env_or_default(environment);
        let exchange = ExchangeRateConfig::new_from_env_or_default();
        Self {
            host,
            port,
            database_url,
            environment,
            paystack,
            nowpayments,
            exchange,
            event_buffer_size: 25,
        }
    }
}
