use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use keymart_engine::{
    events::{EventHandlers, EventProducers},
    PaymentFlowApi,
    SqliteDatabase,
};
use provider_tools::{ExchangeRateApi, NowPaymentsApi, PaystackApi};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    notifier,
    routes::{exchange_rate, health, nowpayments_ipn, nowpayments_pay, paystack_pay, paystack_verify},
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let handlers = EventHandlers::new(config.event_buffer_size, notifier::notification_hooks());
    let producers = handlers.producers();
    tokio::spawn(handlers.start_handlers());
    let srv = create_server_instance(config, db, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let paystack =
        PaystackApi::new(config.paystack.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let nowpayments =
        NowPaymentsApi::new(config.nowpayments.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let exchange =
        ExchangeRateApi::new(config.exchange.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let srv = HttpServer::new(move || {
        let flow_api = PaymentFlowApi::new(db.clone(), producers.clone());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("kms::access_log"))
            .app_data(web::Data::new(flow_api))
            .app_data(web::Data::new(paystack.clone()))
            .app_data(web::Data::new(nowpayments.clone()))
            .app_data(web::Data::new(exchange.clone()))
            .service(health)
            .service(paystack_pay)
            .service(paystack_verify)
            .service(nowpayments_pay)
            .service(nowpayments_ipn)
            .service(exchange_rate)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
