use actix_web::{http::StatusCode, test, web, App};
use keymart_engine::{
    events::EventProducers,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    PaymentFlowApi,
    SqliteDatabase,
};
use provider_tools::{NowPaymentsApi, NowPaymentsConfig, PaystackApi, PaystackConfig};

use crate::routes::{health, nowpayments_ipn, paystack_pay};

async fn test_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database")
}

#[actix_web::test]
async fn health_check() {
    let service = test::init_service(App::new().service(health)).await;
    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&service, req).await;
    assert!(resp.status().is_success());
    let body = test::read_body(resp).await;
    assert_eq!(&body[..], "👍️\n".as_bytes());
}

// The unknown-reference paths fail before any provider round trip, so they can be exercised without a network.
#[actix_web::test]
async fn ipn_for_unknown_reference_is_not_found() {
    let _ = env_logger::try_init();
    let db = test_db().await;
    let api = PaymentFlowApi::new(db, EventProducers::default());
    let nowpayments = NowPaymentsApi::new(NowPaymentsConfig::default()).expect("Error creating client");
    let app = App::new()
        .app_data(web::Data::new(api))
        .app_data(web::Data::new(nowpayments))
        .service(nowpayments_ipn);
    let service = test::init_service(app).await;
    let payload = serde_json::json!({ "order_id": "no-such-reference", "payment_status": "confirmed" });
    let req = test::TestRequest::post().uri("/nowpayments/ipn").set_json(payload).to_request();
    let resp = test::call_service(&service, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn checkout_for_unknown_order_is_not_found() {
    let _ = env_logger::try_init();
    let db = test_db().await;
    let api = PaymentFlowApi::new(db, EventProducers::default());
    let paystack = PaystackApi::new(PaystackConfig::default()).expect("Error creating client");
    let app = App::new()
        .app_data(web::Data::new(api))
        .app_data(web::Data::new(paystack))
        .service(paystack_pay);
    let service = test::init_service(app).await;
    let payload = serde_json::json!({ "email": "alice@example.com" });
    let req = test::TestRequest::post().uri("/paystack/pay/9999").set_json(payload).to_request();
    let resp = test::call_service(&service, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
