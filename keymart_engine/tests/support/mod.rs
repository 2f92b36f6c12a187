//! Shared scaffolding for the integration tests: a throwaway database per test, seed helpers, and a scriptable
//! provider adapter.
#![allow(dead_code)]
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};

use keymart_engine::{
    db_types::{KeyPair, NewOrder, NewOrderItem, NewProduct, Order, Payment, PaymentMethod, Product},
    events::EventProducers,
    traits::{FulfilmentDatabase, ProviderVerification, VerificationError, VerificationOutcome},
    PaymentFlowApi,
    SqliteDatabase,
};
use km_common::Money;
use log::*;
use sqlx::{migrate, migrate::MigrateDatabase, Sqlite};

pub fn random_db_path() -> String {
    format!("sqlite://{}/keymart_test_{}.db", std::env::temp_dir().display(), rand::random::<u64>())
}

pub async fn prepare_test_env(url: &str) {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    if let Err(e) = Sqlite::drop_database(url).await {
        warn!("Error dropping database {url}: {e:?}");
    }
    Sqlite::create_database(url).await.expect("Error creating database");
    let db = SqliteDatabase::new_with_url(url, 5).await.expect("Error creating connection to database");
    migrate!("./src/sqlite/migrations").run(db.pool()).await.expect("Error running DB migrations");
    debug!("🚀️ Test database ready at {url}");
}

pub async fn new_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database")
}

pub fn api_for(db: SqliteDatabase) -> PaymentFlowApi<SqliteDatabase> {
    PaymentFlowApi::new(db, EventProducers::default())
}

/// Creates a product whose key pool and displayed stock both hold `n_keys` entries.
pub async fn seed_product(db: &SqliteDatabase, title: &str, n_keys: i64) -> Product {
    let product = db.insert_product(NewProduct::new(title, n_keys)).await.expect("Error inserting product");
    let keys = (0..n_keys)
        .map(|i| KeyPair::new(format!("{title}-key-{i}"), format!("{title}-pw-{i}")))
        .collect();
    db.add_keys_to_pool(product.id, keys).await.expect("Error loading key pool");
    product
}

pub async fn place_single_item_order(
    api: &PaymentFlowApi<SqliteDatabase>,
    customer: &str,
    method: PaymentMethod,
    product_id: i64,
    quantity: i64,
) -> (Order, Payment) {
    let order = NewOrder::new(customer, Money::default(), method);
    let items = vec![NewOrderItem::new(product_id, quantity, Money::from_whole(10))];
    api.place_order(order, items).await.expect("Error placing order")
}

/// A scriptable stand-in for a provider adapter. Records how many times it was consulted, so tests can assert that
/// replays never reach the provider. An outcome of `None` simulates an unreachable provider.
pub struct MockProvider {
    method: PaymentMethod,
    outcome: Mutex<Option<VerificationOutcome>>,
    calls: AtomicUsize,
}

impl MockProvider {
    pub fn new(method: PaymentMethod, outcome: VerificationOutcome) -> Self {
        Self { method, outcome: Mutex::new(Some(outcome)), calls: AtomicUsize::new(0) }
    }

    pub fn verifying(method: PaymentMethod, amount: Money) -> Self {
        Self::new(method, VerificationOutcome::Verified { amount })
    }

    /// A provider that cannot be reached; every `verify` call errors.
    pub fn unreachable(method: PaymentMethod) -> Self {
        Self { method, outcome: Mutex::new(None), calls: AtomicUsize::new(0) }
    }

    pub fn set_outcome(&self, outcome: VerificationOutcome) {
        *self.outcome.lock().unwrap() = Some(outcome);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ProviderVerification for MockProvider {
    fn method(&self) -> PaymentMethod {
        self.method
    }

    async fn verify(&self, _reference: &str) -> Result<VerificationOutcome, VerificationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.outcome.lock().unwrap().clone() {
            Some(outcome) => Ok(outcome),
            None => Err(VerificationError::ProviderUnavailable("connection timed out".to_string())),
        }
    }
}
