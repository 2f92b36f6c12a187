use km_common::Money;
use thiserror::Error;

use crate::{
    db_types::{KeyPair, NewOrder, NewOrderItem, NewProduct, Order, OrderItem, Payment, PaymentStatus, Product},
    traits::data_objects::AllocationReport,
};

/// This trait defines the highest level of behaviour for backends supporting the KeyMart payment engine.
///
/// This behaviour includes:
/// * Creating and fetching products, key pools, orders and payments.
/// * The payment confirmation commit: marking a payment verified, the order paid, and allocating keys, all in one
///   atomic transaction.
/// * Exclusive, idempotent key allocation with partial-shortage tolerance.
#[allow(async_fn_in_trait)]
pub trait FulfilmentDatabase: Clone {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Creates a new product and returns its record.
    async fn insert_product(&self, product: NewProduct) -> Result<Product, FulfilmentError>;

    async fn fetch_product(&self, product_id: i64) -> Result<Product, FulfilmentError>;

    /// Loads a batch of license keys into a product's pool.
    async fn add_keys_to_pool(&self, product_id: i64, keys: Vec<KeyPair>) -> Result<(), FulfilmentError>;

    /// The number of unused keys remaining in the product's pool.
    async fn unused_key_count(&self, product_id: i64) -> Result<i64, FulfilmentError>;

    /// Creates an order together with its line items in a single transaction. Each item gets a fresh, unique
    /// transaction id. Returns the order record.
    async fn insert_order(&self, order: NewOrder, items: Vec<NewOrderItem>) -> Result<Order, FulfilmentError>;

    async fn fetch_order(&self, order_id: i64) -> Result<Order, FulfilmentError>;

    async fn fetch_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, FulfilmentError>;

    /// Fetches the payment for an order, creating a `Pending` one with a fresh unique reference if none exists.
    /// Calling this twice for the same order returns the same payment record.
    async fn payment_for_order(&self, order_id: i64, amount: Money) -> Result<Payment, FulfilmentError>;

    /// Fetches the payment with the given provider reference.
    async fn fetch_payment_by_reference(&self, reference: &str) -> Result<Payment, FulfilmentError>;

    /// Records a failed verification outcome against the payment. The payment is marked `Failed` and the order is
    /// left untouched. No-op if the payment is already `Failed`.
    async fn mark_payment_failed(&self, reference: &str) -> Result<Payment, FulfilmentError>;

    /// The payment confirmation commit. In a single atomic transaction:
    /// * the payment is marked `Verified`,
    /// * the order is marked paid,
    /// * every outstanding order item claims keys from its product's pool, tolerating shortages,
    /// * stock levels are decremented by the number of keys actually issued.
    ///
    /// If any step fails the entire transaction rolls back and the payment stays `Pending`, so a webhook re-delivery
    /// can retry the whole commit.
    ///
    /// Returns the updated payment and the allocation report.
    async fn confirm_payment(&self, reference: &str) -> Result<(Payment, AllocationReport), FulfilmentError>;

    /// Re-runs key allocation for a paid order, topping up items that were left short by an earlier pass. Items that
    /// are already `Fulfilled` are never touched.
    async fn reallocate_order(&self, order_id: i64) -> Result<AllocationReport, FulfilmentError>;
}

#[derive(Debug, Error)]
pub enum FulfilmentError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("The requested payment does not exist for reference {0}")]
    PaymentNotFound(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(i64),
    #[error("The requested product {0} does not exist")]
    ProductNotFound(i64),
    #[error("Order {0} has not been paid, so keys cannot be allocated to it")]
    OrderNotPaid(i64),
    #[error("Cannot record payment outcome {next} because the payment is already {current}")]
    IllegalPaymentTransition { current: PaymentStatus, next: PaymentStatus },
    #[error("Could not generate a unique payment reference after several attempts")]
    ReferenceCollision,
    #[error("The stored key data for order item {0} is malformed")]
    MalformedKeyData(i64),
    #[error("Cannot create an order with no items")]
    EmptyOrder,
}

impl From<sqlx::Error> for FulfilmentError {
    fn from(e: sqlx::Error) -> Self {
        FulfilmentError::DatabaseError(e.to_string())
    }
}
