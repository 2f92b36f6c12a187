//! `SqliteDatabase` is a concrete implementation of a KeyMart payment engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module.
use std::fmt::Debug;

use km_common::Money;
use log::*;
use sqlx::{SqliteConnection, SqlitePool};

use super::db::{self, keys, order_items, orders, payments, products};
use crate::{
    db_types::{
        FulfilmentStatus,
        KeyPair,
        NewOrder,
        NewOrderItem,
        NewProduct,
        Order,
        OrderItem,
        Payment,
        PaymentStatus,
        Product,
    },
    traits::{AllocationReport, FulfilmentDatabase, FulfilmentError, ItemAllocation},
};

// SQLite allows one writer at a time. Under load a write transaction can fail with SQLITE_BUSY rather than
// queueing, so the commit paths retry a few times with a short backoff.
const MAX_BUSY_RETRIES: usize = 5;

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database connection pool using the database URL from the `KM_DATABASE_URL` environment
    /// variable, or the default if it is not set.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db::db_url();
        Self::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = db::new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn try_confirm_payment(&self, reference: &str) -> Result<(Payment, AllocationReport), FulfilmentError> {
        let mut tx = self.pool.begin().await?;
        let payment = payments::fetch_by_reference(reference, &mut tx)
            .await?
            .ok_or_else(|| FulfilmentError::PaymentNotFound(reference.to_string()))?;
        match payment.status {
            PaymentStatus::Verified => {
                // Replay of an already-committed confirmation. Report the stored state and change nothing.
                let items = order_items::fetch_items_for_order(payment.order_id, &mut tx).await?;
                let report = snapshot_report(payment.order_id, &items);
                tx.commit().await?;
                debug!("🗃️ Payment {reference} is already verified. Returning the stored allocation.");
                Ok((payment, report))
            },
            PaymentStatus::Failed => Err(FulfilmentError::IllegalPaymentTransition {
                current: PaymentStatus::Failed,
                next: PaymentStatus::Verified,
            }),
            PaymentStatus::Pending => {
                let payment = payments::set_status(reference, PaymentStatus::Verified, &mut tx).await?;
                let order = orders::mark_paid(payment.order_id, &mut tx).await?;
                let report = allocate_items(order.id, &mut tx).await?;
                tx.commit().await?;
                info!(
                    "🗃️ Payment {reference} confirmed. Order {} received {} keys ({} short).",
                    order.id,
                    report.total_allocated(),
                    report.total_shortage()
                );
                Ok((payment, report))
            },
        }
    }

    async fn try_reallocate_order(&self, order_id: i64) -> Result<AllocationReport, FulfilmentError> {
        let mut tx = self.pool.begin().await?;
        let order =
            orders::fetch_order(order_id, &mut tx).await?.ok_or(FulfilmentError::OrderNotFound(order_id))?;
        if !order.paid_status {
            return Err(FulfilmentError::OrderNotPaid(order_id));
        }
        let report = allocate_items(order_id, &mut tx).await?;
        tx.commit().await?;
        Ok(report)
    }
}

impl FulfilmentDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_product(&self, product: NewProduct) -> Result<Product, FulfilmentError> {
        let mut conn = self.pool.acquire().await?;
        products::insert_product(product, &mut conn).await
    }

    async fn fetch_product(&self, product_id: i64) -> Result<Product, FulfilmentError> {
        let mut conn = self.pool.acquire().await?;
        products::fetch_product(product_id, &mut conn).await?.ok_or(FulfilmentError::ProductNotFound(product_id))
    }

    async fn add_keys_to_pool(&self, product_id: i64, new_keys: Vec<KeyPair>) -> Result<(), FulfilmentError> {
        let mut tx = self.pool.begin().await?;
        products::fetch_product(product_id, &mut tx).await?.ok_or(FulfilmentError::ProductNotFound(product_id))?;
        keys::add_keys(product_id, new_keys, &mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn unused_key_count(&self, product_id: i64) -> Result<i64, FulfilmentError> {
        let mut conn = self.pool.acquire().await?;
        let count = keys::unused_count(product_id, &mut conn).await?;
        Ok(count)
    }

    async fn insert_order(&self, order: NewOrder, items: Vec<NewOrderItem>) -> Result<Order, FulfilmentError> {
        if items.is_empty() {
            return Err(FulfilmentError::EmptyOrder);
        }
        let mut tx = self.pool.begin().await?;
        let order = orders::insert_order(order, &mut tx).await?;
        for item in items {
            order_items::insert_item(order.id, item, &mut tx).await?;
        }
        tx.commit().await?;
        Ok(order)
    }

    async fn fetch_order(&self, order_id: i64) -> Result<Order, FulfilmentError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order(order_id, &mut conn).await?.ok_or(FulfilmentError::OrderNotFound(order_id))
    }

    async fn fetch_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, FulfilmentError> {
        let mut conn = self.pool.acquire().await?;
        let items = order_items::fetch_items_for_order(order_id, &mut conn).await?;
        Ok(items)
    }

    async fn payment_for_order(&self, order_id: i64, amount: Money) -> Result<Payment, FulfilmentError> {
        let mut tx = self.pool.begin().await?;
        orders::fetch_order(order_id, &mut tx).await?.ok_or(FulfilmentError::OrderNotFound(order_id))?;
        let payment = payments::fetch_or_create_for_order(order_id, amount, &mut tx).await?;
        tx.commit().await?;
        Ok(payment)
    }

    async fn fetch_payment_by_reference(&self, reference: &str) -> Result<Payment, FulfilmentError> {
        let mut conn = self.pool.acquire().await?;
        payments::fetch_by_reference(reference, &mut conn)
            .await?
            .ok_or_else(|| FulfilmentError::PaymentNotFound(reference.to_string()))
    }

    async fn mark_payment_failed(&self, reference: &str) -> Result<Payment, FulfilmentError> {
        let mut tx = self.pool.begin().await?;
        let payment = payments::fetch_by_reference(reference, &mut tx)
            .await?
            .ok_or_else(|| FulfilmentError::PaymentNotFound(reference.to_string()))?;
        let payment = match payment.status {
            PaymentStatus::Failed => payment,
            PaymentStatus::Verified => {
                return Err(FulfilmentError::IllegalPaymentTransition {
                    current: PaymentStatus::Verified,
                    next: PaymentStatus::Failed,
                })
            },
            PaymentStatus::Pending => payments::set_status(reference, PaymentStatus::Failed, &mut tx).await?,
        };
        tx.commit().await?;
        Ok(payment)
    }

    async fn confirm_payment(&self, reference: &str) -> Result<(Payment, AllocationReport), FulfilmentError> {
        let mut attempt = 0;
        loop {
            match self.try_confirm_payment(reference).await {
                Err(e) if is_busy(&e) && attempt < MAX_BUSY_RETRIES => {
                    attempt += 1;
                    warn!("🗃️ Database busy while confirming {reference}. Retrying ({attempt}/{MAX_BUSY_RETRIES})");
                    tokio::time::sleep(std::time::Duration::from_millis(50 * attempt as u64)).await;
                },
                other => return other,
            }
        }
    }

    async fn reallocate_order(&self, order_id: i64) -> Result<AllocationReport, FulfilmentError> {
        let mut attempt = 0;
        loop {
            match self.try_reallocate_order(order_id).await {
                Err(e) if is_busy(&e) && attempt < MAX_BUSY_RETRIES => {
                    attempt += 1;
                    warn!(
                        "🗃️ Database busy while reallocating order {order_id}. Retrying \
                         ({attempt}/{MAX_BUSY_RETRIES})"
                    );
                    tokio::time::sleep(std::time::Duration::from_millis(50 * attempt as u64)).await;
                },
                other => return other,
            }
        }
    }
}

/// One allocation pass over the order's items, inside the caller's transaction.
///
/// Items that are already `Fulfilled` are skipped entirely. Everything else claims keys for its outstanding count,
/// takes whatever the pool can give, and has its stock level reduced by the keys actually issued.
async fn allocate_items(order_id: i64, conn: &mut SqliteConnection) -> Result<AllocationReport, FulfilmentError> {
    let items = order_items::fetch_items_for_order(order_id, conn).await?;
    let mut allocations = Vec::with_capacity(items.len());
    for item in items {
        if item.fulfilment_status == FulfilmentStatus::Fulfilled {
            allocations.push(ItemAllocation {
                order_item_id: item.id,
                product_id: item.product_id,
                requested: item.quantity,
                allocated: item.allocated_count(),
            });
            continue;
        }
        let claimed = keys::claim_unused(item.product_id, item.outstanding(), conn).await?;
        let issued = claimed.len() as i64;
        let mut all_keys = item.keys_and_passwords.clone();
        all_keys.extend(claimed);
        let attached = all_keys.len() as i64;
        let status = if attached >= item.quantity {
            FulfilmentStatus::Fulfilled
        } else if attached == 0 {
            FulfilmentStatus::Unfulfilled
        } else {
            FulfilmentStatus::PartiallyFulfilled
        };
        order_items::write_allocation(item.id, &all_keys, status, conn).await?;
        products::consume_stock(item.product_id, issued, conn).await?;
        allocations.push(ItemAllocation {
            order_item_id: item.id,
            product_id: item.product_id,
            requested: item.quantity,
            allocated: attached,
        });
    }
    Ok(AllocationReport::new(order_id, allocations))
}

fn snapshot_report(order_id: i64, items: &[OrderItem]) -> AllocationReport {
    let allocations = items
        .iter()
        .map(|item| ItemAllocation {
            order_item_id: item.id,
            product_id: item.product_id,
            requested: item.quantity,
            allocated: item.allocated_count(),
        })
        .collect();
    AllocationReport::new(order_id, allocations)
}

fn is_busy(e: &FulfilmentError) -> bool {
    matches!(e, FulfilmentError::DatabaseError(msg) if msg.contains("database is locked") || msg.contains("busy"))
}
