use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewOrder, Order},
    traits::FulfilmentError,
};

/// Inserts a new order into the database using the given connection. This is not atomic. You can embed this call
/// inside a transaction if you need to ensure atomicity, and pass `&mut *tx` as the connection argument.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, FulfilmentError> {
    let order: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (customer_id, total_price, payment_method)
            VALUES ($1, $2, $3)
            RETURNING *;
        "#,
    )
    .bind(order.customer_id)
    .bind(order.total_price)
    .bind(order.payment_method)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Order for customer [{}] inserted with id {}", order.customer_id, order.id);
    Ok(order)
}

pub async fn fetch_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(order_id).fetch_optional(conn).await?;
    Ok(order)
}

/// Flips `paid_status` to true. Idempotent; an already-paid order is returned unchanged.
pub async fn mark_paid(order_id: i64, conn: &mut SqliteConnection) -> Result<Order, FulfilmentError> {
    let order: Option<Order> = sqlx::query_as(
        r#"
            UPDATE orders SET paid_status = 1, updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    order.ok_or(FulfilmentError::OrderNotFound(order_id))
}
