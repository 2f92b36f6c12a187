use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{FulfilmentStatus, KeyPair, NewOrderItem, OrderItem},
    helpers::random_transaction_id,
    traits::FulfilmentError,
};

const MAX_TOKEN_ATTEMPTS: usize = 10;

/// Inserts a line item for the order. A fresh transaction id is generated here; on the (astronomically unlikely)
/// collision with an existing one, a new token is drawn and the insert retried.
pub async fn insert_item(
    order_id: i64,
    item: NewOrderItem,
    conn: &mut SqliteConnection,
) -> Result<OrderItem, FulfilmentError> {
    for _ in 0..MAX_TOKEN_ATTEMPTS {
        let txn_id = random_transaction_id();
        let result: Result<OrderItem, sqlx::Error> = sqlx::query_as(
            r#"
                INSERT INTO order_items (order_id, product_id, quantity, price, total, transaction_id)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *;
            "#,
        )
        .bind(order_id)
        .bind(item.product_id)
        .bind(item.quantity)
        .bind(item.price)
        .bind(item.total())
        .bind(&txn_id)
        .fetch_one(&mut *conn)
        .await;
        match result {
            Ok(item) => {
                debug!("🗃️ Order item {} ({txn_id}) added to order {order_id}", item.id);
                return Ok(item);
            },
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Err(FulfilmentError::ReferenceCollision)
}

pub async fn fetch_items_for_order(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderItem>, sqlx::Error> {
    let items = sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(items)
}

/// Overwrites the item's key list and fulfilment status. Callers pass the full key list (existing keys plus any
/// newly claimed ones), so a top-up pass and a first allocation go through the same code path.
pub async fn write_allocation(
    item_id: i64,
    keys: &[KeyPair],
    status: FulfilmentStatus,
    conn: &mut SqliteConnection,
) -> Result<(), FulfilmentError> {
    let keys_json = serde_json::to_string(keys).map_err(|_| FulfilmentError::MalformedKeyData(item_id))?;
    let result = sqlx::query(
        r#"
            UPDATE order_items SET
                keys_and_passwords = $2,
                fulfilment_status = $3,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
        "#,
    )
    .bind(item_id)
    .bind(keys_json)
    .bind(status)
    .execute(conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(FulfilmentError::DatabaseError(format!("Order item {item_id} vanished during allocation")));
    }
    debug!("🗃️ Order item {item_id} now holds {} keys ({status})", keys.len());
    Ok(())
}
