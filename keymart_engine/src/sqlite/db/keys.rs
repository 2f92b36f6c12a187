use log::debug;
use sqlx::SqliteConnection;

use crate::{db_types::KeyPair, traits::FulfilmentError};

pub async fn add_keys(
    product_id: i64,
    keys: Vec<KeyPair>,
    conn: &mut SqliteConnection,
) -> Result<(), FulfilmentError> {
    let count = keys.len();
    for pair in keys {
        sqlx::query("INSERT INTO product_keys (product_id, key, password) VALUES ($1, $2, $3)")
            .bind(product_id)
            .bind(pair.key)
            .bind(pair.password)
            .execute(&mut *conn)
            .await?;
    }
    debug!("🗃️ Loaded {count} keys into the pool for product {product_id}");
    Ok(())
}

pub async fn unused_count(product_id: i64, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM product_keys WHERE product_id = $1 AND is_used = 0")
            .bind(product_id)
            .fetch_one(conn)
            .await?;
    Ok(count)
}

/// Claims up to `limit` unused keys from the product's pool, marking them used in the same statement.
///
/// The UPDATE and the selection happen atomically, so two transactions can never claim the same row; under SQLite's
/// single-writer model a concurrent claimer simply sees the rows already marked used. Returns fewer than `limit`
/// pairs when the pool runs short, possibly none.
pub async fn claim_unused(
    product_id: i64,
    limit: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<KeyPair>, FulfilmentError> {
    if limit <= 0 {
        return Ok(Vec::new());
    }
    let claimed: Vec<KeyPair> = sqlx::query_as(
        r#"
            UPDATE product_keys SET is_used = 1
            WHERE id IN (
                SELECT id FROM product_keys
                WHERE product_id = $1 AND is_used = 0
                ORDER BY id
                LIMIT $2
            )
            RETURNING key, password;
        "#,
    )
    .bind(product_id)
    .bind(limit)
    .fetch_all(conn)
    .await?;
    debug!("🗃️ Claimed {}/{limit} keys from the pool for product {product_id}", claimed.len());
    Ok(claimed)
}
