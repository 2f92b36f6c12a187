use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewProduct, Product},
    traits::FulfilmentError,
};

pub async fn insert_product(product: NewProduct, conn: &mut SqliteConnection) -> Result<Product, FulfilmentError> {
    let product: Product = sqlx::query_as(
        r#"
            INSERT INTO products (title, quantity_in_stock, visible)
            VALUES ($1, $2, $3)
            RETURNING *;
        "#,
    )
    .bind(product.title)
    .bind(product.quantity_in_stock)
    .bind(product.quantity_in_stock > 0)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Product \"{}\" inserted with id {}", product.title, product.id);
    Ok(product)
}

pub async fn fetch_product(product_id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, sqlx::Error> {
    let product =
        sqlx::query_as("SELECT * FROM products WHERE id = $1").bind(product_id).fetch_optional(conn).await?;
    Ok(product)
}

/// Decrements the displayed stock level by `count`, clamping at zero, and hides the product once the level reaches
/// zero. Hiding is one-way; restocking tooling makes products visible again, not the engine.
pub async fn consume_stock(product_id: i64, count: i64, conn: &mut SqliteConnection) -> Result<(), FulfilmentError> {
    if count == 0 {
        return Ok(());
    }
    let result = sqlx::query(
        r#"
            UPDATE products SET
                quantity_in_stock = MAX(0, quantity_in_stock - $2),
                visible = CASE WHEN quantity_in_stock - $2 <= 0 THEN 0 ELSE visible END,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
        "#,
    )
    .bind(product_id)
    .bind(count)
    .execute(conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(FulfilmentError::ProductNotFound(product_id));
    }
    debug!("🗃️ Stock level for product {product_id} reduced by {count}");
    Ok(())
}
