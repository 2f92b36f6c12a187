use km_common::Money;
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Payment, PaymentStatus},
    helpers::random_reference,
    traits::FulfilmentError,
};

const MAX_REFERENCE_ATTEMPTS: usize = 10;

/// Fetches the payment for the order, creating a fresh `Pending` one if none exists. The `reference` column is
/// unique, so a token collision surfaces as a constraint violation and we draw a new token and retry.
pub async fn fetch_or_create_for_order(
    order_id: i64,
    amount: Money,
    conn: &mut SqliteConnection,
) -> Result<Payment, FulfilmentError> {
    if let Some(payment) = fetch_by_order(order_id, &mut *conn).await? {
        return Ok(payment);
    }
    for _ in 0..MAX_REFERENCE_ATTEMPTS {
        let reference = random_reference();
        let result: Result<Payment, sqlx::Error> = sqlx::query_as(
            r#"
                INSERT INTO payments (order_id, amount, reference, status)
                VALUES ($1, $2, $3, 'Pending')
                RETURNING *;
            "#,
        )
        .bind(order_id)
        .bind(amount)
        .bind(&reference)
        .fetch_one(&mut *conn)
        .await;
        match result {
            Ok(payment) => {
                debug!("🗃️ Payment {reference} created for order {order_id}");
                return Ok(payment);
            },
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                // The order_id column is unique too. A concurrent creator winning the race looks identical to a
                // reference collision, so re-check for an existing payment before retrying.
                if let Some(payment) = fetch_by_order(order_id, &mut *conn).await? {
                    return Ok(payment);
                }
            },
            Err(e) => return Err(e.into()),
        }
    }
    Err(FulfilmentError::ReferenceCollision)
}

pub async fn fetch_by_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Option<Payment>, sqlx::Error> {
    let payment =
        sqlx::query_as("SELECT * FROM payments WHERE order_id = $1").bind(order_id).fetch_optional(conn).await?;
    Ok(payment)
}

pub async fn fetch_by_reference(reference: &str, conn: &mut SqliteConnection) -> Result<Option<Payment>, sqlx::Error> {
    let payment =
        sqlx::query_as("SELECT * FROM payments WHERE reference = $1").bind(reference).fetch_optional(conn).await?;
    Ok(payment)
}

/// Records the final verification outcome for a payment. The `verified` flag tracks `status = 'Verified'`.
pub async fn set_status(
    reference: &str,
    status: PaymentStatus,
    conn: &mut SqliteConnection,
) -> Result<Payment, FulfilmentError> {
    let payment: Option<Payment> = sqlx::query_as(
        r#"
            UPDATE payments SET
                status = $2,
                verified = CASE WHEN $2 = 'Verified' THEN 1 ELSE 0 END,
                updated_at = CURRENT_TIMESTAMP
            WHERE reference = $1
            RETURNING *;
        "#,
    )
    .bind(reference)
    .bind(status)
    .fetch_optional(conn)
    .await?;
    let payment = payment.ok_or_else(|| FulfilmentError::PaymentNotFound(reference.to_string()))?;
    debug!("🗃️ Payment {reference} is now {status}");
    Ok(payment)
}
