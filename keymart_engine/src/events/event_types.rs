use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Order, Payment},
    traits::AllocationReport,
};

/// Fired after a payment confirmation commits. Covers both the fully-fulfilled and the partial-shortage case; check
/// [`AllocationReport::is_partial`] to tell them apart.
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseCompletedEvent {
    pub order: Order,
    pub payment: Payment,
    pub report: AllocationReport,
}

impl PurchaseCompletedEvent {
    pub fn new(order: Order, payment: Payment, report: AllocationReport) -> Self {
        Self { order, payment, report }
    }
}

/// Fired once per product that ran short during an allocation pass, so that inventory staff can be alerted to
/// restock and top up the affected orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyShortageEvent {
    pub order_id: i64,
    pub product_id: i64,
    pub shortage: i64,
}

impl KeyShortageEvent {
    pub fn new(order_id: i64, product_id: i64, shortage: i64) -> Self {
        Self { order_id, product_id, shortage }
    }
}

/// Fired when a provider rejects a payment, or when the settled amount does not match the order total.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentFailedEvent {
    pub payment: Payment,
    pub reason: String,
}

impl PaymentFailedEvent {
    pub fn new(payment: Payment, reason: String) -> Self {
        Self { payment, reason }
    }
}
