//! The notification sink.
//!
//! Subscribes to the engine's event hooks and turns them into operator- and customer-facing notifications. The
//! current sink writes structured log lines; the delivery channel can be swapped without touching the engine, since
//! the hooks only ever see the event payload.
use std::{future::Future, pin::Pin};

use keymart_engine::events::EventHooks;
use log::*;

pub fn notification_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks.on_purchase_completed(|ev| -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async move {
            info!(
                "📧️ Purchase complete: order {} for customer [{}]. {} keys delivered.",
                ev.order.id,
                ev.order.customer_id,
                ev.report.total_allocated()
            );
            if ev.report.is_partial() {
                warn!(
                    "📧️ Order {} is short {} keys. The customer has been promised a top-up after restocking.",
                    ev.order.id,
                    ev.report.total_shortage()
                );
            }
        })
    });
    hooks.on_key_shortage(|ev| -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async move {
            warn!(
                "📧️ Restock needed: product {} ran {} keys short while fulfilling order {}.",
                ev.product_id, ev.shortage, ev.order_id
            );
        })
    });
    hooks.on_payment_failed(|ev| -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async move {
            info!(
                "📧️ Payment {} for order {} failed verification: {}",
                ev.payment.reference, ev.payment.order_id, ev.reason
            );
        })
    });
    hooks
}
