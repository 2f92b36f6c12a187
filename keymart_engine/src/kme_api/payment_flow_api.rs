use std::fmt::Debug;

use km_common::Money;
use log::*;

use crate::{
    db_types::{NewOrder, NewOrderItem, Order, Payment, PaymentStatus},
    events::{EventProducers, KeyShortageEvent, PaymentFailedEvent, PurchaseCompletedEvent},
    kme_api::errors::PaymentFlowError,
    traits::{AllocationReport, FulfilmentDatabase, ProviderVerification, VerificationOutcome},
};

/// The final word on a confirmation attempt, as reported to the webhook handler.
#[derive(Debug, Clone)]
pub enum ConfirmationResult {
    /// The payment is verified and every item received its full complement of keys.
    Allocated(AllocationReport),
    /// The payment is verified, but at least one key pool ran short. The report documents the shortages.
    AllocatedPartial(AllocationReport),
    /// The provider has not settled the payment yet. Nothing was changed; the caller should ask again later.
    Pending,
    /// The payment failed verification. The order remains unpaid and no keys were touched.
    Failed { reason: String },
}

impl ConfirmationResult {
    fn from_report(report: AllocationReport) -> Self {
        if report.is_partial() {
            ConfirmationResult::AllocatedPartial(report)
        } else {
            ConfirmationResult::Allocated(report)
        }
    }
}

/// `PaymentFlowApi` is the primary API for confirming payments in response to provider callbacks and IPN webhooks,
/// and for driving key allocation.
pub struct PaymentFlowApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for PaymentFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentFlowApi")
    }
}

impl<B> PaymentFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> PaymentFlowApi<B>
where B: FulfilmentDatabase
{
    /// Creates an order with its line items and the `Pending` payment record the provider checkout will reference.
    pub async fn place_order(
        &self,
        order: NewOrder,
        items: Vec<NewOrderItem>,
    ) -> Result<(Order, Payment), PaymentFlowError> {
        let total: Money = items.iter().map(|i| i.total()).sum();
        let order = NewOrder { total_price: total, ..order };
        let order = self.db.insert_order(order, items).await?;
        let payment = self.db.payment_for_order(order.id, order.total_price).await?;
        debug!("🔄️📦️ Order {} placed. Payment reference is {}", order.id, payment.reference);
        Ok((order, payment))
    }

    /// Fetches the payment for an order, creating one if necessary. Safe to call repeatedly; the same payment record
    /// comes back every time.
    pub async fn payment_for_order(&self, order_id: i64) -> Result<Payment, PaymentFlowError> {
        let order = self.db.fetch_order(order_id).await?;
        let payment = self.db.payment_for_order(order_id, order.total_price).await?;
        Ok(payment)
    }

    /// The payment confirmation flow. This is the only path by which an order becomes paid and keys are issued.
    ///
    /// The flow is:
    /// 1. Look up the payment by its provider reference. A replayed webhook for a payment that already reached a
    ///    terminal state returns the stored outcome immediately, without contacting the provider.
    /// 2. Ask the provider adapter to verify the payment. This happens outside any database transaction, so a slow
    ///    provider never holds a database lock.
    /// 3. On a verified outcome with an exact amount match, commit the payment, the order's paid flag and the key
    ///    allocations in a single transaction, then fire the purchase and shortage hooks.
    /// 4. On a provider failure or an amount mismatch, mark the payment failed and fire the failure hook.
    pub async fn confirm_payment<V: ProviderVerification>(
        &self,
        provider: &V,
        reference: &str,
    ) -> Result<ConfirmationResult, PaymentFlowError> {
        trace!("🔄️✅️ Confirmation requested for payment {reference}");
        let payment = self.db.fetch_payment_by_reference(reference).await?;
        let order = self.db.fetch_order(payment.order_id).await?;
        if order.payment_method != provider.method() {
            return Err(PaymentFlowError::ProviderMismatch {
                reference: reference.to_string(),
                expected: order.payment_method.to_string(),
                actual: provider.method().to_string(),
            });
        }
        match payment.status {
            PaymentStatus::Verified => {
                debug!("🔄️✅️ Payment {reference} was already confirmed. Replaying the stored outcome.");
                let (_, report) = self.db.confirm_payment(reference).await?;
                Ok(ConfirmationResult::from_report(report))
            },
            PaymentStatus::Failed => {
                debug!("🔄️✅️ Payment {reference} already failed verification. Replaying the stored outcome.");
                Ok(ConfirmationResult::Failed { reason: "Payment previously failed verification".to_string() })
            },
            PaymentStatus::Pending => self.verify_and_commit(provider, reference, &payment).await,
        }
    }

    async fn verify_and_commit<V: ProviderVerification>(
        &self,
        provider: &V,
        reference: &str,
        payment: &Payment,
    ) -> Result<ConfirmationResult, PaymentFlowError> {
        let outcome = provider.verify(reference).await?;
        match outcome {
            VerificationOutcome::Pending => {
                debug!("🔄️✅️ {} reports payment {reference} as still pending", provider.method());
                Ok(ConfirmationResult::Pending)
            },
            VerificationOutcome::Failed { reason } => {
                info!("🔄️❌️ {} rejected payment {reference}: {reason}", provider.method());
                self.record_failure(reference, reason).await
            },
            VerificationOutcome::Verified { amount } if amount != payment.amount => {
                let reason =
                    format!("Settled amount {amount} does not match the expected amount {}", payment.amount);
                warn!("🔄️❌️ Payment {reference} amount mismatch: {reason}");
                self.record_failure(reference, reason).await
            },
            VerificationOutcome::Verified { .. } => {
                let (payment, report) = self.db.confirm_payment(reference).await?;
                let order = self.db.fetch_order(payment.order_id).await?;
                info!(
                    "🔄️✅️ Payment {reference} confirmed for order {}. {} keys issued.",
                    order.id,
                    report.total_allocated()
                );
                self.call_shortage_hooks(&report).await;
                self.call_purchase_completed_hook(order, payment, &report).await;
                Ok(ConfirmationResult::from_report(report))
            },
        }
    }

    /// Re-runs key allocation for a paid order that was left short, then fires shortage hooks for anything still
    /// outstanding.
    pub async fn reallocate(&self, order_id: i64) -> Result<AllocationReport, PaymentFlowError> {
        let report = self.db.reallocate_order(order_id).await?;
        debug!(
            "🔄️🔑️ Reallocation pass for order {order_id} complete. {} keys still outstanding.",
            report.total_shortage()
        );
        self.call_shortage_hooks(&report).await;
        Ok(report)
    }

    async fn record_failure(&self, reference: &str, reason: String) -> Result<ConfirmationResult, PaymentFlowError> {
        let payment = self.db.mark_payment_failed(reference).await?;
        self.call_payment_failed_hook(payment, reason.clone()).await;
        Ok(ConfirmationResult::Failed { reason })
    }

    async fn call_purchase_completed_hook(&self, order: Order, payment: Payment, report: &AllocationReport) {
        for emitter in &self.producers.purchase_completed_producer {
            debug!("🔄️📬️ Notifying purchase completed hook subscribers");
            let event = PurchaseCompletedEvent::new(order.clone(), payment.clone(), report.clone());
            emitter.publish_event(event).await;
        }
    }

    async fn call_shortage_hooks(&self, report: &AllocationReport) {
        for emitter in &self.producers.key_shortage_producer {
            for item in report.items.iter().filter(|i| i.shortage() > 0) {
                debug!("🔄️📬️ Notifying key shortage hook subscribers");
                let event = KeyShortageEvent::new(report.order_id, item.product_id, item.shortage());
                emitter.publish_event(event).await;
            }
        }
    }

    async fn call_payment_failed_hook(&self, payment: Payment, reason: String) {
        for emitter in &self.producers.payment_failed_producer {
            debug!("🔄️📬️ Notifying payment failed hook subscribers");
            let event = PaymentFailedEvent::new(payment.clone(), reason.clone());
            emitter.publish_event(event).await;
        }
    }
}
