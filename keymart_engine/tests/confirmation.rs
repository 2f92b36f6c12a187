//! The payment confirmation state machine: provider outcomes, amount matching, webhook replays and event hooks.
use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicI32, Ordering},
        Arc,
    },
};

use keymart_engine::{
    db_types::{PaymentMethod, PaymentStatus},
    events::{EventHandlers, EventHooks},
    traits::{FulfilmentDatabase, VerificationOutcome},
    ConfirmationResult,
    PaymentFlowApi,
    PaymentFlowError,
};
use km_common::Money;

mod support;
use support::{api_for, new_db, place_single_item_order, seed_product, MockProvider};

#[tokio::test]
async fn exact_amount_match_confirms_and_allocates() {
    let db = new_db().await;
    let product = seed_product(&db, "game", 5).await;
    let api = api_for(db.clone());

    let (order, payment) = place_single_item_order(&api, "alice", PaymentMethod::Paystack, product.id, 2).await;
    assert_eq!(payment.status, PaymentStatus::Pending);

    let provider = MockProvider::verifying(PaymentMethod::Paystack, Money::from_whole(20));
    let result = api.confirm_payment(&provider, &payment.reference).await.unwrap();
    assert!(matches!(result, ConfirmationResult::Allocated(_)));
    assert_eq!(provider.calls(), 1);

    let payment = db.fetch_payment_by_reference(&payment.reference).await.unwrap();
    assert_eq!(payment.status, PaymentStatus::Verified);
    assert!(payment.verified);
    assert!(db.fetch_order(order.id).await.unwrap().paid_status);
}

#[tokio::test]
async fn replayed_webhook_is_a_safe_noop() {
    let db = new_db().await;
    let product = seed_product(&db, "album", 5).await;
    let api = api_for(db.clone());

    let (order, payment) = place_single_item_order(&api, "bob", PaymentMethod::NowPayments, product.id, 2).await;
    let provider = MockProvider::verifying(PaymentMethod::NowPayments, Money::from_whole(20));

    let first = api.confirm_payment(&provider, &payment.reference).await.unwrap();
    let keys_after_first = db.fetch_order_items(order.id).await.unwrap()[0].keys_and_passwords.clone();

    // The provider re-delivers the IPN. The stored outcome is replayed without consulting the provider again.
    let second = api.confirm_payment(&provider, &payment.reference).await.unwrap();
    assert_eq!(provider.calls(), 1);
    match (first, second) {
        (ConfirmationResult::Allocated(a), ConfirmationResult::Allocated(b)) => assert_eq!(a, b),
        other => panic!("Expected two full allocations, got {other:?}"),
    }
    let keys_after_second = db.fetch_order_items(order.id).await.unwrap()[0].keys_and_passwords.clone();
    assert_eq!(keys_after_first, keys_after_second);
    assert_eq!(db.unused_key_count(product.id).await.unwrap(), 3);
}

#[tokio::test]
async fn amount_mismatch_fails_verification() {
    let db = new_db().await;
    let product = seed_product(&db, "tool", 5).await;
    let api = api_for(db.clone());

    let (order, payment) = place_single_item_order(&api, "carol", PaymentMethod::Paystack, product.id, 2).await;
    // Provider settles 1 cent short.
    let provider = MockProvider::verifying(PaymentMethod::Paystack, Money::from_cents(1999));

    let result = api.confirm_payment(&provider, &payment.reference).await.unwrap();
    let reason = match result {
        ConfirmationResult::Failed { reason } => reason,
        other => panic!("Expected a failed confirmation, got {other:?}"),
    };
    assert!(reason.contains("does not match"));

    let payment = db.fetch_payment_by_reference(&payment.reference).await.unwrap();
    assert_eq!(payment.status, PaymentStatus::Failed);
    assert!(!db.fetch_order(order.id).await.unwrap().paid_status);
    assert_eq!(db.unused_key_count(product.id).await.unwrap(), 5);

    // A replay of the webhook reports the stored failure without another provider round trip.
    let replay = api.confirm_payment(&provider, &payment.reference).await.unwrap();
    assert!(matches!(replay, ConfirmationResult::Failed { .. }));
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn pending_outcome_changes_nothing() {
    let db = new_db().await;
    let product = seed_product(&db, "ebook", 5).await;
    let api = api_for(db.clone());

    let (order, payment) = place_single_item_order(&api, "dave", PaymentMethod::NowPayments, product.id, 1).await;
    let provider = MockProvider::new(PaymentMethod::NowPayments, VerificationOutcome::Pending);

    let result = api.confirm_payment(&provider, &payment.reference).await.unwrap();
    assert!(matches!(result, ConfirmationResult::Pending));
    assert_eq!(
        db.fetch_payment_by_reference(&payment.reference).await.unwrap().status,
        PaymentStatus::Pending
    );
    assert!(!db.fetch_order(order.id).await.unwrap().paid_status);

    // The provider settles, and the next delivery completes the purchase.
    provider.set_outcome(VerificationOutcome::Verified { amount: Money::from_whole(10) });
    let result = api.confirm_payment(&provider, &payment.reference).await.unwrap();
    assert!(matches!(result, ConfirmationResult::Allocated(_)));
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn provider_rejection_marks_the_payment_failed() {
    let db = new_db().await;
    let product = seed_product(&db, "font", 5).await;
    let api = api_for(db.clone());

    let (_, payment) = place_single_item_order(&api, "erin", PaymentMethod::Paystack, product.id, 1).await;
    let provider = MockProvider::new(PaymentMethod::Paystack, VerificationOutcome::Failed {
        reason: "Card declined".to_string(),
    });

    let result = api.confirm_payment(&provider, &payment.reference).await.unwrap();
    assert!(matches!(result, ConfirmationResult::Failed { reason } if reason == "Card declined"));
    assert_eq!(
        db.fetch_payment_by_reference(&payment.reference).await.unwrap().status,
        PaymentStatus::Failed
    );
}

#[tokio::test]
async fn provider_outage_leaves_the_payment_pending() {
    let db = new_db().await;
    let product = seed_product(&db, "theme", 5).await;
    let api = api_for(db.clone());

    let (order, payment) = place_single_item_order(&api, "dana", PaymentMethod::NowPayments, product.id, 2).await;
    let provider = MockProvider::unreachable(PaymentMethod::NowPayments);

    // The outage aborts the attempt without recording an outcome; no keys move and the order stays unpaid.
    let err = api.confirm_payment(&provider, &payment.reference).await.unwrap_err();
    assert!(matches!(err, PaymentFlowError::VerificationError(_)));
    assert_eq!(
        db.fetch_payment_by_reference(&payment.reference).await.unwrap().status,
        PaymentStatus::Pending
    );
    assert!(!db.fetch_order(order.id).await.unwrap().paid_status);
    assert_eq!(db.unused_key_count(product.id).await.unwrap(), 5);

    // The provider comes back, and the webhook re-delivery completes the purchase.
    provider.set_outcome(VerificationOutcome::Verified { amount: Money::from_whole(20) });
    let result = api.confirm_payment(&provider, &payment.reference).await.unwrap();
    assert!(matches!(result, ConfirmationResult::Allocated(_)));
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn wrong_provider_is_rejected() {
    let db = new_db().await;
    let product = seed_product(&db, "plugin", 5).await;
    let api = api_for(db.clone());

    let (_, payment) = place_single_item_order(&api, "frank", PaymentMethod::Paystack, product.id, 1).await;
    let provider = MockProvider::verifying(PaymentMethod::NowPayments, Money::from_whole(10));

    let err = api.confirm_payment(&provider, &payment.reference).await.unwrap_err();
    assert!(matches!(err, PaymentFlowError::ProviderMismatch { .. }));
}

#[tokio::test]
async fn unknown_reference_is_an_error() {
    let db = new_db().await;
    let api = api_for(db);
    let provider = MockProvider::verifying(PaymentMethod::Paystack, Money::from_whole(10));
    let err = api.confirm_payment(&provider, "no-such-ref").await.unwrap_err();
    assert!(err.to_string().contains("does not exist"));
}

#[tokio::test]
async fn payment_for_order_is_get_or_create() {
    let db = new_db().await;
    let product = seed_product(&db, "sample", 5).await;
    let api = api_for(db.clone());

    let (order, payment) = place_single_item_order(&api, "gina", PaymentMethod::Paystack, product.id, 1).await;
    let again = api.payment_for_order(order.id).await.unwrap();
    assert_eq!(payment.id, again.id);
    assert_eq!(payment.reference, again.reference);
}

#[derive(Default, Clone)]
struct HookCounter {
    called: Arc<AtomicI32>,
}

impl HookCounter {
    fn bump(&self) {
        let _ = self.called.fetch_add(1, Ordering::Relaxed);
    }

    fn count(&self) -> i32 {
        self.called.load(Ordering::Relaxed)
    }
}

#[tokio::test]
async fn hooks_fire_on_purchase_and_shortage() {
    let db = new_db().await;
    let product = seed_product(&db, "short", 2).await;

    let purchases = HookCounter::default();
    let shortages = HookCounter::default();
    let p2 = purchases.clone();
    let s2 = shortages.clone();
    let mut hooks = EventHooks::default();
    hooks.on_purchase_completed(move |ev| {
        let counter = p2.clone();
        Box::pin(async move {
            assert!(ev.report.is_partial());
            counter.bump();
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    hooks.on_key_shortage(move |ev| {
        let counter = s2.clone();
        Box::pin(async move {
            assert_eq!(ev.shortage, 3);
            counter.bump();
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    let handlers = EventHandlers::new(10, hooks);
    let api = PaymentFlowApi::new(db.clone(), handlers.producers());
    let start = handlers.start_handlers();

    let (_, payment) = place_single_item_order(&api, "hugo", PaymentMethod::Paystack, product.id, 5).await;
    let provider = MockProvider::verifying(PaymentMethod::Paystack, Money::from_whole(50));
    api.confirm_payment(&provider, &payment.reference).await.unwrap();

    // Drop the producers so the handlers drain and shut down.
    drop(api);
    start.await;
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    assert_eq!(purchases.count(), 1);
    assert_eq!(shortages.count(), 1);
}
