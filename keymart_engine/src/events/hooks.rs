use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    EventHandler,
    EventProducer,
    Handler,
    KeyShortageEvent,
    PaymentFailedEvent,
    PurchaseCompletedEvent,
};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub purchase_completed_producer: Vec<EventProducer<PurchaseCompletedEvent>>,
    pub key_shortage_producer: Vec<EventProducer<KeyShortageEvent>>,
    pub payment_failed_producer: Vec<EventProducer<PaymentFailedEvent>>,
}

pub struct EventHandlers {
    pub on_purchase_completed: Option<EventHandler<PurchaseCompletedEvent>>,
    pub on_key_shortage: Option<EventHandler<KeyShortageEvent>>,
    pub on_payment_failed: Option<EventHandler<PaymentFailedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_purchase_completed = hooks.on_purchase_completed.map(|f| EventHandler::new(buffer_size, f));
        let on_key_shortage = hooks.on_key_shortage.map(|f| EventHandler::new(buffer_size, f));
        let on_payment_failed = hooks.on_payment_failed.map(|f| EventHandler::new(buffer_size, f));
        Self { on_purchase_completed, on_key_shortage, on_payment_failed }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_purchase_completed {
            result.purchase_completed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_key_shortage {
            result.key_shortage_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_payment_failed {
            result.payment_failed_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_purchase_completed {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_key_shortage {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_payment_failed {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_purchase_completed: Option<Handler<PurchaseCompletedEvent>>,
    pub on_key_shortage: Option<Handler<KeyShortageEvent>>,
    pub on_payment_failed: Option<Handler<PaymentFailedEvent>>,
}

impl EventHooks {
    pub fn on_purchase_completed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PurchaseCompletedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_purchase_completed = Some(Arc::new(f));
        self
    }

    pub fn on_key_shortage<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(KeyShortageEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_key_shortage = Some(Arc::new(f));
        self
    }

    pub fn on_payment_failed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PaymentFailedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_payment_failed = Some(Arc::new(f));
        self
    }
}
