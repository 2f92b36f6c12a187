use keymart_engine::{traits::AllocationReport, ConfirmationResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Returned by the pay routes: where to send the buyer, and the reference to correlate the callback with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub checkout_url: String,
    pub reference: String,
}

/// Body for `/paystack/pay/{order_id}`. Paystack requires the buyer's email to open a checkout page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaystackCheckoutRequest {
    pub email: String,
}

/// The IPN payload NOWPayments posts to our webhook. Only `order_id` is trusted; it carries our payment reference,
/// and everything else is re-fetched from the provider before any state changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpnPayload {
    pub order_id: String,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub payment_id: Option<Value>,
}

/// What the confirmation routes report back to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationSummary {
    pub outcome: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<AllocationReport>,
}

impl From<ConfirmationResult> for ConfirmationSummary {
    fn from(result: ConfirmationResult) -> Self {
        match result {
            ConfirmationResult::Allocated(report) => Self {
                outcome: "allocated".to_string(),
                message: format!("Payment verified. {} keys issued.", report.total_allocated()),
                report: Some(report),
            },
            ConfirmationResult::AllocatedPartial(report) => Self {
                outcome: "allocated_partial".to_string(),
                message: format!(
                    "Payment verified. {} keys issued, {} outstanding pending restock.",
                    report.total_allocated(),
                    report.total_shortage()
                ),
                report: Some(report),
            },
            ConfirmationResult::Pending => Self {
                outcome: "pending".to_string(),
                message: "The provider has not settled this payment yet.".to_string(),
                report: None,
            },
            ConfirmationResult::Failed { reason } => {
                Self { outcome: "failed".to_string(), message: reason, report: None }
            },
        }
    }
}
