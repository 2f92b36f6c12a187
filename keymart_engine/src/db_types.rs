use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use km_common::Money;
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

//--------------------------------------    PaymentMethod     ---------------------------------------------------------
/// The provider an order intends to pay through. This is a closed set; the confirmation flow dispatches on it with a
/// `match`, so adding a provider is a compile-time change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PaymentMethod {
    /// Synchronous card provider. Verification is a single HTTPS call made from the redirect callback.
    Paystack,
    /// Crypto provider. Verification is asynchronous; the provider re-delivers IPN callbacks until we acknowledge.
    NowPayments,
    /// No payment method has been selected yet.
    None,
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Paystack => write!(f, "Paystack"),
            PaymentMethod::NowPayments => write!(f, "NowPayments"),
            PaymentMethod::None => write!(f, "None"),
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "paystack" => Ok(Self::Paystack),
            "nowpayments" => Ok(Self::NowPayments),
            "none" => Ok(Self::None),
            s => Err(ConversionError(format!("Invalid payment method: {s}"))),
        }
    }
}

impl From<String> for PaymentMethod {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid payment method: {value}. But this conversion cannot fail. Defaulting to None");
            PaymentMethod::None
        })
    }
}

//--------------------------------------    PaymentStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PaymentStatus {
    /// The payment has been created but no verification outcome has been recorded.
    Pending,
    /// The provider confirmed the payment and the reported amount matched exactly.
    Verified,
    /// The provider reported failure, or the reported amount did not match.
    Failed,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "Pending"),
            PaymentStatus::Verified => write!(f, "Verified"),
            PaymentStatus::Failed => write!(f, "Failed"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Verified" => Ok(Self::Verified),
            "Failed" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

//--------------------------------------   FulfilmentStatus   ---------------------------------------------------------
/// Tracks how far key allocation has progressed for an order item. This is an explicit column rather than something
/// inferred from the length of the key list, so that a rerun can tell "never allocated" from "ran short last time".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum FulfilmentStatus {
    /// No keys have been allocated to the item.
    Unfulfilled,
    /// The key pool ran short; fewer keys than `quantity` are attached. A later allocation pass may top this up.
    PartiallyFulfilled,
    /// Exactly `quantity` keys are attached. The allocation engine will never touch this item again.
    Fulfilled,
}

impl Display for FulfilmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FulfilmentStatus::Unfulfilled => write!(f, "Unfulfilled"),
            FulfilmentStatus::PartiallyFulfilled => write!(f, "PartiallyFulfilled"),
            FulfilmentStatus::Fulfilled => write!(f, "Fulfilled"),
        }
    }
}

impl FromStr for FulfilmentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Unfulfilled" => Ok(Self::Unfulfilled),
            "PartiallyFulfilled" => Ok(Self::PartiallyFulfilled),
            "Fulfilled" => Ok(Self::Fulfilled),
            s => Err(ConversionError(format!("Invalid fulfilment status: {s}"))),
        }
    }
}

//--------------------------------------       Product        ---------------------------------------------------------
#[derive(Debug, Clone, FromRow)]
pub struct Product {
    pub id: i64,
    pub title: String,
    /// Displayed stock level. Clamped at zero; the key pool is the ground truth for what can actually be sold.
    pub quantity_in_stock: i64,
    /// Cleared automatically when the stock level reaches zero. Never set again by the engine.
    pub visible: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub title: String,
    pub quantity_in_stock: i64,
}

impl NewProduct {
    pub fn new<S: Into<String>>(title: S, quantity_in_stock: i64) -> Self {
        Self { title: title.into(), quantity_in_stock }
    }
}

//--------------------------------------      ProductKey      ---------------------------------------------------------
/// One license key in a product's pool. Loaded out-of-band by inventory tooling; consumed exactly once by the
/// allocation engine. Once `is_used` is set, the row is never modified or reassigned.
#[derive(Debug, Clone, FromRow)]
pub struct ProductKey {
    pub id: i64,
    pub product_id: i64,
    pub key: String,
    pub password: String,
    pub is_used: bool,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------        KeyPair       ---------------------------------------------------------
/// The credential pair handed to a buyer. Also the shape used when loading new keys into a pool.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct KeyPair {
    pub key: String,
    pub password: String,
}

impl KeyPair {
    pub fn new<S: Into<String>>(key: S, password: S) -> Self {
        Self { key: key.into(), password: password.into() }
    }
}

//--------------------------------------         Order        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Order {
    pub id: i64,
    /// Reference to the buyer in the hosting application's user store.
    pub customer_id: String,
    pub total_price: Money,
    /// Transitions false → true exactly once, and only after successful payment verification.
    pub paid_status: bool,
    pub payment_method: PaymentMethod,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_id: String,
    pub total_price: Money,
    pub payment_method: PaymentMethod,
}

impl NewOrder {
    pub fn new<S: Into<String>>(customer_id: S, total_price: Money, payment_method: PaymentMethod) -> Self {
        Self { customer_id: customer_id.into(), total_price, payment_method }
    }
}

//--------------------------------------      OrderItem       ---------------------------------------------------------
/// One line of a purchase: a product at a quantity, plus the keys allocated to it so far.
///
/// `keys_and_passwords` is written only by the allocation engine. Its length equals `quantity` once the item is
/// `Fulfilled`, or records a documented partial fulfilment otherwise.
#[derive(Debug, Clone)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub price: Money,
    pub total: Money,
    pub keys_and_passwords: Vec<KeyPair>,
    pub fulfilment_status: FulfilmentStatus,
    /// Unique token identifying this line on invoices and in support queries. Generated at insert.
    pub transaction_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderItem {
    pub fn allocated_count(&self) -> i64 {
        self.keys_and_passwords.len() as i64
    }

    /// The number of keys still owed to the buyer for this item.
    pub fn outstanding(&self) -> i64 {
        (self.quantity - self.allocated_count()).max(0)
    }
}

// The key list is stored as a JSON array in a TEXT column, so the row mapping is written by hand.
#[cfg(feature = "sqlite")]
impl FromRow<'_, sqlx::sqlite::SqliteRow> for OrderItem {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        let keys_json: String = row.try_get("keys_and_passwords")?;
        let keys_and_passwords = serde_json::from_str(&keys_json).map_err(|e| sqlx::Error::ColumnDecode {
            index: "keys_and_passwords".to_string(),
            source: Box::new(e),
        })?;
        Ok(Self {
            id: row.try_get("id")?,
            order_id: row.try_get("order_id")?,
            product_id: row.try_get("product_id")?,
            quantity: row.try_get("quantity")?,
            price: row.try_get("price")?,
            total: row.try_get("total")?,
            keys_and_passwords,
            fulfilment_status: row.try_get("fulfilment_status")?,
            transaction_id: row.try_get("transaction_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: i64,
    pub quantity: i64,
    pub price: Money,
}

impl NewOrderItem {
    pub fn new(product_id: i64, quantity: i64, price: Money) -> Self {
        Self { product_id, quantity, price }
    }

    pub fn total(&self) -> Money {
        self.price * self.quantity
    }
}

//--------------------------------------       Payment        ---------------------------------------------------------
/// One payment attempt for an order. There is at most one per order (get-or-create semantics), correlated with the
/// provider through the unique `reference` token.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Payment {
    pub id: i64,
    pub order_id: i64,
    pub amount: Money,
    pub reference: String,
    pub status: PaymentStatus,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn payment_method_round_trip() {
        assert_eq!("paystack".parse::<PaymentMethod>().unwrap(), PaymentMethod::Paystack);
        assert_eq!("NowPayments".parse::<PaymentMethod>().unwrap(), PaymentMethod::NowPayments);
        assert_eq!(PaymentMethod::from("gibberish".to_string()), PaymentMethod::None);
        assert_eq!(PaymentMethod::Paystack.to_string(), "Paystack");
    }

    #[test]
    fn fulfilment_status_parsing() {
        assert_eq!("PartiallyFulfilled".parse::<FulfilmentStatus>().unwrap(), FulfilmentStatus::PartiallyFulfilled);
        assert!("partially_fulfilled".parse::<FulfilmentStatus>().is_err());
    }

    #[test]
    fn order_item_bookkeeping() {
        let item = OrderItem {
            id: 1,
            order_id: 1,
            product_id: 7,
            quantity: 5,
            price: Money::from_whole(10),
            total: Money::from_whole(50),
            keys_and_passwords: vec![KeyPair::new("k1", "p1"), KeyPair::new("k2", "p2")],
            fulfilment_status: FulfilmentStatus::PartiallyFulfilled,
            transaction_id: "txn".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(item.allocated_count(), 2);
        assert_eq!(item.outstanding(), 3);
    }
}
