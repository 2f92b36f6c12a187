mod token;

pub use token::{random_reference, random_transaction_id, PAYMENT_REFERENCE_LEN, TRANSACTION_ID_LEN};
