use rand::{distributions::Alphanumeric, Rng};

pub const PAYMENT_REFERENCE_LEN: usize = 12;
pub const TRANSACTION_ID_LEN: usize = 16;

/// Generates a candidate payment reference. Uniqueness is enforced by the database; callers must retry on a
/// collision.
pub fn random_reference() -> String {
    random_token(PAYMENT_REFERENCE_LEN)
}

/// Generates a candidate transaction id for an order item.
pub fn random_transaction_id() -> String {
    format!("txn-{}", random_token(TRANSACTION_ID_LEN))
}

fn random_token(len: usize) -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(len).map(char::from).collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn token_shape() {
        let reference = random_reference();
        assert_eq!(reference.len(), PAYMENT_REFERENCE_LEN);
        assert!(reference.chars().all(|c| c.is_ascii_alphanumeric()));
        let txn = random_transaction_id();
        assert!(txn.starts_with("txn-"));
        assert_eq!(txn.len(), TRANSACTION_ID_LEN + 4);
    }

    #[test]
    fn tokens_are_not_constant() {
        let a = random_reference();
        let b = random_reference();
        // Astronomically unlikely to collide.
        assert_ne!(a, b);
    }
}
