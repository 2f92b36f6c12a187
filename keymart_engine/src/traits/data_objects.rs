use serde::{Deserialize, Serialize};

/// The outcome of allocating keys to a single order item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAllocation {
    pub order_item_id: i64,
    pub product_id: i64,
    /// How many keys the buyer ordered.
    pub requested: i64,
    /// How many keys are attached to the item after the allocation pass.
    pub allocated: i64,
}

impl ItemAllocation {
    pub fn shortage(&self) -> i64 {
        self.requested - self.allocated
    }
}

/// A snapshot of an order's fulfilment state after an allocation pass. Carried on the purchase events so that
/// subscribers can tell a clean fulfilment from a shortage without another database round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationReport {
    pub order_id: i64,
    pub items: Vec<ItemAllocation>,
}

impl AllocationReport {
    pub fn new(order_id: i64, items: Vec<ItemAllocation>) -> Self {
        Self { order_id, items }
    }

    /// True if any item received fewer keys than it needed.
    pub fn is_partial(&self) -> bool {
        self.items.iter().any(|item| item.allocated < item.requested)
    }

    pub fn total_allocated(&self) -> i64 {
        self.items.iter().map(|item| item.allocated).sum()
    }

    pub fn total_shortage(&self) -> i64 {
        self.items.iter().map(|item| item.shortage()).sum()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn report_partial_detection() {
        let full = AllocationReport::new(1, vec![ItemAllocation {
            order_item_id: 1,
            product_id: 2,
            requested: 3,
            allocated: 3,
        }]);
        assert!(!full.is_partial());
        assert_eq!(full.total_shortage(), 0);

        let short = AllocationReport::new(1, vec![
            ItemAllocation { order_item_id: 1, product_id: 2, requested: 3, allocated: 3 },
            ItemAllocation { order_item_id: 2, product_id: 5, requested: 4, allocated: 1 },
        ]);
        assert!(short.is_partial());
        assert_eq!(short.total_allocated(), 4);
        assert_eq!(short.total_shortage(), 3);
    }
}
