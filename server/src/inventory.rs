//! Inventory reconciliation
//!
//! Turns the lines of a basket into the counter adjustments the store must
//! apply in the same unit of work as the order rows: one sold-quantity
//! increment per line and one guarded stock decrement per line.

use uuid::Uuid;

use crate::store::NewOrderLine;

/// Counter changes owed by a single persisted order line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockAdjustment {
    pub product_id: Uuid,
    pub shop_id: Uuid,
    pub quantity: i32,
}

impl StockAdjustment {
    pub fn for_line(shop_id: Uuid, line: &NewOrderLine) -> Self {
        Self {
            product_id: line.product_id,
            shop_id,
            quantity: line.quantity,
        }
    }

    /// Stock remaining after this adjustment, or `None` if it would go negative.
    pub fn remaining(&self, available: i32) -> Option<i32> {
        available
            .checked_sub(self.quantity)
            .filter(|remaining| *remaining >= 0)
    }
}

/// Adjustments for every line of a basket, in line order.
pub fn plan(shop_id: Uuid, lines: &[NewOrderLine]) -> Vec<StockAdjustment> {
    lines
        .iter()
        .map(|line| StockAdjustment::for_line(shop_id, line))
        .collect()
}

/// Quantity of the order as a whole, or `None` on overflow.
pub fn total_quantity(lines: &[NewOrderLine]) -> Option<i32> {
    lines
        .iter()
        .try_fold(0i32, |sum, line| sum.checked_add(line.quantity))
}

/// Sum of line totals, or `None` on overflow.
pub fn lines_total(lines: &[NewOrderLine]) -> Option<i64> {
    lines
        .iter()
        .try_fold(0i64, |sum, line| sum.checked_add(line.total))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(product_id: Uuid, quantity: i32, total: i64) -> NewOrderLine {
        NewOrderLine {
            product_id,
            quantity,
            total,
            color: None,
            note: None,
        }
    }

    #[test]
    fn one_adjustment_per_line() {
        let shop = Uuid::new_v4();
        let p = Uuid::new_v4();
        let q = Uuid::new_v4();
        let lines = vec![line(p, 2, 100), line(q, 1, 50), line(p, 3, 150)];

        let adjustments = plan(shop, &lines);

        assert_eq!(adjustments.len(), 3);
        assert!(adjustments.iter().all(|a| a.shop_id == shop));
        assert_eq!(adjustments[2].product_id, p);
        assert_eq!(adjustments[2].quantity, 3);
        assert_eq!(total_quantity(&lines), Some(6));
        assert_eq!(lines_total(&lines), Some(300));
    }

    #[test]
    fn sums_report_overflow() {
        let p = Uuid::new_v4();
        let lines = vec![line(p, i32::MAX, i64::MAX), line(p, 1, 1)];

        assert_eq!(total_quantity(&lines), None);
        assert_eq!(lines_total(&lines), None);
    }

    #[test]
    fn remaining_never_negative() {
        let adjustment = StockAdjustment {
            product_id: Uuid::nil(),
            shop_id: Uuid::nil(),
            quantity: 2,
        };
        assert_eq!(adjustment.remaining(10), Some(8));
        assert_eq!(adjustment.remaining(2), Some(0));
        assert_eq!(adjustment.remaining(1), None);
    }
}
