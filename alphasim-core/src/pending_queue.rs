//! PendingOrderQueue — orders deferred because their ticker was untradable
//! on the origin day, retried at the start of every subsequent tick before
//! any new signal is considered (SPEC_FULL.md §2, step 1).

use crate::domain::{PendingOrder, Ticker};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PendingOrderQueue {
    orders: VecDeque<PendingOrder>,
    max_retries: u32,
    max_retry_days: u32,
}

/// What happened to a pending order on one retry attempt.
pub enum RetryOutcome {
    /// Still untradable; re-enqueued with an incremented retry count.
    StillBlocked(PendingOrder),
    /// Tradable today — ready for the caller to execute.
    Ready(PendingOrder),
    /// Exhausted its retry budget without ever becoming tradable.
    Expired(PendingOrder),
}

impl PendingOrderQueue {
    pub fn new(max_retries: u32, max_retry_days: u32) -> Self {
        Self {
            orders: VecDeque::new(),
            max_retries,
            max_retry_days,
        }
    }

    pub fn enqueue(&mut self, order: PendingOrder) {
        self.orders.push_back(order);
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Drain the entire queue, classifying each order with `is_tradable`,
    /// which is handed the full order (not just its ticker) so the caller
    /// can branch the check on the order's side — a queued sell and a
    /// queued buy for the same ticker are not interchangeable (spec.md
    /// §4.2: sells check `can_sell`, buys check `can_buy`).
    /// `trading_days_since` turns an order's `first_enqueued_date` and the
    /// current `date` into a trading-day count (spec.md §4.5 expires on
    /// trading days elapsed, not calendar days); a `None` result (date off
    /// the calendar) is treated as "age not exceeded" rather than expiring
    /// the order on an unrelated lookup failure.
    ///
    /// Orders that remain blocked are left for the caller to re-enqueue
    /// (kept outside this method so the caller can log/act on each
    /// transition without this type owning that policy).
    pub fn drain_retryable(
        &mut self,
        date: NaiveDate,
        mut is_tradable: impl FnMut(&PendingOrder) -> bool,
        mut trading_days_since: impl FnMut(NaiveDate, NaiveDate) -> Option<usize>,
    ) -> Vec<RetryOutcome> {
        let mut outcomes = Vec::with_capacity(self.orders.len());
        for mut order in self.orders.drain(..) {
            if is_tradable(&order) {
                outcomes.push(RetryOutcome::Ready(order));
                continue;
            }
            order.record_retry();
            let age_exceeded = trading_days_since(order.first_enqueued_date, date)
                .map(|elapsed| order.exceeded_retry_days(elapsed, self.max_retry_days))
                .unwrap_or(false);
            if order.exceeded_retry_budget(self.max_retries) || age_exceeded {
                outcomes.push(RetryOutcome::Expired(order));
            } else {
                outcomes.push(RetryOutcome::StillBlocked(order));
            }
        }
        outcomes
    }

    pub fn requeue(&mut self, order: PendingOrder) {
        self.orders.push_back(order);
    }

    /// Orders currently queued, in retry order. For persistence and for
    /// operator-facing inspection (paper mode's `pending_sells.json`).
    pub fn orders(&self) -> impl Iterator<Item = &PendingOrder> {
        self.orders.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pending_order::PendingOrderReason;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    /// Trading-day calendar stub used by the tests below: every calendar day
    /// counts as a trading day, so elapsed = `to - from` in raw day numbers.
    fn trading_days(from: NaiveDate, to: NaiveDate) -> Option<usize> {
        Some((to - from).num_days().max(0) as usize)
    }

    #[test]
    fn ready_order_passes_through() {
        let mut q = PendingOrderQueue::new(3, 30);
        q.enqueue(PendingOrder::new_buy(
            Ticker::new("A"),
            1000.0,
            date(2),
            PendingOrderReason::Rebalance,
        ));
        let outcomes = q.drain_retryable(date(3), |_| true, trading_days);
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0], RetryOutcome::Ready(_)));
    }

    #[test]
    fn blocked_order_retried_until_budget_exhausted() {
        let mut q = PendingOrderQueue::new(2, 30);
        q.enqueue(PendingOrder::new_buy(
            Ticker::new("A"),
            1000.0,
            date(2),
            PendingOrderReason::Rebalance,
        ));
        let first = q.drain_retryable(date(3), |_| false, trading_days);
        assert!(matches!(first[0], RetryOutcome::StillBlocked(_)));
        if let RetryOutcome::StillBlocked(order) = &first[0] {
            q.requeue(order.clone());
        }
        let second = q.drain_retryable(date(4), |_| false, trading_days);
        assert!(matches!(second[0], RetryOutcome::Expired(_)));
    }

    #[test]
    fn order_past_max_retry_days_expires_even_with_retry_budget_remaining() {
        let mut q = PendingOrderQueue::new(100, 3);
        q.enqueue(PendingOrder::new_buy(
            Ticker::new("A"),
            1000.0,
            date(2),
            PendingOrderReason::Rebalance,
        ));
        let outcomes = q.drain_retryable(date(6), |_| false, trading_days);
        assert!(matches!(outcomes[0], RetryOutcome::Expired(_)));
    }
}
