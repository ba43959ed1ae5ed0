//! Scheduler — deterministic rebalance-day, batch-tranche, and
//! holding-period-exit determination from the trading calendar alone.
//!
//! A rebalance day is the first trading day of the calendar, or any day `D`
//! for which the count of trading days in `(last_rebalance_date, D]` equals
//! the configured `rebalance_freq` (SPEC_FULL.md §4.9, literal trading-day
//! count — not a calendar-boundary approximation). `last_rebalance_date` is
//! state the scheduler carries itself and advances via `mark_rebalanced`;
//! the paper runner persists it across process invocations as
//! `runs/rebalance_state.json` (SPEC_FULL.md §6).

use chrono::NaiveDate;

/// Optional batch-rebalance mode: the target universe is split across
/// `tranches` tranches, one tranche's worth rotated in per rebalance period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchRebalanceConfig {
    pub tranches: usize,
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    /// Full ordered trading calendar the run operates over.
    calendar: Vec<NaiveDate>,
    /// Trading-day count between rebalances (spec.md §4.9's `rebalance_freq`).
    rebalance_freq: usize,
    /// Number of trading days a position is held before a forced exit, if any.
    holding_period_days: Option<usize>,
    last_rebalance_date: Option<NaiveDate>,
    batch: Option<BatchRebalanceConfig>,
    tranche_index: usize,
}

impl Scheduler {
    pub fn new(
        calendar: Vec<NaiveDate>,
        rebalance_freq: usize,
        holding_period_days: Option<usize>,
    ) -> Self {
        Self {
            calendar,
            rebalance_freq: rebalance_freq.max(1),
            holding_period_days,
            last_rebalance_date: None,
            batch: None,
            tranche_index: 0,
        }
    }

    /// Resume from a previously recorded `last_rebalance_date` (the paper
    /// runner's `runs/rebalance_state.json`).
    pub fn with_last_rebalance_date(mut self, date: Option<NaiveDate>) -> Self {
        self.last_rebalance_date = date;
        self
    }

    /// Enable batch-rebalance tranche tracking, resuming at `tranche_index`
    /// (0 if this is a fresh run).
    pub fn with_batch(mut self, batch: BatchRebalanceConfig, tranche_index: usize) -> Self {
        self.tranche_index = if batch.tranches == 0 {
            0
        } else {
            tranche_index % batch.tranches
        };
        self.batch = Some(batch);
        self
    }

    pub fn calendar(&self) -> &[NaiveDate] {
        &self.calendar
    }

    pub fn last_rebalance_date(&self) -> Option<NaiveDate> {
        self.last_rebalance_date
    }

    /// The tranche due on the next rebalance, if batch mode is enabled.
    pub fn current_tranche(&self) -> Option<usize> {
        self.batch.map(|_| self.tranche_index)
    }

    pub fn tranche_count(&self) -> Option<usize> {
        self.batch.map(|b| b.tranches)
    }

    fn index_of(&self, date: NaiveDate) -> Option<usize> {
        self.calendar.iter().position(|d| *d == date)
    }

    /// Is `date` a rebalance day under the configured frequency? The first
    /// trading day of the calendar is always a rebalance day.
    pub fn is_rebalance_day(&self, date: NaiveDate) -> bool {
        let Some(idx) = self.index_of(date) else {
            return false;
        };
        if idx == 0 {
            return true;
        }
        match self.last_rebalance_date.and_then(|d| self.index_of(d)) {
            None => true,
            Some(last_idx) => idx.saturating_sub(last_idx) >= self.rebalance_freq,
        }
    }

    /// Record that the rebalance pipeline ran on `date`; advances the
    /// batch-tranche cursor if batch mode is enabled. The caller invokes
    /// this once the signal pipeline for `date` has completed, per
    /// spec.md §4.9 ("update `last_rebalance_date := D` after the signal
    /// pipeline completes").
    pub fn mark_rebalanced(&mut self, date: NaiveDate) {
        self.last_rebalance_date = Some(date);
        if let Some(batch) = self.batch {
            if batch.tranches > 0 {
                self.tranche_index = (self.tranche_index + 1) % batch.tranches;
            }
        }
    }

    /// The trading-calendar date `trading_days` sessions after `date`, or
    /// `None` if it runs past the end of the calendar.
    pub fn advance_trading_days(&self, date: NaiveDate, trading_days: usize) -> Option<NaiveDate> {
        let idx = self.index_of(date)?;
        self.calendar.get(idx + trading_days).copied()
    }

    /// Given an entry date, compute the scheduled forced-exit date under the
    /// configured holding-period policy (`None` if no such policy is set).
    pub fn exit_due_date(&self, entry_date: NaiveDate) -> Option<NaiveDate> {
        let days = self.holding_period_days?;
        self.advance_trading_days(entry_date, days)
    }

    /// The next trading day after `date`, used to resolve T -> T+1.
    pub fn next_trading_day(&self, date: NaiveDate) -> Option<NaiveDate> {
        self.advance_trading_days(date, 1)
    }

    /// Number of trading-calendar sessions between `from` and `to`
    /// (inclusive of `to`, exclusive of `from`), or `None` if either date is
    /// off the calendar. Used by the pending-order queue to measure
    /// `D - first_enqueued_date` in trading days, not calendar days
    /// (spec.md §4.5's `max_retry_days` expiry rule).
    pub fn trading_days_since(&self, from: NaiveDate, to: NaiveDate) -> Option<usize> {
        let from_idx = self.index_of(from)?;
        let to_idx = self.index_of(to)?;
        Some(to_idx.saturating_sub(from_idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cal(days: &[u32]) -> Vec<NaiveDate> {
        days.iter()
            .map(|d| NaiveDate::from_ymd_opt(2024, 1, *d).unwrap())
            .collect()
    }

    #[test]
    fn daily_frequency_rebalances_every_day() {
        let mut sched = Scheduler::new(cal(&[2, 3, 4]), 1, None);
        let d2 = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let d3 = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        assert!(sched.is_rebalance_day(d2));
        sched.mark_rebalanced(d2);
        assert!(sched.is_rebalance_day(d3));
    }

    #[test]
    fn first_calendar_day_is_always_rebalance_day() {
        let sched = Scheduler::new(cal(&[2, 3, 4]), 21, None);
        assert!(sched.is_rebalance_day(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()));
    }

    #[test]
    fn frequency_n_waits_n_trading_days_since_last_rebalance() {
        let mut sched = Scheduler::new(cal(&[2, 3, 4, 5, 8]), 3, None);
        let d2 = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let d3 = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        let d4 = NaiveDate::from_ymd_opt(2024, 1, 4).unwrap();
        let d5 = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        sched.mark_rebalanced(d2);
        assert!(!sched.is_rebalance_day(d3));
        assert!(!sched.is_rebalance_day(d4));
        assert!(sched.is_rebalance_day(d5));
    }

    #[test]
    fn non_calendar_date_is_never_a_rebalance_day() {
        let sched = Scheduler::new(cal(&[2, 3, 4]), 1, None);
        assert!(!sched.is_rebalance_day(NaiveDate::from_ymd_opt(2024, 1, 9).unwrap()));
    }

    #[test]
    fn next_trading_day_skips_non_trading_gaps() {
        // 5th is a weekend/holiday, absent from the calendar.
        let sched = Scheduler::new(cal(&[4, 8]), 1, None);
        let d4 = NaiveDate::from_ymd_opt(2024, 1, 4).unwrap();
        let d8 = NaiveDate::from_ymd_opt(2024, 1, 8).unwrap();
        assert_eq!(sched.next_trading_day(d4), Some(d8));
    }

    #[test]
    fn exit_due_date_counts_trading_sessions_not_calendar_days() {
        let sched = Scheduler::new(cal(&[2, 3, 4, 5, 8]), 1, Some(2));
        let entry = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert_eq!(
            sched.exit_due_date(entry),
            Some(NaiveDate::from_ymd_opt(2024, 1, 4).unwrap())
        );
    }

    #[test]
    fn exit_due_date_none_when_no_holding_period_configured() {
        let sched = Scheduler::new(cal(&[2, 3, 4]), 1, None);
        assert_eq!(sched.exit_due_date(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()), None);
    }

    #[test]
    fn resuming_from_a_persisted_last_rebalance_date_honors_the_cadence() {
        let sched = Scheduler::new(cal(&[2, 3, 4, 5, 8]), 3, None)
            .with_last_rebalance_date(Some(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()));
        assert!(!sched.is_rebalance_day(NaiveDate::from_ymd_opt(2024, 1, 4).unwrap()));
        assert!(sched.is_rebalance_day(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()));
    }

    #[test]
    fn batch_tranche_cursor_rotates_on_mark_rebalanced() {
        let mut sched = Scheduler::new(cal(&[2, 3, 4]), 1, None)
            .with_batch(BatchRebalanceConfig { tranches: 3 }, 0);
        assert_eq!(sched.current_tranche(), Some(0));
        sched.mark_rebalanced(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(sched.current_tranche(), Some(1));
        sched.mark_rebalanced(NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
        assert_eq!(sched.current_tranche(), Some(2));
        sched.mark_rebalanced(NaiveDate::from_ymd_opt(2024, 1, 4).unwrap());
        assert_eq!(sched.current_tranche(), Some(0));
    }
}
