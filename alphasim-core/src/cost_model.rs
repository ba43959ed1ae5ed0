//! CostModel — pure functions mapping gross notional + side to fee
//! components, per the A-share fee schedule: a negotiated commission rate
//! with a minimum ticket, a stamp tax charged on sells only, and a flat
//! slippage assumption.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    /// Commission rate applied to gross notional, e.g. 0.0003 for 3bps.
    pub commission_rate: Decimal,
    /// Minimum commission per ticket (brokers round up to this floor).
    pub commission_min: Decimal,
    /// Stamp tax rate, charged on sells only.
    pub stamp_tax_rate: Decimal,
    /// Slippage rate applied to gross notional, same for both sides.
    pub slippage_rate: Decimal,
}

/// (gross, commission, stamp_tax, slippage, net_cash_effect)
pub type FeeBreakdown = (Decimal, Decimal, Decimal, Decimal, Decimal);

impl CostModel {
    pub fn commission(&self, gross: Decimal) -> Decimal {
        (gross * self.commission_rate).max(self.commission_min)
    }

    /// Total cash a buy of `gross` notional actually costs (gross + fees).
    pub fn buy_cost(&self, gross: Decimal) -> FeeBreakdown {
        let commission = self.commission(gross);
        let stamp_tax = Decimal::ZERO;
        let slippage = gross * self.slippage_rate;
        let total = gross + commission + stamp_tax + slippage;
        (gross, commission, stamp_tax, slippage, total)
    }

    /// Net cash a sell of `gross` notional actually delivers (gross - fees).
    pub fn sell_proceeds(&self, gross: Decimal) -> FeeBreakdown {
        let commission = self.commission(gross);
        let stamp_tax = gross * self.stamp_tax_rate;
        let slippage = gross * self.slippage_rate;
        let total = gross - commission - stamp_tax - slippage;
        (gross, commission, stamp_tax, slippage, total)
    }
}

impl Default for CostModel {
    /// A representative retail-brokerage schedule: 2.5bps commission with a
    /// 5 CNY floor, 5bps stamp tax on sells, 5bps assumed slippage.
    fn default() -> Self {
        use rust_decimal_macros::dec;
        Self {
            commission_rate: dec!(0.00025),
            commission_min: dec!(5),
            stamp_tax_rate: dec!(0.0005),
            slippage_rate: dec!(0.0005),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn commission_floor_applies_to_small_trades() {
        let model = CostModel::default();
        // 1000 notional * 2.5bps = 0.25, floored to the 5 minimum.
        assert_eq!(model.commission(dec!(1000)), dec!(5));
    }

    #[test]
    fn commission_scales_above_floor() {
        let model = CostModel::default();
        // 1,000,000 * 2.5bps = 250, above the floor.
        assert_eq!(model.commission(dec!(1_000_000)), dec!(250));
    }

    #[test]
    fn buy_cost_has_no_stamp_tax() {
        let model = CostModel::default();
        let (_, _, stamp_tax, _, _) = model.buy_cost(dec!(100_000));
        assert_eq!(stamp_tax, Decimal::ZERO);
    }

    #[test]
    fn sell_proceeds_are_less_than_gross() {
        let model = CostModel::default();
        let (gross, _, _, _, total) = model.sell_proceeds(dec!(100_000));
        assert!(total < gross);
    }

    #[test]
    fn buy_then_sell_round_trip_costs_strictly_positive() {
        let model = CostModel::default();
        let (_, _, _, _, buy_total) = model.buy_cost(dec!(100_000));
        let (_, _, _, _, sell_total) = model.sell_proceeds(dec!(100_000));
        assert!(buy_total > dec!(100_000));
        assert!(sell_total < dec!(100_000));
    }
}
