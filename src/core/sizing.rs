//! Volatility-adjusted position sizing under a fixed risk budget.
//!
//! A returned quantity of zero means "no viable trade" and must
//! short-circuit order submission.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::config::RiskConfig;

pub struct RiskSizer {
    risk_percent: Decimal,
    max_position_fraction: Decimal,
    min_trade_amount: Decimal,
    floor_volatility: Decimal,
    amount_precision: u32,
}

impl RiskSizer {
    pub fn new(risk: &RiskConfig) -> Self {
        Self {
            risk_percent: risk.risk_percent,
            max_position_fraction: risk.max_position_fraction,
            min_trade_amount: risk.min_trade_amount,
            floor_volatility: risk.floor_volatility,
            amount_precision: risk.amount_precision,
        }
    }

    /// Entry quantity in base-asset units.
    ///
    /// `riskAmount / max(atr, floor) / price`, capped by the buying power of
    /// `free_balance * max_position_fraction`, rounded down to the venue
    /// precision. Below the venue minimum the trade is not viable and the
    /// quantity collapses to zero.
    pub fn entry_quantity(
        &self,
        portfolio_value: Decimal,
        atr: Decimal,
        last_price: Decimal,
        free_balance: Decimal,
    ) -> Decimal {
        if last_price <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        let risk_amount = portfolio_value * self.risk_percent / Decimal::ONE_HUNDRED;
        let volatility = atr.max(self.floor_volatility);

        let risk_qty = risk_amount / volatility / last_price;
        let cap_qty = free_balance * self.max_position_fraction / last_price;

        self.finalize(risk_qty.min(cap_qty))
    }

    /// Exit quantity: never sell more than is held.
    ///
    /// The clamp to `held` happens before the minimum-amount check, so a
    /// dust position below the venue minimum yields zero rather than a
    /// rejected order.
    pub fn exit_quantity(&self, requested: Decimal, held: Decimal) -> Decimal {
        self.finalize(requested.min(held))
    }

    fn finalize(&self, raw: Decimal) -> Decimal {
        if raw <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let rounded =
            raw.round_dp_with_strategy(self.amount_precision, RoundingStrategy::ToZero);
        if rounded < self.min_trade_amount {
            Decimal::ZERO
        } else {
            rounded
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sizer() -> RiskSizer {
        RiskSizer {
            risk_percent: dec!(1),
            max_position_fraction: dec!(0.2),
            min_trade_amount: dec!(0.00001),
            floor_volatility: dec!(0.000001),
            amount_precision: 5,
        }
    }

    #[test]
    fn worked_entry_scenario() {
        // riskAmount = 10, rawQty = min(10/5/50000, 500*0.2/50000)
        //            = min(0.00004, 0.002) = 0.00004.
        let qty = sizer().entry_quantity(dec!(1000), dec!(5), dec!(50000), dec!(500));
        assert_eq!(qty, dec!(0.00004));
    }

    #[test]
    fn notional_never_exceeds_buying_power() {
        let s = sizer();
        let cases = [
            (dec!(100000), dec!(0.001), dec!(50000), dec!(500)),
            (dec!(1000), dec!(5), dec!(100), dec!(50)),
            (dec!(5000), dec!(0.5), dec!(2000), dec!(10)),
        ];
        for (portfolio, atr, price, free) in cases {
            let qty = s.entry_quantity(portfolio, atr, price, free);
            assert!(
                qty * price <= free * dec!(0.2),
                "notional {} exceeds cap for free {free}",
                qty * price
            );
        }
    }

    #[test]
    fn rounds_down_to_venue_precision() {
        // riskAmount = 1000*1/100 = 10; 10 / 1 / 3 = 3.3333... -> 3.33333.
        let qty = sizer().entry_quantity(dec!(1000), dec!(1), dec!(3), dec!(1000000));
        assert_eq!(qty, dec!(3.33333));
    }

    #[test]
    fn below_minimum_collapses_to_zero() {
        // raw quantity rounds to below the venue minimum.
        let qty = sizer().entry_quantity(dec!(1), dec!(5), dec!(50000), dec!(500));
        assert_eq!(qty, Decimal::ZERO);
    }

    #[test]
    fn atr_floor_prevents_blowup() {
        // Flat market, ATR = 0: the floor keeps the division finite and the
        // balance cap still binds.
        let qty = sizer().entry_quantity(dec!(1000), Decimal::ZERO, dec!(50000), dec!(500));
        assert_eq!(qty, dec!(0.002));
    }

    #[test]
    fn zero_price_yields_zero() {
        let qty = sizer().entry_quantity(dec!(1000), dec!(5), Decimal::ZERO, dec!(500));
        assert_eq!(qty, Decimal::ZERO);
    }

    #[test]
    fn exit_clamps_to_held() {
        assert_eq!(sizer().exit_quantity(dec!(2), dec!(0.5)), dec!(0.5));
        assert_eq!(sizer().exit_quantity(dec!(0.3), dec!(0.5)), dec!(0.3));
    }

    #[test]
    fn exit_dust_position_yields_zero() {
        // Held amount below the venue minimum: clamp first, then the
        // minimum check collapses it.
        assert_eq!(sizer().exit_quantity(dec!(1), dec!(0.000001)), Decimal::ZERO);
    }

    #[test]
    fn exit_never_negative() {
        assert_eq!(sizer().exit_quantity(dec!(1), Decimal::ZERO), Decimal::ZERO);
        assert_eq!(sizer().exit_quantity(dec!(-1), dec!(2)), Decimal::ZERO);
    }
}
