//! Pricing engine: pure quote math, no state.
//!
//! Buy prices undercut the best competitor sell by a fixed tick. Sell prices
//! start from the target margin grossed up for commission, then optionally
//! chase the best competitor buy as long as break-even still clears.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

use crate::error::LedgerError;

/// Tick by which quotes undercut (buy) or overtake (sell) the competitor.
pub const PRICE_EPSILON: Decimal = dec!(0.001);

/// A fully derived sell quote with its audit trail.
#[derive(Debug, Clone, Serialize)]
pub struct SellQuote {
    pub buy_price: Decimal,
    /// Margin-derived price before any competitor adjustment.
    pub computed_sell_price: Decimal,
    /// Price actually quoted.
    pub final_sell_price: Decimal,
    /// Minimum price at which the round trip is not a loss after commission.
    pub break_even: Decimal,
    pub safety_margin: Decimal,
    pub expected_profit_percent: Decimal,
}

/// Quote a buy price one tick under the competitor's sell price.
pub fn buy_price(competitor_sell_price: Decimal) -> Result<Decimal, LedgerError> {
    if competitor_sell_price <= PRICE_EPSILON {
        return Err(LedgerError::Validation(format!(
            "competitor sell price {competitor_sell_price} is too low to undercut"
        )));
    }
    Ok(competitor_sell_price - PRICE_EPSILON)
}

/// Quote a sell price for asset bought at `buy` targeting `target_profit_rate`
/// margin with `commission_rate` withheld on the sale.
///
/// `target_profit_rate` and `commission_rate` are fractions (0.0257 = 2.57%).
/// When a competitor buy price is given, the quote moves to one tick above it
/// provided that still clears break-even.
pub fn sell_price(
    buy: Decimal,
    target_profit_rate: Decimal,
    commission_rate: Decimal,
    competitor_buy_price: Option<Decimal>,
) -> Result<SellQuote, LedgerError> {
    if buy <= Decimal::ZERO {
        return Err(LedgerError::Validation(format!(
            "buy price {buy} must be positive"
        )));
    }
    if commission_rate < Decimal::ZERO || commission_rate >= Decimal::ONE {
        return Err(LedgerError::Validation(format!(
            "commission rate {commission_rate} must be within [0, 1)"
        )));
    }

    let keep = Decimal::ONE - commission_rate;
    let break_even = buy / keep;
    let computed = buy * (Decimal::ONE + target_profit_rate) / keep;
    if computed <= break_even {
        return Err(LedgerError::UnprofitableQuote {
            computed,
            break_even,
        });
    }

    let final_price = match competitor_buy_price {
        Some(competitor) => {
            let candidate = competitor + PRICE_EPSILON;
            if candidate <= break_even {
                return Err(LedgerError::CompetitorPriceTooLow {
                    candidate,
                    break_even,
                });
            }
            candidate
        }
        None => computed,
    };

    Ok(SellQuote {
        buy_price: buy,
        computed_sell_price: computed,
        final_sell_price: final_price,
        break_even,
        safety_margin: final_price - break_even,
        expected_profit_percent: (final_price - buy) / buy * dec!(100),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buy_price_undercuts_competitor() {
        assert_eq!(buy_price(dec!(1.025)).unwrap(), dec!(1.024));
    }

    #[test]
    fn test_buy_price_rejects_degenerate_competitor() {
        assert!(buy_price(dec!(0.001)).is_err());
        assert!(buy_price(dec!(-1)).is_err());
    }

    #[test]
    fn test_sell_price_from_target_margin() {
        // buy 1.024, target 2.57%, commission 0.35%
        let q = sell_price(dec!(1.024), dec!(0.0257), dec!(0.0035), None).unwrap();

        // break-even = 1.024 / 0.9965
        assert!(q.break_even > dec!(1.0275) && q.break_even < dec!(1.0277));
        // computed = 1.024 * 1.0257 / 0.9965
        assert!(q.computed_sell_price > dec!(1.0539) && q.computed_sell_price < dec!(1.0541));
        assert_eq!(q.final_sell_price, q.computed_sell_price);
        assert!(q.safety_margin > Decimal::ZERO);
        assert!(q.expected_profit_percent > dec!(2.8));
    }

    #[test]
    fn test_sell_price_chases_competitor_above_break_even() {
        let q = sell_price(dec!(1.024), dec!(0.0257), dec!(0.0035), Some(dec!(1.045))).unwrap();
        assert_eq!(q.final_sell_price, dec!(1.046));
        assert!(q.final_sell_price > q.break_even);
    }

    #[test]
    fn test_sell_price_rejects_competitor_below_break_even() {
        let err =
            sell_price(dec!(1.024), dec!(0.0257), dec!(0.0035), Some(dec!(1.020))).unwrap_err();
        assert!(matches!(err, LedgerError::CompetitorPriceTooLow { .. }));
    }

    #[test]
    fn test_sell_price_rejects_zero_margin() {
        let err = sell_price(dec!(1.0), dec!(0), dec!(0.0035), None).unwrap_err();
        assert!(matches!(err, LedgerError::UnprofitableQuote { .. }));
    }

    #[test]
    fn test_sell_price_zero_commission() {
        let q = sell_price(dec!(1.0), dec!(0.02), dec!(0), None).unwrap();
        assert_eq!(q.break_even, dec!(1.0));
        assert_eq!(q.computed_sell_price, dec!(1.02));
        assert_eq!(q.expected_profit_percent, dec!(2.00));
    }

    #[test]
    fn test_sell_price_validates_inputs() {
        assert!(sell_price(dec!(0), dec!(0.02), dec!(0.0035), None).is_err());
        assert!(sell_price(dec!(1.0), dec!(0.02), dec!(1.0), None).is_err());
    }
}
