//! Liquidation conditions and leverage bounds.
//!
//! A position is liquidatable once its loss reaches a fixed fraction of its
//! margin. Liquidation forfeits the whole margin to the LP trader-PnL bucket,
//! not just the loss.

use crate::position::Position;
use crate::types::{Amount, Leverage, Price};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskParams {
    pub max_leverage: Leverage,
    // loss / margin at which the operator may liquidate (0.8 = 80%)
    pub liquidation_threshold: Decimal,
}

impl Default for RiskParams {
    fn default() -> Self {
        Self {
            max_leverage: Leverage::new_unchecked(dec!(10)),
            liquidation_threshold: dec!(0.8),
        }
    }
}

impl RiskParams {
    pub fn allows(&self, leverage: Leverage) -> bool {
        leverage.value() <= self.max_leverage.value()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiquidationStatus {
    Safe { loss: Amount, threshold: Amount },
    Liquidatable { loss: Amount, threshold: Amount },
}

impl LiquidationStatus {
    pub fn is_liquidatable(&self) -> bool {
        matches!(self, LiquidationStatus::Liquidatable { .. })
    }
}

/// Loss in margin tokens against the configured threshold. Profitable positions are safe.
pub fn evaluate_liquidation(
    position: &Position,
    exit_price: Price,
    margin_price: Price,
    params: &RiskParams,
) -> LiquidationStatus {
    let pnl = position.pnl_tokens(exit_price, margin_price);
    let loss = Amount::new((-pnl).max(Decimal::ZERO));
    let threshold = position.margin.mul(params.liquidation_threshold);

    if loss.is_positive() && loss >= threshold {
        LiquidationStatus::Liquidatable { loss, threshold }
    } else {
        LiquidationStatus::Safe { loss, threshold }
    }
}

/// Price of the bet currency at which the loss reaches the threshold.
/// Only meaningful when the margin currency is the bet currency or a stable one;
/// the margin price is held fixed.
pub fn liquidation_price(position: &Position, margin_price: Price, params: &RiskParams) -> Option<Price> {
    let threshold_usd = margin_price.to_usd(position.margin.mul(params.liquidation_threshold));
    if position.size_usd.value().is_zero() {
        return None;
    }
    // loss_usd = |exit - entry| * size / entry
    let move_fraction = threshold_usd.value() / position.size_usd.value();
    let entry = position.entry_price.value();
    let price = entry - position.side.sign() * move_fraction * entry;
    Price::new(price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccountId, Leg, Side, Timestamp, Usd};

    fn long_2x() -> Position {
        Position {
            trader: AccountId(1),
            size_usd: Usd::new(dec!(2000)),
            margin: Amount::new(dec!(1)),
            margin_leg: Leg::Zero,
            bet_leg: Leg::Zero,
            leverage: Leverage::new(dec!(2)).unwrap(),
            entry_price: Price::new_unchecked(dec!(1000)),
            side: Side::Long,
            opened_at: Timestamp::from_millis(0),
        }
    }

    #[test]
    fn leverage_bound() {
        let params = RiskParams::default();
        assert!(params.allows(Leverage::new(dec!(10)).unwrap()));
        assert!(!params.allows(Leverage::new(dec!(10.5)).unwrap()));
    }

    #[test]
    fn small_loss_is_safe() {
        let pos = long_2x();
        // margin token is the bet token: price 900, loss = $200 = 0.2222 tokens
        let price = Price::new_unchecked(dec!(900));
        let status = evaluate_liquidation(&pos, price, price, &RiskParams::default());
        assert!(!status.is_liquidatable());
    }

    #[test]
    fn deep_loss_is_liquidatable() {
        let pos = long_2x();
        let price = Price::new_unchecked(dec!(100));
        let status = evaluate_liquidation(&pos, price, price, &RiskParams::default());
        assert!(status.is_liquidatable());
    }

    #[test]
    fn profit_is_never_liquidatable() {
        let pos = long_2x();
        let price = Price::new_unchecked(dec!(1500));
        let status = evaluate_liquidation(&pos, price, price, &RiskParams::default());
        assert!(matches!(status, LiquidationStatus::Safe { loss, .. } if loss == Amount::zero()));
    }

    #[test]
    fn liquidation_price_with_stable_margin() {
        let mut pos = long_2x();
        // 1000 USDC margin at $1, 2x -> $2000
        pos.margin = Amount::new(dec!(1000));
        let one = Price::new_unchecked(dec!(1));
        // 80% of $1000 = $800 loss -> 40% move on $2000 notional
        let liq = liquidation_price(&pos, one, &RiskParams::default()).unwrap();
        assert_eq!(liq.value(), dec!(600));

        pos.side = Side::Short;
        let liq = liquidation_price(&pos, one, &RiskParams::default()).unwrap();
        assert_eq!(liq.value(), dec!(1400));
    }
}
