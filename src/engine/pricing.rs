//! Price reads. Nothing here mutates the ledger.

use super::core::Engine;
use super::results::EngineError;
use crate::custody::TokenLedger;
use crate::liquidity::PooledValue;
use crate::price_feed::{LegPrices, PriceOracle, SpotPriceSource};
use crate::types::{Price, TokenId};

impl<O, P, T> Engine<O, P, T>
where
    O: PriceOracle,
    P: SpotPriceSource,
    T: TokenLedger,
{
    /// USD price of either pool token at the engine clock.
    pub fn price(&self, token: TokenId) -> Result<Price, EngineError> {
        let leg = self.leg_of(token)?;
        Ok(self.resolver.price(leg, &self.oracle, &self.pool, self.current_time)?)
    }

    /// Both legs from one oracle read.
    pub fn prices(&self) -> Result<LegPrices, EngineError> {
        Ok(self.resolver.prices(&self.oracle, &self.pool, self.current_time)?)
    }

    pub fn pooled_value_usd(&self) -> Result<PooledValue, EngineError> {
        let prices = self.prices()?;
        Ok(self.ledger.liquidity.pooled_value_usd(&prices))
    }
}

#[cfg(test)]
mod tests {
    use super::super::core::test_support::*;
    use crate::engine::EngineError;
    use crate::types::TokenId;
    use rust_decimal_macros::dec;

    #[test]
    fn both_legs_priced() {
        let engine = setup();
        assert_eq!(engine.price(WETH).unwrap().value().round_dp(6), dec!(1000));
        assert_eq!(engine.price(USDC).unwrap().value().round_dp(6), dec!(1));
    }

    #[test]
    fn unknown_token_rejected() {
        let engine = setup();
        assert!(matches!(
            engine.price(TokenId(99)),
            Err(EngineError::UnsupportedCurrency(TokenId(99)))
        ));
    }

    #[test]
    fn stale_oracle_rejected() {
        let mut engine = setup();
        engine.advance_time(2 * 60 * 60 * 1000);
        let err = engine.price(WETH).unwrap_err();
        assert!(matches!(err, EngineError::StalePrice(_)));
    }

    #[test]
    fn pooled_value_covers_both_reserves() {
        let engine = setup();
        let value = engine.pooled_value_usd().unwrap();
        // 100 WETH at 1000 + 100k USDC at 1
        assert_eq!(value.total.value().round_dp(4), dec!(200000));
    }
}
