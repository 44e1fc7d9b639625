//! Liquidation execution.

use super::core::Engine;
use super::results::{EngineError, LiquidationResult};
use crate::custody::TokenLedger;
use crate::events::{EventPayload, LiquidationEvent, LiquidationReason};
use crate::fee_pool::Bucket;
use crate::liquidation::{evaluate_liquidation, liquidation_price, LiquidationStatus};
use crate::price_feed::{PriceOracle, SpotPriceSource};
use crate::types::{AccountId, Price};

impl<O, P, T> Engine<O, P, T>
where
    O: PriceOracle,
    P: SpotPriceSource,
    T: TokenLedger,
{
    /// Operator-only. Forfeits the whole margin once the loss reaches the threshold.
    pub fn liquidate_position(
        &mut self,
        caller: AccountId,
        trader: AccountId,
    ) -> Result<LiquidationResult, EngineError> {
        self.ensure_operator(caller)?;

        let position = self
            .ledger
            .positions
            .get(trader)
            .ok_or(EngineError::NoPosition(trader))?;

        let prices = self.prices()?;
        let exit_price = prices.get(position.bet_leg);
        let margin_price = prices.get(position.margin_leg);

        match evaluate_liquidation(position, exit_price, margin_price, &self.params.risk) {
            LiquidationStatus::Safe { loss, threshold } => Err(EngineError::NotLiquidatable { loss, threshold }),
            LiquidationStatus::Liquidatable { .. } => self.atomically(|engine| {
                engine.forfeit_position(trader, exit_price, LiquidationReason::Threshold)
            }),
        }
    }

    /// Bet-currency price at which `trader` becomes liquidatable, holding the
    /// margin currency price where it is now.
    pub fn liquidation_price(&self, trader: AccountId) -> Result<Option<Price>, EngineError> {
        let position = self
            .ledger
            .positions
            .get(trader)
            .ok_or(EngineError::NoPosition(trader))?;
        let margin_price = self.price(self.pair.token(position.margin_leg))?;
        Ok(liquidation_price(position, margin_price, &self.params.risk))
    }

    // 8.4: shared by threshold liquidation and funding shortfall. the margin goes
    // to the trader-PnL bucket, the trader leaves the registry. whatever sits in
    // current collateral stays theirs. callers run inside `atomically`.
    pub(super) fn forfeit_position(
        &mut self,
        trader: AccountId,
        exit_price: Price,
        reason: LiquidationReason,
    ) -> Result<LiquidationResult, EngineError> {
        let position = self
            .ledger
            .positions
            .remove(trader)
            .ok_or(EngineError::NoPosition(trader))?;

        let leg = position.margin_leg;
        let loss_usd = position.pnl_usd(exit_price);
        self.ledger.vault.forfeit(trader, leg, position.margin);
        self.ledger.fees.accrue(leg, Bucket::TraderPnl, position.margin);
        self.ledger.registry.remove(trader);

        self.emit_event(EventPayload::Liquidation(LiquidationEvent {
            trader,
            exit_price,
            loss_usd,
            margin_forfeited: position.margin,
            margin_leg: leg,
            reason,
        }));

        Ok(LiquidationResult {
            trader,
            exit_price,
            loss_usd,
            margin_forfeited: position.margin,
            margin_leg: leg,
        })
    }
}
