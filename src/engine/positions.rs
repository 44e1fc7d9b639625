//! Opening and closing positions.

use super::core::Engine;
use super::results::{CloseResult, EngineError, OpenResult};
use crate::custody::TokenLedger;
use crate::events::{EventPayload, PositionClosedEvent, PositionOpenedEvent};
use crate::fee_pool::Bucket;
use crate::position::{position_size_usd, settle, Position};
use crate::price_feed::{PriceOracle, SpotPriceSource};
use crate::types::{AccountId, Amount, Leverage, Side, TokenId};
use rust_decimal::Decimal;

impl<O, P, T> Engine<O, P, T>
where
    O: PriceOracle,
    P: SpotPriceSource,
    T: TokenLedger,
{
    /// Opens the trader's single position. `margin` is taken from their current
    /// collateral in `margin_token`; fees come out of it before sizing.
    pub fn open_position(
        &mut self,
        trader: AccountId,
        bet_token: TokenId,
        margin: Amount,
        margin_token: TokenId,
        leverage: Decimal,
        side: Side,
    ) -> Result<OpenResult, EngineError> {
        let leverage = Leverage::new(leverage).ok_or(EngineError::InvalidLeverage(leverage))?;
        if !self.params.risk.allows(leverage) {
            return Err(EngineError::LeverageTooHigh {
                requested: leverage.value(),
                max: self.params.risk.max_leverage.value(),
            });
        }
        if self.ledger.positions.has_position(trader) {
            return Err(EngineError::PositionExists(trader));
        }
        let bet_leg = self.leg_of(bet_token)?;
        let margin_leg = self.leg_of(margin_token)?;
        if !margin.is_positive() {
            return Err(EngineError::InvalidAmount);
        }

        let prices = self.prices()?;

        self.atomically(|engine| {
            // margin must be principal, not a claim on the buckets
            engine.settle_profit_claim(trader, margin_leg)?;

            let available = engine.ledger.vault.current(trader, margin_leg);
            if margin > available {
                return Err(EngineError::InsufficientCollateral {
                    leg: margin_leg,
                    required: margin,
                    available,
                });
            }

            let opening_fee = engine.params.fees.opening_fee_on(margin);
            let leverage_fee = engine.params.fees.leverage_fee_on(margin, leverage);
            let effective_margin = margin.sub(opening_fee).sub(leverage_fee);

            let margin_price = prices.get(margin_leg);
            let entry_price = prices.get(bet_leg);
            let size_usd = position_size_usd(effective_margin, margin_price, leverage);

            let locked = engine.ledger.positions.locked_usd;
            let pooled = engine.ledger.liquidity.pooled_value_usd(&prices).total;
            if locked.add(size_usd) > pooled {
                return Err(EngineError::CapacityExceeded {
                    locked,
                    size: size_usd,
                    pooled,
                });
            }

            engine
                .ledger
                .vault
                .charge(trader, margin_leg, opening_fee.add(leverage_fee))?;
            engine.ledger.vault.debit(trader, margin_leg, effective_margin)?;
            engine.ledger.fees.accrue(margin_leg, Bucket::Trading, opening_fee);
            engine.ledger.fees.accrue(margin_leg, Bucket::Leverage, leverage_fee);

            engine.ledger.positions.insert(Position {
                trader,
                size_usd,
                margin: effective_margin,
                margin_leg,
                bet_leg,
                leverage,
                entry_price,
                side,
                opened_at: engine.current_time,
            });
            engine.ledger.registry.insert(trader);

            engine.emit_event(EventPayload::PositionOpened(PositionOpenedEvent {
                trader,
                side,
                bet_leg,
                margin_leg,
                margin: effective_margin,
                fees: opening_fee.add(leverage_fee),
                leverage,
                size_usd,
                entry_price,
            }));

            Ok(OpenResult {
                size_usd,
                entry_price,
                margin: effective_margin,
                opening_fee,
                leverage_fee,
            })
        })
    }

    /// Closes at the current price. Profit becomes a claim on the fee buckets,
    /// loss goes into the trader-PnL bucket. The trader stays registered.
    pub fn close_position(&mut self, trader: AccountId) -> Result<CloseResult, EngineError> {
        let position = self
            .ledger
            .positions
            .get(trader)
            .cloned()
            .ok_or(EngineError::NoPosition(trader))?;

        let prices = self.prices()?;
        let exit_price = prices.get(position.bet_leg);
        let margin_price = prices.get(position.margin_leg);
        let leg = position.margin_leg;

        self.atomically(|engine| {
            let profit_usd = position.pnl_usd(exit_price);
            let profit_tokens = position.pnl_tokens(exit_price, margin_price);
            let settlement = settle(position.margin, profit_tokens);

            if settlement.profit.is_positive() {
                let available = engine.free_capacity(leg);
                if settlement.profit > available {
                    return Err(EngineError::InsufficientBufferCapital {
                        leg,
                        required: settlement.profit,
                        available,
                    });
                }
            }

            engine.ledger.positions.remove(trader);
            engine.ledger.vault.credit(trader, leg, settlement.returned);
            if settlement.loss.is_positive() {
                engine.ledger.vault.forfeit(trader, leg, settlement.loss);
                engine.ledger.fees.accrue(leg, Bucket::TraderPnl, settlement.loss);
            }

            engine.emit_event(EventPayload::PositionClosed(PositionClosedEvent {
                trader,
                entry_price: position.entry_price,
                exit_price,
                profit_usd,
                profit_tokens,
                returned: settlement.returned,
            }));

            Ok(CloseResult {
                entry_price: position.entry_price,
                exit_price,
                profit_usd,
                profit_tokens,
                returned: settlement.returned,
            })
        })
    }
}
