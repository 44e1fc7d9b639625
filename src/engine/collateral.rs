//! Trader deposits and withdrawals.

use super::core::Engine;
use super::results::{EngineError, WithdrawResult};
use crate::custody::{Holder, TokenLedger, Transfer};
use crate::events::{CollateralDepositedEvent, CollateralWithdrawnEvent, EventPayload};
use crate::price_feed::{PriceOracle, SpotPriceSource};
use crate::types::{AccountId, Amount, Leg, PerLeg};
use rust_decimal::Decimal;

impl<O, P, T> Engine<O, P, T>
where
    O: PriceOracle,
    P: SpotPriceSource,
    T: TokenLedger,
{
    /// Pulls either or both pool tokens from the trader into engine custody.
    pub fn add_collateral(
        &mut self,
        trader: AccountId,
        amount0: Amount,
        amount1: Amount,
    ) -> Result<(), EngineError> {
        let amounts = PerLeg::new(amount0, amount1);
        if amounts.iter().any(|(_, a)| a.value() < Decimal::ZERO)
            || amounts.iter().all(|(_, a)| a.is_zero())
        {
            return Err(EngineError::InvalidAmount);
        }

        self.atomically(|engine| {
            let mut transfers: Vec<Transfer> = Vec::new();
            for leg in Leg::BOTH {
                if amounts[leg].is_zero() {
                    continue;
                }
                engine.ledger.vault.deposit(trader, leg, amounts[leg]);
                transfers.push(engine.transfer(leg, Holder::Account(trader), Holder::Engine, amounts[leg]));
            }

            engine.emit_event(EventPayload::CollateralDeposited(CollateralDepositedEvent {
                trader,
                amounts,
            }));

            engine.execute_transfers(&transfers)
        })
    }

    /// Pays out everything the trader holds in both currencies, settling any
    /// profit claim out of the fee buckets first. Blocked while a position is open.
    pub fn remove_collateral(&mut self, trader: AccountId) -> Result<WithdrawResult, EngineError> {
        if self.ledger.positions.has_position(trader) {
            return Err(EngineError::PositionOpen(trader));
        }
        if self.ledger.vault.get(trader).is_none() {
            return Err(EngineError::NoCollateral(trader));
        }

        self.atomically(|engine| {
            let mut result = WithdrawResult {
                paid: PerLeg::default(),
                profit_released: PerLeg::default(),
            };
            let mut transfers: Vec<Transfer> = Vec::new();

            for leg in Leg::BOTH {
                let released = engine.settle_profit_claim(trader, leg)?;
                let taken = engine.ledger.vault.clear(trader, leg);
                let pay = taken.current;
                if pay.is_zero() {
                    continue;
                }

                let token = engine.pair.token(leg);
                let custody = engine.tokens.balance_of(token, Holder::Engine);
                if pay > custody {
                    return Err(EngineError::InsufficientPoolCapital {
                        leg,
                        required: pay,
                        available: custody,
                    });
                }

                result.paid[leg] = pay;
                result.profit_released[leg] = released;
                transfers.push(engine.transfer(leg, Holder::Engine, Holder::Account(trader), pay));
            }

            // no position, so nothing left for funding to walk
            engine.ledger.registry.remove(trader);

            engine.emit_event(EventPayload::CollateralWithdrawn(CollateralWithdrawnEvent {
                trader,
                paid: result.paid,
                profit_released: result.profit_released,
            }));

            engine.execute_transfers(&transfers)?;
            Ok(result)
        })
    }

    // 8.3: releases the trader's unsettled profit from the fee buckets and folds it
    // into their principal. returns how much was released.
    pub(super) fn settle_profit_claim(&mut self, trader: AccountId, leg: Leg) -> Result<Amount, EngineError> {
        let claim = self.ledger.vault.entry(trader, leg).profit();
        if claim.is_zero() {
            return Ok(Amount::zero());
        }

        let available = self.ledger.fees.total(leg);
        self.ledger
            .fees
            .release(leg, claim)
            .map_err(|_| EngineError::InsufficientPoolCapital {
                leg,
                required: claim,
                available,
            })?;
        self.ledger.vault.settle_claim(trader, leg);
        Ok(claim)
    }
}
