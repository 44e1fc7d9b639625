//! Pool hooks: LP adds and removes, swaps, reserve reports.
//!
//! The pool calls these around its own operations. The engine keeps the
//! reserve and LP deposit bookkeeping, withholds buffer capital on adds, gates
//! removes on the liquidity lock, and pays LPs their share of the fee buckets.

use super::core::Engine;
use super::results::{EngineError, LpWithdrawal};
use crate::custody::{Holder, TokenLedger, Transfer};
use crate::events::{
    EventPayload, LiquidityAddedEvent, LiquidityRemovedEvent, LpFeesClaimedEvent, ReservesReconciledEvent,
    SwapAppliedEvent,
};
use crate::fee_pool::{Bucket, PerBucket};
use crate::liquidity::{check_liquidity_lock, withdrawal_value_usd, AddSplit, LiquidityTracker};
use crate::price_feed::{PriceOracle, SpotPriceSource};
use crate::types::{AccountId, Amount, Leg, PerLeg};
use rust_decimal::Decimal;

fn ensure_non_negative(amounts: &PerLeg<Amount>) -> Result<(), EngineError> {
    if amounts.iter().any(|(_, a)| a.value() < Decimal::ZERO) {
        return Err(EngineError::InvalidAmount);
    }
    Ok(())
}

impl<O, P, T> Engine<O, P, T>
where
    O: PriceOracle,
    P: SpotPriceSource,
    T: TokenLedger,
{
    /// Records an LP add. The buffer slice moves from pool custody to the engine
    /// and into the buffer bucket; the returned split says what stays in the pool.
    pub fn after_add_liquidity(
        &mut self,
        lp: AccountId,
        amount0: Amount,
        amount1: Amount,
    ) -> Result<AddSplit, EngineError> {
        let amounts = PerLeg::new(amount0, amount1);
        ensure_non_negative(&amounts)?;

        self.atomically(|engine| {
            let split = LiquidityTracker::split_add(amounts, &engine.params.liquidity);
            engine.ledger.liquidity.record_add(lp, amounts, split.to_pool);

            let mut transfers: Vec<Transfer> = Vec::new();
            for leg in Leg::BOTH {
                let buffer = split.to_buffer[leg];
                if buffer.is_zero() {
                    continue;
                }
                engine.ledger.fees.accrue(leg, Bucket::Buffer, buffer);
                transfers.push(engine.transfer(leg, Holder::Pool, Holder::Engine, buffer));
            }

            engine.emit_event(EventPayload::LiquidityAdded(LiquidityAddedEvent {
                lp,
                amounts,
                to_buffer: split.to_buffer,
            }));

            engine.execute_transfers(&transfers)?;
            Ok(split)
        })
    }

    /// Read-only gate run before the pool releases liquidity. `after_remove_liquidity`
    /// runs it again before recording anything.
    pub fn before_remove_liquidity(&self, lp: AccountId, amount0: Amount, amount1: Amount) -> Result<(), EngineError> {
        let amounts = PerLeg::new(amount0, amount1);
        ensure_non_negative(&amounts)?;
        self.ledger.liquidity.check_lp_deposit(lp, amounts)?;

        let prices = self.prices()?;
        let pooled = self.ledger.liquidity.pooled_value_usd(&prices);
        check_liquidity_lock(
            self.ledger.positions.locked_usd,
            self.ledger.positions.imbalance(),
            pooled.total,
            withdrawal_value_usd(amounts, &prices),
        )?;
        Ok(())
    }

    /// Records an LP remove and pays the LP the same fraction of the free bucket
    /// capacity as the fraction of LP deposits they withdrew.
    pub fn after_remove_liquidity(
        &mut self,
        lp: AccountId,
        amount0: Amount,
        amount1: Amount,
    ) -> Result<LpWithdrawal, EngineError> {
        let amounts = PerLeg::new(amount0, amount1);
        ensure_non_negative(&amounts)?;

        self.atomically(|engine| {
            engine.before_remove_liquidity(lp, amount0, amount1)?;

            let fractions = PerLeg::new(
                engine.ledger.liquidity.share_of(Leg::Zero, amounts[Leg::Zero]),
                engine.ledger.liquidity.share_of(Leg::One, amounts[Leg::One]),
            );
            engine.ledger.liquidity.record_remove(lp, amounts)?;

            let mut claimed: PerLeg<PerBucket> = PerLeg::default();
            let mut transfers: Vec<Transfer> = Vec::new();
            for leg in Leg::BOTH {
                let fraction = engine.claimable_fraction(leg, fractions[leg]);
                if fraction.is_zero() {
                    continue;
                }
                claimed[leg] = engine.ledger.fees.claim_fraction(leg, fraction);
                transfers.push(engine.transfer(leg, Holder::Engine, Holder::Account(lp), claimed[leg].total()));
            }

            engine.emit_event(EventPayload::LiquidityRemoved(LiquidityRemovedEvent { lp, amounts }));
            if claimed.iter().any(|(_, c)| c.total().is_positive()) {
                engine.emit_event(EventPayload::LpFeesClaimed(LpFeesClaimedEvent { lp, claimed }));
            }

            engine.execute_transfers(&transfers)?;
            Ok(LpWithdrawal { claimed })
        })
    }

    /// Applies signed reserve deltas reported after a swap.
    pub fn after_swap(&mut self, delta0: Decimal, delta1: Decimal) -> Result<(), EngineError> {
        let deltas = PerLeg::new(delta0, delta1);
        self.atomically(|engine| {
            engine.ledger.liquidity.apply_swap(deltas)?;
            let reserves = PerLeg::new(
                engine.ledger.liquidity.reserve(Leg::Zero),
                engine.ledger.liquidity.reserve(Leg::One),
            );
            engine.emit_event(EventPayload::SwapApplied(SwapAppliedEvent { deltas, reserves }));
            Ok(())
        })
    }

    /// Overwrites tracked reserves with the pool's own report. Returns the drift
    /// (reported minus tracked).
    pub fn reconcile_reserves(&mut self, reserve0: Amount, reserve1: Amount) -> Result<PerLeg<Decimal>, EngineError> {
        let reserves = PerLeg::new(reserve0, reserve1);
        ensure_non_negative(&reserves)?;

        self.atomically(|engine| {
            let drift = engine.ledger.liquidity.reconcile(reserves);
            engine.emit_event(EventPayload::ReservesReconciled(ReservesReconciledEvent { reserves, drift }));
            Ok(drift)
        })
    }

    /// What the LP would receive from the fee buckets if they withdrew everything now.
    pub fn lp_fee_share(&self, lp: AccountId) -> PerLeg<Amount> {
        let mut share = PerLeg::default();
        for leg in Leg::BOTH {
            let deposit = self.ledger.liquidity.lp_deposit(lp, leg);
            let fraction = self.claimable_fraction(leg, self.ledger.liquidity.share_of(leg, deposit));
            share[leg] = self.ledger.fees.preview_fraction(leg, fraction);
        }
        share
    }

    // 8.6: LPs split free capacity only. scaling the bucket fraction by
    // free / total leaves unsettled trader claims covered.
    fn claimable_fraction(&self, leg: Leg, deposit_fraction: Decimal) -> Decimal {
        let total = self.ledger.fees.total(leg);
        if total.is_zero() || deposit_fraction.is_zero() {
            return Decimal::ZERO;
        }
        deposit_fraction * self.free_capacity(leg).value() / total.value()
    }
}

#[cfg(test)]
mod tests {
    use super::super::core::test_support::*;
    use crate::config::LedgerConfig;
    use crate::custody::{Holder, TokenLedger};
    use crate::engine::EngineError;
    use crate::types::{Amount, Leg, Side};
    use rust_decimal_macros::dec;

    #[test]
    fn setup_records_lp_deposits() {
        let engine = setup();
        assert_eq!(engine.liquidity().lp_deposit(LP, Leg::Zero).value(), dec!(100));
        assert_eq!(engine.liquidity().reserve(Leg::One).value(), dec!(100_000));
        assert_eq!(engine.fee_buckets(Leg::Zero).buffer, Amount::zero());
    }

    #[test]
    fn buffer_withheld_on_add() {
        let mut params = LedgerConfig::default();
        params.liquidity.buffer_fraction = dec!(0.1);
        let engine = setup_with(params, dec!(1000));

        assert_eq!(engine.fee_buckets(Leg::Zero).buffer.value(), dec!(10));
        assert_eq!(engine.fee_buckets(Leg::One).buffer.value(), dec!(10_000));
        assert_eq!(engine.liquidity().reserve(Leg::Zero).value(), dec!(90));
        assert_eq!(engine.liquidity().lp_deposit(LP, Leg::Zero).value(), dec!(100));
        assert_eq!(engine.tokens().balance_of(WETH, Holder::Engine).value(), dec!(10));
        assert_eq!(engine.tokens().balance_of(WETH, Holder::Pool).value(), dec!(90));
    }

    #[test]
    fn lock_gate_keeps_backing_in_pool() {
        let mut engine = setup();
        engine
            .add_collateral(ALICE, Amount::new(dec!(10)), Amount::zero())
            .unwrap();
        engine
            .open_position(ALICE, WETH, Amount::new(dec!(10)), WETH, dec!(10), Side::Long)
            .unwrap();

        // 99_900 locked + 99_900 imbalance against ~200_000 pooled
        let result = engine.before_remove_liquidity(LP, Amount::new(dec!(1)), Amount::zero());
        assert!(matches!(result, Err(EngineError::LiquidityLocked { .. })));

        engine
            .before_remove_liquidity(LP, Amount::new(dec!(0.1)), Amount::zero())
            .unwrap();
    }

    #[test]
    fn remove_without_gate_check_is_still_gated() {
        let mut engine = setup();
        engine
            .add_collateral(ALICE, Amount::new(dec!(10)), Amount::zero())
            .unwrap();
        engine
            .open_position(ALICE, WETH, Amount::new(dec!(10)), WETH, dec!(10), Side::Long)
            .unwrap();
        let events_before = engine.events().len();

        let result = engine.after_remove_liquidity(LP, Amount::new(dec!(100)), Amount::new(dec!(100_000)));
        assert!(matches!(result, Err(EngineError::LiquidityLocked { .. })));

        // nothing recorded
        assert_eq!(engine.liquidity().lp_deposit(LP, Leg::Zero).value(), dec!(100));
        assert_eq!(engine.liquidity().reserve(Leg::One).value(), dec!(100_000));
        assert_eq!(engine.locked_usd().value(), dec!(99_900));
        assert_eq!(engine.events().len(), events_before);

        let stranger = engine.after_remove_liquidity(BOB, Amount::new(dec!(1)), Amount::zero());
        assert!(matches!(stranger, Err(EngineError::InsufficientLpDeposit { .. })));
    }

    #[test]
    fn lp_cannot_remove_more_than_deposited() {
        let engine = setup();
        let result = engine.before_remove_liquidity(LP, Amount::new(dec!(101)), Amount::zero());
        assert!(matches!(result, Err(EngineError::InsufficientLpDeposit { .. })));
        let stranger = engine.before_remove_liquidity(ALICE, Amount::new(dec!(1)), Amount::zero());
        assert!(matches!(stranger, Err(EngineError::InsufficientLpDeposit { .. })));
    }

    #[test]
    fn lp_collects_fee_share_on_remove() {
        let mut engine = setup();
        open_long_eth(&mut engine, ALICE, dec!(1), dec!(2));
        set_eth_price(&mut engine, dec!(800));
        engine.close_position(ALICE).unwrap();

        // 0.001 opening fee + 0.4995 loss
        let total = engine.fee_buckets(Leg::Zero).total();
        assert_eq!(total.value(), dec!(0.5005));
        assert_eq!(engine.lp_fee_share(LP)[Leg::Zero], total);

        let withdrawal = engine
            .after_remove_liquidity(LP, Amount::new(dec!(50)), Amount::new(dec!(50_000)))
            .unwrap();
        assert_eq!(withdrawal.total(Leg::Zero), total.mul(dec!(0.5)));
        assert_eq!(engine.fee_buckets(Leg::Zero).total(), total.sub(withdrawal.total(Leg::Zero)));
        assert_eq!(
            engine.tokens().balance_of(WETH, Holder::Account(LP)),
            withdrawal.total(Leg::Zero)
        );
        assert_eq!(engine.liquidity().lp_deposit(LP, Leg::Zero).value(), dec!(50));
        assert_eq!(engine.liquidity().reserve(Leg::Zero).value(), dec!(50));
    }

    #[test]
    fn lp_claims_leave_trader_profit_covered() {
        let mut engine = setup();
        engine
            .add_collateral(BOB, Amount::new(dec!(1)), Amount::zero())
            .unwrap();
        engine
            .open_position(BOB, WETH, Amount::new(dec!(1)), WETH, dec!(2), Side::Short)
            .unwrap();
        open_long_eth(&mut engine, ALICE, dec!(1), dec!(2));
        set_eth_price(&mut engine, dec!(1100));
        engine.close_position(BOB).unwrap();
        engine.close_position(ALICE).unwrap();

        let unsettled = engine.vault().unsettled(Leg::Zero);
        assert!(unsettled.is_positive());

        engine
            .after_remove_liquidity(LP, Amount::new(dec!(100)), Amount::new(dec!(100_000)))
            .unwrap();
        assert!(engine.fee_buckets(Leg::Zero).total() >= unsettled);

        // ALICE can still cash out her profit
        let paid = engine.remove_collateral(ALICE).unwrap();
        assert!(paid.profit_released[Leg::Zero].is_positive());
    }

    #[test]
    fn swaps_move_reserves() {
        let mut engine = setup();
        engine.after_swap(dec!(2), dec!(-1900)).unwrap();
        assert_eq!(engine.liquidity().reserve(Leg::Zero).value(), dec!(102));
        assert_eq!(engine.liquidity().reserve(Leg::One).value(), dec!(98_100));

        let result = engine.after_swap(dec!(-200), dec!(1));
        assert!(matches!(result, Err(EngineError::InvalidPoolReport(_))));
        assert_eq!(engine.liquidity().reserve(Leg::Zero).value(), dec!(102));
    }

    #[test]
    fn reconcile_reports_drift() {
        let mut engine = setup();
        let drift = engine
            .reconcile_reserves(Amount::new(dec!(99)), Amount::new(dec!(100_500)))
            .unwrap();
        assert_eq!(drift[Leg::Zero], dec!(-1));
        assert_eq!(drift[Leg::One], dec!(500));
        assert_eq!(engine.liquidity().reserve(Leg::Zero).value(), dec!(99));
    }
}
