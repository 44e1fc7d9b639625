// 7.0 liquidity.rs: what the pool holds on the engine's behalf, and who put it there.
//
// the pool reports adds, removes and swaps; this module keeps running reserves per
// currency plus each LP's outstanding deposit. the pool's own tick math is not
// modelled. reserves only move through pool reports.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::price_feed::LegPrices;
use crate::types::{AccountId, Amount, Leg, PerLeg, Usd};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityParams {
    // slice of every LP add kept by the engine as buffer capital (0.1 = 10%)
    pub buffer_fraction: Decimal,
}

impl Default for LiquidityParams {
    fn default() -> Self {
        Self {
            buffer_fraction: dec!(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LiquidityError {
    #[error("{leg:?} reserve would go negative: {reserve} + {delta}")]
    NegativeReserve { leg: Leg, reserve: Amount, delta: Decimal },

    #[error("{lp:?} deposited {deposited} of {leg:?}, tried to remove {requested}")]
    ExceedsDeposit {
        lp: AccountId,
        leg: Leg,
        requested: Amount,
        deposited: Amount,
    },

    #[error("liquidity locked: need {required} USD to stay, {remaining} USD would remain")]
    Locked { required: Usd, remaining: Usd },
}

/// USD valuation of the pooled reserves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PooledValue {
    pub value0: Usd,
    pub value1: Usd,
    pub total: Usd,
}

// how an LP add splits between the pool and the engine's buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AddSplit {
    pub to_pool: PerLeg<Amount>,
    pub to_buffer: PerLeg<Amount>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LiquidityTracker {
    reserves: PerLeg<Amount>,
    lp_deposits: HashMap<AccountId, PerLeg<Amount>>,
    total_lp_deposits: PerLeg<Amount>,
}

impl LiquidityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reserve(&self, leg: Leg) -> Amount {
        self.reserves[leg]
    }

    pub fn lp_deposit(&self, lp: AccountId, leg: Leg) -> Amount {
        self.lp_deposits
            .get(&lp)
            .map(|d| d[leg])
            .unwrap_or_default()
    }

    pub fn total_lp_deposits(&self, leg: Leg) -> Amount {
        self.total_lp_deposits[leg]
    }

    // 7.1: gross amounts count toward the LP's share; only the pool slice is a reserve
    pub fn split_add(amounts: PerLeg<Amount>, params: &LiquidityParams) -> AddSplit {
        let mut split = AddSplit::default();
        for leg in Leg::BOTH {
            let buffer = amounts[leg].mul(params.buffer_fraction);
            split.to_buffer[leg] = buffer;
            split.to_pool[leg] = amounts[leg].sub(buffer);
        }
        split
    }

    pub fn record_add(&mut self, lp: AccountId, gross: PerLeg<Amount>, to_pool: PerLeg<Amount>) {
        let deposits = self.lp_deposits.entry(lp).or_default();
        for leg in Leg::BOTH {
            deposits[leg] = deposits[leg].add(gross[leg]);
            self.total_lp_deposits[leg] = self.total_lp_deposits[leg].add(gross[leg]);
            self.reserves[leg] = self.reserves[leg].add(to_pool[leg]);
        }
    }

    pub fn check_lp_deposit(&self, lp: AccountId, amounts: PerLeg<Amount>) -> Result<(), LiquidityError> {
        for leg in Leg::BOTH {
            let deposited = self.lp_deposit(lp, leg);
            if amounts[leg] > deposited {
                return Err(LiquidityError::ExceedsDeposit {
                    lp,
                    leg,
                    requested: amounts[leg],
                    deposited,
                });
            }
        }
        Ok(())
    }

    /// Fraction of the LP deposits `amount` represents, per currency.
    pub fn share_of(&self, leg: Leg, amount: Amount) -> Decimal {
        let total = self.total_lp_deposits[leg];
        if total.is_zero() {
            return Decimal::ZERO;
        }
        (amount.value() / total.value()).min(Decimal::ONE)
    }

    pub fn record_remove(&mut self, lp: AccountId, amounts: PerLeg<Amount>) -> Result<(), LiquidityError> {
        self.check_lp_deposit(lp, amounts)?;
        let deposits = self.lp_deposits.entry(lp).or_default();
        for leg in Leg::BOTH {
            deposits[leg] = deposits[leg].sub(amounts[leg]);
            self.total_lp_deposits[leg] = self.total_lp_deposits[leg].saturating_sub(amounts[leg]);
            // the pool may pay out fees on top of principal; reserves floor at zero
            self.reserves[leg] = self.reserves[leg].saturating_sub(amounts[leg]);
        }
        if deposits.iter().all(|(_, d)| d.is_zero()) {
            self.lp_deposits.remove(&lp);
        }
        Ok(())
    }

    // 7.2: signed swap deltas from the pool's point of view
    pub fn apply_swap(&mut self, deltas: PerLeg<Decimal>) -> Result<(), LiquidityError> {
        for leg in Leg::BOTH {
            let next = self.reserves[leg].value() + deltas[leg];
            if next < Decimal::ZERO {
                return Err(LiquidityError::NegativeReserve {
                    leg,
                    reserve: self.reserves[leg],
                    delta: deltas[leg],
                });
            }
        }
        for leg in Leg::BOTH {
            self.reserves[leg] = Amount::new(self.reserves[leg].value() + deltas[leg]);
        }
        Ok(())
    }

    pub fn reconcile(&mut self, reserves: PerLeg<Amount>) -> PerLeg<Decimal> {
        let mut drift = PerLeg::default();
        for leg in Leg::BOTH {
            drift[leg] = reserves[leg].value() - self.reserves[leg].value();
        }
        self.reserves = reserves;
        drift
    }

    pub fn pooled_value_usd(&self, prices: &LegPrices) -> PooledValue {
        let value0 = prices.price0.to_usd(self.reserves[Leg::Zero]);
        let value1 = prices.price1.to_usd(self.reserves[Leg::One]);
        PooledValue {
            value0,
            value1,
            total: value0.add(value1),
        }
    }
}

pub fn withdrawal_value_usd(amounts: PerLeg<Amount>, prices: &LegPrices) -> Usd {
    Leg::BOTH
        .into_iter()
        .map(|leg| prices.get(leg).to_usd(amounts[leg]))
        .sum()
}

// 7.3: the lock gate. locked collateral plus net directional exposure must stay in the pool.
pub fn check_liquidity_lock(
    locked_usd: Usd,
    imbalance_usd: Usd,
    pooled_total: Usd,
    withdraw_usd: Usd,
) -> Result<(), LiquidityError> {
    let required = locked_usd.add(imbalance_usd);
    let remaining = pooled_total.sub(withdraw_usd);
    if required > remaining {
        return Err(LiquidityError::Locked { required, remaining });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Price;

    const LP: AccountId = AccountId(100);

    fn amounts(a0: Decimal, a1: Decimal) -> PerLeg<Amount> {
        PerLeg::new(Amount::new(a0), Amount::new(a1))
    }

    fn prices() -> LegPrices {
        LegPrices {
            price0: Price::new_unchecked(dec!(1000)),
            price1: Price::new_unchecked(dec!(1)),
        }
    }

    #[test]
    fn add_withholds_buffer() {
        let params = LiquidityParams {
            buffer_fraction: dec!(0.1),
        };
        let split = LiquidityTracker::split_add(amounts(dec!(10), dec!(5000)), &params);
        assert_eq!(split.to_buffer[Leg::Zero].value(), dec!(1));
        assert_eq!(split.to_pool[Leg::One].value(), dec!(4500));

        let mut tracker = LiquidityTracker::new();
        tracker.record_add(LP, amounts(dec!(10), dec!(5000)), split.to_pool);
        assert_eq!(tracker.reserve(Leg::Zero).value(), dec!(9));
        assert_eq!(tracker.lp_deposit(LP, Leg::Zero).value(), dec!(10));
        assert_eq!(tracker.total_lp_deposits(Leg::One).value(), dec!(5000));
    }

    #[test]
    fn pooled_value() {
        let mut tracker = LiquidityTracker::new();
        let a = amounts(dec!(10), dec!(5000));
        tracker.record_add(LP, a, a);
        let value = tracker.pooled_value_usd(&prices());
        assert_eq!(value.value0.value(), dec!(10000));
        assert_eq!(value.value1.value(), dec!(5000));
        assert_eq!(value.total.value(), dec!(15000));
    }

    #[test]
    fn swap_cannot_drain_below_zero() {
        let mut tracker = LiquidityTracker::new();
        let a = amounts(dec!(10), dec!(5000));
        tracker.record_add(LP, a, a);

        tracker.apply_swap(PerLeg::new(dec!(1), dec!(-1000))).unwrap();
        assert_eq!(tracker.reserve(Leg::Zero).value(), dec!(11));
        assert_eq!(tracker.reserve(Leg::One).value(), dec!(4000));

        let err = tracker.apply_swap(PerLeg::new(dec!(-12), dec!(0)));
        assert!(matches!(err, Err(LiquidityError::NegativeReserve { leg: Leg::Zero, .. })));
        assert_eq!(tracker.reserve(Leg::Zero).value(), dec!(11));
    }

    #[test]
    fn remove_checks_deposit() {
        let mut tracker = LiquidityTracker::new();
        let a = amounts(dec!(10), dec!(0));
        tracker.record_add(LP, a, a);

        let err = tracker.record_remove(LP, amounts(dec!(11), dec!(0)));
        assert!(matches!(err, Err(LiquidityError::ExceedsDeposit { .. })));

        assert_eq!(tracker.share_of(Leg::Zero, Amount::new(dec!(5))), dec!(0.5));
        tracker.record_remove(LP, amounts(dec!(10), dec!(0))).unwrap();
        assert_eq!(tracker.lp_deposit(LP, Leg::Zero), Amount::zero());
        assert_eq!(tracker.share_of(Leg::Zero, Amount::new(dec!(1))), Decimal::ZERO);
    }

    #[test]
    fn reconcile_reports_drift() {
        let mut tracker = LiquidityTracker::new();
        let a = amounts(dec!(10), dec!(10));
        tracker.record_add(LP, a, a);
        let drift = tracker.reconcile(amounts(dec!(9), dec!(12)));
        assert_eq!(drift[Leg::Zero], dec!(-1));
        assert_eq!(drift[Leg::One], dec!(2));
        assert_eq!(tracker.reserve(Leg::One).value(), dec!(12));
    }

    #[test]
    fn lock_gate() {
        let locked = Usd::new(dec!(4000));
        let imbalance = Usd::new(dec!(1000));
        let pooled = Usd::new(dec!(10000));

        assert!(check_liquidity_lock(locked, imbalance, pooled, Usd::new(dec!(5000))).is_ok());
        let err = check_liquidity_lock(locked, imbalance, pooled, Usd::new(dec!(5001)));
        assert!(matches!(err, Err(LiquidityError::Locked { .. })));

        let value = withdrawal_value_usd(amounts(dec!(2), dec!(500)), &prices());
        assert_eq!(value.value(), dec!(2500));
    }
}
