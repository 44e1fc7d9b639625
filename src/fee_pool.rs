// 6.0: LP fee buckets. every fee and every trader loss lands in a bucket; trader
// profits and LP withdrawals drain them. buckets are per currency and never go
// negative.
//
// release order (profit paid to a trader): buffer -> trading -> leverage -> trader_pnl.

use crate::types::{Amount, Bps, Leg, Leverage, PerLeg};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeParams {
    // charged on margin when a position opens
    pub opening_fee: Bps,
    // rent for LP capital, per unit of borrowed leverage (leverage - 1)
    pub leverage_fee: Bps,
}

impl Default for FeeParams {
    fn default() -> Self {
        Self {
            opening_fee: Bps::new(10), // 0.1%
            leverage_fee: Bps::new(0),
        }
    }
}

impl FeeParams {
    pub fn opening_fee_on(&self, margin: Amount) -> Amount {
        margin.mul(self.opening_fee.as_fraction())
    }

    pub fn leverage_fee_on(&self, margin: Amount, leverage: Leverage) -> Amount {
        margin.mul(self.leverage_fee.as_fraction() * leverage.borrowed_multiple())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bucket {
    Buffer,
    Trading,
    Leverage,
    TraderPnl,
}

impl Bucket {
    pub const RELEASE_ORDER: [Bucket; 4] = [
        Bucket::Buffer,
        Bucket::Trading,
        Bucket::Leverage,
        Bucket::TraderPnl,
    ];
}

/// The four balances held for LPs in one currency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBuckets {
    pub trading: Amount,
    pub leverage: Amount,
    pub trader_pnl: Amount,
    pub buffer: Amount,
}

impl FeeBuckets {
    pub fn total(&self) -> Amount {
        self.buffer
            .add(self.trading)
            .add(self.leverage)
            .add(self.trader_pnl)
    }

    pub fn get(&self, bucket: Bucket) -> Amount {
        match bucket {
            Bucket::Buffer => self.buffer,
            Bucket::Trading => self.trading,
            Bucket::Leverage => self.leverage,
            Bucket::TraderPnl => self.trader_pnl,
        }
    }

    fn slot(&mut self, bucket: Bucket) -> &mut Amount {
        match bucket {
            Bucket::Buffer => &mut self.buffer,
            Bucket::Trading => &mut self.trading,
            Bucket::Leverage => &mut self.leverage,
            Bucket::TraderPnl => &mut self.trader_pnl,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeePoolError {
    #[error("fee buckets hold {available}, {requested} requested")]
    Insufficient { requested: Amount, available: Amount },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeePool {
    buckets: PerLeg<FeeBuckets>,
}

impl FeePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buckets(&self, leg: Leg) -> &FeeBuckets {
        &self.buckets[leg]
    }

    pub fn total(&self, leg: Leg) -> Amount {
        self.buckets[leg].total()
    }

    pub fn accrue(&mut self, leg: Leg, bucket: Bucket, amount: Amount) {
        if !amount.is_positive() {
            return;
        }
        let slot = self.buckets[leg].slot(bucket);
        *slot = slot.add(amount);
    }

    // 6.1: profit waterfall. all-or-nothing: checks capacity before touching a bucket.
    pub fn release(&mut self, leg: Leg, amount: Amount) -> Result<PerBucket, FeePoolError> {
        let available = self.total(leg);
        if amount > available {
            return Err(FeePoolError::Insufficient {
                requested: amount,
                available,
            });
        }

        let mut outstanding = amount;
        let mut drawn = PerBucket::default();
        let buckets = &mut self.buckets[leg];

        for bucket in Bucket::RELEASE_ORDER {
            if outstanding.is_zero() {
                break;
            }
            let slot = buckets.slot(bucket);
            let take = outstanding.min(*slot);
            *slot = slot.sub(take);
            outstanding = outstanding.sub(take);
            drawn.record(bucket, take);
        }

        Ok(drawn)
    }

    // 6.2: LP share. takes the same fraction out of every bucket, rounded down.
    pub fn claim_fraction(&mut self, leg: Leg, fraction: Decimal) -> PerBucket {
        let mut claimed = PerBucket::default();
        let buckets = &mut self.buckets[leg];

        for bucket in Bucket::RELEASE_ORDER {
            let slot = buckets.slot(bucket);
            let take = fraction_of(*slot, fraction);
            *slot = slot.sub(take);
            claimed.record(bucket, take);
        }

        claimed
    }

    pub fn preview_fraction(&self, leg: Leg, fraction: Decimal) -> Amount {
        let buckets = &self.buckets[leg];
        Bucket::RELEASE_ORDER
            .into_iter()
            .map(|bucket| fraction_of(buckets.get(bucket), fraction))
            .sum()
    }
}

// claims never round up, so what stays behind covers at least the complement
const CLAIM_DP: u32 = 18;

fn fraction_of(slot: Amount, fraction: Decimal) -> Amount {
    let fraction = fraction.max(Decimal::ZERO).min(Decimal::ONE);
    let take = (slot.value() * fraction).round_dp_with_strategy(CLAIM_DP, RoundingStrategy::ToZero);
    Amount::new(take).min(slot)
}

/// How much moved in or out of each bucket in one operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerBucket(pub FeeBuckets);

impl PerBucket {
    fn record(&mut self, bucket: Bucket, amount: Amount) {
        let slot = self.0.slot(bucket);
        *slot = slot.add(amount);
    }

    pub fn total(&self) -> Amount {
        self.0.total()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn amt(v: Decimal) -> Amount {
        Amount::new(v)
    }

    fn funded_pool() -> FeePool {
        let mut pool = FeePool::new();
        pool.accrue(Leg::Zero, Bucket::Buffer, amt(dec!(2)));
        pool.accrue(Leg::Zero, Bucket::Trading, amt(dec!(3)));
        pool.accrue(Leg::Zero, Bucket::Leverage, amt(dec!(1)));
        pool.accrue(Leg::Zero, Bucket::TraderPnl, amt(dec!(4)));
        pool
    }

    #[test]
    fn accrual_per_leg() {
        let pool = funded_pool();
        assert_eq!(pool.total(Leg::Zero).value(), dec!(10));
        assert_eq!(pool.total(Leg::One), Amount::zero());
    }

    #[test]
    fn non_positive_accrual_ignored() {
        let mut pool = FeePool::new();
        pool.accrue(Leg::One, Bucket::Trading, amt(dec!(-1)));
        assert_eq!(pool.total(Leg::One), Amount::zero());
    }

    #[test]
    fn release_walks_buckets_in_order() {
        let mut pool = funded_pool();
        let drawn = pool.release(Leg::Zero, amt(dec!(5.5))).unwrap();

        assert_eq!(drawn.0.buffer.value(), dec!(2));
        assert_eq!(drawn.0.trading.value(), dec!(3));
        assert_eq!(drawn.0.leverage.value(), dec!(0.5));
        assert_eq!(drawn.0.trader_pnl, Amount::zero());

        let left = pool.buckets(Leg::Zero);
        assert_eq!(left.buffer, Amount::zero());
        assert_eq!(left.trading, Amount::zero());
        assert_eq!(left.leverage.value(), dec!(0.5));
        assert_eq!(left.trader_pnl.value(), dec!(4));
    }

    #[test]
    fn release_rejects_without_touching_buckets() {
        let mut pool = funded_pool();
        let result = pool.release(Leg::Zero, amt(dec!(10.01)));
        assert!(matches!(result, Err(FeePoolError::Insufficient { .. })));
        assert_eq!(pool.total(Leg::Zero).value(), dec!(10));
    }

    #[test]
    fn release_exact_total_empties_everything() {
        let mut pool = funded_pool();
        pool.release(Leg::Zero, amt(dec!(10))).unwrap();
        assert_eq!(pool.buckets(Leg::Zero), &FeeBuckets::default());
    }

    #[test]
    fn claim_fraction_is_proportional() {
        let mut pool = funded_pool();
        let claimed = pool.claim_fraction(Leg::Zero, dec!(0.25));

        assert_eq!(claimed.total().value(), dec!(2.5));
        assert_eq!(claimed.0.trader_pnl.value(), dec!(1));
        assert_eq!(pool.total(Leg::Zero).value(), dec!(7.5));
    }

    #[test]
    fn claim_fraction_clamped() {
        let mut pool = funded_pool();
        let claimed = pool.claim_fraction(Leg::Zero, dec!(3));
        assert_eq!(claimed.total().value(), dec!(10));
        assert_eq!(pool.total(Leg::Zero), Amount::zero());
    }

    #[test]
    fn fee_helpers() {
        let params = FeeParams {
            opening_fee: Bps::new(10),
            leverage_fee: Bps::new(5),
        };
        let margin = amt(dec!(100));
        assert_eq!(params.opening_fee_on(margin).value(), dec!(0.1));
        let lev = Leverage::new(dec!(3)).unwrap();
        // 5 bps * 2 borrowed units
        assert_eq!(params.leverage_fee_on(margin, lev).value(), dec!(0.1));
    }
}
