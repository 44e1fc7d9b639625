// 5.0: funding. the crowded side pays the thin side every interval, at a rate
// that grows with the long/short imbalance. 5.0 has the params/state structs.
// 5.1 has the rate curve, 5.2 the per-trader fee and pro-rata split.

use crate::types::{Amount, Price, Side, Timestamp, Usd};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingParams {
    // minimum time between distributions
    pub interval_ms: i64,
    // rate per interval at a vanishing imbalance
    pub base_rate: Decimal,
    // rate per interval when one side is empty
    pub max_rate: Decimal,
    // fraction of gross funding routed to the LP trader-PnL bucket (0.05 = 5%).
    // payers pay full amount, receivers split (1 - this).
    pub lp_skim: Decimal,
}

impl Default for FundingParams {
    fn default() -> Self {
        Self {
            interval_ms: 60 * 60 * 1000,
            base_rate: dec!(0.0001),
            max_rate: dec!(0.001),
            lp_skim: dec!(0.05),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingState {
    pub last_distribution: Timestamp,
    pub last_rate: Decimal,
    pub rounds: u64,
}

impl FundingState {
    pub fn new(timestamp: Timestamp) -> Self {
        Self {
            last_distribution: timestamp,
            last_rate: Decimal::ZERO,
            rounds: 0,
        }
    }

    pub fn next_allowed(&self, params: &FundingParams) -> Timestamp {
        self.last_distribution.plus_millis(params.interval_ms)
    }

    pub fn is_due(&self, now: Timestamp, params: &FundingParams) -> bool {
        now >= self.next_allowed(params)
    }
}

// 5.1: linear from base to max in (max_side - min_side) / max_side
pub fn calculate_funding_rate(long_oi: Usd, short_oi: Usd, params: &FundingParams) -> Decimal {
    let long = long_oi.value();
    let short = short_oi.value();

    if long.is_zero() || short.is_zero() {
        return params.max_rate;
    }

    let larger = long.max(short);
    let smaller = long.min(short);
    let imbalance = (larger - smaller) / larger;
    params.base_rate + (params.max_rate - params.base_rate) * imbalance
}

/// Which side pays. None when balanced or nobody is open.
pub fn paying_side(long_oi: Usd, short_oi: Usd) -> Option<Side> {
    if long_oi > short_oi {
        Some(Side::Long)
    } else if short_oi > long_oi {
        Some(Side::Short)
    } else {
        None
    }
}

// 5.2: size * rate, in margin tokens
pub fn calculate_funding_fee(size_usd: Usd, rate: Decimal, margin_price: Price) -> Amount {
    margin_price.to_tokens(size_usd.mul(rate))
}

/// LP skim and receiver pool out of one currency's gross collection.
pub fn split_collected(gross: Amount, params: &FundingParams) -> (Amount, Amount) {
    let skim = gross.mul(params.lp_skim);
    (skim, gross.sub(skim))
}

pub fn pro_rata_share(pool: Amount, size_usd: Usd, side_total: Usd) -> Amount {
    if side_total.value().is_zero() {
        return Amount::zero();
    }
    Amount::new(pool.value() * size_usd.value() / side_total.value())
}

pub fn annualized_funding_rate(rate: Decimal, interval_ms: i64) -> Decimal {
    if interval_ms <= 0 {
        return Decimal::ZERO;
    }
    let year_ms = Decimal::from(365i64 * 24 * 60 * 60 * 1000);
    rate * year_ms / Decimal::from(interval_ms)
}
