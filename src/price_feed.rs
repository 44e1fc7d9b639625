// 9.0 price_feed.rs: USD prices for both pooled currencies.
//
// one currency is quoted by the oracle (e.g. an ETH / USD feed). the other is
// derived from the oracle price and the pool's own spot price, so only one
// oracle read is needed per resolution. the oracle and the pool are external;
// both are traits here with in-memory implementations for tests and the sim.

use rust_decimal::prelude::{FromPrimitive, MathematicalOps, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{Leg, Price, Timestamp};

/// Raw oracle round: signed fixed-point answer plus the time it was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleAnswer {
    pub answer: i128,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    #[error("oracle round unavailable")]
    Unavailable,

    #[error("oracle answer {answer} is not a positive price")]
    NonPositive { answer: i128 },

    #[error("oracle answer from {updated_at:?} is older than {max_age_ms}ms at {now:?}")]
    Stale {
        updated_at: Timestamp,
        now: Timestamp,
        max_age_ms: i64,
    },

    #[error("oracle answer {answer} does not fit at {decimals} decimals")]
    Overflow { answer: i128, decimals: u32 },

    #[error("price {price} cannot be scaled to {decimals} decimals")]
    Unscalable { price: Decimal, decimals: u32 },

    #[error("oracle feed {description:?} quotes neither {symbol0} nor {symbol1}")]
    Mismatch {
        description: String,
        symbol0: String,
        symbol1: String,
    },

    #[error("pool spot price is zero or out of range")]
    BadSpotPrice,
}

/// Price oracle as the engine consumes it.
pub trait PriceOracle {
    fn latest_price(&self) -> Result<OracleAnswer, OracleError>;
    fn decimals(&self) -> u32;
    // e.g. "ETH / USD"
    fn description(&self) -> String;
}

/// Instantaneous pool price: sqrt(currency1 per currency0) in Q64.96.
pub trait SpotPriceSource {
    fn sqrt_price_x96(&self) -> u128;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleParams {
    // answers older than this fail as stale
    pub max_staleness_ms: i64,
}

impl Default for OracleParams {
    fn default() -> Self {
        Self {
            max_staleness_ms: 60 * 60 * 1000,
        }
    }
}

// 9.1: Q64.96 <-> decimal. 2^96 itself does not fit a Decimal mantissa, so the
// low 32 fractional bits are dropped before converting.
const Q96_DROP_BITS: u32 = 32;

fn q64() -> Decimal {
    // 2^64 = 18446744073709551616, one past u64::MAX
    Decimal::from(u64::MAX) + Decimal::ONE
}

pub fn spot_price_from_sqrt_x96(sqrt_price_x96: u128) -> Result<Decimal, OracleError> {
    let shifted = sqrt_price_x96 >> Q96_DROP_BITS;
    let sqrt = Decimal::from_u128(shifted).ok_or(OracleError::BadSpotPrice)? / q64();
    let price = sqrt.checked_mul(sqrt).ok_or(OracleError::BadSpotPrice)?;
    if price <= Decimal::ZERO {
        return Err(OracleError::BadSpotPrice);
    }
    Ok(price)
}

pub fn sqrt_x96_from_spot_price(price: Decimal) -> Result<u128, OracleError> {
    if price <= Decimal::ZERO {
        return Err(OracleError::BadSpotPrice);
    }
    let sqrt = price.sqrt().ok_or(OracleError::BadSpotPrice)?;
    let scaled = sqrt.checked_mul(q64()).ok_or(OracleError::BadSpotPrice)?;
    let shifted = scaled.trunc().to_u128().ok_or(OracleError::BadSpotPrice)?;
    Ok(shifted << Q96_DROP_BITS)
}

// 9.2: "ETH / USD" quotes a WETH pool token too
fn feed_base_symbol(description: &str) -> Option<String> {
    let (base, quote) = description.split_once('/')?;
    if !quote.trim().eq_ignore_ascii_case("USD") {
        return None;
    }
    Some(base.trim().to_ascii_uppercase())
}

fn symbol_matches(feed_base: &str, token_symbol: &str) -> bool {
    let token = token_symbol.trim().to_ascii_uppercase();
    token == feed_base || token.strip_prefix('W') == Some(feed_base)
}

/// Turns oracle + pool reads into USD prices for either leg.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceResolver {
    base: Leg,
    params: OracleParams,
}

impl PriceResolver {
    pub fn new(base: Leg, params: OracleParams) -> Self {
        Self { base, params }
    }

    /// Works out which pool token the oracle quotes by matching its description
    /// against the token symbols.
    pub fn for_feed(
        description: &str,
        symbol0: &str,
        symbol1: &str,
        params: OracleParams,
    ) -> Result<Self, OracleError> {
        let mismatch = || OracleError::Mismatch {
            description: description.to_string(),
            symbol0: symbol0.to_string(),
            symbol1: symbol1.to_string(),
        };
        let feed_base = feed_base_symbol(description).ok_or_else(mismatch)?;

        let base = if symbol_matches(&feed_base, symbol0) {
            Leg::Zero
        } else if symbol_matches(&feed_base, symbol1) {
            Leg::One
        } else {
            return Err(mismatch());
        };

        Ok(Self::new(base, params))
    }

    pub fn base(&self) -> Leg {
        self.base
    }

    /// Validated oracle price of the base leg.
    pub fn oracle_price(&self, oracle: &dyn PriceOracle, now: Timestamp) -> Result<Price, OracleError> {
        let round = oracle.latest_price()?;
        if round.answer <= 0 {
            return Err(OracleError::NonPositive { answer: round.answer });
        }
        if now.millis_since(&round.updated_at) > self.params.max_staleness_ms {
            return Err(OracleError::Stale {
                updated_at: round.updated_at,
                now,
                max_age_ms: self.params.max_staleness_ms,
            });
        }

        let decimals = oracle.decimals();
        let value = Decimal::try_from_i128_with_scale(round.answer, decimals).map_err(|_| {
            OracleError::Overflow {
                answer: round.answer,
                decimals,
            }
        })?;

        Price::new(value).ok_or(OracleError::NonPositive { answer: round.answer })
    }

    // 9.3: both legs from a single oracle read
    pub fn prices(
        &self,
        oracle: &dyn PriceOracle,
        pool: &dyn SpotPriceSource,
        now: Timestamp,
    ) -> Result<LegPrices, OracleError> {
        let base_price = self.oracle_price(oracle, now)?;
        // currency1 per currency0
        let spot = spot_price_from_sqrt_x96(pool.sqrt_price_x96())?;

        let other = match self.base {
            Leg::Zero => base_price.value().checked_div(spot),
            Leg::One => base_price.value().checked_mul(spot),
        }
        .and_then(Price::new)
        .ok_or(OracleError::BadSpotPrice)?;

        Ok(match self.base {
            Leg::Zero => LegPrices { price0: base_price, price1: other },
            Leg::One => LegPrices { price0: other, price1: base_price },
        })
    }

    pub fn price(
        &self,
        leg: Leg,
        oracle: &dyn PriceOracle,
        pool: &dyn SpotPriceSource,
        now: Timestamp,
    ) -> Result<Price, OracleError> {
        if leg == self.base {
            return self.oracle_price(oracle, now);
        }
        Ok(self.prices(oracle, pool, now)?.get(leg))
    }
}

/// USD price of both legs at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegPrices {
    pub price0: Price,
    pub price1: Price,
}

impl LegPrices {
    pub fn get(&self, leg: Leg) -> Price {
        match leg {
            Leg::Zero => self.price0,
            Leg::One => self.price1,
        }
    }
}

// Mock oracle for testing and simulation
#[derive(Debug, Clone)]
pub struct MockOracle {
    description: String,
    decimals: u32,
    round: Option<OracleAnswer>,
}

impl MockOracle {
    pub fn new(description: &str, decimals: u32) -> Self {
        Self {
            description: description.to_string(),
            decimals,
            round: None,
        }
    }

    pub fn set_answer(&mut self, answer: i128, updated_at: Timestamp) {
        self.round = Some(OracleAnswer { answer, updated_at });
    }

    /// Sets a whole-unit price, scaled to the feed's decimals.
    pub fn set_price(&mut self, price: Decimal, updated_at: Timestamp) -> Result<(), OracleError> {
        let unscalable = || OracleError::Unscalable {
            price,
            decimals: self.decimals,
        };
        let answer = Decimal::TEN
            .checked_powu(u64::from(self.decimals))
            .and_then(|scale| price.checked_mul(scale))
            .and_then(|scaled| scaled.trunc().to_i128())
            .ok_or_else(unscalable)?;
        self.set_answer(answer, updated_at);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.round = None;
    }
}

impl PriceOracle for MockOracle {
    fn latest_price(&self) -> Result<OracleAnswer, OracleError> {
        self.round.ok_or(OracleError::Unavailable)
    }

    fn decimals(&self) -> u32 {
        self.decimals
    }

    fn description(&self) -> String {
        self.description.clone()
    }
}

// Mock pool spot price for testing and simulation
#[derive(Debug, Clone)]
pub struct MockPool {
    sqrt_price_x96: u128,
}

impl MockPool {
    pub fn new(sqrt_price_x96: u128) -> Self {
        Self { sqrt_price_x96 }
    }

    /// Pool priced at `price` currency1 per currency0.
    pub fn at_price(price: Decimal) -> Result<Self, OracleError> {
        Ok(Self::new(sqrt_x96_from_spot_price(price)?))
    }

    pub fn set_price(&mut self, price: Decimal) -> Result<(), OracleError> {
        self.sqrt_price_x96 = sqrt_x96_from_spot_price(price)?;
        Ok(())
    }
}

impl SpotPriceSource for MockPool {
    fn sqrt_price_x96(&self) -> u128 {
        self.sqrt_price_x96
    }
}
