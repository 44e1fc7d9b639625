// 1.0: all the primitives live here. nothing in the ledger works without these types.
// IDs, prices, USD values, token amounts, leverage, timestamps, pair legs.
// each is a newtype so the compiler catches type mixups.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Index, IndexMut};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(pub u64);

// token identity as the custody layer knows it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenId(pub u32);

// Long = profit when price goes up. Short = profit when price goes down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn sign(&self) -> Decimal {
        match self {
            Side::Long => dec!(1),
            Side::Short => dec!(-1),
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }
}

// 1.1: which of the two pooled currencies. currency0 sorts first in the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Leg {
    Zero,
    One,
}

impl Leg {
    pub const BOTH: [Leg; 2] = [Leg::Zero, Leg::One];

    pub fn other(&self) -> Self {
        match self {
            Leg::Zero => Leg::One,
            Leg::One => Leg::Zero,
        }
    }

    fn slot(&self) -> usize {
        match self {
            Leg::Zero => 0,
            Leg::One => 1,
        }
    }
}

// one value per pooled currency, indexed by Leg
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PerLeg<T>(pub [T; 2]);

impl<T> PerLeg<T> {
    pub fn new(zero: T, one: T) -> Self {
        Self([zero, one])
    }

    pub fn iter(&self) -> impl Iterator<Item = (Leg, &T)> {
        Leg::BOTH.into_iter().zip(self.0.iter())
    }
}

impl<T> Index<Leg> for PerLeg<T> {
    type Output = T;

    fn index(&self, leg: Leg) -> &T {
        &self.0[leg.slot()]
    }
}

impl<T> IndexMut<Leg> for PerLeg<T> {
    fn index_mut(&mut self, leg: Leg) -> &mut T {
        &mut self.0[leg.slot()]
    }
}

// 1.2: the two tokens of the underlying pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyPair {
    pub currency0: TokenId,
    pub currency1: TokenId,
}

impl CurrencyPair {
    pub fn new(currency0: TokenId, currency1: TokenId) -> Self {
        Self { currency0, currency1 }
    }

    pub fn leg_of(&self, token: TokenId) -> Option<Leg> {
        if token == self.currency0 {
            Some(Leg::Zero)
        } else if token == self.currency1 {
            Some(Leg::One)
        } else {
            None
        }
    }

    pub fn token(&self, leg: Leg) -> TokenId {
        match leg {
            Leg::Zero => self.currency0,
            Leg::One => self.currency1,
        }
    }
}

// 1.3: USD per whole token. must be positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Price(Decimal);

impl Price {
    #[must_use]
    pub fn new(value: Decimal) -> Option<Self> {
        if value > Decimal::ZERO {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn new_unchecked(value: Decimal) -> Self {
        debug_assert!(value > Decimal::ZERO);
        Self(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn to_usd(&self, amount: Amount) -> Usd {
        Usd::new(amount.value() * self.0)
    }

    pub fn to_tokens(&self, usd: Usd) -> Amount {
        Amount::new(usd.value() / self.0)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 1.4: USD notional. position size, open interest, locked capacity, pnl.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Usd(Decimal);

impl Usd {
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    pub fn add(&self, other: Usd) -> Self {
        Self(self.0 + other.0)
    }

    pub fn sub(&self, other: Usd) -> Self {
        Self(self.0 - other.0)
    }

    pub fn mul(&self, factor: Decimal) -> Self {
        Self(self.0 * factor)
    }

    // clamps at zero. aggregates must not go negative from rounding.
    pub fn saturating_sub(&self, other: Usd) -> Self {
        Self((self.0 - other.0).max(Decimal::ZERO))
    }
}

impl fmt::Display for Usd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialOrd for Usd {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Usd {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl Sum for Usd {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, q| acc.add(q))
    }
}

impl<'a> Sum<&'a Usd> for Usd {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, q| acc.add(*q))
    }
}

// 1.5: whole-token quantity of one pooled currency. collateral, margin, fees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn add(&self, other: Amount) -> Self {
        Self(self.0 + other.0)
    }

    pub fn sub(&self, other: Amount) -> Self {
        Self(self.0 - other.0)
    }

    pub fn mul(&self, factor: Decimal) -> Self {
        Self(self.0 * factor)
    }

    pub fn saturating_sub(&self, other: Amount) -> Self {
        Self((self.0 - other.0).max(Decimal::ZERO))
    }

    pub fn min(&self, other: Amount) -> Self {
        Self(self.0.min(other.0))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialOrd for Amount {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Amount {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, a| acc.add(a))
    }
}

// 1.6: leverage multiplier. must be >= 1x. upper bound lives in RiskParams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leverage(Decimal);

impl Leverage {
    #[must_use]
    pub fn new(value: Decimal) -> Option<Self> {
        if value >= Decimal::ONE {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn new_unchecked(value: Decimal) -> Self {
        debug_assert!(value >= Decimal::ONE);
        Self(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    // the part of the position the LPs are lending. 1x borrows nothing.
    pub fn borrowed_multiple(&self) -> Decimal {
        self.0 - Decimal::ONE
    }
}

impl fmt::Display for Leverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.0)
    }
}

// 1.7: basis points. 100 bps = 1%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bps(i32);

impl Bps {
    pub fn new(bps: i32) -> Self {
        Self(bps)
    }

    pub fn value(&self) -> i32 {
        self.0
    }

    pub fn as_fraction(&self) -> Decimal {
        Decimal::new(self.0 as i64, 4)
    }
}

// 1.8: millisecond timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }

    pub fn plus_millis(&self, ms: i64) -> Self {
        Self(self.0 + ms)
    }

    pub fn millis_since(&self, earlier: &Timestamp) -> i64 {
        self.0 - earlier.0
    }
}

// UTC when in range, raw millis otherwise
impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match chrono::DateTime::from_timestamp_millis(self.0) {
            Some(at) => write!(f, "{}", at.format("%Y-%m-%d %H:%M:%S%.3f")),
            None => write!(f, "{}ms", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn timestamp_displays_as_utc() {
        assert_eq!(Timestamp::from_millis(3_600_000).to_string(), "1970-01-01 01:00:00.000");
    }

    #[test]
    fn pair_resolves_legs() {
        let pair = CurrencyPair::new(TokenId(10), TokenId(20));
        assert_eq!(pair.leg_of(TokenId(10)), Some(Leg::Zero));
        assert_eq!(pair.leg_of(TokenId(20)), Some(Leg::One));
        assert_eq!(pair.leg_of(TokenId(30)), None);
        assert_eq!(pair.token(Leg::One), TokenId(20));
    }

    #[test]
    fn per_leg_indexing() {
        let mut values = PerLeg::new(dec!(1), dec!(2));
        values[Leg::One] += dec!(5);
        assert_eq!(values[Leg::Zero], dec!(1));
        assert_eq!(values[Leg::One], dec!(7));
        assert_eq!(Leg::Zero.other(), Leg::One);
    }

    #[test]
    fn price_conversions() {
        let price = Price::new(dec!(2000)).unwrap();
        assert_eq!(price.to_usd(Amount::new(dec!(1.5))).value(), dec!(3000));
        assert_eq!(price.to_tokens(Usd::new(dec!(500))).value(), dec!(0.25));
        assert!(Price::new(Decimal::ZERO).is_none());
    }

    #[test]
    fn leverage_bounds() {
        assert!(Leverage::new(dec!(0.5)).is_none());
        let lev = Leverage::new(dec!(3)).unwrap();
        assert_eq!(lev.borrowed_multiple(), dec!(2));
    }

    #[test]
    fn amount_saturates() {
        let a = Amount::new(dec!(3));
        assert_eq!(a.saturating_sub(Amount::new(dec!(5))), Amount::zero());
        assert_eq!(a.min(Amount::new(dec!(1))).value(), dec!(1));
    }

    #[test]
    fn bps_conversion() {
        let hundred_bps = Bps::new(100);
        assert_eq!(hundred_bps.as_fraction(), dec!(0.01)); // 1%

        let fifty_bps = Bps::new(50);
        assert_eq!(fifty_bps.as_fraction(), dec!(0.005)); // 0.5%
    }
}
