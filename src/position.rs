// 4.0: open position tracking. one slot per trader; no history once a slot is freed.
// pnl = sign * (exit - entry) * size_usd / entry.
// 4.2 has the book: slots, open interest and locked capacity.

use crate::types::{AccountId, Amount, Leg, Leverage, Price, Side, Timestamp, Usd};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub trader: AccountId,
    pub size_usd: Usd,
    // margin after opening fees, in margin_leg tokens
    pub margin: Amount,
    pub margin_leg: Leg,
    // the currency whose USD price the bet references
    pub bet_leg: Leg,
    pub leverage: Leverage,
    pub entry_price: Price,
    pub side: Side,
    pub opened_at: Timestamp,
}

impl Position {
    // 4.1: paper gains/losses at the given exit price, in USD
    pub fn pnl_usd(&self, exit_price: Price) -> Usd {
        calculate_pnl(self.side, self.size_usd, self.entry_price, exit_price)
    }

    /// PnL converted into margin tokens at the margin currency's price.
    pub fn pnl_tokens(&self, exit_price: Price, margin_price: Price) -> Decimal {
        self.pnl_usd(exit_price).value() / margin_price.value()
    }
}

// 4.3: the pnl formula. a move of x% on the bet currency is x% of notional.
pub fn calculate_pnl(side: Side, size_usd: Usd, entry_price: Price, exit_price: Price) -> Usd {
    let move_usd = (exit_price.value() - entry_price.value()) * size_usd.value();
    Usd::new(side.sign() * move_usd / entry_price.value())
}

pub fn position_size_usd(margin: Amount, margin_price: Price, leverage: Leverage) -> Usd {
    margin_price.to_usd(margin).mul(leverage.value())
}

/// How a close splits between the trader and the fee buckets, in margin tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    // back to the trader's current collateral
    pub returned: Amount,
    // profit above margin, owed by the LP buckets
    pub profit: Amount,
    // loss routed into the trader-PnL bucket
    pub loss: Amount,
}

// 4.4: losses are capped at margin. whatever exceeds it is absorbed by the pool.
pub fn settle(margin: Amount, pnl_tokens: Decimal) -> Settlement {
    if pnl_tokens > Decimal::ZERO {
        let profit = Amount::new(pnl_tokens);
        Settlement {
            returned: margin.add(profit),
            profit,
            loss: Amount::zero(),
        }
    } else {
        let loss = Amount::new(-pnl_tokens).min(margin);
        Settlement {
            returned: margin.sub(loss),
            profit: Amount::zero(),
            loss,
        }
    }
}

/// Slots, open interest and locked capacity. Mutated only by the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PositionBook {
    positions: HashMap<AccountId, Position>,
    pub long_open_interest: Usd,
    pub short_open_interest: Usd,
    pub locked_usd: Usd,
}

impl PositionBook {
    pub fn new() -> Self {
        Self {
            positions: HashMap::new(),
            long_open_interest: Usd::zero(),
            short_open_interest: Usd::zero(),
            locked_usd: Usd::zero(),
        }
    }

    pub fn get(&self, trader: AccountId) -> Option<&Position> {
        self.positions.get(&trader)
    }

    pub fn has_position(&self, trader: AccountId) -> bool {
        self.positions.contains_key(&trader)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    /// Stores the position and books its size. Caller guarantees the slot is free.
    pub fn insert(&mut self, position: Position) {
        debug_assert!(!self.positions.contains_key(&position.trader));
        match position.side {
            Side::Long => self.long_open_interest = self.long_open_interest.add(position.size_usd),
            Side::Short => self.short_open_interest = self.short_open_interest.add(position.size_usd),
        }
        self.locked_usd = self.locked_usd.add(position.size_usd);
        self.positions.insert(position.trader, position);
    }

    /// Frees the slot and unbooks its size.
    pub fn remove(&mut self, trader: AccountId) -> Option<Position> {
        let position = self.positions.remove(&trader)?;
        match position.side {
            Side::Long => {
                self.long_open_interest = self.long_open_interest.saturating_sub(position.size_usd)
            }
            Side::Short => {
                self.short_open_interest = self.short_open_interest.saturating_sub(position.size_usd)
            }
        }
        self.locked_usd = self.locked_usd.saturating_sub(position.size_usd);
        Some(position)
    }

    pub fn open_interest(&self, side: Side) -> Usd {
        match side {
            Side::Long => self.long_open_interest,
            Side::Short => self.short_open_interest,
        }
    }

    // net directional exposure the pool carries
    pub fn imbalance(&self) -> Usd {
        self.long_open_interest.sub(self.short_open_interest).abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn price(v: Decimal) -> Price {
        Price::new_unchecked(v)
    }

    fn sample(trader: u64, side: Side, size: Decimal) -> Position {
        Position {
            trader: AccountId(trader),
            size_usd: Usd::new(size),
            margin: Amount::new(dec!(1)),
            margin_leg: Leg::Zero,
            bet_leg: Leg::Zero,
            leverage: Leverage::new(dec!(2)).unwrap(),
            entry_price: price(dec!(1000)),
            side,
            opened_at: Timestamp::from_millis(0),
        }
    }

    #[test]
    fn pnl_long_and_short() {
        let size = Usd::new(dec!(2000));
        let up = calculate_pnl(Side::Long, size, price(dec!(1000)), price(dec!(1100)));
        assert_eq!(up.value(), dec!(200));

        let short_up = calculate_pnl(Side::Short, size, price(dec!(1000)), price(dec!(1100)));
        assert_eq!(short_up.value(), dec!(-200));

        let flat = calculate_pnl(Side::Long, size, price(dec!(1000)), price(dec!(1000)));
        assert_eq!(flat, Usd::zero());
    }

    #[test]
    fn size_from_margin() {
        let size = position_size_usd(Amount::new(dec!(0.999)), price(dec!(1000)), Leverage::new(dec!(2)).unwrap());
        assert_eq!(size.value(), dec!(1998));
    }

    #[test]
    fn settlement_caps_loss_at_margin() {
        let s = settle(Amount::new(dec!(1)), dec!(-3));
        assert_eq!(s.returned, Amount::zero());
        assert_eq!(s.loss.value(), dec!(1));

        let s = settle(Amount::new(dec!(1)), dec!(-0.6));
        assert_eq!(s.returned.value(), dec!(0.4));
        assert_eq!(s.loss.value(), dec!(0.6));

        let s = settle(Amount::new(dec!(1)), dec!(0.25));
        assert_eq!(s.returned.value(), dec!(1.25));
        assert_eq!(s.profit.value(), dec!(0.25));
        assert_eq!(s.loss, Amount::zero());
    }

    #[test]
    fn book_tracks_open_interest() {
        let mut book = PositionBook::new();
        book.insert(sample(1, Side::Long, dec!(3000)));
        book.insert(sample(2, Side::Short, dec!(1000)));

        assert_eq!(book.open_interest(Side::Long).value(), dec!(3000));
        assert_eq!(book.open_interest(Side::Short).value(), dec!(1000));
        assert_eq!(book.locked_usd.value(), dec!(4000));
        assert_eq!(book.imbalance().value(), dec!(2000));

        let removed = book.remove(AccountId(1)).unwrap();
        assert_eq!(removed.side, Side::Long);
        assert_eq!(book.open_interest(Side::Long), Usd::zero());
        assert_eq!(book.locked_usd.value(), dec!(1000));
        assert!(book.remove(AccountId(1)).is_none());
    }

    #[test]
    fn default_book_is_empty() {
        let book = PositionBook::default();
        assert_eq!(book.open_interest(Side::Long), Usd::zero());
        assert_eq!(book.open_interest(Side::Short), Usd::zero());
        assert_eq!(book.locked_usd, Usd::default());
        assert!(!book.has_position(AccountId(1)));
    }
}
