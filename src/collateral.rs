//! Trader collateral.
//!
//! Each trader holds, per pooled currency, a `funded` amount and a `current`
//! amount. `funded` is the principal the trader still owns in engine custody:
//! deposits, less fees, losses, forfeited margin and funding paid. `current`
//! is what the trader could withdraw right now; while a position is open the
//! margin sits outside `current`.
//!
//! Whatever `current` exceeds `funded` by is an unsettled profit claim against
//! the LP fee buckets. Claims are settled on withdrawal, or before the same
//! currency is used as margin again.

use crate::types::{AccountId, Amount, Leg, PerLeg};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralEntry {
    pub funded: Amount,
    pub current: Amount,
}

impl CollateralEntry {
    pub fn is_empty(&self) -> bool {
        self.funded.is_zero() && self.current.is_zero()
    }

    // positive when current exceeds the principal
    pub fn profit(&self) -> Amount {
        self.current.saturating_sub(self.funded)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollateralVault {
    entries: HashMap<AccountId, PerLeg<CollateralEntry>>,
    // sum of every trader's profit claim, per currency
    unsettled: PerLeg<Amount>,
}

impl CollateralVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, trader: AccountId) -> Option<&PerLeg<CollateralEntry>> {
        self.entries.get(&trader)
    }

    pub fn entry(&self, trader: AccountId, leg: Leg) -> CollateralEntry {
        self.entries
            .get(&trader)
            .map(|e| e[leg])
            .unwrap_or_default()
    }

    pub fn current(&self, trader: AccountId, leg: Leg) -> Amount {
        self.entry(trader, leg).current
    }

    /// Profit owed to traders but not yet paid out of the fee buckets.
    pub fn unsettled(&self, leg: Leg) -> Amount {
        self.unsettled[leg]
    }

    // every mutation goes through here so the claim aggregate stays exact
    fn update(&mut self, trader: AccountId, leg: Leg, apply: impl FnOnce(&mut CollateralEntry)) {
        let entry = &mut self.entries.entry(trader).or_default()[leg];
        let before = entry.profit();
        apply(entry);
        let after = entry.profit();
        self.unsettled[leg] = self.unsettled[leg].add(after).saturating_sub(before);
    }

    pub fn deposit(&mut self, trader: AccountId, leg: Leg, amount: Amount) {
        self.update(trader, leg, |e| {
            e.funded = e.funded.add(amount);
            e.current = e.current.add(amount);
        });
    }

    /// Raises `current` only. Anything above principal becomes a claim.
    pub fn credit(&mut self, trader: AccountId, leg: Leg, amount: Amount) {
        self.update(trader, leg, |e| e.current = e.current.add(amount));
    }

    /// Raises principal and `current` together, for value backed by tokens
    /// already in custody (funding receipts).
    pub fn credit_funded(&mut self, trader: AccountId, leg: Leg, amount: Amount) {
        self.update(trader, leg, |e| {
            e.funded = e.funded.add(amount);
            e.current = e.current.add(amount);
        });
    }

    /// Takes `amount` out of `current`, e.g. margin moving into a position.
    pub fn debit(&mut self, trader: AccountId, leg: Leg, amount: Amount) -> Result<(), CollateralError> {
        self.ensure_current(trader, leg, amount)?;
        self.update(trader, leg, |e| e.current = e.current.sub(amount));
        Ok(())
    }

    /// Principal that now belongs to someone else (fees, losses, forfeited margin).
    pub fn forfeit(&mut self, trader: AccountId, leg: Leg, amount: Amount) {
        self.update(trader, leg, |e| e.funded = e.funded.saturating_sub(amount));
    }

    /// Debit and forfeit in one step: value leaving both principal and `current`.
    pub fn charge(&mut self, trader: AccountId, leg: Leg, amount: Amount) -> Result<(), CollateralError> {
        self.ensure_current(trader, leg, amount)?;
        self.update(trader, leg, |e| {
            e.current = e.current.sub(amount);
            e.funded = e.funded.saturating_sub(amount);
        });
        Ok(())
    }

    /// Marks the trader's claim as paid: principal catches up with `current`.
    /// Returns the claim the caller must release from the fee buckets.
    pub fn settle_claim(&mut self, trader: AccountId, leg: Leg) -> Amount {
        let claim = self.entry(trader, leg).profit();
        if claim.is_positive() {
            self.update(trader, leg, |e| e.funded = e.current);
        }
        claim
    }

    /// Zeroes one currency and returns what it held. Drops the trader once both are empty.
    pub fn clear(&mut self, trader: AccountId, leg: Leg) -> CollateralEntry {
        if !self.entries.contains_key(&trader) {
            return CollateralEntry::default();
        }
        let taken = self.entry(trader, leg);
        self.update(trader, leg, |e| *e = CollateralEntry::default());

        let drop_trader = self
            .entries
            .get(&trader)
            .map(|entries| entries.iter().all(|(_, e)| e.is_empty()))
            .unwrap_or(false);
        if drop_trader {
            self.entries.remove(&trader);
        }
        taken
    }

    pub fn traders(&self) -> impl Iterator<Item = &AccountId> {
        self.entries.keys()
    }

    pub fn total_current(&self, leg: Leg) -> Amount {
        self.entries.values().map(|e| e[leg].current).sum()
    }

    pub fn total_funded(&self, leg: Leg) -> Amount {
        self.entries.values().map(|e| e[leg].funded).sum()
    }

    fn ensure_current(&self, trader: AccountId, leg: Leg, amount: Amount) -> Result<(), CollateralError> {
        let available = self.current(trader, leg);
        if amount > available {
            return Err(CollateralError::Insufficient {
                trader,
                leg,
                required: amount,
                available,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollateralError {
    #[error("Insufficient collateral for {trader:?} in {leg:?}: required {required}, available {available}")]
    Insufficient {
        trader: AccountId,
        leg: Leg,
        required: Amount,
        available: Amount,
    },
}
