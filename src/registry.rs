// 4.5: traders with a live position. dense vec + index map so funding can walk
// only live traders, and add/remove/contains are all O(1). removal swaps the
// last element into the hole, so iteration order is not stable.

use crate::types::AccountId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActiveTraders {
    traders: Vec<AccountId>,
    index: HashMap<AccountId, usize>,
}

impl ActiveTraders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, trader: AccountId) -> bool {
        self.index.contains_key(&trader)
    }

    /// Returns false if the trader was already present.
    pub fn insert(&mut self, trader: AccountId) -> bool {
        if self.contains(trader) {
            return false;
        }
        self.index.insert(trader, self.traders.len());
        self.traders.push(trader);
        true
    }

    /// Returns false if the trader was not present.
    pub fn remove(&mut self, trader: AccountId) -> bool {
        let Some(slot) = self.index.remove(&trader) else {
            return false;
        };

        self.traders.swap_remove(slot);
        if let Some(&moved) = self.traders.get(slot) {
            self.index.insert(moved, slot);
        }
        true
    }

    pub fn len(&self) -> usize {
        self.traders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traders.is_empty()
    }

    pub fn as_slice(&self) -> &[AccountId] {
        &self.traders
    }

    pub fn iter(&self) -> impl Iterator<Item = &AccountId> {
        self.traders.iter()
    }
}
