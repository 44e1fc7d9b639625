// 12.0 custody.rs: token movement. the engine never holds balances itself, it asks a
// TokenLedger to move them. every transfer the engine makes in one call is recorded
// so a later failure can put the earlier ones back.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::types::{AccountId, Amount, TokenId};

// Who holds a balance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Holder {
    Account(AccountId),
    // collateral, fee buckets and buffer capital
    Engine,
    // reserves of the underlying pool
    Pool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CustodyError {
    #[error("{holder:?} holds {available} of token {token:?}, {requested} requested")]
    InsufficientBalance {
        token: TokenId,
        holder: Holder,
        available: Amount,
        requested: Amount,
    },

    #[error("transfer of token {token:?} rejected")]
    Rejected { token: TokenId },

    #[error("negative transfer amount {amount}")]
    InvalidAmount { amount: Amount },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub token: TokenId,
    pub from: Holder,
    pub to: Holder,
    pub amount: Amount,
}

impl Transfer {
    pub fn reversed(&self) -> Self {
        Self {
            token: self.token,
            from: self.to,
            to: self.from,
            amount: self.amount,
        }
    }
}

// Fungible token capability. Implement for a real chain or custody backend.
pub trait TokenLedger {
    fn transfer(&mut self, token: TokenId, from: Holder, to: Holder, amount: Amount) -> Result<(), CustodyError>;

    fn balance_of(&self, token: TokenId, holder: Holder) -> Amount;

    fn symbol(&self, token: TokenId) -> Option<String>;
}

// Runs transfers in order. On the first failure, undoes the ones already made
// (newest first) and returns the failure.
pub fn execute_transfers<T: TokenLedger + ?Sized>(
    tokens: &mut T,
    transfers: &[Transfer],
) -> Result<(), CustodyError> {
    let mut done: Vec<Transfer> = Vec::with_capacity(transfers.len());
    for transfer in transfers {
        if transfer.amount.is_zero() {
            continue;
        }
        if let Err(err) = tokens.transfer(transfer.token, transfer.from, transfer.to, transfer.amount) {
            for undo in done.iter().rev().map(Transfer::reversed) {
                let _ = tokens.transfer(undo.token, undo.from, undo.to, undo.amount);
            }
            return Err(err);
        }
        done.push(*transfer);
    }
    Ok(())
}

// In-memory token balances for tests and the simulation.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTokens {
    balances: HashMap<(TokenId, Holder), Amount>,
    symbols: HashMap<TokenId, String>,
    // transfers touching these holders are rejected
    frozen: HashSet<Holder>,
    // rejects the nth transfer from now (0 = next)
    fail_after: Option<usize>,
    log: Vec<Transfer>,
}

impl InMemoryTokens {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: TokenId, symbol: &str) -> Self {
        self.symbols.insert(token, symbol.to_string());
        self
    }

    pub fn mint(&mut self, token: TokenId, holder: Holder, amount: Amount) {
        let balance = self.balances.entry((token, holder)).or_default();
        *balance = balance.add(amount);
    }

    pub fn freeze(&mut self, holder: Holder) {
        self.frozen.insert(holder);
    }

    pub fn unfreeze(&mut self, holder: Holder) {
        self.frozen.remove(&holder);
    }

    pub fn fail_after(&mut self, successful: usize) {
        self.fail_after = Some(successful);
    }

    pub fn transfers(&self) -> &[Transfer] {
        &self.log
    }
}

impl TokenLedger for InMemoryTokens {
    fn transfer(&mut self, token: TokenId, from: Holder, to: Holder, amount: Amount) -> Result<(), CustodyError> {
        if amount.value() < Decimal::ZERO {
            return Err(CustodyError::InvalidAmount { amount });
        }
        if self.frozen.contains(&from) || self.frozen.contains(&to) {
            return Err(CustodyError::Rejected { token });
        }
        match self.fail_after {
            Some(0) => {
                self.fail_after = None;
                return Err(CustodyError::Rejected { token });
            }
            Some(n) => self.fail_after = Some(n - 1),
            None => {}
        }

        let available = self.balance_of(token, from);
        if amount > available {
            return Err(CustodyError::InsufficientBalance {
                token,
                holder: from,
                available,
                requested: amount,
            });
        }

        self.balances.insert((token, from), available.sub(amount));
        let to_balance = self.balances.entry((token, to)).or_default();
        *to_balance = to_balance.add(amount);
        self.log.push(Transfer { token, from, to, amount });
        Ok(())
    }

    fn balance_of(&self, token: TokenId, holder: Holder) -> Amount {
        self.balances.get(&(token, holder)).copied().unwrap_or_default()
    }

    fn symbol(&self, token: TokenId) -> Option<String> {
        self.symbols.get(&token).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const ETH: TokenId = TokenId(0);
    const USDC: TokenId = TokenId(1);
    const ALICE: Holder = Holder::Account(AccountId(1));

    fn tokens() -> InMemoryTokens {
        let mut tokens = InMemoryTokens::new().with_token(ETH, "WETH").with_token(USDC, "USDC");
        tokens.mint(ETH, ALICE, Amount::new(dec!(5)));
        tokens.mint(USDC, ALICE, Amount::new(dec!(1000)));
        tokens
    }

    #[test]
    fn transfer_moves_balance() {
        let mut tokens = tokens();
        tokens.transfer(ETH, ALICE, Holder::Engine, Amount::new(dec!(2))).unwrap();
        assert_eq!(tokens.balance_of(ETH, ALICE).value(), dec!(3));
        assert_eq!(tokens.balance_of(ETH, Holder::Engine).value(), dec!(2));
        assert_eq!(tokens.symbol(ETH).as_deref(), Some("WETH"));
        assert_eq!(tokens.transfers().len(), 1);
    }

    #[test]
    fn overdraw_rejected() {
        let mut tokens = tokens();
        let result = tokens.transfer(ETH, ALICE, Holder::Engine, Amount::new(dec!(6)));
        assert!(matches!(result, Err(CustodyError::InsufficientBalance { .. })));
        assert_eq!(tokens.balance_of(ETH, ALICE).value(), dec!(5));
    }

    #[test]
    fn failed_batch_reverses_earlier_transfers() {
        let mut tokens = tokens();
        tokens.fail_after(1);
        let batch = [
            Transfer { token: ETH, from: ALICE, to: Holder::Engine, amount: Amount::new(dec!(1)) },
            Transfer { token: USDC, from: ALICE, to: Holder::Engine, amount: Amount::new(dec!(100)) },
        ];

        let result = execute_transfers(&mut tokens, &batch);
        assert!(matches!(result, Err(CustodyError::Rejected { token: USDC })));
        assert_eq!(tokens.balance_of(ETH, ALICE).value(), dec!(5));
        assert_eq!(tokens.balance_of(ETH, Holder::Engine), Amount::zero());
        assert_eq!(tokens.balance_of(USDC, ALICE).value(), dec!(1000));
    }

    #[test]
    fn frozen_holder_rejects() {
        let mut tokens = tokens();
        tokens.freeze(ALICE);
        let result = tokens.transfer(ETH, ALICE, Holder::Engine, Amount::new(dec!(1)));
        assert!(matches!(result, Err(CustodyError::Rejected { .. })));
        tokens.unfreeze(ALICE);
        assert!(tokens.transfer(ETH, ALICE, Holder::Engine, Amount::new(dec!(1))).is_ok());
    }
}
