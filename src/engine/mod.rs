// 8.0: the ledger engine. coordinates collateral, positions, funding,
// liquidations and the pool hooks for one currency pair.
// deterministic; collaborators come in through traits.

mod collateral;
mod config;
mod core;
mod funding;
mod liquidations;
mod liquidity;
mod positions;
mod pricing;
mod results;

pub use config::EngineConfig;
pub use core::Engine;
pub use results::{
    CloseResult, EngineError, ErrorKind, FundingResult, LiquidationResult, LpWithdrawal, OpenResult, WithdrawResult,
};

use crate::custody::InMemoryTokens;
use crate::price_feed::{MockOracle, MockPool};

/// Engine wired to the in-memory collaborators.
pub type SimEngine = Engine<MockOracle, MockPool, InMemoryTokens>;
