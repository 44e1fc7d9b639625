// lp-perps-core: leveraged trading ledger collateralized by a two-token liquidity pool.
// LPs are the counterparty: trader losses and fees accrue to LP buckets, trader
// profits are paid out of them. positions never touch the pool reserves.
// all computation is deterministic; oracle, pool and tokens come in through traits.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: AccountId, TokenId, Leg, Price, Usd, Amount, Leverage
//        collateral.rs: per-trader funded/current balances, profit claims
//   4.x  position.rs: position struct, pnl, settlement, position book
//   4.5  registry.rs: active trader registry
//   5.x  funding.rs: imbalance-driven funding rate, fee and pro-rata split
//   6.x  fee_pool.rs: LP fee buckets, release waterfall, LP claims
//        liquidation.rs: leverage bound, liquidation threshold
//   7.x  liquidity.rs: pool reserves, LP deposits, liquidity-lock gate
//   8.x  engine/: collateral, positions, funding, liquidations, pool hooks
//   9.x  price_feed.rs: oracle + pool spot price resolution, Q64.96 math, mocks
//   10.x config.rs: fee, funding, risk, oracle, liquidity params, env presets
//   11.x events.rs: state transition events for audit
//   12.x custody.rs: token custody trait, transfer batches, in-memory ledger

// ledger modules
pub mod collateral;
pub mod engine;
pub mod events;
pub mod fee_pool;
pub mod funding;
pub mod liquidation;
pub mod position;
pub mod registry;
pub mod types;

// integration modules
pub mod config;
pub mod custody;
pub mod liquidity;
pub mod price_feed;

// re exports for convenience
pub use collateral::*;
pub use engine::*;
pub use events::*;
pub use fee_pool::*;
pub use funding::*;
pub use liquidation::*;
pub use position::*;
pub use registry::*;
pub use types::*;
pub use config::{ConfigError, Environment, LedgerConfig};
pub use custody::{CustodyError, Holder, InMemoryTokens, TokenLedger, Transfer};
pub use liquidity::{AddSplit, LiquidityError, LiquidityParams, LiquidityTracker, PooledValue};
pub use price_feed::{
    LegPrices, MockOracle, MockPool, OracleAnswer, OracleError, OracleParams, PriceOracle, PriceResolver,
    SpotPriceSource,
};
