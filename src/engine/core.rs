// 8.0 engine/core.rs: main engine. owns every ledger for one pool plus the
// external collaborators (oracle, pool spot price, token custody).

use super::config::EngineConfig;
use super::results::EngineError;
use crate::collateral::{CollateralEntry, CollateralVault};
use crate::config::LedgerConfig;
use crate::custody::{execute_transfers, Holder, TokenLedger, Transfer};
use crate::events::{Event, EventId, EventPayload};
use crate::fee_pool::{FeeBuckets, FeePool};
use crate::funding::FundingState;
use crate::liquidity::LiquidityTracker;
use crate::position::{Position, PositionBook};
use crate::price_feed::{PriceOracle, PriceResolver, SpotPriceSource};
use crate::registry::ActiveTraders;
use crate::types::{AccountId, Amount, CurrencyPair, Leg, Timestamp, TokenId, Usd};

/// Everything a failed call must leave untouched. Cloned before each mutating
/// call and put back if the call errors.
#[derive(Debug, Clone)]
pub(super) struct Ledger {
    pub vault: CollateralVault,
    pub positions: PositionBook,
    pub fees: FeePool,
    pub liquidity: LiquidityTracker,
    pub registry: ActiveTraders,
    pub funding: FundingState,
}

/** 8.1: main engine struct. all state lives here */
#[derive(Debug)]
pub struct Engine<O, P, T> {
    pub(super) config: EngineConfig,
    pub(super) params: LedgerConfig,
    pub(super) pair: CurrencyPair,
    pub(super) operator: AccountId,
    pub(super) resolver: PriceResolver,
    pub(super) oracle: O,
    pub(super) pool: P,
    pub(super) tokens: T,
    pub(super) ledger: Ledger,
    pub(super) events: Vec<Event>,
    // raised during the current call, published only if it succeeds
    pub(super) pending_events: Vec<EventPayload>,
    pub(super) next_event_id: u64,
    pub(super) current_time: Timestamp,
}

impl<O, P, T> Engine<O, P, T>
where
    O: PriceOracle,
    P: SpotPriceSource,
    T: TokenLedger,
{
    /// Builds an engine for `pair`. The oracle must quote one of the two pool
    /// tokens, matched by symbol.
    pub fn new(
        params: LedgerConfig,
        config: EngineConfig,
        pair: CurrencyPair,
        operator: AccountId,
        oracle: O,
        pool: P,
        tokens: T,
    ) -> Result<Self, EngineError> {
        params.validate()?;

        let symbol0 = tokens
            .symbol(pair.currency0)
            .ok_or(EngineError::UnsupportedCurrency(pair.currency0))?;
        let symbol1 = tokens
            .symbol(pair.currency1)
            .ok_or(EngineError::UnsupportedCurrency(pair.currency1))?;
        let resolver = PriceResolver::for_feed(&oracle.description(), &symbol0, &symbol1, params.oracle.clone())?;

        let current_time = Timestamp::from_millis(0);
        Ok(Self {
            config,
            params,
            pair,
            operator,
            resolver,
            oracle,
            pool,
            tokens,
            ledger: Ledger {
                vault: CollateralVault::new(),
                positions: PositionBook::new(),
                fees: FeePool::new(),
                liquidity: LiquidityTracker::new(),
                registry: ActiveTraders::new(),
                funding: FundingState::new(current_time),
            },
            events: Vec::new(),
            pending_events: Vec::new(),
            next_event_id: 1,
            current_time,
        })
    }

    pub fn set_time(&mut self, timestamp: Timestamp) {
        self.current_time = timestamp;
    }

    pub fn time(&self) -> Timestamp {
        self.current_time
    }

    pub fn advance_time(&mut self, millis: i64) {
        self.current_time = self.current_time.plus_millis(millis);
    }

    pub fn params(&self) -> &LedgerConfig {
        &self.params
    }

    pub fn pair(&self) -> CurrencyPair {
        self.pair
    }

    pub fn operator(&self) -> AccountId {
        self.operator
    }

    pub fn oracle_mut(&mut self) -> &mut O {
        &mut self.oracle
    }

    pub fn pool_mut(&mut self) -> &mut P {
        &mut self.pool
    }

    pub fn tokens(&self) -> &T {
        &self.tokens
    }

    pub fn tokens_mut(&mut self) -> &mut T {
        &mut self.tokens
    }

    pub fn position(&self, trader: AccountId) -> Option<&Position> {
        self.ledger.positions.get(trader)
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.ledger.positions.iter()
    }

    pub fn collateral(&self, trader: AccountId, token: TokenId) -> Result<CollateralEntry, EngineError> {
        let leg = self.leg_of(token)?;
        Ok(self.ledger.vault.entry(trader, leg))
    }

    pub fn collateral_in(&self, trader: AccountId, leg: Leg) -> CollateralEntry {
        self.ledger.vault.entry(trader, leg)
    }

    pub fn vault(&self) -> &CollateralVault {
        &self.ledger.vault
    }

    pub fn fee_totals(&self, token: TokenId) -> Result<FeeBuckets, EngineError> {
        let leg = self.leg_of(token)?;
        Ok(*self.ledger.fees.buckets(leg))
    }

    pub fn fee_buckets(&self, leg: Leg) -> FeeBuckets {
        *self.ledger.fees.buckets(leg)
    }

    /// Bucket total not already owed to traders as unsettled profit.
    pub fn free_capacity(&self, leg: Leg) -> Amount {
        self.ledger
            .fees
            .total(leg)
            .saturating_sub(self.ledger.vault.unsettled(leg))
    }

    /// (long, short) in USD.
    pub fn open_interest(&self) -> (Usd, Usd) {
        (
            self.ledger.positions.long_open_interest,
            self.ledger.positions.short_open_interest,
        )
    }

    pub fn locked_usd(&self) -> Usd {
        self.ledger.positions.locked_usd
    }

    pub fn liquidity(&self) -> &LiquidityTracker {
        &self.ledger.liquidity
    }

    pub fn last_funding_time(&self) -> Timestamp {
        self.ledger.funding.last_distribution
    }

    pub fn funding_state(&self) -> &FundingState {
        &self.ledger.funding
    }

    pub fn active_traders(&self) -> &[AccountId] {
        self.ledger.registry.as_slice()
    }

    pub fn recent_events(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub(super) fn leg_of(&self, token: TokenId) -> Result<Leg, EngineError> {
        self.pair
            .leg_of(token)
            .ok_or(EngineError::UnsupportedCurrency(token))
    }

    pub(super) fn ensure_operator(&self, caller: AccountId) -> Result<(), EngineError> {
        if caller != self.operator {
            return Err(EngineError::Unauthorized(caller));
        }
        Ok(())
    }

    // 8.2: every mutating call runs through here. on error the ledger snapshot
    // is restored and the call's events are dropped.
    pub(super) fn atomically<R>(
        &mut self,
        op: impl FnOnce(&mut Self) -> Result<R, EngineError>,
    ) -> Result<R, EngineError> {
        let snapshot = self.ledger.clone();
        self.pending_events.clear();

        match op(self) {
            Ok(result) => {
                let raised = std::mem::take(&mut self.pending_events);
                for payload in raised {
                    self.publish_event(payload);
                }
                Ok(result)
            }
            Err(err) => {
                self.ledger = snapshot;
                self.pending_events.clear();
                Err(err)
            }
        }
    }

    // transfers go last in a call; a failure undoes the earlier ones
    pub(super) fn execute_transfers(&mut self, transfers: &[Transfer]) -> Result<(), EngineError> {
        execute_transfers(&mut self.tokens, transfers)?;
        Ok(())
    }

    pub(super) fn transfer(&self, leg: Leg, from: Holder, to: Holder, amount: Amount) -> Transfer {
        Transfer {
            token: self.pair.token(leg),
            from,
            to,
            amount,
        }
    }

    pub(super) fn emit_event(&mut self, payload: EventPayload) {
        self.pending_events.push(payload);
    }

    fn publish_event(&mut self, payload: EventPayload) {
        let event = Event::new(EventId(self.next_event_id), self.current_time, payload);
        self.next_event_id += 1;

        if self.config.verbose {
            println!("[Event {} @ {}] {:?}", event.id.0, event.timestamp, event.payload);
        }

        self.events.push(event);

        if self.events.len() > self.config.max_events {
            let drain_count = self.events.len() - self.config.max_events;
            self.events.drain(0..drain_count);
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::custody::InMemoryTokens;
    use crate::price_feed::{MockOracle, MockPool};
    use crate::types::Side;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    pub type TestEngine = Engine<MockOracle, MockPool, InMemoryTokens>;

    pub const WETH: TokenId = TokenId(0);
    pub const USDC: TokenId = TokenId(1);
    pub const OPERATOR: AccountId = AccountId(1);
    pub const LP: AccountId = AccountId(10);
    pub const ALICE: AccountId = AccountId(100);
    pub const BOB: AccountId = AccountId(101);

    /// WETH/USDC pool with ETH at `eth_price` and USDC at 1.
    pub fn setup_with(params: LedgerConfig, eth_price: Decimal) -> TestEngine {
        let mut oracle = MockOracle::new("ETH / USD", 8);
        oracle.set_price(eth_price, Timestamp::from_millis(0)).unwrap();
        // currency1 per currency0: USDC per WETH
        let pool = MockPool::at_price(eth_price).unwrap();
        let mut tokens = InMemoryTokens::new()
            .with_token(WETH, "WETH")
            .with_token(USDC, "USDC");
        for trader in [ALICE, BOB] {
            tokens.mint(WETH, Holder::Account(trader), Amount::new(dec!(100)));
            tokens.mint(USDC, Holder::Account(trader), Amount::new(dec!(1_000_000)));
        }

        let mut engine = Engine::new(
            params,
            EngineConfig::default(),
            CurrencyPair::new(WETH, USDC),
            OPERATOR,
            oracle,
            pool,
            tokens,
        )
        .unwrap();

        // 100 WETH + 100k USDC of LP capital
        let pooled = [Amount::new(dec!(100)), Amount::new(eth_price * dec!(100))];
        engine.tokens.mint(WETH, Holder::Pool, pooled[0]);
        engine.tokens.mint(USDC, Holder::Pool, pooled[1]);
        engine.after_add_liquidity(LP, pooled[0], pooled[1]).unwrap();
        engine
    }

    pub fn setup() -> TestEngine {
        setup_with(LedgerConfig::default(), dec!(1000))
    }

    /// Moves the oracle (and the pool spot price with it) and the clock.
    pub fn set_eth_price(engine: &mut TestEngine, price: Decimal) {
        let now = engine.time();
        engine.oracle_mut().set_price(price, now).unwrap();
        engine.pool_mut().set_price(price).unwrap();
    }

    pub fn open_long_eth(engine: &mut TestEngine, trader: AccountId, margin: Decimal, leverage: Decimal) {
        engine
            .add_collateral(trader, Amount::new(margin), Amount::zero())
            .unwrap();
        engine
            .open_position(trader, WETH, Amount::new(margin), WETH, leverage, Side::Long)
            .unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::custody::InMemoryTokens;
    use crate::price_feed::{MockOracle, MockPool};
    use rust_decimal_macros::dec;

    #[test]
    fn oracle_must_quote_a_pool_token() {
        let oracle = MockOracle::new("BTC / USD", 8);
        let tokens = InMemoryTokens::new()
            .with_token(WETH, "WETH")
            .with_token(USDC, "USDC");
        let result = Engine::new(
            LedgerConfig::default(),
            EngineConfig::default(),
            CurrencyPair::new(WETH, USDC),
            OPERATOR,
            oracle,
            MockPool::at_price(dec!(1000)).unwrap(),
            tokens,
        );
        assert!(matches!(result, Err(EngineError::PriceMismatch(_))));
    }

    #[test]
    fn invalid_config_rejected() {
        let mut params = LedgerConfig::default();
        params.funding.lp_skim = dec!(0);
        let result = Engine::new(
            params,
            EngineConfig::default(),
            CurrencyPair::new(WETH, USDC),
            OPERATOR,
            MockOracle::new("ETH / USD", 8),
            MockPool::at_price(dec!(1000)).unwrap(),
            InMemoryTokens::new().with_token(WETH, "WETH").with_token(USDC, "USDC"),
        );
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[test]
    fn failed_call_leaves_no_trace() {
        let mut engine = setup();
        let events_before = engine.events().len();

        // ALICE only has 100 WETH in her wallet
        let result = engine.add_collateral(ALICE, Amount::new(dec!(1)), Amount::new(dec!(2_000_000)));
        assert!(matches!(result, Err(EngineError::TransferFailed(_))));

        assert_eq!(engine.collateral_in(ALICE, Leg::Zero), CollateralEntry::default());
        assert_eq!(engine.tokens().balance_of(WETH, Holder::Account(ALICE)).value(), dec!(100));
        assert_eq!(engine.events().len(), events_before);
    }

    #[test]
    fn event_log_is_bounded() {
        let mut engine = setup();
        engine.config.max_events = 3;
        for _ in 0..5 {
            engine
                .add_collateral(ALICE, Amount::new(dec!(0.1)), Amount::zero())
                .unwrap();
        }
        assert_eq!(engine.events().len(), 3);
        assert_eq!(engine.recent_events(1)[0].id, EventId(6));
    }
}
