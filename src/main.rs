//! LP-collateralized perps simulation.
//!
//! Runs the ledger end to end against the in-memory oracle, pool and token
//! ledger: opening, closing, liquidation, funding and LP withdrawals.

use lp_perps_core::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const WETH: TokenId = TokenId(0);
const USDC: TokenId = TokenId(1);
const OPERATOR: AccountId = AccountId(1);
const LP: AccountId = AccountId(10);
const ALICE: AccountId = AccountId(100);
const BOB: AccountId = AccountId(101);
const HOUR: i64 = 60 * 60 * 1000;

fn main() {
    println!("LP-Collateralized Perps Simulation");
    println!("WETH/USDC pool, LPs as counterparty\n");

    let scenarios: [(&str, fn() -> Result<(), EngineError>); 6] = [
        ("open", scenario_1_open_long),
        ("close", scenario_2_close_at_loss),
        ("liquidation", scenario_3_liquidation),
        ("funding", scenario_4_imbalanced_funding),
        ("profit", scenario_5_profit_and_lp_exit),
        ("lock", scenario_6_liquidity_lock),
    ];

    for (name, scenario) in scenarios {
        if let Err(err) = scenario() {
            println!("  scenario {} failed: {} ({:?})\n", name, err, err.kind());
        }
    }

    println!("All simulations completed.");
}

/// WETH/USDC with 100 WETH + 100k USDC of LP capital and funded traders.
fn build_engine(params: LedgerConfig, eth_price: Decimal) -> Result<SimEngine, EngineError> {
    let mut oracle = MockOracle::new("ETH / USD", 8);
    oracle.set_price(eth_price, Timestamp::from_millis(0))?;
    let pool = MockPool::at_price(eth_price)?;

    let mut tokens = InMemoryTokens::new()
        .with_token(WETH, "WETH")
        .with_token(USDC, "USDC");
    for trader in [ALICE, BOB] {
        tokens.mint(WETH, Holder::Account(trader), Amount::new(dec!(100)));
        tokens.mint(USDC, Holder::Account(trader), Amount::new(dec!(1_000_000)));
    }
    let pooled0 = Amount::new(dec!(100));
    let pooled1 = Amount::new(eth_price * dec!(100));
    tokens.mint(WETH, Holder::Pool, pooled0);
    tokens.mint(USDC, Holder::Pool, pooled1);

    let mut engine = Engine::new(
        params,
        engine_config(),
        CurrencyPair::new(WETH, USDC),
        OPERATOR,
        oracle,
        pool,
        tokens,
    )?;
    engine.after_add_liquidity(LP, pooled0, pooled1)?;
    Ok(engine)
}

// --verbose echoes every ledger event
fn engine_config() -> EngineConfig {
    if std::env::args().any(|arg| arg == "--verbose") {
        EngineConfig::verbose()
    } else {
        EngineConfig::default()
    }
}

fn move_eth(engine: &mut SimEngine, price: Decimal) -> Result<(), EngineError> {
    let now = engine.time();
    engine.oracle_mut().set_price(price, now)?;
    engine.pool_mut().set_price(price)?;
    Ok(())
}

fn print_buckets(engine: &SimEngine, leg: Leg) {
    let b = engine.fee_buckets(leg);
    println!(
        "  Buckets {:?}: trading {}, leverage {}, trader_pnl {}, buffer {}",
        leg, b.trading, b.leverage, b.trader_pnl, b.buffer
    );
}

/// 2x long on 1 WETH at $1000.
fn scenario_1_open_long() -> Result<(), EngineError> {
    println!("Scenario 1: Open 2x Long\n");

    let mut engine = build_engine(LedgerConfig::default(), dec!(1000))?;
    let pooled = engine.pooled_value_usd()?;
    println!("  Pooled value: ${} (WETH ${}, USDC ${})", pooled.total, pooled.value0, pooled.value1);

    engine.add_collateral(ALICE, Amount::new(dec!(1)), Amount::zero())?;
    let open = engine.open_position(ALICE, WETH, Amount::new(dec!(1)), WETH, dec!(2), Side::Long)?;

    println!("  Alice deposits 1 WETH and opens 2x long");
    println!("  Opening fee: {} WETH, margin after fee: {} WETH", open.opening_fee, open.margin);
    println!("  Size: ${} @ ${}", open.size_usd, open.entry_price);

    let (long, short) = engine.open_interest();
    println!("  Open interest: ${} long, ${} short, locked ${}", long, short, engine.locked_usd());
    if let Some(liq) = engine.liquidation_price(ALICE)? {
        println!("  Liquidatable below ${}\n", liq);
    }
    Ok(())
}

/// ETH drops 30%, Alice closes at a loss.
fn scenario_2_close_at_loss() -> Result<(), EngineError> {
    println!("Scenario 2: Close After a 30% Drop\n");

    let mut engine = build_engine(LedgerConfig::default(), dec!(1000))?;
    engine.add_collateral(ALICE, Amount::new(dec!(1)), Amount::zero())?;
    engine.open_position(ALICE, WETH, Amount::new(dec!(1)), WETH, dec!(2), Side::Long)?;

    move_eth(&mut engine, dec!(700))?;
    let close = engine.close_position(ALICE)?;
    println!("  Exit ${}, PnL ${} ({} WETH)", close.exit_price, close.profit_usd, close.profit_tokens);
    println!("  Returned to collateral: {} WETH", close.returned);
    print_buckets(&engine, Leg::Zero);

    let paid = engine.remove_collateral(ALICE)?;
    println!("  Alice withdraws {} WETH\n", paid.paid[Leg::Zero]);
    Ok(())
}

/// ETH drops 90%, the operator liquidates.
fn scenario_3_liquidation() -> Result<(), EngineError> {
    println!("Scenario 3: Liquidation\n");

    let mut engine = build_engine(LedgerConfig::default(), dec!(1000))?;
    engine.add_collateral(ALICE, Amount::new(dec!(1)), Amount::zero())?;
    engine.open_position(ALICE, WETH, Amount::new(dec!(1)), WETH, dec!(2), Side::Long)?;

    move_eth(&mut engine, dec!(100))?;
    match engine.liquidate_position(BOB, ALICE) {
        Err(err) => println!("  Bob tries to liquidate: {}", err),
        Ok(_) => println!("  Bob liquidated Alice?"),
    }

    let liq = engine.liquidate_position(OPERATOR, ALICE)?;
    println!("  Operator liquidates at ${}, loss ${}", liq.exit_price, liq.loss_usd);
    println!("  Margin forfeited: {} WETH", liq.margin_forfeited);
    print_buckets(&engine, Leg::Zero);
    println!("  Active traders: {}\n", engine.active_traders().len());
    Ok(())
}

/// Long-heavy book pays the short side.
fn scenario_4_imbalanced_funding() -> Result<(), EngineError> {
    println!("Scenario 4: Imbalanced Funding\n");

    let mut engine = build_engine(LedgerConfig::default(), dec!(1000))?;
    for trader in [ALICE, BOB] {
        engine.add_collateral(trader, Amount::new(dec!(2)), Amount::zero())?;
    }
    engine.open_position(ALICE, WETH, Amount::new(dec!(1)), WETH, dec!(3), Side::Long)?;
    engine.open_position(BOB, WETH, Amount::new(dec!(1)), WETH, dec!(1), Side::Short)?;

    let (long, short) = engine.open_interest();
    println!("  OI: ${} long vs ${} short", long, short);

    if let Err(err) = engine.distribute_funding(OPERATOR) {
        println!("  Immediately: {}", err);
    }

    for round in 1..=3 {
        engine.advance_time(HOUR);
        // fresh oracle round each hour
        move_eth(&mut engine, dec!(1000))?;
        let result = engine.distribute_funding(OPERATOR)?;
        println!(
            "  Round {}: rate {}, {:?} pays {} WETH, LP skim {}, distributed {}",
            round,
            result.rate,
            result.paying_side,
            result.collected[Leg::Zero],
            result.lp_skim[Leg::Zero],
            result.distributed[Leg::Zero]
        );
    }

    println!(
        "  Alice current {} WETH, Bob current {} WETH",
        engine.collateral_in(ALICE, Leg::Zero).current,
        engine.collateral_in(BOB, Leg::Zero).current
    );
    println!("  Last distribution at {}", engine.last_funding_time());
    println!(
        "  Annualized rate at last round: {}\n",
        annualized_funding_rate(engine.funding_state().last_rate, engine.params().funding.interval_ms)
    );
    Ok(())
}

/// Bob's loss funds Alice's profit; the LP leaves with what remains.
fn scenario_5_profit_and_lp_exit() -> Result<(), EngineError> {
    println!("Scenario 5: Profit Payout and LP Exit\n");

    let mut engine = build_engine(LedgerConfig::default(), dec!(1000))?;
    engine.add_collateral(BOB, Amount::new(dec!(1)), Amount::zero())?;
    engine.open_position(BOB, WETH, Amount::new(dec!(1)), WETH, dec!(2), Side::Short)?;
    engine.add_collateral(ALICE, Amount::new(dec!(1)), Amount::zero())?;
    engine.open_position(ALICE, WETH, Amount::new(dec!(1)), WETH, dec!(2), Side::Long)?;

    move_eth(&mut engine, dec!(1100))?;
    engine.close_position(BOB)?;
    let win = engine.close_position(ALICE)?;
    println!("  Alice closes with {} WETH profit", win.profit_tokens);
    println!("  Unsettled claims: {} WETH", engine.vault().unsettled(Leg::Zero));
    print_buckets(&engine, Leg::Zero);

    let share = engine.lp_fee_share(LP);
    println!("  LP fee share if leaving now: {} WETH", share[Leg::Zero]);

    let paid = engine.remove_collateral(ALICE)?;
    println!(
        "  Alice withdraws {} WETH ({} out of the buckets)",
        paid.paid[Leg::Zero],
        paid.profit_released[Leg::Zero]
    );

    engine.before_remove_liquidity(LP, Amount::new(dec!(100)), Amount::new(dec!(100_000)))?;
    let exit = engine.after_remove_liquidity(LP, Amount::new(dec!(100)), Amount::new(dec!(100_000)))?;
    println!("  LP claims {} WETH of fees", exit.total(Leg::Zero));
    print_buckets(&engine, Leg::Zero);
    println!();
    Ok(())
}

/// Open positions keep LP capital in the pool.
fn scenario_6_liquidity_lock() -> Result<(), EngineError> {
    println!("Scenario 6: Liquidity Lock\n");

    let mut params = LedgerConfig::testnet();
    params.liquidity.buffer_fraction = dec!(0.05);
    let mut engine = build_engine(params, dec!(1000))?;
    print_buckets(&engine, Leg::Zero);

    engine.add_collateral(ALICE, Amount::new(dec!(4.6)), Amount::zero())?;
    engine.open_position(ALICE, WETH, Amount::new(dec!(4.6)), WETH, dec!(20), Side::Long)?;
    println!("  Alice opens 20x long on 4.6 WETH, locked ${}", engine.locked_usd());

    for amount in [dec!(10), dec!(1)] {
        match engine.before_remove_liquidity(LP, Amount::new(amount), Amount::zero()) {
            Ok(()) => println!("  LP may remove {} WETH", amount),
            Err(err) => println!("  LP removing {} WETH: {}", amount, err),
        }
    }

    engine.after_swap(dec!(1), dec!(-990))?;
    println!(
        "  After a swap: reserves {} WETH / {} USDC",
        engine.liquidity().reserve(Leg::Zero),
        engine.liquidity().reserve(Leg::One)
    );
    println!("  Events recorded: {}\n", engine.events().len());
    Ok(())
}
