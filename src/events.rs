// 11.0: every state change produces an event. used for audit trails and for
// notifying external systems. the EventPayload enum lists all event types.
// events raised inside a failed call are dropped with the rest of its effects.

use crate::fee_pool::PerBucket;
use crate::types::{AccountId, Amount, Leg, Leverage, PerLeg, Price, Side, Timestamp, Usd};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    // Collateral events
    CollateralDeposited(CollateralDepositedEvent),
    CollateralWithdrawn(CollateralWithdrawnEvent),

    // Position events
    PositionOpened(PositionOpenedEvent),
    PositionClosed(PositionClosedEvent),
    Liquidation(LiquidationEvent),

    // Funding events
    FundingSettled(FundingSettledEvent),
    FundingDistributed(FundingDistributedEvent),

    // Pool events
    LiquidityAdded(LiquidityAddedEvent),
    LiquidityRemoved(LiquidityRemovedEvent),
    SwapApplied(SwapAppliedEvent),
    ReservesReconciled(ReservesReconciledEvent),
    LpFeesClaimed(LpFeesClaimedEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollateralDepositedEvent {
    pub trader: AccountId,
    pub amounts: PerLeg<Amount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollateralWithdrawnEvent {
    pub trader: AccountId,
    pub paid: PerLeg<Amount>,
    // part of `paid` drawn out of the fee buckets
    pub profit_released: PerLeg<Amount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionOpenedEvent {
    pub trader: AccountId,
    pub side: Side,
    pub bet_leg: Leg,
    pub margin_leg: Leg,
    pub margin: Amount,
    pub fees: Amount,
    pub leverage: Leverage,
    pub size_usd: Usd,
    pub entry_price: Price,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionClosedEvent {
    pub trader: AccountId,
    pub entry_price: Price,
    pub exit_price: Price,
    pub profit_usd: Usd,
    // signed, in margin tokens
    pub profit_tokens: Decimal,
    pub returned: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationEvent {
    pub trader: AccountId,
    pub exit_price: Price,
    pub loss_usd: Usd,
    pub margin_forfeited: Amount,
    pub margin_leg: Leg,
    pub reason: LiquidationReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiquidationReason {
    // loss reached the threshold
    Threshold,
    // could not cover a funding payment
    FundingShortfall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingSettledEvent {
    pub trader: AccountId,
    pub side: Side,
    // negative = paid, positive = received
    pub payment: PerLeg<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingDistributedEvent {
    pub rate: Decimal,
    pub paying_side: Option<Side>,
    pub collected: PerLeg<Amount>,
    pub lp_skim: PerLeg<Amount>,
    pub distributed: PerLeg<Amount>,
    pub payers: usize,
    pub receivers: usize,
    pub liquidated: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityAddedEvent {
    pub lp: AccountId,
    pub amounts: PerLeg<Amount>,
    pub to_buffer: PerLeg<Amount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityRemovedEvent {
    pub lp: AccountId,
    pub amounts: PerLeg<Amount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapAppliedEvent {
    pub deltas: PerLeg<Decimal>,
    pub reserves: PerLeg<Amount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservesReconciledEvent {
    pub reserves: PerLeg<Amount>,
    pub drift: PerLeg<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LpFeesClaimedEvent {
    pub lp: AccountId,
    pub claimed: PerLeg<PerBucket>,
}

pub trait EventEmitter {
    fn emit(&mut self, event: Event);
}

#[derive(Debug, Default)]
pub struct EventCollector {
    events: Vec<Event>,
    next_id: u64,
}

impl EventCollector {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            next_id: 1,
        }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn next_id(&mut self) -> EventId {
        let id = EventId(self.next_id);
        self.next_id += 1;
        id
    }
}

impl EventEmitter for EventCollector {
    fn emit(&mut self, event: Event) {
        self.events.push(event);
    }
}
