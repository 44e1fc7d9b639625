//! Funding distribution.

use super::core::Engine;
use super::results::{EngineError, FundingResult};
use crate::custody::TokenLedger;
use crate::events::{EventPayload, FundingDistributedEvent, FundingSettledEvent, LiquidationReason};
use crate::fee_pool::Bucket;
use crate::funding::{calculate_funding_fee, calculate_funding_rate, paying_side, pro_rata_share, split_collected};
use crate::price_feed::{PriceOracle, SpotPriceSource};
use crate::types::{AccountId, Amount, Leg, PerLeg, Side, Usd};
use rust_decimal::Decimal;

impl<O, P, T> Engine<O, P, T>
where
    O: PriceOracle,
    P: SpotPriceSource,
    T: TokenLedger,
{
    /// Operator-only, at most once per funding interval. The larger side pays the
    /// smaller side in a single pass over the active traders; a payer who cannot
    /// cover the fee is liquidated instead.
    pub fn distribute_funding(&mut self, caller: AccountId) -> Result<FundingResult, EngineError> {
        self.ensure_operator(caller)?;

        let now = self.current_time;
        if !self.ledger.funding.is_due(now, &self.params.funding) {
            return Err(EngineError::TooEarly {
                next_allowed: self.ledger.funding.next_allowed(&self.params.funding),
                now,
            });
        }

        let prices = self.prices()?;

        self.atomically(|engine| {
            let (long_oi, short_oi) = engine.open_interest();
            let rate = calculate_funding_rate(long_oi, short_oi, &engine.params.funding);
            let payer_side = paying_side(long_oi, short_oi);

            let mut result = FundingResult {
                rate,
                paying_side: payer_side,
                collected: PerLeg::default(),
                lp_skim: PerLeg::default(),
                distributed: PerLeg::default(),
                payers: 0,
                receivers: 0,
                liquidated: Vec::new(),
            };

            let mut receivers: Vec<(AccountId, Usd)> = Vec::new();
            let traders = engine.ledger.registry.as_slice().to_vec();

            for trader in traders {
                let Some(position) = engine.ledger.positions.get(trader).cloned() else {
                    // closed since it was registered
                    engine.ledger.registry.remove(trader);
                    continue;
                };
                let Some(side) = payer_side else {
                    continue;
                };

                if position.side != side {
                    receivers.push((trader, position.size_usd));
                    continue;
                }

                let leg = position.margin_leg;
                let fee = calculate_funding_fee(position.size_usd, rate, prices.get(leg));
                engine.settle_profit_claim(trader, leg)?;

                if engine.ledger.vault.current(trader, leg) < fee {
                    let exit_price = prices.get(position.bet_leg);
                    engine.forfeit_position(trader, exit_price, LiquidationReason::FundingShortfall)?;
                    result.liquidated.push(trader);
                    continue;
                }

                engine.ledger.vault.charge(trader, leg, fee)?;
                result.collected[leg] = result.collected[leg].add(fee);
                result.payers += 1;

                let mut payment = PerLeg::new(Decimal::ZERO, Decimal::ZERO);
                payment[leg] = -fee.value();
                engine.emit_event(EventPayload::FundingSettled(FundingSettledEvent {
                    trader,
                    side,
                    payment,
                }));
            }

            if let Some(side) = payer_side {
                engine.pay_receivers(side.opposite(), &receivers, &mut result);
            }
            result.receivers = receivers.len();

            engine.ledger.funding.last_distribution = now;
            engine.ledger.funding.last_rate = rate;
            engine.ledger.funding.rounds += 1;

            engine.emit_event(EventPayload::FundingDistributed(FundingDistributedEvent {
                rate,
                paying_side: payer_side,
                collected: result.collected,
                lp_skim: result.lp_skim,
                distributed: result.distributed,
                payers: result.payers,
                receivers: result.receivers,
                liquidated: result.liquidated.len(),
            }));

            Ok(result)
        })
    }

    // 8.5: skim to the trader-PnL bucket, the rest pro rata by size. the last
    // receiver takes the rounding remainder so nothing is created or lost.
    fn pay_receivers(&mut self, side: Side, receivers: &[(AccountId, Usd)], result: &mut FundingResult) {
        let side_total: Usd = receivers.iter().map(|(_, size)| *size).sum();
        let mut payments: Vec<PerLeg<Decimal>> = vec![PerLeg::new(Decimal::ZERO, Decimal::ZERO); receivers.len()];

        for leg in Leg::BOTH {
            let gross = result.collected[leg];
            if gross.is_zero() {
                continue;
            }
            if receivers.is_empty() {
                self.ledger.fees.accrue(leg, Bucket::TraderPnl, gross);
                result.lp_skim[leg] = gross;
                continue;
            }

            let (skim, pool) = split_collected(gross, &self.params.funding);
            self.ledger.fees.accrue(leg, Bucket::TraderPnl, skim);
            result.lp_skim[leg] = skim;

            let mut paid = Amount::zero();
            for (i, (trader, size)) in receivers.iter().enumerate() {
                let share = if i + 1 == receivers.len() {
                    pool.saturating_sub(paid)
                } else {
                    pro_rata_share(pool, *size, side_total)
                };
                // backed by tokens the payers already left in custody
                self.ledger.vault.credit_funded(*trader, leg, share);
                paid = paid.add(share);
                payments[i][leg] = share.value();
            }
            result.distributed[leg] = paid;
        }

        if result.collected.iter().all(|(_, a)| a.is_zero()) {
            return;
        }
        for ((trader, _), payment) in receivers.iter().zip(payments) {
            self.emit_event(EventPayload::FundingSettled(FundingSettledEvent {
                trader: *trader,
                side,
                payment,
            }));
        }
    }
}
