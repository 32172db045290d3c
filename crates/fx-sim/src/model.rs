//! The agent-based EURUSD market.
//!
//! One [`FxModel`] owns a single order book shared by all of its banks.
//! Each step moves every bank to the next quote bucket, then activates
//! every agent once, in an order reshuffled each step.

use std::sync::Arc;

use cda_core::{CreatorId, OrderBook, Pairing};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::agents::{Account, Bank, Trader};
use crate::calibration::TradeProbability;
use crate::error::SimError;
use crate::settlement::{settle_matches_for, Roster, Turnover};
use crate::stats::{DataCollector, StepRecord};
use crate::ticks::Quote;

/// Per-model settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    pub num_banks: usize,
    /// Traders per bank.
    pub num_traders: usize,
    pub pairing: Pairing,
    pub clear_every: Option<usize>,
    pub seed: u64,
}

/// Every agent of a model.
///
/// Creator ids are dense: banks take `0..banks.len()`, traders follow in
/// creation order.
#[derive(Debug, Clone, Default)]
pub struct Agents {
    pub banks: Vec<Bank>,
    pub traders: Vec<Trader>,
}

impl Roster for Agents {
    fn account_mut(&mut self, id: CreatorId) -> Option<&mut Account> {
        let idx = id.0 as usize;
        if idx < self.banks.len() {
            Some(&mut self.banks[idx].account)
        } else {
            self.traders
                .get_mut(idx - self.banks.len())
                .map(|t| &mut t.account)
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum AgentRef {
    Bank(usize),
    Trader(usize),
}

pub struct FxModel {
    params: ModelParams,
    book: OrderBook,
    agents: Agents,
    quotes: Arc<Vec<Quote>>,
    probability: TradeProbability,
    rng: ChaCha8Rng,
    current_step: usize,
    turnover: Turnover,
    collector: DataCollector,
    schedule: Vec<AgentRef>,
}

impl FxModel {
    /// Build a model over `quotes`; one step per quote after the first.
    pub fn new(
        params: ModelParams,
        quotes: Arc<Vec<Quote>>,
        probability: TradeProbability,
    ) -> Result<Self, SimError> {
        if quotes.len() < 2 {
            return Err(SimError::EmptyData(format!(
                "a run needs at least 2 quotes, got {}",
                quotes.len()
            )));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
        let opening = quotes[0];

        let mut agents = Agents::default();
        let mut schedule = Vec::with_capacity(params.num_banks * (params.num_traders + 1));
        let mut next_trader_id = params.num_banks as u32;

        for b in 0..params.num_banks {
            let bank = Bank::new(CreatorId(b as u32), format!("bank{b}"), &opening, &mut rng);
            schedule.push(AgentRef::Bank(b));

            for t in 0..params.num_traders {
                let name = format!("trader{t}{}", bank.name);
                schedule.push(AgentRef::Trader(agents.traders.len()));
                agents.traders.push(Trader::new(CreatorId(next_trader_id), name, b));
                next_trader_id += 1;
            }
            agents.banks.push(bank);
        }

        let book = OrderBook::with_pairing(params.pairing);
        debug!(
            banks = agents.banks.len(),
            traders = agents.traders.len(),
            steps = quotes.len() - 1,
            pairing = ?book.pairing(),
            seed = params.seed,
            "model initialised"
        );

        Ok(FxModel {
            params,
            book,
            agents,
            quotes,
            probability,
            rng,
            current_step: 0,
            turnover: Turnover::default(),
            collector: DataCollector::new(),
            schedule,
        })
    }

    /// Number of quote buckets, which bounds the number of steps.
    pub fn max_steps(&self) -> usize {
        self.quotes.len()
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn params(&self) -> &ModelParams {
        &self.params
    }

    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    pub fn agents(&self) -> &Agents {
        &self.agents
    }

    pub fn turnover(&self) -> &Turnover {
        &self.turnover
    }

    pub fn records(&self) -> &[StepRecord] {
        self.collector.records()
    }

    pub fn into_records(self) -> Vec<StepRecord> {
        self.collector.into_records()
    }

    /// Advance one quote bucket and activate every agent once.
    pub fn step(&mut self) -> Result<StepRecord, SimError> {
        if self.current_step + 1 >= self.quotes.len() {
            return Err(SimError::EmptyData(format!(
                "quote series exhausted after {} steps",
                self.current_step
            )));
        }
        self.current_step += 1;

        if let Some(every) = self.params.clear_every {
            if every > 0 && self.current_step % every == 0 {
                debug!(step = self.current_step, "clearing order book");
                self.book.clear();
            }
        }

        let quote = self.quotes[self.current_step];
        self.schedule.shuffle(&mut self.rng);

        for i in 0..self.schedule.len() {
            match self.schedule[i] {
                AgentRef::Bank(b) => self.bank_step(b, &quote)?,
                AgentRef::Trader(t) => self.trader_step(t)?,
            }
        }

        let record = *self.collector.collect(
            self.current_step,
            &self.agents.banks,
            &self.quotes[0],
            &self.turnover,
            &self.book,
        )?;
        trace!(
            step = record.step,
            trades = record.trades,
            spread = record.spread,
            "step collected"
        );
        Ok(record)
    }

    /// Step through every remaining quote bucket.
    pub fn run(&mut self) -> Result<(), SimError> {
        while self.current_step + 1 < self.quotes.len() {
            self.step()?;
        }
        Ok(())
    }

    fn bank_step(&mut self, b: usize, quote: &Quote) -> Result<(), SimError> {
        let max_steps = self.quotes.len();
        let bank = &mut self.agents.banks[b];
        bank.requote(quote);

        let p = self.probability.probability(bank.spread_pips());
        if self.rng.gen::<f64>() < p {
            let sent = bank.submit_orders(&mut self.book, &mut self.rng, max_steps)?;
            trace!(bank = %bank.name, sent, "orders submitted");
        }
        let id = bank.id;

        let report = self.book.match_orders();
        if !report.is_empty() {
            trace!(
                bank = %id,
                recorded = report.recorded,
                discarded = report.discarded_quantity,
                "book matched"
            );
        }

        settle_matches_for(id, &mut self.book, &mut self.agents, &mut self.turnover)?;
        Ok(())
    }

    fn trader_step(&mut self, t: usize) -> Result<(), SimError> {
        let max_steps = self.quotes.len();
        let num_traders = self.agents.traders.len();

        let trader = &mut self.agents.traders[t];
        if !trader.active {
            return Ok(());
        }
        if trader.account.is_exhausted() {
            debug!(trader = %trader.name, "trader out of funds, leaving the market");
            trader.active = false;
            return Ok(());
        }

        let trader = &self.agents.traders[t];
        let bank = &self.agents.banks[trader.bank];
        let p = self.probability.probability(bank.spread_pips());
        if self.rng.gen::<f64>() >= p {
            return Ok(());
        }

        let trade = trader.random_trade(bank, &mut self.rng, num_traders, max_steps)?;

        let initiator = &mut self.agents.traders[t].account;
        initiator.eur += trade.eur;
        initiator.usd += trade.usd;
        if let Some(other) = self.agents.traders.get_mut(trade.counterparty) {
            other.account.eur -= trade.eur;
            other.account.usd -= trade.usd;
        }

        self.turnover.trades += 1;
        self.turnover.eur_volume += trade.eur_volume();
        self.turnover.usd_volume += trade.usd_volume();
        Ok(())
    }
}
