use std::collections::VecDeque;

use thiserror::Error;

use crate::money::Money;
use crate::types::{Date, Symbol};

use super::holdings::Holding;

/// Holding periods strictly longer than this are long-term for tax purposes.
pub const LONG_TERM_HOLDING_DAYS: i64 = 365;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LotError {
    #[error("invalid share quantity: {0}")]
    InvalidQuantity(i64),
    #[error("invalid share price: {0}")]
    InvalidPrice(Money),
    #[error("cannot sell {requested} shares, only {available} available")]
    Oversell {
        requested: i64,
        available: i64,
    },
    #[error("invalid split ratio: {0}")]
    InvalidSplitRatio(i64),
}

/// A buy-like slice of shares with its own cost basis and acquisition date.
///
/// Owned exclusively by one [`LotQueue`]; the count decreases as sales consume it and the lot is
/// removed once it reaches zero. Price and date never change after creation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lot {
    pub quantity: i64,
    pub price: Money,
    pub date: Date,
}

/// Profit or loss recorded at the moment of sale, one record per consumed lot.
///
/// A single sell that spans several lots produces several of these. Append-only within a replay.
#[derive(Debug, Clone, PartialEq)]
pub struct RealizedGain {
    pub symbol: Symbol,
    pub sale_date: Date,
    pub quantity: i64,
    pub sale_price: Money,
    /// The consumed lot's own per-share cost, not the weighted average.
    pub cost_basis: Money,
    pub gain: Money,
    pub holding_days: i64,
    pub long_term: bool,
}

#[derive(Debug, Clone)]
pub struct SaleResult {
    pub gains: Vec<RealizedGain>,
    pub quantity: i64,
    pub proceeds: Money,
    pub cost_basis: Money,
    pub gain: Money,
}

/// Per-symbol FIFO queue of open lots.
///
/// Lots are kept in non-decreasing acquisition date order with insertion order preserved for
/// equal dates; sales consume from the front. The sum of lot counts is the symbol's open
/// position and never goes negative in a consistent replay.
#[derive(Debug, Clone)]
pub struct LotQueue {
    symbol: Symbol,
    lots: VecDeque<Lot>,
    rounding_error: Money,
}

impl LotQueue {
    pub fn new(symbol: Symbol) -> LotQueue {
        LotQueue {
            symbol: symbol,
            lots: VecDeque::new(),
            rounding_error: Money::zero(),
        }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn buy(&mut self, quantity: i64, price: Money, date: Date) -> Result<(), LotError> {
        if quantity <= 0 {
            return Err(LotError::InvalidQuantity(quantity));
        }

        // Zero is allowed: bonus, rights remainders and split-origin lots are gratis.
        if price.is_negative() {
            return Err(LotError::InvalidPrice(price));
        }

        let lot = Lot {quantity, price, date};

        let position = self.lots.iter()
            .rposition(|existing| existing.date <= date)
            .map(|index| index + 1)
            .unwrap_or(0);
        self.lots.insert(position, lot);

        Ok(())
    }

    pub fn sell(
        &mut self, quantity: i64, sale_price: Money, sale_date: Date,
    ) -> Result<SaleResult, LotError> {
        if quantity <= 0 {
            return Err(LotError::InvalidQuantity(quantity));
        }

        if sale_price.is_negative() {
            return Err(LotError::InvalidPrice(sale_price));
        }

        let available = self.total_shares();
        if quantity > available {
            return Err(LotError::Oversell {
                requested: quantity,
                available: available,
            });
        }

        let mut gains = Vec::new();
        let mut cost_basis = Money::zero();
        let mut remaining = quantity;

        while remaining > 0 {
            let lot = self.lots.front_mut().unwrap();
            let taken = remaining.min(lot.quantity);

            let holding_days = (sale_date - lot.date).num_days() - 1;

            gains.push(RealizedGain {
                symbol: self.symbol.clone(),
                sale_date: sale_date,
                quantity: taken,
                sale_price: sale_price,
                cost_basis: lot.price,
                gain: (sale_price - lot.price).multiply(taken),
                holding_days: holding_days,
                long_term: holding_days > LONG_TERM_HOLDING_DAYS,
            });

            cost_basis += lot.price.multiply(taken);
            lot.quantity -= taken;
            remaining -= taken;

            if lot.quantity == 0 {
                self.lots.pop_front();
            }
        }

        let proceeds = sale_price.multiply(quantity);

        Ok(SaleResult {
            gains: gains,
            quantity: quantity,
            proceeds: proceeds,
            cost_basis: cost_basis,
            gain: proceeds - cost_basis,
        })
    }

    /// Multiplies every lot's share count by the ratio and divides its per-share price,
    /// preserving total cost up to half-to-even rounding of the new price. The accumulated
    /// cost discrepancy is tracked in [`LotQueue::rounding_error`].
    pub fn apply_split(&mut self, ratio: i64) -> Result<(), LotError> {
        if ratio < 2 {
            return Err(LotError::InvalidSplitRatio(ratio));
        }

        let mut discrepancy = Money::zero();

        for lot in &mut self.lots {
            let exact_cost = lot.price.multiply(lot.quantity);

            lot.quantity = lot.quantity.checked_mul(ratio).unwrap();
            lot.price = lot.price.divide(ratio);

            discrepancy += lot.price.multiply(lot.quantity) - exact_cost;
        }

        self.rounding_error += discrepancy;
        Ok(())
    }

    pub fn total_shares(&self) -> i64 {
        self.lots.iter().map(|lot| lot.quantity).sum()
    }

    pub fn total_cost(&self) -> Money {
        self.lots.iter().map(|lot| lot.price.multiply(lot.quantity)).sum()
    }

    pub fn weighted_average_cost(&self) -> Money {
        let shares = self.total_shares();
        if shares == 0 {
            return Money::zero();
        }
        self.total_cost().divide(shares)
    }

    pub fn is_empty(&self) -> bool {
        self.lots.is_empty()
    }

    pub fn snapshot(&self) -> Vec<Lot> {
        self.lots.iter().copied().collect()
    }

    /// Signed paisa accumulated from split rounding against exact rational arithmetic.
    pub fn rounding_error(&self) -> Money {
        self.rounding_error
    }

    pub fn holding(&self, last_price: Option<Money>) -> Holding {
        Holding::new(
            self.symbol.clone(),
            self.total_shares(),
            self.weighted_average_cost(),
            self.total_cost(),
            last_price,
        )
    }
}
