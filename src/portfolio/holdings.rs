use std::collections::HashMap;

use crate::money::Money;
use crate::quotes::LatestPrice;
use crate::repository::HoldingRow;
use crate::types::Symbol;

/// A per-symbol position view: derived from the lot queue plus the latest price snapshot,
/// recomputed on read and never stored canonically.
///
/// Price-dependent fields stay `None` when no snapshot exists for the symbol; substituting cost
/// basis for a missing market price is a display-layer decision, not this type's.
#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    pub symbol: Symbol,
    pub quantity: i64,
    pub average_cost: Money,
    pub total_cost: Money,
    pub last_price: Option<Money>,
    pub market_value: Option<Money>,
    pub unrealized_gain: Option<Money>,
    pub unrealized_gain_bp: Option<i32>,
}

impl Holding {
    pub fn new(
        symbol: Symbol, quantity: i64, average_cost: Money, total_cost: Money,
        last_price: Option<Money>,
    ) -> Holding {
        let market_value = last_price.map(|price| price.multiply(quantity));

        Holding {
            symbol: symbol,
            quantity: quantity,
            average_cost: average_cost,
            total_cost: total_cost,
            last_price: last_price,
            market_value: market_value,
            unrealized_gain: market_value.map(|value| value - total_cost),
            unrealized_gain_bp: market_value.map(|value| Money::percent_change(total_cost, value)),
        }
    }
}

/// Joins persisted holdings with the latest price snapshots.
pub fn value_holdings(rows: &[HoldingRow], prices: &HashMap<Symbol, LatestPrice>) -> Vec<Holding> {
    rows.iter().map(|row| {
        let last_price = prices.get(&row.symbol).map(|price| price.last_price);
        Holding::new(
            row.symbol.clone(), row.quantity, row.average_cost, row.total_cost, last_price)
    }).collect()
}
