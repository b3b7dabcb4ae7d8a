mod classifier;
pub mod reader;

use crate::types::{Date, Decimal};

pub use self::classifier::{classify, Classification, ClassifyError};

/// One already-parsed row of a broker share statement.
///
/// Field parsing and file I/O live in [`reader`]; the accounting core only ever sees this
/// record. The balance column is informational and never authoritative: positions are derived
/// by replaying transactions, not by trusting running balances.
#[derive(Debug, Clone)]
pub struct ParsedRecord {
    pub sequence: Option<i64>,
    pub symbol: String,
    pub date: Date,
    pub credit: Option<Decimal>,
    pub debit: Option<Decimal>,
    pub balance: Option<Decimal>,
    pub description: String,
    /// Optional per-share price hint in rupees. Share statements don't carry prices, so this is
    /// zero for most imports and supplied separately for trades and rights issues.
    pub price: Option<Decimal>,
}

/// One row of a weighted-average-cost report used to override derived cost basis.
#[derive(Debug, Clone)]
pub struct CostRecord {
    pub symbol: String,
    pub quantity: i64,
    pub average_cost: Decimal,
    pub total_cost: Decimal,
}
