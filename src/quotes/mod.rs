mod coordinator;
mod static_provider;

use thiserror::Error;

use crate::core::Cancellation;
use crate::money::Money;
use crate::types::{DateTime, Symbol};

pub use self::coordinator::{sync_prices, SyncOptions, SyncOutcome};
pub use self::static_provider::{StaticProvider, StaticProviderConfig};

/// Per-symbol market snapshot captured by a price refresh.
///
/// A repository may retain history; the core only ever asks for the latest snapshot per symbol
/// by capture timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct LatestPrice {
    pub symbol: Symbol,
    pub last_price: Money,
    pub previous_close: Money,
    pub change: Money,
    pub change_bp: i32,
    pub volume: i64,
    pub captured_at: DateTime,
}

impl LatestPrice {
    pub fn new(
        symbol: Symbol, last_price: Money, previous_close: Money, volume: i64,
        captured_at: DateTime,
    ) -> LatestPrice {
        LatestPrice {
            symbol: symbol,
            last_price: last_price,
            previous_close: previous_close,
            change: last_price - previous_close,
            change_bp: Money::percent_change(previous_close, last_price),
            volume: volume,
            captured_at: captured_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum QuoteError {
    #[error("no quotes found for {0}")]
    NotFound(String),
    #[error("rate limited by the quote source")]
    RateLimited,
    #[error("quote source error: {0}")]
    Upstream(String),
    #[error("the refresh has been cancelled")]
    Cancelled,
}

/// A latest-price source. Implementations may block on I/O; everything above them is
/// storage-bound or pure.
pub trait PriceProvider: Sync {
    fn name(&self) -> &'static str;
    fn latest_price(&self, cancel: &Cancellation, symbol: &Symbol)
        -> Result<LatestPrice, QuoteError>;
}
