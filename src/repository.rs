use strum::{Display, EnumString};
use thiserror::Error;

use crate::core::Cancellation;
use crate::money::Money;
use crate::quotes::LatestPrice;
use crate::transactions::{Transaction, TransactionKind};
use crate::types::{Date, Symbol};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("the record was not found")]
    NotFound,
    #[error("the record already exists")]
    AlreadyExists,
    #[error("invalid data: {0}")]
    InvalidData(String),
    #[error("database connection error: {0}")]
    Connection(String),
    #[error("database transaction error: {0}")]
    Transaction(String),
    #[error("the operation has been cancelled")]
    Cancelled,
    #[error("internal database error: {0}")]
    Internal(String),
}

/// Provenance of a holding row's cost figures: derived by replay, or overridden by an external
/// weighted-average-cost import (which breaks the `total_cost == sum of lots` invariant until
/// the next replay re-derives it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum CostSource {
    Replay,
    Import,
}

/// A persisted holding. Cost columns come from replay (or an explicit override); price columns
/// are refreshed independently by the price sync and may lag or be absent.
#[derive(Debug, Clone, PartialEq)]
pub struct HoldingRow {
    pub symbol: Symbol,
    pub quantity: i64,
    pub average_cost: Money,
    pub total_cost: Money,
    pub last_price: Option<Money>,
    pub market_value: Option<Money>,
    pub unrealized_gain: Option<Money>,
    pub unrealized_gain_bp: Option<i32>,
    pub cost_source: CostSource,
}

#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub symbol: Option<Symbol>,
    pub kind: Option<TransactionKind>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// The persistence surface the accounting core consumes.
///
/// Every operation takes a cancellation handle and returns a typed error. Implementations
/// serialize access so that concurrent symbol-scoped reductions don't interleave writes to the
/// same rows; `transaction` scopes a multi-statement write so a failed upsert never leaves
/// holdings inconsistent with the transaction log.
pub trait Repository {
    fn upsert_stock(
        &self, cancel: &Cancellation, symbol: &Symbol, name: Option<&str>, sector: Option<&str>,
    ) -> Result<(), RepositoryError>;

    fn create_transaction(
        &self, cancel: &Cancellation, transaction: &Transaction,
    ) -> Result<(), RepositoryError>;

    fn transaction_exists(
        &self, cancel: &Cancellation, symbol: &Symbol, date: Date, description: &str,
    ) -> Result<bool, RepositoryError>;

    fn delete_transaction(
        &self, cancel: &Cancellation, id: &str,
    ) -> Result<(), RepositoryError>;

    fn list_transactions_by_symbol(
        &self, cancel: &Cancellation, symbol: &Symbol,
    ) -> Result<Vec<Transaction>, RepositoryError>;

    fn list_transactions(
        &self, cancel: &Cancellation, filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>, RepositoryError>;

    fn count_transactions(
        &self, cancel: &Cancellation, filter: &TransactionFilter,
    ) -> Result<i64, RepositoryError>;

    fn list_symbols(&self, cancel: &Cancellation) -> Result<Vec<Symbol>, RepositoryError>;

    fn upsert_holding(
        &self, cancel: &Cancellation, holding: &HoldingRow,
    ) -> Result<(), RepositoryError>;

    fn delete_holding(
        &self, cancel: &Cancellation, symbol: &Symbol,
    ) -> Result<(), RepositoryError>;

    fn get_holding(
        &self, cancel: &Cancellation, symbol: &Symbol,
    ) -> Result<Option<HoldingRow>, RepositoryError>;

    fn list_holdings(&self, cancel: &Cancellation) -> Result<Vec<HoldingRow>, RepositoryError>;

    fn update_holding_prices(
        &self, cancel: &Cancellation, symbol: &Symbol, price: Money, value: Money,
        unrealized_gain: Money, unrealized_gain_bp: i32,
    ) -> Result<(), RepositoryError>;

    fn update_holding_costs(
        &self, cancel: &Cancellation, symbol: &Symbol, average_cost: Money, total_cost: Money,
    ) -> Result<(), RepositoryError>;

    fn upsert_price(
        &self, cancel: &Cancellation, price: &LatestPrice,
    ) -> Result<(), RepositoryError>;

    fn latest_prices(&self, cancel: &Cancellation) -> Result<Vec<LatestPrice>, RepositoryError>;

    /// Runs the body inside one repository transaction: all writes commit together or roll back
    /// together.
    fn transaction(
        &self, cancel: &Cancellation,
        body: &mut dyn FnMut(&dyn Repository) -> Result<(), RepositoryError>,
    ) -> Result<(), RepositoryError>;
}
