mod actions;
mod holdings;
mod lots;
mod reducer;

use std::collections::HashMap;

use log::{debug, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::core::{Cancellation, EmptyResult, GenericResult};
use crate::db::{self, SqliteRepository};
use crate::money::Money;
use crate::quotes::{self, StaticProvider};
use crate::repository::{Repository, TransactionFilter};
use crate::statement::reader;
use crate::taxes;
use crate::transactions::TransactionKind;
use crate::types::Symbol;
use crate::util;

pub use self::actions::{apply_transaction, ApplyError, DividendRecord};
pub use self::holdings::{value_holdings, Holding};
pub use self::lots::{
    Lot, LotError, LotQueue, RealizedGain, SaleResult, LONG_TERM_HOLDING_DAYS};
pub use self::reducer::{ImportSummary, Reducer, SymbolReplay};

pub fn generate_transaction_id() -> String {
    Uuid::now_v7().to_string()
}

pub fn import(config: &Config, statement_path: &str) -> EmptyResult {
    let records = reader::read_statement(statement_path)?;

    let database = db::connect(&config.db_path)?;
    let repository = SqliteRepository::new(database);
    let cancel = Cancellation::new();

    let mut reducer = Reducer::new(&repository);
    let summary = reducer.ingest(&cancel, &records, &generate_transaction_id)?;

    println!("Imported: {}, Skipped: {}", summary.imported, summary.skipped);
    Ok(())
}

pub fn import_costs(config: &Config, report_path: &str) -> EmptyResult {
    let records = reader::read_costs(report_path)?;

    let database = db::connect(&config.db_path)?;
    let repository = SqliteRepository::new(database);
    let cancel = Cancellation::new();

    for record in &records {
        let symbol = record.symbol.parse::<Symbol>()?;
        override_cost(
            &repository, &cancel, &symbol,
            Money::from_rupees(record.average_cost)?,
            Money::from_rupees(record.total_cost)?,
        )?;
    }

    println!("Overridden cost basis for {} positions.", records.len());
    Ok(())
}

/// Replaces a holding's cost figures with externally supplied ones without touching the
/// transaction log.
///
/// This knowingly breaks the invariant that the holding's total cost equals the sum of its open
/// lots; the row is annotated accordingly and a subsequent replay re-derives the figures.
pub fn override_cost(
    repository: &dyn Repository, cancel: &Cancellation, symbol: &Symbol,
    average_cost: Money, total_cost: Money,
) -> EmptyResult {
    repository.update_holding_costs(cancel, symbol, average_cost, total_cost).map_err(|e| format!(
        "Failed to override {symbol} cost basis: {e}"))?;

    warn!("{}: the cost basis has been overridden and no longer matches the transaction log.",
          symbol);

    Ok(())
}

pub fn sync(config: &Config) -> EmptyResult {
    let database = db::connect(&config.db_path)?;
    let repository = SqliteRepository::new(database);
    let cancel = Cancellation::new();

    let symbols = repository.list_symbols(&cancel)?;
    if symbols.is_empty() {
        return Err!("There are no imported transactions to sync quotes for");
    }

    let provider = StaticProvider::new(&config.quotes);
    let progress = |done: usize, total: usize, symbol: &Symbol| {
        debug!("Got {symbol} quotes ({done}/{total})...");
    };

    let outcome = quotes::sync_prices(
        &provider, &symbols, &config.price_sync.options(), &cancel, Some(&progress));

    for price in &outcome.prices {
        repository.upsert_price(&cancel, price)?;
    }

    let prices: HashMap<Symbol, _> = outcome.prices.iter()
        .map(|price| (price.symbol.clone(), price.clone()))
        .collect();

    let rows = repository.list_holdings(&cancel)?;
    for holding in value_holdings(&rows, &prices) {
        if let (Some(price), Some(value), Some(gain), Some(gain_bp)) = (
            holding.last_price, holding.market_value,
            holding.unrealized_gain, holding.unrealized_gain_bp,
        ) {
            repository.update_holding_prices(
                &cancel, &holding.symbol, price, value, gain, gain_bp)?;
        }
    }

    for (symbol, error) in &outcome.errors {
        warn!("Failed to get {} quotes: {}.", symbol, error);
    }
    println!("Refreshed: {}, Failed: {}", outcome.prices.len(), outcome.errors.len());

    Ok(())
}

pub fn show(config: &Config) -> EmptyResult {
    let database = db::connect(&config.db_path)?;
    let repository = SqliteRepository::new(database);
    let cancel = Cancellation::new();

    let rows = repository.list_holdings(&cancel)?;
    if rows.is_empty() {
        println!("The portfolio is empty.");
        return Ok(());
    }

    let prices: HashMap<Symbol, _> = repository.latest_prices(&cancel)?.into_iter()
        .map(|price| (price.symbol.clone(), price))
        .collect();

    println!("{:<10} {:>9} {:>12} {:>15} {:>12} {:>15} {:>15} {:>9}",
             "Symbol", "Quantity", "Avg cost", "Total cost", "Price", "Value", "P/L", "P/L %");

    let mut total_cost = Money::zero();
    let mut total_value = Money::zero();

    for holding in value_holdings(&rows, &prices) {
        println!("{:<10} {:>9} {:>12} {:>15} {:>12} {:>15} {:>15} {:>9}",
                 holding.symbol.as_str(), holding.quantity,
                 holding.average_cost.to_string(), holding.total_cost.to_string(),
                 format_optional_money(holding.last_price),
                 format_optional_money(holding.market_value),
                 format_optional_money(holding.unrealized_gain),
                 format_optional_basis_points(holding.unrealized_gain_bp));

        total_cost += holding.total_cost;
        total_value += holding.market_value.unwrap_or(holding.total_cost);
    }

    println!();
    println!("Total cost: {}", total_cost);
    println!("Total value: {}", total_value);
    println!("Unrealized P/L: {} ({})",
             total_value - total_cost,
             format_basis_points(Money::percent_change(total_cost, total_value)));

    Ok(())
}

pub fn list_transactions(
    config: &Config, symbol: Option<&str>, kind: Option<TransactionKind>, limit: i64,
) -> EmptyResult {
    let database = db::connect(&config.db_path)?;
    let repository = SqliteRepository::new(database);
    let cancel = Cancellation::new();

    let filter = TransactionFilter {
        symbol: symbol.map(str::parse).transpose()?,
        kind: kind,
        limit: Some(limit),
        offset: None,
    };

    let transactions = repository.list_transactions(&cancel, &filter)?;
    let total = repository.count_transactions(&cancel, &filter)?;

    for transaction in &transactions {
        println!("{} {:<38} {:<10} {:<13} {:>9} {:>12} {}",
                 util::format_date(transaction.date), transaction.id,
                 transaction.symbol.as_str(), transaction.kind.to_string(),
                 transaction.quantity, transaction.price.to_string(), transaction.description);
    }
    println!("Shown: {}, Total: {}", transactions.len(), total);

    Ok(())
}

pub fn show_taxes(config: &Config, year: Option<i32>) -> EmptyResult {
    let database = db::connect(&config.db_path)?;
    let repository = SqliteRepository::new(database);
    let cancel = Cancellation::new();

    let reducer = Reducer::new(&repository);
    let gains = reducer.realized_gains(&cancel)?;
    if gains.is_empty() {
        println!("There are no realized gains yet.");
        return Ok(());
    }

    let summaries = taxes::aggregate_gains(&gains, config.fiscal_year, config.taxes);

    for summary in &summaries {
        if let Some(year) = year {
            if summary.fiscal_year != year {
                continue;
            }
        }

        println!("Fiscal year {}:", config.fiscal_year.format_year(summary.fiscal_year));
        println!("  Total gain: {} ({} sales)", summary.total_gain, summary.total_sales);
        println!("  Short-term: {} ({} sales)", summary.short_term_gain, summary.short_term_sales);
        println!("  Long-term:  {} ({} sales)", summary.long_term_gain, summary.long_term_sales);
        println!("  Estimated tax: {}", summary.estimated_tax);
    }

    Ok(())
}

pub fn remove(config: &Config, transaction_id: &str) -> EmptyResult {
    let database = db::connect(&config.db_path)?;
    let repository = SqliteRepository::new(database);
    let cancel = Cancellation::new();

    let transactions = repository.list_transactions(&cancel, &TransactionFilter::default())?;
    let transaction = transactions.iter().find(|transaction| transaction.id == transaction_id)
        .ok_or_else(|| format!("There is no transaction with {transaction_id:?} ID"))?;
    let symbol = transaction.symbol.clone();

    repository.delete_transaction(&cancel, transaction_id)?;

    let mut reducer = Reducer::new(&repository);
    reducer.reduce_symbol(&cancel, &symbol)?;

    println!("Removed. The {symbol} position has been rebuilt.");
    Ok(())
}

fn format_optional_money(value: Option<Money>) -> String {
    match value {
        Some(value) => value.to_string(),
        None => "-".to_owned(),
    }
}

fn format_optional_basis_points(value: Option<i32>) -> String {
    match value {
        Some(value) => format_basis_points(value),
        None => "-".to_owned(),
    }
}

fn format_basis_points(basis_points: i32) -> String {
    let sign = if basis_points < 0 {
        "-"
    } else {
        ""
    };
    format!("{}{}.{:02}%", sign, (basis_points / 100).abs(), (basis_points % 100).abs())
}
