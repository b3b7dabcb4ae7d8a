use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use itertools::Itertools;
use log::warn;

use crate::core::{Cancellation, GenericResult};
use crate::money::Money;
use crate::repository::{CostSource, HoldingRow, Repository, RepositoryError};
use crate::statement::{self, ParsedRecord};
use crate::transactions::{batch_order, replay_order, Transaction, TransactionKind};
use crate::types::{Date, Symbol};
use crate::util;

use super::actions::{apply_transaction, DividendRecord};
use super::lots::{LotQueue, RealizedGain};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
}

/// The in-memory result of replaying one symbol's full transaction history.
#[derive(Debug)]
pub struct SymbolReplay {
    pub symbol: Symbol,
    pub queue: LotQueue,
    pub gains: Vec<RealizedGain>,
    pub dividends: Vec<DividendRecord>,
}

/// Replays unordered, possibly duplicated transaction batches into deterministic holdings.
///
/// The repository is the source of truth for already-seen transactions; replay always starts
/// from the symbol's earliest transaction, so back-dated additions are handled by construction.
/// A reducer is driven from a single caller; constructing several reducers against distinct
/// repositories is fine.
pub struct Reducer<'a> {
    repository: &'a dyn Repository,
    warnings: Vec<String>,
}

impl<'a> Reducer<'a> {
    pub fn new(repository: &'a dyn Repository) -> Reducer<'a> {
        Reducer {
            repository: repository,
            warnings: Vec::new(),
        }
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn clear_warnings(&mut self) {
        self.warnings.clear();
    }

    fn warn(&mut self, message: String) {
        warn!("{message}.");
        self.warnings.push(message);
    }

    /// Classifies and imports a parsed statement batch, then re-replays every affected symbol.
    ///
    /// Import is idempotent: records whose `(symbol, date, description)` triple is already
    /// persisted are counted as skipped. Out-of-order batches are accepted with a warning and
    /// processed in deterministic order. Each affected symbol's new transactions and holdings
    /// update are persisted within a single repository transaction.
    pub fn ingest(
        &mut self, cancel: &Cancellation, records: &[ParsedRecord],
        generate_id: &dyn Fn() -> String,
    ) -> GenericResult<ImportSummary> {
        let mut summary = ImportSummary::default();
        let mut batch_keys = Vec::new();
        let mut batches: BTreeMap<Symbol, Vec<Transaction>> = BTreeMap::new();
        let mut batch_seen: HashSet<(Symbol, Date, String)> = HashSet::new();

        for (index, record) in records.iter().enumerate() {
            let label = record.sequence
                .map(|sequence| format!("#{sequence}"))
                .unwrap_or_else(|| format!("#{}", index + 1));

            let symbol = match record.symbol.parse::<Symbol>() {
                Ok(symbol) => symbol,
                Err(e) => {
                    self.warn(format!("Skipping record {label}: {e}"));
                    summary.skipped += 1;
                    continue;
                },
            };

            let classification = match statement::classify(
                &record.description, record.credit, record.debit,
            ) {
                Ok(classification) => classification,
                Err(e) => {
                    self.warn(format!("Skipping record {label} ({symbol}): {e}"));
                    summary.skipped += 1;
                    continue;
                },
            };

            if classification.kind == TransactionKind::Unknown {
                self.warn(format!(
                    "Skipping record {} ({}) with unrecognized description: {:?}",
                    label, symbol, record.description));
                summary.skipped += 1;
                continue;
            }

            if let Some(residue) = classification.residue {
                self.warn(format!(
                    "Record {label} ({symbol}): discarding fractional share residue {residue}"));
            }

            batch_keys.push((record.date, classification.kind));

            let key = (symbol.clone(), record.date, record.description.clone());
            if batch_seen.contains(&key) || self.repository.transaction_exists(
                cancel, &symbol, record.date, &record.description)?
            {
                summary.skipped += 1;
                continue;
            }
            batch_seen.insert(key);

            let price = match record.price {
                Some(price) => Money::from_rupees(price).map_err(|e| format!(
                    "Record {label} ({symbol}): {e}"))?,
                None => Money::zero(),
            };

            if price.is_zero() && matches!(
                classification.kind,
                TransactionKind::Buy | TransactionKind::Rights | TransactionKind::Ipo,
            ) {
                self.warn(format!(
                    "Record {} ({}): {} with zero price",
                    label, symbol, classification.kind));
            }

            batches.entry(symbol.clone()).or_default().push(Transaction {
                id: generate_id(),
                symbol: symbol,
                date: record.date,
                kind: classification.kind,
                quantity: classification.quantity,
                price: price,
                total_cost: price.multiply(classification.quantity),
                description: record.description.clone(),
            });

            summary.imported += 1;
        }

        let out_of_order = batch_keys.iter()
            .tuple_windows()
            .filter(|(a, b)| batch_order(**a, **b) == Ordering::Greater)
            .count();
        if out_of_order > 0 {
            self.warn(format!(
                "The import batch contains {out_of_order} out-of-order records, \
                 processing in deterministic order"));
        }

        for (symbol, transactions) in &batches {
            self.reduce(cancel, symbol, transactions)?;
        }

        Ok(summary)
    }

    /// Re-replays a symbol from its earliest transaction and persists the resulting holding.
    pub fn reduce_symbol(
        &mut self, cancel: &Cancellation, symbol: &Symbol,
    ) -> GenericResult<SymbolReplay> {
        self.reduce(cancel, symbol, &[])
    }

    /// Read-only replay: rebuilds the symbol's lot queue, realized-gain log and dividend log
    /// without touching the repository's holdings.
    pub fn replay_symbol(
        &self, cancel: &Cancellation, symbol: &Symbol,
    ) -> GenericResult<SymbolReplay> {
        replay_transactions(self.repository, cancel, symbol)
    }

    /// The full realized-gain log, rebuilt by replaying every known symbol.
    pub fn realized_gains(&self, cancel: &Cancellation) -> GenericResult<Vec<RealizedGain>> {
        let mut gains = Vec::new();
        for symbol in self.repository.list_symbols(cancel)? {
            gains.extend(self.replay_symbol(cancel, &symbol)?.gains);
        }
        Ok(gains)
    }

    /// The full dividend side log.
    pub fn dividends(&self, cancel: &Cancellation) -> GenericResult<Vec<DividendRecord>> {
        let mut dividends = Vec::new();
        for symbol in self.repository.list_symbols(cancel)? {
            dividends.extend(self.replay_symbol(cancel, &symbol)?.dividends);
        }
        Ok(dividends)
    }

    fn reduce(
        &mut self, cancel: &Cancellation, symbol: &Symbol, new_transactions: &[Transaction],
    ) -> GenericResult<SymbolReplay> {
        let repository = self.repository;
        let mut outcome = None;

        repository.transaction(cancel, &mut |repository| {
            repository.upsert_stock(cancel, symbol, None, None)?;

            for transaction in new_transactions {
                repository.create_transaction(cancel, transaction)?;
            }

            let replay = replay_transactions(repository, cancel, symbol)
                .map_err(|e| RepositoryError::InvalidData(e.to_string()))?;

            if replay.queue.total_shares() > 0 {
                repository.upsert_holding(cancel, &HoldingRow {
                    symbol: symbol.clone(),
                    quantity: replay.queue.total_shares(),
                    average_cost: replay.queue.weighted_average_cost(),
                    total_cost: replay.queue.total_cost(),
                    last_price: None,
                    market_value: None,
                    unrealized_gain: None,
                    unrealized_gain_bp: None,
                    cost_source: CostSource::Replay,
                })?;
            } else {
                repository.delete_holding(cancel, symbol)?;
            }

            outcome = Some(replay);
            Ok(())
        }).map_err(|e| format!("Failed to update {symbol} position: {e}"))?;

        let replay = outcome.unwrap();

        if !replay.queue.rounding_error().is_zero() {
            self.warn(format!(
                "{}: split rounding changed the cost basis by {} paisa",
                symbol, replay.queue.rounding_error().paisa()));
        }

        Ok(replay)
    }
}

fn replay_transactions(
    repository: &dyn Repository, cancel: &Cancellation, symbol: &Symbol,
) -> GenericResult<SymbolReplay> {
    let mut transactions = repository.list_transactions_by_symbol(cancel, symbol)?;
    transactions.sort_by(replay_order);

    let mut queue = LotQueue::new(symbol.clone());
    let mut gains = Vec::new();
    let mut dividends = Vec::new();

    for transaction in &transactions {
        let sale = apply_transaction(&mut queue, transaction, &mut dividends).map_err(|e| format!(
            "Failed to replay {} transaction from {}: {}",
            symbol, util::format_date(transaction.date), e))?;

        if let Some(sale) = sale {
            gains.extend(sale.gains);
        }
    }

    Ok(SymbolReplay {
        symbol: symbol.clone(),
        queue: queue,
        gains: gains,
        dividends: dividends,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use crate::db::{self, SqliteRepository};
    use super::*;

    struct TestContext {
        _database: tempfile::NamedTempFile,
        repository: SqliteRepository,
        cancel: Cancellation,
        next_id: AtomicUsize,
    }

    impl TestContext {
        fn new() -> TestContext {
            let (database, connection) = db::new_temporary();
            TestContext {
                _database: database,
                repository: SqliteRepository::new(connection),
                cancel: Cancellation::new(),
                next_id: AtomicUsize::new(0),
            }
        }

        fn ingest(
            &self, reducer: &mut Reducer, records: &[ParsedRecord],
        ) -> GenericResult<ImportSummary> {
            let generate_id = || format!(
                "0191a0b0-0000-7000-8000-{:012}",
                self.next_id.fetch_add(1, AtomicOrdering::SeqCst));
            reducer.ingest(&self.cancel, records, &generate_id)
        }
    }

    fn record(
        symbol: &str, date: Date, credit: Option<Decimal>, debit: Option<Decimal>,
        description: &str, price: Option<Decimal>,
    ) -> ParsedRecord {
        ParsedRecord {
            sequence: None,
            symbol: symbol.to_owned(),
            date: date,
            credit: credit,
            debit: debit,
            balance: None,
            description: description.to_owned(),
            price: price,
        }
    }

    fn rupees(amount: i64) -> Money {
        Money::from_paisa(amount * 100)
    }

    #[test]
    fn simple_buy_sell() {
        let context = TestContext::new();
        let mut reducer = Reducer::new(&context.repository);

        let summary = context.ingest(&mut reducer, &[
            record("NABIL", date!(2024, 1, 15), Some(dec!(100)), None,
                   "ON-CR TRANSFER FROM BROKER 42", Some(dec!(500))),
            record("NABIL", date!(2024, 3, 15), None, Some(dec!(60)),
                   "ON-DR TRANSFER TO BROKER 42", Some(dec!(550))),
        ]).unwrap();

        assert_eq!(summary, ImportSummary {imported: 2, skipped: 0});
        assert!(reducer.warnings().is_empty());

        let symbol = Symbol::new("NABIL").unwrap();
        let holding = context.repository.get_holding(&context.cancel, &symbol).unwrap().unwrap();
        assert_eq!(holding.quantity, 40);
        assert_eq!(holding.average_cost, rupees(500));
        assert_eq!(holding.total_cost, rupees(20_000));

        let replay = reducer.replay_symbol(&context.cancel, &symbol).unwrap();
        assert_eq!(replay.gains.len(), 1);

        let gain = &replay.gains[0];
        assert_eq!(gain.quantity, 60);
        assert_eq!(gain.cost_basis, rupees(500));
        assert_eq!(gain.gain, rupees(3_000));
        assert_eq!(gain.holding_days, 59);
        assert!(!gain.long_term);
    }

    #[test]
    fn duplicate_import_is_a_no_op() {
        let context = TestContext::new();
        let mut reducer = Reducer::new(&context.repository);

        let records = vec![
            record("NABIL", date!(2024, 1, 15), Some(dec!(100)), None,
                   "ON-CR TRANSFER FROM BROKER 42", Some(dec!(500))),
            record("HDL", date!(2024, 2, 1), Some(dec!(10)), None,
                   "ON-CR TRANSFER FROM BROKER 58", Some(dec!(1200))),
        ];

        let summary = context.ingest(&mut reducer, &records).unwrap();
        assert_eq!(summary, ImportSummary {imported: 2, skipped: 0});

        let holdings = context.repository.list_holdings(&context.cancel).unwrap();
        let gains = reducer.realized_gains(&context.cancel).unwrap();

        let summary = context.ingest(&mut reducer, &records).unwrap();
        assert_eq!(summary, ImportSummary {imported: 0, skipped: 2});

        assert_eq!(context.repository.list_holdings(&context.cancel).unwrap(), holdings);
        assert_eq!(reducer.realized_gains(&context.cancel).unwrap(), gains);
    }

    #[test]
    fn out_of_order_batch_is_sorted_with_a_warning() {
        let sorted_context = TestContext::new();
        let mut sorted_reducer = Reducer::new(&sorted_context.repository);
        sorted_context.ingest(&mut sorted_reducer, &[
            record("NABIL", date!(2024, 1, 15), Some(dec!(100)), None,
                   "ON-CR TRANSFER FROM BROKER 42", Some(dec!(500))),
            record("NABIL", date!(2024, 3, 15), None, Some(dec!(60)),
                   "ON-DR TRANSFER TO BROKER 42", Some(dec!(550))),
        ]).unwrap();
        assert!(sorted_reducer.warnings().is_empty());

        let shuffled_context = TestContext::new();
        let mut shuffled_reducer = Reducer::new(&shuffled_context.repository);
        shuffled_context.ingest(&mut shuffled_reducer, &[
            record("NABIL", date!(2024, 3, 15), None, Some(dec!(60)),
                   "ON-DR TRANSFER TO BROKER 42", Some(dec!(550))),
            record("NABIL", date!(2024, 1, 15), Some(dec!(100)), None,
                   "ON-CR TRANSFER FROM BROKER 42", Some(dec!(500))),
        ]).unwrap();

        let warnings = shuffled_reducer.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("out-of-order"), "{}", warnings[0]);

        assert_eq!(
            shuffled_context.repository.list_holdings(&shuffled_context.cancel).unwrap(),
            sorted_context.repository.list_holdings(&sorted_context.cancel).unwrap());

        shuffled_reducer.clear_warnings();
        assert!(shuffled_reducer.warnings().is_empty());
    }

    #[test]
    fn back_dated_transactions_force_full_replay() {
        let context = TestContext::new();
        let mut reducer = Reducer::new(&context.repository);
        let symbol = Symbol::new("NABIL").unwrap();

        context.ingest(&mut reducer, &[
            record("NABIL", date!(2024, 1, 15), Some(dec!(100)), None,
                   "ON-CR TRANSFER FROM BROKER 42", Some(dec!(500))),
            record("NABIL", date!(2024, 2, 15), None, Some(dec!(50)),
                   "ON-DR TRANSFER TO BROKER 42", Some(dec!(600))),
        ]).unwrap();

        let replay = reducer.replay_symbol(&context.cancel, &symbol).unwrap();
        assert_eq!(replay.gains[0].cost_basis, rupees(500));

        // A back-dated cheaper lot must now be consumed first
        context.ingest(&mut reducer, &[
            record("NABIL", date!(2024, 1, 5), Some(dec!(50)), None,
                   "ON-CR TRANSFER FROM BROKER 7", Some(dec!(400))),
        ]).unwrap();

        let replay = reducer.replay_symbol(&context.cancel, &symbol).unwrap();
        assert_eq!(replay.gains.len(), 1);
        assert_eq!(replay.gains[0].cost_basis, rupees(400));

        let holding = context.repository.get_holding(&context.cancel, &symbol).unwrap().unwrap();
        assert_eq!(holding.quantity, 100);
        assert_eq!(holding.average_cost, rupees(500));
    }

    #[test]
    fn oversell_aborts_the_symbol_atomically() {
        let context = TestContext::new();
        let mut reducer = Reducer::new(&context.repository);
        let symbol = Symbol::new("NABIL").unwrap();

        context.ingest(&mut reducer, &[
            record("NABIL", date!(2024, 1, 15), Some(dec!(30)), None,
                   "ON-CR TRANSFER FROM BROKER 42", Some(dec!(500))),
        ]).unwrap();

        let error = context.ingest(&mut reducer, &[
            record("NABIL", date!(2024, 2, 15), None, Some(dec!(50)),
                   "ON-DR TRANSFER TO BROKER 42", Some(dec!(550))),
        ]).unwrap_err();
        assert!(error.to_string().contains("cannot sell 50 shares, only 30 available"),
                "{}", error);

        // The failed sell was rolled back together with its holdings update
        let holding = context.repository.get_holding(&context.cancel, &symbol).unwrap().unwrap();
        assert_eq!(holding.quantity, 30);
        assert_eq!(context.repository.count_transactions(
            &context.cancel, &Default::default()).unwrap(), 1);
    }

    #[test]
    fn bonus_shares_dilute_average_cost() {
        let context = TestContext::new();
        let mut reducer = Reducer::new(&context.repository);

        context.ingest(&mut reducer, &[
            record("NABIL", date!(2024, 1, 15), Some(dec!(100)), None,
                   "ON-CR TRANSFER FROM BROKER 42", Some(dec!(600))),
            record("NABIL", date!(2024, 6, 1), Some(dec!(20)), None,
                   "CA-BONUS 20%", None),
        ]).unwrap();
        assert!(reducer.warnings().is_empty());

        let symbol = Symbol::new("NABIL").unwrap();
        let holding = context.repository.get_holding(&context.cancel, &symbol).unwrap().unwrap();
        assert_eq!(holding.quantity, 120);
        assert_eq!(holding.total_cost, rupees(60_000));
        assert_eq!(holding.average_cost, rupees(500));
    }

    #[test]
    fn position_sold_out_removes_the_holding_row() {
        let context = TestContext::new();
        let mut reducer = Reducer::new(&context.repository);
        let symbol = Symbol::new("NABIL").unwrap();

        context.ingest(&mut reducer, &[
            record("NABIL", date!(2024, 1, 15), Some(dec!(100)), None,
                   "ON-CR TRANSFER FROM BROKER 42", Some(dec!(500))),
        ]).unwrap();
        assert!(context.repository.get_holding(&context.cancel, &symbol).unwrap().is_some());

        context.ingest(&mut reducer, &[
            record("NABIL", date!(2024, 3, 15), None, Some(dec!(100)),
                   "ON-DR TRANSFER TO BROKER 42", Some(dec!(550))),
        ]).unwrap();
        assert!(context.repository.get_holding(&context.cancel, &symbol).unwrap().is_none());
    }

    #[test]
    fn unrecognized_and_invalid_records_are_skipped_with_warnings() {
        let context = TestContext::new();
        let mut reducer = Reducer::new(&context.repository);

        let summary = context.ingest(&mut reducer, &[
            record("NABIL", date!(2024, 1, 15), Some(dec!(100)), None,
                   "ON-CR TRANSFER FROM BROKER 42", Some(dec!(500))),
            record("NABIL", date!(2024, 1, 16), Some(dec!(10)), None,
                   "PLEDGE RELEASE", None),
            record("BAD-1", date!(2024, 1, 17), Some(dec!(10)), None,
                   "ON-CR TRANSFER FROM BROKER 42", None),
            record("NABIL", date!(2024, 1, 18), Some(dec!(10)), Some(dec!(10)),
                   "ON-CR TRANSFER FROM BROKER 42", None),
        ]).unwrap();

        assert_eq!(summary, ImportSummary {imported: 1, skipped: 3});
        assert_eq!(reducer.warnings().len(), 3);
    }

    #[test]
    fn gratis_trade_pricing_is_suspicious() {
        let context = TestContext::new();
        let mut reducer = Reducer::new(&context.repository);

        context.ingest(&mut reducer, &[
            record("NABIL", date!(2024, 1, 15), Some(dec!(100)), None,
                   "ON-CR TRANSFER FROM BROKER 42", None),
        ]).unwrap();

        let warnings = reducer.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("zero price"), "{}", warnings[0]);
    }
}
