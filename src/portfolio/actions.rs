use thiserror::Error;

use crate::money::Money;
use crate::transactions::{Transaction, TransactionKind};
use crate::types::{Date, Symbol};

use super::lots::{LotError, LotQueue, SaleResult};

/// A cash dividend noted during replay. Dividends never touch lots; they accumulate in this
/// side log only.
#[derive(Debug, Clone, PartialEq)]
pub struct DividendRecord {
    pub symbol: Symbol,
    pub date: Date,
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApplyError {
    #[error(transparent)]
    Lot(#[from] LotError),
    #[error("unclassified transaction: {0:?}")]
    Unknown(String),
}

/// Applies one classified transaction to the symbol's lot queue.
///
/// Buy-like events append a lot at the event's price and date (zero price is normal for bonus
/// shares). Sell-like events consume lots and return the realized gains. Splits rescale the
/// queue. Demat is a book-entry conversion with no position effect. Unknown events and sells
/// against insufficient shares fail loudly.
pub fn apply_transaction(
    queue: &mut LotQueue, transaction: &Transaction, dividends: &mut Vec<DividendRecord>,
) -> Result<Option<SaleResult>, ApplyError> {
    match transaction.kind {
        TransactionKind::Buy |
        TransactionKind::Bonus |
        TransactionKind::Rights |
        TransactionKind::Ipo |
        TransactionKind::Rearrangement |
        TransactionKind::MergerIn => {
            queue.buy(transaction.quantity, transaction.price, transaction.date)?;
            Ok(None)
        },

        TransactionKind::Sell |
        TransactionKind::MergerOut => {
            let sale = queue.sell(transaction.quantity, transaction.price, transaction.date)?;
            Ok(Some(sale))
        },

        TransactionKind::Split => {
            queue.apply_split(transaction.quantity)?;
            Ok(None)
        },

        TransactionKind::Dividend => {
            dividends.push(DividendRecord {
                symbol: transaction.symbol.clone(),
                date: transaction.date,
                amount: transaction.total_cost,
            });
            Ok(None)
        },

        TransactionKind::Demat => Ok(None),

        TransactionKind::Unknown => Err(ApplyError::Unknown(transaction.description.clone())),
    }
}

#[cfg(test)]
mod tests {
    use matches::assert_matches;
    use super::*;

    fn transaction(kind: TransactionKind, quantity: i64, price: i64) -> Transaction {
        Transaction {
            id: s!("00000000-0000-0000-0000-000000000000"),
            symbol: Symbol::new("NABIL").unwrap(),
            date: date!(2024, 2, 1),
            kind: kind,
            quantity: quantity,
            price: Money::from_paisa(price * 100),
            total_cost: Money::from_paisa(price * quantity * 100),
            description: s!("test"),
        }
    }

    fn queue_with_position() -> LotQueue {
        let mut queue = LotQueue::new(Symbol::new("NABIL").unwrap());
        queue.buy(100, Money::from_paisa(60_000), date!(2024, 1, 1)).unwrap();
        queue
    }

    #[test]
    fn bonus_preserves_cost_and_dilutes_average() {
        let mut queue = queue_with_position();
        let mut dividends = Vec::new();

        let result = apply_transaction(
            &mut queue, &transaction(TransactionKind::Bonus, 20, 0), &mut dividends).unwrap();

        assert!(result.is_none());
        assert_eq!(queue.total_shares(), 120);
        assert_eq!(queue.total_cost(), Money::from_paisa(6_000_000));
        assert_eq!(queue.weighted_average_cost(), Money::from_paisa(50_000));
    }

    #[test]
    fn merger_out_realizes_gains() {
        let mut queue = queue_with_position();
        let mut dividends = Vec::new();

        let result = apply_transaction(
            &mut queue, &transaction(TransactionKind::MergerOut, 100, 0), &mut dividends).unwrap();

        let sale = result.unwrap();
        assert_eq!(sale.quantity, 100);
        assert!(queue.is_empty());
    }

    #[test]
    fn split_rescales_the_queue() {
        let mut queue = queue_with_position();
        let mut dividends = Vec::new();

        apply_transaction(
            &mut queue, &transaction(TransactionKind::Split, 2, 0), &mut dividends).unwrap();

        assert_eq!(queue.total_shares(), 200);
        assert_eq!(queue.weighted_average_cost(), Money::from_paisa(30_000));
    }

    #[test]
    fn dividend_only_touches_the_side_log() {
        let mut queue = queue_with_position();
        let mut dividends = Vec::new();

        let mut event = transaction(TransactionKind::Dividend, 0, 0);
        event.total_cost = Money::from_paisa(1_500_000);

        apply_transaction(&mut queue, &event, &mut dividends).unwrap();

        assert_eq!(queue.total_shares(), 100);
        assert_eq!(dividends, vec![DividendRecord {
            symbol: Symbol::new("NABIL").unwrap(),
            date: date!(2024, 2, 1),
            amount: Money::from_paisa(1_500_000),
        }]);
    }

    #[test]
    fn demat_has_no_position_effect() {
        let mut queue = queue_with_position();
        let mut dividends = Vec::new();

        apply_transaction(
            &mut queue, &transaction(TransactionKind::Demat, 100, 0), &mut dividends).unwrap();

        assert_eq!(queue.total_shares(), 100);
        assert!(dividends.is_empty());
    }

    #[test]
    fn unknown_transactions_fail_loudly() {
        let mut queue = queue_with_position();
        let mut dividends = Vec::new();

        assert_matches!(
            apply_transaction(
                &mut queue, &transaction(TransactionKind::Unknown, 10, 0), &mut dividends),
            Err(ApplyError::Unknown(_)));
    }

    #[test]
    fn oversell_is_an_error_not_a_warning() {
        let mut queue = queue_with_position();
        let mut dividends = Vec::new();

        let error = apply_transaction(
            &mut queue, &transaction(TransactionKind::Sell, 150, 500), &mut dividends).unwrap_err();

        assert_matches!(error, ApplyError::Lot(LotError::Oversell {requested: 150, available: 100}));
        assert_eq!(queue.total_shares(), 100);
    }
}
