use std::cmp::Ordering;

use strum::{Display, EnumString};

use crate::money::Money;
use crate::types::{Date, Symbol};

/// Closed set of broker-recorded share event kinds.
///
/// The corporate-action dispatcher and the persistence encoding both match on it exhaustively,
/// so adding a kind is a compile-time obligation to update them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum TransactionKind {
    Buy,
    Sell,
    Bonus,
    Rights,
    Split,
    Dividend,
    MergerIn,
    MergerOut,
    Rearrangement,
    Demat,
    Ipo,
    Unknown,
}

impl TransactionKind {
    // Replay ordering within one date: corporate actions that change share identity or count
    // must land before the trades recorded on the same day.
    fn priority(self) -> u8 {
        match self {
            TransactionKind::Split => 0,
            TransactionKind::Bonus => 1,
            TransactionKind::Rights => 2,
            TransactionKind::Rearrangement => 3,
            TransactionKind::MergerIn => 4,
            TransactionKind::MergerOut => 5,
            TransactionKind::Ipo => 6,
            TransactionKind::Buy => 7,
            TransactionKind::Sell => 8,
            TransactionKind::Dividend => 9,
            TransactionKind::Demat => 10,
            TransactionKind::Unknown => 11,
        }
    }
}

/// An immutable broker-recorded share event.
///
/// Created on import and never mutated. Deleting one invalidates the derived FIFO state of its
/// symbol and forces a full replay.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: String,
    pub symbol: Symbol,
    pub date: Date,
    pub kind: TransactionKind,
    pub quantity: i64,
    pub price: Money,
    pub total_cost: Money,
    pub description: String,
}

impl Transaction {
    pub fn sort_key(&self) -> (Date, u8, &str) {
        (self.date, self.kind.priority(), &self.id)
    }
}

pub fn replay_order(a: &Transaction, b: &Transaction) -> Ordering {
    a.sort_key().cmp(&b.sort_key())
}

/// Same-date ordering for records that don't have a stable ID yet (a parsed import batch).
pub fn batch_order(a: (Date, TransactionKind), b: (Date, TransactionKind)) -> Ordering {
    (a.0, a.1.priority()).cmp(&(b.0, b.1.priority()))
}
