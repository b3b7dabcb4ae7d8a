use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;

use crate::core::{GenericError, GenericResult};

pub use chrono::NaiveDate as Date;
pub use chrono::NaiveDateTime as DateTime;
pub use rust_decimal::Decimal;

macro_rules! date {
    ($year:expr, $month:expr, $day:expr) => {
        ::chrono::NaiveDate::from_ymd_opt($year, $month, $day).unwrap()
    }
}

/// NEPSE scrip symbol: 2-10 ASCII letters, stored upper-cased.
///
/// The natural key for positions. Comparison is case-insensitive by construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(symbol: &str) -> GenericResult<Symbol> {
        lazy_static! {
            static ref SYMBOL_REGEX: Regex = Regex::new(r"^[A-Za-z]{2,10}$").unwrap();
        }

        if !SYMBOL_REGEX.is_match(symbol) {
            return Err!("Invalid stock symbol: {:?}", symbol);
        }

        Ok(Symbol(symbol.to_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Symbol {
    type Err = GenericError;

    fn from_str(symbol: &str) -> GenericResult<Symbol> {
        Symbol::new(symbol)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}
