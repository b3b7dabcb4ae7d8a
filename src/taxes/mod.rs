mod aggregator;

use chrono::Datelike;
use serde::Deserialize;

use crate::core::EmptyResult;
use crate::types::Date;

pub use self::aggregator::{aggregate_gains, TaxYearSummary};

/// Month/day cut-over that starts a fiscal year.
///
/// Gains are bucketed by the fiscal year containing the sale date. The default is the calendar
/// year; the Nepali fiscal year (starting around July 16 in the Gregorian calendar) is the
/// documented alternative. Always an explicit parameter, never process-global state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FiscalYearSpec {
    pub month: u32,
    pub day: u32,
}

impl Default for FiscalYearSpec {
    fn default() -> FiscalYearSpec {
        FiscalYearSpec::calendar()
    }
}

impl FiscalYearSpec {
    pub fn calendar() -> FiscalYearSpec {
        FiscalYearSpec {month: 1, day: 1}
    }

    pub fn nepal() -> FiscalYearSpec {
        FiscalYearSpec {month: 7, day: 16}
    }

    pub fn validate(&self) -> EmptyResult {
        if self.month < 1 || self.month > 12 || self.day < 1 || self.day > 31 {
            return Err!("Invalid fiscal year start: {:02}-{:02}", self.month, self.day);
        }
        Ok(())
    }

    /// The year in which the fiscal year containing this date starts.
    pub fn year_of(&self, date: Date) -> i32 {
        if (date.month(), date.day()) >= (self.month, self.day) {
            date.year()
        } else {
            date.year() - 1
        }
    }

    pub fn format_year(&self, year: i32) -> String {
        if *self == FiscalYearSpec::calendar() {
            year.to_string()
        } else {
            format!("{}/{:02}", year, (year + 1) % 100)
        }
    }
}

/// Estimated tax rates on realized gains, in basis points of the positive gain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaxRates {
    pub short_term_bp: i32,
    pub long_term_bp: i32,
}

impl Default for TaxRates {
    fn default() -> TaxRates {
        TaxRates {
            short_term_bp: 750,
            long_term_bp: 500,
        }
    }
}

impl TaxRates {
    pub fn validate(&self) -> EmptyResult {
        for rate in [self.short_term_bp, self.long_term_bp] {
            if rate < 0 || rate > 10_000 {
                return Err!("Invalid tax rate: {} bp", rate);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use super::*;

    #[rstest(month, day, date, expected,
        case(1, 1, date!(2024, 1, 1), 2024),
        case(1, 1, date!(2024, 12, 31), 2024),
        case(7, 16, date!(2024, 7, 16), 2024),
        case(7, 16, date!(2024, 7, 15), 2023),
        case(7, 16, date!(2025, 1, 10), 2024),
        case(7, 16, date!(2025, 8, 1), 2025),
    )]
    fn fiscal_year_bucketing(month: u32, day: u32, date: Date, expected: i32) {
        let spec = FiscalYearSpec {month, day};
        assert_eq!(spec.year_of(date), expected);
    }

    #[test]
    fn year_formatting() {
        assert_eq!(FiscalYearSpec::calendar().format_year(2024), "2024");
        assert_eq!(FiscalYearSpec::nepal().format_year(2024), "2024/25");
        assert_eq!(FiscalYearSpec::nepal().format_year(2099), "2099/00");
    }

    #[test]
    fn validation() {
        assert!(FiscalYearSpec::nepal().validate().is_ok());
        assert!(FiscalYearSpec {month: 13, day: 1}.validate().is_err());
        assert!(TaxRates::default().validate().is_ok());
        assert!(TaxRates {short_term_bp: -1, long_term_bp: 500}.validate().is_err());
    }
}
