use std::collections::BTreeMap;

use crate::money::Money;
use crate::portfolio::RealizedGain;

use super::{FiscalYearSpec, TaxRates};

/// Realized-gain totals for one fiscal year.
///
/// Estimated tax applies the configured rates to the positive short-term and long-term totals
/// separately; losses never produce negative tax.
#[derive(Debug, Clone, PartialEq)]
pub struct TaxYearSummary {
    pub fiscal_year: i32,
    pub total_gain: Money,
    pub short_term_gain: Money,
    pub long_term_gain: Money,
    pub short_term_sales: usize,
    pub long_term_sales: usize,
    pub total_sales: usize,
    pub estimated_tax: Money,
}

/// Buckets the realized-gain log into fiscal years, oldest first. Every gain lands in exactly
/// one bucket.
pub fn aggregate_gains(
    gains: &[RealizedGain], fiscal_year: FiscalYearSpec, rates: TaxRates,
) -> Vec<TaxYearSummary> {
    let mut buckets: BTreeMap<i32, TaxYearSummary> = BTreeMap::new();

    for gain in gains {
        let year = fiscal_year.year_of(gain.sale_date);

        let summary = buckets.entry(year).or_insert_with(|| TaxYearSummary {
            fiscal_year: year,
            total_gain: Money::zero(),
            short_term_gain: Money::zero(),
            long_term_gain: Money::zero(),
            short_term_sales: 0,
            long_term_sales: 0,
            total_sales: 0,
            estimated_tax: Money::zero(),
        });

        summary.total_gain += gain.gain;
        summary.total_sales += 1;

        if gain.long_term {
            summary.long_term_gain += gain.gain;
            summary.long_term_sales += 1;
        } else {
            summary.short_term_gain += gain.gain;
            summary.short_term_sales += 1;
        }
    }

    buckets.into_values().map(|mut summary| {
        summary.estimated_tax =
            taxable(summary.short_term_gain).scale_by_basis_points(rates.short_term_bp) +
            taxable(summary.long_term_gain).scale_by_basis_points(rates.long_term_bp);
        summary
    }).collect()
}

fn taxable(gain: Money) -> Money {
    gain.max(Money::zero())
}
