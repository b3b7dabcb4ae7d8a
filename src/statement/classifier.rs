use num_traits::ToPrimitive;
use thiserror::Error;

use crate::transactions::TransactionKind;
use crate::types::Decimal;

/// The result of classifying one statement row.
///
/// Quantity is always positive; the reducer interprets its direction from the kind. When the
/// source carried a fractional share count (bonus accruals), the truncated residue is reported
/// here so the caller can record a warning.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub kind: TransactionKind,
    pub quantity: i64,
    pub residue: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClassifyError {
    #[error("both credit and debit quantities are positive")]
    AmbiguousQuantities,
    #[error("no positive share quantity")]
    MissingQuantity,
}

/// Maps a raw history description plus credit/debit quantities to a typed event.
///
/// Matching is a prefix table over the trimmed, upper-cased description. Anything unrecognized
/// comes back as [`TransactionKind::Unknown`] with a zero quantity; the reducer decides whether
/// to warn or fail.
pub fn classify(
    description: &str, credit: Option<Decimal>, debit: Option<Decimal>,
) -> Result<Classification, ClassifyError> {
    let description = description.trim().to_uppercase();

    let credit = credit.unwrap_or_default();
    let debit = debit.unwrap_or_default();

    if credit.is_sign_positive() && !credit.is_zero() && debit.is_sign_positive() && !debit.is_zero() {
        return Err(ClassifyError::AmbiguousQuantities);
    }

    let kind = if description.starts_with("INITIAL PUBLIC OFFERING") {
        TransactionKind::Ipo
    } else if description.starts_with("CA-BONUS") {
        TransactionKind::Bonus
    } else if description.starts_with("CA-RIGHTS") {
        TransactionKind::Rights
    } else if description.starts_with("CA-MERGER") {
        if !debit.is_zero() {
            TransactionKind::MergerOut
        } else {
            TransactionKind::MergerIn
        }
    } else if description.starts_with("CA-REARRANGEMENT") {
        TransactionKind::Rearrangement
    } else if description.starts_with("ON-CR") {
        TransactionKind::Buy
    } else if description.starts_with("ON-DR") {
        TransactionKind::Sell
    } else if description.starts_with("DEM") {
        TransactionKind::Demat
    } else {
        return Ok(Classification {
            kind: TransactionKind::Unknown,
            quantity: 0,
            residue: None,
        });
    };

    let raw_quantity = if !credit.is_zero() {
        credit
    } else {
        debit
    };

    let quantity = raw_quantity.trunc();
    let residue = raw_quantity - quantity;

    // NEPSE credits whole shares only; fractional accruals in source data are truncated.
    let quantity = quantity.to_i64().ok_or(ClassifyError::MissingQuantity)?;
    if quantity <= 0 {
        return Err(ClassifyError::MissingQuantity);
    }

    Ok(Classification {
        kind,
        quantity,
        residue: if residue.is_zero() {
            None
        } else {
            Some(residue)
        },
    })
}

#[cfg(test)]
mod tests {
    use matches::assert_matches;
    use rstest::rstest;
    use rust_decimal_macros::dec;
    use super::*;

    #[rstest(description, credit, debit, kind, quantity,
        case("ON-CR TRANSFER FROM BROKER 42", Some(dec!(100)), None, TransactionKind::Buy, 100),
        case("on-cr transfer", Some(dec!(10)), None, TransactionKind::Buy, 10),
        case("ON-DR TRANSFER TO BROKER 42", None, Some(dec!(60)), TransactionKind::Sell, 60),
        case("INITIAL PUBLIC OFFERING - IPO", Some(dec!(50)), None, TransactionKind::Ipo, 50),
        case("CA-BONUS 10%", Some(dec!(20)), None, TransactionKind::Bonus, 20),
        case("CA-RIGHTS 10:1", Some(dec!(30)), None, TransactionKind::Rights, 30),
        case("CA-REARRANGEMENT", Some(dec!(15)), None, TransactionKind::Rearrangement, 15),
        case("CA-MERGER NBL-NIBL", None, Some(dec!(200)), TransactionKind::MergerOut, 200),
        case("CA-MERGER NBL-NIBL", Some(dec!(160)), None, TransactionKind::MergerIn, 160),
        case("DEMAT CONVERSION", Some(dec!(5)), None, TransactionKind::Demat, 5),
        case("  ON-CR PADDED  ", Some(dec!(7)), None, TransactionKind::Buy, 7),
    )]
    fn classification(
        description: &str, credit: Option<Decimal>, debit: Option<Decimal>,
        kind: TransactionKind, quantity: i64,
    ) {
        let classification = classify(description, credit, debit).unwrap();
        assert_eq!(classification.kind, kind);
        assert_eq!(classification.quantity, quantity);
        assert_eq!(classification.residue, None);
    }

    #[test]
    fn unrecognized_descriptions() {
        let classification = classify("PLEDGE RELEASE", Some(dec!(10)), None).unwrap();
        assert_eq!(classification.kind, TransactionKind::Unknown);
        assert_eq!(classification.quantity, 0);
    }

    #[test]
    fn fractional_bonus_is_truncated() {
        let classification = classify("CA-BONUS 7.5%", Some(dec!(12.75)), None).unwrap();
        assert_eq!(classification.kind, TransactionKind::Bonus);
        assert_eq!(classification.quantity, 12);
        assert_eq!(classification.residue, Some(dec!(0.75)));
    }

    #[test]
    fn ambiguous_quantities() {
        assert_matches!(
            classify("ON-CR TRANSFER", Some(dec!(10)), Some(dec!(10))),
            Err(ClassifyError::AmbiguousQuantities));
    }

    #[rstest(credit, debit,
        case(None, None),
        case(Some(dec!(0)), Some(dec!(0))),
        case(Some(dec!(0.25)), None),
    )]
    fn missing_quantities(credit: Option<Decimal>, debit: Option<Decimal>) {
        assert_matches!(
            classify("ON-CR TRANSFER", credit, debit),
            Err(ClassifyError::MissingQuantity));
    }
}
