use std::str::FromStr;

use crate::core::GenericResult;
use crate::types::{Date, Decimal};

#[derive(Clone, Copy)]
pub enum DecimalRestrictions {
    No,
    PositiveOrZero,
    StrictlyPositive,
}

pub fn parse_date(date: &str, format: &str) -> GenericResult<Date> {
    Ok(Date::parse_from_str(date, format).map_err(|_| format!(
        "Invalid date: {date:?}"))?)
}

pub fn format_date(date: Date) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn parse_decimal(string: &str, restrictions: DecimalRestrictions) -> GenericResult<Decimal> {
    let value = Decimal::from_str(string).map_err(|_| format!(
        "Invalid decimal value: {string:?}"))?;
    validate_decimal(value, restrictions)
}

pub fn validate_decimal(value: Decimal, restrictions: DecimalRestrictions) -> GenericResult<Decimal> {
    let valid = match restrictions {
        DecimalRestrictions::No => true,
        DecimalRestrictions::PositiveOrZero => !value.is_sign_negative(),
        DecimalRestrictions::StrictlyPositive => value.is_sign_positive() && !value.is_zero(),
    };

    if !valid {
        return Err!("The value is out of the allowed range: {}", value);
    }

    Ok(value)
}
