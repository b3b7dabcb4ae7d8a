use std::fs::File;

use csv::StringRecord;
use num_traits::ToPrimitive;

use crate::core::GenericResult;
use crate::types::{Date, Decimal};
use crate::util::{self, DecimalRestrictions};

use super::{CostRecord, ParsedRecord};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Reads a Meroshare-style share statement export.
///
/// Expected columns: sequence number, scrip, transaction date, credit quantity, debit quantity,
/// balance after transaction, history description, and an optional price/rate column. A `-`
/// value means "no quantity".
pub fn read_statement(path: &str) -> GenericResult<Vec<ParsedRecord>> {
    Ok(read_statement_impl(path).map_err(|e| format!(
        "Error while reading {path:?} share statement: {e}"))?)
}

fn read_statement_impl(path: &str) -> GenericResult<Vec<ParsedRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(File::open(path)?);

    let headers = reader.headers()?.clone();

    let sequence = find_column(&headers, &["S.N", "SN", "Sequence"])?;
    let symbol = find_column(&headers, &["Scrip", "Symbol"])?;
    let date = find_column(&headers, &["Transaction Date", "Date"])?;
    let credit = find_column(&headers, &["Credit Quantity", "Credit"])?;
    let debit = find_column(&headers, &["Debit Quantity", "Debit"])?;
    let balance = find_column(&headers, &["Balance After Transaction", "Balance"])?;
    let description = find_column(&headers, &["History Description", "Description"])?;
    let price = find_optional_column(&headers, &["Price", "Rate"]);

    let mut records = Vec::new();

    for (index, row) in reader.records().enumerate() {
        let row = row?;

        let record = parse_record(
            &row, sequence, symbol, date, credit, debit, balance, description, price,
        ).map_err(|e| format!("Invalid record #{}: {}", index + 1, e))?;

        records.push(record);
    }

    Ok(records)
}

#[allow(clippy::too_many_arguments)]
fn parse_record(
    row: &StringRecord, sequence: usize, symbol: usize, date: usize,
    credit: usize, debit: usize, balance: usize, description: usize, price: Option<usize>,
) -> GenericResult<ParsedRecord> {
    Ok(ParsedRecord {
        sequence: parse_quantity_cell(get_cell(row, sequence)?)?
            .map(|value| value.to_i64().ok_or_else(|| format!("Invalid sequence number: {value}")))
            .transpose()?,
        symbol: get_cell(row, symbol)?.to_owned(),
        date: util::parse_date(get_cell(row, date)?, DATE_FORMAT)?,
        credit: parse_quantity_cell(get_cell(row, credit)?)?,
        debit: parse_quantity_cell(get_cell(row, debit)?)?,
        balance: parse_quantity_cell(get_cell(row, balance)?)?,
        description: get_cell(row, description)?.to_owned(),
        price: match price {
            Some(index) => parse_quantity_cell(get_cell(row, index)?)?,
            None => None,
        },
    })
}

/// Reads a weighted-average-cost report: scrip, current balance, WACC rate, total cost.
pub fn read_costs(path: &str) -> GenericResult<Vec<CostRecord>> {
    Ok(read_costs_impl(path).map_err(|e| format!(
        "Error while reading {path:?} cost report: {e}"))?)
}

fn read_costs_impl(path: &str) -> GenericResult<Vec<CostRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(File::open(path)?);

    let headers = reader.headers()?.clone();

    let symbol = find_column(&headers, &["Scrip", "Symbol"])?;
    let quantity = find_column(&headers, &["Current Balance", "Quantity"])?;
    let average_cost = find_column(&headers, &["WACC Rate", "Average Cost"])?;
    let total_cost = find_column(&headers, &["Total Cost"])?;

    let mut records = Vec::new();

    for (index, row) in reader.records().enumerate() {
        let row = row?;

        let record = (|| -> GenericResult<CostRecord> {
            Ok(CostRecord {
                symbol: get_cell(&row, symbol)?.to_owned(),
                quantity: util::parse_decimal(
                    get_cell(&row, quantity)?, DecimalRestrictions::PositiveOrZero,
                )?.trunc().to_i64().ok_or("Invalid share quantity")?,
                average_cost: util::parse_decimal(
                    get_cell(&row, average_cost)?, DecimalRestrictions::PositiveOrZero)?,
                total_cost: util::parse_decimal(
                    get_cell(&row, total_cost)?, DecimalRestrictions::PositiveOrZero)?,
            })
        })().map_err(|e| format!("Invalid record #{}: {}", index + 1, e))?;

        records.push(record);
    }

    Ok(records)
}

fn find_column(headers: &StringRecord, names: &[&str]) -> GenericResult<usize> {
    find_optional_column(headers, names).ok_or_else(|| format!(
        "The statement has no {:?} column", names[0]).into())
}

fn find_optional_column(headers: &StringRecord, names: &[&str]) -> Option<usize> {
    headers.iter().position(|header| {
        names.iter().any(|name| header.eq_ignore_ascii_case(name))
    })
}

fn get_cell<'a>(row: &'a StringRecord, index: usize) -> GenericResult<&'a str> {
    Ok(row.get(index).ok_or("The record has too few columns")?)
}

fn parse_quantity_cell(value: &str) -> GenericResult<Option<Decimal>> {
    if value.is_empty() || value == "-" {
        return Ok(None);
    }
    Ok(Some(util::parse_decimal(value, DecimalRestrictions::PositiveOrZero)?))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use indoc::indoc;
    use rust_decimal_macros::dec;
    use tempfile::NamedTempFile;

    use super::*;

    fn write_csv(data: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(data.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn statement_reading() {
        let file = write_csv(indoc!(r#"
            S.N,Scrip,Transaction Date,Credit Quantity,Debit Quantity,Balance After Transaction,History Description,Price
            1,NABIL,2024-01-15,100,-,100,ON-CR TRANSFER FROM BROKER 42,500
            2,NABIL,2024-03-15,-,60,40,ON-DR TRANSFER TO BROKER 42,550.50
            3,HDL,2024-02-10,12.75,-,12.75,CA-BONUS 7.5%,-
        "#));

        let records = read_statement(file.path().to_str().unwrap()).unwrap();
        assert_eq!(records.len(), 3);

        assert_eq!(records[0].sequence, Some(1));
        assert_eq!(records[0].symbol, "NABIL");
        assert_eq!(records[0].date, date!(2024, 1, 15));
        assert_eq!(records[0].credit, Some(dec!(100)));
        assert_eq!(records[0].debit, None);
        assert_eq!(records[0].price, Some(dec!(500)));

        assert_eq!(records[1].debit, Some(dec!(60)));
        assert_eq!(records[1].price, Some(dec!(550.50)));

        assert_eq!(records[2].credit, Some(dec!(12.75)));
        assert_eq!(records[2].price, None);
    }

    #[test]
    fn cost_report_reading() {
        let file = write_csv(indoc!(r#"
            Scrip,Current Balance,WACC Rate,Total Cost
            NABIL,40,500,20000
            HDL,112,892.86,100000.32
        "#));

        let records = read_costs(file.path().to_str().unwrap()).unwrap();
        assert_eq!(records.len(), 2);

        assert_eq!(records[1].symbol, "HDL");
        assert_eq!(records[1].quantity, 112);
        assert_eq!(records[1].average_cost, dec!(892.86));
        assert_eq!(records[1].total_cost, dec!(100000.32));
    }

    #[test]
    fn missing_column() {
        let file = write_csv("Scrip,Transaction Date\nNABIL,2024-01-15\n");
        assert!(read_statement(file.path().to_str().unwrap()).is_err());
    }
}
