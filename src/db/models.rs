use diesel::prelude::*;

use crate::db::schema::{holdings, quotes, stocks, transactions};
use crate::types::{Date, DateTime};

#[derive(Insertable)]
#[diesel(table_name = stocks)]
pub struct NewStock<'a> {
    pub symbol: &'a str,
    pub name: Option<&'a str>,
    pub sector: Option<&'a str>,
}

#[derive(Insertable)]
#[diesel(table_name = transactions)]
pub struct NewTransaction<'a> {
    pub id: &'a str,
    pub symbol: &'a str,
    pub date: Date,
    pub kind: String,
    pub quantity: i64,
    pub price: i64,
    pub total_cost: i64,
    pub description: &'a str,
}

#[derive(Queryable)]
pub struct TransactionRow {
    pub id: String,
    pub symbol: String,
    pub date: Date,
    pub kind: String,
    pub quantity: i64,
    pub price: i64,
    pub total_cost: i64,
    pub description: String,
}

#[derive(Insertable, Queryable)]
#[diesel(table_name = holdings)]
pub struct HoldingDbRow {
    pub symbol: String,
    pub quantity: i64,
    pub average_cost: i64,
    pub total_cost: i64,
    pub last_price: Option<i64>,
    pub market_value: Option<i64>,
    pub unrealized_gain: Option<i64>,
    pub unrealized_gain_bp: Option<i32>,
    pub cost_source: String,
}

#[derive(Insertable)]
#[diesel(table_name = quotes)]
pub struct NewQuote<'a> {
    pub symbol: &'a str,
    pub last_price: i64,
    pub previous_close: i64,
    pub change: i64,
    pub change_bp: i32,
    pub volume: i64,
    pub captured_at: DateTime,
}

#[derive(Queryable)]
pub struct QuoteRow {
    pub id: i32,
    pub symbol: String,
    pub last_price: i64,
    pub previous_close: i64,
    pub change: i64,
    pub change_bp: i32,
    pub volume: i64,
    pub captured_at: DateTime,
}
