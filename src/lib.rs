#[macro_use] pub mod core;
#[macro_use] pub mod types;
pub mod config;
pub mod db;
pub mod money;
pub mod portfolio;
pub mod quotes;
pub mod repository;
pub mod statement;
pub mod taxes;
pub mod transactions;
pub mod util;
