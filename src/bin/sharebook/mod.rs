use std::process;

use log::error;

use sharebook::config::Config;
use sharebook::core::EmptyResult;
use sharebook::portfolio;

use self::init::{initialize, Action};

mod init;

fn main() {
    let (action, config) = initialize();

    if let Err(e) = run(action, config) {
        error!("{}.", e);
        process::exit(1);
    }
}

fn run(action: Action, config: Config) -> EmptyResult {
    match action {
        Action::Import {statement_path} => portfolio::import(&config, &statement_path),
        Action::ImportCosts {report_path} => portfolio::import_costs(&config, &report_path),
        Action::Sync => portfolio::sync(&config),
        Action::Show => portfolio::show(&config),
        Action::Transactions {symbol, kind, limit} =>
            portfolio::list_transactions(&config, symbol.as_deref(), kind, limit),
        Action::Taxes {year} => portfolio::show_taxes(&config, year),
        Action::Remove {transaction_id} => portfolio::remove(&config, &transaction_id),
    }
}
