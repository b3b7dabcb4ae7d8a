use std::io::{self, Write};
use std::path::Path;
use std::process;

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use log::error;

use sharebook::config::{load_config, Config};
use sharebook::core::GenericResult;
use sharebook::transactions::TransactionKind;

pub enum Action {
    Import {
        statement_path: String,
    },
    ImportCosts {
        report_path: String,
    },
    Sync,
    Show,
    Transactions {
        symbol: Option<String>,
        kind: Option<TransactionKind>,
        limit: i64,
    },
    Taxes {
        year: Option<i32>,
    },
    Remove {
        transaction_id: String,
    },
}

pub fn initialize() -> (Action, Config) {
    let default_config_dir_path = "~/.sharebook";

    let matches = Command::new("Sharebook")
        .about("\nPersonal NEPSE stock portfolio manager")
        .disable_help_subcommand(true)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(Arg::new("config")
            .short('c')
            .long("config")
            .value_name("PATH")
            .help(format!("Configuration directory path [default: {default_config_dir_path}]")))
        .arg(Arg::new("verbose")
            .short('v')
            .long("verbose")
            .action(ArgAction::Count)
            .help("Sets the level of verbosity"))
        .subcommand(Command::new("import")
            .about("Import a share statement")
            .arg(Arg::new("STATEMENT")
                .help("Path to the share statement CSV file")
                .required(true)))
        .subcommand(Command::new("costs")
            .about("Override cost basis from a weighted-average-cost report")
            .arg(Arg::new("REPORT")
                .help("Path to the cost report CSV file")
                .required(true)))
        .subcommand(Command::new("sync")
            .about("Refresh the latest price quotes"))
        .subcommand(Command::new("show")
            .about("Show the portfolio"))
        .subcommand(Command::new("transactions")
            .about("List imported transactions")
            .arg(Arg::new("symbol")
                .short('s')
                .long("symbol")
                .value_name("SYMBOL")
                .help("Show only the specified symbol"))
            .arg(Arg::new("kind")
                .short('k')
                .long("kind")
                .value_name("KIND")
                .help("Show only the specified transaction kind (Buy, Sell, Bonus, ...)"))
            .arg(Arg::new("limit")
                .short('l')
                .long("limit")
                .value_name("COUNT")
                .value_parser(value_parser!(i64))
                .default_value("50")
                .help("Maximum number of transactions to show")))
        .subcommand(Command::new("taxes")
            .about("Show the realized gain tax summary")
            .arg(Arg::new("YEAR")
                .value_parser(value_parser!(i32))
                .help("Fiscal year to show")))
        .subcommand(Command::new("remove")
            .about("Remove a transaction and rebuild the affected position")
            .arg(Arg::new("TRANSACTION")
                .help("Transaction ID")
                .required(true)))
        .get_matches();

    let log_level = match matches.get_count("verbose") {
        0 => log::Level::Info,
        1 => log::Level::Debug,
        _ => log::Level::Trace,
    };

    if let Err(err) = easy_logging::init(module_path!().split("::").next().unwrap(), log_level) {
        let _ = writeln!(io::stderr(), "Failed to initialize the logging: {err}.");
        process::exit(1);
    }

    let config_dir_path = matches.get_one::<String>("config").cloned().unwrap_or_else(||
        shellexpand::tilde(default_config_dir_path).to_string());
    let config_dir_path = Path::new(&config_dir_path);
    let config_path = config_dir_path.join("config.yaml");

    let mut config = if config_path.exists() {
        match load_config(config_path.to_str().unwrap()) {
            Ok(config) => config,
            Err(err) => {
                error!("Error while reading {:?} configuration file: {}.", config_path, err);
                process::exit(1);
            },
        }
    } else {
        Config::default()
    };
    config.db_path = config_dir_path.join("db.sqlite").to_str().unwrap().to_owned();

    let action = match parse_arguments(&matches) {
        Ok(action) => action,
        Err(err) => {
            error!("{}.", err);
            process::exit(1);
        },
    };

    (action, config)
}

fn parse_arguments(matches: &ArgMatches) -> GenericResult<Action> {
    let (command, matches) = matches.subcommand().unwrap();

    Ok(match command {
        "import" => Action::Import {
            statement_path: matches.get_one::<String>("STATEMENT").unwrap().clone(),
        },
        "costs" => Action::ImportCosts {
            report_path: matches.get_one::<String>("REPORT").unwrap().clone(),
        },
        "sync" => Action::Sync,
        "show" => Action::Show,
        "transactions" => Action::Transactions {
            symbol: matches.get_one::<String>("symbol").cloned(),
            kind: matches.get_one::<String>("kind")
                .map(|kind| kind.parse::<TransactionKind>().map_err(|_| format!(
                    "Unknown transaction kind: {kind:?}")))
                .transpose()?,
            limit: *matches.get_one::<i64>("limit").unwrap(),
        },
        "taxes" => Action::Taxes {
            year: matches.get_one::<i32>("YEAR").copied(),
        },
        "remove" => Action::Remove {
            transaction_id: matches.get_one::<String>("TRANSACTION").unwrap().clone(),
        },
        _ => unreachable!(),
    })
}
