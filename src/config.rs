use std::fs::File;
use std::io::Read;
use std::time::Duration;

use serde::Deserialize;

use crate::core::{EmptyResult, GenericResult};
use crate::quotes::{StaticProviderConfig, SyncOptions};
use crate::taxes::{FiscalYearSpec, TaxRates};

#[derive(Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(skip)]
    pub db_path: String,

    #[serde(default)]
    pub fiscal_year: FiscalYearSpec,

    #[serde(default)]
    pub taxes: TaxRates,

    #[serde(default)]
    pub price_sync: PriceSyncConfig,

    #[serde(default)]
    pub quotes: StaticProviderConfig,
}

impl Config {
    pub fn validate(&self) -> EmptyResult {
        self.fiscal_year.validate()?;
        self.taxes.validate()?;
        self.price_sync.validate()
    }

    #[cfg(test)]
    pub fn mock() -> Config {
        Config {
            db_path: s!("/mock"),
            ..Default::default()
        }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PriceSyncConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
}

impl Default for PriceSyncConfig {
    fn default() -> PriceSyncConfig {
        PriceSyncConfig {
            workers: default_workers(),
            min_interval_ms: default_min_interval_ms(),
        }
    }
}

impl PriceSyncConfig {
    pub fn options(&self) -> SyncOptions {
        SyncOptions {
            workers: self.workers,
            min_interval: Duration::from_millis(self.min_interval_ms),
        }
    }

    fn validate(&self) -> EmptyResult {
        if self.workers < 1 {
            return Err!("Invalid price sync worker count: {}", self.workers);
        }
        Ok(())
    }
}

fn default_workers() -> usize {
    5
}

fn default_min_interval_ms() -> u64 {
    200
}

pub fn load_config(path: &str) -> GenericResult<Config> {
    let mut data = Vec::new();
    File::open(path)?.read_to_end(&mut data)?;

    let config: Config = serde_yaml::from_slice(&data)?;
    config.validate()?;

    Ok(config)
}
