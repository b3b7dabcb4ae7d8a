use std::collections::HashMap;

use serde::Deserialize;
use serde::de::{Deserializer, Error};

use crate::core::Cancellation;
use crate::money::Money;
use crate::types::Symbol;

use super::{LatestPrice, PriceProvider, QuoteError};

/// Config-declared quotes in `"last previous-close [volume]"` format, keyed by symbol.
#[derive(Clone, Default)]
pub struct StaticProviderConfig(HashMap<Symbol, (Money, Money, i64)>);

impl<'de> Deserialize<'de> for StaticProviderConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error> where D: Deserializer<'de> {
        let value: HashMap<String, String> = Deserialize::deserialize(deserializer)?;

        let mut quotes = HashMap::new();

        for (symbol, quote) in value {
            let symbol = Symbol::new(&symbol).map_err(D::Error::custom)?;
            let parsed = parse_quote(&quote).ok_or_else(|| D::Error::custom(format!(
                "Invalid quote: {quote:?}")))?;
            quotes.insert(symbol, parsed);
        }

        Ok(StaticProviderConfig(quotes))
    }
}

fn parse_quote(value: &str) -> Option<(Money, Money, i64)> {
    let mut tokens = value.split_whitespace();

    let last_price: Money = tokens.next()?.parse().ok()?;
    let previous_close: Money = tokens.next()?.parse().ok()?;
    let volume = match tokens.next() {
        Some(volume) => volume.parse().ok()?,
        None => 0,
    };

    if tokens.next().is_some() || last_price.is_negative() || previous_close.is_negative() {
        return None;
    }

    Some((last_price, previous_close, volume))
}

/// Serves quotes declared in the configuration file. The stand-in for a live market source in
/// offline use and in tests.
pub struct StaticProvider {
    quotes: HashMap<Symbol, (Money, Money, i64)>,
}

impl StaticProvider {
    pub fn new(config: &StaticProviderConfig) -> StaticProvider {
        StaticProvider {
            quotes: config.0.clone(),
        }
    }
}

impl PriceProvider for StaticProvider {
    fn name(&self) -> &'static str {
        "static quotes provider"
    }

    fn latest_price(
        &self, cancel: &Cancellation, symbol: &Symbol,
    ) -> Result<LatestPrice, QuoteError> {
        if cancel.is_cancelled() {
            return Err(QuoteError::Cancelled);
        }

        let &(last_price, previous_close, volume) = self.quotes.get(symbol)
            .ok_or_else(|| QuoteError::NotFound(symbol.to_string()))?;

        Ok(LatestPrice::new(
            symbol.clone(), last_price, previous_close, volume,
            chrono::Local::now().naive_local(),
        ))
    }
}
