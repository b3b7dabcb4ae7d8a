use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, TrySendError};
use std::thread;
use std::time::Duration;

use log::debug;

use crate::core::Cancellation;
use crate::types::Symbol;

use super::{LatestPrice, PriceProvider, QuoteError};

pub struct SyncOptions {
    pub workers: usize,
    /// Minimum pause each worker takes after a fetch returns before it picks the next symbol.
    pub min_interval: Duration,
}

impl Default for SyncOptions {
    fn default() -> SyncOptions {
        SyncOptions {
            workers: 5,
            min_interval: Duration::from_millis(200),
        }
    }
}

#[derive(Debug, Default)]
pub struct SyncOutcome {
    pub prices: Vec<LatestPrice>,
    pub errors: Vec<(Symbol, QuoteError)>,
}

impl SyncOutcome {
    pub fn len(&self) -> usize {
        self.prices.len() + self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty() && self.errors.is_empty()
    }
}

/// Refreshes latest-price snapshots for the given symbols with bounded parallelism.
///
/// N workers drain one bounded work queue (capacity 2N, so memory stays bounded regardless of
/// input size); the producer blocks when it is full. One symbol's failure never blocks another:
/// errors are collected next to the successes. Cancellation stops dispatch, lets in-flight
/// fetches finish, and reports every undispatched symbol as a [`QuoteError::Cancelled`] error,
/// so the outcome always contains exactly one entry per distinct input symbol.
///
/// The optional progress callback is invoked after each completed item; invocations that would
/// contend with a still-running one are dropped rather than awaited.
pub fn sync_prices(
    provider: &dyn PriceProvider,
    symbols: &[Symbol],
    options: &SyncOptions,
    cancel: &Cancellation,
    progress: Option<&(dyn Fn(usize, usize, &Symbol) + Sync)>,
) -> SyncOutcome {
    let mut distinct = Vec::new();
    let mut seen = HashSet::new();
    for symbol in symbols {
        if seen.insert(symbol.clone()) {
            distinct.push(symbol.clone());
        }
    }

    let total = distinct.len();
    let workers = options.workers.max(1);
    let min_interval = options.min_interval;

    let (work_sender, work_receiver) = mpsc::sync_channel::<Symbol>(2 * workers);
    let work_receiver = Arc::new(Mutex::new(work_receiver));
    let (result_sender, result_receiver) = mpsc::channel();

    let completed = AtomicUsize::new(0);
    let progress_running = Mutex::new(());

    let completed = &completed;
    let progress_running = &progress_running;

    let mut outcome = SyncOutcome::default();

    thread::scope(|scope| {
        for _ in 0..workers {
            let work_receiver = Arc::clone(&work_receiver);
            let result_sender = result_sender.clone();

            scope.spawn(move || {
                loop {
                    if cancel.is_cancelled() {
                        break;
                    }

                    let symbol = match work_receiver.lock().unwrap().recv() {
                        Ok(symbol) => symbol,
                        Err(_) => break,
                    };

                    let result = provider.latest_price(cancel, &symbol);
                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;

                    if let Some(callback) = progress {
                        if let Ok(_running) = progress_running.try_lock() {
                            callback(done, total, &symbol);
                        }
                    }

                    if result_sender.send((symbol, result)).is_err() {
                        break;
                    }

                    if !cancel.is_cancelled() {
                        thread::sleep(min_interval);
                    }
                }
            });
        }
        drop(result_sender);

        'dispatch: for symbol in &distinct {
            let mut item = symbol.clone();
            loop {
                if cancel.is_cancelled() {
                    debug!("Price refresh cancelled, stopping dispatch.");
                    break 'dispatch;
                }

                match work_sender.try_send(item) {
                    Ok(()) => break,
                    Err(TrySendError::Full(returned)) => {
                        item = returned;
                        thread::sleep(Duration::from_millis(1));
                    },
                    Err(TrySendError::Disconnected(_)) => break 'dispatch,
                }
            }
        }
        drop(work_sender);

        let mut fetched = HashSet::new();

        while let Ok((symbol, result)) = result_receiver.recv() {
            fetched.insert(symbol.clone());
            match result {
                Ok(price) => outcome.prices.push(price),
                Err(error) => outcome.errors.push((symbol, error)),
            }
        }

        for symbol in &distinct {
            if !fetched.contains(symbol) {
                outcome.errors.push((symbol.clone(), QuoteError::Cancelled));
            }
        }
    });

    outcome
}
