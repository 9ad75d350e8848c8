use std::collections::HashSet;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use tracing::{debug, info, warn};

/// Counters for one report window.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Report {
    pub window_unique: u64,
    pub window_duplicate: u64,
    pub unique: u64,
    pub total: u64,
}

/// The numbers seen so far, with the report counters.
#[derive(Debug, Default)]
struct Store {
    seen: HashSet<u32>,
    total: u64,
    window_unique: u64,
    window_duplicate: u64,
}

impl Store {
    /// Record one number; true when it was never seen before.
    fn observe(&mut self, number: u32) -> bool {
        self.total += 1;
        if self.seen.insert(number) {
            self.window_unique += 1;
            true
        } else {
            self.window_duplicate += 1;
            false
        }
    }

    /// Snapshot the counters and start a new window.
    fn report(&mut self) -> Report {
        let report = Report {
            window_unique: self.window_unique,
            window_duplicate: self.window_duplicate,
            unique: self.seen.len() as u64,
            total: self.total,
        };
        self.window_unique = 0;
        self.window_duplicate = 0;
        report
    }
}

/// Fan in the slot streams and forward only first-seen numbers.
///
/// Once per `report_period` the window statistics are logged and the
/// window counters reset. The returned stream closes once every input
/// stream closed and the last first-seen number in flight was
/// forwarded.
#[must_use]
pub fn deduplicate(
    report_period: Duration,
    inputs: Vec<mpsc::Receiver<u32>>,
) -> mpsc::Receiver<u32> {
    let mut numbers = fan_in(inputs);
    let (sender, out) = mpsc::channel(1);

    tokio::spawn(async move {
        let mut store = Store::default();
        let mut ticker = interval_at(Instant::now() + report_period, report_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                number = numbers.recv() => match number {
                    Some(number) => {
                        if store.observe(number) && sender.send(number).await.is_err() {
                            warn!("writer gone, dropping numbers");
                            break;
                        }
                    }
                    None => break,
                },

                _ = ticker.tick() => {
                    let Report { window_unique, window_duplicate, unique, total } = store.report();
                    info!("received {window_unique} unique numbers, {window_duplicate} duplicates. unique total: {unique}. total: {total}");
                }
            }
        }

        debug!("store done");
    });

    out
}

fn fan_in(inputs: Vec<mpsc::Receiver<u32>>) -> mpsc::Receiver<u32> {
    let (sender, out) = mpsc::channel(1);

    for mut input in inputs {
        let sender = sender.clone();
        tokio::spawn(async move {
            while let Some(number) = input.recv().await {
                if sender.send(number).await.is_err() {
                    return;
                }
            }
        });
    }

    out
}
