//! Numbers server
//!
//! A line-oriented TCP ingestion service. Clients connect and send
//! nine-digit decimal numbers, one per line, terminated by a newline
//! character ('\n', or ASCII 10). Leading zeros are required: every
//! payload is exactly nine ASCII digits, so values lie in
//! `[0, 1_000_000_000)`.
//!
//! The server deduplicates numbers across its whole lifetime. Every
//! first-seen number is appended to a log file as a nine-digit
//! zero-padded decimal line; duplicates are counted but never
//! written. Once per report period the server logs how many unique
//! and duplicated numbers arrived in the closing window, together
//! with the cumulative unique and total counts.
//!
//! A client that sends a line which is not exactly nine ASCII digits
//! is disconnected; the server keeps running and other clients are
//! unaffected. A client that stays silent for longer than the read
//! deadline is disconnected as well.
//!
//! The literal line `terminate` from any client shuts the whole
//! server down: the slots stop accepting, numbers already pushed into
//! the pipeline drain to the log file, the file is flushed and
//! closed, and the process exits.
//!
//! At most N clients are served concurrently, where N is the
//! configured concurrency; the N+1-th connection waits in the accept
//! backlog until a slot frees.
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use tokio_util::sync::CancellationToken;

use tracing::info;

pub mod controller;
pub mod listener;
pub mod store;
pub mod writer;

use listener::Slot;

/// Time between two statistics reports and two log file flushes.
pub const REPORT_PERIOD: Duration = Duration::from_secs(10);

/// Default log file name, relative to the working directory.
pub const NUMBERS_LOG: &str = "numbers.log";

/// Run the whole pipeline on an already bound listener.
///
/// Spawns `concurrency` connection slots over the listener, fans
/// their numbers into the dedup store and persists every first-seen
/// number to `log_path`. Returns once a client sent `terminate` and
/// the log file was flushed and closed.
///
/// # Errors
/// * Error when the log file cannot be created.
#[tracing::instrument(skip(listener, log_path))]
pub async fn run(
    listener: TcpListener,
    concurrency: usize,
    log_path: &Path,
    report_period: Duration,
) -> Result<(), anyhow::Error> {
    let terminate = CancellationToken::new();
    let shutdown = CancellationToken::new();

    let listener = Arc::new(listener);
    let mut slots = Vec::with_capacity(concurrency);
    let mut numbers = Vec::with_capacity(concurrency);
    for id in 0..concurrency {
        let (slot, out) = Slot::new(id, terminate.clone(), shutdown.clone());
        slots.push(slot);
        numbers.push(out);
    }

    let deduplicated = store::deduplicate(report_period, numbers);
    let mut done = writer::spawn(log_path, deduplicated, report_period).await?;

    // no connection is accepted before the log file is open
    for slot in slots {
        tokio::spawn(slot.run(Arc::clone(&listener)));
    }

    tokio::select! {
        _ = terminate.cancelled() => {
            info!("terminate received, draining");
            shutdown.cancel();
            done.await?;
        }

        result = &mut done => result?,
    }

    info!("done");

    Ok(())
}
