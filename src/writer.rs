use std::io;
use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};

use tracing::{debug, error};

/// Persist the deduplicated stream to `path`, one nine-digit
/// zero-padded decimal line per number.
///
/// The file is created, or truncated when it already exists. The
/// write buffer is flushed once per `flush_period` and a last time
/// when the input stream closes; the returned handle completes after
/// that final flush. Write and flush errors lose the affected lines
/// but do not stop the writer.
///
/// # Errors
/// * Error when the file cannot be created.
pub async fn spawn(
    path: &Path,
    mut numbers: mpsc::Receiver<u32>,
    flush_period: Duration,
) -> Result<JoinHandle<()>, io::Error> {
    let file = File::create(path).await?;

    Ok(tokio::spawn(async move {
        let mut file = BufWriter::new(file);
        let mut ticker = interval_at(Instant::now() + flush_period, flush_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                number = numbers.recv() => match number {
                    Some(number) => {
                        if let Err(err) = file.write_all(format!("{number:09}\n").as_bytes()).await {
                            error!("write error, line lost: {err}");
                        }
                    }
                    None => break,
                },

                _ = ticker.tick() => {
                    if let Err(err) = file.flush().await {
                        error!("flush error: {err}");
                    }
                }
            }
        }

        if let Err(err) = file.flush().await {
            error!("final flush error: {err}");
        }

        debug!("writer done");
    }))
}

#[cfg(test)]
mod tests {
    use tokio::time::timeout;

    use crate::tests::{init_tracing_subscriber, TIMEOUT};
    use crate::REPORT_PERIOD;

    use super::*;

    #[tokio::test]
    async fn test_writes_zero_padded_lines_and_flushes_on_close() {
        init_tracing_subscriber();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("numbers.log");

        let (sender, numbers) = mpsc::channel(1);
        let writer = spawn(&path, numbers, REPORT_PERIOD).await.unwrap();

        sender.send(42).await.unwrap();
        sender.send(987_654_321).await.unwrap();
        drop(sender);

        timeout(TIMEOUT, writer).await.unwrap().unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "000000042\n987654321\n"
        );
    }

    #[tokio::test]
    async fn test_truncates_an_existing_file() {
        init_tracing_subscriber();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("numbers.log");
        std::fs::write(&path, "000000001\n").unwrap();

        let (sender, numbers) = mpsc::channel(1);
        let writer = spawn(&path, numbers, REPORT_PERIOD).await.unwrap();
        drop(sender);

        timeout(TIMEOUT, writer).await.unwrap().unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[tokio::test]
    async fn test_create_error_is_reported() {
        init_tracing_subscriber();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("numbers.log");

        let (_sender, numbers) = mpsc::channel(1);

        assert!(spawn(&path, numbers, REPORT_PERIOD).await.is_err());
    }
}
