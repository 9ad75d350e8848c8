use std::io;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};

use tokio_util::sync::CancellationToken;

use tracing::debug;

use thiserror::Error;

/// A client that stays silent longer than this is disconnected.
pub const READ_DEADLINE: Duration = Duration::from_secs(30);

const TERMINATE: &[u8] = b"terminate";

/// How a connection ended when no error occurred.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The client closed its side of the connection.
    Closed,

    /// The termination signal was raised, by this client or by
    /// another one.
    Terminated,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("read deadline expired")]
    Deadline,

    #[error("not a 9 char length line: {0:?}")]
    Length(String),

    #[error("not a decimal number: {0:?}")]
    Digit(String),
}

/// Read newline-delimited nine-digit numbers from one connection and
/// push them downstream.
///
/// Runs until the client closes the connection, a line violates the
/// protocol, the read deadline expires or the termination signal is
/// observed. The literal line `terminate` raises the termination
/// signal and ends the connection. The signal is polled once more
/// right before every push, so a number parsed concurrently with
/// termination is never pushed.
///
/// # Errors
/// * [`Error::Length`] and [`Error::Digit`] on a malformed line.
/// * [`Error::Deadline`] when the client stays silent too long.
/// * [`Error::Io`] when the socket returns an error.
#[tracing::instrument(skip(read, numbers, terminate))]
pub async fn handle<R>(
    read: R,
    numbers: mpsc::Sender<u32>,
    terminate: CancellationToken,
) -> Result<Outcome, Error>
where
    R: AsyncRead + Unpin,
{
    debug!("start");

    let mut read = BufReader::new(read);

    let mut buffer = vec![];
    loop {
        buffer.clear();
        tokio::select! {
            biased;

            _ = terminate.cancelled() => return Ok(Outcome::Terminated),

            read_result = timeout(READ_DEADLINE, read.read_until(b'\n', &mut buffer)) => {
                match read_result {
                    Ok(read_result) => {
                        read_result?;
                    }
                    Err(_) => return Err(Error::Deadline),
                }
            }
        }

        // end of stream, discarding a trailing partial line
        if buffer.last() != Some(&b'\n') {
            return Ok(Outcome::Closed);
        }

        let line = &buffer[..buffer.len() - 1];
        if line == TERMINATE {
            terminate.cancel();
            return Ok(Outcome::Terminated);
        }

        let number = parse(line)?;

        if terminate.is_cancelled() {
            return Ok(Outcome::Terminated);
        }
        if numbers.send(number).await.is_err() {
            return Ok(Outcome::Terminated);
        }
    }
}

fn parse(line: &[u8]) -> Result<u32, Error> {
    if line.len() != 9 {
        return Err(Error::Length(String::from_utf8_lossy(line).into_owned()));
    }

    line.iter().try_fold(0, |number, digit| {
        if digit.is_ascii_digit() {
            Ok(number * 10 + u32::from(digit - b'0'))
        } else {
            Err(Error::Digit(String::from_utf8_lossy(line).into_owned()))
        }
    })
}
