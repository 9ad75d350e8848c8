use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::mpsc;

use tokio_util::sync::CancellationToken;

use tracing::{debug, warn};

use crate::controller::{self, Outcome};

/// One connection slot.
///
/// Serializes connections from a shared acceptor through the
/// controller, over a dedicated output stream: a second connection is
/// accepted on this slot only once the previous one was handled to
/// completion.
pub struct Slot {
    id: usize,
    numbers: mpsc::Sender<u32>,
    terminate: CancellationToken,
    shutdown: CancellationToken,
}

impl Slot {
    /// Create the slot and the output stream its controller feeds.
    #[must_use]
    pub fn new(
        id: usize,
        terminate: CancellationToken,
        shutdown: CancellationToken,
    ) -> (Self, mpsc::Receiver<u32>) {
        let (numbers, out) = mpsc::channel(1);

        (
            Self {
                id,
                numbers,
                terminate,
                shutdown,
            },
            out,
        )
    }

    /// Accept and handle one connection at a time until shutdown.
    ///
    /// Connection errors end only that connection; accept errors are
    /// logged and accepting resumes. The output stream closes when
    /// this returns.
    #[tracing::instrument(skip(self, listener), fields(slot = self.id))]
    pub async fn run(self, listener: Arc<TcpListener>) {
        loop {
            let accepted = tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => break,

                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    debug!("serving {peer}");
                    match controller::handle(
                        stream,
                        self.numbers.clone(),
                        self.terminate.clone(),
                    )
                    .await
                    {
                        Ok(Outcome::Closed) => debug!("{peer} closed"),
                        Ok(Outcome::Terminated) => debug!("{peer} terminated"),
                        Err(err) => warn!("{peer}: {err}"),
                    }
                }
                Err(err) => warn!("accept error: {err}"),
            }
        }

        debug!("slot done");
    }
}
