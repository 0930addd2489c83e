//! Channel plumbing between async producers and a reporter.

use tokio::sync::mpsc;
use tracing::debug;

use opwatch_core::Reporter;

/// Create a report channel feeding the given reporter.
///
/// The sender half is cheap to clone and safe to move into spawned tasks
/// or other threads. The relay half stays with the reporter and applies
/// whatever the senders produce.
pub fn channel(reporter: Reporter) -> (ProgressSender, ProgressRelay) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ProgressSender { tx }, ProgressRelay { reporter, rx })
}

/// Sending half of a report channel.
#[derive(Debug, Clone)]
pub struct ProgressSender {
    tx: mpsc::UnboundedSender<f64>,
}

impl ProgressSender {
    /// Queue a fractional completion value in `[0, 1]`.
    ///
    /// Reports sent after the relay is gone are dropped.
    pub fn report(&self, value: f64) {
        let _ = self.tx.send(value);
    }

    /// True once the relay half has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving half of a report channel, bound to a reporter.
///
/// The relay holds the single-threaded reporter handle and must stay on
/// the thread that owns the progress tree.
#[derive(Debug)]
pub struct ProgressRelay {
    reporter: Reporter,
    rx: mpsc::UnboundedReceiver<f64>,
}

impl ProgressRelay {
    /// Apply every report queued so far without waiting.
    ///
    /// Returns how many reports were applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(value) = self.rx.try_recv() {
            self.reporter.report(value);
            applied += 1;
        }
        applied
    }

    /// Apply reports as they arrive until every sender is dropped.
    pub async fn run(mut self) {
        while let Some(value) = self.rx.recv().await {
            self.reporter.report(value);
        }
        debug!("Progress relay drained; all senders dropped");
    }

    /// The reporter this relay feeds.
    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }
}
