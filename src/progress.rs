//! Byte-level progress for uploads and downloads.

use tokio::sync::mpsc;

/// A snapshot of a body transfer.
///
/// `bytes_total` is `0` when the size is unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    /// Bytes sent or received so far.
    pub bytes_transferred: u64,
    /// Expected size of the body, or `0` if unknown.
    pub bytes_total: u64,
}

impl TransferProgress {
    /// Returns `true` if the total size is unknown.
    pub fn is_indeterminate(&self) -> bool {
        self.bytes_total == 0
    }

    /// Completed percentage, or `None` when the total is unknown.
    ///
    /// ```
    /// use filexchange::TransferProgress;
    ///
    /// let p = TransferProgress { bytes_transferred: 50, bytes_total: 200 };
    /// assert_eq!(p.percent(), Some(25));
    /// ```
    pub fn percent(&self) -> Option<u8> {
        if self.is_indeterminate() {
            return None;
        }
        let ratio = self.bytes_transferred.min(self.bytes_total) as f64 / self.bytes_total as f64;
        Some((ratio * 100.0) as u8)
    }
}

/// Sending side of a progress channel.
///
/// Cheap to clone. Reports are advisory: if the receiver is gone they are
/// dropped without error. A disabled reporter ignores every report.
#[derive(Debug, Clone, Default)]
pub struct ProgressReporter {
    tx: Option<mpsc::UnboundedSender<TransferProgress>>,
}

impl ProgressReporter {
    /// Creates a connected reporter and the receiver that observes it.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TransferProgress>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A reporter that discards everything.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Returns `true` if reports go anywhere.
    pub fn is_enabled(&self) -> bool {
        self.tx.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Emits one progress notification.
    pub fn report(&self, bytes_transferred: u64, bytes_total: u64) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(TransferProgress {
                bytes_transferred,
                bytes_total,
            });
        }
    }
}
