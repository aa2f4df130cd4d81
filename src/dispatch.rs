//! Delivering outcomes to callers that may have moved on.
//!
//! A caller that asks about a specific resource (a file's details, a
//! download) records that resource as its current [`Interest`] before the
//! request leaves. The [`Dispatcher`] runs the request on a spawned task and,
//! when it completes, delivers the outcome only if
//!
//! - the caller still exists (the dispatcher holds a [`Weak`] reference), and
//! - the caller's interest still names the same resource.
//!
//! Everything else is discarded quietly. Progress notifications follow the
//! same rules.
//!
//! ```no_run
//! use filexchange::{Client, Download, Outcome, Session};
//! use filexchange::dispatch::{Dispatcher, Interest, Listener};
//! use std::sync::Arc;
//!
//! struct DownloadPane {
//!     interest: Interest<String>,
//! }
//!
//! impl Listener<String, Download> for DownloadPane {
//!     fn interest(&self) -> &Interest<String> {
//!         &self.interest
//!     }
//!
//!     fn on_outcome(&self, file_id: String, outcome: Outcome<Download>) {
//!         match outcome {
//!             Ok(d) => println!("{} ready ({} bytes)", d.display_name, d.bytes.len()),
//!             Err(e) => eprintln!("download of {} failed: {}", file_id, e),
//!         }
//!     }
//! }
//!
//! # async fn example(client: Client, session: Session) {
//! let dispatcher = Dispatcher::new(client);
//! let pane = Arc::new(DownloadPane { interest: Interest::new() });
//!
//! dispatcher.download(&pane, session.clone(), "7".into(), "a.txt".into());
//! // The user switches to another file before the first one finishes;
//! // only the outcome for "8" will reach the pane.
//! let handle = dispatcher.download(&pane, session, "8".into(), "b.txt".into());
//! let _ = handle.await;
//! # }
//! ```

use std::fmt::Debug;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::task::JoinHandle;

use crate::{
    models::{Download, FileInfo},
    progress::{ProgressReporter, TransferProgress},
    session::Session,
    Client, Outcome,
};

/// The resource a caller is currently waiting on.
#[derive(Debug)]
pub struct Interest<K> {
    current: Mutex<Option<K>>,
}

impl<K: Clone + PartialEq> Interest<K> {
    /// An interest in nothing.
    pub fn new() -> Self {
        Self {
            current: Mutex::new(None),
        }
    }

    /// Replaces the current interest.
    pub fn record(&self, key: K) {
        *self.lock() = Some(key);
    }

    /// Withdraws interest; every outstanding outcome becomes stale.
    pub fn clear(&self) {
        *self.lock() = None;
    }

    pub fn current(&self) -> Option<K> {
        self.lock().clone()
    }

    /// Returns `true` if `key` is what the caller is waiting on.
    pub fn matches(&self, key: &K) -> bool {
        self.lock().as_ref() == Some(key)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<K>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<K: Clone + PartialEq> Default for Interest<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// A caller that receives correlated outcomes.
///
/// `K` is the correlation key (a file id or url identifier), `T` the
/// payload of a successful outcome.
pub trait Listener<K, T>: Send + Sync + 'static {
    fn interest(&self) -> &Interest<K>;

    /// Called for each progress notification that is still current.
    fn on_progress(&self, _key: &K, _progress: TransferProgress) {}

    /// Called at most once per dispatched request, with its terminal outcome.
    fn on_outcome(&self, key: K, outcome: Outcome<T>);
}

/// Runs client operations in the background and routes their outcomes.
#[derive(Clone)]
pub struct Dispatcher {
    client: Client,
}

impl Dispatcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Records `key` as the listener's interest, then spawns `start` on the
    /// current tokio runtime.
    ///
    /// The listener is held weakly: dropping the last `Arc` while the request
    /// is in flight is allowed, and the outcome is then discarded.
    pub fn dispatch<K, T, L, F, Fut>(&self, listener: &Arc<L>, key: K, start: F) -> JoinHandle<()>
    where
        K: Clone + PartialEq + Debug + Send + Sync + 'static,
        T: Send + 'static,
        L: Listener<K, T>,
        F: FnOnce(Client, ProgressReporter) -> Fut,
        Fut: Future<Output = Outcome<T>> + Send + 'static,
    {
        listener.interest().record(key.clone());

        let weak = Arc::downgrade(listener);
        let (reporter, mut progress_rx) = ProgressReporter::channel();
        let operation = start(self.client.clone(), reporter);

        tokio::spawn(async move {
            tokio::pin!(operation);
            let outcome = loop {
                tokio::select! {
                    outcome = &mut operation => break outcome,
                    Some(progress) = progress_rx.recv() => {
                        deliver_progress::<K, T, L>(&weak, &key, progress);
                    }
                }
            };
            while let Ok(progress) = progress_rx.try_recv() {
                deliver_progress::<K, T, L>(&weak, &key, progress);
            }

            match weak.upgrade() {
                None => {
                    tracing::debug!(key = ?key, "Listener dropped; discarding outcome");
                }
                Some(listener) if !listener.interest().matches(&key) => {
                    tracing::debug!(
                        key = ?key,
                        current = ?listener.interest().current(),
                        "Discarding stale outcome"
                    );
                }
                Some(listener) => listener.on_outcome(key, outcome),
            }
        })
    }

    /// Fetches file details, correlated by url identifier.
    pub fn file_info<L>(&self, listener: &Arc<L>, session: Session, url_identifier: String) -> JoinHandle<()>
    where
        L: Listener<String, FileInfo>,
    {
        let key = url_identifier.clone();
        self.dispatch(listener, key, move |client, _progress| async move {
            client.file_info(&session, &url_identifier).await
        })
    }

    /// Downloads a file, correlated by file id, forwarding receive progress.
    pub fn download<L>(
        &self,
        listener: &Arc<L>,
        session: Session,
        file_id: String,
        display_name: String,
    ) -> JoinHandle<()>
    where
        L: Listener<String, Download>,
    {
        let key = file_id.clone();
        self.dispatch(listener, key, move |client, progress| async move {
            client
                .download_file(&session, &file_id, &display_name, progress)
                .await
        })
    }
}

fn deliver_progress<K, T, L>(weak: &Weak<L>, key: &K, progress: TransferProgress)
where
    K: PartialEq + Clone,
    L: Listener<K, T>,
{
    if let Some(listener) = weak.upgrade() {
        if listener.interest().matches(key) {
            listener.on_progress(key, progress);
        }
    }
}
