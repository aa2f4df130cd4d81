//! # filexchange - an async client for the FileseXchange API
//!
//! FileseXchange is a small file-sharing service: users log in, upload and
//! download files, inspect file details and delete their own files;
//! administrators also manage accounts and trigger backups. This crate wraps
//! its HTTP endpoints in one typed, async method per operation.
//!
//! ## Quick Start
//!
//! ```no_run
//! use filexchange::{Client, Credentials, ProgressReporter};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), filexchange::Error> {
//!     let client = Client::builder()
//!         .base_url("https://files.example.com/api/")?
//!         .timeout(Duration::from_secs(30))
//!         .build()?;
//!
//!     let session = client.login(Credentials::new("alice", "secret")).await?;
//!
//!     let files = client.list_user_files(&session).await?;
//!     for file in &files {
//!         println!("{:>4}  {}  {}", file.id, file.file_name, file.file_size);
//!     }
//!
//!     if let Some(first) = files.first() {
//!         let (progress, mut updates) = ProgressReporter::channel();
//!         tokio::spawn(async move {
//!             while let Some(p) = updates.recv().await {
//!                 println!("{:?}%", p.percent());
//!             }
//!         });
//!         let download = client
//!             .download_file(&session, &first.id, &first.file_name, progress)
//!             .await?;
//!         download.save_to(&download.display_name).await.ok();
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Outcomes
//!
//! Every operation returns an [`Outcome`]: the payload, or an [`Error`] with a
//! human-readable [`message`](Error::message) and a
//! [`status_code`](Error::status_code). Failures detected locally (an empty
//! token, a missing upload file) and transport failures report status `0`
//! and never touch the server, so there is only one channel to handle:
//!
//! ```no_run
//! use filexchange::{Client, Error, Session};
//!
//! # async fn example(client: Client, session: Session) {
//! match client.delete_file(&session, "42").await {
//!     Ok(()) => println!("deleted"),
//!     Err(e) if e.status_code() == 0 => eprintln!("not sent: {}", e),
//!     Err(Error::Application { message, status }) => eprintln!("{}: {}", status, message),
//!     Err(e) => eprintln!("{}", e),
//! }
//! # }
//! ```
//!
//! ## Retries
//!
//! Read-only operations (file list, file info, download, user list) can be
//! retried on transient failures. Mutating operations are always sent once.
//!
//! ```no_run
//! use filexchange::{Client, RetryStrategy, retry::{RetryOn5xx, RetryOnTimeout, OrPredicate}};
//! use std::time::Duration;
//!
//! # fn example() -> Result<(), filexchange::Error> {
//! let client = Client::builder()
//!     .base_url("https://files.example.com/api/")?
//!     .retry_strategy(RetryStrategy::ExponentialBackoff {
//!         initial_delay: Duration::from_millis(200),
//!         max_delay: Duration::from_secs(5),
//!         max_retries: 3,
//!         jitter: true,
//!     })
//!     .retry_predicate(Box::new(OrPredicate::new(vec![
//!         Box::new(RetryOn5xx),
//!         Box::new(RetryOnTimeout),
//!     ])))
//!     .build()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Stale responses
//!
//! The [`dispatch`] module runs operations in the background and delivers
//! each outcome only to a caller that still exists and is still interested in
//! the same file.

mod catalog;
mod client;
pub mod dispatch;
mod error;
pub mod interpret;
mod models;
mod progress;
pub mod request;
pub mod response;
pub mod retry;
mod session;
mod transport;

pub use client::{Client, ClientBuilder};
pub use dispatch::{Dispatcher, Interest, Listener};
pub use error::{Error, Outcome, Result};
pub use models::{Download, FileInfo, FileRecord, UserCreated, UserRecord};
pub use progress::{ProgressReporter, TransferProgress};
pub use retry::{RetryPredicate, RetryStrategy};
pub use session::{Credentials, Role, Session};
