//! The FileseXchange API client.
//!
//! [`Client`] exposes one async method per server operation. Each call runs
//! pre-flight validation, sends at most one request (more only for read-only
//! endpoints with a retry strategy), and returns a single [`Outcome`].

use crate::{
    catalog::{
        ChangePassword, CreateUser, DeleteFile, DeleteUser, DownloadFile, GetFileInfo, ListUserFiles,
        ListUsers, Login, Operation, TriggerBackup, UploadFile,
    },
    models::{Download, FileInfo, FileRecord, UserCreated, UserRecord},
    progress::ProgressReporter,
    request::{ApiRequest, UploadSource},
    retry::{RetryOnRetryable, RetryPredicate, RetryStrategy},
    session::{Credentials, Session},
    transport::Transport,
    Error, Outcome, Result,
};
use http::{header::USER_AGENT, HeaderMap, HeaderName, HeaderValue};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const DEFAULT_USER_AGENT: &str = concat!("filexchange/", env!("CARGO_PKG_VERSION"));

/// Client for a FileseXchange server.
///
/// Cheap to clone; clones share one connection pool and configuration.
///
/// # Examples
///
/// ```no_run
/// use filexchange::{Client, Credentials, ProgressReporter};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), filexchange::Error> {
/// let client = Client::builder()
///     .base_url("https://files.example.com/api")?
///     .timeout(Duration::from_secs(30))
///     .build()?;
///
/// let session = client.login(Credentials::new("alice", "secret")).await?;
/// for file in client.list_user_files(&session).await? {
///     println!("{} ({})", file.file_name, file.file_size);
/// }
///
/// client
///     .upload_file(&session, "notes.txt", ProgressReporter::disabled())
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    transport: Transport,
    retry_strategy: RetryStrategy,
    retry_predicate: Box<dyn RetryPredicate>,
}

impl Client {
    /// Creates a new `ClientBuilder` for configuring a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// The normalized base address every endpoint is resolved against.
    pub fn base_url(&self) -> &Url {
        self.inner.transport.base_url()
    }

    /// Exchanges credentials for a [`Session`].
    ///
    /// A `201` reply means the credentials were rejected and yields
    /// `"Invalid credentials"` with that status.
    pub async fn login(&self, credentials: Credentials) -> Outcome<Session> {
        let op = Login { credentials };
        let session = self.run(&op, &ProgressReporter::disabled()).await?;
        tracing::info!(
            username = %op.credentials.username(),
            role = %session.role(),
            "Logged in"
        );
        Ok(session)
    }

    /// Lists the caller's files, skipping entries without an id, name or url.
    pub async fn list_user_files(&self, session: &Session) -> Outcome<Vec<FileRecord>> {
        self.run(&ListUserFiles { session }, &ProgressReporter::disabled())
            .await
    }

    /// Uploads a local file as `multipart/form-data`.
    ///
    /// The file is opened before anything is sent; a missing or unreadable
    /// path fails locally with status code 0. Sent bytes are reported through
    /// `progress` when the file size is known.
    pub async fn upload_file(
        &self,
        session: &Session,
        path: impl AsRef<Path>,
        progress: ProgressReporter,
    ) -> Outcome<()> {
        let path = path.as_ref();
        let mut op = UploadFile {
            session,
            file_name: path.display().to_string(),
        };
        preflight(&op)?;

        let source = UploadSource::open(path).await.inspect_err(|e| {
            tracing::warn!(error = %e, "Upload rejected before sending");
        })?;
        op.file_name = source.file_name().to_string();
        tracing::debug!(
            file_name = %source.file_name(),
            content_type = %source.content_type(),
            bytes = source.len(),
            "Prepared upload"
        );

        let request = ApiRequest::upload(op.endpoint(), op.params(), source);
        self.send(&op, request, &progress, true).await
    }

    /// Fetches the metadata record for a file.
    ///
    /// `url_identifier` is the last segment of the file's public url, see
    /// [`FileRecord::lookup_identifier`].
    pub async fn file_info(&self, session: &Session, url_identifier: &str) -> Outcome<FileInfo> {
        let op = GetFileInfo {
            session,
            url_identifier,
        };
        self.run(&op, &ProgressReporter::disabled()).await
    }

    /// Downloads a file's contents into memory.
    ///
    /// Received bytes are reported through `progress`, with a total of 0 when
    /// the server does not announce a length. An empty body is a failure.
    pub async fn download_file(
        &self,
        session: &Session,
        file_id: &str,
        display_name: &str,
        progress: ProgressReporter,
    ) -> Outcome<Download> {
        let op = DownloadFile {
            session,
            file_id,
            display_name,
        };
        self.run(&op, &progress).await
    }

    /// Deletes one of the caller's files.
    pub async fn delete_file(&self, session: &Session, file_id: &str) -> Outcome<()> {
        self.run(&DeleteFile { session, file_id }, &ProgressReporter::disabled())
            .await
    }

    /// Lists every account. Administrators only.
    pub async fn list_users(&self, session: &Session) -> Outcome<Vec<UserRecord>> {
        self.run(&ListUsers { session }, &ProgressReporter::disabled())
            .await
    }

    /// Deletes an account. Administrators only.
    pub async fn delete_user(&self, session: &Session, user_id: &str) -> Outcome<()> {
        self.run(&DeleteUser { session, user_id }, &ProgressReporter::disabled())
            .await
    }

    /// Sets a new password for an account. Administrators only.
    pub async fn change_user_password(
        &self,
        session: &Session,
        user_id: &str,
        new_password: &str,
    ) -> Outcome<()> {
        let op = ChangePassword {
            session,
            user_id,
            new_password,
        };
        self.run(&op, &ProgressReporter::disabled()).await
    }

    /// Creates an account, then refreshes the user list. Administrators only.
    ///
    /// The refresh is sent only after the creation succeeded. Its outcome is
    /// carried in [`UserCreated::refresh`] and never turns a successful
    /// creation into a failure.
    ///
    /// ```no_run
    /// # async fn example(client: filexchange::Client, admin: filexchange::Session)
    /// # -> Result<(), filexchange::Error> {
    /// let created = client.create_user(&admin, "carol", "pw").await?;
    /// match created.refresh {
    ///     Ok(users) => println!("{} accounts", users.len()),
    ///     Err(e) => eprintln!("created {}, but the list is stale: {}", created.username, e),
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn create_user(
        &self,
        session: &Session,
        username: &str,
        password: &str,
    ) -> Outcome<UserCreated> {
        let op = CreateUser {
            session,
            username,
            password,
        };
        self.run(&op, &ProgressReporter::disabled()).await?;
        tracing::info!(username = %username, "User created; refreshing user list");

        // Exactly one refresh per creation, whatever the retry strategy.
        let refresh = self
            .run_once(&ListUsers { session }, &ProgressReporter::disabled())
            .await;
        if let Err(e) = &refresh {
            tracing::warn!(
                error = %e,
                status = e.status_code(),
                "User list refresh after creation failed"
            );
        }
        Ok(UserCreated {
            username: username.to_string(),
            refresh,
        })
    }

    /// Asks the server to start a backup. Administrators only.
    ///
    /// Returns the server's message, or an empty string if it sent none.
    pub async fn trigger_backup(&self, session: &Session) -> Outcome<String> {
        let message = self
            .run(&TriggerBackup { session }, &ProgressReporter::disabled())
            .await?;
        tracing::info!(message = %message, "Backup triggered");
        Ok(message)
    }

    async fn run<O: Operation>(&self, op: &O, progress: &ProgressReporter) -> Outcome<O::Output> {
        preflight(op)?;
        let request = ApiRequest::new(op.endpoint(), op.params());
        self.send(op, request, progress, true).await
    }

    /// Like [`run`](Self::run), but the request goes out at most once.
    async fn run_once<O: Operation>(
        &self,
        op: &O,
        progress: &ProgressReporter,
    ) -> Outcome<O::Output> {
        preflight(op)?;
        let request = ApiRequest::new(op.endpoint(), op.params());
        self.send(op, request, progress, false).await
    }

    /// Sends `request` and decodes the reply. With `retry` set, read-only
    /// endpoints are retried according to the configured strategy and
    /// predicate.
    async fn send<O: Operation>(
        &self,
        op: &O,
        mut request: ApiRequest,
        progress: &ProgressReporter,
        retry: bool,
    ) -> Outcome<O::Output> {
        let endpoint = request.endpoint;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let spare = if retry && endpoint.is_idempotent() {
                request.try_clone()
            } else {
                None
            };

            let result = match self.inner.transport.execute(request, attempt, progress).await {
                Ok(raw) => op.decode(raw),
                Err(e) => Err(e),
            };

            let error = match result {
                Ok(output) => return Ok(output),
                Err(e) => e,
            };

            tracing::warn!(
                error = %error,
                status = error.status_code(),
                attempt = attempt,
                endpoint = endpoint.path(),
                "Request failed"
            );

            let Some(next) = spare else {
                return Err(error);
            };
            if !self.inner.retry_predicate.should_retry(&error, attempt) {
                return Err(error);
            }
            let Some(delay) = self.inner.retry_strategy.delay_for_attempt(attempt) else {
                return Err(error);
            };

            tracing::info!(
                delay_ms = delay.as_millis(),
                attempt = attempt,
                endpoint = endpoint.path(),
                "Retrying request after delay"
            );
            tokio::time::sleep(delay).await;
            request = next;
        }
    }
}

/// Runs an operation's input checks. Failures never reach the network.
fn preflight<O: Operation>(op: &O) -> Result<()> {
    op.validate().inspect_err(|e| {
        tracing::warn!(
            error = %e,
            endpoint = op.endpoint().path(),
            "Request rejected before sending"
        );
    })
}

/// Builder for configuring and creating a [`Client`].
///
/// # Examples
///
/// ```no_run
/// use filexchange::{ClientBuilder, RetryStrategy};
/// use std::time::Duration;
///
/// # fn example() -> Result<(), filexchange::Error> {
/// let client = ClientBuilder::new()
///     .base_url("https://files.example.com/api/")?
///     .timeout(Duration::from_secs(30))
///     .retry_strategy(RetryStrategy::ExponentialBackoff {
///         initial_delay: Duration::from_millis(200),
///         max_delay: Duration::from_secs(5),
///         max_retries: 3,
///         jitter: true,
///     })
///     .user_agent("fexclient/2.0")?
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    base_url: Option<Url>,
    default_headers: HeaderMap,
    retry_strategy: RetryStrategy,
    retry_predicate: Option<Box<dyn RetryPredicate>>,
    timeout: Option<Duration>,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            base_url: None,
            default_headers: HeaderMap::new(),
            retry_strategy: RetryStrategy::None,
            retry_predicate: None,
            timeout: None,
        }
    }

    /// Sets the server address all endpoints are resolved against.
    ///
    /// A trailing `/` is added when missing, so `https://host/api` and
    /// `https://host/api/` both resolve `auth.php` to `https://host/api/auth.php`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or cannot carry a path.
    pub fn base_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        let mut url = Url::parse(url.as_ref())?;
        if url.cannot_be_a_base() {
            return Err(Error::ConfigurationError(format!(
                "Base URL cannot carry a path: {}",
                url
            )));
        }
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        url.set_query(None);
        url.set_fragment(None);
        self.base_url = Some(url);
        Ok(self)
    }

    /// Adds a header sent with every request.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header value: {}", e)))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Replaces the `User-Agent` header.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a valid header value.
    pub fn user_agent(self, value: impl AsRef<str>) -> Result<Self> {
        self.default_header(USER_AGENT.as_str(), value)
    }

    /// Sets the retry strategy for read-only operations.
    pub fn retry_strategy(mut self, strategy: RetryStrategy) -> Self {
        self.retry_strategy = strategy;
        self
    }

    /// Sets a custom retry predicate.
    ///
    /// By default, failures are retried based on `Error::is_retryable()`.
    pub fn retry_predicate(mut self, predicate: Box<dyn RetryPredicate>) -> Self {
        self.retry_predicate = Some(predicate);
        self
    }

    /// Sets the per-request timeout, covering the whole exchange.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the configured `Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if no base URL was provided or if the HTTP client
    /// cannot be constructed.
    pub fn build(self) -> Result<Client> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::ConfigurationError("Base URL is required".to_string()))?;

        let http_client = reqwest::Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .build()
            .map_err(|e| {
                Error::ConfigurationError(format!("Failed to build HTTP client: {}", e))
            })?;

        let retry_predicate = self
            .retry_predicate
            .unwrap_or_else(|| Box::new(RetryOnRetryable));

        tracing::debug!(base_url = %base_url, "Built FileseXchange client");

        Ok(Client {
            inner: Arc::new(ClientInner {
                transport: Transport::new(
                    http_client,
                    base_url,
                    self.default_headers,
                    self.timeout,
                ),
                retry_strategy: self.retry_strategy,
                retry_predicate,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
