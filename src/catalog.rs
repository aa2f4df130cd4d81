//! One [`Operation`] per endpoint: inputs, pre-flight checks, wire
//! parameters and response decoding.
//!
//! Operations are plain data and never touch the network, so every rule here
//! is testable against hand-built [`RawResponse`] values.

use http::StatusCode;
use serde_json::{Map, Value};

use crate::{
    interpret::{has_success_marker, non_empty_str, predicate_failure, FailurePolicy},
    models::{value_text, Download, FileInfo, FileRecord, UserRecord},
    request::Endpoint,
    response::RawResponse,
    session::{Credentials, Role, Session},
    Error, Result,
};

pub(crate) const INVALID_CREDENTIALS: &str = "Invalid credentials";
pub(crate) const FILE_NOT_FOUND: &str = "File for deletion not found on server";
pub(crate) const EMPTY_DOWNLOAD: &str = "Server returned an empty file";

/// Backup bodies shorter than this are used verbatim as the success message.
const MAX_PLAIN_BACKUP_MESSAGE: usize = 100;

/// A request description paired with its response interpretation.
pub(crate) trait Operation {
    type Output;

    fn endpoint(&self) -> Endpoint;

    /// Checks inputs before anything is sent.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Wire parameters in send order.
    fn params(&self) -> Vec<(&'static str, String)>;

    /// Classifies the response.
    fn decode(&self, raw: RawResponse) -> Result<Self::Output>;
}

fn require(value: &str, message: &str) -> Result<()> {
    if value.is_empty() {
        Err(Error::validation(message))
    } else {
        Ok(())
    }
}

fn require_token(session: &Session) -> Result<()> {
    require(session.token(), "Missing authorization token")
}

fn token_param(session: &Session) -> (&'static str, String) {
    ("token_api", session.token().to_string())
}

/// Decodes each element of `key` independently, keeping those that pass
/// `keep`. A malformed element is skipped, never fatal.
fn decode_entries<T, F>(obj: &Map<String, Value>, key: &str, keep: F) -> Vec<T>
where
    T: serde::de::DeserializeOwned,
    F: Fn(&T) -> bool,
{
    let entries = match obj.get(key).and_then(Value::as_array) {
        Some(entries) => entries,
        None => return Vec::new(),
    };
    let mut kept = Vec::with_capacity(entries.len());
    for entry in entries {
        match serde_json::from_value::<T>(entry.clone()) {
            Ok(item) if keep(&item) => kept.push(item),
            Ok(_) => tracing::warn!(entry = %entry, key = key, "Skipping incomplete entry"),
            Err(e) => tracing::warn!(entry = %entry, error = %e, "Skipping malformed entry"),
        }
    }
    kept
}

fn has_array(obj: &Map<String, Value>, key: &str) -> bool {
    obj.get(key).is_some_and(Value::is_array)
}

fn authorization_error(
    message: &'static str,
) -> impl Fn(StatusCode, &[u8]) -> Option<String> + Send + Sync + 'static {
    move |status: StatusCode, _: &[u8]| {
        matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
            .then(|| message.to_string())
    }
}

pub(crate) struct Login {
    pub credentials: Credentials,
}

impl Login {
    fn overrides(status: StatusCode, _body: &[u8]) -> Option<String> {
        if status == StatusCode::CREATED {
            Some(INVALID_CREDENTIALS.to_string())
        } else if status.is_server_error() {
            Some(format!("Internal server error (code {})", status.as_u16()))
        } else {
            None
        }
    }
}

impl Operation for Login {
    type Output = Session;

    fn endpoint(&self) -> Endpoint {
        Endpoint::Auth
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("username", self.credentials.username.clone()),
            ("password", self.credentials.password.clone()),
        ]
    }

    fn decode(&self, raw: RawResponse) -> Result<Session> {
        let policy = FailurePolicy::new("Login failed").with_overrides(Self::overrides);
        let obj = policy.expect_object(&raw)?;

        let token = obj.get("token_api").and_then(Value::as_str);
        let role = obj.get("role").and_then(Value::as_str);
        match (token, role) {
            (Some(token), Some(role)) if !token.is_empty() && !role.is_empty() => {
                Ok(Session::new(token, Role::from_wire(role)))
            }
            (Some(_), Some(_)) => Err(Error::application(
                "Server response error: received an empty token or role",
                raw.status,
            )),
            _ => Err(predicate_failure(&raw, "Server response error: missing token_api/role")),
        }
    }
}

pub(crate) struct ListUserFiles<'a> {
    pub session: &'a Session,
}

impl Operation for ListUserFiles<'_> {
    type Output = Vec<FileRecord>;

    fn endpoint(&self) -> Endpoint {
        Endpoint::UserFiles
    }

    fn validate(&self) -> Result<()> {
        require_token(self.session)
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        vec![token_param(self.session)]
    }

    fn decode(&self, raw: RawResponse) -> Result<Vec<FileRecord>> {
        let policy = FailurePolicy::new("Failed to fetch files")
            .with_overrides(authorization_error("Authorization error accessing files"));
        let obj = policy.expect_object(&raw)?;

        if !has_success_marker(&obj) || !has_array(&obj, "files") {
            return Err(predicate_failure(&raw, "Invalid response format from server"));
        }
        let files = decode_entries(&obj, "files", FileRecord::is_displayable);
        tracing::debug!(count = files.len(), "Parsed file list");
        Ok(files)
    }
}

pub(crate) struct UploadFile<'a> {
    pub session: &'a Session,
    pub file_name: String,
}

impl Operation for UploadFile<'_> {
    type Output = ();

    fn endpoint(&self) -> Endpoint {
        Endpoint::UploadFile
    }

    fn validate(&self) -> Result<()> {
        require_token(self.session)
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        vec![token_param(self.session)]
    }

    fn decode(&self, raw: RawResponse) -> Result<()> {
        let file_name = self.file_name.clone();
        let policy = FailurePolicy::new(format!("Failed to upload '{}'", self.file_name))
            .with_overrides(move |status, _| {
                (status == StatusCode::CREATED)
                    .then(|| format!("Authorization error during upload of '{}'", file_name))
            });
        policy.expect_ok(&raw)?;
        Ok(())
    }
}

pub(crate) struct GetFileInfo<'a> {
    pub session: &'a Session,
    pub url_identifier: &'a str,
}

impl Operation for GetFileInfo<'_> {
    type Output = FileInfo;

    fn endpoint(&self) -> Endpoint {
        Endpoint::FileInfo
    }

    fn validate(&self) -> Result<()> {
        require_token(self.session)?;
        require(self.url_identifier, "Missing file identifier")
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        vec![
            token_param(self.session),
            ("file_url", self.url_identifier.to_string()),
        ]
    }

    fn decode(&self, raw: RawResponse) -> Result<FileInfo> {
        let policy = FailurePolicy::new("Failed to fetch file info")
            .with_overrides(authorization_error("Authorization error accessing file info"));
        let obj = policy.expect_object(&raw)?;

        if !obj.contains_key("file_name") || !obj.contains_key("file_size") {
            return Err(predicate_failure(&raw, "Invalid response format from server"));
        }
        Ok(FileInfo::new(obj))
    }
}

pub(crate) struct DownloadFile<'a> {
    pub session: &'a Session,
    pub file_id: &'a str,
    pub display_name: &'a str,
}

impl DownloadFile<'_> {
    fn overrides(status: StatusCode, body: &[u8]) -> Option<String> {
        if status != StatusCode::CREATED {
            return None;
        }
        match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(obj)) => non_empty_str(&obj, "status").map(str::to_string),
            _ => None,
        }
    }
}

impl Operation for DownloadFile<'_> {
    type Output = Download;

    fn endpoint(&self) -> Endpoint {
        Endpoint::DownloadFile
    }

    fn validate(&self) -> Result<()> {
        require_token(self.session)?;
        require(self.file_id, "Missing file id")
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        vec![
            token_param(self.session),
            ("file_id", self.file_id.to_string()),
        ]
    }

    fn decode(&self, raw: RawResponse) -> Result<Download> {
        let policy = FailurePolicy::new("Failed to download file").with_overrides(Self::overrides);
        policy.expect_ok(&raw)?;

        if raw.body.is_empty() {
            tracing::warn!(file_id = %self.file_id, "Download returned an empty body");
            return Err(Error::application(EMPTY_DOWNLOAD, raw.status));
        }
        Ok(Download {
            file_id: self.file_id.to_string(),
            display_name: self.display_name.to_string(),
            bytes: raw.body,
        })
    }
}

pub(crate) struct DeleteFile<'a> {
    pub session: &'a Session,
    pub file_id: &'a str,
}

impl DeleteFile<'_> {
    fn overrides(status: StatusCode, _body: &[u8]) -> Option<String> {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Some("Authorization error deleting file".to_string())
            }
            StatusCode::NOT_FOUND => Some(FILE_NOT_FOUND.to_string()),
            _ => None,
        }
    }
}

impl Operation for DeleteFile<'_> {
    type Output = ();

    fn endpoint(&self) -> Endpoint {
        Endpoint::DeleteFile
    }

    fn validate(&self) -> Result<()> {
        require_token(self.session)?;
        require(self.file_id, "Missing file id")
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        vec![
            token_param(self.session),
            ("file_id", self.file_id.to_string()),
        ]
    }

    fn decode(&self, raw: RawResponse) -> Result<()> {
        FailurePolicy::new("Failed to delete file")
            .with_overrides(Self::overrides)
            .expect_ok(&raw)?;
        Ok(())
    }
}

pub(crate) struct ListUsers<'a> {
    pub session: &'a Session,
}

impl Operation for ListUsers<'_> {
    type Output = Vec<UserRecord>;

    fn endpoint(&self) -> Endpoint {
        Endpoint::UserList
    }

    fn validate(&self) -> Result<()> {
        require_token(self.session)
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        vec![token_param(self.session)]
    }

    fn decode(&self, raw: RawResponse) -> Result<Vec<UserRecord>> {
        let policy = FailurePolicy::new("Failed to fetch users");
        let obj = policy.expect_object(&raw)?;

        if !has_success_marker(&obj) || !has_array(&obj, "users") {
            return Err(predicate_failure(&raw, "Invalid response format from server"));
        }
        Ok(decode_entries(&obj, "users", UserRecord::is_valid))
    }
}

pub(crate) struct DeleteUser<'a> {
    pub session: &'a Session,
    pub user_id: &'a str,
}

impl Operation for DeleteUser<'_> {
    type Output = ();

    fn endpoint(&self) -> Endpoint {
        Endpoint::DeleteUser
    }

    fn validate(&self) -> Result<()> {
        require_token(self.session)?;
        require(self.user_id, "Missing user id")
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        vec![
            token_param(self.session),
            ("user_id", self.user_id.to_string()),
        ]
    }

    fn decode(&self, raw: RawResponse) -> Result<()> {
        FailurePolicy::new("Failed to delete user").expect_ok(&raw)?;
        Ok(())
    }
}

pub(crate) struct ChangePassword<'a> {
    pub session: &'a Session,
    pub user_id: &'a str,
    pub new_password: &'a str,
}

impl Operation for ChangePassword<'_> {
    type Output = ();

    fn endpoint(&self) -> Endpoint {
        Endpoint::ChangePassword
    }

    fn validate(&self) -> Result<()> {
        require_token(self.session)?;
        require(self.user_id, "Missing user id")?;
        require(self.new_password, "New password must not be empty")
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        vec![
            token_param(self.session),
            ("user_id", self.user_id.to_string()),
            ("password", self.new_password.to_string()),
        ]
    }

    fn decode(&self, raw: RawResponse) -> Result<()> {
        FailurePolicy::new("Failed to change password").expect_ok(&raw)?;
        Ok(())
    }
}

pub(crate) struct CreateUser<'a> {
    pub session: &'a Session,
    pub username: &'a str,
    pub password: &'a str,
}

impl Operation for CreateUser<'_> {
    type Output = ();

    fn endpoint(&self) -> Endpoint {
        Endpoint::NewUser
    }

    fn validate(&self) -> Result<()> {
        require_token(self.session)?;
        require(self.username, "Username is required")?;
        require(self.password, "Password is required")
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        vec![
            token_param(self.session),
            ("username", self.username.to_string()),
            ("password", self.password.to_string()),
        ]
    }

    fn decode(&self, raw: RawResponse) -> Result<()> {
        let policy = FailurePolicy::new("Failed to create user");
        let obj = policy.expect_object(&raw)?;
        if has_success_marker(&obj) {
            Ok(())
        } else {
            Err(predicate_failure(&raw, "Failed to create user"))
        }
    }
}

pub(crate) struct TriggerBackup<'a> {
    pub session: &'a Session,
}

impl Operation for TriggerBackup<'_> {
    type Output = String;

    fn endpoint(&self) -> Endpoint {
        Endpoint::MakeBackup
    }

    fn validate(&self) -> Result<()> {
        require_token(self.session)
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        vec![token_param(self.session)]
    }

    fn decode(&self, raw: RawResponse) -> Result<String> {
        FailurePolicy::new("Failed to start backup").expect_ok(&raw)?;

        let from_json = raw.json_object().ok().and_then(|obj| {
            obj.get("message")
                .or_else(|| obj.get("status"))
                .and_then(value_text)
                .filter(|m| !m.is_empty())
        });
        let message = match from_json {
            Some(message) => message,
            None if !raw.body.is_empty() && raw.body.len() < MAX_PLAIN_BACKUP_MESSAGE => {
                raw.text().trim().to_string()
            }
            None => String::new(),
        };
        Ok(message)
    }
}
