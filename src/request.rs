//! Request shapes for the FileseXchange endpoints.

use http::Method;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Every endpoint the client talks to, relative to the base address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Auth,
    UserFiles,
    UploadFile,
    FileInfo,
    DownloadFile,
    DeleteFile,
    UserList,
    DeleteUser,
    ChangePassword,
    NewUser,
    MakeBackup,
}

impl Endpoint {
    /// The path appended to the base address.
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Auth => "auth.php",
            Endpoint::UserFiles => "user_files.php",
            Endpoint::UploadFile => "upload_file.php",
            Endpoint::FileInfo => "file_info.php",
            Endpoint::DownloadFile => "download_file.php",
            Endpoint::DeleteFile => "delete_file.php",
            Endpoint::UserList => "user_list.php",
            Endpoint::DeleteUser => "delete_user.php",
            Endpoint::ChangePassword => "change_password.php",
            Endpoint::NewUser => "new_user.php",
            Endpoint::MakeBackup => "make_backup.php",
        }
    }

    /// Download is a GET with query parameters; everything else is a form POST.
    pub fn method(self) -> Method {
        match self {
            Endpoint::DownloadFile => Method::GET,
            _ => Method::POST,
        }
    }

    /// Read-only endpoints that are safe to send more than once.
    pub fn is_idempotent(self) -> bool {
        matches!(
            self,
            Endpoint::UserFiles | Endpoint::FileInfo | Endpoint::DownloadFile | Endpoint::UserList
        )
    }

    /// Endpoints the server only honours for administrator sessions.
    pub fn requires_admin(self) -> bool {
        matches!(
            self,
            Endpoint::UserList
                | Endpoint::DeleteUser
                | Endpoint::ChangePassword
                | Endpoint::NewUser
                | Endpoint::MakeBackup
        )
    }
}

/// A local file opened for a multipart upload.
///
/// Opening happens before any request is built, so a missing or unreadable
/// file fails locally. The handle is owned by the request body and closed
/// when the body is dropped, whatever the exit path.
#[derive(Debug)]
pub struct UploadSource {
    pub(crate) file: tokio::fs::File,
    pub(crate) file_name: String,
    pub(crate) content_type: String,
    pub(crate) len: u64,
    path: PathBuf,
}

impl UploadSource {
    /// Opens `path` for reading and detects its content type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the file does not exist or cannot be
    /// opened.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(Error::validation(format!("File '{}' not found", file_name)));
        }

        let open_failed = |e: std::io::Error| {
            tracing::warn!(path = %path.display(), error = %e, "Cannot open upload source");
            Error::validation(format!("Could not open file '{}' for reading", file_name))
        };
        let file = tokio::fs::File::open(path).await.map_err(open_failed)?;
        let meta = file.metadata().await.map_err(open_failed)?;
        if meta.is_dir() {
            return Err(Error::validation(format!(
                "Could not open file '{}' for reading",
                file_name
            )));
        }

        let content_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        Ok(Self {
            file,
            file_name,
            content_type,
            len: meta.len(),
            path: path.to_path_buf(),
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Body of an outgoing request.
#[derive(Debug)]
pub enum RequestBody {
    /// Parameters only: form-encoded for POST, query string for GET.
    Params,
    /// `multipart/form-data` with the parameters as text fields and the
    /// file under the `file` field.
    Upload(UploadSource),
}

/// One request against an [`Endpoint`].
#[derive(Debug)]
pub struct ApiRequest {
    pub endpoint: Endpoint,
    /// Parameters in the order they are sent.
    pub params: Vec<(&'static str, String)>,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn new(endpoint: Endpoint, params: Vec<(&'static str, String)>) -> Self {
        Self {
            endpoint,
            params,
            body: RequestBody::Params,
        }
    }

    pub fn upload(endpoint: Endpoint, params: Vec<(&'static str, String)>, source: UploadSource) -> Self {
        Self {
            endpoint,
            params,
            body: RequestBody::Upload(source),
        }
    }

    /// Copies the request for another attempt.
    ///
    /// Returns `None` for uploads, whose body is a stream that can only be
    /// sent once.
    pub fn try_clone(&self) -> Option<Self> {
        match self.body {
            RequestBody::Params => Some(Self::new(self.endpoint, self.params.clone())),
            RequestBody::Upload(_) => None,
        }
    }

    /// Parameter names joined for logging; values are never logged.
    pub(crate) fn param_names(&self) -> String {
        self.params
            .iter()
            .map(|(name, _)| *name)
            .collect::<Vec<_>>()
            .join(",")
    }
}
