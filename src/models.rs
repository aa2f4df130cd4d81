//! Records exchanged with the server.

use bytes::Bytes;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::path::Path;

use crate::Outcome;

/// Accepts a JSON string or number as text; anything else becomes empty.
fn lenient_text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(value_text(&Value::deserialize(deserializer)?).unwrap_or_default())
}

pub(crate) fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// One uploaded file as listed by `user_files`.
///
/// Only records with a non-empty `id`, `file_name` and `file_url` are
/// displayable; the client drops the others during ingestion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FileRecord {
    /// Server-assigned identifier.
    #[serde(default, deserialize_with = "lenient_text")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub file_name: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub owner_name: String,
    /// Size as a display string.
    #[serde(default, deserialize_with = "lenient_text")]
    pub file_size: String,
    /// Public download URL. Its last path segment is the lookup identifier.
    #[serde(default, deserialize_with = "lenient_text")]
    pub file_url: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub upload_date: String,
    #[serde(rename = "count_views", default, deserialize_with = "lenient_text")]
    pub view_count: String,
}

impl FileRecord {
    /// Returns `true` if the record has everything needed to be shown.
    pub fn is_displayable(&self) -> bool {
        !self.id.is_empty() && !self.file_name.is_empty() && !self.file_url.is_empty()
    }

    /// The identifier used for [`crate::Client::file_info`].
    ///
    /// ```
    /// use filexchange::FileRecord;
    ///
    /// let record = FileRecord {
    ///     file_url: "https://files.example.com/f/a1b2c3".to_string(),
    ///     ..Default::default()
    /// };
    /// assert_eq!(record.lookup_identifier(), Some("a1b2c3"));
    /// ```
    pub fn lookup_identifier(&self) -> Option<&str> {
        self.file_url
            .rsplit('/')
            .next()
            .filter(|segment| !segment.is_empty())
    }
}

/// An account as listed by `user_list`. Admin only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UserRecord {
    #[serde(default, deserialize_with = "lenient_text")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub username: String,
}

impl UserRecord {
    pub fn is_valid(&self) -> bool {
        !self.id.is_empty()
    }
}

/// Free-form file metadata returned by `file_info`.
///
/// The server guarantees `file_name` and `file_size`; every other field is
/// optional and read through the accessors or [`FileInfo::text`].
#[derive(Debug, Clone, PartialEq)]
pub struct FileInfo {
    fields: Map<String, Value>,
}

impl FileInfo {
    pub(crate) fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// A field rendered as text, if present as a string or number.
    pub fn text(&self, key: &str) -> Option<String> {
        self.fields.get(key).and_then(value_text)
    }

    /// The raw JSON value of a field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn id(&self) -> Option<String> {
        self.text("id")
    }

    pub fn file_name(&self) -> String {
        self.text("file_name").unwrap_or_default()
    }

    pub fn file_size(&self) -> String {
        self.text("file_size").unwrap_or_default()
    }

    pub fn owner_name(&self) -> Option<String> {
        self.text("owner_name")
    }

    pub fn upload_date(&self) -> Option<String> {
        self.text("upload_date")
    }

    pub fn view_count(&self) -> Option<String> {
        self.text("count_views")
    }

    pub fn download_count(&self) -> Option<String> {
        self.text("count_downloads")
    }

    /// All fields as sent by the server.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

/// A completed download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    /// The file id that was requested.
    pub file_id: String,
    /// The name the caller asked to keep for the file.
    pub display_name: String,
    /// The file contents. Never empty.
    pub bytes: Bytes,
}

impl Download {
    /// Writes the contents to `path`, replacing any existing file.
    pub async fn save_to(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        tokio::fs::write(path, &self.bytes).await
    }
}

/// Result of a successful `new_user` call.
///
/// The refreshed user list is fetched as a follow-up; its failure does not
/// undo the creation and is reported here on its own.
#[derive(Debug)]
pub struct UserCreated {
    /// The account that was created.
    pub username: String,
    /// Outcome of the automatic `user_list` refresh.
    pub refresh: Outcome<Vec<UserRecord>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn file_record_accepts_numeric_fields() {
        let record: FileRecord = serde_json::from_value(json!({
            "id": 42,
            "file_name": "report.pdf",
            "file_url": "http://x/f/abc",
            "count_views": 7,
            "owner_name": null
        }))
        .unwrap();

        assert_eq!(record.id, "42");
        assert_eq!(record.view_count, "7");
        assert_eq!(record.owner_name, "");
        assert!(record.is_displayable());
    }

    #[test]
    fn file_record_without_url_is_not_displayable() {
        let record: FileRecord =
            serde_json::from_value(json!({"id": "1", "file_name": "a.txt"})).unwrap();
        assert!(!record.is_displayable());
        assert_eq!(record.lookup_identifier(), None);
    }

    #[test]
    fn lookup_identifier_ignores_trailing_slash() {
        let record = FileRecord {
            file_url: "http://x/f/".to_string(),
            ..Default::default()
        };
        assert_eq!(record.lookup_identifier(), None);
    }

    #[test]
    fn file_info_renders_mixed_values() {
        let fields = json!({
            "file_name": "a.txt",
            "file_size": "12 KB",
            "count_downloads": 3,
            "extra": [1, 2]
        });
        let info = FileInfo::new(fields.as_object().cloned().unwrap());

        assert_eq!(info.file_name(), "a.txt");
        assert_eq!(info.download_count().as_deref(), Some("3"));
        assert_eq!(info.text("extra"), None);
        assert!(info.get("extra").is_some());
        assert_eq!(info.owner_name(), None);
    }

    #[tokio::test]
    async fn download_saves_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.bin");
        let download = Download {
            file_id: "1".into(),
            display_name: "out.bin".into(),
            bytes: Bytes::from_static(b"payload"),
        };

        download.save_to(&target).await.unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"payload");
    }
}
