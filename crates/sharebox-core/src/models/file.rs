use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Server-side file identifier. The server may send it as a number or a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct FileId(String);

impl FileId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for FileId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for FileId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(i64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => FileId(s),
            RawId::Number(n) => FileId(n.to_string()),
        })
    }
}

/// A file owned by the signed-in user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: FileId,
    pub name: String,
    #[serde(default)]
    pub owner: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
    /// Server-side URL of the stored (encrypted) file.
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub uploaded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareType {
    View,
    Download,
}

impl ShareType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShareType::View => "view",
            ShareType::Download => "download",
        }
    }
}

impl std::str::FromStr for ShareType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "view" => Ok(ShareType::View),
            "download" => Ok(ShareType::Download),
            other => Err(format!("Invalid share type '{}'. Use 'view' or 'download'.", other)),
        }
    }
}

/// A share another user granted to the signed-in user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedFileEntry {
    pub id: i64,
    pub file_name: String,
    pub shared_by: String,
    #[serde(default)]
    pub shared_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub share_type: ShareType,
    pub shared_link: String,
}

/// Share a file with one user by email.
#[derive(Debug, Clone, Serialize)]
pub struct ShareRequest {
    pub file_id: FileId,
    pub share_type: ShareType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared_with: Option<String>,
    /// Hours until the link expires; `None` never expires.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u32>,
    pub public: bool,
    pub one_time: bool,
}

impl ShareRequest {
    pub fn with_user(file_id: FileId, share_type: ShareType, email: impl Into<String>) -> Self {
        Self {
            file_id,
            share_type,
            shared_with: Some(email.into()),
            expires_in: None,
            public: false,
            one_time: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareLink {
    pub shared_link: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub one_time: bool,
    #[serde(default)]
    pub passphrase_required: bool,
    #[serde(default)]
    pub passphrase: Option<String>,
}

/// Create (or fetch the live) passphrase-protected public link for a file.
#[derive(Debug, Clone, Serialize)]
pub struct PublicShareRequest {
    pub file_id: FileId,
    pub share_type: ShareType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicShareLink {
    pub shared_link: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub passphrase: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmailRequest {
    pub to: Vec<String>,
    pub subject: String,
    pub message: String,
}

/// A file to upload, held in memory.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub name: String,
    pub description: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl UploadRequest {
    pub fn new(name: impl Into<String>, file_name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            file_name: file_name.into(),
            content_type: None,
            data: data.into(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// File content returned by a download or share-access call.
#[derive(Debug, Clone)]
pub struct DownloadedFile {
    pub filename: String,
    pub content_type: Option<String>,
    /// `true` when the server asked for inline display rather than a download.
    pub inline: bool,
    pub data: Bytes,
}

/// Disposition type and filename from a `Content-Disposition` header value.
pub fn parse_content_disposition(value: &str) -> (bool, Option<String>) {
    let mut parts = value.split(';');
    let inline = parts
        .next()
        .map(|kind| kind.trim().eq_ignore_ascii_case("inline"))
        .unwrap_or(false);

    let filename = parts.find_map(|param| {
        let (key, raw) = param.trim().split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("filename") {
            return None;
        }
        let name = raw.trim().trim_matches('"');
        (!name.is_empty()).then(|| name.to_string())
    });

    (inline, filename)
}
