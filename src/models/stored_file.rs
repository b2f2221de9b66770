//! Represents an uploaded PDF and the JSON bodies returned about it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Metadata for one uploaded PDF.
///
/// The payload lives at `path`, which is always `<storage_dir>/<id>.pdf`.
/// The user-supplied `filename` is only echoed back as the download name and
/// never touches the filesystem.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct StoredFile {
    /// Identifier generated at upload time; the only key for later lookups.
    pub id: Uuid,

    /// Original filename as sent by the client.
    pub filename: String,

    /// Location of the payload on disk.
    pub path: PathBuf,

    /// Size in bytes.
    pub size_bytes: u64,

    /// Hex MD5 of the payload.
    pub etag: String,

    /// When the upload completed.
    pub uploaded_at: DateTime<Utc>,
}

/// Body returned by `POST /api/upload`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UploadResponse {
    pub success: bool,
    pub file_id: Uuid,
    pub filename: String,
    pub file_size: u64,
    pub download_url: String,

    /// `data:image/png;base64,...`
    pub qr_code: String,
}

/// Body returned by `DELETE /api/files/{file_id}`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}
