//! src/services/storage_service.rs
//!
//! StorageService — upload, download and delete of PDFs. Payloads live on
//! local disk as `base_path/{id}.pdf`; metadata lives in an in-memory
//! `FileIndex` and is lost on restart.

use crate::{
    models::stored_file::StoredFile,
    services::{
        address_resolver::{self, AddressResolver},
        file_index::FileIndex,
        qr_service::{self, QrError},
    },
};
use bytes::Bytes;
use chrono::Utc;
use futures::{Stream, StreamExt, pin_mut};
use md5::Context;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
    task,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Upload size cap: 10 MiB.
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

const PDF_EXTENSION: &str = ".pdf";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("No file provided. Use the `file` field.")]
    MissingFile,
    #[error("No filename provided")]
    MissingFilename,
    #[error("Only PDF files are allowed. Please upload a .pdf file.")]
    InvalidType,
    #[error("File too large. Maximum size is {} MB.", .limit / (1024 * 1024))]
    TooLarge { limit: u64 },
    #[error("Uploaded file is empty.")]
    Empty,
    #[error("Failed to read upload: {0}")]
    MalformedUpload(String),
    /// Download of an unknown id, or of one whose payload vanished.
    #[error("File not found or has expired.")]
    Expired,
    /// Delete of an unknown id.
    #[error("File not found.")]
    NotFound,
    #[error("Failed to save file: {0}")]
    Save(#[source] io::Error),
    #[error("Failed to delete file: {0}")]
    Delete(#[source] io::Error),
    #[error("Failed to generate QR code: {0}")]
    Qr(#[from] QrError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// A stored file opened for reading.
#[derive(Debug)]
pub struct OpenedFile {
    pub record: StoredFile,
    pub file: File,
    pub len: u64,
}

/// StorageService provides the operations behind the HTTP API:
/// - Store an upload (validate, write to disk, index it)
/// - Build the shareable download link and its QR code
/// - Open a stored file for download, pruning records whose payload is gone
/// - Delete a stored file
///
/// Cloning is cheap; all clones share the same index.
#[derive(Clone, Debug)]
pub struct StorageService {
    /// Identifier → metadata for every live upload.
    pub index: FileIndex,

    /// Directory holding the PDF payloads.
    pub base_path: PathBuf,

    resolver: Arc<dyn AddressResolver>,
    public_host: Option<String>,
}

impl StorageService {
    pub fn new(base_path: impl Into<PathBuf>, resolver: Arc<dyn AddressResolver>) -> Self {
        Self {
            index: FileIndex::new(),
            base_path: base_path.into(),
            resolver,
            public_host: None,
        }
    }

    /// Host (optionally with port) to put in download links instead of the
    /// request host.
    pub fn with_public_host(mut self, public_host: Option<String>) -> Self {
        self.public_host = public_host.filter(|h| !h.trim().is_empty());
        self
    }

    /// Payload location for `id`. Never depends on client input.
    pub fn file_path(&self, id: &Uuid) -> PathBuf {
        self.base_path.join(format!("{}{}", id, PDF_EXTENSION))
    }

    /// Validate, persist and index an uploaded PDF.
    ///
    /// - Rejects a missing or non-`.pdf` filename before reading any bytes.
    /// - Streams bytes into a temporary file, enforcing `MAX_UPLOAD_BYTES`.
    /// - Rejects empty payloads.
    /// - fsyncs and renames into `base_path/{id}.pdf`, then indexes the record.
    ///
    /// On any error the temporary file is removed, so a rejected upload leaves
    /// nothing behind.
    pub async fn store_upload<S>(&self, filename: Option<&str>, stream: S) -> StorageResult<StoredFile>
    where
        S: Stream<Item = StorageResult<Bytes>>,
    {
        let filename = validate_filename(filename)?;

        fs::create_dir_all(&self.base_path)
            .await
            .map_err(StorageError::Save)?;

        let id = Uuid::new_v4();
        let file_path = self.file_path(&id);
        let tmp_path = self.base_path.join(format!(".tmp-{}", id));

        let (size_bytes, etag) = match write_payload(&tmp_path, stream, MAX_UPLOAD_BYTES).await {
            Ok(written) => written,
            Err(err) => {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(err);
            }
        };

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Save(err));
        }

        let record = StoredFile {
            id,
            filename: filename.to_string(),
            path: file_path,
            size_bytes,
            etag,
            uploaded_at: Utc::now(),
        };
        self.index.insert(record.clone());

        info!(
            file_id = %id,
            filename = %record.filename,
            size_bytes,
            "stored upload"
        );
        Ok(record)
    }

    /// Absolute download link for `id` as seen from the LAN.
    ///
    /// `request_authority` is the `host[:port]` the client used. Resolving the
    /// LAN address may block, so it runs on the blocking pool.
    pub async fn download_link(&self, request_authority: &str, id: &Uuid) -> String {
        let resolver = self.resolver.clone();
        let public_host = self.public_host.clone();
        let authority = request_authority.to_string();

        let public = task::spawn_blocking(move || {
            address_resolver::public_authority(&authority, public_host.as_deref(), resolver.as_ref())
        })
        .await
        .unwrap_or_else(|err| {
            warn!("address resolution task failed: {}", err);
            request_authority.to_string()
        });

        address_resolver::download_url(&public, id)
    }

    /// Render `url` as a QR code data URI off the async executor.
    pub async fn qr_code(&self, url: &str) -> StorageResult<String> {
        let payload = url.to_string();
        let uri = task::spawn_blocking(move || qr_service::render_data_uri(&payload))
            .await
            .map_err(QrError::from)??;
        Ok(uri)
    }

    /// Open the payload of `raw_id` for streaming out.
    ///
    /// Returns `Expired` when the id is malformed or unknown, and also when the
    /// record exists but its file is gone. In the latter case the stale record
    /// is dropped first.
    pub async fn open_file(&self, raw_id: &str) -> StorageResult<OpenedFile> {
        let id = parse_id(raw_id).ok_or(StorageError::Expired)?;
        let record = self.index.get(&id).ok_or(StorageError::Expired)?;

        let file = match File::open(&record.path).await {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                if self.index.remove_if_unchanged(&record) {
                    warn!(file_id = %id, "payload missing on disk, pruned stale record");
                }
                return Err(StorageError::Expired);
            }
            Err(err) => return Err(StorageError::Io(err)),
        };
        let len = file.metadata().await?.len();

        debug!(file_id = %id, len, "serving file");
        Ok(OpenedFile { record, file, len })
    }

    /// Delete the payload and record of `raw_id`.
    ///
    /// - A payload that is already missing is not an error.
    /// - Any other removal error leaves the record in place.
    /// - Only one of several concurrent deletes of the same id succeeds.
    pub async fn delete_file(&self, raw_id: &str) -> StorageResult<StoredFile> {
        let id = parse_id(raw_id).ok_or(StorageError::NotFound)?;
        let record = self.index.get(&id).ok_or(StorageError::NotFound)?;

        match fs::remove_file(&record.path).await {
            Ok(_) => debug!("removed physical file {}", record.path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("file {} already missing", record.path.display());
            }
            Err(err) => return Err(StorageError::Delete(err)),
        }

        let removed = self.index.remove(&id).ok_or(StorageError::NotFound)?;
        info!(file_id = %id, "deleted file");
        Ok(removed)
    }

    /// Best-effort write/read/delete of a scratch file under `base_path`.
    pub async fn check_disk(&self) -> Result<(), String> {
        let tmp_path = self.base_path.join(format!(".readyz-{}", Uuid::new_v4()));
        fs::write(&tmp_path, b"readyz")
            .await
            .map_err(|e| format!("could not write tmp file: {}", e))?;

        let outcome = match fs::read(&tmp_path).await {
            Ok(bytes) if bytes == b"readyz" => Ok(()),
            Ok(_) => Err("file content mismatch".to_string()),
            Err(e) => Err(format!("could not read tmp file: {}", e)),
        };

        match fs::remove_file(&tmp_path).await {
            Ok(_) => outcome,
            Err(e) => outcome.and(Err(format!("could not remove tmp file: {}", e))),
        }
    }
}

/// Check the client filename: present, non-blank, ending in `.pdf` in any case.
fn validate_filename(filename: Option<&str>) -> StorageResult<&str> {
    let name = filename
        .filter(|n| !n.trim().is_empty())
        .ok_or(StorageError::MissingFilename)?;
    if !name.to_ascii_lowercase().ends_with(PDF_EXTENSION) {
        return Err(StorageError::InvalidType);
    }
    Ok(name)
}

fn parse_id(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw).ok()
}

/// Stream `stream` into a new file at `path`.
///
/// Returns the byte count and hex MD5. Stops as soon as `limit` is exceeded.
/// Leaves cleanup of `path` to the caller.
async fn write_payload<S>(path: &Path, stream: S, limit: u64) -> StorageResult<(u64, String)>
where
    S: Stream<Item = StorageResult<Bytes>>,
{
    let mut file = File::create(path).await.map_err(StorageError::Save)?;
    let mut size_bytes: u64 = 0;
    let mut digest = Context::new();

    pin_mut!(stream);
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        size_bytes += chunk.len() as u64;
        if size_bytes > limit {
            return Err(StorageError::TooLarge { limit });
        }
        digest.consume(&chunk);
        file.write_all(&chunk).await.map_err(StorageError::Save)?;
    }

    if size_bytes == 0 {
        return Err(StorageError::Empty);
    }

    file.flush().await.map_err(StorageError::Save)?;
    file.sync_all().await.map_err(StorageError::Save)?;

    Ok((size_bytes, format!("{:x}", digest.compute())))
}
