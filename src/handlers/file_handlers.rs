//! HTTP handlers for uploading, downloading and deleting PDFs.
//! Upload bodies are streamed straight to disk and downloads stream back from
//! disk; storage concerns are delegated to `StorageService`.

use crate::{
    errors::AppError,
    models::stored_file::{DeleteResponse, StoredFile, UploadResponse},
    services::storage_service::{MAX_UPLOAD_BYTES, OpenedFile, StorageError, StorageService},
};
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, State, multipart::MultipartError},
    http::{HeaderMap, HeaderValue, StatusCode, Uri, header},
    response::Response,
};
use futures::StreamExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

/// Multipart field carrying the PDF.
const FILE_FIELD: &str = "file";

/// `POST /api/upload` — store a PDF and answer with its download link as a QR code.
pub async fn upload_file(
    State(service): State<StorageService>,
    headers: HeaderMap,
    uri: Uri,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            debug!("skipping multipart field {:?}", field.name());
            continue;
        }

        let filename = field.file_name().map(str::to_string);
        debug!(
            "received upload: filename={:?}, content_type={:?}",
            filename,
            field.content_type()
        );

        let stream = field.map(|chunk| chunk.map_err(multipart_error));
        let record = service
            .store_upload(filename.as_deref(), stream)
            .await
            .inspect_err(|err| warn!("rejected upload {:?}: {}", filename, err))?;

        let authority = request_authority(&headers, &uri);
        let download_url = service.download_link(&authority, &record.id).await;
        let qr_code = service.qr_code(&download_url).await?;

        return Ok(Json(UploadResponse {
            success: true,
            file_id: record.id,
            filename: record.filename,
            file_size: record.size_bytes,
            download_url,
            qr_code,
        }));
    }

    warn!("no `{}` field in multipart upload", FILE_FIELD);
    Err(StorageError::MissingFile.into())
}

/// `GET /api/files/{file_id}` — stream a stored PDF back under its original name.
pub async fn download_file(
    State(service): State<StorageService>,
    Path(file_id): Path<String>,
) -> Result<Response, AppError> {
    let OpenedFile { record, file, len } = service.open_file(&file_id).await?;
    let body = Body::from_stream(ReaderStream::new(file));

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    set_download_headers(response.headers_mut(), &record, len);
    Ok(response)
}

/// `DELETE /api/files/{file_id}`
pub async fn delete_file(
    State(service): State<StorageService>,
    Path(file_id): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    service.delete_file(&file_id).await?;
    Ok(Json(DeleteResponse {
        success: true,
        message: "File deleted successfully.".into(),
    }))
}

/// Body-limit rejections surface as the same 400 as an oversized file.
fn multipart_error(err: MultipartError) -> StorageError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        StorageError::TooLarge {
            limit: MAX_UPLOAD_BYTES,
        }
    } else {
        StorageError::MalformedUpload(err.body_text())
    }
}

/// `host[:port]` the client addressed: `Host` header, then the URI authority
/// (HTTP/2), then `localhost`.
fn request_authority(headers: &HeaderMap, uri: &Uri) -> String {
    headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| uri.authority().map(|a| a.as_str().to_string()))
        .unwrap_or_else(|| "localhost".into())
}

fn set_download_headers(headers: &mut HeaderMap, record: &StoredFile, len: u64) {
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/pdf"),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));

    if let Ok(value) = HeaderValue::from_str(&content_disposition(&record.filename)) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    if let Ok(value) = HeaderValue::from_str(&format!("\"{}\"", record.etag)) {
        headers.insert(header::ETAG, value);
    }

    let last_modified = record
        .uploaded_at
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string();
    if let Ok(value) = HeaderValue::from_str(&last_modified) {
        headers.insert(header::LAST_MODIFIED, value);
    }
}

/// `attachment` disposition for `filename`.
///
/// Names that survive percent-encoding untouched go in a quoted `filename`;
/// anything else uses the RFC 5987 `filename*` form.
fn content_disposition(filename: &str) -> String {
    let encoded = urlencoding::encode(filename);
    if encoded == filename {
        format!("attachment; filename=\"{}\"", filename)
    } else {
        format!("attachment; filename*=utf-8''{}", encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        routes::routes::app,
        services::{address_resolver::StaticAddressResolver, qr_service},
    };
    use axum_test::{
        TestServer,
        multipart::{MultipartForm, Part},
    };
    use std::{
        net::{IpAddr, Ipv4Addr},
        sync::Arc,
    };
    use tempfile::TempDir;

    const PDF: &[u8] = b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog >>\nendobj\ntrailer\n%%EOF\n";

    fn setup() -> (TestServer, StorageService, TempDir) {
        let dir = TempDir::new().unwrap();
        let resolver = StaticAddressResolver(Some(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20))));
        let service = StorageService::new(dir.path(), Arc::new(resolver));
        let origins = vec!["http://localhost:5173".to_string()];
        let server = TestServer::new(app(service.clone(), &origins)).unwrap();
        (server, service, dir)
    }

    fn pdf_form(name: &str, bytes: Vec<u8>) -> MultipartForm {
        MultipartForm::new().add_part(
            "file",
            Part::bytes(bytes).file_name(name).mime_type("application/pdf"),
        )
    }

    async fn upload(server: &TestServer, name: &str, bytes: Vec<u8>) -> axum_test::TestResponse {
        server
            .post("/api/upload")
            .add_header(header::HOST, HeaderValue::from_static("localhost:8000"))
            .multipart(pdf_form(name, bytes))
            .await
    }

    fn stored_files(dir: &TempDir) -> usize {
        std::fs::read_dir(dir.path()).map(|d| d.count()).unwrap_or(0)
    }

    fn detail(response: &axum_test::TestResponse) -> String {
        response.json::<serde_json::Value>()["detail"]
            .as_str()
            .unwrap_or_default()
            .to_string()
    }

    #[tokio::test]
    async fn upload_then_download_returns_identical_bytes() {
        let (server, _service, dir) = setup();

        let response = upload(&server, "Quarterly Report.pdf", PDF.to_vec()).await;
        response.assert_status(StatusCode::OK);
        let body: UploadResponse = response.json();
        assert!(body.success);
        assert_eq!(body.filename, "Quarterly Report.pdf");
        assert_eq!(body.file_size, PDF.len() as u64);
        assert!(body.download_url.starts_with("http://192.168.1.20"));
        assert!(body.download_url.ends_with(&format!("/api/files/{}", body.file_id)));
        assert_eq!(stored_files(&dir), 1);
        assert!(dir.path().join(format!("{}.pdf", body.file_id)).exists());

        let download = server.get(&format!("/api/files/{}", body.file_id)).await;
        download.assert_status(StatusCode::OK);
        assert_eq!(&download.as_bytes()[..], PDF);
        assert_eq!(download.header(header::CONTENT_TYPE), "application/pdf");
        assert_eq!(
            download.header(header::CONTENT_DISPOSITION),
            "attachment; filename*=utf-8''Quarterly%20Report.pdf"
        );
        assert_eq!(
            download.header(header::ETAG).to_str().unwrap(),
            format!("\"{:x}\"", md5::compute(PDF))
        );
    }

    #[tokio::test]
    async fn qr_code_encodes_download_url() {
        let (server, _service, _dir) = setup();

        let body: UploadResponse = upload(&server, "a.pdf", PDF.to_vec()).await.json();
        let png = qr_service::decode_data_uri(&body.qr_code).expect("png data uri");
        assert_eq!(
            qr_service::scan_png(&png).as_deref(),
            Some(body.download_url.as_str())
        );
    }

    #[tokio::test]
    async fn non_pdf_name_is_rejected_without_writing() {
        let (server, service, dir) = setup();

        let response = upload(&server, "notes.txt", PDF.to_vec()).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(
            detail(&response),
            "Only PDF files are allowed. Please upload a .pdf file."
        );
        assert_eq!(stored_files(&dir), 0);
        assert_eq!(service.index.len(), 0);
    }

    #[tokio::test]
    async fn empty_upload_is_rejected() {
        let (server, _service, dir) = setup();

        let response = upload(&server, "empty.pdf", Vec::new()).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(detail(&response), "Uploaded file is empty.");
        assert_eq!(stored_files(&dir), 0);
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let (server, _service, dir) = setup();

        let bytes = vec![b'0'; MAX_UPLOAD_BYTES as usize + 1];
        let response = upload(&server, "huge.pdf", bytes).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(detail(&response), "File too large. Maximum size is 10 MB.");
        assert_eq!(stored_files(&dir), 0);
    }

    #[tokio::test]
    async fn missing_file_field_is_rejected() {
        let (server, _service, _dir) = setup();

        let response = server
            .post("/api/upload")
            .multipart(MultipartForm::new().add_text("note", "hello"))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(detail(&response), "No file provided. Use the `file` field.");
    }

    #[tokio::test]
    async fn delete_then_download_and_delete_again_are_not_found() {
        let (server, _service, dir) = setup();
        let body: UploadResponse = upload(&server, "a.pdf", PDF.to_vec()).await.json();
        let path = format!("/api/files/{}", body.file_id);

        let deleted = server.delete(&path).await;
        deleted.assert_status(StatusCode::OK);
        let deleted: DeleteResponse = deleted.json();
        assert!(deleted.success);
        assert_eq!(deleted.message, "File deleted successfully.");
        assert_eq!(stored_files(&dir), 0);

        let download = server.get(&path).await;
        download.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(detail(&download), "File not found or has expired.");

        let again = server.delete(&path).await;
        again.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(detail(&again), "File not found.");
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let (server, _service, _dir) = setup();

        server
            .get(&format!("/api/files/{}", uuid::Uuid::new_v4()))
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .get("/api/files/not-a-uuid")
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .delete(&format!("/api/files/{}", uuid::Uuid::new_v4()))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn missing_backing_file_prunes_record() {
        let (server, service, dir) = setup();
        let body: UploadResponse = upload(&server, "a.pdf", PDF.to_vec()).await.json();
        let path = format!("/api/files/{}", body.file_id);

        std::fs::remove_file(dir.path().join(format!("{}.pdf", body.file_id))).unwrap();

        server.get(&path).await.assert_status(StatusCode::NOT_FOUND);
        assert!(service.index.get(&body.file_id).is_none());
        server.delete(&path).await.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cors_allows_configured_origin_only() {
        let (server, _service, _dir) = setup();

        let allowed = server
            .get("/api/health")
            .add_header(header::ORIGIN, HeaderValue::from_static("http://localhost:5173"))
            .await;
        assert_eq!(
            allowed.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN),
            Some(&HeaderValue::from_static("http://localhost:5173"))
        );

        let denied = server
            .get("/api/health")
            .add_header(header::ORIGIN, HeaderValue::from_static("http://evil.example"))
            .await;
        assert!(denied.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }

    #[test]
    fn content_disposition_forms() {
        assert_eq!(
            content_disposition("report.pdf"),
            "attachment; filename=\"report.pdf\""
        );
        assert_eq!(
            content_disposition("résumé.pdf"),
            "attachment; filename*=utf-8''r%C3%A9sum%C3%A9.pdf"
        );
        assert_eq!(
            content_disposition("a\"b.pdf"),
            "attachment; filename*=utf-8''a%22b.pdf"
        );
    }

    #[test]
    fn authority_prefers_host_header() {
        let mut headers = HeaderMap::new();
        let uri: Uri = "http://example.org:9000/api/upload".parse().unwrap();
        assert_eq!(request_authority(&headers, &uri), "example.org:9000");

        headers.insert(header::HOST, HeaderValue::from_static("localhost:8000"));
        assert_eq!(request_authority(&headers, &uri), "localhost:8000");

        let relative: Uri = "/api/upload".parse().unwrap();
        assert_eq!(request_authority(&HeaderMap::new(), &relative), "localhost");
    }
}
