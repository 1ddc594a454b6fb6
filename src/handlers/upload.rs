use actix_multipart::Multipart;
use actix_web::{http::header, web, HttpRequest, HttpResponse};
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};

use crate::error::AppError;
use crate::models::{UploadQuery, UploadResponse};
use crate::services::ArtifactRole;
use crate::AppState;

/// Lets the upload form address the stored sinogram without parsing HTML.
pub const SINOGRAM_ID_HEADER: &str = "x-sinogram-id";

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn wants_json(req: &HttpRequest) -> bool {
    req.headers()
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|value| value.contains("application/json"))
        .unwrap_or(false)
}

fn content_type(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
}

fn is_multipart(req: &HttpRequest) -> bool {
    content_type(req)
        .map(|value| value.starts_with("multipart/form-data"))
        .unwrap_or(false)
}

struct UploadedFile {
    name: Option<String>,
    content_type: Option<String>,
    data: Bytes,
}

/// Collects a body stream, failing as soon as it grows past `limit` bytes.
async fn read_limited<S, E>(stream: S, limit: usize) -> Result<Bytes, AppError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: std::fmt::Display,
{
    let mut stream = std::pin::pin!(stream);
    let mut buf = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk
            .map_err(|e| AppError::InvalidPayload(format!("upload interrupted: {}", e)))?;
        if buf.len() + chunk.len() > limit {
            return Err(AppError::PayloadTooLarge(limit));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}

/// Takes the `file` field of a browser form post; other fields are ignored.
async fn read_form_file(
    req: &HttpRequest,
    payload: web::Payload,
    limit: usize,
) -> Result<UploadedFile, AppError> {
    let mut form = Multipart::new(req.headers(), payload);
    while let Some(field) = form.next().await {
        let field = field
            .map_err(|e| AppError::InvalidPayload(format!("malformed form upload: {}", e)))?;
        let (is_file, name) = {
            let disposition = field.content_disposition();
            (
                disposition.get_name() == Some("file"),
                disposition.get_filename().map(str::to_string),
            )
        };
        if !is_file {
            continue;
        }
        let content_type = field.content_type().map(|mime| mime.to_string());
        let data = read_limited(field, limit).await?;
        return Ok(UploadedFile {
            name,
            content_type,
            data,
        });
    }
    Err(AppError::InvalidPayload(
        "Bad upload: the form has no file field".to_string(),
    ))
}

/// Stores an uploaded sinogram under its content hash. The body is either
/// the raw sinogram text or a multipart form with a `file` field. Answers
/// with an HTML status fragment for the upload form, or JSON when asked.
pub async fn upload_sinogram(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<UploadQuery>,
    payload: web::Payload,
) -> Result<HttpResponse, AppError> {
    let limit = state.config.server.max_upload_bytes;
    let upload = if is_multipart(&req) {
        read_form_file(&req, payload, limit).await?
    } else {
        UploadedFile {
            name: query.filename.clone(),
            content_type: content_type(&req).map(str::to_string),
            data: read_limited(payload, limit).await?,
        }
    };

    let size = upload.data.len();
    let file_name = upload
        .name
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "sinogram".to_string());
    let file_type = upload
        .content_type
        .unwrap_or_else(|| "application/octet-stream".to_string());

    let tomography = &state.tomography;
    let imported = tomography.import_sinogram(upload.data).await?;
    let sinogramm_file = tomography.public_url_for(&imported.paths, ArtifactRole::SecondaryData)?;
    let sinogramm_image = tomography.public_url_for(&imported.paths, ArtifactRole::SecondaryImage)?;
    let id = imported.id.to_string();

    if wants_json(&req) {
        return Ok(HttpResponse::Ok()
            .insert_header((SINOGRAM_ID_HEADER, id.as_str()))
            .json(UploadResponse {
                id: id.clone(),
                sinogramm_file,
                sinogramm_image,
                size: imported.detectors,
                angles: imported.angles,
                bytes: size,
            }));
    }

    let html = format!(
        "Uploaded file {} ({}) - {}B<br>Sinogram {} x {} stored as <code>{}</code><br><img src=\"{}\">",
        escape_html(&file_name),
        escape_html(&file_type),
        size,
        imported.detectors,
        imported.angles,
        id,
        sinogramm_image,
    );
    Ok(HttpResponse::Ok()
        .insert_header((SINOGRAM_ID_HEADER, id.as_str()))
        .content_type("text/html; charset=utf-8")
        .body(html))
}
