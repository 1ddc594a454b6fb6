use actix_web::{web, HttpResponse};
use std::io::ErrorKind;

use crate::error::AppError;
use crate::services::ContentId;
use crate::AppState;

fn is_entry_name(entry: &str) -> bool {
    if ContentId::parse(entry).is_ok() {
        return true;
    }
    let Some(rest) = entry.strip_prefix("sh_l_size_") else {
        return false;
    };
    match rest.split_once("_ang_") {
        Some((size, angles)) => {
            !size.is_empty()
                && !angles.is_empty()
                && size.chars().all(|c| c.is_ascii_digit())
                && angles.chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}

fn is_artifact_name(file: &str) -> bool {
    !file.is_empty()
        && !file.starts_with('.')
        && file
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

fn content_type_for(file: &str) -> &'static str {
    match file.rsplit_once('.').map(|(_, ext)| ext) {
        Some("png") => "image/png",
        Some("tif") | Some("tiff") => "image/tiff",
        Some("txt") => "text/plain; charset=utf-8",
        Some("yaml") | Some("yml") => "application/yaml",
        _ => "application/octet-stream",
    }
}

/// Serves a stored artifact, e.g. `/static/data/sh_l_size_32_ang_16/phantom.png`.
pub async fn serve_artifact(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, AppError> {
    let (entry, file) = path.into_inner();
    if !is_entry_name(&entry) || !is_artifact_name(&file) {
        return Err(AppError::NotFound(format!("{}/{}", entry, file)));
    }

    let full_path = state.tomography.cache().root().join(&entry).join(&file);
    let data = match tokio::fs::read(&full_path).await {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(AppError::NotFound(format!("{}/{}", entry, file)))
        }
        Err(e) => return Err(e.into()),
    };

    Ok(HttpResponse::Ok()
        .content_type(content_type_for(&file))
        .body(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test as actix_test;

    use crate::handlers::test_support;

    #[test]
    fn entry_names() {
        assert!(is_entry_name("sh_l_size_32_ang_16"));
        assert!(is_entry_name("aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d"));
        assert!(!is_entry_name("sh_l_size__ang_16"));
        assert!(!is_entry_name("sh_l_size_32_ang_x"));
        assert!(!is_entry_name(".."));
    }

    #[test]
    fn artifact_names() {
        assert!(is_artifact_name("result_result.tiff"));
        assert!(!is_artifact_name(".work-123"));
        assert!(!is_artifact_name("a b"));
        assert_eq!(content_type_for("phantom.png"), "image/png");
        assert_eq!(content_type_for("ang.txt"), "text/plain; charset=utf-8");
    }

    #[actix_web::test]
    async fn serves_generated_files() {
        let tmp = tempfile::tempdir().unwrap();
        let app = actix_test::init_service(test_support::app(test_support::state(tmp.path()))).await;

        let req = actix_test::TestRequest::get()
            .uri("/_build_phantom?size=8&angles=4")
            .to_request();
        assert!(actix_test::call_service(&app, req).await.status().is_success());

        let req = actix_test::TestRequest::get()
            .uri("/static/data/sh_l_size_8_ang_4/phantom.png")
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert!(resp.status().is_success());
        assert_eq!(
            resp.headers().get("content-type").unwrap(),
            "image/png"
        );
        let body = actix_test::read_body(resp).await;
        assert_eq!(&body[..4], b"\x89PNG");
    }

    #[actix_web::test]
    async fn unknown_files_are_404() {
        let tmp = tempfile::tempdir().unwrap();
        let app = actix_test::init_service(test_support::app(test_support::state(tmp.path()))).await;

        for uri in [
            "/static/data/sh_l_size_8_ang_4/phantom.png",
            "/static/data/etc/passwd",
        ] {
            let resp = actix_test::call_service(&app, actix_test::TestRequest::get().uri(uri).to_request()).await;
            assert_eq!(resp.status().as_u16(), 404);
        }
    }
}
