use actix_web::{web, HttpResponse};
use validator::Validate;

use crate::error::AppError;
use crate::models::{PhantomQuery, PhantomResponse};
use crate::services::ArtifactRole;
use crate::AppState;

pub async fn build_phantom(
    state: web::Data<AppState>,
    query: web::Query<PhantomQuery>,
) -> Result<HttpResponse, AppError> {
    query
        .validate()
        .map_err(|e| AppError::InvalidParameter(format!("Validation error: {}", e)))?;

    let tomography = &state.tomography;
    let paths = tomography.build_phantom(query.size, query.angles).await?;

    Ok(HttpResponse::Ok().json(PhantomResponse {
        phantom_file: tomography.public_url_for(&paths, ArtifactRole::PrimaryData)?,
        phantom_image: tomography.public_url_for(&paths, ArtifactRole::PrimaryImage)?,
        sinogramm_file: tomography.public_url_for(&paths, ArtifactRole::SecondaryData)?,
        sinogramm_image: tomography.public_url_for(&paths, ArtifactRole::SecondaryImage)?,
    }))
}

#[cfg(test)]
mod tests {
    use actix_web::test as actix_test;
    use rstest::rstest;

    use crate::handlers::test_support;
    use crate::models::PhantomResponse;

    #[actix_web::test]
    async fn returns_root_relative_paths() {
        let tmp = tempfile::tempdir().unwrap();
        let app = actix_test::init_service(test_support::app(test_support::state(tmp.path()))).await;

        let req = actix_test::TestRequest::get()
            .uri("/_build_phantom?size=16&angles=8")
            .to_request();
        let body: PhantomResponse = actix_test::call_and_read_body_json(&app, req).await;

        assert_eq!(body.phantom_file, "/static/data/sh_l_size_16_ang_8/phantom.txt");
        assert_eq!(body.phantom_image, "/static/data/sh_l_size_16_ang_8/phantom.png");
        assert_eq!(body.sinogramm_file, "/static/data/sh_l_size_16_ang_8/sinogramm.txt");
        assert_eq!(body.sinogramm_image, "/static/data/sh_l_size_16_ang_8/sinogramm.png");
        assert!(tmp.path().join("sh_l_size_16_ang_8/ang.txt").is_file());
    }

    #[rstest]
    #[case("/_build_phantom?size=0&angles=8")]
    #[case("/_build_phantom?size=16&angles=0")]
    #[case("/_build_phantom?size=-1&angles=8")]
    #[case("/_build_phantom?size=16")]
    #[case("/_build_phantom?size=abc&angles=8")]
    #[case("/_build_phantom?size=100000&angles=8")]
    #[actix_web::test]
    async fn rejects_bad_parameters(#[case] uri: &str) {
        let tmp = tempfile::tempdir().unwrap();
        let app = actix_test::init_service(test_support::app(test_support::state(tmp.path()))).await;

        let req = actix_test::TestRequest::get().uri(uri).to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 400);
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }
}
