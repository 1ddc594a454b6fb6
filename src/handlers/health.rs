use actix_web::{web, HttpResponse, Result};
use std::sync::atomic::Ordering;

use crate::models::{CacheStatsResponse, ErrorResponse, HealthResponse};
use crate::AppState;

pub async fn health_check(state: web::Data<AppState>) -> Result<HttpResponse> {
    let stats = state.tomography.cache().stats();

    let response = HealthResponse {
        status: "healthy".to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        cache: CacheStatsResponse {
            requests: stats.total_requests.load(Ordering::Relaxed),
            hits: stats.hits.load(Ordering::Relaxed),
            misses: stats.misses.load(Ordering::Relaxed),
            failures: stats.failures.load(Ordering::Relaxed),
        },
    };

    Ok(HttpResponse::Ok().json(response))
}

pub async fn not_found() -> Result<HttpResponse> {
    Ok(HttpResponse::NotFound().json(ErrorResponse::new("Endpoint not found")))
}

#[cfg(test)]
mod tests {
    use actix_web::test as actix_test;

    use crate::handlers::test_support;

    #[actix_web::test]
    async fn reports_version_and_cache_counters() {
        let tmp = tempfile::tempdir().unwrap();
        let app = actix_test::init_service(test_support::app(test_support::state(tmp.path()))).await;

        let req = actix_test::TestRequest::get().uri("/api/health").to_request();
        let body: serde_json::Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(body["cache"]["misses"], 0);
    }

    #[actix_web::test]
    async fn counts_cached_and_computed_requests() {
        let tmp = tempfile::tempdir().unwrap();
        let app = actix_test::init_service(test_support::app(test_support::state(tmp.path()))).await;

        for _ in 0..2 {
            let req = actix_test::TestRequest::get()
                .uri("/_reconstruct_buzmakov?sinogram_mode=phantom&size=8&angles=4")
                .to_request();
            assert!(actix_test::call_service(&app, req).await.status().is_success());
        }

        let req = actix_test::TestRequest::get().uri("/api/health").to_request();
        let body: serde_json::Value = actix_test::call_and_read_body_json(&app, req).await;
        // phantom and SART are computed once each, the second reconstruct is a hit
        assert_eq!(body["cache"]["misses"], 2);
        assert_eq!(body["cache"]["hits"], 1);
        assert_eq!(body["cache"]["requests"], 3);
    }

    #[actix_web::test]
    async fn unknown_route_is_json_404() {
        let tmp = tempfile::tempdir().unwrap();
        let app = actix_test::init_service(test_support::app(test_support::state(tmp.path()))).await;

        let req = actix_test::TestRequest::get().uri("/nope").to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 404);
    }
}
