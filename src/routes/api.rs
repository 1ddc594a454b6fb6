use crate::error::AppError;
use crate::handlers;
use actix_web::{web, Scope};

pub fn health_scope() -> Scope {
    web::scope("/api").route("/health", web::get().to(handlers::health_check))
}

/// Registers every route. `public_prefix` is where stored artifacts are served.
pub fn config(cfg: &mut web::ServiceConfig, public_prefix: &str) {
    cfg.app_data(web::QueryConfig::default().error_handler(|err, _req| {
        AppError::InvalidParameter(err.to_string()).into()
    }))
    .service(health_scope())
    .route("/", web::get().to(handlers::index))
    .route("/index.html", web::get().to(handlers::index))
    .route("/about.html", web::get().to(handlers::about))
    .route("/_build_phantom", web::get().to(handlers::build_phantom))
    .route(
        "/_reconstruct_buzmakov",
        web::get().to(handlers::reconstruct_buzmakov),
    )
    .route("/_reconstruct_prun", web::get().to(handlers::reconstruct_prun))
    .route("/_upload_sinogram", web::post().to(handlers::upload_sinogram))
    .route(
        &format!("{}/{{entry}}/{{file}}", public_prefix.trim_end_matches('/')),
        web::get().to(handlers::serve_artifact),
    )
    .default_service(web::route().to(handlers::not_found));
}
