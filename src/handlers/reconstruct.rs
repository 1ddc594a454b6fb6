use actix_web::{web, HttpResponse};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{PhantomQuery, ReconstructQuery, ReconstructResponse, SinogramMode};
use crate::services::{ArtifactRole, Backend, ContentId, StorageKey};
use crate::AppState;

/// Which cache entry holds the sinogram the client wants reconstructed.
pub fn source_key(query: &ReconstructQuery) -> AppResult<StorageKey> {
    match query.sinogram_mode {
        SinogramMode::Phantom => {
            let (size, angles) = match (query.size, query.angles) {
                (Some(size), Some(angles)) => (size, angles),
                _ => {
                    return Err(AppError::InvalidParameter(
                        "size and angles are required for phantom sinograms".to_string(),
                    ))
                }
            };
            PhantomQuery { size, angles }
                .validate()
                .map_err(|e| AppError::InvalidParameter(format!("Validation error: {}", e)))?;
            Ok(StorageKey::params(size, angles))
        }
        SinogramMode::Upload => {
            let id = query.id.as_deref().ok_or_else(|| {
                AppError::InvalidParameter("id is required for uploaded sinograms".to_string())
            })?;
            Ok(StorageKey::Content(ContentId::parse(id)?))
        }
    }
}

async fn reconstruct_with(
    state: &AppState,
    query: &ReconstructQuery,
    backend: Backend,
) -> Result<HttpResponse, AppError> {
    let key = source_key(query)?;
    let tomography = &state.tomography;
    let paths = tomography.reconstruct(&key, backend).await?;

    Ok(HttpResponse::Ok().json(ReconstructResponse {
        image: tomography.public_url_for(&paths, ArtifactRole::PrimaryImage)?,
        status: paths.status.as_str().to_string(),
        link: tomography.public_url_for(&paths, ArtifactRole::PrimaryData)?,
    }))
}

pub async fn reconstruct_buzmakov(
    state: web::Data<AppState>,
    query: web::Query<ReconstructQuery>,
) -> Result<HttpResponse, AppError> {
    reconstruct_with(&state, &query, Backend::InProcess).await
}

pub async fn reconstruct_prun(
    state: web::Data<AppState>,
    query: web::Query<ReconstructQuery>,
) -> Result<HttpResponse, AppError> {
    reconstruct_with(&state, &query, Backend::External).await
}
