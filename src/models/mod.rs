use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Largest detector count accepted, for phantoms and uploads alike.
pub const MAX_SIZE: u32 = 2048;
/// Largest number of projection angles accepted.
pub const MAX_ANGLES: u32 = 3600;

// Range literals below must match MAX_SIZE and MAX_ANGLES.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PhantomQuery {
    #[validate(range(min = 1, max = 2048))]
    pub size: u32,
    #[validate(range(min = 1, max = 3600))]
    pub angles: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinogramMode {
    Phantom,
    Upload,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReconstructQuery {
    pub sinogram_mode: SinogramMode,
    pub size: Option<u32>,
    pub angles: Option<u32>,
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadQuery {
    pub filename: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhantomResponse {
    pub phantom_file: String,
    pub phantom_image: String,
    pub sinogramm_file: String,
    pub sinogramm_image: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconstructResponse {
    pub image: String,
    pub status: String,
    pub link: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub id: String,
    pub sinogramm_file: String,
    pub sinogramm_image: String,
    pub size: usize,
    pub angles: usize,
    pub bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStatsResponse {
    pub requests: u64,
    pub hits: u64,
    pub misses: u64,
    pub failures: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_seconds: u64,
    pub version: String,
    pub cache: CacheStatsResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
            timestamp: Utc::now(),
        }
    }
}
