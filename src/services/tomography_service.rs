use bytes::Bytes;
use std::path::{Component, Path};
use tracing::{info, warn};

use crate::config::{ReconstructionConfig, StorageConfig};
use crate::error::{AppError, AppResult};
use crate::imaging::{self, Grid, SartParams};
use crate::services::{
    ArtifactCache, ArtifactPaths, ArtifactRole, ContentId, ExternalReconstructor,
    PhantomProducer, SartProducer, StorageKey, UploadedSinogramProducer, EXTERNAL_LAYOUT,
    PHANTOM_LAYOUT, SART_LAYOUT, SINOGRAM_LAYOUT,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// SART running inside this process.
    InProcess,
    /// The native reconstructor binary.
    External,
}

#[derive(Debug, Clone)]
pub struct ImportedSinogram {
    pub id: ContentId,
    pub detectors: usize,
    pub angles: usize,
    pub paths: ArtifactPaths,
}

/// Request-level workflows on top of the artifact cache.
#[derive(Clone)]
pub struct TomographyService {
    cache: ArtifactCache,
    reconstruction: ReconstructionConfig,
    public_prefix: String,
}

impl TomographyService {
    pub fn new(
        cache: ArtifactCache,
        storage: &StorageConfig,
        reconstruction: ReconstructionConfig,
    ) -> Self {
        Self {
            cache,
            reconstruction,
            public_prefix: storage.public_prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn cache(&self) -> &ArtifactCache {
        &self.cache
    }

    pub async fn build_phantom(&self, size: u32, angles: u32) -> AppResult<ArtifactPaths> {
        let key = StorageKey::params(size, angles);
        self.cache
            .get_or_compute(&key, &PhantomProducer { size, angles })
            .await
    }

    pub async fn import_sinogram(&self, payload: Bytes) -> AppResult<ImportedSinogram> {
        if payload.is_empty() {
            return Err(AppError::InvalidPayload("Nothing uploaded".to_string()));
        }
        let (id, _) = self.cache.path_key().directory_for_content(&payload);
        let producer = UploadedSinogramProducer::parse(payload)?;
        let (detectors, angles) = (producer.sinogram().rows(), producer.sinogram().cols());

        let paths = self
            .cache
            .get_or_compute(&StorageKey::Content(id.clone()), &producer)
            .await?;
        info!(
            "Sinogram {} ({} x {}) is {}",
            id,
            detectors,
            angles,
            paths.status.as_str()
        );
        Ok(ImportedSinogram {
            id,
            detectors,
            angles,
            paths,
        })
    }

    pub async fn reconstruct(&self, key: &StorageKey, backend: Backend) -> AppResult<ArtifactPaths> {
        let layout = match backend {
            Backend::InProcess => SART_LAYOUT,
            Backend::External => EXTERNAL_LAYOUT,
        };
        if let Some(hit) = self.cache.find(key, layout).await {
            return Ok(hit);
        }

        match backend {
            Backend::InProcess => {
                let (sinogram, angles) = self.load_sinogram(key).await?;
                let producer = SartProducer {
                    sinogram,
                    angles,
                    params: SartParams {
                        iterations: self.reconstruction.sart_iterations,
                        relaxation: self.reconstruction.sart_relaxation,
                    },
                };
                self.cache.get_or_compute(key, &producer).await
            }
            Backend::External => {
                self.ensure_sinogram(key).await?;
                let producer = ExternalReconstructor::from_config(&self.reconstruction);
                self.cache.get_or_compute(key, &producer).await
            }
        }
    }

    /// Makes sure the sinogram inputs of `key` exist. Parameter keys are
    /// generated on demand; content keys must have been uploaded.
    async fn ensure_sinogram(&self, key: &StorageKey) -> AppResult<ArtifactPaths> {
        match key {
            StorageKey::Params { size, angles } => self.build_phantom(*size, *angles).await,
            StorageKey::Content(id) => self
                .cache
                .lookup(key, SINOGRAM_LAYOUT)
                .await
                .ok_or_else(|| AppError::NotFound(format!("no sinogram uploaded with id {}", id))),
        }
    }

    async fn load_sinogram(&self, key: &StorageKey) -> AppResult<(Grid, Vec<f32>)> {
        let paths = self.ensure_sinogram(key).await?;
        match self.parse_sinogram(&paths).await {
            Ok(loaded) => Ok(loaded),
            Err(reason) => match key {
                StorageKey::Params { size, angles } => {
                    warn!("Cached sinogram for {} is unreadable ({}), regenerating", key, reason);
                    self.cache.invalidate(key, PHANTOM_LAYOUT).await?;
                    let paths = self.build_phantom(*size, *angles).await?;
                    self.parse_sinogram(&paths).await.map_err(|reason| {
                        AppError::Computation(format!(
                            "regenerated sinogram for {} is unreadable: {}",
                            key, reason
                        ))
                    })
                }
                StorageKey::Content(id) => Err(AppError::Computation(format!(
                    "stored sinogram {} is unreadable: {}",
                    id, reason
                ))),
            },
        }
    }

    /// Parses sinogram and angles; the error string explains what is wrong.
    async fn parse_sinogram(&self, paths: &ArtifactPaths) -> Result<(Grid, Vec<f32>), String> {
        let sinogram = imaging::parse_matrix(&self.read_text(paths, ArtifactRole::SecondaryData).await?)
            .map_err(|e| format!("sinogram: {}", e))?;
        let angles = imaging::parse_matrix(&self.read_text(paths, ArtifactRole::Angles).await?)
            .map_err(|e| format!("angles: {}", e))?;
        if angles.cols() != 1 || angles.rows() != sinogram.cols() {
            return Err(format!(
                "{} angles for a sinogram with {} columns",
                angles.rows() * angles.cols(),
                sinogram.cols()
            ));
        }
        Ok((sinogram, angles.column(0)))
    }

    async fn read_text(&self, paths: &ArtifactPaths, role: ArtifactRole) -> Result<String, String> {
        let path = paths.require(role).map_err(|e| e.to_string())?;
        let raw = self.cache.read(path).await.map_err(|e| e.to_string())?;
        String::from_utf8(raw.to_vec()).map_err(|_| format!("{} is not UTF-8", path.display()))
    }

    /// Root-relative URL under which `path` is served.
    pub fn public_url(&self, path: &Path) -> AppResult<String> {
        let relative = path.strip_prefix(self.cache.root()).map_err(|_| {
            AppError::Storage(format!("{} is outside the storage root", path.display()))
        })?;
        let mut url = self.public_prefix.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => {
                    url.push('/');
                    url.push_str(&part.to_string_lossy());
                }
                _ => {
                    return Err(AppError::Storage(format!(
                        "unexpected path component in {}",
                        path.display()
                    )))
                }
            }
        }
        Ok(url)
    }

    pub fn public_url_for(&self, paths: &ArtifactPaths, role: ArtifactRole) -> AppResult<String> {
        self.public_url(paths.require(role)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::services::CacheStatus;
    use std::sync::atomic::Ordering;

    fn service(root: &Path) -> TomographyService {
        let mut config = Config::default();
        config.storage.root = root.to_path_buf();
        config.reconstruction.sart_iterations = 2;
        TomographyService::new(
            ArtifactCache::new(root),
            &config.storage,
            config.reconstruction,
        )
    }

    #[tokio::test]
    async fn phantom_end_to_end() {
        let tmp = tempfile::tempdir().unwrap();
        let service = service(tmp.path());

        let first = service.build_phantom(32, 16).await.unwrap();
        let second = service.build_phantom(32, 16).await.unwrap();

        let data = first.require(ArtifactRole::PrimaryData).unwrap();
        assert!(data.ends_with("sh_l_size_32_ang_16/phantom.txt"));
        assert_eq!(first.status, CacheStatus::Computed);
        assert_eq!(second.status, CacheStatus::Hit);
        assert_eq!(second.require(ArtifactRole::PrimaryData).unwrap(), data);
        assert_eq!(
            service.public_url(data).unwrap(),
            "/static/data/sh_l_size_32_ang_16/phantom.txt"
        );
        assert_eq!(service.cache().stats().misses.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn sart_reconstruction_generates_missing_inputs() {
        let tmp = tempfile::tempdir().unwrap();
        let service = service(tmp.path());
        let key = StorageKey::params(16, 8);

        let result = service.reconstruct(&key, Backend::InProcess).await.unwrap();
        assert_eq!(result.status, CacheStatus::Computed);
        assert!(tmp.path().join("sh_l_size_16_ang_8/phantom.txt").is_file());

        let image = result.require(ArtifactRole::PrimaryImage).unwrap();
        assert_eq!(image.file_name().unwrap(), "reconst_buzmakov.png");

        let hits_before = service.cache().stats().hits.load(Ordering::Relaxed);
        let again = service.reconstruct(&key, Backend::InProcess).await.unwrap();
        assert_eq!(again.status, CacheStatus::Hit);
        assert_eq!(
            service.cache().stats().hits.load(Ordering::Relaxed),
            hits_before + 1
        );
    }

    #[tokio::test]
    async fn corrupt_generated_sinogram_is_rebuilt() {
        let tmp = tempfile::tempdir().unwrap();
        let service = service(tmp.path());
        let paths = service.build_phantom(16, 4).await.unwrap();
        let sinogram = paths.require(ArtifactRole::SecondaryData).unwrap();
        std::fs::write(sinogram, "1 2\nnot numbers\n").unwrap();

        let result = service
            .reconstruct(&StorageKey::params(16, 4), Backend::InProcess)
            .await
            .unwrap();
        assert_eq!(result.status, CacheStatus::Computed);

        let text = std::fs::read_to_string(sinogram).unwrap();
        assert!(imaging::parse_matrix(&text).is_ok());
    }

    #[tokio::test]
    async fn uploads_are_content_addressed() {
        let tmp = tempfile::tempdir().unwrap();
        let service = service(tmp.path());
        let payload = Bytes::from_static(b"0 1 0\n1 2 1\n0 1 0\n1 2 1\n");

        let first = service.import_sinogram(payload.clone()).await.unwrap();
        let second = service.import_sinogram(payload).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!((first.detectors, first.angles), (4, 3));
        assert_eq!(second.paths.status, CacheStatus::Hit);
        assert_eq!(first.paths.directory, tmp.path().join(first.id.as_str()));

        let key = StorageKey::Content(first.id.clone());
        let result = service.reconstruct(&key, Backend::InProcess).await.unwrap();
        assert!(result.require(ArtifactRole::PrimaryData).unwrap().is_file());
    }

    #[tokio::test]
    async fn unknown_upload_id_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let service = service(tmp.path());
        let key = StorageKey::Content(ContentId::of(b"never uploaded"));

        for backend in [Backend::InProcess, Backend::External] {
            let err = service.reconstruct(&key, backend).await.unwrap_err();
            assert!(matches!(err, AppError::NotFound(_)));
        }
    }

    #[tokio::test]
    async fn empty_and_malformed_uploads_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let service = service(tmp.path());
        assert!(matches!(
            service.import_sinogram(Bytes::new()).await,
            Err(AppError::InvalidPayload(_))
        ));
        assert!(matches!(
            service.import_sinogram(Bytes::from_static(b"1 2\n3\n")).await,
            Err(AppError::InvalidPayload(_))
        ));
        assert!(matches!(
            service.import_sinogram(Bytes::from("0\n".repeat(100_000))).await,
            Err(AppError::InvalidPayload(_))
        ));
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn external_failure_leaves_no_result() {
        let tmp = tempfile::tempdir().unwrap();
        let mut service = service(tmp.path());
        service.reconstruction.binary_path = tmp.path().join("missing-binary");
        let key = StorageKey::params(8, 4);

        let err = service.reconstruct(&key, Backend::External).await.unwrap_err();
        assert!(matches!(err, AppError::ExternalProcess { .. }));
        assert!(service.cache().lookup(&key, EXTERNAL_LAYOUT).await.is_none());
        // inputs were still generated
        assert!(service.cache().lookup(&key, PHANTOM_LAYOUT).await.is_some());
    }

    #[test]
    fn public_url_rejects_paths_outside_root() {
        let tmp = tempfile::tempdir().unwrap();
        let service = service(tmp.path());
        assert!(service.public_url(Path::new("/etc/passwd")).is_err());
    }
}
