use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::repositories::{ArtifactRepo, KeyLocks};
use crate::services::{PathKey, StorageKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactRole {
    PrimaryImage,
    PrimaryData,
    SecondaryImage,
    SecondaryData,
    Angles,
}

impl ArtifactRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactRole::PrimaryImage => "primary_image",
            ArtifactRole::PrimaryData => "primary_data",
            ArtifactRole::SecondaryImage => "secondary_image",
            ArtifactRole::SecondaryData => "secondary_data",
            ArtifactRole::Angles => "angles",
        }
    }
}

/// Where one role lives inside an entry directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactSpec {
    pub role: ArtifactRole,
    pub file_name: &'static str,
}

pub type ArtifactLayout = &'static [ArtifactSpec];

/// Output of a producer: one blob per role, plus auxiliary files that are
/// stored next to them but never consulted for hits.
#[derive(Debug, Clone, Default)]
pub struct ArtifactSet {
    artifacts: BTreeMap<ArtifactRole, Bytes>,
    attachments: BTreeMap<String, Bytes>,
}

impl ArtifactSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, role: ArtifactRole, data: impl Into<Bytes>) -> Self {
        self.artifacts.insert(role, data.into());
        self
    }

    pub fn attach(mut self, file_name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        self.attachments.insert(file_name.into(), data.into());
        self
    }

    pub fn get(&self, role: ArtifactRole) -> Option<&Bytes> {
        self.artifacts.get(&role)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Computed,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "cached",
            CacheStatus::Computed => "computed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub key: StorageKey,
    pub directory: PathBuf,
    pub status: CacheStatus,
    paths: BTreeMap<ArtifactRole, PathBuf>,
}

impl ArtifactPaths {
    pub fn get(&self, role: ArtifactRole) -> Option<&Path> {
        self.paths.get(&role).map(PathBuf::as_path)
    }

    pub fn require(&self, role: ArtifactRole) -> AppResult<&Path> {
        self.get(role).ok_or_else(|| {
            AppError::Computation(format!(
                "entry {} has no {} artifact",
                self.key,
                role.as_str()
            ))
        })
    }
}

pub struct ProducerContext {
    pub key: StorageKey,
    /// Entry directory; already exists when `produce` runs.
    pub directory: PathBuf,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArtifactProducer: Send + Sync {
    fn name(&self) -> &'static str;

    fn layout(&self) -> ArtifactLayout;

    async fn produce(&self, ctx: &ProducerContext) -> anyhow::Result<ArtifactSet>;
}

#[derive(Debug)]
pub struct CacheStats {
    pub total_requests: AtomicU64,
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub failures: AtomicU64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }
}

impl Default for CacheStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Filesystem-backed memoisation of artifact producers. An entry is a hit
/// exactly when every file of the producer's layout exists in the key's
/// directory.
#[derive(Clone)]
pub struct ArtifactCache {
    keys: PathKey,
    repo: ArtifactRepo,
    locks: KeyLocks,
    stats: Arc<CacheStats>,
}

impl ArtifactCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            keys: PathKey::new(root.clone()),
            repo: ArtifactRepo::new(root),
            locks: KeyLocks::new(),
            stats: Arc::new(CacheStats::new()),
        }
    }

    pub fn path_key(&self) -> &PathKey {
        &self.keys
    }

    pub fn root(&self) -> &Path {
        self.repo.root()
    }

    pub fn stats(&self) -> Arc<CacheStats> {
        self.stats.clone()
    }

    fn resolve(&self, key: &StorageKey, layout: ArtifactLayout) -> (PathBuf, Vec<PathBuf>) {
        let directory = self.keys.directory_for(key);
        let files = layout
            .iter()
            .map(|spec| directory.join(spec.file_name))
            .collect();
        (directory, files)
    }

    fn paths(
        key: &StorageKey,
        directory: PathBuf,
        layout: ArtifactLayout,
        status: CacheStatus,
    ) -> ArtifactPaths {
        let paths = layout
            .iter()
            .map(|spec| (spec.role, directory.join(spec.file_name)))
            .collect();
        ArtifactPaths {
            key: key.clone(),
            directory,
            status,
            paths,
        }
    }

    /// Existence-only check; never runs a producer.
    pub async fn lookup(&self, key: &StorageKey, layout: ArtifactLayout) -> Option<ArtifactPaths> {
        let (directory, files) = self.resolve(key, layout);
        if self.repo.all_present(&files).await {
            Some(Self::paths(key, directory, layout, CacheStatus::Hit))
        } else {
            None
        }
    }

    /// `lookup` that counts a hit as a served request. Misses are not
    /// counted; they are expected to go through `get_or_compute` next.
    pub async fn find(&self, key: &StorageKey, layout: ArtifactLayout) -> Option<ArtifactPaths> {
        let hit = self.lookup(key, layout).await?;
        self.stats.total_requests.fetch_add(1, Ordering::Relaxed);
        self.stats.hits.fetch_add(1, Ordering::Relaxed);
        debug!("Cache hit for {}", key);
        Some(hit)
    }

    pub async fn get_or_compute(
        &self,
        key: &StorageKey,
        producer: &dyn ArtifactProducer,
    ) -> AppResult<ArtifactPaths> {
        let layout = producer.layout();

        if let Some(hit) = self.find(key, layout).await {
            return Ok(hit);
        }

        self.stats.total_requests.fetch_add(1, Ordering::Relaxed);
        let _guard = self.locks.acquire(&key.dir_name()).await;

        // Another request may have populated the entry while we waited.
        if let Some(hit) = self.lookup(key, layout).await {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            debug!("Cache filled concurrently for {} ({})", key, producer.name());
            return Ok(hit);
        }

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        let (directory, _) = self.resolve(key, layout);
        self.repo
            .ensure_dir(&directory)
            .await
            .map_err(|e| AppError::Storage(format!("{:#}", e)))?;

        info!("Cache miss for {}, running {}", key, producer.name());
        let ctx = ProducerContext {
            key: key.clone(),
            directory: directory.clone(),
        };
        let set = match producer.produce(&ctx).await {
            Ok(set) => set,
            Err(e) => {
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
                warn!("{} failed for {}: {:#}", producer.name(), key, e);
                return Err(AppError::from(e));
            }
        };

        if let Err(e) = self.persist(&directory, layout, &set, producer.name()).await {
            self.stats.failures.fetch_add(1, Ordering::Relaxed);
            return Err(e);
        }

        Ok(Self::paths(key, directory, layout, CacheStatus::Computed))
    }

    async fn persist(
        &self,
        directory: &Path,
        layout: ArtifactLayout,
        set: &ArtifactSet,
        producer: &str,
    ) -> AppResult<()> {
        let mut writes = Vec::with_capacity(layout.len() + set.attachments.len());
        for spec in layout {
            let data = set.get(spec.role).ok_or_else(|| {
                AppError::Computation(format!(
                    "{} did not produce {}",
                    producer,
                    spec.role.as_str()
                ))
            })?;
            writes.push((directory.join(spec.file_name), data));
        }

        let mut attachments = Vec::with_capacity(set.attachments.len());
        for (name, data) in &set.attachments {
            if !is_plain_file_name(name) {
                return Err(AppError::Computation(format!(
                    "{} produced an invalid attachment name '{}'",
                    producer, name
                )));
            }
            attachments.push((directory.join(name), data));
        }

        // Attachments first: once the last layout file lands the entry is
        // a hit, and everything that belongs to it must already be there.
        let mut written = Vec::new();
        for (path, data) in attachments.into_iter().chain(writes) {
            if let Err(e) = self.repo.write_atomic(&path, data).await {
                let _ = self.repo.remove_files(&written).await;
                return Err(AppError::Storage(format!("{:#}", e)));
            }
            written.push(path);
        }
        Ok(())
    }

    /// Drops the layout files of an entry so the next request recomputes it.
    pub async fn invalidate(&self, key: &StorageKey, layout: ArtifactLayout) -> AppResult<()> {
        let _guard = self.locks.acquire(&key.dir_name()).await;
        let (_, files) = self.resolve(key, layout);
        warn!("Invalidating cache entry {}", key);
        self.repo
            .remove_files(&files)
            .await
            .map_err(|e| AppError::Storage(format!("{:#}", e)))
    }

    pub async fn read(&self, path: &Path) -> AppResult<Bytes> {
        self.repo
            .read(path)
            .await
            .map_err(|e| AppError::Storage(format!("{:#}", e)))
    }
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\'])
}
