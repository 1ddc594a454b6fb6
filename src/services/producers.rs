use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::info;

use crate::config::{PrunSettings, ReconstructionConfig};
use crate::error::AppError;
use crate::imaging::{self, Grid, SartParams};
use crate::models::{MAX_ANGLES, MAX_SIZE};
use crate::services::{
    run_checked, ArtifactLayout, ArtifactProducer, ArtifactRole, ArtifactSet, ArtifactSpec,
    ProducerContext,
};

pub const SINOGRAM_FILE: &str = "sinogramm.txt";
pub const ANGLES_FILE: &str = "ang.txt";
pub const EXTERNAL_CONFIG_FILE: &str = "config.yaml";

/// Sinogram inputs shared by generated and uploaded entries.
pub const SINOGRAM_LAYOUT: ArtifactLayout = &[
    ArtifactSpec {
        role: ArtifactRole::SecondaryImage,
        file_name: "sinogramm.png",
    },
    ArtifactSpec {
        role: ArtifactRole::SecondaryData,
        file_name: SINOGRAM_FILE,
    },
    ArtifactSpec {
        role: ArtifactRole::Angles,
        file_name: ANGLES_FILE,
    },
];

pub const PHANTOM_LAYOUT: ArtifactLayout = &[
    ArtifactSpec {
        role: ArtifactRole::PrimaryImage,
        file_name: "phantom.png",
    },
    ArtifactSpec {
        role: ArtifactRole::PrimaryData,
        file_name: "phantom.txt",
    },
    ArtifactSpec {
        role: ArtifactRole::SecondaryImage,
        file_name: "sinogramm.png",
    },
    ArtifactSpec {
        role: ArtifactRole::SecondaryData,
        file_name: SINOGRAM_FILE,
    },
    ArtifactSpec {
        role: ArtifactRole::Angles,
        file_name: ANGLES_FILE,
    },
];

pub const SART_LAYOUT: ArtifactLayout = &[
    ArtifactSpec {
        role: ArtifactRole::PrimaryImage,
        file_name: "reconst_buzmakov.png",
    },
    ArtifactSpec {
        role: ArtifactRole::PrimaryData,
        file_name: "reconst_buzmakov.txt",
    },
];

pub const EXTERNAL_LAYOUT: ArtifactLayout = &[
    ArtifactSpec {
        role: ArtifactRole::PrimaryImage,
        file_name: "result_result.png",
    },
    ArtifactSpec {
        role: ArtifactRole::PrimaryData,
        file_name: "result_result.txt",
    },
];

/// Sinogram artifacts (png, text, angles) for a `detectors x angles` grid.
fn sinogram_artifacts(set: ArtifactSet, sinogram: &Grid, data: Bytes) -> Result<ArtifactSet> {
    let angles = imaging::uniform_angles(sinogram.cols());
    Ok(set
        .with(ArtifactRole::SecondaryImage, imaging::encode_png(sinogram)?)
        .with(ArtifactRole::SecondaryData, data)
        .with(ArtifactRole::Angles, imaging::format_vector(&angles)))
}

/// Synthesises a modified Shepp-Logan phantom and its parallel-beam sinogram.
pub struct PhantomProducer {
    pub size: u32,
    pub angles: u32,
}

#[async_trait]
impl ArtifactProducer for PhantomProducer {
    fn name(&self) -> &'static str {
        "phantom-generator"
    }

    fn layout(&self) -> ArtifactLayout {
        PHANTOM_LAYOUT
    }

    async fn produce(&self, _ctx: &ProducerContext) -> Result<ArtifactSet> {
        let size = self.size as usize;
        let count = self.angles as usize;
        tokio::task::spawn_blocking(move || -> Result<ArtifactSet> {
            let phantom = imaging::modified_shepp_logan(size);
            let angles = imaging::uniform_angles(count);
            let sinogram = imaging::sinogram(&phantom, &angles);
            let set = ArtifactSet::new()
                .with(ArtifactRole::PrimaryImage, imaging::encode_png(&phantom)?)
                .with(ArtifactRole::PrimaryData, imaging::format_matrix(&phantom));
            let text = Bytes::from(imaging::format_matrix(&sinogram));
            sinogram_artifacts(set, &sinogram, text)
        })
        .await?
    }
}

/// Stores an uploaded sinogram verbatim, with a preview and derived angles.
pub struct UploadedSinogramProducer {
    payload: Bytes,
    sinogram: Grid,
}

impl UploadedSinogramProducer {
    pub fn parse(payload: Bytes) -> Result<Self, AppError> {
        let text = std::str::from_utf8(&payload)
            .map_err(|_| AppError::InvalidPayload("sinogram is not UTF-8 text".to_string()))?;
        let sinogram = imaging::parse_matrix(text)
            .map_err(|e| AppError::InvalidPayload(e.to_string()))?;
        // SART allocates detectors x detectors grids, so uploads get the
        // same bounds as generated phantoms.
        if sinogram.rows() > MAX_SIZE as usize || sinogram.cols() > MAX_ANGLES as usize {
            return Err(AppError::InvalidPayload(format!(
                "sinogram is {} x {}, limit is {} detectors x {} angles",
                sinogram.rows(),
                sinogram.cols(),
                MAX_SIZE,
                MAX_ANGLES
            )));
        }
        Ok(Self { payload, sinogram })
    }

    pub fn sinogram(&self) -> &Grid {
        &self.sinogram
    }
}

#[async_trait]
impl ArtifactProducer for UploadedSinogramProducer {
    fn name(&self) -> &'static str {
        "sinogram-upload"
    }

    fn layout(&self) -> ArtifactLayout {
        SINOGRAM_LAYOUT
    }

    async fn produce(&self, _ctx: &ProducerContext) -> Result<ArtifactSet> {
        sinogram_artifacts(ArtifactSet::new(), &self.sinogram, self.payload.clone())
    }
}

/// In-process SART reconstruction.
pub struct SartProducer {
    pub sinogram: Grid,
    pub angles: Vec<f32>,
    pub params: SartParams,
}

#[async_trait]
impl ArtifactProducer for SartProducer {
    fn name(&self) -> &'static str {
        "sart"
    }

    fn layout(&self) -> ArtifactLayout {
        SART_LAYOUT
    }

    async fn produce(&self, ctx: &ProducerContext) -> Result<ArtifactSet> {
        let sinogram = self.sinogram.clone();
        let angles = self.angles.clone();
        let params = self.params;
        info!(
            "Reconstructing {} with SART ({} iterations)",
            ctx.key, params.iterations
        );
        tokio::task::spawn_blocking(move || -> Result<ArtifactSet> {
            let image = imaging::sart(&sinogram, &angles, params)?;
            Ok(ArtifactSet::new()
                .with(ArtifactRole::PrimaryImage, imaging::encode_png(&image)?)
                .with(ArtifactRole::PrimaryData, imaging::format_matrix(&image)))
        })
        .await?
    }
}

/// `config.yaml` consumed by the external reconstructor.
#[derive(Debug, Clone, Serialize)]
pub struct ExternalConfig<'a> {
    pub sinogramm: &'a str,
    pub angles: &'a str,
    pub iterations: u32,
    pub relaxation: f64,
    pub reg_method: &'a str,
    pub reg_params: &'a [f64],
    pub output_suffix: &'a str,
    pub iterations_tosave: &'a [u32],
}

impl<'a> ExternalConfig<'a> {
    pub fn new(settings: &'a PrunSettings) -> Self {
        Self {
            sinogramm: SINOGRAM_FILE,
            angles: ANGLES_FILE,
            iterations: settings.iterations,
            relaxation: settings.relaxation,
            reg_method: &settings.reg_method,
            reg_params: &settings.reg_params,
            output_suffix: &settings.output_suffix,
            iterations_tosave: &settings.iterations_tosave,
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialise reconstructor config")
    }
}

/// Runs the native reconstructor and the TIFF to PNG conversion in a private
/// scratch directory, then hands the results back to the cache.
#[derive(Debug, Clone)]
pub struct ExternalReconstructor {
    pub binary: PathBuf,
    pub convert_program: String,
    pub timeout: Duration,
    pub settings: PrunSettings,
}

impl ExternalReconstructor {
    pub fn from_config(config: &ReconstructionConfig) -> Self {
        Self {
            binary: config.binary_path.clone(),
            convert_program: config.convert_program.clone(),
            timeout: Duration::from_secs(config.process_timeout_secs),
            settings: config.prun.clone(),
        }
    }

    fn output_name(&self, extension: &str) -> String {
        format!("result_{}.{}", self.settings.output_suffix, extension)
    }

    fn binary_path(&self) -> Result<PathBuf> {
        if self.binary.is_absolute() {
            Ok(self.binary.clone())
        } else {
            Ok(std::env::current_dir()?.join(&self.binary))
        }
    }

    async fn run_in(&self, scratch: &Path, entry: &Path) -> Result<ArtifactSet> {
        for input in [SINOGRAM_FILE, ANGLES_FILE] {
            fs::copy(entry.join(input), scratch.join(input))
                .await
                .with_context(|| format!("Failed to stage {}", input))?;
        }
        let config = ExternalConfig::new(&self.settings).to_yaml()?;
        fs::write(scratch.join(EXTERNAL_CONFIG_FILE), &config).await?;

        run_checked(
            self.binary_path()?,
            &[EXTERNAL_CONFIG_FILE],
            scratch,
            self.timeout,
        )
        .await?;

        let tiff = self.output_name("tiff");
        let png = self.output_name("png");
        let txt = self.output_name("txt");
        for expected in [&tiff, &txt] {
            if !scratch.join(expected).is_file() {
                return Err(anyhow!(AppError::ExternalProcess {
                    program: self.binary.display().to_string(),
                    status: format!("exited without writing {}", expected),
                }));
            }
        }

        run_checked(
            &self.convert_program,
            &[tiff.as_str(), png.as_str()],
            scratch,
            self.timeout,
        )
        .await?;
        if !scratch.join(&png).is_file() {
            return Err(anyhow!(AppError::ExternalProcess {
                program: self.convert_program.clone(),
                status: format!("exited without writing {}", png),
            }));
        }

        Ok(ArtifactSet::new()
            .with(ArtifactRole::PrimaryImage, fs::read(scratch.join(&png)).await?)
            .with(ArtifactRole::PrimaryData, fs::read(scratch.join(&txt)).await?)
            .attach(tiff.clone(), fs::read(scratch.join(&tiff)).await?)
            .attach(EXTERNAL_CONFIG_FILE, config))
    }
}

#[async_trait]
impl ArtifactProducer for ExternalReconstructor {
    fn name(&self) -> &'static str {
        "external-reconstructor"
    }

    fn layout(&self) -> ArtifactLayout {
        EXTERNAL_LAYOUT
    }

    async fn produce(&self, ctx: &ProducerContext) -> Result<ArtifactSet> {
        // Removed on drop, which also covers a cancelled request.
        let scratch = tempfile::Builder::new()
            .prefix(".work-")
            .tempdir_in(&ctx.directory)
            .with_context(|| {
                format!("Failed to create scratch dir in {}", ctx.directory.display())
            })?;

        self.run_in(scratch.path(), &ctx.directory).await
    }
}
