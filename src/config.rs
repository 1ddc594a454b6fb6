use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub reconstruction: ReconstructionConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory that holds one sub-directory per cache entry.
    pub root: PathBuf,
    /// URL prefix under which `root` is served.
    pub public_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconstructionConfig {
    pub sart_iterations: usize,
    pub sart_relaxation: f32,
    pub binary_path: PathBuf,
    pub convert_program: String,
    pub process_timeout_secs: u64,
    pub prun: PrunSettings,
}

/// Parameters written into `config.yaml` for the external reconstructor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrunSettings {
    pub iterations: u32,
    pub relaxation: f64,
    pub reg_method: String,
    pub reg_params: Vec<f64>,
    pub output_suffix: String,
    pub iterations_tosave: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5510,
                workers: num_cpus::get(),
                max_upload_bytes: 64 * 1024 * 1024,
            },
            storage: StorageConfig {
                root: PathBuf::from("static/data"),
                public_prefix: "/static/data".to_string(),
            },
            reconstruction: ReconstructionConfig {
                sart_iterations: 10,
                sart_relaxation: 0.5,
                binary_path: PathBuf::from("prun_data/tomoreconstruct"),
                convert_program: "convert".to_string(),
                process_timeout_secs: 600,
                prun: PrunSettings::default(),
            },
            security: SecurityConfig {
                allowed_origins: vec!["*".to_string()],
            },
        }
    }
}

impl Default for PrunSettings {
    fn default() -> Self {
        Self {
            iterations: 1000,
            relaxation: 0.57,
            reg_method: "RM_RAW".to_string(),
            reg_params: vec![0.1, 0.001],
            output_suffix: "result".to_string(),
            iterations_tosave: vec![200, 400, 600, 800],
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let mut config = Config::default();

        // Server configuration
        if let Ok(host) = env::var("HOST") {
            config.server.host = host;
        }
        if let Ok(port) = env::var("PORT") {
            config.server.port = port.parse()?;
        }
        if let Ok(workers) = env::var("WORKERS") {
            config.server.workers = workers.parse()?;
        }
        if let Ok(max_upload_bytes) = env::var("MAX_UPLOAD_BYTES") {
            config.server.max_upload_bytes = max_upload_bytes.parse()?;
        }

        // Storage configuration
        if let Ok(root) = env::var("STORAGE_ROOT") {
            config.storage.root = PathBuf::from(root);
        }
        if let Ok(public_prefix) = env::var("PUBLIC_PREFIX") {
            config.storage.public_prefix = public_prefix.trim_end_matches('/').to_string();
        }

        // Reconstruction configuration
        if let Ok(iterations) = env::var("SART_ITERATIONS") {
            config.reconstruction.sart_iterations = iterations.parse()?;
        }
        if let Ok(relaxation) = env::var("SART_RELAXATION") {
            config.reconstruction.sart_relaxation = relaxation.parse()?;
        }
        if let Ok(binary_path) = env::var("RECONSTRUCT_BINARY") {
            config.reconstruction.binary_path = PathBuf::from(binary_path);
        }
        if let Ok(convert_program) = env::var("CONVERT_PROGRAM") {
            config.reconstruction.convert_program = convert_program;
        }
        if let Ok(timeout) = env::var("PROCESS_TIMEOUT_SECS") {
            config.reconstruction.process_timeout_secs = timeout.parse()?;
        }
        if let Ok(iterations) = env::var("PRUN_ITERATIONS") {
            config.reconstruction.prun.iterations = iterations.parse()?;
        }
        if let Ok(relaxation) = env::var("PRUN_RELAXATION") {
            config.reconstruction.prun.relaxation = relaxation.parse()?;
        }
        if let Ok(reg_method) = env::var("PRUN_REG_METHOD") {
            config.reconstruction.prun.reg_method = reg_method;
        }
        if let Ok(reg_params) = env::var("PRUN_REG_PARAMS") {
            config.reconstruction.prun.reg_params = parse_list(&reg_params)?;
        }
        if let Ok(to_save) = env::var("PRUN_ITERATIONS_TOSAVE") {
            config.reconstruction.prun.iterations_tosave = parse_list(&to_save)?;
        }

        // Security configuration
        if let Ok(allowed_origins) = env::var("ALLOWED_ORIGINS") {
            config.security.allowed_origins = allowed_origins
                .split(',')
                .map(|s| s.trim().to_string())
                .collect();
        }

        Ok(config)
    }
}

fn parse_list<T>(raw: &str) -> anyhow::Result<Vec<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<T>().map_err(anyhow::Error::from))
        .collect()
}
