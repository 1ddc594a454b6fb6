mod config;
mod error;
mod handlers;
mod imaging;
mod models;
mod repositories;
mod routes;
mod services;
mod utils;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Config;
use routes::api;
use services::{ArtifactCache, TomographyService};

#[derive(Clone)]
pub struct AppState {
    pub tomography: TomographyService,
    pub config: Config,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let cache = ArtifactCache::new(config.storage.root.clone());
        let tomography =
            TomographyService::new(cache, &config.storage, config.reconstruction.clone());
        Self {
            tomography,
            config,
            start_time: Instant::now(),
        }
    }
}

fn cors(allowed_origins: &[String]) -> Cors {
    let cors = Cors::default()
        .allow_any_method()
        .allow_any_header()
        .max_age(3600);
    if allowed_origins.iter().any(|origin| origin == "*") {
        cors.allow_any_origin()
    } else {
        allowed_origins
            .iter()
            .fold(cors, |cors, origin| cors.allowed_origin(origin))
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(config) => {
            info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = tokio::fs::create_dir_all(&config.storage.root).await {
        error!(
            "Failed to create storage root {}: {}",
            config.storage.root.display(),
            e
        );
        std::process::exit(1);
    }

    info!(
        "Starting tomography report service on port {} (storage: {})",
        config.server.port,
        config.storage.root.display()
    );

    let state = AppState::new(config.clone());
    let public_prefix = config.storage.public_prefix.clone();
    let allowed_origins = config.security.allowed_origins.clone();

    // Create HTTP server
    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(cors(&allowed_origins))
            .wrap(Logger::default())
            .configure(|cfg| api::config(cfg, &public_prefix))
    })
    .bind(format!("{}:{}", config.server.host, config.server.port))?;

    info!(
        "Server started successfully at http://{}:{}",
        config.server.host, config.server.port
    );

    // Run the server
    server.workers(config.server.workers).run().await
}
