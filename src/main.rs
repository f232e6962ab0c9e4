//! # Audio Annotation Backend - Main Application Entry Point
//!
//! Actix-web server for the crowdsourced audio-annotation pipeline: raw
//! call recordings come in, the external GPU service cleans/diarizes/chunks
//! them, reviewers evaluate the resulting chunks, and the evaluation engine
//! decides which chunks are clean and corroborated enough for
//! transcription.
//!
//! ## Application Architecture:
//! - **config**: layered configuration (TOML file + environment variables)
//! - **state**: shared stores, pipeline client and metrics
//! - **store**: project/audio/chunk/evaluation record stores
//! - **evaluation**: flag schema, aggregation, categorization, statistics
//! - **segmenter**: adaptive silence segmentation and chunk materialization
//! - **pipeline**: storage layout and the GPU trigger client
//! - **handlers**: the REST surface
//! - **middleware**: request logging and endpoint metrics

mod config;
mod error;
mod evaluation;
mod handlers;
mod health;
mod middleware;
mod pipeline;
mod segmenter;
mod state;
mod store;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::Result;
use config::AppConfig;
use state::AppState;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Global shutdown flag set by the signal handlers.
static SHUTDOWN_SIGNAL: AtomicBool = AtomicBool::new(false);

#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    init_tracing()?;

    let config = AppConfig::load()?;
    config.validate()?;

    info!("Starting audio-annotation-backend v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded: {}:{}", config.server.host, config.server.port);
    info!(
        "Readiness gate: quorum {}, badness threshold {}",
        config.evaluation.quorum, config.evaluation.badness_threshold
    );

    let app_state = AppState::new(config.clone())?;
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    setup_signal_handlers();

    info!("Starting HTTP server on {}", bind_addr);

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(cors)
            .wrap(TracingLogger::default())
            .wrap(middleware::MetricsMiddleware)
            .wrap(middleware::RequestLogging)
            .service(
                web::scope("/api/v1")
                    .route("/health", web::get().to(health::health_check))
                    .route("/metrics", web::get().to(health::detailed_metrics))
                    .route("/config", web::get().to(handlers::config::get_config))
                    .route("/config", web::put().to(handlers::config::update_config))
                    // Projects: the tenancy boundary
                    .route("/projects", web::post().to(handlers::projects::create_project))
                    .route("/projects", web::get().to(handlers::projects::list_projects))
                    .route("/projects/{id}", web::get().to(handlers::projects::get_project))
                    // Source audio lifecycle + pipeline triggers
                    .route("/audio-files", web::post().to(handlers::audio::register_audio_file))
                    .route("/audio-files", web::get().to(handlers::audio::list_audio_files))
                    .route("/audio-files/{id}", web::get().to(handlers::audio::get_audio_file))
                    .route(
                        "/audio-files/{id}/approve",
                        web::post().to(handlers::audio::approve_audio_file),
                    )
                    .route(
                        "/audio-files/{id}/diarization",
                        web::post().to(handlers::audio::register_diarization),
                    )
                    .route(
                        "/audio-files/{id}/segment",
                        web::post().to(handlers::audio::segment_audio_file),
                    )
                    // Chunks and the derived listings (fixed paths before {id})
                    .route("/chunks", web::post().to(handlers::chunks::register_chunk))
                    .route("/chunks", web::get().to(handlers::chunks::list_chunks))
                    .route(
                        "/chunks/categories",
                        web::get().to(handlers::chunks::chunk_categories),
                    )
                    .route(
                        "/chunks/ready-for-transcription",
                        web::get().to(handlers::chunks::chunks_ready_for_transcription),
                    )
                    .route("/chunks/{id}", web::get().to(handlers::chunks::get_chunk))
                    .route("/chunks/{id}", web::patch().to(handlers::chunks::patch_chunk))
                    .route(
                        "/chunks/{id}/evaluations",
                        web::post().to(handlers::evaluations::submit_evaluation),
                    )
                    // Dashboards
                    .route(
                        "/statistics/chunks",
                        web::get().to(handlers::stats::get_chunk_statistics),
                    )
                    .route(
                        "/statistics/flags",
                        web::get().to(handlers::stats::get_flag_statistics),
                    )
                    .route("/leaderboard", web::get().to(handlers::stats::get_leaderboard)),
            )
            // Health check at root level for load balancers
            .route("/health", web::get().to(health::health_check))
    })
    .bind(&bind_addr)?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    tokio::select! {
        result = server_task => {
            match result {
                Ok(server_result) => {
                    if let Err(e) = server_result {
                        error!("Server error: {}", e);
                    }
                }
                Err(e) => {
                    error!("Server task error: {}", e);
                }
            }
        }
        _ = wait_for_shutdown() => {
            info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Initialize tracing with an env-filter; `RUST_LOG` overrides the default.
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "audio_annotation_backend=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

/// Install SIGTERM/SIGINT handlers that set the shutdown flag.
fn setup_signal_handlers() {
    tokio::spawn(async {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler");
        let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
            .expect("Failed to install SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }

        SHUTDOWN_SIGNAL.store(true, Ordering::SeqCst);
    });
}

/// Poll the shutdown flag without blocking the runtime.
async fn wait_for_shutdown() {
    while !SHUTDOWN_SIGNAL.load(Ordering::SeqCst) {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }
}
