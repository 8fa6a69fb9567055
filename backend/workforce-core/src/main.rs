// src/main.rs
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use axum_server::tls_rustls::RustlsConfig;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod admin_handlers;
mod attendance;
mod auth;
mod bank_accounts;
mod clock;
mod config;
mod employee_handlers;
mod employees;
mod error;
mod exports;
mod jobs;
mod kraepelin;
mod lunch_coupons;
mod manpower;
mod models;
mod notifications;
mod permits;
mod profiles;
mod psychotest;
mod question_bank;
mod quiz;
mod routes;
mod store;
mod workload;

#[cfg(test)]
mod test_support;

use crate::clock::Clock;
use crate::config::AppConfig;
use crate::employees::NewStaff;
use crate::manpower::TrainingParams;
use crate::models::StaffRole;
use crate::routes::{build_router, AppState};
use crate::store::Database;

#[derive(Parser, Debug)]
#[command(name = "workforce", version, about = "Workforce attendance and psychotest backend")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API and the background job loop (default)
    Serve,
    /// Train the manpower model from the current labels and exit
    TrainModel,
    /// Run a single scheduled job once and exit
    RunJob { name: String },
    /// Create a staff account
    CreateStaff {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        password: String,
        /// Grant the administrator role instead of HR
        #[arg(long)]
        admin: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    let cli = Cli::parse();
    let config = AppConfig::from_env().context("Failed to load configuration")?;
    let db = Database::open(&config.data_file)
        .with_context(|| format!("Failed to open data file {}", config.data_file.display()))?;
    let clock = Clock::System;
    info!("Data loaded from {}", config.data_file.display());

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(db, clock, config).await,
        Command::TrainModel => {
            let trained = manpower::train_and_save(
                &db,
                TrainingParams::from(&config),
                &config.model_file,
                clock.now(),
            )
            .context("Training failed")?;
            info!(
                "Model {} trained on {} samples, accuracy {:.3}; written to {}",
                trained.id,
                trained.model.samples,
                trained.model.accuracy,
                config.model_file.display()
            );
            Ok(())
        }
        Command::RunJob { name } => {
            let report = jobs::run_job(&db, &clock, &name)
                .with_context(|| format!("Job '{}' failed", name))?;
            info!("{:?}", report);
            Ok(())
        }
        Command::CreateStaff {
            email,
            name,
            password,
            admin,
        } => {
            let role = if admin { StaffRole::Admin } else { StaffRole::Hr };
            let staff = employees::create_staff(
                &db,
                &clock,
                NewStaff {
                    email,
                    name,
                    role,
                    password,
                },
            )
            .context("Could not create staff account")?;
            info!("Created staff {} ({})", staff.id, staff.email);
            Ok(())
        }
    }
}

async fn serve(db: Database, clock: Clock, config: AppConfig) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.host, config.port))?;
    let tls_paths = config
        .tls_paths()
        .map(|(cert, key)| (PathBuf::from(cert), PathBuf::from(key)));
    let interval_secs = config.job_interval_secs;

    let state = AppState::new(db.clone(), clock.clone(), config)
        .context("Failed to build application state")?;
    let sessions = state.sessions.clone();
    let app = build_router(state);

    tokio::spawn(jobs::run_job_loop(db, clock, sessions, interval_secs));

    match tls_paths {
        Some((cert, key)) => {
            let tls_config = RustlsConfig::from_pem_file(&cert, &key)
                .await
                .with_context(|| {
                    format!(
                        "Failed to load TLS cert/key from {} and {}",
                        cert.display(),
                        key.display()
                    )
                })?;
            info!("Listening on https://{}", addr);
            axum_server::bind_rustls(addr, tls_config)
                .serve(app.into_make_service())
                .await
                .context("HTTPS server failed")?;
        }
        None => {
            warn!("No TLS certificate configured, serving plain HTTP");
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("Failed to bind {}", addr))?;
            info!("Listening on http://{}", addr);
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await
                .context("HTTP server failed")?;
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down");
}
