//! Image Gallery - a small multi-user photo gallery.
//!
//! This binary starts the HTTP server or seeds the database.

use std::process::ExitCode;

use clap::Parser;
use tokio::signal::ctrl_c;
#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use image_gallery::{
    config::{Cli, Command, DatabaseArgs, SeedConfig, ServeConfig},
    seed,
    server::{create_router, RouterConfig},
    store::SqliteStore,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Serve(config) => run_serve(config).await,
        Command::Seed(config) => run_seed(config).await,
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    // Initialize logging
    init_logging(config.verbose);

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Image Gallery v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Database: {}", config.database.database_url);
    info!("  Public directory: {}", config.public_dir.display());
    info!(
        "  Sessions: {}s TTL, {} max",
        config.session_ttl, config.session_capacity
    );
    info!("  bcrypt cost: {}", config.bcrypt_cost);

    let Some(store) = open_store(&config.database).await else {
        return ExitCode::FAILURE;
    };

    if let Err(e) = tokio::fs::create_dir_all(config.public_dir.join("images")).await {
        warn!(
            "Could not create {}/images: {}",
            config.public_dir.display(),
            e
        );
    }

    // Build router configuration
    let router_config = build_router_config(&config);

    // Create router
    let router = create_router(store.clone(), router_config);

    // Bind and serve
    let addr = config.bind_address();

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    info!("Server listening on: http://{}", addr);

    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    store.close().await;

    if let Err(e) = served {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Server shut down");
    ExitCode::SUCCESS
}

/// Build RouterConfig from the application ServeConfig.
fn build_router_config(config: &ServeConfig) -> RouterConfig {
    RouterConfig::new(config.session_secret_or_empty(), &config.public_dir)
        .with_session_ttl(config.session_ttl())
        .with_session_capacity(config.session_capacity)
        .with_bcrypt_cost(config.bcrypt_cost)
        .with_max_upload_bytes(config.max_upload_bytes)
        .with_tracing(!config.no_tracing)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

// =============================================================================
// Seed Command
// =============================================================================

async fn run_seed(config: SeedConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let Some(store) = open_store(&config.database).await else {
        return ExitCode::FAILURE;
    };

    let result = seed::run(&store, &config.dir, config.bcrypt_cost).await;
    store.close().await;

    match result {
        Ok(report) => {
            if report.skipped > 0 {
                warn!("{} line(s) were skipped", report.skipped);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Seeding failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// Shared
// =============================================================================

/// Connect and apply the schema. Failures are logged and end the process.
async fn open_store(database: &DatabaseArgs) -> Option<SqliteStore> {
    let store = match SqliteStore::connect(&database.database_url, database.db_max_connections).await
    {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to connect to {}: {}", database.database_url, e);
            return None;
        }
    };

    if let Err(e) = store.migrate().await {
        error!("Failed to apply schema: {}", e);
        store.close().await;
        return None;
    }

    Some(store)
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "image_gallery=debug,tower_http=debug"
    } else {
        "image_gallery=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
