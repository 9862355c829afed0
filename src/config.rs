//! Configuration management for the image gallery.
//!
//! This module provides a flexible configuration system that supports:
//! - Command-line arguments via clap
//! - Environment variables with `GALLERY_` prefix
//! - Sensible defaults for all optional settings
//!
//! # Example
//!
//! ```ignore
//! use image_gallery::config::{Cli, Command};
//!
//! match Cli::parse().into_command() {
//!     Command::Serve(config) => println!("Listening on {}", config.bind_address()),
//!     Command::Seed(config) => println!("Seeding from {}", config.dir.display()),
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `GALLERY_HOST` - Server bind address (default: 0.0.0.0)
//! - `GALLERY_PORT` - Server port (default: 3000)
//! - `GALLERY_DATABASE_URL` - SQLite connection URL (default: sqlite://gallery.db)
//! - `GALLERY_DB_MAX_CONNECTIONS` - Connection pool size (default: 5)
//! - `GALLERY_PUBLIC_DIR` - Directory served under /public (default: public)
//! - `GALLERY_SESSION_SECRET` - HMAC secret for session cookies (required)
//! - `GALLERY_SESSION_TTL` - Session lifetime in seconds (default: 86400)
//! - `GALLERY_SESSION_CAPACITY` - Maximum live sessions (default: 10000)
//! - `GALLERY_BCRYPT_COST` - bcrypt cost, 4 to 31 (default: 12)
//! - `GALLERY_MAX_UPLOAD_BYTES` - Request body limit (default: 10 MiB)
//! - `GALLERY_SEED_DIR` - Directory holding users.csv and images.csv (default: seeding)

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::server::auth::{MAX_BCRYPT_COST, MIN_BCRYPT_COST};
use crate::server::routes::{DEFAULT_BCRYPT_COST, DEFAULT_MAX_UPLOAD_BYTES};
use crate::server::session::DEFAULT_SESSION_CAPACITY;

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default database URL.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://gallery.db";

/// Default connection pool size.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Default public directory.
pub const DEFAULT_PUBLIC_DIR: &str = "public";

/// Default session lifetime in seconds (one day).
pub const DEFAULT_SESSION_TTL_SECS: u64 = 24 * 60 * 60;

/// Default seed directory.
pub const DEFAULT_SEED_DIR: &str = "seeding";

// =============================================================================
// CLI Arguments
// =============================================================================

/// Image Gallery - a small multi-user photo gallery.
#[derive(Parser, Debug, Clone)]
#[command(name = "image-gallery")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP server.
    Serve(ServeConfig),

    /// Load users and images from CSV files.
    Seed(SeedConfig),
}

/// Database connection settings shared by every command.
#[derive(Args, Debug, Clone)]
pub struct DatabaseArgs {
    /// SQLite connection URL; the file is created if missing.
    #[arg(long, default_value = DEFAULT_DATABASE_URL, env = "GALLERY_DATABASE_URL")]
    pub database_url: String,

    /// Maximum number of pooled connections.
    #[arg(long, default_value_t = DEFAULT_MAX_CONNECTIONS, env = "GALLERY_DB_MAX_CONNECTIONS")]
    pub db_max_connections: u32,
}

impl DatabaseArgs {
    fn validate(&self) -> Result<(), String> {
        if self.database_url.is_empty() {
            return Err(
                "Database URL is required. Set --database-url or GALLERY_DATABASE_URL".to_string(),
            );
        }
        if self.db_max_connections == 0 {
            return Err("db_max_connections must be greater than 0".to_string());
        }
        Ok(())
    }
}

fn validate_bcrypt_cost(cost: u32) -> Result<(), String> {
    if (MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&cost) {
        Ok(())
    } else {
        Err(format!(
            "bcrypt_cost must be between {} and {}",
            MIN_BCRYPT_COST, MAX_BCRYPT_COST
        ))
    }
}

// =============================================================================
// Serve Command
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "GALLERY_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "GALLERY_PORT")]
    pub port: u16,

    /// Directory served under /public; uploads are written to its images/ folder.
    #[arg(long, default_value = DEFAULT_PUBLIC_DIR, env = "GALLERY_PUBLIC_DIR")]
    pub public_dir: PathBuf,

    /// Maximum request body size in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_BYTES, env = "GALLERY_MAX_UPLOAD_BYTES")]
    pub max_upload_bytes: usize,

    // =========================================================================
    // Database Configuration
    // =========================================================================
    #[command(flatten)]
    pub database: DatabaseArgs,

    // =========================================================================
    // Session Configuration
    // =========================================================================
    /// Secret key for HMAC-SHA256 signed session cookies.
    #[arg(long, env = "GALLERY_SESSION_SECRET")]
    pub session_secret: Option<String>,

    /// Session lifetime in seconds, extended on every request.
    #[arg(long, default_value_t = DEFAULT_SESSION_TTL_SECS, env = "GALLERY_SESSION_TTL")]
    pub session_ttl: u64,

    /// Maximum number of live sessions; the least recently used are evicted.
    #[arg(long, default_value_t = DEFAULT_SESSION_CAPACITY, env = "GALLERY_SESSION_CAPACITY")]
    pub session_capacity: usize,

    /// bcrypt cost for new password hashes.
    #[arg(long, default_value_t = DEFAULT_BCRYPT_COST, env = "GALLERY_BCRYPT_COST")]
    pub bcrypt_cost: u32,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        match self.session_secret.as_deref() {
            None | Some("") => {
                return Err(
                    "No session secret provided. Set --session-secret or GALLERY_SESSION_SECRET"
                        .to_string(),
                )
            }
            Some(_) => {}
        }

        self.database.validate()?;
        validate_bcrypt_cost(self.bcrypt_cost)?;

        if self.session_ttl == 0 {
            return Err("session_ttl must be greater than 0".to_string());
        }
        if self.session_capacity == 0 {
            return Err("session_capacity must be greater than 0".to_string());
        }
        if self.max_upload_bytes == 0 {
            return Err("max_upload_bytes must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the session secret, or an empty string if not set (call validate() first).
    pub fn session_secret_or_empty(&self) -> &str {
        self.session_secret.as_deref().unwrap_or("")
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl)
    }
}

// =============================================================================
// Seed Command
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct SeedConfig {
    /// Directory containing users.csv and images.csv.
    #[arg(long, default_value = DEFAULT_SEED_DIR, env = "GALLERY_SEED_DIR")]
    pub dir: PathBuf,

    #[command(flatten)]
    pub database: DatabaseArgs,

    /// bcrypt cost for seeded password hashes.
    #[arg(long, default_value_t = DEFAULT_BCRYPT_COST, env = "GALLERY_BCRYPT_COST")]
    pub bcrypt_cost: u32,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl SeedConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.database.validate()?;
        validate_bcrypt_cost(self.bcrypt_cost)
    }
}

// =============================================================================
// Tests
// =============================================================================
