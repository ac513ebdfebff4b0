//! Server configuration, read from the command line, the environment and
//! an optional `.env` file.

use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tms_auth::AuthConfig;
use tms_db::DbConfig;
use tms_dispatch::MileageConfig;

#[derive(Debug, Parser)]
#[command(name = "tms-server", about = "TMS REST API server", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub config: ServerConfig,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the REST API (the default)
    Serve,
    /// Create an organization and its first staff user
    Bootstrap(BootstrapArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Args)]
pub struct ServerConfig {
    /// Server host address
    #[arg(short = 'H', long, env = "SERVER_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Server port
    #[arg(short, long, env = "SERVER_PORT", default_value = "8000")]
    pub port: u16,

    /// Log filter used when `RUST_LOG` is not set
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "json")]
    pub log_format: LogFormat,

    /// SurrealDB endpoint (`ws://host:port` or `mem://`)
    #[arg(long, env = "DATABASE_URL", default_value = "ws://127.0.0.1:8000")]
    pub database_url: String,

    #[arg(long, env = "DATABASE_NAMESPACE", default_value = "tms")]
    pub database_namespace: String,

    #[arg(long, env = "DATABASE_NAME", default_value = "main")]
    pub database_name: String,

    #[arg(long, env = "DATABASE_USER")]
    pub database_user: Option<String>,

    #[arg(long, env = "DATABASE_PASSWORD", hide_env_values = true)]
    pub database_password: Option<String>,

    /// Secret mixed into password hashes
    #[arg(long, env = "PASSWORD_PEPPER", hide_env_values = true)]
    pub password_pepper: Option<String>,

    /// Token lifetime for organizations that do not set one
    #[arg(long, env = "TOKEN_LIFETIME_DAYS", default_value_t = 30)]
    pub token_lifetime_days: u32,

    /// How often expired tokens are purged, in seconds (0 disables)
    #[arg(long, env = "TOKEN_CLEANUP_INTERVAL_SECS", default_value_t = 3600)]
    pub token_cleanup_interval_secs: u64,

    /// Google Distance Matrix API key; geodesic distances only when unset
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    pub google_api_key: Option<String>,

    #[arg(long, env = "MILEAGE_CACHE_CAPACITY", default_value_t = 10_000)]
    pub mileage_cache_capacity: u64,

    /// Seconds a calculated mileage stays cached
    #[arg(long, env = "MILEAGE_CACHE_TTL_SECS", default_value_t = 3600)]
    pub mileage_cache_ttl_secs: u64,
}

#[derive(Debug, Args)]
pub struct BootstrapArgs {
    /// Organization display name
    #[arg(long)]
    pub organization_name: String,

    /// Standard Carrier Alpha Code of the organization
    #[arg(long)]
    pub scac_code: String,

    #[arg(long)]
    pub username: String,

    #[arg(long)]
    pub email: String,

    #[arg(long, env = "BOOTSTRAP_PASSWORD", hide_env_values = true)]
    pub password: String,
}

impl Cli {
    /// Parse the command line after loading `.env`, if present.
    pub fn load() -> Self {
        _ = dotenvy::dotenv();
        Self::parse()
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig {
            url: self.database_url.clone(),
            namespace: self.database_namespace.clone(),
            database: self.database_name.clone(),
            username: self.database_user.clone(),
            password: self.database_password.clone(),
        }
    }

    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig {
            pepper: self.password_pepper.clone(),
            default_token_lifetime_days: self.token_lifetime_days,
            ..AuthConfig::default()
        }
    }

    pub fn mileage_config(&self) -> MileageConfig {
        MileageConfig {
            cache_capacity: self.mileage_cache_capacity,
            cache_ttl: Duration::from_secs(self.mileage_cache_ttl_secs),
        }
    }
}
