use anyhow::{Context, Result};
use clap::Parser;
use std::{env, str::FromStr};

use crate::services::image_transcoder::DEFAULT_WEBP_QUALITY;

const DEFAULT_MAX_BODY_BYTES: usize = 100 * 1024 * 1024;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub database_url: String,
    pub admin_secret: Option<String>,
    pub max_body_bytes: usize,
    pub webp_quality: f32,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("storage_dir", &self.storage_dir)
            .field("database_url", &self.database_url)
            .field("admin_secret", &self.admin_secret.as_ref().map(|_| "<redacted>"))
            .field("max_body_bytes", &self.max_body_bytes)
            .field("webp_quality", &self.webp_quality)
            .finish()
    }
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Multipart upload gateway for the file store")]
pub struct Args {
    /// Host to bind to (overrides UPLOAD_GATEWAY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides UPLOAD_GATEWAY_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where file payloads are stored (overrides UPLOAD_GATEWAY_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Metadata database URL (overrides UPLOAD_GATEWAY_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Admin secret presented to the metadata registry (overrides UPLOAD_GATEWAY_ADMIN_SECRET)
    #[arg(long)]
    pub admin_secret: Option<String>,

    /// Largest accepted request body in bytes (overrides UPLOAD_GATEWAY_MAX_BODY_BYTES)
    #[arg(long)]
    pub max_body_bytes: Option<usize>,

    /// WebP quality 0-100 for transcoded images (overrides UPLOAD_GATEWAY_WEBP_QUALITY)
    #[arg(long)]
    pub webp_quality: Option<f32>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        // Parse CLI once
        let args = Args::parse();
        let cfg = Self::from_args(&args)?;
        Ok((cfg, args.migrate))
    }

    /// Merge already-parsed CLI args over the environment.
    pub fn from_args(args: &Args) -> Result<Self> {
        // --- Environment fallback ---
        let env_host = env::var("UPLOAD_GATEWAY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = parse_env("UPLOAD_GATEWAY_PORT", 3000u16)?;
        let env_storage =
            env::var("UPLOAD_GATEWAY_STORAGE_DIR").unwrap_or_else(|_| "./data/files".into());
        let env_db = env::var("UPLOAD_GATEWAY_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/upload_gateway.db".into());
        let env_secret = env::var("UPLOAD_GATEWAY_ADMIN_SECRET")
            .ok()
            .filter(|s| !s.is_empty());
        let env_max_body = parse_env("UPLOAD_GATEWAY_MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES)?;
        let env_quality = parse_env("UPLOAD_GATEWAY_WEBP_QUALITY", DEFAULT_WEBP_QUALITY)?;

        // --- Merge ---
        let cfg = Self {
            host: args.host.clone().unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            storage_dir: args.storage_dir.clone().unwrap_or(env_storage),
            database_url: args.database_url.clone().unwrap_or(env_db),
            admin_secret: args.admin_secret.clone().or(env_secret),
            max_body_bytes: args.max_body_bytes.unwrap_or(env_max_body),
            webp_quality: args.webp_quality.unwrap_or(env_quality),
        };

        if !(0.0..=100.0).contains(&cfg.webp_quality) {
            anyhow::bail!("webp quality must be between 0 and 100, got {}", cfg.webp_quality);
        }

        Ok(cfg)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Read and parse `name`, falling back to `default` when it is unset.
fn parse_env<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flags_override_defaults() {
        let args = Args::parse_from([
            "upload-gateway",
            "--port",
            "8080",
            "--admin-secret",
            "s3cret",
            "--webp-quality",
            "65",
            "--migrate",
        ]);
        let cfg = AppConfig::from_args(&args).unwrap();

        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.admin_secret.as_deref(), Some("s3cret"));
        assert_eq!(cfg.webp_quality, 65.0);
        assert_eq!(cfg.addr(), format!("{}:8080", cfg.host));
        assert!(args.migrate);
        assert!(!format!("{:?}", cfg).contains("s3cret"));
    }

    #[test]
    fn out_of_range_quality_is_rejected() {
        let args = Args::parse_from(["upload-gateway", "--webp-quality", "150"]);
        assert!(AppConfig::from_args(&args).is_err());
    }
}
