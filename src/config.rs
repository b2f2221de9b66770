use anyhow::{Context, Result};
use clap::Parser;
use std::env;

const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:5173,http://127.0.0.1:5173";

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub allowed_origins: Vec<String>,
    pub public_host: Option<String>,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Share PDFs over the LAN through QR codes")]
pub struct Args {
    /// Host to bind to (overrides PDF_QR_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides PDF_QR_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where uploaded PDFs are stored (overrides PDF_QR_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Comma-separated CORS origins (overrides PDF_QR_ALLOWED_ORIGINS)
    #[arg(long)]
    pub allowed_origins: Option<String>,

    /// Host[:port] to put in download links instead of the request host
    /// (overrides PDF_QR_PUBLIC_HOST)
    #[arg(long)]
    pub public_host: Option<String>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::merge(Args::parse(), |key| env::var(key))
    }

    /// Merge CLI args over values read through `lookup`.
    fn merge<F>(args: Args, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        // --- Environment fallback ---
        let env_host = lookup("PDF_QR_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match lookup("PDF_QR_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing PDF_QR_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 8000,
            Err(err) => return Err(err).context("reading PDF_QR_PORT"),
        };
        let env_storage = lookup("PDF_QR_STORAGE_DIR").unwrap_or_else(|_| "./uploads".into());
        let env_origins = lookup("PDF_QR_ALLOWED_ORIGINS")
            .unwrap_or_else(|_| DEFAULT_ALLOWED_ORIGINS.into());
        let env_public_host = lookup("PDF_QR_PUBLIC_HOST").ok();

        // --- Merge ---
        let origins = args.allowed_origins.unwrap_or(env_origins);
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            allowed_origins: split_origins(&origins),
            public_host: args
                .public_host
                .or(env_public_host)
                .filter(|h| !h.trim().is_empty()),
        };

        Ok(cfg)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
