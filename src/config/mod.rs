//! Configuration module for the challenge hub.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveDate;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key guarding admin routes (open when unset)
    pub admin_psk: Option<String>,
    /// Path to the SQLite file holding the local slots
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Address of the presentation layer; outbound share links point here.
    /// The backend itself serves no page at `/`, so the default only suits
    /// a front end served from the same origin.
    pub public_url: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Catalog API base URL
    pub catalog_url: String,
    /// Optional bearer credential for the catalog API
    pub catalog_token: Option<String>,
    pub fetch_attempts: u32,
    pub retry_base: Duration,
    /// Metadata older than this is refetched by a non-forced refresh
    pub stale_after: Duration,
    /// Address carrying a snapshot to apply once at startup
    pub inbound_link: Option<String>,
    /// First day of the challenge; Monday of the current week when unset
    pub challenge_start: Option<NaiveDate>,
    pub challenge_days: u32,
    pub telemetry_enabled: bool,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Invalid values fall back to their defaults. The returned warnings
    /// describe each fallback and are meant to be logged once tracing is up.
    pub fn from_env() -> (Self, Vec<String>) {
        dotenvy::dotenv().ok();
        let mut warnings = Vec::new();

        let admin_psk = non_empty("HUB_ADMIN_PSK");

        let db_path = env::var("HUB_DB_PATH")
            .unwrap_or_else(|_| "./data/hub.sqlite".to_string())
            .into();

        let bind_addr = parse_or(
            &mut warnings,
            "HUB_BIND_ADDR",
            SocketAddr::from(([127, 0, 0, 1], 8080)),
        );

        let public_url = non_empty("HUB_PUBLIC_URL").unwrap_or_else(|| {
            let fallback = format!("http://{}/", bind_addr);
            warnings.push(format!(
                "HUB_PUBLIC_URL is unset, share links will point at {} which serves no page",
                fallback
            ));
            fallback
        });

        let log_level = env::var("HUB_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let catalog_url =
            env::var("HUB_CATALOG_URL").unwrap_or_else(|_| "https://api.github.com".to_string());

        let challenge_start = non_empty("HUB_CHALLENGE_START").and_then(|raw| {
            NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                .map_err(|e| warnings.push(format!("Ignoring HUB_CHALLENGE_START={}: {}", raw, e)))
                .ok()
        });

        let telemetry_enabled = !matches!(
            env::var("HUB_TELEMETRY").as_deref(),
            Ok("off") | Ok("false") | Ok("0")
        );

        let config = Self {
            admin_psk,
            db_path,
            bind_addr,
            public_url,
            log_level,
            catalog_url,
            catalog_token: non_empty("HUB_CATALOG_TOKEN"),
            fetch_attempts: parse_or(&mut warnings, "HUB_FETCH_ATTEMPTS", 3u32).max(1),
            retry_base: Duration::from_millis(parse_or(&mut warnings, "HUB_RETRY_BASE_MS", 200u64)),
            stale_after: Duration::from_secs(parse_or(
                &mut warnings,
                "HUB_STALE_AFTER_SECS",
                300u64,
            )),
            inbound_link: non_empty("HUB_INBOUND_LINK"),
            challenge_start,
            challenge_days: parse_or(&mut warnings, "HUB_CHALLENGE_DAYS", 5u32).max(1),
            telemetry_enabled,
        };
        (config, warnings)
    }
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Parse a variable, falling back to `default` when unset or invalid.
fn parse_or<T: FromStr>(warnings: &mut Vec<String>, name: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|e| {
            warnings.push(format!("Invalid {}={:?} ({}), using default", name, raw, e));
            default
        }),
        Err(_) => default,
    }
}
