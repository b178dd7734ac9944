use anyhow::{bail, Context, Result};
use dotenvy::dotenv;
use std::env;

/// Default search radius when nothing else is configured (kilometres).
pub const DEFAULT_SEARCH_RADIUS_KM: f64 = 50.0;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub geocoding_api_key: String,
    pub postmark_server_token: String,
    pub email_from: String,
    pub expo_access_token: Option<String>,
    /// Base URL used to build accept/reject links (no trailing slash)
    pub public_base_url: String,
    pub default_radius_km: f64,
    /// Cron expression (with seconds) for the in-process expiry sweep
    pub sweep_schedule: Option<String>,
    pub allowed_origins: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let default_radius_km = match env::var("DEFAULT_SEARCH_RADIUS_KM") {
            Ok(raw) => parse_radius(&raw)?,
            Err(_) => DEFAULT_SEARCH_RADIUS_KM,
        };

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            geocoding_api_key: env::var("GEOCODING_API_KEY")
                .context("GEOCODING_API_KEY must be set")?,
            postmark_server_token: env::var("POSTMARK_SERVER_TOKEN")
                .context("POSTMARK_SERVER_TOKEN must be set")?,
            email_from: env::var("EMAIL_FROM").context("EMAIL_FROM must be set")?,
            expo_access_token: env::var("EXPO_ACCESS_TOKEN").ok(),
            public_base_url: normalize_base_url(
                &env::var("PUBLIC_BASE_URL")
                    .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            ),
            default_radius_km,
            sweep_schedule: env::var("SWEEP_SCHEDULE")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .map(|s| split_origins(&s))
                .unwrap_or_default(),
        })
    }
}

fn parse_radius(raw: &str) -> Result<f64> {
    let radius: f64 = raw
        .trim()
        .parse()
        .context("DEFAULT_SEARCH_RADIUS_KM must be a number")?;
    if !radius.is_finite() || radius <= 0.0 {
        bail!("DEFAULT_SEARCH_RADIUS_KM must be positive, got {}", radius);
    }
    Ok(radius)
}

fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
