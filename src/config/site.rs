//! Site configuration (_config.yml)

use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Main site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    // Content
    pub content_dir: String,
    pub extension: String,

    // Dates
    /// IANA timezone used to interpret dates written without an offset
    pub timezone: String,

    // Post defaults
    pub default_author: String,
    pub default_author_image: String,

    // Derived fields / validation
    pub words_per_minute: usize,
    pub min_content_chars: usize,

    // Rendering
    pub highlight_theme: String,
    pub line_numbers: bool,

    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    // Store any additional fields
    #[serde(flatten)]
    pub extra: HashMap<String, serde_yaml::Value>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            content_dir: "content/blog".to_string(),
            extension: "md".to_string(),

            timezone: "UTC".to_string(),

            default_author: "Editorial Team".to_string(),
            default_author_image: "./images/authors/default.png".to_string(),

            words_per_minute: 200,
            min_content_chars: 50,

            highlight_theme: "base16-ocean.dark".to_string(),
            line_numbers: false,

            server: ServerConfig::default(),
            rate_limit: RateLimitConfig::default(),

            extra: HashMap::new(),
        }
    }
}

impl SiteConfig {
    /// Load configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        Self::from_yaml(&content).with_context(|| format!("Invalid config file {:?}", path))
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(content: &str) -> Result<Self> {
        // An empty file deserializes as null, treat it like no file at all
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: SiteConfig = serde_yaml::from_str(content)?;
        config.tz()?;
        if config.words_per_minute == 0 {
            anyhow::bail!("words_per_minute must be greater than zero");
        }
        let window_secs = config.rate_limit.window_secs;
        if window_secs == 0 || window_secs > RateLimitConfig::MAX_WINDOW_SECS {
            anyhow::bail!(
                "rate_limit.window_secs must be between 1 and {}, got {}",
                RateLimitConfig::MAX_WINDOW_SECS,
                window_secs
            );
        }
        Ok(config)
    }

    /// Parsed timezone
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("Unknown timezone {:?}: {}", self.timezone, e))
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub ip: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ip: "localhost".to_string(),
            port: 4000,
        }
    }
}

/// Rate limiting for the public API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub max_requests: u32,
    pub window_secs: u64,
}

impl RateLimitConfig {
    /// Longest accepted window (one year)
    pub const MAX_WINDOW_SECS: u64 = 365 * 24 * 60 * 60;
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 60,
            window_secs: 60,
        }
    }
}
