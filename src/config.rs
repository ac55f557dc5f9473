//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;

use crate::model::AppendConsistency;

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Public site address used to build absolute admin URLs
    pub site: SiteConfig,
    /// Interval in seconds between content type registry refreshes
    pub registry_refresh_interval: u64,
    /// Write guarantee for log appends made through the API
    pub append_consistency: AppendConsistency,
}

/// Public address of the site, as seen by browsers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteConfig {
    pub protocol: String,
    pub host: String,
    pub port: String,
}

impl SiteConfig {
    /// Builds an absolute URL for `uri`, leaving out the port when it is the
    /// protocol default.
    pub fn site_url(&self, uri: &str, subdomain: Option<&str>) -> String {
        let subdomain = subdomain
            .filter(|s| !s.is_empty())
            .map(|s| format!("{}.", s))
            .unwrap_or_default();

        if self.port == "80" || self.port == "443" {
            format!("{}://{}{}{}", self.protocol, subdomain, self.host, uri)
        } else {
            format!(
                "{}://{}{}:{}{}",
                self.protocol, subdomain, self.host, self.port, uri
            )
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: "3000".to_string(),
        }
    }
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `SITE_PROTOCOL` - Public site protocol (default: http)
    /// - `SITE_HOST` - Public site host (default: localhost)
    /// - `SITE_PORT` - Public site port (default: 3000)
    /// - `REGISTRY_REFRESH_INTERVAL` - Registry refresh frequency in seconds (default: 60)
    /// - `APPEND_CONSISTENCY` - `best_effort` or `conditional` (default: best_effort)
    pub fn from_env() -> Self {
        let defaults = SiteConfig::default();
        Self {
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            site: SiteConfig {
                protocol: env::var("SITE_PROTOCOL").unwrap_or(defaults.protocol),
                host: env::var("SITE_HOST").unwrap_or(defaults.host),
                port: env::var("SITE_PORT").unwrap_or(defaults.port),
            },
            registry_refresh_interval: env::var("REGISTRY_REFRESH_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            append_consistency: env::var("APPEND_CONSISTENCY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            site: SiteConfig::default(),
            registry_refresh_interval: 60,
            append_consistency: AppendConsistency::default(),
        }
    }
}
