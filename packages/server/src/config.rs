use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    pub allow_origins: Vec<String>,
    pub max_age: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Public origin of the service, used for magic links and redirect checks.
    pub origin: String,
    pub cors: CorsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// CockroachDB/PostgreSQL DSN, or `memory` for an in-process SQLite database.
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub token_key: String,
    pub token_ttl_hours: i64,
    pub code_ttl_minutes: i64,
    pub allowed_redirect_origins: Vec<String>,
    pub disable_dev_login: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// S3/MinIO endpoint. Empty selects the filesystem store under `local_dir`.
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub secure: bool,
    pub region: String,
    pub media_bucket: String,
    pub avatars_bucket: String,
    pub cleanup_timeout_secs: u64,
    pub local_dir: String,
}

impl StorageConfig {
    pub fn cleanup_timeout(&self) -> Duration {
        Duration::from_secs(self.cleanup_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MediaConfig {
    pub avatar_url_prefix: String,
    pub media_url_prefix: String,
    pub max_resolution: u32,
    pub avatar_resolution: u32,
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
    pub max_attachments: usize,
    pub concurrency: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OpenGraphConfig {
    pub cache_size: usize,
    pub success_ttl_secs: u64,
    pub error_ttl_secs: u64,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaginationConfig {
    pub default_page_size: u64,
    pub max_page_size: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    pub media: MediaConfig,
    pub opengraph: OpenGraphConfig,
    pub pagination: PaginationConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::builder()?
            // Load from config/config.toml
            .add_source(File::with_name("config/config").required(false))
            // Override from environment (e.g., NAKAMA__AUTH__TOKEN_KEY)
            .add_source(
                Environment::with_prefix("NAKAMA")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("server.cors.allow_origins")
                    .with_list_parse_key("auth.allowed_redirect_origins")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Configuration made of defaults only.
    pub fn defaults() -> Result<Self, ConfigError> {
        Self::builder()?.build()?.try_deserialize()
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 4444)?
            .set_default("server.origin", "http://localhost:4444")?
            .set_default("server.cors.allow_origins", Vec::<String>::new())?
            .set_default("server.cors.max_age", 3600)?
            .set_default("database.url", "memory")?
            .set_default("auth.token_key", "")?
            .set_default("auth.token_ttl_hours", 24 * 14)?
            .set_default("auth.code_ttl_minutes", 120)?
            .set_default("auth.allowed_redirect_origins", Vec::<String>::new())?
            .set_default("auth.disable_dev_login", false)?
            .set_default("storage.endpoint", "")?
            .set_default("storage.access_key", "")?
            .set_default("storage.secret_key", "")?
            .set_default("storage.secure", false)?
            .set_default("storage.region", "us-east-1")?
            .set_default("storage.media_bucket", "media")?
            .set_default("storage.avatars_bucket", "avatars")?
            .set_default("storage.cleanup_timeout_secs", 5)?
            .set_default("storage.local_dir", "./data/blobs")?
            .set_default("media.avatar_url_prefix", "http://localhost:4444/img/avatars/")?
            .set_default("media.media_url_prefix", "http://localhost:4444/img/media/")?
            .set_default("media.max_resolution", 1920)?
            .set_default("media.avatar_resolution", 400)?
            .set_default("media.ffmpeg_bin", "ffmpeg")?
            .set_default("media.ffprobe_bin", "ffprobe")?
            .set_default("media.max_attachments", 5)?
            .set_default("media.concurrency", 4)?
            .set_default("opengraph.cache_size", 256)?
            .set_default("opengraph.success_ttl_secs", 3600)?
            .set_default("opengraph.error_ttl_secs", 300)?
            .set_default("opengraph.timeout_secs", 10)?
            .set_default("pagination.default_page_size", 3)?
            .set_default("pagination.max_page_size", 200)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_deserialize() {
        let config = AppConfig::defaults().unwrap();
        assert_eq!(config.server.port, 4444);
        assert_eq!(config.auth.token_ttl_hours, 336);
        assert_eq!(config.storage.cleanup_timeout(), Duration::from_secs(5));
        assert_eq!(config.opengraph.cache_size, 256);
        assert_eq!(config.pagination.default_page_size, 3);
        assert!(config.auth.allowed_redirect_origins.is_empty());
    }
}
