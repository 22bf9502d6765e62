mod env_manager;

use axum::http::HeaderValue;
use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::error::{AnalyzerError, Result};
use crate::response::SchemaMode;
use std::fs;

pub use env_manager::{get_env_value, parse_origins};

/// Main configuration struct for the application
///
/// Values come from an optional TOML file and are then overridden by
/// environment variables (see [`Config::apply_overrides`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Gemini API settings
    pub gemini: GeminiConfig,
    /// HTTP server settings
    pub server: ServerConfig,
    /// Directory uploaded log files are written to
    pub upload_dir: PathBuf,
    /// Directory the rotating application log lives in
    pub log_dir: PathBuf,
    /// Console log level, used when `RUST_LOG` is not set
    pub log_level: String,
    /// Response parsing behaviour
    pub analysis: AnalysisConfig,
    /// Per-client request limits
    pub rate_limits: RateLimits,
}

/// Settings for the Gemini `generateContent` endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    /// API credential, required
    pub api_key: String,
    /// Model name, e.g. `gemini-1.5-flash`
    pub model: String,
    /// Scheme and host of the API
    pub base_url: String,
    /// Request timeout; the transport default applies when unset
    pub timeout_secs: Option<u64>,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the server binds to
    pub bind_addr: String,
    /// Origins allowed by CORS on `/api/*`; `*` allows any
    pub allowed_origins: Vec<String>,
    /// Largest accepted request body in bytes
    pub max_upload_bytes: usize,
    /// Optional directory served under `/frontend`
    pub frontend_dir: Option<PathBuf>,
}

/// Response parsing behaviour
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Reject model replies that miss one of the three expected keys
    pub strict_schema: bool,
}

/// Request limits applied per client address
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimits {
    /// Whether limits are enforced at all
    pub enabled: bool,
    /// Uploads allowed per minute
    pub upload_per_minute: usize,
    /// Analysis batches allowed per minute
    pub process_per_minute: usize,
    /// API requests allowed per hour
    pub per_hour: usize,
    /// API requests allowed per day
    pub per_day: usize,
}

impl Config {
    /// Loads configuration from an optional TOML file, then applies
    /// environment variable overrides
    ///
    /// # Arguments
    /// * `path` - TOML file to read; defaults are used when `None`
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(get_env_value)?;
        Ok(config)
    }

    /// Reads a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| AnalyzerError::Config(format!("Failed to read config file {}: {}", path.display(), e)))?;

        toml::from_str(&content)
            .map_err(|e| AnalyzerError::Config(format!("Failed to parse config file {}: {}", path.display(), e)))
    }

    /// Overrides settings with values returned by `lookup`
    ///
    /// `lookup` receives an environment variable name and returns its
    /// non-empty value, if any.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("GEMINI_API_KEY") {
            self.gemini.api_key = key;
        }
        if let Some(model) = lookup("GEMINI_MODEL") {
            self.gemini.model = model;
        }
        if let Some(base_url) = lookup("GEMINI_API_BASE_URL") {
            self.gemini.base_url = base_url;
        }
        if let Some(timeout) = lookup("GEMINI_TIMEOUT_SECS") {
            self.gemini.timeout_secs = Some(parse_number("GEMINI_TIMEOUT_SECS", &timeout)?);
        }
        if let Some(addr) = lookup("BIND_ADDR") {
            self.server.bind_addr = addr;
        }
        if let Some(origins) = lookup("ALLOWED_ORIGINS") {
            self.server.allowed_origins = parse_origins(&origins);
        }
        if let Some(limit) = lookup("MAX_UPLOAD_BYTES") {
            self.server.max_upload_bytes = parse_number("MAX_UPLOAD_BYTES", &limit)?;
        }
        if let Some(dir) = lookup("FRONTEND_DIR") {
            self.server.frontend_dir = Some(PathBuf::from(dir));
        }
        if let Some(dir) = lookup("UPLOAD_DIR") {
            self.upload_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("LOG_DIR") {
            self.log_dir = PathBuf::from(dir);
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(strict) = lookup("STRICT_SCHEMA") {
            self.analysis.strict_schema = parse_flag("STRICT_SCHEMA", &strict)?;
        }
        if let Some(enabled) = lookup("RATE_LIMITS_ENABLED") {
            self.rate_limits.enabled = parse_flag("RATE_LIMITS_ENABLED", &enabled)?;
        }
        Ok(())
    }

    /// Validates the configuration before the service starts
    pub fn validate(&self) -> Result<()> {
        if self.gemini.api_key.trim().is_empty() {
            return Err(AnalyzerError::Config("GEMINI_API_KEY is required".into()));
        }
        if self.gemini.model.trim().is_empty() {
            return Err(AnalyzerError::Config("Gemini model name is empty".into()));
        }
        if self.server.allowed_origins.is_empty() {
            return Err(AnalyzerError::Config("At least one allowed origin is required".into()));
        }
        for origin in &self.server.allowed_origins {
            check_origin(origin)?;
        }
        Ok(())
    }

    /// Ensures the upload and log directories exist
    pub async fn ensure_directories_exist(&self) -> Result<()> {
        for dir in [&self.upload_dir, &self.log_dir] {
            if !tokio::fs::try_exists(dir).await? {
                tokio::fs::create_dir_all(dir).await?;
            }
        }
        Ok(())
    }

    /// Schema mode handed to the response parser
    pub fn schema_mode(&self) -> SchemaMode {
        if self.analysis.strict_schema {
            SchemaMode::Strict
        } else {
            SchemaMode::Lenient
        }
    }
}

impl GeminiConfig {
    /// Request timeout, if one is configured
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Checks that `origin` is `*` or usable as an `Access-Control-Allow-Origin` value
pub fn check_origin(origin: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(origin)
        .map_err(|e| AnalyzerError::Config(format!("Invalid allowed origin {:?}: {}", origin, e)))
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim()
        .parse()
        .map_err(|_| AnalyzerError::Config(format!("{} must be a number, got {:?}", name, value)))
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AnalyzerError::Config(format!("{} must be a boolean, got {:?}", name, value))),
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gemini-1.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            timeout_secs: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5000".to_string(),
            allowed_origins: vec!["http://127.0.0.1:5500".to_string()],
            max_upload_bytes: 16 * 1024 * 1024,
            frontend_dir: None,
        }
    }
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            enabled: true,
            upload_per_minute: 5,
            process_per_minute: 10,
            per_hour: 50,
            per_day: 200,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gemini: GeminiConfig::default(),
            server: ServerConfig::default(),
            upload_dir: PathBuf::from("uploads"),
            log_dir: PathBuf::from("logs"),
            log_level: "info".to_string(),
            analysis: AnalysisConfig::default(),
            rate_limits: RateLimits::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.upload_dir, PathBuf::from("uploads"));
        assert_eq!(config.log_dir, PathBuf::from("logs"));
        assert_eq!(config.server.allowed_origins, vec!["http://127.0.0.1:5500"]);
        assert_eq!(config.gemini.model, "gemini-1.5-flash");
        assert_eq!(config.schema_mode(), SchemaMode::Lenient);
        assert!(config.gemini.timeout().is_none());
    }

    #[test]
    fn test_missing_api_key_fails_validation() {
        let config = Config::default();
        assert!(matches!(config.validate(), Err(AnalyzerError::Config(_))));
    }

    #[test]
    fn test_env_overrides() -> Result<()> {
        let mut config = Config::default();
        config.apply_overrides(lookup_from(&[
            ("GEMINI_API_KEY", "secret"),
            ("UPLOAD_DIR", "/tmp/uploads"),
            ("ALLOWED_ORIGINS", "http://a.example, http://b.example"),
            ("STRICT_SCHEMA", "true"),
            ("GEMINI_TIMEOUT_SECS", "15"),
        ]))?;

        assert_eq!(config.gemini.api_key, "secret");
        assert_eq!(config.upload_dir, PathBuf::from("/tmp/uploads"));
        assert_eq!(config.server.allowed_origins, vec!["http://a.example", "http://b.example"]);
        assert_eq!(config.schema_mode(), SchemaMode::Strict);
        assert_eq!(config.gemini.timeout(), Some(Duration::from_secs(15)));
        assert!(config.validate().is_ok());
        Ok(())
    }

    #[test]
    fn test_unparseable_origin_fails_validation() {
        let mut config = Config::default();
        config.gemini.api_key = "secret".to_string();
        config.server.allowed_origins = vec!["http://ok.example".to_string(), "http://bad\norigin".to_string()];

        match config.validate() {
            Err(AnalyzerError::Config(message)) => assert!(message.contains("Invalid allowed origin")),
            other => panic!("expected Config error, got {:?}", other),
        }

        config.server.allowed_origins = vec!["*".to_string()];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bad_override_is_rejected() {
        let mut config = Config::default();
        let result = config.apply_overrides(lookup_from(&[("STRICT_SCHEMA", "maybe")]));
        assert!(matches!(result, Err(AnalyzerError::Config(_))));
    }

    #[test]
    fn test_partial_toml_file() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "upload_dir = \"incoming\"\n\n[gemini]\napi_key = \"from-file\"\n")?;

        let config = Config::from_file(&path)?;
        assert_eq!(config.upload_dir, PathBuf::from("incoming"));
        assert_eq!(config.gemini.api_key, "from-file");
        assert_eq!(config.gemini.model, "gemini-1.5-flash");
        assert_eq!(config.rate_limits.upload_per_minute, 5);
        Ok(())
    }

    #[tokio::test]
    async fn test_ensure_directories_exist() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config = Config {
            upload_dir: temp_dir.path().join("uploads"),
            log_dir: temp_dir.path().join("logs"),
            ..Config::default()
        };

        config.ensure_directories_exist().await?;
        assert!(config.upload_dir.is_dir());
        assert!(config.log_dir.is_dir());
        Ok(())
    }
}
