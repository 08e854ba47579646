//! Application configuration management
//!
//! Configuration is read from an optional TOML file and then overridden by
//! environment variables. Everything is validated once at startup so a
//! misconfigured server fails fast. A missing API key is NOT a startup error:
//! credential-requiring endpoints answer 500 instead.

use crate::core::constants::{upstream, DEFAULT_ALLOWED_ORIGINS};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Default studio API port
const DEFAULT_PORT: u16 = 5000;

/// Default audio service port
const DEFAULT_AUDIO_PORT: u16 = 5001;

/// Default upstream request timeout in seconds
const DEFAULT_REQUEST_TIMEOUT: u64 = 90;

/// Default conversion tool timeout in seconds
const DEFAULT_CONVERSION_TIMEOUT: u64 = 120;

/// Default upload cap (25 MiB)
const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_audio_port")]
    pub audio_port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            audio_port: default_audio_port(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_image_model")]
    pub image_model: String,
    #[serde(default = "default_text_model")]
    pub text_model: String,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_speech_model")]
    pub speech_model: String,
    #[serde(default = "default_speech_voice")]
    pub speech_voice: String,
    #[serde(default = "default_video_model")]
    pub video_model: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            image_model: default_image_model(),
            text_model: default_text_model(),
            chat_model: default_chat_model(),
            speech_model: default_speech_model(),
            speech_voice: default_speech_voice(),
            video_model: default_video_model(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequestConfig {
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            request_timeout: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,
    #[serde(default = "default_conversion_timeout")]
    pub conversion_timeout: u64,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            conversion_timeout: default_conversion_timeout(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_audio_port() -> u16 {
    DEFAULT_AUDIO_PORT
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_base_url() -> String {
    upstream::GEMINI_BASE_URL.to_string()
}

fn default_image_model() -> String {
    upstream::IMAGE_MODEL.to_string()
}

fn default_text_model() -> String {
    upstream::TEXT_MODEL.to_string()
}

fn default_chat_model() -> String {
    upstream::CHAT_MODEL.to_string()
}

fn default_speech_model() -> String {
    upstream::SPEECH_MODEL.to_string()
}

fn default_speech_voice() -> String {
    upstream::SPEECH_VOICE.to_string()
}

fn default_video_model() -> String {
    upstream::VIDEO_MODEL.to_string()
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT
}

fn default_allowed_origins() -> Vec<String> {
    DEFAULT_ALLOWED_ORIGINS.iter().map(|o| o.to_string()).collect()
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_conversion_timeout() -> u64 {
    DEFAULT_CONVERSION_TIMEOUT
}

fn default_max_upload_bytes() -> usize {
    DEFAULT_MAX_UPLOAD_BYTES
}

/// Raw shape of `config.toml`; every section is optional
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub request: RequestConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub audio: AudioConfig,
}

/// Effective configuration shared by both services
#[derive(Debug, Clone)]
pub struct Config {
    /// Upstream credential, if configured
    pub api_key: Option<String>,

    /// Gemini REST base URL
    pub gemini_base_url: String,

    /// Image generation model
    pub image_model: String,

    /// Text model for prompt enhancement and MIDI
    pub text_model: String,

    /// Model behind the chat stream
    pub chat_model: String,

    /// Text-to-speech model and its prebuilt voice
    pub speech_model: String,
    pub speech_voice: String,

    /// Video generation model
    pub video_model: String,

    /// Server host address
    pub host: String,

    /// Studio API port
    pub port: u16,

    /// Audio service port
    pub audio_port: u16,

    /// Logging level
    pub log_level: String,

    /// Upstream request timeout in seconds
    pub request_timeout: u64,

    /// Origin patterns accepted by the CORS policy
    pub allowed_origins: Vec<String>,

    /// Conversion tool executable
    pub ffmpeg_path: String,

    /// Conversion timeout in seconds
    pub conversion_timeout: u64,

    /// Maximum accepted upload size in bytes
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default())
    }
}

impl Config {
    fn from_toml(config: TomlConfig) -> Self {
        Config {
            api_key: config.gemini.api_key.filter(|k| !k.trim().is_empty()),
            gemini_base_url: config.gemini.base_url,
            image_model: config.gemini.image_model,
            text_model: config.gemini.text_model,
            chat_model: config.gemini.chat_model,
            speech_model: config.gemini.speech_model,
            speech_voice: config.gemini.speech_voice,
            video_model: config.gemini.video_model,
            host: config.server.host,
            port: config.server.port,
            audio_port: config.server.audio_port,
            log_level: config.server.log_level,
            request_timeout: config.request.request_timeout,
            allowed_origins: config.cors.allowed_origins,
            ffmpeg_path: config.audio.ffmpeg_path,
            conversion_timeout: config.audio.conversion_timeout,
            max_upload_bytes: config.audio.max_upload_bytes,
        }
    }

    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read configuration file")?;
        let config: TomlConfig =
            toml::from_str(&content).context("Failed to parse TOML configuration")?;
        Ok(Self::from_toml(config))
    }

    /// Load `CONFIG_PATH` (default `config.toml`) if present, then apply
    /// environment overrides and validate.
    pub fn from_env() -> Result<Self> {
        Self::load(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::from_env`] with an injectable variable lookup
    pub fn load<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let explicit_path = lookup("CONFIG_PATH");
        let path = explicit_path
            .clone()
            .unwrap_or_else(|| "config.toml".to_string());

        let mut config = if Path::new(&path).exists() {
            Self::from_file(&path).with_context(|| format!("Loading {}", path))?
        } else if explicit_path.is_some() {
            bail!("Configuration file {} does not exist", path);
        } else {
            Self::default()
        };

        config.apply_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("API_KEY").filter(|k| !k.trim().is_empty()) {
            self.api_key = Some(key);
        }
        if let Some(url) = lookup("GEMINI_BASE_URL") {
            self.gemini_base_url = url;
        }
        if let Some(host) = lookup("HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.port = port.parse().context("PORT must be a valid port number")?;
        }
        if let Some(port) = lookup("AUDIO_PORT") {
            self.audio_port = port
                .parse()
                .context("AUDIO_PORT must be a valid port number")?;
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(origins) = lookup("ALLOWED_ORIGINS") {
            self.allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(path) = lookup("FFMPEG_PATH") {
            self.ffmpeg_path = path;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.port == 0 || self.audio_port == 0 {
            bail!("Server ports must be non-zero");
        }
        if self.request_timeout == 0 {
            bail!("request_timeout must be greater than zero");
        }
        if self.conversion_timeout == 0 {
            bail!("conversion_timeout must be greater than zero");
        }
        if self.allowed_origins.is_empty() {
            bail!("At least one allowed origin must be configured");
        }
        if self.max_upload_bytes == 0 {
            bail!("max_upload_bytes must be greater than zero");
        }
        Ok(())
    }

    /// Whether an upstream credential is available
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// API key with all but the last four characters masked
    pub fn redacted_api_key(&self) -> String {
        match &self.api_key {
            Some(key) if key.chars().count() > 4 => {
                let tail: String = key.chars().skip(key.chars().count() - 4).collect();
                format!("****{}", tail)
            }
            Some(_) => "****".to_string(),
            None => "(not set)".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_config() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            [server]
            host = "127.0.0.1"
            port = 8080
            log_level = "debug"

            [gemini]
            api_key = "file-key-1234"
            image_model = "imagen-test"

            [cors]
            allowed_origins = ["http://localhost:5173"]

            [audio]
            ffmpeg_path = "/usr/local/bin/ffmpeg"
            conversion_timeout = 30
        "#
        )
        .unwrap();
        file.flush().unwrap();
        file
    }

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_load_config_file() {
        let file = create_test_config();
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.audio_port, DEFAULT_AUDIO_PORT);
        assert_eq!(config.api_key.as_deref(), Some("file-key-1234"));
        assert_eq!(config.image_model, "imagen-test");
        assert_eq!(config.text_model, upstream::TEXT_MODEL);
        assert_eq!(config.allowed_origins, vec!["http://localhost:5173"]);
        assert_eq!(config.conversion_timeout, 30);
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(config.chat_model, upstream::CHAT_MODEL);
        assert_eq!(config.speech_voice, upstream::SPEECH_VOICE);
    }

    #[test]
    fn test_example_config_matches_defaults() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config.example.toml");
        let example = Config::from_file(path).unwrap();
        let defaults = Config::default();

        let mut example_origins = example.allowed_origins.clone();
        let mut default_origins = defaults.allowed_origins.clone();
        example_origins.sort();
        default_origins.sort();
        assert_eq!(example_origins, default_origins);
        assert!(example_origins.contains(&"https://audiomancer-aii.vercel.app".to_string()));

        assert_eq!(example.port, defaults.port);
        assert_eq!(example.audio_port, defaults.audio_port);
        assert_eq!(example.image_model, defaults.image_model);
        assert_eq!(example.chat_model, defaults.chat_model);
        assert_eq!(example.speech_model, defaults.speech_model);
        assert_eq!(example.video_model, defaults.video_model);
        assert_eq!(example.max_upload_bytes, defaults.max_upload_bytes);
    }

    #[test]
    fn test_defaults_without_file() {
        let config = Config::load(env_from(&[])).unwrap();
        assert!(!config.has_api_key());
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.image_model, upstream::IMAGE_MODEL);
        assert_eq!(config.allowed_origins.len(), DEFAULT_ALLOWED_ORIGINS.len());
    }

    #[test]
    fn test_env_overrides_file() {
        let file = create_test_config();
        let path = file.path().to_string_lossy().to_string();
        let config = Config::load(env_from(&[
            ("CONFIG_PATH", path.as_str()),
            ("API_KEY", "env-key-9999"),
            ("PORT", "9000"),
            ("ALLOWED_ORIGINS", "https://a.example, https://*.b.example"),
        ]))
        .unwrap();
        assert_eq!(config.api_key.as_deref(), Some("env-key-9999"));
        assert_eq!(config.port, 9000);
        assert_eq!(
            config.allowed_origins,
            vec!["https://a.example", "https://*.b.example"]
        );
        assert_eq!(config.ffmpeg_path, "/usr/local/bin/ffmpeg");
    }

    #[test]
    fn test_blank_api_key_is_missing() {
        let config = Config::load(env_from(&[("API_KEY", "   ")])).unwrap();
        assert!(!config.has_api_key());
    }

    #[test]
    fn test_missing_explicit_config_path_fails() {
        let result = Config::load(env_from(&[("CONFIG_PATH", "/definitely/not/here.toml")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_port_fails() {
        assert!(Config::load(env_from(&[("PORT", "not-a-port")])).is_err());
        assert!(Config::load(env_from(&[("PORT", "0")])).is_err());
    }

    #[test]
    fn test_empty_origins_fails() {
        assert!(Config::load(env_from(&[("ALLOWED_ORIGINS", " , ")])).is_err());
    }

    #[test]
    fn test_redacted_api_key() {
        let mut config = Config::default();
        assert_eq!(config.redacted_api_key(), "(not set)");
        config.api_key = Some("abcdefgh".to_string());
        assert_eq!(config.redacted_api_key(), "****efgh");
    }
}
