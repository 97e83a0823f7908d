//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Runtime environment enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    /// Development mode - relaxed validation, warnings only
    #[default]
    Development,
    /// Staging mode - stricter validation
    Staging,
    /// Production mode - all validations enforced
    Production,
}

impl RuntimeEnvironment {
    /// Check if this is a production environment
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    /// Check if strict validation should be applied
    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Runtime environment (development, staging, production)
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Answer generator (LLM) endpoints and keys
    #[serde(default)]
    pub generator: GeneratorSettings,

    /// Transcript validator endpoint
    #[serde(default)]
    pub validator: ValidatorSettings,

    /// Knowledge-management search endpoint
    #[serde(default)]
    pub km: KmSettings,

    /// Speech synthesis vendor
    #[serde(default)]
    pub speech: SpeechSettings,

    /// Audio cache storage
    #[serde(default)]
    pub cache: CacheSettings,

    /// Organisation configuration documents
    #[serde(default)]
    pub org: OrgSettings,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// CORS allowed origins
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Watchdog for a whole answer stream; on expiry the stream is closed
    /// with an error instead of hanging
    #[serde(default = "default_answer_timeout")]
    pub answer_timeout_seconds: u64,
}

/// Generator provider endpoints.
///
/// Both providers speak the OpenAI chat-completions protocol; the Groq
/// provider is selected by a `groq/` model prefix in the localisation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorSettings {
    #[serde(default = "default_openai_endpoint")]
    pub openai_endpoint: String,

    #[serde(default)]
    pub openai_api_key: Option<String>,

    #[serde(default = "default_groq_endpoint")]
    pub groq_endpoint: String,

    #[serde(default)]
    pub groq_api_key: Option<String>,

    /// Request timeout for a whole generation stream
    #[serde(default = "default_generator_timeout")]
    pub timeout_seconds: u64,
}

/// Transcript validator endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorSettings {
    #[serde(default)]
    pub endpoint: String,

    #[serde(default = "default_validator_timeout")]
    pub timeout_seconds: u64,
}

/// Knowledge-management search endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KmSettings {
    #[serde(default)]
    pub endpoint: String,

    /// Bearer token for the KM API
    #[serde(default)]
    pub token: Option<String>,
}

/// Speech synthesis vendor configuration.
///
/// Key and region may also come from the organisation configuration; the
/// values here are the process-wide fallback. Absent on both levels means
/// TTS is disabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechSettings {
    #[serde(default)]
    pub key: Option<String>,

    #[serde(default)]
    pub region: Option<String>,

    /// Vendor output format header value
    #[serde(default = "default_speech_output_format")]
    pub output_format: String,
}

/// Audio cache storage configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CacheSettings {
    /// Directory for the on-disk audio cache; unset keeps audio in memory
    #[serde(default)]
    pub audio_dir: Option<String>,
}

/// Organisation configuration documents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrgSettings {
    /// Directory holding `{org_id}/{config_id}.json` documents
    #[serde(default = "default_org_dir")]
    pub config_dir: String,
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_true() -> bool {
    true
}
fn default_answer_timeout() -> u64 {
    120
}
fn default_openai_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_groq_endpoint() -> String {
    "https://api.groq.com/openai/v1".to_string()
}
fn default_generator_timeout() -> u64 {
    60
}
fn default_validator_timeout() -> u64 {
    30
}
fn default_speech_output_format() -> String {
    "audio-16khz-128kbitrate-mono-mp3".to_string()
}
fn default_org_dir() -> String {
    "config/orgs".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_enabled: default_true(),
            // Empty by default - must be explicitly configured for production
            cors_origins: Vec::new(),
            answer_timeout_seconds: default_answer_timeout(),
        }
    }
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            openai_endpoint: default_openai_endpoint(),
            openai_api_key: None,
            groq_endpoint: default_groq_endpoint(),
            groq_api_key: None,
            timeout_seconds: default_generator_timeout(),
        }
    }
}

impl Default for ValidatorSettings {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            timeout_seconds: default_validator_timeout(),
        }
    }
}

impl Default for KmSettings {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            token: None,
        }
    }
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            key: None,
            region: None,
            output_format: default_speech_output_format(),
        }
    }
}

impl Default for OrgSettings {
    fn default() -> Self {
        Self {
            config_dir: default_org_dir(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

impl Settings {
    /// Create default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_upstreams()?;
        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.port".to_string(),
                message: "Port cannot be 0".to_string(),
            });
        }

        if self.server.answer_timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.answer_timeout_seconds".to_string(),
                message: "Answer watchdog must be at least 1 second".to_string(),
            });
        }

        if self.environment.is_production()
            && self.server.cors_enabled
            && self.server.cors_origins.is_empty()
        {
            tracing::warn!(
                "CORS is enabled in production but no origins are configured. \
                 This may block legitimate requests."
            );
        }

        Ok(())
    }

    fn validate_upstreams(&self) -> Result<(), ConfigError> {
        if self.generator.openai_endpoint.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "generator.openai_endpoint".to_string(),
                message: "Endpoint cannot be empty".to_string(),
            });
        }

        if self.generator.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "generator.timeout_seconds".to_string(),
                message: "Timeout must be at least 1 second".to_string(),
            });
        }

        if self.environment.is_strict() {
            if self.km.endpoint.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "km.endpoint".to_string(),
                    message: "KM endpoint is required in production".to_string(),
                });
            }
            if self.validator.endpoint.is_empty() {
                tracing::warn!("validator.endpoint not configured; validation will fall back");
            }
        }

        // One key without the other is a misconfiguration either way
        if self.speech.key.is_some() != self.speech.region.is_some() {
            return Err(ConfigError::InvalidValue {
                field: "speech".to_string(),
                message: "speech.key and speech.region must be set together".to_string(),
            });
        }

        Ok(())
    }
}

/// Load settings from files and environment
///
/// Priority (highest to lowest):
/// 1. Environment variables (ANSWERFLOW prefix)
/// 2. config/{env}.yaml (if env specified)
/// 3. config/default.yaml
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    // Load default config
    builder = builder.add_source(File::with_name("config/default").required(false));

    // Load environment-specific config
    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }

    // Load from environment variables
    builder = builder.add_source(
        Environment::with_prefix("ANSWERFLOW")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    // Validate
    settings.validate()?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.server.answer_timeout_seconds, 120);
        assert!(settings.speech.key.is_none());
    }

    #[test]
    fn test_server_validation() {
        let mut settings = Settings::default();

        settings.server.port = 0;
        assert!(settings.validate().is_err());
        settings.server.port = 8080;

        settings.server.answer_timeout_seconds = 0;
        assert!(settings.validate().is_err());
        settings.server.answer_timeout_seconds = 120;

        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_speech_key_region_pairing() {
        let mut settings = Settings::default();
        settings.speech.key = Some("k".into());
        assert!(settings.validate().is_err());

        settings.speech.region = Some("southeastasia".into());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_production_requires_km_endpoint() {
        let mut settings = Settings::default();
        settings.environment = RuntimeEnvironment::Production;
        assert!(settings.validate().is_err());

        settings.km.endpoint = "https://km.example.com/search".into();
        assert!(settings.validate().is_ok());
    }
}
