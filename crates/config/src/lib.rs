//! Configuration management for the answer-generation service
//!
//! Supports loading configuration from:
//! - YAML files (`config/default.yaml`, `config/{env}.yaml`)
//! - Environment variables (`ANSWERFLOW` prefix, `__` separator)
//!
//! Organisation configuration documents (per org + config id) are served
//! by an [`OrgConfigStore`]; the bundled [`FileOrgStore`] reads JSON
//! documents from disk, while production deployments put their own store
//! behind the same trait.

pub mod org;
pub mod settings;

pub use org::{FileOrgStore, OrgConfigStore};
pub use settings::{
    load_settings, CacheSettings, GeneratorSettings, KmSettings, ObservabilityConfig,
    OrgSettings, RuntimeEnvironment, ServerConfig, Settings, SpeechSettings, ValidatorSettings,
};

use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}
