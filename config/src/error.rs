use std::path::PathBuf;

/// Failures while loading configuration or the server manifest.
///
/// These surface at startup, before any tool is wrapped or any review is requested.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("failed to read {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("invalid TOML in {path}: {source}")]
  Toml {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },
  #[error("invalid configuration: {0}")]
  Invalid(#[from] toml::de::Error),
  #[error("failed to encode configuration: {0}")]
  Encode(#[from] toml::ser::Error),
  #[error("invalid manifest {path}: {source}")]
  Json {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
  #[error("invalid override `{0}`, expected KEY=VALUE")]
  InvalidOverride(String),
  #[error("server `{name}`: {reason}")]
  InvalidServer { name: String, reason: String },
}
