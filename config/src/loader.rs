// Configuration Loader
// Layered configuration loading system

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ConfigError;
use crate::layered::{ConfigLayer, ConfigLayerSource, LayeredConfig};
use crate::manifest::ServerManifest;
use crate::types::Config;

/// Configuration loader with layered support
pub struct ConfigLoader {
  /// Global config directory
  global_dir: PathBuf,
  /// Project config directory
  project_dir: Option<PathBuf>,
}

impl ConfigLoader {
  /// Create a new configuration loader
  pub fn new() -> Self {
    let global_dir = dirs::home_dir()
      .unwrap_or_else(|| PathBuf::from("."))
      .join(".tollgate");

    Self {
      global_dir,
      project_dir: None,
    }
  }

  /// Override the global config directory
  pub fn with_global_dir(mut self, dir: PathBuf) -> Self {
    self.global_dir = dir;
    self
  }

  /// Set project directory
  pub fn with_project_dir(mut self, dir: PathBuf) -> Self {
    self.project_dir = Some(dir);
    self
  }

  /// Load configuration with CLI overrides
  pub fn load_with_cli_overrides(&self, cli_overrides: &[String]) -> Result<Config, ConfigError> {
    self.layers(cli_overrides)?.resolve()
  }

  /// Build the layer stack:
  /// 1. Built-in defaults
  /// 2. Global config (~/.tollgate/config.toml)
  /// 3. Project config (.tollgate/config.toml)
  /// 4. CLI overrides
  pub fn layers(&self, cli_overrides: &[String]) -> Result<LayeredConfig, ConfigError> {
    let mut layered = LayeredConfig::new();
    layered.add_layer(ConfigLayer {
      source: ConfigLayerSource::Default,
      values: toml::Value::try_from(Config::default())?,
    });

    if let Some(values) = read_layer(&self.global_dir.join("config.toml"))? {
      layered.add_layer(ConfigLayer {
        source: ConfigLayerSource::GlobalConfig,
        values,
      });
    }

    if let Some(project_dir) = &self.project_dir {
      let path = project_dir.join(".tollgate").join("config.toml");
      if let Some(values) = read_layer(&path)? {
        layered.add_layer(ConfigLayer {
          source: ConfigLayerSource::ProjectConfig,
          values,
        });
      }
    }

    if !cli_overrides.is_empty() {
      let mut table = toml::Value::Table(toml::map::Map::new());
      for raw in cli_overrides {
        apply_override(&mut table, raw)?;
      }
      layered.add_layer(ConfigLayer {
        source: ConfigLayerSource::CliOverride,
        values: table,
      });
    }

    Ok(layered)
  }

  /// Load the tool-server manifest named by the config, or `mcp.json` in the project dir.
  pub async fn load_manifest(&self, config: &Config) -> Result<ServerManifest, ConfigError> {
    let path = match &config.manifest.path {
      Some(path) => path.clone(),
      None => self
        .project_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mcp.json"),
    };
    ServerManifest::load(&path).await
  }
}

impl Default for ConfigLoader {
  fn default() -> Self {
    Self::new()
  }
}

/// Missing files are skipped; unreadable or malformed ones are errors.
fn read_layer(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
  if !path.exists() {
    debug!(path = %path.display(), "config layer not present");
    return Ok(None);
  }
  let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
    path: path.to_path_buf(),
    source,
  })?;
  let values = toml::from_str(&content).map_err(|source| ConfigError::Toml {
    path: path.to_path_buf(),
    source,
  })?;
  debug!(path = %path.display(), "loaded config layer");
  Ok(Some(values))
}

/// Apply a single `dotted.key=value` override. Values parse as TOML literals and fall
/// back to plain strings.
fn apply_override(table: &mut toml::Value, raw: &str) -> Result<(), ConfigError> {
  let (key, value) = raw
    .split_once('=')
    .ok_or_else(|| ConfigError::InvalidOverride(raw.to_string()))?;
  let key = key.trim();
  if key.is_empty() || key.split('.').any(str::is_empty) {
    return Err(ConfigError::InvalidOverride(raw.to_string()));
  }

  let value = parse_literal(value.trim());
  let mut segments = key.split('.').peekable();
  let mut cursor = table;
  while let Some(segment) = segments.next() {
    let toml::Value::Table(current) = cursor else {
      return Err(ConfigError::InvalidOverride(raw.to_string()));
    };
    if segments.peek().is_none() {
      current.insert(segment.to_string(), value);
      return Ok(());
    }
    cursor = current
      .entry(segment.to_string())
      .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
  }
  Ok(())
}

fn parse_literal(value: &str) -> toml::Value {
  #[derive(serde::Deserialize)]
  struct Probe {
    v: toml::Value,
  }
  toml::from_str::<Probe>(&format!("v = {value}"))
    .map(|probe| probe.v)
    .unwrap_or_else(|_| toml::Value::String(value.to_string()))
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;
  use tollgate_protocol::ReviewPolicy;

  fn loader(global: &Path, project: &Path) -> ConfigLoader {
    ConfigLoader::new()
      .with_global_dir(global.to_path_buf())
      .with_project_dir(project.to_path_buf())
  }

  #[test]
  fn defaults_apply_without_files() {
    let global = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();

    let config = loader(global.path(), project.path())
      .load_with_cli_overrides(&[])
      .unwrap();
    assert_eq!(config, Config::default());
    assert_eq!(config.review.description, "Please review the tool call");
    assert_eq!(config.review.policy, ReviewPolicy::default());
  }

  #[test]
  fn project_and_cli_layers_take_precedence() {
    let global = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    std::fs::write(
      global.path().join("config.toml"),
      "[review]\ntimeout_secs = 30\ndescription = \"global\"\n",
    )
    .unwrap();
    std::fs::create_dir_all(project.path().join(".tollgate")).unwrap();
    std::fs::write(
      project.path().join(".tollgate").join("config.toml"),
      "[review]\ntimeout_secs = 90\n",
    )
    .unwrap();

    let config = loader(global.path(), project.path())
      .load_with_cli_overrides(&[
        "review.policy.allow_ignore=false".to_string(),
        "state.db_path=/tmp/reviews.db".to_string(),
      ])
      .unwrap();

    assert_eq!(config.review.description, "global");
    assert_eq!(config.review.timeout_secs, Some(90));
    assert!(!config.review.policy.allow_ignore);
    assert_eq!(
      config.state.db_path,
      Some(PathBuf::from("/tmp/reviews.db"))
    );
  }

  #[test]
  fn malformed_layer_is_reported_with_its_path() {
    let global = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    std::fs::write(global.path().join("config.toml"), "[review\n").unwrap();

    let err = loader(global.path(), project.path())
      .load_with_cli_overrides(&[])
      .unwrap_err();
    assert!(matches!(err, ConfigError::Toml { .. }));
  }

  #[test]
  fn override_without_equals_is_rejected() {
    let mut table = toml::Value::Table(toml::map::Map::new());
    assert!(matches!(
      apply_override(&mut table, "review.timeout_secs"),
      Err(ConfigError::InvalidOverride(_))
    ));
    assert!(matches!(
      apply_override(&mut table, "review..timeout_secs=3"),
      Err(ConfigError::InvalidOverride(_))
    ));
  }

  #[test]
  fn wrongly_typed_override_fails_resolution() {
    let global = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();
    let err = loader(global.path(), project.path())
      .load_with_cli_overrides(&["review.timeout_secs=soon".to_string()])
      .unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
  }
}
