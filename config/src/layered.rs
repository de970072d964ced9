// Layered Configuration
// Support for layered configuration with precedence

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::Config;

/// Layered configuration wrapper
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayeredConfig {
  /// Configuration layers, lowest precedence first
  layers: Vec<ConfigLayer>,
}

/// Configuration layer with source tracking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigLayer {
  /// Layer source
  pub source: ConfigLayerSource,
  /// Configuration values
  pub values: toml::Value,
}

/// Configuration layer source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigLayerSource {
  /// Built-in defaults
  Default,
  /// Global user config
  GlobalConfig,
  /// Project-specific config
  ProjectConfig,
  /// CLI override
  CliOverride,
}

impl LayeredConfig {
  /// Create a new layered configuration
  pub fn new() -> Self {
    Self::default()
  }

  /// Add a layer
  pub fn add_layer(&mut self, layer: ConfigLayer) {
    self.layers.push(layer);
  }

  pub fn sources(&self) -> Vec<ConfigLayerSource> {
    self.layers.iter().map(|layer| layer.source).collect()
  }

  /// Get merged configuration
  pub fn merge(&self) -> toml::Value {
    let mut merged = toml::Value::Table(toml::map::Map::new());
    for layer in &self.layers {
      merge_values(&mut merged, &layer.values);
    }
    merged
  }

  /// Merge every layer and deserialize the result.
  pub fn resolve(&self) -> Result<Config, ConfigError> {
    Ok(self.merge().try_into()?)
  }
}

/// Tables merge key by key; any other value replaces what was there.
fn merge_values(base: &mut toml::Value, overlay: &toml::Value) {
  match (base, overlay) {
    (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
      for (key, value) in overlay_table {
        match base_table.get_mut(key) {
          Some(existing) => merge_values(existing, value),
          None => {
            base_table.insert(key.clone(), value.clone());
          }
        }
      }
    }
    (base, overlay) => *base = overlay.clone(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  fn layer(source: ConfigLayerSource, text: &str) -> ConfigLayer {
    ConfigLayer {
      source,
      values: toml::from_str(text).unwrap(),
    }
  }

  #[test]
  fn later_layers_override_only_the_keys_they_set() {
    let mut layered = LayeredConfig::new();
    layered.add_layer(layer(
      ConfigLayerSource::GlobalConfig,
      r#"
        [review]
        description = "Check this call"
        timeout_secs = 30
      "#,
    ));
    layered.add_layer(layer(
      ConfigLayerSource::ProjectConfig,
      r#"
        [review]
        timeout_secs = 600

        [review.policy]
        allow_edit = false
      "#,
    ));

    let config = layered.resolve().unwrap();
    assert_eq!(config.review.description, "Check this call");
    assert_eq!(config.review.timeout_secs, Some(600));
    assert!(!config.review.policy.allow_edit);
    assert!(config.review.policy.allow_respond);
    assert_eq!(
      layered.sources(),
      vec![ConfigLayerSource::GlobalConfig, ConfigLayerSource::ProjectConfig]
    );
  }

  #[test]
  fn empty_stack_resolves_to_defaults() {
    assert_eq!(LayeredConfig::new().resolve().unwrap(), Config::default());
  }
}
