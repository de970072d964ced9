// Configuration Types
// All configuration type definitions

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use tollgate_protocol::ReviewPolicy;

/// Description attached to every review request unless configured otherwise.
pub const DEFAULT_REVIEW_DESCRIPTION: &str = "Please review the tool call";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Review gate settings
  pub review: ReviewConfig,
  /// Correlation store settings
  pub state: StateConfig,
  /// Tool-server manifest location
  pub manifest: ManifestConfig,
}

// ============================================================================
// REVIEW CONFIGURATION
// ============================================================================

/// Review gate settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
  /// Text shown to the reviewer alongside each proposed call
  pub description: String,
  /// Abandon a parked review after this many seconds; unset waits forever
  pub timeout_secs: Option<u64>,
  /// How often the broker polls the store for out-of-process decisions
  pub watch_interval_ms: u64,
  /// Outcomes the reviewer may choose by default
  pub policy: ReviewPolicy,
}

impl Default for ReviewConfig {
  fn default() -> Self {
    Self {
      description: DEFAULT_REVIEW_DESCRIPTION.to_string(),
      timeout_secs: None,
      watch_interval_ms: 500,
      policy: ReviewPolicy::default(),
    }
  }
}

impl ReviewConfig {
  pub fn timeout(&self) -> Option<std::time::Duration> {
    self.timeout_secs.map(std::time::Duration::from_secs)
  }

  pub fn watch_interval(&self) -> std::time::Duration {
    std::time::Duration::from_millis(self.watch_interval_ms.max(1))
  }
}

// ============================================================================
// STATE CONFIGURATION
// ============================================================================

/// Correlation store settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
  /// SQLite database path
  pub db_path: Option<PathBuf>,
}

impl StateConfig {
  /// Configured path, falling back to `~/.tollgate/reviews.db`.
  pub fn resolved_db_path(&self) -> PathBuf {
    self.db_path.clone().unwrap_or_else(|| {
      dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tollgate")
        .join("reviews.db")
    })
  }
}

// ============================================================================
// MANIFEST CONFIGURATION
// ============================================================================

/// Tool-server manifest location
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestConfig {
  /// Manifest path; defaults to `mcp.json` in the project directory
  pub path: Option<PathBuf>,
}
