// Server Manifest
// Named tool-server endpoints the host connects to before wrapping their tools

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;

/// Transport used to reach a tool server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
  #[default]
  Stdio,
  Sse,
  StreamableHttp,
  Websocket,
}

impl Transport {
  pub fn as_str(&self) -> &'static str {
    match self {
      Transport::Stdio => "stdio",
      Transport::Sse => "sse",
      Transport::StreamableHttp => "streamable_http",
      Transport::Websocket => "websocket",
    }
  }
}

/// One entry under `servers`. Fields that do not apply to the transport are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerEntry {
  #[serde(default)]
  pub transport: Transport,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub command: Option<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub args: Vec<String>,
  #[serde(default, skip_serializing_if = "HashMap::is_empty")]
  pub env: HashMap<String, String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub cwd: Option<PathBuf>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub url: Option<String>,
  #[serde(default, skip_serializing_if = "HashMap::is_empty")]
  pub headers: HashMap<String, String>,
}

/// Validated, transport-specific connection parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerConnection {
  Stdio {
    command: String,
    args: Vec<String>,
    env: HashMap<String, String>,
    cwd: Option<PathBuf>,
  },
  Remote {
    transport: Transport,
    url: String,
    headers: HashMap<String, String>,
  },
}

impl ServerEntry {
  pub fn connection(&self, name: &str) -> Result<ServerConnection, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidServer {
      name: name.to_string(),
      reason: reason.to_string(),
    };

    match self.transport {
      Transport::Stdio => {
        let command = self
          .command
          .as_deref()
          .map(str::trim)
          .filter(|command| !command.is_empty())
          .ok_or_else(|| invalid("stdio transport requires `command`"))?;
        Ok(ServerConnection::Stdio {
          command: command.to_string(),
          args: self.args.clone(),
          env: self.env.clone(),
          cwd: self.cwd.clone(),
        })
      }
      transport => {
        let url = self
          .url
          .as_deref()
          .map(str::trim)
          .filter(|url| !url.is_empty())
          .ok_or_else(|| invalid(&format!("{} transport requires `url`", transport.as_str())))?;
        Ok(ServerConnection::Remote {
          transport,
          url: url.to_string(),
          headers: self.headers.clone(),
        })
      }
    }
  }
}

/// `{"servers": {<name>: <entry>}}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerManifest {
  #[serde(default)]
  pub servers: BTreeMap<String, ServerEntry>,
}

impl ServerManifest {
  /// Read and validate a manifest file.
  pub async fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = tokio::fs::read_to_string(path)
      .await
      .map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
      })?;
    let manifest: Self = serde_json::from_str(&content).map_err(|source| ConfigError::Json {
      path: path.to_path_buf(),
      source,
    })?;
    manifest.validate()?;
    info!(
      path = %path.display(),
      servers = manifest.servers.len(),
      "loaded server manifest"
    );
    Ok(manifest)
  }

  /// Every entry must describe a usable connection.
  pub fn validate(&self) -> Result<(), ConfigError> {
    for (name, entry) in &self.servers {
      entry.connection(name)?;
    }
    Ok(())
  }

  pub fn connections(&self) -> Result<Vec<(String, ServerConnection)>, ConfigError> {
    self
      .servers
      .iter()
      .map(|(name, entry)| Ok((name.clone(), entry.connection(name)?)))
      .collect()
  }
}
