use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_RESULT_PLACEHOLDER: &str = "No results yet. Click a button to execute code.";
pub const DEFAULT_INPUT_PLACEHOLDER: &str = "Enter text...";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub sandbox: SandboxConfig,
    pub render: RenderConfig,
}

/// Resource limits for each VM. Zero means unlimited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    pub memory_limit: usize,
    pub max_stack_size: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        SandboxConfig {
            memory_limit: 32 * 1024 * 1024,
            max_stack_size: 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub result_placeholder: String,
    pub input_placeholder: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            result_placeholder: DEFAULT_RESULT_PLACEHOLDER.to_string(),
            input_placeholder: DEFAULT_INPUT_PLACEHOLDER.to_string(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), "loaded runtime config");
        Ok(config)
    }
}
