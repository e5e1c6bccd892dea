use jacklib::TextEncoding;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// How the CLI loads libjack and opens its client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BindingConfig {
    /// Explicit libjack path; the platform default when absent.
    pub library: Option<PathBuf>,
    pub encoding: TextEncoding,
    pub client_name: String,
    pub start_server: bool,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            library: None,
            encoding: TextEncoding::Utf8,
            client_name: "jacklib-cli".to_string(),
            start_server: false,
        }
    }
}

impl BindingConfig {
    pub fn from_toml(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|e| format!("Invalid config: {e}"))
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config '{}': {e}", path.display()))?;
        let config = Self::from_toml(&text)?;
        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Loads `path` when given, the defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, String> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }
}
