//! Typed automator configuration
//!
//! Parses an automator YAML file:
//!
//! ```yaml
//! automator:
//!   debug: true
//!   step_delay: 50
//!   iteration_delay: 500
//! scripts:
//!   konami:
//!     iterations: 2
//!     sequence: [upx2, downx2, left, right, left, right, b, a, 250]
//! ```

use automator_core::Action;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};

/// Engine settings from the `automator:` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct AutomatorConfig {
    /// Log every step transition
    #[serde(default)]
    pub debug: bool,

    /// Milliseconds inserted between steps that are not next to a delay action
    #[serde(default)]
    pub step_delay: u64,

    /// Milliseconds inserted between iterations
    #[serde(default)]
    pub iteration_delay: u64,
}

impl AutomatorConfig {
    /// Step delay as a [`Duration`]
    pub fn step_delay_duration(&self) -> Duration {
        Duration::from_millis(self.step_delay)
    }

    /// Iteration delay as a [`Duration`]
    pub fn iteration_delay_duration(&self) -> Duration {
        Duration::from_millis(self.iteration_delay)
    }
}

/// A named action sequence from the `scripts:` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptConfig {
    /// Human-readable name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    /// Description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Number of times to run the sequence
    #[serde(default = "default_iterations")]
    pub iterations: usize,

    /// Raw actions: numbers are delays, strings are tokens
    pub sequence: Vec<serde_json::Value>,
}

fn default_iterations() -> usize {
    1
}

impl ScriptConfig {
    /// Convert the raw sequence into actions
    pub fn actions(&self) -> Vec<Action> {
        self.sequence.iter().cloned().map(Action::from).collect()
    }
}

/// A whole automator configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AutomatorFile {
    /// Engine settings
    #[serde(default)]
    pub automator: AutomatorConfig,

    /// Named scripts
    #[serde(default)]
    pub scripts: HashMap<String, ScriptConfig>,
}

impl AutomatorFile {
    /// Look up a script by name
    pub fn script(&self, name: &str) -> Option<&ScriptConfig> {
        self.scripts.get(name)
    }

    /// Check values serde cannot express
    pub fn validate(&self) -> ConfigResult<()> {
        for (name, script) in &self.scripts {
            if script.iterations == 0 {
                return Err(ConfigError::InvalidValue {
                    key: format!("scripts.{}.iterations", name),
                    reason: "must be at least 1".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Parse and validate a YAML document
    ///
    /// `origin` names the document in error messages. An empty document
    /// yields the defaults.
    fn parse(content: &str, origin: &str) -> ConfigResult<Self> {
        let malformed = |source: serde_yaml::Error| ConfigError::Malformed {
            origin: origin.to_string(),
            source,
        };

        // An empty document, or one holding only comments, parses as null
        let value: serde_yaml::Value = serde_yaml::from_str(content).map_err(malformed)?;
        if value.is_null() {
            return Ok(Self::default());
        }

        let file: Self = serde_yaml::from_value(value).map_err(malformed)?;
        file.validate()?;
        Ok(file)
    }
}

/// Load and validate an automator configuration file
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<AutomatorFile> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;

    let file = AutomatorFile::parse(&content, &path.display().to_string())?;
    debug!(path = %path.display(), scripts = file.scripts.len(), "Loaded automator configuration");
    Ok(file)
}

/// Load and validate automator configuration from a string
pub fn load_config_str(content: &str) -> ConfigResult<AutomatorFile> {
    AutomatorFile::parse(content, "<inline>")
}
