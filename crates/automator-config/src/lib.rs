//! YAML configuration for the automator
//!
//! A single YAML document holds the engine settings (`debug`, `step_delay`,
//! `iteration_delay`) and any number of named scripts.
//!
//! # Example
//!
//! ```ignore
//! use automator_config::load_config;
//!
//! let file = load_config("/etc/automator.yaml")?;
//! let konami = file.script("konami").expect("script defined");
//! let actions = konami.actions();
//! ```

mod error;
mod settings;

pub use error::{ConfigError, ConfigResult};
pub use settings::{load_config, load_config_str, AutomatorConfig, AutomatorFile, ScriptConfig};
