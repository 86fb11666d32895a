//! Runtime settings.
//!
//! Settings come from an optional TOML file layered with `TOPICWATCH_*`
//! environment variables; command-line flags are applied on top in `main`.
//!
//! ```toml
//! refresh_ms = 500
//! value_column_max = 120
//! msg_paths = ["/opt/ros/share"]
//!
//! [[types]]
//! name = "demo/Pose2D"
//! definition = "float64 x\nfloat64 y\nfloat64 theta"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use tracing::info;

use crate::data::format::VALUE_COLUMN_MAX;
use crate::data::refresh::{PanelOptions, DEFAULT_REFRESH};
use crate::data::TypeRegistry;
use crate::monitor::DEFAULT_WINDOW;
use crate::source::HubOptions;
use crate::ui::ColumnLayout;

/// Prefix of environment overrides, e.g. `TOPICWATCH_REFRESH_MS`.
pub const ENV_PREFIX: &str = "TOPICWATCH";

/// An inline message definition.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TypeDefinition {
    pub name: String,
    pub definition: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Refresh period in milliseconds.
    pub refresh_ms: u64,
    pub value_column_max: u16,
    /// Arrivals kept per monitored topic.
    pub window_size: usize,
    /// Forget topics silent for this long.
    pub topic_ttl_secs: Option<u64>,
    pub monitor_on_start: bool,
    /// Directories searched for `.msg` files.
    pub msg_paths: Vec<PathBuf>,
    pub types: Vec<TypeDefinition>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            refresh_ms: DEFAULT_REFRESH.as_millis() as u64,
            value_column_max: VALUE_COLUMN_MAX,
            window_size: DEFAULT_WINDOW,
            topic_ttl_secs: None,
            monitor_on_start: false,
            msg_paths: Vec::new(),
            types: Vec::new(),
        }
    }
}

impl Settings {
    /// Load from `path` (if given) and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::from_sources(path, environment())
    }

    fn from_sources(path: Option<&Path>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let config = builder
            .add_source(env)
            .build()
            .context("Failed to read settings")?;
        config
            .try_deserialize()
            .context("Invalid settings")
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_ms.max(1))
    }

    pub fn panel_options(&self) -> PanelOptions {
        PanelOptions {
            refresh_interval: self.refresh_interval(),
        }
    }

    /// Column table of the tree view.
    pub fn columns(&self) -> ColumnLayout {
        ColumnLayout::new(self.value_column_max)
    }

    pub fn hub_options(&self) -> HubOptions {
        HubOptions {
            window: self.window_size,
            topic_ttl: self.topic_ttl_secs.map(Duration::from_secs),
            monitor_on_start: self.monitor_on_start,
        }
    }

    /// Build the type registry from `msg_paths` and inline `types`.
    pub fn type_registry(&self) -> Result<TypeRegistry> {
        let mut registry = TypeRegistry::new();
        for dir in &self.msg_paths {
            let loaded = registry
                .load_dir(dir)
                .with_context(|| format!("Failed to load message types from {}", dir.display()))?;
            info!("Loaded {} message types from {}", loaded, dir.display());
        }
        for ty in &self.types {
            registry
                .add_definition(&ty.name, &ty.definition)
                .with_context(|| format!("Invalid definition of {}", ty.name))?;
        }
        Ok(registry)
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("msg_paths")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let map: config::Map<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        environment().source(Some(map))
    }

    #[test]
    fn defaults_without_sources() {
        let settings = Settings::from_sources(None, env(&[])).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.refresh_interval(), Duration::from_secs(1));
        assert_eq!(settings.value_column_max, 150);
    }

    #[test]
    fn file_values_are_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("topicwatch.toml");
        fs::write(
            &path,
            r#"
refresh_ms = 250
monitor_on_start = true
topic_ttl_secs = 30

[[types]]
name = "demo/Pose2D"
definition = "float64 x\nfloat64 y"
"#,
        )
        .unwrap();

        let settings = Settings::from_sources(Some(path.as_path()), env(&[])).unwrap();
        assert_eq!(settings.refresh_ms, 250);
        assert!(settings.monitor_on_start);
        assert_eq!(settings.hub_options().topic_ttl, Some(Duration::from_secs(30)));
        assert_eq!(settings.types[0].name, "demo/Pose2D");

        let registry = settings.type_registry().unwrap();
        assert!(registry.contains("demo/Pose2D"));
    }

    #[test]
    fn environment_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("topicwatch.toml");
        fs::write(&path, "refresh_ms = 250\nwindow_size = 10\n").unwrap();

        let settings = Settings::from_sources(
            Some(path.as_path()),
            env(&[("TOPICWATCH_REFRESH_MS", "2000"), ("TOPICWATCH_VALUE_COLUMN_MAX", "80")]),
        )
        .unwrap();
        assert_eq!(settings.refresh_ms, 2000);
        assert_eq!(settings.window_size, 10);
        assert_eq!(settings.value_column_max, 80);
        assert_eq!(settings.columns(), ColumnLayout::new(80));
    }

    #[test]
    fn invalid_inline_type_is_an_error() {
        let settings = Settings {
            types: vec![TypeDefinition {
                name: "demo/Bad".to_string(),
                definition: "float64".to_string(),
            }],
            ..Settings::default()
        };
        assert!(settings.type_registry().is_err());
    }
}
