//! Loader for `scout.yaml` with environment overlays.
//!
//! Sources are merged in the order they are added; `SCOUT__`-prefixed
//! environment variables (e.g. `SCOUT__SEARCH__ENGINE_URL`) always win.
//! After merging, `${VAR}` placeholders in string values are expanded and the
//! result is deserialized and validated. Every key has a default, so an empty
//! document is a valid configuration.
use config::{Config, ConfigError, Environment, File, FileFormat};
use scout_common::SearchSettings;
use scout_common::observability::LogSettings;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

/// Process-wide configuration, read once at startup.
#[derive(Debug, Default, Deserialize)]
pub struct ScoutConfig {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub search: SearchSettings,
    #[serde(default)]
    pub log: LogSettings,
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hides the `config` crate wiring (YAML + env overrides).
pub struct ScoutConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for ScoutConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ScoutConfigLoader {
    /// Start with `SCOUT__` env overrides only.
    ///
    /// ```
    /// use scout_config::ScoutConfigLoader;
    ///
    /// let config = ScoutConfigLoader::new()
    ///     .with_yaml_str("version: '1'")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.version.as_deref(), Some("1"));
    /// assert_eq!(config.search.engine_url, "https://www.baidu.com/");
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
        }
    }

    /// Attach a YAML/TOML/JSON file that must exist; the format is inferred by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that may be absent, so deployments can rely purely on
    /// environment variables.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Merge an inline YAML snippet.
    ///
    /// ```
    /// use scout_common::FetchBackend;
    /// use scout_config::ScoutConfigLoader;
    ///
    /// let cfg = ScoutConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// search:
    ///   backend: http
    ///   max_concurrent_fetches: 2
    /// log:
    ///   level: debug
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(cfg.search.backend, FetchBackend::Http);
    /// assert_eq!(cfg.search.max_concurrent_fetches, 2);
    /// assert_eq!(cfg.log.level, "debug");
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, FileFormat::Yaml));
        self
    }

    /// Consume the builder, deserialize the merged sources and validate them.
    ///
    /// `${VAR}` placeholders are expanded before the typed structs are built:
    ///
    /// ```
    /// use scout_config::ScoutConfigLoader;
    ///
    /// unsafe { std::env::set_var("SCOUT_DOC_ENGINE", "https://cn.bing.com/"); }
    ///
    /// let config = ScoutConfigLoader::new()
    ///     .with_yaml_str("search:\n  engine_url: \"${SCOUT_DOC_ENGINE}\"")
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// assert_eq!(config.search.engine_url, "https://cn.bing.com/");
    ///
    /// unsafe { std::env::remove_var("SCOUT_DOC_ENGINE"); }
    /// ```
    pub fn load(self) -> Result<ScoutConfig, ConfigError> {
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix("SCOUT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let typed: ScoutConfig =
            serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))?;
        typed
            .search
            .validate()
            .map_err(|e| ConfigError::Message(e.to_string()))?;

        Ok(typed)
    }
}
