//! Config loading and normalization

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};

use serde_json::{Map, Value};

use crate::block::{Block, BlockFactory};
use crate::error::CaviarError;
use crate::module::{require_module, Module, ModuleRegistry};
use crate::plugin::PluginsField;

/// Env name to variable to value
pub type Envs = BTreeMap<String, BTreeMap<String, String>>;

/// The `caviar` section of a config module, before normalization
#[derive(Clone, Default)]
pub struct CaviarSection {
    pub mixer: Option<BlockFactory>,
    pub plugins: Option<PluginsField>,
    pub envs: Option<Envs>,
}

impl fmt::Debug for CaviarSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaviarSection")
            .field("mixer", &self.mixer.as_ref().map(|_| ".."))
            .field("plugins", &self.plugins)
            .field("envs", &self.envs)
            .finish()
    }
}

/// A config module as authored
#[derive(Debug, Clone, Default)]
pub struct RawConfig {
    pub caviar: Option<CaviarSection>,

    /// Every other top-level key
    pub extra: Map<String, Value>,
}

impl RawConfig {
    pub fn new() -> Self {
        Self::default()
    }

    fn section(&mut self) -> &mut CaviarSection {
        self.caviar.get_or_insert_with(CaviarSection::default)
    }

    pub fn mixer<F, B>(mut self, factory: F) -> Self
    where
        F: Fn() -> B + Send + Sync + 'static,
        B: Block + 'static,
    {
        self.section().mixer = Some(Arc::new(move || Box::new(factory()) as Box<dyn Block>));
        self
    }

    pub fn plugins(mut self, plugins: impl Into<PluginsField>) -> Self {
        self.section().plugins = Some(plugins.into());
        self
    }

    pub fn envs(mut self, envs: Envs) -> Self {
        self.section().envs = Some(envs);
        self
    }

    pub fn extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Read a config from a data module such as a JSON file.
    ///
    /// Data has no block factory, so `caviar.mixer` stays unset and a
    /// mixer has to come from a preset. `caviar.plugins` is classified
    /// but not validated.
    pub fn from_value(value: Value) -> anyhow::Result<Self> {
        let mut extra = match value {
            Value::Object(map) => map,
            other => bail!("config must be an object, got {}", other),
        };

        let caviar = match extra.remove("caviar") {
            None | Some(Value::Null) => None,
            Some(Value::Object(mut section)) => {
                if section.contains_key("mixer") {
                    tracing::debug!("caviar.mixer in a data config is ignored");
                }
                let envs = match section.remove("envs") {
                    None | Some(Value::Null) => None,
                    Some(envs) => Some(
                        serde_json::from_value::<Envs>(envs)
                            .context("caviar.envs must map env names to string variables")?,
                    ),
                };
                Some(CaviarSection {
                    mixer: None,
                    plugins: section.remove("plugins").map(PluginsField::from_value),
                    envs,
                })
            }
            Some(other) => bail!("caviar section must be an object, got {}", other),
        };

        Ok(Self { caviar, extra })
    }
}

/// Normalized `caviar` section
#[derive(Clone, Default)]
pub struct CaviarConfig {
    pub mixer: Option<BlockFactory>,

    /// Left as authored; shape errors surface at activation
    pub plugins: Option<PluginsField>,

    pub envs: Envs,
}

impl fmt::Debug for CaviarConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaviarConfig")
            .field("mixer", &self.mixer.as_ref().map(|_| ".."))
            .field("plugins", &self.plugins)
            .field("envs", &self.envs)
            .finish()
    }
}

/// A loaded and normalized config
#[derive(Debug, Clone)]
pub struct Config {
    pub caviar: CaviarConfig,
    pub extra: Map<String, Value>,

    /// Identifier the config was loaded from
    pub config_file: String,
}

impl Config {
    /// Normalize a raw config, making sure `caviar.envs` exists
    pub fn from_raw(raw: RawConfig, config_file: impl Into<String>) -> Self {
        let section = raw.caviar.unwrap_or_default();

        Self {
            caviar: CaviarConfig {
                mixer: section.mixer,
                plugins: section.plugins,
                envs: section.envs.unwrap_or_default(),
            },
            extra: raw.extra,
            config_file: config_file.into(),
        }
    }

    /// Variables declared for an env name
    pub fn env_vars(&self, name: &str) -> Option<&BTreeMap<String, String>> {
        self.caviar.envs.get(name)
    }
}

/// Loads config modules through a registry
#[derive(Clone)]
pub struct ConfigLoader {
    registry: Arc<dyn ModuleRegistry>,
}

impl ConfigLoader {
    pub fn new(registry: Arc<dyn ModuleRegistry>) -> Self {
        Self { registry }
    }

    /// Id the registry locates `request` at, or `request` itself when it
    /// cannot be located, leaving the failure to [`load`](Self::load)
    pub fn locate(&self, from: &Path, request: &str) -> String {
        match self.registry.resolve(from, request) {
            Ok(id) => id,
            Err(e) => {
                tracing::debug!(config_file = %request, error = %e, "Config not located");
                request.to_string()
            }
        }
    }

    /// Load and normalize the config module `id`.
    ///
    /// Accepts config modules and object data modules.
    pub fn load(&self, id: &str) -> Result<Config, CaviarError> {
        let module = self
            .registry
            .load(id)
            .map_err(|e| CaviarError::load_config_failed(id, e))?;

        let raw = match require_module(module) {
            Module::Config(raw) => raw,
            Module::Data(value) => {
                RawConfig::from_value(value).map_err(|e| CaviarError::load_config_failed(id, e))?
            }
            other => {
                return Err(CaviarError::load_config_failed(
                    id,
                    anyhow::anyhow!("expected a config module, got {}", other.kind()),
                ))
            }
        };

        tracing::debug!(config_file = %id, "Config loaded");
        Ok(Config::from_raw(raw, id))
    }
}

impl fmt::Debug for ConfigLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigLoader").finish_non_exhaustive()
    }
}
