//! Config activation
//!
//! Ties the pieces together for one project:
//!
//! ```text
//! package.json ─► config ─► preset ─► mixer block ─► plugins (gated, applied)
//! ```
//!
//! [`Caviar::activate`] produces an [`Activated`] project whose mixer block
//! can then be run, or whose sandbox environment can be prepared.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use caviar_plugin_api::{ContextSource, EnvContext, PHASE_ENV, SANDBOX_ENV};
use serde_json::Value;

use crate::block::BlockHandle;
use crate::config::{Config, ConfigLoader, Envs, RawConfig};
use crate::error::CaviarError;
use crate::gate::{PluginGate, RunCondition};
use crate::hooks::{HookAccessor, HookError, HostHooks};
use crate::module::{normalize_path, Module, ModuleRegistry};
use crate::once::OnceLatch;
use crate::package::{read_package, Package};
use crate::plugin::{declared_condition, Condition, Plugin, PluginDescriptor, PluginsField};
use crate::preset::PresetResolver;
use crate::sandbox::SandboxEnvironment;
use crate::validate::validate;

/// Config file looked up in the project root when none is given
pub const DEFAULT_CONFIG_FILE: &str = "caviar.config";

/// Value of `CAVIAR_SANDBOX` handed to the sandboxed child
pub const SANDBOX_CHILD_VALUE: &str = "inner";

/// Where and how to activate a project
#[derive(Debug, Clone)]
pub struct CaviarOptions {
    /// Project root
    pub cwd: PathBuf,

    /// Config identifier, relative to `cwd` unless absolute
    pub config_file: Option<String>,

    /// Preset name, resolved from `cwd`
    pub preset: Option<String>,
}

impl Default for CaviarOptions {
    fn default() -> Self {
        Self {
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            preset: None,
        }
    }
}

impl CaviarOptions {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            config_file: None,
            preset: None,
        }
    }

    pub fn config_file(mut self, config_file: impl Into<String>) -> Self {
        self.config_file = Some(config_file.into());
        self
    }

    pub fn preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = Some(preset.into());
        self
    }

    /// Identifier of the config module to load
    pub fn config_id(&self) -> String {
        let file = self.config_file.as_deref().unwrap_or(DEFAULT_CONFIG_FILE);
        let path = Path::new(file);
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            normalize_path(&self.cwd.join(path))
        };
        path.to_string_lossy().into_owned()
    }
}

/// Entry point: activates a project against a module registry
pub struct Caviar {
    registry: Arc<dyn ModuleRegistry>,
    options: CaviarOptions,
    context: Arc<dyn ContextSource>,
}

impl Caviar {
    /// Activation reading its execution context from the process environment
    pub fn new(registry: Arc<dyn ModuleRegistry>, options: CaviarOptions) -> Self {
        Self {
            registry,
            options,
            context: Arc::new(EnvContext),
        }
    }

    /// Use another source for the execution context
    pub fn with_context(mut self, source: impl ContextSource + 'static) -> Self {
        self.context = Arc::new(source);
        self
    }

    pub fn options(&self) -> &CaviarOptions {
        &self.options
    }

    /// Load everything and apply the plugins that pass their gates
    pub async fn activate(&self) -> Result<Activated, CaviarError> {
        let cwd = &self.options.cwd;
        let ctx = self.context.current();
        tracing::info!(
            cwd = %cwd.display(),
            sandbox_child = ctx.sandbox_child,
            phase = ?ctx.phase,
            "Activating caviar"
        );

        let package = read_package(self.registry.as_ref(), cwd)?;

        let loader = ConfigLoader::new(self.registry.clone());
        let config_file = loader.locate(cwd, &self.options.config_id());
        let mut config = loader.load(&config_file)?;

        let mut layers = Vec::new();
        let preset = PresetResolver::new(self.registry.clone())
            .resolve(cwd, self.options.preset.as_deref())?;
        if let Some(module) = preset {
            let name = self.options.preset.clone().unwrap_or_default();
            let preset = Config::from_raw(preset_layer(&name, module)?, name.clone());
            merge_preset(&mut config, &preset);
            if let Some(plugins) = preset.caviar.plugins {
                layers.push((name, plugins));
            }
        }
        if let Some(plugins) = config.caviar.plugins.clone() {
            layers.push((config_file.clone(), plugins));
        }

        let factory = config
            .caviar
            .mixer
            .clone()
            .ok_or_else(|| CaviarError::MixerNotDefined {
                file: config_file.clone(),
            })?;
        let block = BlockHandle::new(factory());
        let hooks = HostHooks::new();

        let mut applied = Vec::new();
        {
            let hookables = [(block.name(), block.hooks())];
            let accessor = HookAccessor::new(&hooks, &hookables);

            for (layer, plugins) in layers {
                tracing::debug!(layer = %layer, "Admitting plugins");
                applied.extend(admit(plugins, &accessor, self.context.as_ref()).await?);
            }
        }

        tracing::info!(
            package = %package.name,
            block = %block.name(),
            plugins = applied.len(),
            "Caviar activated"
        );

        Ok(Activated {
            package,
            config,
            hooks,
            block,
            applied,
            context: self.context.clone(),
        })
    }
}

impl fmt::Debug for Caviar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Caviar")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

fn preset_layer(name: &str, module: Module) -> Result<RawConfig, CaviarError> {
    let failed = |source: anyhow::Error| CaviarError::LoadPresetFailed {
        preset: name.to_string(),
        source,
    };

    match module {
        Module::Config(raw) => Ok(raw),
        Module::Data(value) => RawConfig::from_value(value).map_err(failed),
        other => Err(failed(anyhow::anyhow!(
            "expected a config module, got {}",
            other.kind()
        ))),
    }
}

/// Preset values sit below the project's own
fn merge_preset(config: &mut Config, preset: &Config) {
    if config.caviar.mixer.is_none() {
        config.caviar.mixer = preset.caviar.mixer.clone();
    }

    let mut envs: Envs = preset.caviar.envs.clone();
    for (name, vars) in std::mem::take(&mut config.caviar.envs) {
        envs.entry(name).or_insert_with(BTreeMap::new).extend(vars);
    }
    config.caviar.envs = envs;

    for (key, value) in &preset.extra {
        config
            .extra
            .entry(key.clone())
            .or_insert_with(|| value.clone());
    }
}

/// Gate, construct, validate and apply one plugin list, in order.
///
/// Returns the names of the plugins that were applied.
async fn admit(
    plugins: PluginsField,
    accessor: &HookAccessor<'_>,
    context: &dyn ContextSource,
) -> Result<Vec<String>, CaviarError> {
    let descriptors = match plugins {
        PluginsField::List(list) => list,
        PluginsField::Malformed(value) => {
            return Err(CaviarError::InvalidPlugins {
                plugins: value.to_string(),
            })
        }
    };

    let mut applied = Vec::new();
    for descriptor in descriptors {
        let gate = PluginGate::for_context(&context.current());

        let (plugin, condition): (Arc<dyn Plugin>, RunCondition) = match descriptor {
            PluginDescriptor::Plain(candidate) => {
                let plugin = validate(candidate)?;
                let spec = declared_condition(plugin.as_ref());
                if !gate.should_construct(&spec) {
                    tracing::warn!(plugin = %plugin.name(), "Sandbox plugin skipped outside the sandbox");
                    continue;
                }
                (plugin, PluginGate::run_condition(&spec))
            }
            PluginDescriptor::Conditional(source, condition) => {
                let condition = match condition {
                    Condition::Spec(spec) => {
                        if !gate.should_construct(&spec) {
                            tracing::warn!(source = ?source, "Sandbox plugin skipped outside the sandbox");
                            continue;
                        }
                        PluginGate::run_condition(&spec)
                    }
                    Condition::Predicate(predicate) => RunCondition::Custom(predicate),
                    Condition::Malformed(value) => {
                        return Err(CaviarError::InvalidPluginCondition {
                            condition: value.to_string(),
                        })
                    }
                };
                (validate(source.construct())?, condition)
            }
        };

        if !condition.evaluate(&context.current()) {
            tracing::debug!(plugin = %plugin.name(), "Plugin condition not met, not applied");
            continue;
        }

        plugin
            .apply(accessor)
            .await
            .map_err(|source| CaviarError::PluginApplyFailed {
                plugin: plugin.name().to_string(),
                source,
            })?;
        tracing::debug!(plugin = %plugin.name(), "Plugin applied");
        applied.push(plugin.name().to_string());
    }

    Ok(applied)
}

const DONE: usize = 0;
const FAILED: usize = 1;

type Finisher<'a> = Box<dyn Fn(&Result<Value, CaviarError>) -> Result<(), HookError> + 'a>;

/// An activated project
pub struct Activated {
    package: Package,
    config: Config,
    hooks: HostHooks,
    block: BlockHandle,
    applied: Vec<String>,
    context: Arc<dyn ContextSource>,
}

impl Activated {
    pub fn package(&self) -> &Package {
        &self.package
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn hooks(&self) -> &HostHooks {
        &self.hooks
    }

    pub fn block(&self) -> &BlockHandle {
        &self.block
    }

    /// Names of the applied plugins, in application order
    pub fn applied_plugins(&self) -> &[String] {
        &self.applied
    }

    /// Run the mixer block for the current phase.
    ///
    /// Returns `None` when the block does not take part in the phase.
    /// Exactly one of the `done` and `failed` hooks fires per run; a
    /// failing `done` tap fails the run without firing `failed`. An error
    /// raised by a `failed` tap is logged and dropped, so the returned
    /// error is always the one that failed the run.
    pub async fn run(&mut self, options: Value, input: Value) -> Result<Option<Value>, CaviarError> {
        let ctx = self.context.current();
        let phase = ctx.phase_or_default().to_string();

        self.hooks.start.call(&())?;

        if !self.block.participates_in(&phase)? {
            tracing::info!(block = %self.block.name(), phase = %phase, "Block not in phase, skipped");
            return Ok(None);
        }

        let result = self.drive(&options, input).await;

        let hooks = &self.hooks;
        let latch: OnceLatch<Finisher<'_>> = OnceLatch::new([
            Box::new(move |result: &Result<Value, CaviarError>| match result {
                Ok(value) => hooks.done.call(value),
                Err(_) => Ok(()),
            }) as Finisher<'_>,
            Box::new(move |result: &Result<Value, CaviarError>| match result {
                Ok(_) => Ok(()),
                Err(e) => hooks.failed.call(&e.to_string()),
            }),
        ]);

        let settled = match &result {
            Ok(_) => latch.invoke(DONE, &result).unwrap_or(Ok(())),
            Err(_) => Ok(()),
        };

        // The latch keeps `failed` quiet once `done` has fired
        if result.is_err() || settled.is_err() {
            if let Some(Err(e)) = latch.invoke(FAILED, &result) {
                tracing::warn!(error = %e, "failed hook raised");
            }
        }

        let value = result?;
        settled?;
        tracing::info!(block = %self.block.name(), phase = %phase, "Block run finished");
        Ok(Some(value))
    }

    async fn drive(&mut self, options: &Value, input: Value) -> Result<Value, CaviarError> {
        self.block.create(options)?;
        Ok(self.block.run(input).await?)
    }

    /// Environment for the sandboxed child of the current phase.
    ///
    /// Seeded with the config's envs for the phase and the caviar
    /// variables, then handed to the `sandboxEnvironment` taps.
    pub async fn sandbox_environment(&self) -> Result<SandboxEnvironment, CaviarError> {
        let ctx = self.context.current();
        let phase = ctx.phase_or_default();

        let env = SandboxEnvironment::new();
        if let Some(vars) = self.config.env_vars(phase) {
            env.extend(vars.clone());
        }
        env.set_env(SANDBOX_ENV, SANDBOX_CHILD_VALUE);
        env.set_env(PHASE_ENV, phase);

        self.hooks.sandbox_environment.promise(env.clone()).await?;
        tracing::debug!(phase = %phase, vars = env.vars().len(), "Sandbox environment prepared");
        Ok(env)
    }
}

impl fmt::Debug for Activated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Activated")
            .field("package", &self.package.name)
            .field("config_file", &self.config.config_file)
            .field("block", &self.block)
            .field("applied", &self.applied)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_id() {
        let options = CaviarOptions::new("/project");
        assert_eq!(options.config_id(), "/project/caviar.config");

        let options = CaviarOptions::new("/project").config_file("./config/../app.config");
        assert_eq!(options.config_id(), "/project/app.config");

        let options = CaviarOptions::new("/project").config_file("/etc/caviar.config");
        assert_eq!(options.config_id(), "/etc/caviar.config");
    }

    #[test]
    fn test_data_preset_layer() {
        let raw = preset_layer("web", Module::Data(serde_json::json!({"web": true}))).unwrap();
        assert_eq!(raw.extra["web"], true);

        let err = preset_layer("web", Module::Data(serde_json::json!([1]))).unwrap_err();
        assert_eq!(err.code(), "LOAD_PRESET_FAILED");
        assert!(err.to_string().contains("web"));
    }

    #[test]
    fn test_merge_preset_keeps_project_values() {
        let mut preset_envs = Envs::new();
        preset_envs.insert(
            "default".into(),
            BTreeMap::from([
                ("A".to_string(), "preset".to_string()),
                ("B".to_string(), "preset".to_string()),
            ]),
        );
        let mut project_envs = Envs::new();
        project_envs.insert(
            "default".into(),
            BTreeMap::from([("A".to_string(), "project".to_string())]),
        );

        let preset = Config::from_raw(
            RawConfig::new()
                .envs(preset_envs)
                .extra("foo", serde_json::json!("preset"))
                .extra("bar", serde_json::json!("preset")),
            "preset",
        );
        let mut config = Config::from_raw(
            RawConfig::new()
                .envs(project_envs)
                .extra("foo", serde_json::json!("project")),
            "/project/caviar.config",
        );

        merge_preset(&mut config, &preset);

        let vars = config.env_vars("default").unwrap();
        assert_eq!(vars["A"], "project");
        assert_eq!(vars["B"], "preset");
        assert_eq!(config.extra["foo"], "project");
        assert_eq!(config.extra["bar"], "preset");
        assert!(config.caviar.mixer.is_none());
    }
}
