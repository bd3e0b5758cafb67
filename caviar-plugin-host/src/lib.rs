//! caviar-plugin-host: config activation and plugin admission for caviar
//!
//! This crate loads a project's config and preset, instantiates the mixer
//! block, and admits the configured plugins according to the current
//! execution context (main process or sandbox child, active phase).

pub mod activation;
pub mod block;
pub mod config;
pub mod error;
pub mod gate;
pub mod hooks;
pub mod module;
pub mod once;
pub mod package;
pub mod plugin;
pub mod preset;
pub mod sandbox;
pub mod validate;

pub use activation::{Activated, Caviar, CaviarOptions, DEFAULT_CONFIG_FILE};
pub use block::{Block, BlockError, BlockFactory, BlockHandle, BlockState, RunContext};
pub use config::{CaviarConfig, CaviarSection, Config, ConfigLoader, Envs, RawConfig};
pub use error::CaviarError;
pub use gate::{PluginGate, RunCondition};
pub use hooks::{
    AsyncSeriesHook, Hook, HookAccessor, HookError, HookTable, HookTableBuilder, HostHooks,
    SyncBailHook, SyncHook,
};
pub use module::{
    require_module, FsModuleRegistry, LoadError, MemoryModuleRegistry, Module, ModuleRegistry,
    ResolveError,
};
pub use once::OnceLatch;
pub use package::{read_package, Package};
pub use plugin::{
    declared_condition, Condition, Plugin, PluginCandidate, PluginDescriptor, PluginSource,
    PluginsField,
};
pub use preset::PresetResolver;
pub use sandbox::{join_env_paths, SandboxEnvironment, PATH_DELIMITER};
pub use validate::validate;

pub use caviar_plugin_api::{
    ConditionSpec, ContextSource, EnvContext, ExecutionContext, OptionDescriptor, OptionSchema,
    Phases, DEFAULT_PHASE, PHASE_ENV, SANDBOX_ENV,
};
