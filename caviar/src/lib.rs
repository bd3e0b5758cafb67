//! # caviar
//!
//! Plugin admission and hook core for the caviar build tool.
//!
//! A project config names a mixer block and a list of plugins. Activation
//! loads the config (and an optional preset), instantiates the block and
//! applies every plugin whose gate passes in the current execution
//! context. Sandbox-only plugins are never constructed in the main
//! process; phase-restricted plugins only run in their phase.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use caviar::prelude::*;
//!
//! let registry = MemoryModuleRegistry::new()
//!     .with_module("/app/package.json", Module::Data(json!({"name": "app"})))
//!     .with_module(
//!         "/app/caviar.config",
//!         Module::Config(
//!             RawConfig::new()
//!                 .mixer(MyBlock::new)
//!                 .plugins(vec![
//!                     PluginDescriptor::plugin(Reporter),
//!                     PluginDescriptor::when(EnvPlugin, ConditionSpec::sandboxed()),
//!                 ]),
//!         ),
//!     );
//!
//! let mut activated = Caviar::new(Arc::new(registry), CaviarOptions::new("/app"))
//!     .activate()
//!     .await?;
//! let result = activated.run(options, input).await?;
//! ```

pub mod tracing_support;

pub use caviar_plugin_api as api;
pub use caviar_plugin_host as host;

pub use caviar_plugin_host::{
    Activated, Block, BlockError, BlockHandle, Caviar, CaviarError, CaviarOptions, Config,
    ConditionSpec, ExecutionContext, HookAccessor, HookTable, Module, ModuleRegistry, Plugin,
    PluginDescriptor, RawConfig, SandboxEnvironment,
};

/// Everything needed to write blocks and plugins and activate a project
pub mod prelude {
    pub use async_trait::async_trait;
    pub use serde_json::{json, Value};

    pub use caviar_plugin_host::{
        Activated, AsyncSeriesHook, Block, BlockError, Caviar, CaviarError, CaviarOptions,
        ConditionSpec, ContextSource, EnvContext, ExecutionContext, FsModuleRegistry,
        HookAccessor, HookTable, MemoryModuleRegistry, Module, OptionDescriptor, OptionSchema,
        Phases, Plugin, PluginCandidate, PluginDescriptor, RawConfig, RunContext,
        SandboxEnvironment, SyncBailHook, SyncHook,
    };

    #[cfg(feature = "tracing")]
    pub use crate::tracing_support::{init_subscriber, init_subscriber_with_config, TracingConfig};
}
