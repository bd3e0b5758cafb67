//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use caviar_plugin_host::{
    Block, BlockError, HookAccessor, HookTable, MemoryModuleRegistry, Module, OptionDescriptor,
    OptionSchema, Phases, Plugin, RawConfig, RunContext, SyncHook,
};
use serde_json::{json, Value};

pub const CWD: &str = "/project";
pub const CONFIG_FILE: &str = "/project/caviar.config";

/// Mixer block with one hook `a` called with the input's `foo`
pub struct FooBlock {
    hooks: HookTable,
    phases: Value,
}

impl FooBlock {
    pub fn new() -> Self {
        Self::with_phases(json!(["default"]))
    }

    pub fn with_phases(phases: Value) -> Self {
        Self {
            hooks: HookTable::builder().hook(SyncHook::<Value>::new("a")).build(),
            phases,
        }
    }
}

#[async_trait]
impl Block for FooBlock {
    fn name(&self) -> &str {
        "FooBlock"
    }

    fn config(&self) -> OptionSchema {
        OptionSchema::from([("foo".to_string(), OptionDescriptor::new("bailTop"))])
    }

    fn hooks(&self) -> &HookTable {
        &self.hooks
    }

    fn phases(&self) -> Phases {
        Phases::from_value(self.phases.clone())
    }

    fn create(&self, options: &Value) -> Result<Value, BlockError> {
        Ok(json!({"foo": options["foo"] == "foo"}))
    }

    async fn run(&self, ctx: RunContext<'_>, input: Value) -> Result<Value, BlockError> {
        assert!(
            ctx.created().map(|c| c["foo"] == true).unwrap_or(false),
            "block: this.created"
        );

        tokio::time::sleep(Duration::from_millis(10)).await;

        let foo = input["foo"].clone();
        self.hooks.get::<SyncHook<Value>>("a")?.call(&foo)?;

        Ok(json!({"foo": foo}))
    }
}

/// Block whose `run` always fails
pub struct FailingBlock {
    hooks: HookTable,
}

impl FailingBlock {
    pub fn new() -> Self {
        Self {
            hooks: HookTable::default(),
        }
    }
}

#[async_trait]
impl Block for FailingBlock {
    fn name(&self) -> &str {
        "FailingBlock"
    }

    fn hooks(&self) -> &HookTable {
        &self.hooks
    }

    fn phases(&self) -> Phases {
        Phases::of(["default"])
    }

    fn create(&self, _options: &Value) -> Result<Value, BlockError> {
        Ok(Value::Null)
    }

    async fn run(&self, _ctx: RunContext<'_>, _input: Value) -> Result<Value, BlockError> {
        Err(BlockError::run_failed(self.name(), anyhow::anyhow!("compilation failed")))
    }
}

/// Plugin recording every value passed to `FooBlock`'s hook `a`
#[derive(Clone, Default)]
pub struct Recorder {
    pub name: String,
    pub seen: Arc<Mutex<Vec<Value>>>,
}

impl Recorder {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            seen: Arc::default(),
        }
    }

    pub fn seen(&self) -> Vec<Value> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Plugin for Recorder {
    fn name(&self) -> &str {
        &self.name
    }

    async fn apply(&self, hooks: &HookAccessor<'_>) -> anyhow::Result<()> {
        let seen = self.seen.clone();
        hooks
            .block("FooBlock")?
            .get::<SyncHook<Value>>("a")?
            .tap(self.name.clone(), move |foo| {
                seen.lock().unwrap().push(foo.clone());
                Ok(())
            });
        Ok(())
    }
}

/// Sandbox-only plugin passing a variable to the sandboxed child
#[derive(Clone, Default)]
pub struct SandboxPlugin {
    pub started: Arc<AtomicUsize>,
}

impl SandboxPlugin {
    pub fn starts(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Plugin for SandboxPlugin {
    fn name(&self) -> &str {
        "SandboxPlugin"
    }

    fn sandbox(&self) -> bool {
        true
    }

    async fn apply(&self, hooks: &HookAccessor<'_>) -> anyhow::Result<()> {
        hooks
            .host()
            .sandbox_environment
            .tap_promise("SandboxPlugin", |sandbox| async move {
                sandbox.set_env("SANDBOX_PLUGIN_ENV", "YES");
                Ok::<_, anyhow::Error>(())
            });

        let started = self.started.clone();
        hooks.host().start.tap("SandboxPlugin", move |_| {
            started.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        Ok(())
    }
}

/// Plugin whose `apply` fails
pub struct Broken;

#[async_trait]
impl Plugin for Broken {
    fn name(&self) -> &str {
        "Broken"
    }

    async fn apply(&self, hooks: &HookAccessor<'_>) -> anyhow::Result<()> {
        hooks.block("NotHookable")?;
        Ok(())
    }
}

/// Project registry with a package.json and the given config
pub fn project(config: RawConfig) -> MemoryModuleRegistry {
    MemoryModuleRegistry::new()
        .with_module(
            "/project/package.json",
            Module::Data(json!({"name": "simple", "version": "1.0.0"})),
        )
        .with_module(CONFIG_FILE, Module::Config(config))
}

/// Config with `FooBlock` as mixer and the fixture's extra keys
pub fn foo_config() -> RawConfig {
    RawConfig::new()
        .mixer(FooBlock::new)
        .extra("foo", json!("foo"))
        .extra("bar", json!("bar"))
}
