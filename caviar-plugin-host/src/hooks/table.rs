use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

use super::{AsyncSeriesHook, Hook, HookError, SyncHook};
use crate::sandbox::SandboxEnvironment;

struct Entry {
    kind: &'static str,
    hook: Box<dyn Any + Send + Sync>,
}

/// Named hook table of a block.
///
/// Built once through [`HookTable::builder`]; afterwards hooks can be
/// tapped and called but not added or replaced.
#[derive(Default)]
pub struct HookTable {
    hooks: HashMap<String, Entry>,
    order: Vec<String>,
}

impl HookTable {
    pub fn builder() -> HookTableBuilder {
        HookTableBuilder::default()
    }

    /// Typed lookup of a hook
    pub fn get<H: Hook>(&self, name: &str) -> Result<&H, HookError> {
        let entry = self
            .hooks
            .get(name)
            .ok_or_else(|| HookError::NotFound(name.to_string()))?;

        entry
            .hook
            .downcast_ref::<H>()
            .ok_or_else(|| HookError::TypeMismatch {
                name: name.to_string(),
                expected: H::KIND,
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.hooks.contains_key(name)
    }

    /// Hook names in declaration order
    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl fmt::Debug for HookTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for name in &self.order {
            map.entry(name, &self.hooks[name].kind);
        }
        map.finish()
    }
}

/// Builder for [`HookTable`]
#[derive(Default)]
pub struct HookTableBuilder {
    table: HookTable,
}

impl HookTableBuilder {
    /// Add a hook under its own name; a later hook with the same name replaces it
    pub fn hook<H: Hook>(mut self, hook: H) -> Self {
        let name = hook.name().to_string();
        if !self.table.hooks.contains_key(&name) {
            self.table.order.push(name.clone());
        }
        self.table.hooks.insert(
            name,
            Entry {
                kind: H::KIND,
                hook: Box::new(hook),
            },
        );
        self
    }

    pub fn build(self) -> HookTable {
        self.table
    }
}

/// Hooks owned by the host pipeline itself
#[derive(Debug)]
pub struct HostHooks {
    /// Fired before the mixer block runs
    pub start: SyncHook<()>,

    /// Fired to let sandbox plugins populate the child environment
    pub sandbox_environment: AsyncSeriesHook<SandboxEnvironment>,

    /// Fired with the block result when a run succeeds
    pub done: SyncHook<Value>,

    /// Fired with the error message when a run fails
    pub failed: SyncHook<String>,
}

impl HostHooks {
    pub fn new() -> Self {
        Self {
            start: SyncHook::new("start"),
            sandbox_environment: AsyncSeriesHook::new("sandboxEnvironment"),
            done: SyncHook::new("done"),
            failed: SyncHook::new("failed"),
        }
    }
}

impl Default for HostHooks {
    fn default() -> Self {
        Self::new()
    }
}

/// Hook accessor handed to a plugin's `apply`
#[derive(Debug, Clone, Copy)]
pub struct HookAccessor<'a> {
    host: &'a HostHooks,
    hookables: &'a [(&'a str, &'a HookTable)],
}

impl<'a> HookAccessor<'a> {
    pub fn new(host: &'a HostHooks, hookables: &'a [(&'a str, &'a HookTable)]) -> Self {
        Self { host, hookables }
    }

    /// Hooks of the host pipeline
    pub fn host(&self) -> &'a HostHooks {
        self.host
    }

    /// Hook table of a registered block
    pub fn block(&self, name: &str) -> Result<&'a HookTable, HookError> {
        self.hookables
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, table)| *table)
            .ok_or_else(|| HookError::HookableNotFound(name.to_string()))
    }

    /// Names of the registered blocks
    pub fn hookables(&self) -> impl Iterator<Item = &'a str> + 'a {
        self.hookables.iter().map(|(n, _)| *n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::SyncBailHook;

    fn table() -> HookTable {
        HookTable::builder()
            .hook(SyncHook::<String>::new("a"))
            .hook(AsyncSeriesHook::<()>::new("b"))
            .build()
    }

    #[test]
    fn test_typed_lookup() {
        let table = table();
        assert_eq!(table.names(), &["a".to_string(), "b".to_string()]);

        let a = table.get::<SyncHook<String>>("a").unwrap();
        a.tap("Plugin", |_| Ok(()));
        assert_eq!(table.get::<SyncHook<String>>("a").unwrap().taps(), 1);

        assert!(matches!(
            table.get::<SyncHook<String>>("missing"),
            Err(HookError::NotFound(_))
        ));

        match table.get::<SyncBailHook<String, ()>>("a") {
            Err(HookError::TypeMismatch { expected, .. }) => assert_eq!(expected, "SyncBailHook"),
            other => panic!("Expected TypeMismatch, got {:?}", other.map(|_| ())),
        }

        // Same kind, different argument type
        assert!(table.get::<SyncHook<u32>>("a").is_err());
    }

    #[test]
    fn test_accessor_block_lookup() {
        let host = HostHooks::new();
        let table = table();
        let hookables = [("foo", &table)];
        let accessor = HookAccessor::new(&host, &hookables);

        assert_eq!(accessor.block("foo").unwrap().len(), 2);
        assert_eq!(accessor.hookables().collect::<Vec<_>>(), vec!["foo"]);

        let err = accessor.block("bar").unwrap_err();
        assert_eq!(err.code(), "HOOKABLE_NOT_FOUND");

        accessor.host().start.tap("Plugin", |_| Ok(()));
        assert_eq!(host.start.taps(), 1);
    }
}
