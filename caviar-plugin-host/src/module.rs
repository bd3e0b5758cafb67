//! Module registry
//!
//! Maps identifiers to loaded module values, decoupled from how they are
//! found. Resolution and loading fail independently so callers can tell
//! a missing module from a broken one.

use std::collections::HashMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use serde_json::Value;
use thiserror::Error;

use crate::config::RawConfig;

/// A loaded module value
#[derive(Clone)]
pub enum Module {
    /// Plain data, e.g. a JSON file
    Data(Value),

    /// A config layer
    Config(RawConfig),

    /// Module using the default-export convention
    Namespace { default: Box<Module> },
}

impl Module {
    /// Wrap a module as the default export of a namespace
    pub fn with_default(default: Module) -> Self {
        Self::Namespace {
            default: Box::new(default),
        }
    }

    /// Short description used in errors and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Data(_) => "data",
            Self::Config(_) => "config",
            Self::Namespace { .. } => "namespace",
        }
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Data(value) => f.debug_tuple("Data").field(value).finish(),
            Self::Config(config) => f.debug_tuple("Config").field(config).finish(),
            Self::Namespace { default } => f
                .debug_struct("Namespace")
                .field("default", default)
                .finish(),
        }
    }
}

/// Unwrap the default-export convention
pub fn require_module(module: Module) -> Module {
    match module {
        Module::Namespace { default } => *default,
        Module::Data(Value::Object(mut map)) if map.contains_key("default") => {
            Module::Data(map.remove("default").unwrap_or(Value::Null))
        }
        other => other,
    }
}

/// Errors that can occur while locating a module
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Cannot find module '{request}' from '{}'", from.display())]
    NotFound { request: String, from: PathBuf },
}

/// Errors that can occur while loading a located module
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Module not found: {0}")]
    NotFound(String),

    #[error("Failed to load module '{id}': {source}")]
    Failed {
        id: String,
        #[source]
        source: anyhow::Error,
    },
}

impl LoadError {
    pub fn failed(id: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::Failed {
            id: id.into(),
            source: source.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Capability mapping identifiers to loaded modules
pub trait ModuleRegistry: Send + Sync {
    /// Locate `request` relative to `from`, returning the module id
    fn resolve(&self, from: &Path, request: &str) -> Result<String, ResolveError>;

    /// Load the module with the given id
    fn load(&self, id: &str) -> Result<Module, LoadError>;
}

fn is_path_request(request: &str) -> bool {
    request.starts_with("./")
        || request.starts_with("../")
        || request == "."
        || request == ".."
        || Path::new(request).is_absolute()
}

/// Lexically normalize a path without touching the file system
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut components = Vec::new();

    for component in path.components() {
        match component {
            Component::ParentDir => {
                if matches!(components.last(), Some(Component::Normal(_))) {
                    components.pop();
                } else {
                    components.push(component);
                }
            }
            Component::CurDir => {}
            _ => components.push(component),
        }
    }

    components.iter().collect()
}

type ModuleFactory = Arc<dyn Fn() -> anyhow::Result<Module> + Send + Sync>;

/// In-memory registry of module factories.
///
/// A factory returning an error models a module whose body fails.
#[derive(Clone, Default)]
pub struct MemoryModuleRegistry {
    modules: HashMap<String, ModuleFactory>,
}

impl MemoryModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module value under `id`
    pub fn insert(&mut self, id: impl Into<String>, module: Module) {
        self.modules
            .insert(id.into(), Arc::new(move || Ok(module.clone())));
    }

    /// Register a module whose evaluation runs `factory` on every load
    pub fn insert_with<F>(&mut self, id: impl Into<String>, factory: F)
    where
        F: Fn() -> anyhow::Result<Module> + Send + Sync + 'static,
    {
        self.modules.insert(id.into(), Arc::new(factory));
    }

    /// Builder form of [`insert`](Self::insert)
    pub fn with_module(mut self, id: impl Into<String>, module: Module) -> Self {
        self.insert(id, module);
        self
    }

    /// Builder form of [`insert_with`](Self::insert_with)
    pub fn with_factory<F>(mut self, id: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> anyhow::Result<Module> + Send + Sync + 'static,
    {
        self.insert_with(id, factory);
        self
    }

    pub fn contains(&self, id: &str) -> bool {
        self.modules.contains_key(id)
    }
}

impl fmt::Debug for MemoryModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&String> = self.modules.keys().collect();
        ids.sort();
        f.debug_struct("MemoryModuleRegistry")
            .field("modules", &ids)
            .finish()
    }
}

impl ModuleRegistry for MemoryModuleRegistry {
    fn resolve(&self, from: &Path, request: &str) -> Result<String, ResolveError> {
        let id = if is_path_request(request) {
            normalize_path(&from.join(request))
                .to_string_lossy()
                .into_owned()
        } else {
            request.to_string()
        };

        if self.modules.contains_key(&id) {
            Ok(id)
        } else {
            Err(ResolveError::NotFound {
                request: request.to_string(),
                from: from.to_path_buf(),
            })
        }
    }

    fn load(&self, id: &str) -> Result<Module, LoadError> {
        let factory = self
            .modules
            .get(id)
            .ok_or_else(|| LoadError::NotFound(id.to_string()))?;

        factory().map_err(|e| LoadError::failed(id, e))
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().map(|e| e == "json").unwrap_or(false)
}

/// Registry backed by JSON files on disk
#[derive(Debug, Clone, Copy, Default)]
pub struct FsModuleRegistry;

impl FsModuleRegistry {
    pub fn new() -> Self {
        Self
    }

    /// Try `path` if it is JSON, then `path.json`, then `path` as is,
    /// then `path/index.json`
    fn probe(path: &Path) -> Option<PathBuf> {
        if is_json(path) && path.is_file() {
            return Some(path.to_path_buf());
        }

        let mut with_ext = path.as_os_str().to_owned();
        with_ext.push(".json");
        let with_ext = PathBuf::from(with_ext);
        if with_ext.is_file() {
            return Some(with_ext);
        }

        // Found but unloadable; `load` reports it
        if path.is_file() {
            return Some(path.to_path_buf());
        }

        let index = path.join("index.json");
        index.is_file().then_some(index)
    }
}

impl ModuleRegistry for FsModuleRegistry {
    fn resolve(&self, from: &Path, request: &str) -> Result<String, ResolveError> {
        let found = if is_path_request(request) {
            Self::probe(&normalize_path(&from.join(request)))
        } else {
            from.ancestors()
                .find_map(|dir| Self::probe(&dir.join("node_modules").join(request)))
        };

        found
            .map(|path| path.to_string_lossy().into_owned())
            .ok_or_else(|| ResolveError::NotFound {
                request: request.to_string(),
                from: from.to_path_buf(),
            })
    }

    fn load(&self, id: &str) -> Result<Module, LoadError> {
        let path = Path::new(id);

        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LoadError::NotFound(id.to_string())
            } else {
                LoadError::failed(id, e)
            }
        })?;

        if !is_json(path) {
            return Err(LoadError::failed(
                id,
                anyhow::anyhow!("unsupported module type, only .json modules can be loaded"),
            ));
        }

        let value: Value = serde_json::from_str(&content)
            .with_context(|| format!("invalid JSON in {}", path.display()))
            .map_err(|e| LoadError::failed(id, e))?;

        tracing::debug!(module = %id, "Module loaded");
        Ok(Module::Data(value))
    }
}
