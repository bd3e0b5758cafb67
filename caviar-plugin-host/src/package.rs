//! Project package manifest

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CaviarError;
use crate::module::{LoadError, Module, ModuleRegistry};

/// The project's `package.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Package {
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// Read `<cwd>/package.json` through the registry
pub fn read_package(registry: &dyn ModuleRegistry, cwd: &Path) -> Result<Package, CaviarError> {
    let id = cwd.join("package.json");
    let id = id.to_string_lossy();

    let module = registry.load(&id).map_err(|e| match e {
        LoadError::NotFound(_) => CaviarError::PackageNotFound {
            cwd: cwd.to_path_buf(),
        },
        e @ LoadError::Failed { .. } => CaviarError::package_load_failed(cwd, e),
    })?;

    let value = match module {
        Module::Data(value) => value,
        other => {
            return Err(CaviarError::package_load_failed(
                cwd,
                anyhow::anyhow!("expected JSON data, got a {} module", other.kind()),
            ))
        }
    };

    let package: Package = serde_json::from_value(value)
        .map_err(|e| CaviarError::package_load_failed(cwd, e))?;

    tracing::debug!(package = %package.name, cwd = %cwd.display(), "Package loaded");
    Ok(package)
}
