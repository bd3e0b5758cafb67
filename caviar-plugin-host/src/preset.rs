//! Preset resolution

use std::path::Path;
use std::sync::Arc;

use crate::error::CaviarError;
use crate::module::{require_module, LoadError, Module, ModuleRegistry};

/// Resolves and loads a preset by name, relative to the project
#[derive(Clone)]
pub struct PresetResolver {
    registry: Arc<dyn ModuleRegistry>,
}

impl PresetResolver {
    pub fn new(registry: Arc<dyn ModuleRegistry>) -> Self {
        Self { registry }
    }

    /// Load `preset` as seen from `from`.
    ///
    /// An absent or empty preset name is not an error. A preset that
    /// cannot be located is `PRESET_NOT_FOUND`; one that is located but
    /// fails to load is `LOAD_PRESET_FAILED`.
    pub fn resolve(&self, from: &Path, preset: Option<&str>) -> Result<Option<Module>, CaviarError> {
        let preset = match preset {
            Some(p) if !p.is_empty() => p,
            _ => return Ok(None),
        };

        let id = self
            .registry
            .resolve(from, preset)
            .map_err(|e| CaviarError::PresetNotFound {
                preset: preset.to_string(),
                source: e.into(),
            })?;

        let module = self.registry.load(&id).map_err(|e| match e {
            // Resolved but gone by the time it is loaded
            LoadError::NotFound(_) => CaviarError::PresetNotFound {
                preset: preset.to_string(),
                source: e.into(),
            },
            LoadError::Failed { .. } => CaviarError::LoadPresetFailed {
                preset: preset.to_string(),
                source: e.into(),
            },
        })?;

        tracing::debug!(preset = %preset, id = %id, kind = module.kind(), "Preset loaded");
        Ok(Some(require_module(module)))
    }
}

impl std::fmt::Debug for PresetResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresetResolver").finish_non_exhaustive()
    }
}
