//! Error taxonomy surfaced by config activation
//!
//! Errors are grouped by the phase that failed, not by the underlying
//! cause. Load-time failures keep the identifier that was attempted and
//! the cause, so "not found" and "found but broken" stay distinguishable.

use std::path::PathBuf;
use thiserror::Error;

use crate::block::BlockError;
use crate::hooks::HookError;

/// Errors that can occur while loading a config and activating its plugins
#[derive(Debug, Error)]
pub enum CaviarError {
    #[error("Failed to load config file '{file}': {source}")]
    LoadConfigFailed {
        file: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Preset '{preset}' not found: {source}")]
    PresetNotFound {
        preset: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to load preset '{preset}': {source}")]
    LoadPresetFailed {
        preset: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Invalid plugin {plugin}: a plugin must be an object with an `apply` method")]
    InvalidPlugin { plugin: String },

    #[error("Invalid plugin condition {condition}: expected a condition spec or a predicate")]
    InvalidPluginCondition { condition: String },

    #[error("Invalid caviar.plugins {plugins}: expected a list")]
    InvalidPlugins { plugins: String },

    #[error("package.json not found in '{}'", cwd.display())]
    PackageNotFound { cwd: PathBuf },

    #[error("Failed to load package.json in '{}': {source}", cwd.display())]
    PackageLoadFailed {
        cwd: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("Config '{file}' does not define caviar.mixer")]
    MixerNotDefined { file: String },

    #[error("Plugin '{plugin}' failed to apply: {source}")]
    PluginApplyFailed {
        plugin: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Hook(#[from] HookError),

    #[error(transparent)]
    Block(#[from] BlockError),
}

impl CaviarError {
    pub fn load_config_failed(file: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::LoadConfigFailed {
            file: file.into(),
            source: source.into(),
        }
    }

    pub fn package_load_failed(cwd: impl Into<PathBuf>, source: impl Into<anyhow::Error>) -> Self {
        Self::PackageLoadFailed {
            cwd: cwd.into(),
            source: source.into(),
        }
    }

    /// Stable error code for operators and tests
    pub fn code(&self) -> &'static str {
        match self {
            Self::LoadConfigFailed { .. } => "LOAD_CONFIG_FAILED",
            Self::PresetNotFound { .. } => "PRESET_NOT_FOUND",
            Self::LoadPresetFailed { .. } => "LOAD_PRESET_FAILED",
            Self::InvalidPlugin { .. } => "INVALID_PLUGIN",
            Self::InvalidPluginCondition { .. } => "INVALID_PLUGIN_CONDITION",
            Self::InvalidPlugins { .. } => "INVALID_PLUGINS",
            Self::PackageNotFound { .. } => "PACKAGE_NOT_FOUND",
            Self::PackageLoadFailed { .. } => "PACKAGE_LOAD_FAILED",
            Self::MixerNotDefined { .. } => "MIXER_NOT_DEFINED",
            Self::PluginApplyFailed { .. } => "PLUGIN_APPLY_FAILED",
            Self::Hook(e) => e.code(),
            Self::Block(e) => e.code(),
        }
    }

    /// Full diagnostic trace of the underlying cause, if there is one
    pub fn trace(&self) -> Option<String> {
        match self {
            Self::LoadConfigFailed { source, .. }
            | Self::PresetNotFound { source, .. }
            | Self::LoadPresetFailed { source, .. }
            | Self::PackageLoadFailed { source, .. }
            | Self::PluginApplyFailed { source, .. } => Some(format!("{:?}", source)),
            _ => None,
        }
    }

    /// Whether this is a load-time failure (config, preset or package)
    pub fn is_load_failure(&self) -> bool {
        matches!(
            self,
            Self::LoadConfigFailed { .. }
                | Self::PresetNotFound { .. }
                | Self::LoadPresetFailed { .. }
                | Self::PackageNotFound { .. }
                | Self::PackageLoadFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        let err = CaviarError::InvalidPlugin {
            plugin: "null".into(),
        };
        assert_eq!(err.code(), "INVALID_PLUGIN");
        assert!(err.trace().is_none());
        assert!(!err.is_load_failure());

        let err = CaviarError::PackageNotFound {
            cwd: PathBuf::from("/project"),
        };
        assert_eq!(err.code(), "PACKAGE_NOT_FOUND");
        assert!(err.is_load_failure());
    }

    #[test]
    fn test_trace_includes_cause_chain() {
        let cause = anyhow::anyhow!("unexpected token").context("parse caviar.config");
        let err = CaviarError::load_config_failed("/project/caviar.config", cause);

        assert_eq!(err.code(), "LOAD_CONFIG_FAILED");
        let trace = err.trace().unwrap();
        assert!(trace.contains("parse caviar.config"));
        assert!(trace.contains("unexpected token"));
        assert!(err.to_string().contains("/project/caviar.config"));
    }
}
