//! Plugin shape validation

use std::sync::Arc;

use crate::error::CaviarError;
use crate::plugin::{Plugin, PluginCandidate};

/// Accept a candidate exposing `apply`, reject anything else.
///
/// There is no partial validation: a malformed candidate is never used.
pub fn validate(candidate: PluginCandidate) -> Result<Arc<dyn Plugin>, CaviarError> {
    match candidate {
        PluginCandidate::Plugin(plugin) => Ok(plugin),
        PluginCandidate::Malformed(value) => Err(CaviarError::InvalidPlugin {
            plugin: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::HookAccessor;
    use async_trait::async_trait;
    use serde_json::json;

    struct Noop;

    #[async_trait]
    impl Plugin for Noop {
        fn name(&self) -> &str {
            "Noop"
        }

        async fn apply(&self, _hooks: &HookAccessor<'_>) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_valid_plugin_is_returned_unchanged() {
        let plugin: Arc<dyn Plugin> = Arc::new(Noop);
        let validated = validate(PluginCandidate::Plugin(plugin.clone())).unwrap();
        assert!(Arc::ptr_eq(&plugin, &validated));
    }

    #[test]
    fn test_values_without_apply_are_rejected() {
        for value in [
            json!(null),
            json!(1),
            json!("plugin"),
            json!({}),
            json!({"apply": true}),
            json!({"apply": "function"}),
        ] {
            let err = validate(PluginCandidate::Malformed(value.clone()))
                .err()
                .unwrap_or_else(|| panic!("{} should be rejected", value));
            assert_eq!(err.code(), "INVALID_PLUGIN");
        }
    }
}
