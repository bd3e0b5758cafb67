//! Plugins and plugin descriptors
//!
//! A config lists plugins either directly or as a pair of
//! `(plugin or factory, condition)`. Every shape a config can contain,
//! including malformed ones, is a variant here, so validation matches on
//! variants instead of probing values.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use caviar_plugin_api::{ConditionSpec, ExecutionContext};
use serde_json::Value;

use crate::hooks::HookAccessor;

/// An extension tapping into host and block hooks
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Name used for taps and diagnostics
    fn name(&self) -> &str;

    /// Whether the plugin only exists inside the sandbox
    fn sandbox(&self) -> bool {
        false
    }

    /// Phase the plugin is restricted to
    fn phase(&self) -> Option<&str> {
        None
    }

    /// Register taps on the hooks
    async fn apply(&self, hooks: &HookAccessor<'_>) -> anyhow::Result<()>;
}

/// Condition declared by a plugin object itself
pub fn declared_condition(plugin: &dyn Plugin) -> ConditionSpec {
    ConditionSpec {
        sandbox: plugin.sandbox(),
        phase: plugin.phase().map(str::to_string),
    }
}

/// A value that should be a plugin
#[derive(Clone)]
pub enum PluginCandidate {
    Plugin(Arc<dyn Plugin>),

    /// Anything without a callable `apply`: null, a primitive, a bare object
    Malformed(Value),
}

impl PluginCandidate {
    pub fn new(plugin: impl Plugin + 'static) -> Self {
        Self::Plugin(Arc::new(plugin))
    }

    /// Short rendering used in errors and logs
    pub fn describe(&self) -> String {
        match self {
            Self::Plugin(p) => format!("'{}'", p.name()),
            Self::Malformed(v) => v.to_string(),
        }
    }
}

impl fmt::Debug for PluginCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plugin(p) => f.debug_tuple("Plugin").field(&p.name()).finish(),
            Self::Malformed(v) => f.debug_tuple("Malformed").field(v).finish(),
        }
    }
}

pub type PluginFactory = Arc<dyn Fn() -> PluginCandidate + Send + Sync>;
pub type ConditionPredicate = Arc<dyn Fn(&ExecutionContext) -> bool + Send + Sync>;

/// First element of a conditional descriptor
#[derive(Clone)]
pub enum PluginSource {
    Value(PluginCandidate),

    /// Constructed only if the condition allows construction
    Factory(PluginFactory),
}

impl PluginSource {
    /// Produce the candidate, calling the factory if needed
    pub fn construct(&self) -> PluginCandidate {
        match self {
            Self::Value(candidate) => candidate.clone(),
            Self::Factory(factory) => factory(),
        }
    }
}

impl fmt::Debug for PluginSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(c) => f.debug_tuple("Value").field(c).finish(),
            Self::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

/// Second element of a conditional descriptor
#[derive(Clone)]
pub enum Condition {
    Spec(ConditionSpec),

    /// Custom run condition, evaluated at activation time
    Predicate(ConditionPredicate),

    Malformed(Value),
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spec(spec) => f.debug_tuple("Spec").field(spec).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
            Self::Malformed(v) => f.debug_tuple("Malformed").field(v).finish(),
        }
    }
}

impl Condition {
    /// Classify an untyped condition value
    pub fn from_value(value: Value) -> Self {
        if value.is_object() {
            if let Ok(spec) = serde_json::from_value::<ConditionSpec>(value.clone()) {
                return Self::Spec(spec);
            }
        }
        Self::Malformed(value)
    }
}

/// One entry of `caviar.plugins`
#[derive(Debug, Clone)]
pub enum PluginDescriptor {
    Plain(PluginCandidate),
    Conditional(PluginSource, Condition),
}

impl PluginDescriptor {
    pub fn plugin(plugin: impl Plugin + 'static) -> Self {
        Self::Plain(PluginCandidate::new(plugin))
    }

    /// Plugin guarded by a condition spec
    pub fn when(plugin: impl Plugin + 'static, spec: ConditionSpec) -> Self {
        Self::Conditional(
            PluginSource::Value(PluginCandidate::new(plugin)),
            Condition::Spec(spec),
        )
    }

    /// Lazily constructed plugin guarded by a condition spec
    pub fn factory<F>(factory: F, spec: ConditionSpec) -> Self
    where
        F: Fn() -> PluginCandidate + Send + Sync + 'static,
    {
        Self::Conditional(PluginSource::Factory(Arc::new(factory)), Condition::Spec(spec))
    }

    /// Plugin guarded by a custom run predicate
    pub fn when_fn<P>(source: PluginSource, predicate: P) -> Self
    where
        P: Fn(&ExecutionContext) -> bool + Send + Sync + 'static,
    {
        Self::Conditional(source, Condition::Predicate(Arc::new(predicate)))
    }

    pub fn malformed(value: Value) -> Self {
        Self::Plain(PluginCandidate::Malformed(value))
    }

    /// Classify an entry read from a data module.
    ///
    /// Data cannot carry a callable `apply`, so the plugin half is always
    /// malformed; a two-element array still keeps its condition so a bad
    /// condition is reported as such.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Array(mut pair) if pair.len() == 2 => {
                let condition = Condition::from_value(pair.pop().unwrap_or(Value::Null));
                let source = pair.pop().unwrap_or(Value::Null);
                Self::Conditional(
                    PluginSource::Value(PluginCandidate::Malformed(source)),
                    condition,
                )
            }
            other => Self::malformed(other),
        }
    }
}

/// The `caviar.plugins` field as found in a config
#[derive(Debug, Clone)]
pub enum PluginsField {
    List(Vec<PluginDescriptor>),
    Malformed(Value),
}

impl Default for PluginsField {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

impl PluginsField {
    /// Classify an untyped `caviar.plugins` value
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Array(list) => Self::List(list.into_iter().map(PluginDescriptor::from_value).collect()),
            other => Self::Malformed(other),
        }
    }
}

impl From<Vec<PluginDescriptor>> for PluginsField {
    fn from(list: Vec<PluginDescriptor>) -> Self {
        Self::List(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Named;

    #[async_trait]
    impl Plugin for Named {
        fn name(&self) -> &str {
            "Named"
        }

        fn phase(&self) -> Option<&str> {
            Some("release")
        }

        async fn apply(&self, _hooks: &HookAccessor<'_>) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_declared_condition() {
        let spec = declared_condition(&Named);
        assert!(!spec.sandbox);
        assert_eq!(spec.declared_phase(), Some("release"));
    }

    #[test]
    fn test_condition_from_value() {
        assert!(matches!(
            Condition::from_value(json!({"sandbox": true, "phase": "default"})),
            Condition::Spec(ConditionSpec { sandbox: true, .. })
        ));
        assert!(matches!(Condition::from_value(json!(1)), Condition::Malformed(_)));
        assert!(matches!(
            Condition::from_value(json!({"sandbox": "yes"})),
            Condition::Malformed(_)
        ));
    }

    #[test]
    fn test_plugins_field_from_value() {
        assert!(matches!(PluginsField::from_value(json!(1)), PluginsField::Malformed(_)));
        assert!(matches!(PluginsField::from_value(json!({})), PluginsField::Malformed(_)));

        let field = PluginsField::from_value(json!([]));
        assert!(matches!(field, PluginsField::List(ref l) if l.is_empty()));

        let field = PluginsField::from_value(json!(["name", ["name", 1], ["name", {"sandbox": true}]]));
        let list = match field {
            PluginsField::List(list) => list,
            other => panic!("Expected list, got {:?}", other),
        };
        assert!(matches!(&list[0], PluginDescriptor::Plain(PluginCandidate::Malformed(v)) if v == "name"));
        assert!(matches!(
            &list[1],
            PluginDescriptor::Conditional(_, Condition::Malformed(v)) if v == 1
        ));
        assert!(matches!(
            &list[2],
            PluginDescriptor::Conditional(
                PluginSource::Value(PluginCandidate::Malformed(_)),
                Condition::Spec(ConditionSpec { sandbox: true, .. })
            )
        ));
    }

    #[test]
    fn test_factory_constructs_on_demand() {
        let source = PluginSource::Factory(Arc::new(|| PluginCandidate::new(Named)));
        assert_eq!(source.construct().describe(), "'Named'");
        assert_eq!(PluginCandidate::Malformed(Value::Null).describe(), "null");
    }
}
