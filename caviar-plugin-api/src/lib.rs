//! caviar-plugin-api: Shared types for the caviar plugin system
//!
//! This crate defines what a plugin declares about itself (sandbox and
//! phase requirements) and what the host knows about the process it is
//! running in. Both the host runtime and plugin authors depend on it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Environment variable set (non-empty) inside the sandboxed child process
pub const SANDBOX_ENV: &str = "CAVIAR_SANDBOX";

/// Environment variable holding the active build phase
pub const PHASE_ENV: &str = "CAVIAR_PHASE";

/// Phase used when no phase signal is present
pub const DEFAULT_PHASE: &str = "default";

/// Execution context a plugin gating decision is made against
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionContext {
    /// Whether the current process is the sandboxed child
    pub sandbox_child: bool,

    /// Currently active phase, if any
    pub phase: Option<String>,
}

impl ExecutionContext {
    /// Main process, no active phase
    pub fn main() -> Self {
        Self::default()
    }

    /// Sandboxed child process, no active phase
    pub fn sandbox_child() -> Self {
        Self {
            sandbox_child: true,
            phase: None,
        }
    }

    /// Set the active phase
    pub fn with_phase(mut self, phase: impl Into<String>) -> Self {
        self.phase = Some(phase.into());
        self
    }

    /// Build a context from a variable lookup.
    ///
    /// Empty values are treated as absent, matching how the launcher
    /// clears a signal.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        Self {
            sandbox_child: non_empty(SANDBOX_ENV).is_some(),
            phase: non_empty(PHASE_ENV),
        }
    }

    /// Read the context from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// The active phase, or [`DEFAULT_PHASE`]
    pub fn phase_or_default(&self) -> &str {
        self.phase.as_deref().unwrap_or(DEFAULT_PHASE)
    }
}

/// Source of the current execution context.
///
/// Consulted every time a decision is made, so implementations must not
/// cache: the signal may change between two decisions of the same run.
pub trait ContextSource: Send + Sync {
    fn current(&self) -> ExecutionContext;
}

/// Reads `CAVIAR_SANDBOX` / `CAVIAR_PHASE` on every call
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvContext;

impl ContextSource for EnvContext {
    fn current(&self) -> ExecutionContext {
        ExecutionContext::from_env()
    }
}

impl ContextSource for ExecutionContext {
    fn current(&self) -> ExecutionContext {
        self.clone()
    }
}

/// Conditions a plugin declares for being constructed and run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionSpec {
    /// Plugin only exists inside the sandboxed child
    #[serde(default)]
    pub sandbox: bool,

    /// Restrict activation to this phase
    #[serde(default)]
    pub phase: Option<String>,
}

impl ConditionSpec {
    /// Condition requiring the sandbox
    pub fn sandboxed() -> Self {
        Self {
            sandbox: true,
            phase: None,
        }
    }

    /// Condition restricted to a phase
    pub fn in_phase(phase: impl Into<String>) -> Self {
        Self {
            sandbox: false,
            phase: Some(phase.into()),
        }
    }

    /// Also restrict to a phase
    pub fn phase(mut self, phase: impl Into<String>) -> Self {
        self.phase = Some(phase.into());
        self
    }

    /// Declared phase, with an empty string meaning "no restriction"
    pub fn declared_phase(&self) -> Option<&str> {
        self.phase.as_deref().filter(|p| !p.is_empty())
    }
}

/// Phases a block declares it participates in
#[derive(Debug, Clone, PartialEq)]
pub enum Phases {
    /// Ordered list of phase names
    List(Vec<String>),

    /// Anything that is not a list of strings
    Malformed(Value),
}

impl Phases {
    /// Declare phases from names
    pub fn of<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(names.into_iter().map(Into::into).collect())
    }

    /// Classify an untyped declaration
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Array(items) if items.iter().all(Value::is_string) => Self::List(
                items
                    .into_iter()
                    .filter_map(|v| match v {
                        Value::String(s) => Some(s),
                        _ => None,
                    })
                    .collect(),
            ),
            other => Self::Malformed(other),
        }
    }

    /// Phase names, or `None` when malformed
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(list) => Some(list),
            Self::Malformed(_) => None,
        }
    }
}

/// Descriptor of a single block option, consumed by config merging
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionDescriptor {
    /// Merge strategy name, e.g. "bailTop"
    #[serde(rename = "type")]
    pub kind: String,

    /// Whether the option may be left unset
    #[serde(default)]
    pub optional: bool,
}

impl OptionDescriptor {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            optional: false,
        }
    }

    /// Mark as optional
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// Option schema of a block
pub type OptionSchema = BTreeMap<String, OptionDescriptor>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_context_from_lookup() {
        let ctx = ExecutionContext::from_lookup(lookup(&[
            (SANDBOX_ENV, "inner"),
            (PHASE_ENV, "release"),
        ]));
        assert!(ctx.sandbox_child);
        assert_eq!(ctx.phase.as_deref(), Some("release"));

        let ctx = ExecutionContext::from_lookup(lookup(&[]));
        assert_eq!(ctx, ExecutionContext::main());
        assert_eq!(ctx.phase_or_default(), DEFAULT_PHASE);
    }

    #[test]
    fn test_env_context_reads_process_env_each_call() {
        let source = EnvContext;

        std::env::set_var(SANDBOX_ENV, "inner");
        std::env::set_var(PHASE_ENV, "release");
        let ctx = source.current();
        assert!(ctx.sandbox_child);
        assert_eq!(ctx.phase.as_deref(), Some("release"));

        std::env::remove_var(SANDBOX_ENV);
        std::env::set_var(PHASE_ENV, "default");
        let ctx = source.current();
        assert!(!ctx.sandbox_child);
        assert_eq!(ctx.phase.as_deref(), Some("default"));

        std::env::remove_var(PHASE_ENV);
        assert_eq!(source.current(), ExecutionContext::main());
    }

    #[test]
    fn test_empty_signals_are_absent() {
        let ctx = ExecutionContext::from_lookup(lookup(&[(SANDBOX_ENV, ""), (PHASE_ENV, "")]));
        assert!(!ctx.sandbox_child);
        assert!(ctx.phase.is_none());
    }

    #[test]
    fn test_condition_spec_deserialization() {
        let spec: ConditionSpec = serde_json::from_value(json!({"sandbox": true})).unwrap();
        assert_eq!(spec, ConditionSpec::sandboxed());

        let spec: ConditionSpec = serde_json::from_value(json!({"phase": "release"})).unwrap();
        assert!(!spec.sandbox);
        assert_eq!(spec.declared_phase(), Some("release"));

        let spec: ConditionSpec = serde_json::from_value(json!({"phase": ""})).unwrap();
        assert_eq!(spec.declared_phase(), None);
    }

    #[test]
    fn test_phases_from_value() {
        assert_eq!(
            Phases::from_value(json!(["default", "release"])),
            Phases::of(["default", "release"])
        );
        assert_eq!(Phases::from_value(json!(1)), Phases::Malformed(json!(1)));
        assert!(Phases::from_value(json!(["default", 2])).as_list().is_none());
        assert_eq!(Phases::from_value(json!([])).as_list(), Some(&[][..]));
    }

    #[test]
    fn test_option_descriptor_serialization() {
        let desc: OptionDescriptor = serde_json::from_value(json!({"type": "bailTop"})).unwrap();
        assert_eq!(desc, OptionDescriptor::new("bailTop"));
        assert_eq!(
            serde_json::to_value(OptionDescriptor::new("bailTop").optional()).unwrap(),
            json!({"type": "bailTop", "optional": true})
        );
    }
}
