//! Plugin gating by execution context
//!
//! Construction and execution are decided separately. A sandbox-only
//! plugin is never constructed in the main process, whereas whether a
//! constructed plugin runs depends on the phase, which may only be known
//! later in the pipeline.

use std::fmt;

use caviar_plugin_api::{ConditionSpec, ExecutionContext};

use crate::plugin::ConditionPredicate;

/// Construction gate for one process
#[derive(Debug, Clone, Copy)]
pub struct PluginGate {
    is_sandbox_child: bool,
}

impl PluginGate {
    pub fn new(is_sandbox_child: bool) -> Self {
        Self { is_sandbox_child }
    }

    /// Gate for the given context
    pub fn for_context(ctx: &ExecutionContext) -> Self {
        Self::new(ctx.sandbox_child)
    }

    /// Whether a plugin with this condition may be constructed.
    ///
    /// Inside the sandbox child every plugin may be constructed; in the
    /// main process sandbox-only plugins are not.
    pub fn should_construct(&self, spec: &ConditionSpec) -> bool {
        let allowed = self.is_sandbox_child || !spec.sandbox;
        tracing::debug!(
            sandbox = spec.sandbox,
            sandbox_child = self.is_sandbox_child,
            allowed,
            "Plugin construction gate"
        );
        allowed
    }

    /// Deferred run condition for a declared spec
    pub fn run_condition(spec: &ConditionSpec) -> RunCondition {
        RunCondition::Declared(spec.clone())
    }
}

/// Whether a constructed plugin should run, decided at activation time.
///
/// Nothing is memoized: every [`evaluate`](Self::evaluate) looks at the
/// context it is given.
#[derive(Clone)]
pub enum RunCondition {
    Declared(ConditionSpec),
    Custom(ConditionPredicate),
}

impl RunCondition {
    pub fn evaluate(&self, ctx: &ExecutionContext) -> bool {
        match self {
            Self::Declared(spec) => {
                let sandbox_ok = !spec.sandbox || ctx.sandbox_child;
                let phase_ok = match spec.declared_phase() {
                    None => true,
                    Some(phase) => ctx.phase.as_deref() == Some(phase),
                };
                sandbox_ok && phase_ok
            }
            Self::Custom(predicate) => predicate(ctx),
        }
    }
}

impl fmt::Debug for RunCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Declared(spec) => f.debug_tuple("Declared").field(spec).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
