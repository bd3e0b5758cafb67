//! Hooks plugins tap into
//!
//! A hook is a named extension point. Plugins register taps during
//! `apply`; the host (or a block) later calls the hook, which runs the
//! taps in registration order.
//!
//! | Hook | Dispatch | Result |
//! |------|----------|--------|
//! | [`SyncHook`] | synchronous, every tap | first tap error aborts |
//! | [`SyncBailHook`] | synchronous, until a tap returns `Some` | the bailed value |
//! | [`AsyncSeriesHook`] | awaited one after another | first rejection aborts |

mod series;
mod sync;
mod table;

pub use series::AsyncSeriesHook;
pub use sync::{SyncBailHook, SyncHook};
pub use table::{HookAccessor, HookTable, HookTableBuilder, HostHooks};

use thiserror::Error;

/// Errors raised while looking up or calling hooks
#[derive(Debug, Error)]
pub enum HookError {
    #[error("Hook '{0}' not found")]
    NotFound(String),

    #[error("Hook '{name}' is not a {expected}")]
    TypeMismatch { name: String, expected: &'static str },

    #[error("No hookable named '{0}' is registered")]
    HookableNotFound(String),

    #[error("Tap '{tap}' of hook '{hook}' failed: {source}")]
    TapFailed {
        hook: String,
        tap: String,
        #[source]
        source: anyhow::Error,
    },
}

impl HookError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "HOOK_NOT_FOUND",
            Self::TypeMismatch { .. } => "HOOK_TYPE_MISMATCH",
            Self::HookableNotFound(_) => "HOOKABLE_NOT_FOUND",
            Self::TapFailed { .. } => "HOOK_TAP_FAILED",
        }
    }
}

/// Common surface of every hook type
pub trait Hook: Send + Sync + 'static {
    /// Human readable hook kind, used in type mismatch errors
    const KIND: &'static str;

    fn name(&self) -> &str;

    /// Number of registered taps
    fn taps(&self) -> usize;

    /// Names of registered taps, in call order
    fn tap_names(&self) -> Vec<String>;
}

pub(crate) struct Tap<F> {
    pub(crate) name: String,
    pub(crate) f: F,
}

impl<F: Clone> Clone for Tap<F> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            f: self.f.clone(),
        }
    }
}
