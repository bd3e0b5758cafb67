use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

use super::{Hook, HookError, Tap};

type TapFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;
type AsyncTapFn<T> = Arc<dyn Fn(T) -> TapFuture + Send + Sync>;

/// Asynchronous hook awaiting taps one after another.
///
/// Each tap receives its own clone of the argument, so arguments are
/// usually cheap handles (e.g. [`SandboxEnvironment`](crate::SandboxEnvironment)).
pub struct AsyncSeriesHook<T> {
    name: String,
    taps: RwLock<Vec<Tap<AsyncTapFn<T>>>>,
}

impl<T> AsyncSeriesHook<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            taps: RwLock::new(Vec::new()),
        }
    }

    /// Register a promise tap
    pub fn tap_promise<F, Fut>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let tap_fn: AsyncTapFn<T> = Arc::new(move |arg| -> TapFuture { Box::pin(f(arg)) });
        self.taps.write().unwrap().push(Tap {
            name: name.into(),
            f: tap_fn,
        });
    }

    /// Register a synchronous tap on the async hook
    pub fn tap<F>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.tap_promise(name, move |arg| {
            let result = f(arg);
            async move { result }
        });
    }

    /// Run the taps in registration order.
    ///
    /// The first rejection is returned and the remaining taps do not run.
    pub async fn promise(&self, arg: T) -> Result<(), HookError> {
        let taps = self.taps.read().unwrap().clone();

        for tap in taps {
            tracing::trace!(hook = %self.name, tap = %tap.name, "Calling async tap");
            (tap.f)(arg.clone())
                .await
                .map_err(|source| HookError::TapFailed {
                    hook: self.name.clone(),
                    tap: tap.name.clone(),
                    source,
                })?;
        }
        Ok(())
    }
}

impl<T> Hook for AsyncSeriesHook<T>
where
    T: Clone + Send + Sync + 'static,
{
    const KIND: &'static str = "AsyncSeriesHook";

    fn name(&self) -> &str {
        &self.name
    }

    fn taps(&self) -> usize {
        self.taps.read().unwrap().len()
    }

    fn tap_names(&self) -> Vec<String> {
        self.taps.read().unwrap().iter().map(|t| t.name.clone()).collect()
    }
}

impl<T> fmt::Debug for AsyncSeriesHook<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncSeriesHook")
            .field("name", &self.name)
            .field("taps", &self.taps.read().unwrap().len())
            .finish()
    }
}
