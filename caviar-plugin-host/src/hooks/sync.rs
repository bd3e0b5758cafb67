use std::fmt;
use std::sync::{Arc, RwLock};

use super::{Hook, HookError, Tap};

type SyncTapFn<T> = Arc<dyn Fn(&T) -> anyhow::Result<()> + Send + Sync>;
type BailTapFn<T, R> = Arc<dyn Fn(&T) -> anyhow::Result<Option<R>> + Send + Sync>;

/// Synchronous hook calling every tap in order
pub struct SyncHook<T> {
    name: String,
    taps: RwLock<Vec<Tap<SyncTapFn<T>>>>,
}

impl<T: Send + Sync + 'static> SyncHook<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            taps: RwLock::new(Vec::new()),
        }
    }

    /// Register a tap
    pub fn tap<F>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.taps.write().unwrap().push(Tap {
            name: name.into(),
            f: Arc::new(f),
        });
    }

    /// Call every tap; the first failing tap aborts the call
    pub fn call(&self, arg: &T) -> Result<(), HookError> {
        // Taps may register further taps while running
        let taps = self.taps.read().unwrap().clone();

        for tap in taps {
            (tap.f)(arg).map_err(|source| HookError::TapFailed {
                hook: self.name.clone(),
                tap: tap.name.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

impl<T: Send + Sync + 'static> Hook for SyncHook<T> {
    const KIND: &'static str = "SyncHook";

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

impl<T> fmt::Debug for SyncHook<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncHook")
            .field("name", &self.name)
            .field("taps", &self.taps.read().unwrap().len())
            .finish()
    }
}

/// Synchronous hook that stops at the first tap returning a value
pub struct SyncBailHook<T, R> {
    name: String,
    taps: RwLock<Vec<Tap<BailTapFn<T, R>>>>,
}

impl<T, R> SyncBailHook<T, R>
where
    T: Send + Sync + 'static,
    R: Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            taps: RwLock::new(Vec::new()),
        }
    }

    /// Register a tap; returning `Some` bails out of the call
    pub fn tap<F>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(&T) -> anyhow::Result<Option<R>> + Send + Sync + 'static,
    {
        self.taps.write().unwrap().push(Tap {
            name: name.into(),
            f: Arc::new(f),
        });
    }

    pub fn call(&self, arg: &T) -> Result<Option<R>, HookError> {
        let taps = self.taps.read().unwrap().clone();

        for tap in taps {
            let bailed = (tap.f)(arg).map_err(|source| HookError::TapFailed {
                hook: self.name.clone(),
                tap: tap.name.clone(),
                source,
            })?;
            if bailed.is_some() {
                return Ok(bailed);
            }
        }
        Ok(None)
    }
}

impl<T, R> Hook for SyncBailHook<T, R>
where
    T: Send + Sync + 'static,
    R: Send + Sync + 'static,
{
    const KIND: &'static str = "SyncBailHook";

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

impl<T, R> fmt::Debug for SyncBailHook<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncBailHook")
            .field("name", &self.name)
            .field("taps", &self.taps.read().unwrap().len())
            .finish()
    }
}
