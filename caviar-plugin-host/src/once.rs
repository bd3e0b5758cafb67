//! First-caller-wins latch over a set of callables

use std::sync::atomic::{AtomicBool, Ordering};

/// Guards several callables so that only the first invocation, across
/// all slots, actually runs.
pub struct OnceLatch<F> {
    fired: AtomicBool,
    slots: Vec<F>,
}

impl<F> OnceLatch<F> {
    pub fn new(slots: impl IntoIterator<Item = F>) -> Self {
        Self {
            fired: AtomicBool::new(false),
            slots: slots.into_iter().collect(),
        }
    }

    /// Run `slot` with `arg` unless some slot already ran.
    ///
    /// Returns `None` when the latch has fired before or `slot` is out of
    /// range; an out of range slot does not consume the latch.
    pub fn invoke<A, R>(&self, slot: usize, arg: A) -> Option<R>
    where
        F: Fn(A) -> R,
    {
        let f = self.slots.get(slot)?;

        self.fired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;

        Some(f(arg))
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
