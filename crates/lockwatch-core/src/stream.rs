// ── Reactive subscriptions ──
//
// Subscription type for consuming changes from the LockStore.

use tokio::sync::watch;

/// A subscription to one value held by the store.
///
/// Pairs the value last observed with change notification via
/// [`changed()`](Self::changed).
pub struct Subscription<T: Clone + Send + Sync + 'static> {
    current: T,
    receiver: watch::Receiver<T>,
}

impl<T: Clone + Send + Sync + 'static> Subscription<T> {
    pub(crate) fn new(mut receiver: watch::Receiver<T>) -> Self {
        let current = receiver.borrow_and_update().clone();
        Self { current, receiver }
    }

    /// The value seen by the last `changed()` (or at creation).
    pub fn current(&self) -> &T {
        &self.current
    }

    /// Wait for the next change, returning the new value.
    /// Returns `None` if the store has been dropped.
    pub async fn changed(&mut self) -> Option<T> {
        self.receiver.changed().await.ok()?;
        let value = self.receiver.borrow_and_update().clone();
        self.current = value.clone();
        Some(value)
    }
}
