//! Ordered listener lists for engine and stream events.
//!
//! Listeners are invoked synchronously, in registration order, on the task
//! that raises the event. A listener must not block.

use std::fmt;

/// Boxed listener receiving a borrowed event value.
pub type Listener<E> = Box<dyn Fn(&E) + Send + Sync>;

/// A list of listeners for one kind of event.
///
/// # Examples
///
/// ```
/// use attraccess_core::SubscriberList;
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// let hits = Arc::new(AtomicUsize::new(0));
/// let mut list: SubscriberList<str> = SubscriberList::new();
///
/// let counter = Arc::clone(&hits);
/// list.register(move |uid: &str| {
///     assert_eq!(uid, "04ABCDEF");
///     counter.fetch_add(1, Ordering::SeqCst);
/// });
///
/// list.notify("04ABCDEF");
/// assert_eq!(hits.load(Ordering::SeqCst), 1);
/// ```
pub struct SubscriberList<E: ?Sized> {
    listeners: Vec<Listener<E>>,
}

impl<E: ?Sized> SubscriberList<E> {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Append a listener. Registration order is notification order.
    pub fn register<F>(&mut self, listener: F)
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    /// Invoke every registered listener with `event`.
    pub fn notify(&self, event: &E) {
        for listener in &self.listeners {
            listener(event);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl<E: ?Sized> Default for SubscriberList<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ?Sized> fmt::Debug for SubscriberList<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberList")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
