//! In-process event publisher.
//!
//! [`EventBus`] is a cloneable handle to one ordered subscriber list. The
//! store and the connection layer each hold a clone and publish through it;
//! UI code, the stats tracker and tests subscribe to it.
//!
//! Delivery is synchronous: [`EventBus::publish`] calls every handler, in
//! subscription order, before it returns. There is no queue. Handlers must
//! not publish, subscribe or unsubscribe on the bus they are called from;
//! such a call is refused and logged.
//!
//! The bus is single-threaded (`Rc`), matching the cooperative loop that
//! owns the store.

use std::cell::RefCell;
use std::rc::Rc;

use crossview_types::SyncEvent;
use tracing::{trace, warn};

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Handler = Box<dyn FnMut(&SyncEvent)>;

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    handlers: Vec<(SubscriptionId, Handler)>,
}

/// Cloneable handle to a synchronous, ordered subscriber list.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Rc<RefCell<Subscribers>>,
}

impl EventBus {
    /// A bus with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; it sees every event published from now on.
    ///
    /// Returns `None` if called from inside a handler.
    pub fn subscribe<F>(&self, handler: F) -> Option<SubscriptionId>
    where
        F: FnMut(&SyncEvent) + 'static,
    {
        let Ok(mut subs) = self.inner.try_borrow_mut() else {
            warn!("subscribe called during event delivery, ignored");
            return None;
        };
        let id = SubscriptionId(subs.next_id);
        subs.next_id = subs.next_id.saturating_add(1);
        subs.handlers.push((id, Box::new(handler)));
        Some(id)
    }

    /// Remove a handler. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let Ok(mut subs) = self.inner.try_borrow_mut() else {
            warn!("unsubscribe called during event delivery, ignored");
            return false;
        };
        let before = subs.handlers.len();
        subs.handlers.retain(|(sid, _)| *sid != id);
        subs.handlers.len() != before
    }

    /// Deliver an event to every handler in subscription order.
    pub fn publish(&self, event: &SyncEvent) {
        let Ok(mut subs) = self.inner.try_borrow_mut() else {
            warn!(event = event.name(), "publish called during event delivery, dropped");
            return;
        };
        trace!(event = event.name(), subscribers = subs.handlers.len(), "publishing");
        for (_, handler) in &mut subs.handlers {
            handler(event);
        }
    }

    /// Number of registered handlers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.try_borrow().map_or(0, |subs| subs.handlers.len())
    }
}

impl core::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
