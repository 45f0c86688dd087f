//! Handler registry: typed subscriptions keyed by event type plus generic
//! handlers that see every envelope.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

/// A registered callback. Typed handlers receive the envelope's `data` field
/// (or the whole envelope when `data` is absent); generic handlers always
/// receive the whole envelope.
pub type Handler = Arc<dyn Fn(&Value) + Send + Sync>;

#[derive(Default)]
struct Inner {
    next_id: u64,
    /// event type -> (handler id -> handler)
    typed: HashMap<String, HashMap<u64, Handler>>,
    /// handler id -> handler, called for every envelope
    generic: HashMap<u64, Handler>,
}

/// The shared registry behind a client.
#[derive(Default)]
pub struct Registry {
    inner: Mutex<Inner>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one event type. Dropping or calling
    /// [`Subscription::unsubscribe`] on the returned guard removes it.
    pub fn subscribe(
        self: &Arc<Self>,
        event_type: &str,
        handler: Handler,
    ) -> Subscription {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        let _ = inner
            .typed
            .entry(event_type.to_owned())
            .or_default()
            .insert(id, handler);
        Subscription {
            registry: Arc::downgrade(self),
            event_type: Some(event_type.to_owned()),
            id,
        }
    }

    /// Register a handler that sees every envelope.
    pub fn add_message_handler(self: &Arc<Self>, handler: Handler) -> Subscription {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        let _ = inner.generic.insert(id, handler);
        Subscription {
            registry: Arc::downgrade(self),
            event_type: None,
            id,
        }
    }

    /// Dispatch one inbound envelope. Handlers are cloned out of the lock
    /// before invocation so a handler may subscribe or unsubscribe freely.
    pub fn dispatch(&self, envelope: &Value) {
        let event_type = envelope.get("type").and_then(Value::as_str);

        let (typed, generic): (Vec<Handler>, Vec<Handler>) = {
            let inner = self.inner.lock();
            let typed = event_type
                .and_then(|t| inner.typed.get(t))
                .map(|m| m.values().cloned().collect())
                .unwrap_or_default();
            let generic = inner.generic.values().cloned().collect();
            (typed, generic)
        };

        if !typed.is_empty() {
            let data = envelope.get("data").unwrap_or(envelope);
            for handler in &typed {
                handler(data);
            }
        }
        for handler in &generic {
            handler(envelope);
        }

        if typed.is_empty() && generic.is_empty() {
            debug!(event_type, "no handler registered for envelope");
        }
    }

    fn remove(&self, event_type: Option<&str>, id: u64) {
        let mut inner = self.inner.lock();
        match event_type {
            Some(t) => {
                if let Some(handlers) = inner.typed.get_mut(t) {
                    let _ = handlers.remove(&id);
                    if handlers.is_empty() {
                        let _ = inner.typed.remove(t);
                    }
                }
            }
            None => {
                let _ = inner.generic.remove(&id);
            }
        }
    }

    #[cfg(test)]
    fn handler_count(&self) -> usize {
        let inner = self.inner.lock();
        inner.typed.values().map(HashMap::len).sum::<usize>() + inner.generic.len()
    }
}

/// Guard for a registered handler. The handler stays registered until
/// [`Subscription::unsubscribe`] is called or the guard is dropped.
pub struct Subscription {
    registry: Weak<Registry>,
    event_type: Option<String>,
    id: u64,
}

impl Subscription {
    /// Remove the handler now.
    pub fn unsubscribe(self) {
        // Drop does the work.
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.event_type.as_deref(), self.id);
        }
    }
}
