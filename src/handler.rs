//! Event handler registration

use crate::event::DatagramEvent;
use futures_util::future::BoxFuture;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Receives dispatched events.
///
/// Every registered handler runs in its own spawned task; a handler that
/// panics or never finishes does not affect its siblings or the receive loop.
/// Closures `Fn(Arc<DatagramEvent>) -> impl Future<Output = ()>` implement
/// this trait directly.
pub trait EventHandler: Send + Sync + 'static {
    /// Handle one event. The event is shared read-only with the other
    /// handlers registered for the same name.
    fn handle(&self, event: Arc<DatagramEvent>) -> BoxFuture<'static, ()>;
}

impl<F, Fut> EventHandler for F
where
    F: Fn(Arc<DatagramEvent>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn handle(&self, event: Arc<DatagramEvent>) -> BoxFuture<'static, ()> {
        Box::pin(self(event))
    }
}

/// Table of handlers keyed by event name, passed to the server at bind time.
///
/// ```
/// use opensips_datagram::{EventHandlers, EventName};
///
/// let handlers = EventHandlers::new()
///     .on(EventName::AccCdr, |event| async move {
///         println!("CDR for {:?}", event.attribute("callid"));
///     })
///     .on("E_MY_SCRIPT_EVENT", |event| async move {
///         println!("values: {:?}", event.values());
///     });
/// assert_eq!(handlers.handlers_for("E_ACC_CDR").len(), 1);
/// ```
#[derive(Clone, Default)]
pub struct EventHandlers {
    table: HashMap<String, Vec<Arc<dyn EventHandler>>>,
}

impl EventHandlers {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an async closure for events named `name`, after any handlers
    /// already registered for it.
    pub fn on<F, Fut>(mut self, name: impl AsRef<str>, handler: F) -> Self
    where
        F: Fn(Arc<DatagramEvent>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.register(name, Arc::new(handler));
        self
    }

    /// Register an already shared handler.
    pub fn register(&mut self, name: impl AsRef<str>, handler: Arc<dyn EventHandler>) {
        self.table
            .entry(
                name.as_ref()
                    .to_string(),
            )
            .or_default()
            .push(handler);
    }

    /// Handlers registered for `name`, in registration order.
    pub fn handlers_for(&self, name: &str) -> &[Arc<dyn EventHandler>] {
        self.table
            .get(name)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Event names with at least one handler.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.table
            .keys()
            .map(|k| k.as_str())
    }

    /// `true` if no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.table
            .is_empty()
    }
}

impl From<HashMap<String, Vec<Arc<dyn EventHandler>>>> for EventHandlers {
    fn from(table: HashMap<String, Vec<Arc<dyn EventHandler>>>) -> Self {
        Self { table }
    }
}

impl fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, handlers) in &self.table {
            map.entry(name, &handlers.len());
        }
        map.finish()
    }
}
