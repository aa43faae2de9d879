//! Synchronous publish/subscribe channel keyed by message type.
//!
//! The bus is constructed explicitly and shared (`Rc<NotificationBus>`) between the
//! coordinator and the surfaces it opens. Dispatch runs on the caller's thread, in
//! registration order, and completes before `send` returns.

use std::{
    any::{type_name, Any, TypeId},
    cell::{Cell, RefCell},
    collections::HashMap,
    rc::Rc,
};

use thiserror::Error;

type Handler<M> = RefCell<Box<dyn FnMut(&M) -> anyhow::Result<()>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Debug, Error)]
pub enum BusError {
    #[error("handler for {message} failed: {source:#}")]
    Handler {
        message: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error("re-entrant dispatch of {message} into a running handler")]
    Reentrant { message: &'static str },
}

struct Registration {
    id: SubscriptionId,
    handler: Rc<dyn Any>,
}

#[derive(Default)]
pub struct NotificationBus {
    next_id: Cell<u64>,
    handlers: RefCell<HashMap<TypeId, Vec<Registration>>>,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<M, F>(&self, handler: F) -> SubscriptionId
    where
        M: 'static,
        F: FnMut(&M) -> anyhow::Result<()> + 'static,
    {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);

        let boxed: Box<dyn FnMut(&M) -> anyhow::Result<()>> = Box::new(handler);
        let handler: Rc<Handler<M>> = Rc::new(RefCell::new(boxed));
        self.handlers
            .borrow_mut()
            .entry(TypeId::of::<M>())
            .or_default()
            .push(Registration { id, handler });

        tracing::debug!(message_type = type_name::<M>(), subscription = id.0, "handler registered");
        id
    }

    /// Removes a handler. Returns `false` if it was already gone.
    pub fn unregister(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.borrow_mut();
        for registrations in handlers.values_mut() {
            if let Some(pos) = registrations.iter().position(|r| r.id == id) {
                registrations.remove(pos);
                return true;
            }
        }
        false
    }

    pub fn handler_count<M: 'static>(&self) -> usize {
        self.handlers
            .borrow()
            .get(&TypeId::of::<M>())
            .map_or(0, Vec::len)
    }

    /// Delivers `message` to every handler registered for `M` when the call starts.
    /// Stops at the first failing handler. Returns the number of handlers that ran.
    pub fn send<M: 'static>(&self, message: &M) -> Result<usize, BusError> {
        // snapshot so handlers may register or unregister while dispatching
        let snapshot: Vec<Rc<dyn Any>> = self
            .handlers
            .borrow()
            .get(&TypeId::of::<M>())
            .map(|regs| regs.iter().map(|r| Rc::clone(&r.handler)).collect())
            .unwrap_or_default();

        let name = type_name::<M>();
        let mut delivered = 0;
        for handler in snapshot {
            let Some(handler) = handler.downcast_ref::<Handler<M>>() else {
                continue;
            };
            let mut handler = handler
                .try_borrow_mut()
                .map_err(|_| BusError::Reentrant { message: name })?;
            let call = &mut **handler;
            call(message).map_err(|source| BusError::Handler {
                message: name,
                source,
            })?;
            delivered += 1;
        }

        tracing::debug!(message_type = name, delivered, "notification dispatched");
        Ok(delivered)
    }
}

#[cfg(test)]
#[path = "tests/bus_tests.rs"]
mod tests;
