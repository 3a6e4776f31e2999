//! Per-connection dispatch table.
//!
//! Maps each [`MessageType`] to the handlers interested in it and fans
//! every routed message out to all of them, in registration order.
//!
//! Handlers may register or unregister (including themselves) while
//! being invoked: `route` copies the handler list for the type before
//! calling anything, so the table is never borrowed across a handler
//! call. A handler removed mid-route still sees the message being routed;
//! it will not see the next one.

use core::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use super::message::{Message, MessageType};

/// Identifies one registration, returned by [`DispatchTable::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// A message handler. Shared so a snapshot can outlive the table borrow.
pub type Handler = Rc<dyn Fn(&Message)>;

/// Message type → handlers, with interior mutability for re-entrant use.
#[derive(Default)]
pub struct DispatchTable {
    entries: RefCell<HashMap<MessageType, Vec<(HandlerId, Handler)>>>,
    next_id: Cell<u64>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler for `ty`. Handlers for the same type compose.
    pub fn register(&self, ty: MessageType, handler: impl Fn(&Message) + 'static) -> HandlerId {
        let id = HandlerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.entries
            .borrow_mut()
            .entry(ty)
            .or_default()
            .push((id, Rc::new(handler)));
        id
    }

    /// Remove exactly the registration `id` for `ty`.
    ///
    /// Returns `false` if it was not registered. Removing the last
    /// handler for a type removes the type from the table.
    pub fn unregister(&self, ty: MessageType, id: HandlerId) -> bool {
        let mut entries = self.entries.borrow_mut();
        let Some(handlers) = entries.get_mut(&ty) else {
            return false;
        };
        let Some(pos) = handlers.iter().position(|(h, _)| *h == id) else {
            return false;
        };
        handlers.remove(pos);
        if handlers.is_empty() {
            entries.remove(&ty);
        }
        true
    }

    /// Invoke every handler registered for the message's type.
    ///
    /// Returns how many handlers ran. Unhandled types are a silent no-op.
    pub fn route(&self, message: &Message) -> usize {
        let ty = message.message_type();
        let snapshot: Vec<Handler> = match self.entries.borrow().get(&ty) {
            Some(handlers) => handlers.iter().map(|(_, h)| Rc::clone(h)).collect(),
            None => {
                debug!("No handler for {:?}, dropping", ty);
                return 0;
            }
        };

        for handler in &snapshot {
            handler(message);
        }
        snapshot.len()
    }

    /// Number of handlers currently registered for `ty`.
    pub fn handler_count(&self, ty: MessageType) -> usize {
        self.entries.borrow().get(&ty).map_or(0, Vec::len)
    }

    /// Whether `ty` has any handler at all.
    pub fn contains(&self, ty: MessageType) -> bool {
        self.entries.borrow().contains_key(&ty)
    }
}
