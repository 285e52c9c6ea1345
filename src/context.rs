//! Unit-of-work context supplied by the host bus.
//!
//! The transport memoizes one [`Transaction`](crate::Transaction) per
//! context in its scratch storage; the host decides when that unit of work
//! commits or rolls back and calls the transport accordingly.

use std::any::Any;
use std::collections::HashMap;

pub type ContextItem = Box<dyn Any + Send>;

/// Capability the host provides for each unit of work
///
/// A context maps to exactly one worker's unit of work, so implementations
/// need no internal locking.
pub trait TransactionContext: Send {
    /// False means every send and receive applies immediately
    fn is_transactional(&self) -> bool;

    fn item_mut(&mut self, key: &str) -> Option<&mut (dyn Any + Send)>;

    fn set_item(&mut self, key: &str, item: ContextItem);

    fn take_item(&mut self, key: &str) -> Option<ContextItem>;
}

/// Plain in-memory context, for hosts without their own unit-of-work type
#[derive(Default)]
pub struct UnitOfWork {
    transactional: bool,
    items: HashMap<String, ContextItem>,
}

impl UnitOfWork {
    pub fn transactional() -> Self {
        Self {
            transactional: true,
            items: HashMap::new(),
        }
    }

    pub fn non_transactional() -> Self {
        Self::default()
    }
}

impl TransactionContext for UnitOfWork {
    fn is_transactional(&self) -> bool {
        self.transactional
    }

    fn item_mut(&mut self, key: &str) -> Option<&mut (dyn Any + Send)> {
        self.items.get_mut(key).map(|item| &mut **item)
    }

    fn set_item(&mut self, key: &str, item: ContextItem) {
        self.items.insert(key.to_string(), item);
    }

    fn take_item(&mut self, key: &str) -> Option<ContextItem> {
        self.items.remove(key)
    }
}
