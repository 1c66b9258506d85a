//! Shared value cell behind each data port.

use std::sync::{Arc, PoisonError, RwLock};

use nodeflow_core::Value;

/// The value currently held by one data port.
///
/// Slots are shared between the graph and every executor built from it;
/// snapshot reads and publish writes are the only accesses.
#[derive(Debug, Clone, Default)]
pub(crate) struct PortSlot(Arc<RwLock<Option<Value>>>);

impl PortSlot {
    pub fn load(&self) -> Option<Value> {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn store(&self, value: Value) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = Some(value);
    }

    pub fn clear(&self) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
