// Latest flow count set: replaced wholesale each sampling pass

use crate::models::FlowCount;
use std::sync::{Arc, RwLock};

/// Shared result set of the most recent aggregation pass. Same swap
/// discipline as the identity store: a render that starts iterating holds an
/// `Arc` to one generation and never observes a mix of passes.
pub struct FlowStore {
    current: RwLock<Arc<Vec<FlowCount>>>,
}

impl Default for FlowStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowStore {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Replace the previous pass's full set. No merging and no decay: a flow
    /// absent from `counts` simply no longer appears.
    pub fn replace(&self, counts: Vec<FlowCount>) {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(counts);
    }

    /// Current result set generation.
    pub fn current(&self) -> Arc<Vec<FlowCount>> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }
}
