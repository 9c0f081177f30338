use std::sync::Arc;

use crate::dispatch::ToolDispatcher;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<ToolDispatcher>,
}

impl AppState {
    pub fn new(dispatcher: ToolDispatcher) -> Self {
        AppState {
            dispatcher: Arc::new(dispatcher),
        }
    }
}
