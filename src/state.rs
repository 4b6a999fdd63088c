//! Shared application state for routes that are not bound to one collection.

use crate::store::SharedStore;

#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
}
