pub mod manager;

pub use manager::{LibraryError, LibraryManager};

use std::sync::Arc;

/// Shared library manager handle cloned into every request handler
#[derive(Clone)]
pub struct SharedLibraryManager {
    inner: Arc<LibraryManager>,
}

impl SharedLibraryManager {
    pub fn new(manager: LibraryManager) -> Self {
        SharedLibraryManager {
            inner: Arc::new(manager),
        }
    }

    /// Get a reference to the library manager
    pub fn get(&self) -> &LibraryManager {
        &self.inner
    }
}
