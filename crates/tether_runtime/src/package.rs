//! Packages
//!
//! A package bundles native modules and view managers. Packages are merged in
//! the order they were added to the builder.

use std::sync::Arc;

use tether_modules::{ModuleError, ModuleRegistryBuilder};
use tether_queue::QueueSet;
use tether_ui::{UiOperationQueue, ViewManager};

/// What a package may capture when creating its modules
#[derive(Clone)]
pub struct PackageContext {
    pub queues: QueueSet,
    pub ui: Arc<UiOperationQueue>,
}

/// A bundle of native modules and view managers
pub trait Package: Send {
    /// Package name, for logs
    fn name(&self) -> &str;

    /// Register this package's native modules
    fn register_modules(
        &self,
        _registry: &mut ModuleRegistryBuilder,
        _context: &PackageContext,
    ) -> Result<(), ModuleError> {
        Ok(())
    }

    /// View managers for this package
    fn view_managers(&self) -> Vec<Box<dyn ViewManager>> {
        Vec::new()
    }
}
