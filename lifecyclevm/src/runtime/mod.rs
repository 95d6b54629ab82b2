pub mod class;
pub mod linker;

use crate::sync::{self, Arc, Mutex, MutexGuard};

use self::class::{
    registry::ClassRegistry, ClassDefinition, ClassError, ClassLayout, ClassState,
};

/// Handle to the class registry shared by every thread of the vm.
///
/// Each operation holds the registry lock for its whole duration, so
/// class initialization is a critical section. Static initializers get the
/// already locked registry and must not go through the `Runtime` again.
#[derive(Clone)]
pub struct Runtime {
    classes: Arc<Mutex<ClassRegistry>>,
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_registry(ClassRegistry::new())
    }

    pub fn with_registry(registry: ClassRegistry) -> Self {
        Self {
            classes: Arc::new(Mutex::new(registry)),
        }
    }

    pub fn define(
        &self,
        identifier: impl Into<String>,
        definition: ClassDefinition,
    ) -> Result<(), ClassError> {
        self.classes().define(identifier, definition)
    }

    pub fn ensure_initialized(&self, identifier: &str) -> Result<(), ClassError> {
        self.classes().ensure_initialized(identifier)
    }

    pub fn state_of(&self, identifier: &str) -> ClassState {
        self.classes().state_of(identifier)
    }

    pub fn layout_of(&self, identifier: &str) -> Option<ClassLayout> {
        self.classes().layout_of(identifier)
    }

    /// Locks the registry for a sequence of operations.
    pub fn classes(&self) -> MutexGuard<'_, ClassRegistry> {
        sync::lock(&self.classes)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}
