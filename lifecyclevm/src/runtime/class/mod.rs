pub mod registry;

use std::fmt::Debug;

use serde::Serialize;
use thiserror::Error;

use self::registry::ClassRegistry;

/// Result a static initializer reports back to the registry.
pub type InitResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// The class' static block. Receives the registry so that it can trigger
/// initialization of other classes it references.
pub type StaticInitializer = Box<dyn FnOnce(&mut ClassRegistry) -> InitResult + Send>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ClassState {
    NotLoaded,
    Loaded,
    Linked,
    Initializing,
    Initialized,
    Failed,
}

impl ClassState {
    /// No transition leaves a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ClassState::Initialized | ClassState::Failed)
    }
}

/// Static layout of the instances of a class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ClassLayout {
    pub instance_size: usize,
}

impl Default for ClassLayout {
    fn default() -> Self {
        // object header only
        Self {
            instance_size: std::mem::size_of::<usize>() * 2,
        }
    }
}

/// Everything the registry knows about a class before it is loaded.
#[derive(Default)]
pub struct ClassDefinition {
    pub superclass: Option<String>,
    pub dependencies: Vec<String>,
    pub static_initializer: Option<StaticInitializer>,
    pub layout: ClassLayout,
}

impl ClassDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_superclass(mut self, superclass: impl Into<String>) -> Self {
        self.superclass = Some(superclass.into());
        self
    }

    pub fn with_dependency(mut self, dependency: impl Into<String>) -> Self {
        self.dependencies.push(dependency.into());
        self
    }

    pub fn with_static_initializer<F>(mut self, initializer: F) -> Self
    where
        F: FnOnce(&mut ClassRegistry) -> InitResult + Send + 'static,
    {
        self.static_initializer = Some(Box::new(initializer));
        self
    }

    pub fn with_instance_size(mut self, instance_size: usize) -> Self {
        self.layout = ClassLayout { instance_size };
        self
    }
}

impl Debug for ClassDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassDefinition")
            .field("superclass", &self.superclass)
            .field("dependencies", &self.dependencies)
            .field(
                "static_initializer",
                &self.static_initializer.as_ref().map(|_| "<static-block>"),
            )
            .field("layout", &self.layout)
            .finish()
    }
}

/// Runtime record of a class once it has been referenced.
pub struct ClassDescriptor {
    pub identifier: String,
    pub state: ClassState,
    pub superclass: Option<String>,
    pub dependencies: Vec<String>,
    pub layout: ClassLayout,
    // Taken out when the class enters `Initializing` so it can only run once.
    static_initializer: Option<StaticInitializer>,
    failure: Option<ClassError>,
}

impl ClassDescriptor {
    pub fn new(identifier: String, definition: ClassDefinition) -> Self {
        Self {
            identifier,
            state: ClassState::NotLoaded,
            superclass: definition.superclass,
            dependencies: definition.dependencies,
            layout: definition.layout,
            static_initializer: definition.static_initializer,
            failure: None,
        }
    }

    pub fn has_static_initializer(&self) -> bool {
        self.static_initializer.is_some()
    }

    /// The error the class failed with, if it is in the `Failed` state.
    pub fn failure(&self) -> Option<&ClassError> {
        self.failure.as_ref()
    }

    fn take_static_initializer(&mut self) -> Option<StaticInitializer> {
        self.static_initializer.take()
    }

    fn fail(&mut self, error: ClassError) {
        self.state = ClassState::Failed;
        self.failure = Some(error);
    }
}

impl Debug for ClassDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassDescriptor")
            .field("identifier", &self.identifier)
            .field("state", &self.state)
            .field("superclass", &self.superclass)
            .field("dependencies", &self.dependencies)
            .field("layout", &self.layout)
            .field("failure", &self.failure)
            .finish()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassError {
    #[error("Initialization of class {class:?} failed: {reason}")]
    InitializationFailed { class: String, reason: String },
    #[error("Class {class:?} is already being initialized")]
    CyclicInitialization { class: String },
    #[error("Class {class:?} could not be linked, dependency {dependency:?} is not defined")]
    LinkageFailed { class: String, dependency: String },
    #[error("Class identifier cannot be empty")]
    InvalidIdentifier,
    #[error("Class {class:?} has already been loaded and cannot be redefined")]
    AlreadyLoaded { class: String },
}

impl ClassError {
    pub fn is_initialization_failure(&self) -> bool {
        matches!(self, ClassError::InitializationFailed { .. })
    }

    pub fn is_cyclic_initialization(&self) -> bool {
        matches!(self, ClassError::CyclicInitialization { .. })
    }
}
