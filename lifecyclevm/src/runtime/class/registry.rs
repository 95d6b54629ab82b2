use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::runtime::linker::Linker;

use super::{
    ClassDefinition, ClassDescriptor, ClassError, ClassLayout, ClassState, StaticInitializer,
};

/// Keeps track of every class the runtime has referenced and drives
/// them through loading, linking and initialization.
///
/// Classes are loaded lazily, on their first reference, and initialized on
/// their first active use. A class' static initializer runs at most once,
/// failure is sticky.
#[derive(Default)]
pub struct ClassRegistry {
    /// Definitions of classes that have not been loaded yet.
    definitions: HashMap<String, ClassDefinition>,
    /// Every identifier that has either been defined or loaded.
    known: HashSet<String>,
    classes: HashMap<String, ClassDescriptor>,
    initialization_order: Vec<String>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the definition of a class without loading it.
    /// Only classes that have not been referenced yet can be (re)defined.
    pub fn define(
        &mut self,
        identifier: impl Into<String>,
        definition: ClassDefinition,
    ) -> Result<(), ClassError> {
        let identifier = identifier.into();
        validate_identifier(&identifier)?;
        if self.classes.contains_key(&identifier) {
            return Err(ClassError::AlreadyLoaded { class: identifier });
        }
        debug!("Defining class {identifier:?}");
        self.known.insert(identifier.clone());
        self.definitions.insert(identifier, definition);
        Ok(())
    }

    pub fn is_defined(&self, identifier: &str) -> bool {
        self.known.contains(identifier)
    }

    pub fn state_of(&self, identifier: &str) -> ClassState {
        self.classes
            .get(identifier)
            .map_or(ClassState::NotLoaded, |descriptor| descriptor.state)
    }

    pub fn descriptor(&self, identifier: &str) -> Option<&ClassDescriptor> {
        self.classes.get(identifier)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ClassDescriptor> {
        self.classes.values()
    }

    /// Layout of a loaded class. Unloaded classes have no layout yet.
    pub fn layout_of(&self, identifier: &str) -> Option<ClassLayout> {
        self.classes
            .get(identifier)
            .filter(|descriptor| descriptor.state != ClassState::Failed)
            .map(|descriptor| descriptor.layout)
    }

    /// Identifiers of classes in the order their initialization completed.
    pub fn initialization_order(&self) -> &[String] {
        &self.initialization_order
    }

    /// Passive reference to a class. Loads and links it, but does not
    /// run its static initializer.
    pub fn load(&mut self, identifier: &str) -> Result<ClassState, ClassError> {
        let descriptor = self.load_descriptor(identifier)?;
        match descriptor.state {
            ClassState::Failed => Err(failure_of(descriptor)),
            state => Ok(state),
        }
    }

    /// Active use of a class. Makes sure that the class has been loaded,
    /// linked and initialized. The static initializer, if any, runs exactly
    /// once, on the first call that finds the class linked.
    #[tracing::instrument(skip(self))]
    pub fn ensure_initialized(&mut self, identifier: &str) -> Result<(), ClassError> {
        let descriptor = self.load_descriptor(identifier)?;
        match descriptor.state {
            ClassState::Initialized => return Ok(()),
            ClassState::Initializing => {
                warn!("Class {identifier:?} requested during its own initialization");
                return Err(ClassError::CyclicInitialization {
                    class: identifier.to_owned(),
                });
            }
            ClassState::Failed => return Err(failure_of(descriptor)),
            ClassState::NotLoaded | ClassState::Loaded | ClassState::Linked => {}
        }
        descriptor.state = ClassState::Initializing;
        let initializer = descriptor.take_static_initializer();
        let superclass = descriptor.superclass.clone();
        debug!("Initializing class {identifier:?}");

        let outcome = self.run_initialization(identifier, superclass, initializer);

        // The initializer had mutable access to the registry and might
        // have reset it in the meantime.
        let Some(descriptor) = self.classes.get_mut(identifier) else {
            return outcome;
        };
        match outcome {
            Ok(()) => {
                descriptor.state = ClassState::Initialized;
                self.initialization_order.push(identifier.to_owned());
                info!("Class {identifier:?} initialized");
                Ok(())
            }
            Err(err) => {
                warn!("Class {identifier:?} failed to initialize: {err}");
                descriptor.fail(err.clone());
                Err(err)
            }
        }
    }

    /// Forgets every class and definition.
    pub fn reset(&mut self) {
        self.definitions.clear();
        self.known.clear();
        self.classes.clear();
        self.initialization_order.clear();
    }

    fn load_descriptor(&mut self, identifier: &str) -> Result<&mut ClassDescriptor, ClassError> {
        validate_identifier(identifier)?;
        let Self {
            definitions,
            known,
            classes,
            ..
        } = self;
        let descriptor = classes.entry(identifier.to_owned()).or_insert_with(|| {
            known.insert(identifier.to_owned());
            let definition = definitions.remove(identifier).unwrap_or_default();
            let mut descriptor = ClassDescriptor::new(identifier.to_owned(), definition);
            descriptor.state = ClassState::Loaded;
            debug!("Loaded class {identifier:?}");
            match Linker::new(known).link(&descriptor) {
                Ok(()) => {
                    descriptor.state = ClassState::Linked;
                    debug!("Linked class {identifier:?}");
                }
                Err(err) => {
                    warn!("Linking class {identifier:?} failed: {err}");
                    descriptor.fail(err);
                }
            }
            descriptor
        });
        Ok(descriptor)
    }

    fn run_initialization(
        &mut self,
        identifier: &str,
        superclass: Option<String>,
        initializer: Option<StaticInitializer>,
    ) -> Result<(), ClassError> {
        if let Some(superclass) = superclass {
            self.ensure_initialized(&superclass)
                .map_err(|err| ClassError::InitializationFailed {
                    class: identifier.to_owned(),
                    reason: format!("superclass {superclass:?} could not be initialized: {err}"),
                })?;
        }
        if let Some(initializer) = initializer {
            debug!("Running static initializer of {identifier:?}");
            initializer(self).map_err(|err| ClassError::InitializationFailed {
                class: identifier.to_owned(),
                reason: err.to_string(),
            })?;
        }
        Ok(())
    }
}

fn validate_identifier(identifier: &str) -> Result<(), ClassError> {
    if identifier.is_empty() {
        return Err(ClassError::InvalidIdentifier);
    }
    Ok(())
}

fn failure_of(descriptor: &ClassDescriptor) -> ClassError {
    descriptor
        .failure()
        .cloned()
        .unwrap_or_else(|| ClassError::InitializationFailed {
            class: descriptor.identifier.clone(),
            reason: "class is in an erroneous state".to_owned(),
        })
}
