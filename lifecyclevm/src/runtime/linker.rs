use std::collections::HashSet;

use crate::runtime::class::{ClassDescriptor, ClassError};

/// Resolves the symbolic references of a freshly loaded class.
///
/// Linking does not touch the referenced classes, it only verifies that
/// every one of them can be loaded when it is first used.
pub struct Linker<'reg> {
    known: &'reg HashSet<String>,
}

impl<'reg> Linker<'reg> {
    pub fn new(known: &'reg HashSet<String>) -> Self {
        Self { known }
    }

    pub fn link(&self, descriptor: &ClassDescriptor) -> Result<(), ClassError> {
        let references = descriptor
            .superclass
            .iter()
            .chain(descriptor.dependencies.iter());
        for reference in references {
            self.resolve(&descriptor.identifier, reference)?;
        }
        Ok(())
    }

    fn resolve(&self, class: &str, reference: &str) -> Result<(), ClassError> {
        if self.known.contains(reference) {
            Ok(())
        } else {
            Err(ClassError::LinkageFailed {
                class: class.to_owned(),
                dependency: reference.to_owned(),
            })
        }
    }
}
