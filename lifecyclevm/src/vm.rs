use thiserror::Error;

use crate::{
    mem::{self, ObjectHandle, SharedHeap},
    runtime::{
        class::{ClassDefinition, ClassError},
        Runtime,
    },
};

/// Class registry and heap of a single vm instance.
///
/// The two are independent, the vm only sequences them when an instance of
/// a class is created: the class is initialized first, then its layout is
/// used to allocate the instance.
#[derive(Clone)]
pub struct Vm {
    pub runtime: Runtime,
    pub heap: SharedHeap,
    options: Options,
}

#[derive(Clone, Debug, Default)]
pub struct Options {
    pub heap: mem::Options,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    #[error(transparent)]
    Class(#[from] ClassError),
    #[error(transparent)]
    Heap(#[from] mem::HeapError),
}

impl Vm {
    pub fn new(options: Options) -> Vm {
        Self {
            runtime: Runtime::new(),
            heap: SharedHeap::new(options.heap.clone()),
            options,
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn define_class(
        &self,
        identifier: impl Into<String>,
        definition: ClassDefinition,
    ) -> Result<(), VmError> {
        Ok(self.runtime.define(identifier, definition)?)
    }

    /// Creates an instance of the class, which is an active use of it.
    pub fn allocate_instance(&self, class: &str) -> Result<ObjectHandle, VmError> {
        let layout = {
            let mut classes = self.runtime.classes();
            classes.ensure_initialized(class)?;
            classes
                .layout_of(class)
                .ok_or_else(|| ClassError::InitializationFailed {
                    class: class.to_owned(),
                    reason: "class has been unloaded during initialization".to_owned(),
                })?
        };
        Ok(mem::ObjectAllocator::allocate_instance(
            &mut *self.heap.lock(),
            layout,
        )?)
    }
}
