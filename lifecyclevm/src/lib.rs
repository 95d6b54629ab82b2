pub mod mem;
pub mod runtime;
pub mod sync;
pub mod vm;
