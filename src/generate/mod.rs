//! Output side: the generation registry and its serializer.

pub mod registry;
pub mod serialize;

pub use registry::{FullFunction, GenContext, OutputFile};
pub use serialize::{render, write_files, WriteReport};
