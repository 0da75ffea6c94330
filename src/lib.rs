//! cgen: generate C++ glue code from annotated declarations.
//!
//! Headers are scanned into declaration events, folded into a per-file
//! [`model::Unit`], dispatched to handlers that fill a shared
//! [`generate::GenContext`], and finally serialized under an output root.

pub mod directive;
pub mod dispatch;
pub mod generate;
pub mod handlers;
pub mod model;
pub mod pipeline;
pub mod project;
pub mod source;
pub mod tracker;
