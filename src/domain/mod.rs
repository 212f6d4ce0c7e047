//! Domain models for the orchestration engine
//!
//! Contains the data bag threaded through transform runs and the file
//! descriptors that plugins emit, without any I/O concerns.

mod bag;
mod file;

pub use bag::DataBag;
pub use file::{FileDescriptor, FileFormat};
