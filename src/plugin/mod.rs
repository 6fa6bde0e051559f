//! Plug-in loading
//!
//! Shared-library discovery and the three-symbol plug-in ABI, plus the
//! repositories that map class names to factories.

pub mod library;
pub mod repository;

pub use library::{
    ControllerHandle, PhyHandle, SharedLibrary, StackHandle, API_VERSION,
};
pub use repository::{Repository, RepositoryKind, RepositorySet};
