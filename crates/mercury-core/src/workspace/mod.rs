//! Session workspaces and object-store persistence.

mod object_store;
mod store;

pub use object_store::{LocalObjectStore, ObjectStore, PresignedUrl};
pub use store::{ArtifactDescriptor, SessionInfo, UploadOutcome, WorkspaceStore};
