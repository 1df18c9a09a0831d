pub mod artifact_store;

pub use artifact_store::{names, ArtifactStore};
