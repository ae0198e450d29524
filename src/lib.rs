// Certvault — Library root
//
// Artifact model (certificates, keys, requests, CRLs, templates), the
// hierarchy that groups them, and the store, token and codec gateways.

pub mod artifact;
pub mod cli;
pub mod codec;
pub mod config;
pub mod crypto;
pub mod error;
pub mod store;
pub mod token;
pub mod tree;
pub mod unlock;
pub mod variants;
pub mod workspace;

pub use artifact::{Artifact, ArtifactKind, ArtifactNode};
pub use error::{CertvaultError, Result};
pub use workspace::{ImportOutcome, Workspace};
