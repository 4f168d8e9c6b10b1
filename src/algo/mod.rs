//! Mesh processing algorithms.
//!
//! - **Decimation**: prioritized edge collapse with quadric costs, for
//!   manifold and non-manifold triangle meshes
//! - **Progress**: callbacks for long-running operations

pub mod decimate;
pub mod progress;
