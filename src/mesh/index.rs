//! Index types for mesh elements.
//!
//! Vertices, triangles and non-manifold fans live in dense arenas owned by
//! [`Mesh`](super::Mesh). These wrappers keep the three handle kinds from being
//! mixed up. Handles stay stable for the lifetime of the mesh: a collapse
//! retires an element, it never moves or reuses a slot.

use std::fmt::{self, Debug};

/// Stable, user-visible vertex identity.
pub type Label = u32;

/// Identifier of the surface patch a triangle was seeded from.
pub type GroupId = u32;

const INVALID: u32 = u32::MAX;

macro_rules! impl_index_type {
    ($(#[$meta:meta])* $name:ident, $display:literal) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Create a new index from a raw value.
            #[inline]
            pub fn new(index: usize) -> Self {
                debug_assert!(index < INVALID as usize, "index {} too large", index);
                Self(index as u32)
            }

            /// Create an invalid/null index.
            #[inline]
            pub fn invalid() -> Self {
                Self(INVALID)
            }

            /// Get the raw index value.
            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }

            /// Check if this is a valid (non-null) index.
            #[inline]
            pub fn is_valid(self) -> bool {
                self.0 != INVALID
            }
        }

        impl Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_valid() {
                    write!(f, "{}({})", $display, self.0)
                } else {
                    write!(f, "{}(INVALID)", $display)
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::invalid()
            }
        }

        impl From<usize> for $name {
            fn from(v: usize) -> Self {
                Self::new(v)
            }
        }
    };
}

impl_index_type!(
    /// A type-safe vertex handle.
    VertexId,
    "V"
);
impl_index_type!(
    /// A type-safe triangle handle.
    TriangleId,
    "T"
);
impl_index_type!(
    /// Handle of a non-manifold fan record (all triangles sharing one edge).
    FanId,
    "N"
);

/// Canonical (sorted) key of the undirected edge between two vertices.
#[inline]
pub fn edge_key(a: VertexId, b: VertexId) -> (VertexId, VertexId) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}
