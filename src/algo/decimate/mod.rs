//! Mesh decimation by prioritized edge collapse.
//!
//! The decimator repeatedly collapses the cheapest legal edge of a mesh, in
//! place, until no collapse below the error tolerance remains. Non-manifold
//! edges and vertices are supported: the frame formed by boundary and
//! non-manifold edges is held in place by constraint planes, and chains of
//! non-manifold edges can be shortened without changing how many sheets meet
//! along them.
//!
//! # Quadric Error Metrics (QEM)
//!
//! Costs follow Garland & Heckbert (1997). Each vertex maintains a quadric
//! matrix that represents the sum of squared distances to its original
//! adjacent planes; the `size` option is the distance below which a collapse
//! is considered free.
//!
//! # Example
//!
//! ```
//! use meshcollapse::prelude::*;
//! use nalgebra::Point3;
//!
//! let vertices: Vec<_> = (0..9)
//!     .map(|i| Point3::new((i % 3) as f64, (i / 3) as f64, 0.0))
//!     .collect();
//! let faces = vec![
//!     [0, 1, 3], [1, 4, 3], [1, 2, 4], [2, 5, 4],
//!     [3, 4, 6], [4, 7, 6], [4, 5, 7], [5, 8, 7],
//! ];
//! let mut mesh = build_from_triangles(&vertices, &faces).unwrap();
//!
//! let stats = Decimator::new(&mut mesh, [("size", "0.1")])
//!     .unwrap()
//!     .compute()
//!     .unwrap();
//! assert_eq!(stats.triangles_after, 2);
//! assert!(mesh.is_valid());
//! ```
//!
//! # References
//!
//! - Garland, M. & Heckbert, P. (1997). "Surface Simplification Using Quadric
//!   Error Metrics." SIGGRAPH '97.

mod driver;
mod legality;
mod quadric;
mod queue;

use std::str::FromStr;

use tracing::debug;

use crate::error::{MeshError, Result};

pub use driver::{count_inner_triangles, DecimateState, DecimateStats, Decimator, Termination};
pub use legality::{check_collapse, Rejection};
pub use quadric::{evaluate_collapse, vertex_quadrics, Quadric};
pub use queue::{Candidate, CollapseQueue};

/// Where the surviving vertex of a collapse is placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Placement {
    /// Half-edge collapse: the survivor keeps its position.
    #[default]
    Vertex,
    /// Edge midpoint.
    Middle,
    /// Quadric minimizer, falling back to the best of endpoints and midpoint.
    Optimal,
}

impl FromStr for Placement {
    type Err = MeshError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vertex" => Ok(Placement::Vertex),
            "middle" => Ok(Placement::Middle),
            "optimal" => Ok(Placement::Optimal),
            _ => Err(MeshError::invalid_param(
                "placement",
                s,
                "expected vertex, middle or optimal",
            )),
        }
    }
}

/// How collapses touching non-manifold edges are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NonManifoldPolicy {
    /// A non-manifold edge may be collapsed along its chain when every sheet
    /// keeps its own side edges; fans are never merged or split.
    #[default]
    Chain,
    /// Non-manifold edges and vertices are never touched.
    Freeze,
}

impl FromStr for NonManifoldPolicy {
    type Err = MeshError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chain" => Ok(NonManifoldPolicy::Chain),
            "freeze" => Ok(NonManifoldPolicy::Freeze),
            _ => Err(MeshError::invalid_param(
                "nonmanifold",
                s,
                "expected chain or freeze",
            )),
        }
    }
}

/// Options for mesh decimation.
#[derive(Debug, Clone, PartialEq)]
pub struct DecimateOptions {
    /// Geometric scale: collapses whose quadric error exceeds `size²` are
    /// never applied.
    pub size: f64,

    /// Stop once the mesh has at most this many triangles.
    pub max_triangles: Option<usize>,

    /// Position of the surviving vertex.
    pub placement: Placement,

    /// Treatment of non-manifold edges.
    pub non_manifold: NonManifoldPolicy,

    /// Run the validity checker after every collapse and fail on the first
    /// violation. Slow; meant for tests.
    pub check_invariants: bool,
}

impl Default for DecimateOptions {
    fn default() -> Self {
        Self {
            size: 1.0,
            max_triangles: None,
            placement: Placement::Vertex,
            non_manifold: NonManifoldPolicy::Chain,
            check_invariants: false,
        }
    }
}

impl DecimateOptions {
    /// Create options with the given geometric scale.
    pub fn with_size(size: f64) -> Self {
        Self {
            size,
            ..Self::default()
        }
    }

    /// Stop at a target triangle count.
    pub fn with_max_triangles(mut self, max_triangles: usize) -> Self {
        self.max_triangles = Some(max_triangles);
        self
    }

    /// Set the placement strategy.
    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }

    /// Set the non-manifold policy.
    pub fn with_non_manifold(mut self, policy: NonManifoldPolicy) -> Self {
        self.non_manifold = policy;
        self
    }

    /// Validate the mesh after every collapse.
    pub fn with_check_invariants(mut self, check: bool) -> Self {
        self.check_invariants = check;
        self
    }

    /// Maximum accepted quadric error.
    #[inline]
    pub fn tolerance(&self) -> f64 {
        self.size * self.size
    }

    /// Parse options from string key/value pairs.
    ///
    /// Recognized keys are `size`, `maxtriangles`, `placement` and
    /// `nonmanifold`. Unknown keys are ignored.
    ///
    /// ```
    /// use meshcollapse::algo::decimate::{DecimateOptions, Placement};
    ///
    /// let options = DecimateOptions::from_pairs([
    ///     ("size", "0.5"),
    ///     ("placement", "middle"),
    ///     ("colour", "blue"),
    /// ])
    /// .unwrap();
    /// assert_eq!(options.size, 0.5);
    /// assert_eq!(options.placement, Placement::Middle);
    /// ```
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut options = Self::default();
        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                "size" => {
                    let size: f64 = value.trim().parse().map_err(|_| {
                        MeshError::invalid_param("size", value, "not a number")
                    })?;
                    if !size.is_finite() || size <= 0.0 {
                        return Err(MeshError::invalid_param(
                            "size",
                            value,
                            "must be positive and finite",
                        ));
                    }
                    options.size = size;
                }
                "maxtriangles" => {
                    let max = value.trim().parse().map_err(|_| {
                        MeshError::invalid_param(
                            "maxtriangles",
                            value,
                            "not a non-negative integer",
                        )
                    })?;
                    options.max_triangles = Some(max);
                }
                "placement" => options.placement = value.parse()?,
                "nonmanifold" => options.non_manifold = value.parse()?,
                _ => debug!("ignoring unknown decimation option {}={}", key, value),
            }
        }
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let options = DecimateOptions::default();
        assert_eq!(options.size, 1.0);
        assert_eq!(options.tolerance(), 1.0);
        assert_eq!(options.max_triangles, None);
        assert_eq!(options.placement, Placement::Vertex);
        assert_eq!(options.non_manifold, NonManifoldPolicy::Chain);
    }

    #[test]
    fn test_parse_from_map() {
        let mut map = HashMap::new();
        map.insert("size".to_string(), "0.1".to_string());
        map.insert("maxtriangles".to_string(), "12".to_string());
        map.insert("nonmanifold".to_string(), "Freeze".to_string());
        let options = DecimateOptions::from_pairs(&map).unwrap();
        assert!((options.tolerance() - 0.01).abs() < 1e-15);
        assert_eq!(options.max_triangles, Some(12));
        assert_eq!(options.non_manifold, NonManifoldPolicy::Freeze);
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let options = DecimateOptions::from_pairs([("coplanarity", "0.9")]).unwrap();
        assert_eq!(options, DecimateOptions::default());
    }

    #[test]
    fn test_malformed_values_are_rejected() {
        for (key, value) in [
            ("size", "big"),
            ("size", "-1"),
            ("size", "0"),
            ("size", "inf"),
            ("maxtriangles", "-3"),
            ("placement", "corner"),
            ("nonmanifold", "merge"),
        ] {
            let err = DecimateOptions::from_pairs([(key, value)]).unwrap_err();
            assert!(
                matches!(err, MeshError::InvalidParameter { .. }),
                "{}={} should be rejected",
                key,
                value
            );
        }
    }

    #[test]
    fn test_builder() {
        let options = DecimateOptions::with_size(0.25)
            .with_max_triangles(100)
            .with_placement(Placement::Optimal)
            .with_non_manifold(NonManifoldPolicy::Freeze)
            .with_check_invariants(true);
        assert_eq!(options.tolerance(), 0.0625);
        assert_eq!(options.max_triangles, Some(100));
        assert!(options.check_invariants);
    }
}
