//! Adaptive octree over the scan cloud.
//!
//! Nodes subdivide while they hold more than `samples_per_node` samples and
//! are shallower than the profile depth cap, so resolution concentrates where
//! the sensor actually sampled.

use nalgebra::Point3;
use scan_types::Aabb;
use tracing::debug;

use crate::error::{ReconstructError, ReconstructResult};

/// One octree node. Samples are stored on leaves only.
#[derive(Debug, Clone)]
pub struct OctreeNode {
    /// Cubic cell bounds.
    pub bounds: Aabb,
    /// Depth below the root (root = 0).
    pub depth: u32,
    /// Indices into the input positions. Empty for interior nodes.
    pub samples: Vec<usize>,
    /// Child node indices, octant-ordered, if subdivided.
    pub children: Option<[usize; 8]>,
}

impl OctreeNode {
    /// True if this node has no children.
    #[must_use]
    pub const fn is_leaf(&self) -> bool {
        self.children.is_none()
    }
}

/// An adaptive octree with cubic cells.
#[derive(Debug, Clone)]
pub struct Octree {
    nodes: Vec<OctreeNode>,
    root_bounds: Aabb,
    max_depth: u32,
}

impl Octree {
    /// Builds the octree over the given positions.
    ///
    /// `bounds` must be cubic (see `Aabb::cubified`) and contain every
    /// position.
    ///
    /// # Errors
    ///
    /// [`ReconstructError::OctreeBuildFailed`] for empty input, degenerate
    /// bounds, or positions outside the bounds.
    pub fn build(
        positions: &[Point3<f64>],
        bounds: Aabb,
        samples_per_node: usize,
        max_depth: u32,
    ) -> ReconstructResult<Self> {
        if positions.is_empty() {
            return Err(ReconstructError::OctreeBuildFailed {
                reason: "no positions".to_string(),
            });
        }
        if bounds.max_extent() <= 0.0 {
            return Err(ReconstructError::OctreeBuildFailed {
                reason: "degenerate bounds".to_string(),
            });
        }
        if let Some(p) = positions.iter().find(|p| !bounds.contains(p)) {
            return Err(ReconstructError::OctreeBuildFailed {
                reason: format!("position {p:?} outside root bounds"),
            });
        }

        let mut tree = Self {
            nodes: vec![OctreeNode {
                bounds,
                depth: 0,
                samples: (0..positions.len()).collect(),
                children: None,
            }],
            root_bounds: bounds,
            max_depth,
        };

        let mut stack = vec![0_usize];
        while let Some(idx) = stack.pop() {
            let (depth, count) = (tree.nodes[idx].depth, tree.nodes[idx].samples.len());
            if count <= samples_per_node || depth >= max_depth {
                continue;
            }
            let children = tree.subdivide(idx, positions);
            stack.extend_from_slice(&children);
        }

        debug!(
            nodes = tree.nodes.len(),
            leaves = tree.leaves().len(),
            "octree built"
        );
        Ok(tree)
    }

    fn subdivide(&mut self, idx: usize, positions: &[Point3<f64>]) -> [usize; 8] {
        let parent_bounds = self.nodes[idx].bounds;
        let parent_depth = self.nodes[idx].depth;
        let samples = std::mem::take(&mut self.nodes[idx].samples);
        let center = parent_bounds.center();

        let mut buckets: [Vec<usize>; 8] = Default::default();
        for sample in samples {
            let p = &positions[sample];
            buckets[octant_of(p, &center)].push(sample);
        }

        let mut children = [0_usize; 8];
        for (octant, bucket) in buckets.into_iter().enumerate() {
            let child_idx = self.nodes.len();
            self.nodes.push(OctreeNode {
                bounds: octant_bounds(&parent_bounds, &center, octant),
                depth: parent_depth + 1,
                samples: bucket,
                children: None,
            });
            children[octant] = child_idx;
        }
        self.nodes[idx].children = Some(children);
        children
    }

    /// Indices of all leaf nodes.
    #[must_use]
    pub fn leaves(&self) -> Vec<usize> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_leaf())
            .map(|(i, _)| i)
            .collect()
    }

    /// Indices of leaf nodes that hold at least one sample.
    #[must_use]
    pub fn occupied_leaves(&self) -> Vec<usize> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_leaf() && !n.samples.is_empty())
            .map(|(i, _)| i)
            .collect()
    }

    /// Returns a node by index.
    #[must_use]
    pub fn node(&self, idx: usize) -> &OctreeNode {
        &self.nodes[idx]
    }

    /// Total node count.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Root bounds.
    #[must_use]
    pub const fn root_bounds(&self) -> Aabb {
        self.root_bounds
    }

    /// Depth cap the tree was built with.
    #[must_use]
    pub const fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Finds the leaf containing a point, descending from the root.
    ///
    /// Returns `None` for points outside the root bounds.
    #[must_use]
    pub fn locate(&self, p: &Point3<f64>) -> Option<usize> {
        if !self.root_bounds.contains(p) {
            return None;
        }
        let mut idx = 0;
        while let Some(children) = self.nodes[idx].children {
            let center = self.nodes[idx].bounds.center();
            idx = children[octant_of(p, &center)];
        }
        Some(idx)
    }
}

/// Octant index of a point relative to a cell center (x lowest bit).
fn octant_of(p: &Point3<f64>, center: &Point3<f64>) -> usize {
    usize::from(p.x >= center.x)
        | (usize::from(p.y >= center.y) << 1)
        | (usize::from(p.z >= center.z) << 2)
}

fn octant_bounds(parent: &Aabb, center: &Point3<f64>, octant: usize) -> Aabb {
    let min = Point3::new(
        if octant & 1 == 0 { parent.min.x } else { center.x },
        if octant & 2 == 0 { parent.min.y } else { center.y },
        if octant & 4 == 0 { parent.min.z } else { center.z },
    );
    let max = Point3::new(
        if octant & 1 == 0 { center.x } else { parent.max.x },
        if octant & 2 == 0 { center.y } else { parent.max.y },
        if octant & 4 == 0 { center.z } else { parent.max.z },
    );
    Aabb::new(min, max)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::cast_precision_loss)]
mod tests {
    use super::*;

    fn grid_cloud(n: usize) -> Vec<Point3<f64>> {
        let mut positions = Vec::new();
        for i in 0..n {
            for j in 0..n {
                for k in 0..n {
                    positions.push(Point3::new(i as f64, j as f64, k as f64));
                }
            }
        }
        positions
    }

    fn root_bounds(positions: &[Point3<f64>]) -> Aabb {
        Aabb::from_points(positions).unwrap().cubified(0.1)
    }

    #[test]
    fn subdivides_until_capacity() {
        let positions = grid_cloud(8);
        let tree = Octree::build(&positions, root_bounds(&positions), 16, 6).unwrap();
        for &leaf in &tree.leaves() {
            assert!(tree.node(leaf).samples.len() <= 16 || tree.node(leaf).depth == 6);
        }
    }

    #[test]
    fn depth_cap_respected() {
        // Duplicated positions can never split below capacity, so only the
        // depth cap stops subdivision.
        let positions = vec![Point3::new(1.0, 1.0, 1.0); 100];
        let bounds = Aabb::new(Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 2.0, 2.0));
        let tree = Octree::build(&positions, bounds, 8, 3).unwrap();
        for &leaf in &tree.leaves() {
            assert!(tree.node(leaf).depth <= 3);
        }
    }

    #[test]
    fn every_sample_lands_in_one_leaf() {
        let positions = grid_cloud(6);
        let tree = Octree::build(&positions, root_bounds(&positions), 8, 5).unwrap();
        let total: usize = tree
            .leaves()
            .iter()
            .map(|&l| tree.node(l).samples.len())
            .sum();
        assert_eq!(total, positions.len());
    }

    #[test]
    fn locate_agrees_with_sample_assignment() {
        let positions = grid_cloud(5);
        let tree = Octree::build(&positions, root_bounds(&positions), 8, 5).unwrap();
        for (i, p) in positions.iter().enumerate() {
            let leaf = tree.locate(p).unwrap();
            assert!(tree.node(leaf).samples.contains(&i));
        }
    }

    #[test]
    fn outside_point_not_located() {
        let positions = grid_cloud(3);
        let tree = Octree::build(&positions, root_bounds(&positions), 8, 5).unwrap();
        assert!(tree.locate(&Point3::new(1000.0, 0.0, 0.0)).is_none());
    }

    #[test]
    fn empty_input_rejected() {
        let bounds = Aabb::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
        assert!(matches!(
            Octree::build(&[], bounds, 8, 5),
            Err(ReconstructError::OctreeBuildFailed { .. })
        ));
    }
}
