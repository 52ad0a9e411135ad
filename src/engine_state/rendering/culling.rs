//! Spatial subdivision of the world's chunks for frustum culling.
//!
//! The tree halves the world box along every axis that is still more than one chunk
//! wide, splitting on chunk boundaries, until each leaf holds exactly one chunk. Culling
//! walks the tree depth first and skips every subtree whose box is outside the frustum.

use cgmath::{Point3, Vector3};

use crate::engine_state::camera_state::Frustum;
use crate::engine_state::voxels::chunk::{ChunkId, CHUNK_VOXEL_SIZE};

/// An axis-aligned box in voxel space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner
    pub min: Point3<f32>,
    /// Maximum corner
    pub max: Point3<f32>,
}

impl Aabb {
    fn from_chunks(min: Point3<i32>, max: Point3<i32>) -> Self {
        let scale = CHUNK_VOXEL_SIZE as f32;
        let voxel = |p: Point3<i32>| Point3::new(p.x as f32 * scale, p.y as f32 * scale, p.z as f32 * scale);
        Aabb {
            min: voxel(min),
            max: voxel(max),
        }
    }
}

/// A node of the [`SpatialCullTree`].
#[derive(Debug, Clone, PartialEq)]
pub enum CullNode {
    /// A region split into up to eight children.
    Internal {
        /// Bounds of every chunk below this node
        bounds: Aabb,
        /// Non-empty sub-regions
        children: Vec<CullNode>,
    },
    /// A single chunk.
    Leaf {
        /// Bounds of the chunk
        bounds: Aabb,
        /// The chunk
        chunk: ChunkId,
    },
}

impl CullNode {
    /// Bounds of the node.
    pub fn bounds(&self) -> &Aabb {
        match self {
            CullNode::Internal { bounds, .. } | CullNode::Leaf { bounds, .. } => bounds,
        }
    }

    fn build(min: Point3<i32>, max: Point3<i32>) -> CullNode {
        let bounds = Aabb::from_chunks(min, max);
        if max.x - min.x <= 1 && max.y - min.y <= 1 && max.z - min.z <= 1 {
            return CullNode::Leaf { bounds, chunk: min };
        }

        let split = |lo: i32, hi: i32| {
            let center = (lo + hi) / 2;
            if center - lo < 1 {
                vec![(lo, hi)]
            } else {
                vec![(lo, center), (center, hi)]
            }
        };
        let (xs, ys, zs) = (split(min.x, max.x), split(min.y, max.y), split(min.z, max.z));

        let mut children = Vec::with_capacity(xs.len() * ys.len() * zs.len());
        for &(z0, z1) in &zs {
            for &(y0, y1) in &ys {
                for &(x0, x1) in &xs {
                    children.push(CullNode::build(Point3::new(x0, y0, z0), Point3::new(x1, y1, z1)));
                }
            }
        }
        CullNode::Internal { bounds, children }
    }
}

/// Bounding volume hierarchy over every chunk of a world.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialCullTree {
    root: CullNode,
}

impl SpatialCullTree {
    /// Builds the tree for a world of `chunk_counts` chunks per axis.
    pub fn new(chunk_counts: Vector3<usize>) -> Self {
        let max = Point3::new(chunk_counts.x as i32, chunk_counts.y as i32, chunk_counts.z as i32);
        let origin = Point3::new(0, 0, 0);
        let root = if max.x <= 0 || max.y <= 0 || max.z <= 0 {
            CullNode::Internal {
                bounds: Aabb::from_chunks(origin, origin),
                children: Vec::new(),
            }
        } else {
            CullNode::build(origin, max)
        };
        SpatialCullTree { root }
    }

    /// The root node.
    pub fn root(&self) -> &CullNode {
        &self.root
    }

    /// Chunks whose boxes may intersect `frustum`, each listed once.
    pub fn collect_visible(&self, frustum: &Frustum) -> Vec<ChunkId> {
        let mut visible = Vec::new();
        let mut stack = vec![&self.root];
        while let Some(node) = stack.pop() {
            let bounds = node.bounds();
            if !frustum.intersects_aabb(bounds.min, bounds.max) {
                continue;
            }
            match node {
                CullNode::Leaf { chunk, .. } => visible.push(*chunk),
                CullNode::Internal { children, .. } => stack.extend(children.iter()),
            }
        }
        visible
    }

    /// Number of leaves, one per chunk.
    pub fn leaf_count(&self) -> usize {
        fn count(node: &CullNode) -> usize {
            match node {
                CullNode::Leaf { .. } => 1,
                CullNode::Internal { children, .. } => children.iter().map(count).sum(),
            }
        }
        count(&self.root)
    }

    /// Length of the longest root to leaf path, counting both ends.
    pub fn depth(&self) -> usize {
        fn depth(node: &CullNode) -> usize {
            match node {
                CullNode::Leaf { .. } => 1,
                CullNode::Internal { children, .. } => 1 + children.iter().map(depth).max().unwrap_or(0),
            }
        }
        depth(&self.root)
    }
}
