//! # Chunk Iteration Module
//!
//! Traversal order for the blocks of a chunk during meshing.
//!
//! Blocks are visited with Z descending, then X ascending, then Y ascending. The slices
//! furthest along +Z come first, which is back-to-front for the default camera and keeps
//! the emitted faces roughly sorted for alpha blending.

use cgmath::Point3;

/// An iterator over the block coordinates inside a half-open box.
pub struct ChunkBlockIterator {
    /// Minimum corner, inclusive
    min: Point3<usize>,
    /// Maximum corner, exclusive
    max: Point3<usize>,
    /// Next position to yield, `None` once exhausted
    next: Option<Point3<usize>>,
}

impl ChunkBlockIterator {
    /// Creates an iterator over `[min, max)`.
    ///
    /// # Arguments
    /// * `min` - Inclusive minimum block coordinate
    /// * `max` - Exclusive maximum block coordinate
    ///
    /// # Returns
    /// An iterator that yields nothing if the box is empty on any axis
    pub fn new(min: Point3<usize>, max: Point3<usize>) -> Self {
        let empty = min.x >= max.x || min.y >= max.y || min.z >= max.z;
        ChunkBlockIterator {
            min,
            max,
            next: (!empty).then(|| Point3::new(min.x, min.y, max.z - 1)),
        }
    }
}

impl Iterator for ChunkBlockIterator {
    type Item = Point3<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;

        let mut following = current;
        following.y += 1;
        if following.y == self.max.y {
            following.y = self.min.y;
            following.x += 1;
            if following.x == self.max.x {
                following.x = self.min.x;
                // Moving to the next Z slice, towards the front.
                self.next = (following.z > self.min.z).then(|| Point3::new(following.x, following.y, following.z - 1));
                return Some(current);
            }
        }

        self.next = Some(following);
        Some(current)
    }
}
