//! # Block Side Module
//!
//! The six axis-aligned faces of a voxel cell, used for face emission and as the
//! surface normal handed to the lighting provider.

use cgmath::Vector3;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

/// Represents the six possible faces of a voxel cell.
///
/// The discriminant doubles as the bit position in a [`VisibleSides`] mask.
///
/// The order is: [FRONT, BACK, BOTTOM, TOP, LEFT, RIGHT]
#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug, FromPrimitive)]
pub enum BlockSide {
    /// The front face (facing positive Z)
    FRONT = 0,

    /// The back face (facing negative Z)
    BACK = 1,

    /// The bottom face (facing negative Y)
    BOTTOM = 2,

    /// The top face (facing positive Y)
    TOP = 3,

    /// The left face (facing negative X)
    LEFT = 4,

    /// The right face (facing positive X)
    RIGHT = 5,
}

impl BlockSide {
    /// Returns an array containing all six faces in discriminant order.
    pub fn all() -> [BlockSide; 6] {
        [
            BlockSide::FRONT,
            BlockSide::BACK,
            BlockSide::BOTTOM,
            BlockSide::TOP,
            BlockSide::LEFT,
            BlockSide::RIGHT,
        ]
    }

    /// Outward unit normal of the face.
    pub fn normal(self) -> Vector3<i32> {
        match self {
            BlockSide::FRONT => Vector3::new(0, 0, 1),
            BlockSide::BACK => Vector3::new(0, 0, -1),
            BlockSide::BOTTOM => Vector3::new(0, -1, 0),
            BlockSide::TOP => Vector3::new(0, 1, 0),
            BlockSide::LEFT => Vector3::new(-1, 0, 0),
            BlockSide::RIGHT => Vector3::new(1, 0, 0),
        }
    }

    /// Bit of this face in a [`VisibleSides`] mask.
    #[inline]
    pub fn bit(self) -> u8 {
        1 << self as u8
    }
}

/// A set of faces packed into one byte.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Default)]
pub struct VisibleSides(u8);

impl VisibleSides {
    /// Adds a face to the set.
    #[inline]
    pub fn insert(&mut self, side: BlockSide) {
        self.0 |= side.bit();
    }

    /// Whether the face is in the set.
    #[inline]
    pub fn contains(self, side: BlockSide) -> bool {
        self.0 & side.bit() != 0
    }

    /// Whether no face is in the set.
    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of faces in the set.
    #[inline]
    pub fn len(self) -> u32 {
        self.0.count_ones()
    }

    /// Iterates the faces in discriminant order.
    pub fn iter(self) -> impl Iterator<Item = BlockSide> {
        (0..6u8)
            .filter(move |bit| self.0 & (1 << bit) != 0)
            .filter_map(BlockSide::from_u8)
    }
}
