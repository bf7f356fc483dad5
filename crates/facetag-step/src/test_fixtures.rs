//! STEP text shared by the unit tests.

/// A 40x20x10 block with two 10 mm bores: six faces, two of them cylinders.
pub const BLOCK_WITH_HOLE: &str = include_str!("../testdata/block_with_hole.step");
