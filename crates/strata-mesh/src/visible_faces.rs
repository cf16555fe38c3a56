//! Bitmask for tracking which of a block's six faces are visible.

use strata_voxel::FaceDirection;

/// Bitmask indicating which of a block's 6 faces are visible.
///
/// Bit `n` is the face whose [`FaceDirection`] discriminant is `n`:
/// North, East, South, West, Top, Bottom.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VisibleFaces(pub u8);

impl VisibleFaces {
    /// No faces visible.
    pub const NONE: Self = Self(0);
    /// All six faces visible.
    pub const ALL: Self = Self(0b0011_1111);

    /// Returns `true` if the face in the given direction is visible.
    pub fn is_visible(self, direction: FaceDirection) -> bool {
        self.0 & (1 << direction as u8) != 0
    }

    /// Marks the face in the given direction as visible.
    pub fn set_visible(&mut self, direction: FaceDirection) {
        self.0 |= 1 << direction as u8;
    }

    /// Returns the number of visible faces (0–6).
    pub fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// `true` when every face is culled.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Visible directions in emission order.
    pub fn iter(self) -> impl Iterator<Item = FaceDirection> {
        FaceDirection::ALL
            .into_iter()
            .filter(move |dir| self.is_visible(*dir))
    }
}
