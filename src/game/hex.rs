//! Offset hexagon coordinates.
//!
//! Based on Red Blob Games' guide:
//! https://www.redblobgames.com/grids/hexagons/#coordinates-offset
//!
//! The grid is stored as a plain rectangle of `(x, y)` slots. Which of the
//! six hex neighbors a slot has depends on the [`RelativityMode`]: every
//! slot always touches its four orthogonal neighbors, and the two diagonal
//! neighbors are picked from the parity of the column (`-q` modes) or the
//! row (`-r` modes). Row 0 is the anchored top of the stack.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

pub(super) fn plugin(app: &mut App) {
    app.register_type::<GridPos>();
    app.register_type::<RelativityMode>();
}

/// Which offset convention the grid uses to lay out its hexagons.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Reflect, Serialize, Deserialize,
)]
pub enum RelativityMode {
    /// Odd rows are shoved right by half a hex.
    #[default]
    OddR,
    /// Even rows are shoved right by half a hex.
    EvenR,
    /// Odd columns are shoved down by half a hex.
    OddQ,
    /// Even columns are shoved down by half a hex.
    EvenQ,
}

impl RelativityMode {
    /// All four conventions.
    pub const ALL: [RelativityMode; 4] = [
        RelativityMode::OddR,
        RelativityMode::EvenR,
        RelativityMode::OddQ,
        RelativityMode::EvenQ,
    ];

    /// The same orientation with the other parity.
    pub const fn opposite(self) -> Self {
        match self {
            RelativityMode::OddR => RelativityMode::EvenR,
            RelativityMode::EvenR => RelativityMode::OddR,
            RelativityMode::OddQ => RelativityMode::EvenQ,
            RelativityMode::EvenQ => RelativityMode::OddQ,
        }
    }

    /// Whether the offset is applied per row (pointy-top layouts).
    pub const fn is_row_based(self) -> bool {
        matches!(self, RelativityMode::OddR | RelativityMode::EvenR)
    }

    /// The two diagonal offsets for a slot at `pos`.
    ///
    /// Column modes: a shoved column reaches down-left and down-right,
    /// otherwise up-left and up-right. Row modes: a shoved row reaches
    /// up-right and down-right, otherwise up-left and down-left.
    fn diagonal_offsets(self, pos: GridPos) -> [GridPos; 2] {
        let odd_column = pos.x % 2 != 0;
        let odd_row = pos.y % 2 != 0;

        match self {
            RelativityMode::OddQ | RelativityMode::EvenQ => {
                let shoved = odd_column == (self == RelativityMode::OddQ);
                if shoved {
                    [GridPos::new(-1, 1), GridPos::new(1, 1)]
                } else {
                    [GridPos::new(-1, -1), GridPos::new(1, -1)]
                }
            }
            RelativityMode::OddR | RelativityMode::EvenR => {
                let shoved = odd_row == (self == RelativityMode::OddR);
                if shoved {
                    [GridPos::new(1, -1), GridPos::new(1, 1)]
                } else {
                    [GridPos::new(-1, -1), GridPos::new(-1, 1)]
                }
            }
        }
    }

    /// Every potential neighbor of `pos`, in or out of bounds.
    ///
    /// The four orthogonal neighbors come first (up, right, down, left),
    /// followed by the two diagonals for this mode.
    pub fn neighbors(self, pos: GridPos) -> [GridPos; 6] {
        let [d1, d2] = self.diagonal_offsets(pos);
        [
            pos + GridPos::new(0, -1),
            pos + GridPos::new(1, 0),
            pos + GridPos::new(0, 1),
            pos + GridPos::new(-1, 0),
            pos + d1,
            pos + d2,
        ]
    }
}

impl std::fmt::Display for RelativityMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RelativityMode::OddR => "odd-r",
            RelativityMode::EvenR => "even-r",
            RelativityMode::OddQ => "odd-q",
            RelativityMode::EvenQ => "even-q",
        };
        f.write_str(name)
    }
}

/// A slot in the grid.
///
/// - x is the column (increases to the right)
/// - y is the row (increases away from the anchored top row)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Reflect)]
pub struct GridPos {
    /// Column
    pub x: i32,
    /// Row
    pub y: i32,
}

impl GridPos {
    /// Create a new grid position.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The top-left slot.
    pub const ORIGIN: Self = Self { x: 0, y: 0 };
}

impl std::fmt::Display for GridPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl std::ops::Add for GridPos {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        GridPos::new(self.x + other.x, self.y + other.y)
    }
}

impl std::ops::Sub for GridPos {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        GridPos::new(self.x - other.x, self.y - other.y)
    }
}

impl From<(i32, i32)> for GridPos {
    fn from((x, y): (i32, i32)) -> Self {
        GridPos::new(x, y)
    }
}
