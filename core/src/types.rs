use serde::{Deserialize, Serialize};

/// Linear position of a cell in the challenge grid, row-major.
pub type CellIndex = u8;

/// `(row, col)` position of a cell in the challenge grid.
pub type CellPos = (u8, u8);

/// Side length of the square challenge grid.
pub const GRID_SIDE: u8 = 5;

/// Number of cells in the challenge grid.
pub const GRID_CELLS: CellIndex = GRID_SIDE * GRID_SIDE;

/// Number of cells that carry a shape in every generated challenge.
pub const SHAPED_CELLS: CellIndex = 12;

pub trait ToNdIndex {
    type Output;
    fn to_nd_index(self) -> Self::Output;
}

impl ToNdIndex for CellPos {
    type Output = [usize; 2];

    fn to_nd_index(self) -> Self::Output {
        [self.0.into(), self.1.into()]
    }
}

/// Converts a linear index into its `(row, col)` position, `None` when out of the grid.
pub const fn cell_pos(index: CellIndex) -> Option<CellPos> {
    if index < GRID_CELLS {
        Some((index / GRID_SIDE, index % GRID_SIDE))
    } else {
        None
    }
}

/// Icon a grid cell may display.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Shape {
    Circle,
    Square,
    Triangle,
}

impl Shape {
    pub const ALL: [Shape; 3] = [Shape::Circle, Shape::Square, Shape::Triangle];

    pub const fn name(self) -> &'static str {
        use Shape::*;
        match self {
            Circle => "circle",
            Square => "square",
            Triangle => "triangle",
        }
    }
}

/// Cosmetic background tint of the grid, unrelated to scoring.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaskTheme {
    Pink,
    Slate,
    Yellow,
}

impl MaskTheme {
    pub const ALL: [MaskTheme; 3] = [MaskTheme::Pink, MaskTheme::Slate, MaskTheme::Yellow];

    pub const fn name(self) -> &'static str {
        use MaskTheme::*;
        match self {
            Pink => "pink",
            Slate => "slate",
            Yellow => "yellow",
        }
    }
}

impl Default for MaskTheme {
    fn default() -> Self {
        Self::Slate
    }
}

/// Pixel offset of the moving mask over the camera preview.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskOffset {
    pub top: u16,
    pub left: u16,
}

impl MaskOffset {
    /// Largest `top`, preview height 180 minus mask side 128.
    pub const MAX_TOP: u16 = 52;
    /// Largest `left`, preview width 320 minus mask side 128.
    pub const MAX_LEFT: u16 = 192;
}
