use serde::{Deserialize, Serialize};

use crate::*;

/// One position of the challenge grid.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridCell {
    pub index: CellIndex,
    pub shape: Option<Shape>,
    pub marked: bool,
}

impl GridCell {
    pub const fn new(index: CellIndex, shape: Option<Shape>) -> Self {
        Self {
            index,
            shape,
            marked: false,
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.shape.is_none()
    }

    /// Flips the mark of a shaped cell, empty cells are left untouched.
    pub fn toggle(&mut self) -> MarkOutcome {
        if self.shape.is_some() {
            self.marked = !self.marked;
            MarkOutcome::Changed
        } else {
            MarkOutcome::NoChange
        }
    }
}

impl Default for GridCell {
    fn default() -> Self {
        Self::new(0, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_ignores_empty_cells() {
        let mut cell = GridCell::new(3, None);

        assert_eq!(cell.toggle(), MarkOutcome::NoChange);
        assert!(!cell.marked);
    }

    #[test]
    fn toggle_twice_restores_mark() {
        let mut cell = GridCell::new(3, Some(Shape::Square));

        assert_eq!(cell.toggle(), MarkOutcome::Changed);
        assert!(cell.marked);
        assert_eq!(cell.toggle(), MarkOutcome::Changed);
        assert!(!cell.marked);
    }
}
