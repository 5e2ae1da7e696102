use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::*;

/// Which side of the confusion matrix has no cells to score.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Degeneracy {
    /// The target shape is not on the grid.
    NoPositives,
    /// Every shaped cell shows the target shape.
    NoNegatives,
}

/// One randomized round: the grid, the shape to find and the cosmetic tint.
///
/// Deserialized challenges are checked with [`Challenge::validate`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawChallenge")]
pub struct Challenge {
    cells: Array2<GridCell>,
    target: Shape,
    theme: MaskTheme,
}

#[derive(Deserialize)]
struct RawChallenge {
    cells: Array2<GridCell>,
    target: Shape,
    theme: MaskTheme,
}

impl TryFrom<RawChallenge> for Challenge {
    type Error = CaptchaError;

    fn try_from(raw: RawChallenge) -> Result<Self> {
        let challenge = Self {
            cells: raw.cells,
            target: raw.target,
            theme: raw.theme,
        };
        challenge.validate()?;
        Ok(challenge)
    }
}

impl Challenge {
    /// Builds a challenge from the row-major shape layout, all cells unmarked.
    ///
    /// This is the raw constructor for fixed layouts: any number of shaped cells is
    /// accepted. Generated challenges always carry [`SHAPED_CELLS`], see [`Challenge::validate`].
    pub fn from_shapes(
        shapes: [Option<Shape>; GRID_CELLS as usize],
        target: Shape,
        theme: MaskTheme,
    ) -> Self {
        let side = usize::from(GRID_SIDE);
        let cells = Array2::from_shape_fn((side, side), |(row, col)| {
            let index = row * side + col;
            GridCell::new(index as CellIndex, shapes[index])
        });
        Self {
            cells,
            target,
            theme,
        }
    }

    /// Checks the grid is 5×5, every cell carries its row-major index and exactly
    /// [`SHAPED_CELLS`] cells show a shape.
    pub fn validate(&self) -> Result<()> {
        let side = usize::from(GRID_SIDE);
        if self.cells.dim() != (side, side) || !self.cells.is_standard_layout() {
            return Err(CaptchaError::InvalidChallenge("grid must be 5x5"));
        }
        let misplaced = self
            .cells
            .indexed_iter()
            .any(|((row, col), cell)| usize::from(cell.index) != row * side + col);
        if misplaced {
            return Err(CaptchaError::InvalidChallenge(
                "cell index does not match its position",
            ));
        }
        if self.shaped_cells().count() != usize::from(SHAPED_CELLS) {
            return Err(CaptchaError::InvalidChallenge(
                "wrong number of shaped cells",
            ));
        }
        Ok(())
    }

    pub fn target(&self) -> Shape {
        self.target
    }

    pub fn theme(&self) -> MaskTheme {
        self.theme
    }

    /// All cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = &GridCell> {
        self.cells.iter()
    }

    /// All cells as a row-major slice.
    pub fn as_slice(&self) -> &[GridCell] {
        self.cells.as_slice().expect("layout should be standard")
    }

    pub fn cell(&self, index: CellIndex) -> Result<&GridCell> {
        cell_pos(index)
            .and_then(|pos| self.cells.get(pos.to_nd_index()))
            .ok_or(CaptchaError::InvalidCell(index))
    }

    pub fn cell_at(&self, pos: CellPos) -> Option<&GridCell> {
        self.cells.get(pos.to_nd_index())
    }

    /// Flips the mark of one cell, a no-op for empty cells.
    pub fn toggle(&mut self, index: CellIndex) -> Result<MarkOutcome> {
        cell_pos(index)
            .and_then(|pos| self.cells.get_mut(pos.to_nd_index()))
            .map(GridCell::toggle)
            .ok_or(CaptchaError::InvalidCell(index))
    }

    pub fn shaped_cells(&self) -> impl Iterator<Item = &GridCell> {
        self.cells().filter(|cell| cell.shape.is_some())
    }

    /// Shaped cells showing the target.
    pub fn positives(&self) -> impl Iterator<Item = &GridCell> {
        let target = self.target;
        self.shaped_cells().filter(move |cell| cell.shape == Some(target))
    }

    /// Shaped cells showing anything but the target.
    pub fn negatives(&self) -> impl Iterator<Item = &GridCell> {
        let target = self.target;
        self.shaped_cells().filter(move |cell| cell.shape != Some(target))
    }

    pub fn marked_count(&self) -> usize {
        self.cells().filter(|cell| cell.marked).count()
    }

    pub fn degeneracy(&self) -> Option<Degeneracy> {
        if self.positives().next().is_none() {
            Some(Degeneracy::NoPositives)
        } else if self.negatives().next().is_none() {
            Some(Degeneracy::NoNegatives)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Shape::*;

    fn layout() -> [Option<Shape>; GRID_CELLS as usize] {
        let mut shapes = [None; GRID_CELLS as usize];
        shapes[0] = Some(Circle);
        shapes[6] = Some(Square);
        shapes[12] = Some(Circle);
        shapes[24] = Some(Triangle);
        shapes
    }

    #[test]
    fn cells_are_row_major_with_unique_indices() {
        let challenge = Challenge::from_shapes(layout(), Circle, MaskTheme::Pink);

        let indices: Vec<_> = challenge.cells().map(|cell| cell.index).collect();

        assert_eq!(indices, (0..GRID_CELLS).collect::<Vec<_>>());
        assert_eq!(challenge.cell_at((1, 1)).unwrap().shape, Some(Square));
        assert_eq!(challenge.cell(24).unwrap().shape, Some(Triangle));
    }

    #[test]
    fn positives_and_negatives_skip_empty_cells() {
        let challenge = Challenge::from_shapes(layout(), Circle, MaskTheme::Pink);

        assert_eq!(challenge.positives().count(), 2);
        assert_eq!(challenge.negatives().count(), 2);
        assert_eq!(challenge.degeneracy(), None);
    }

    #[test]
    fn toggle_out_of_range_is_rejected() {
        let mut challenge = Challenge::from_shapes(layout(), Circle, MaskTheme::Pink);

        assert_eq!(challenge.toggle(25), Err(CaptchaError::InvalidCell(25)));
        assert_eq!(challenge.marked_count(), 0);
    }

    #[test]
    fn degeneracy_is_reported_for_missing_sides() {
        let lone_triangle = Challenge::from_shapes(layout(), Shape::Triangle, MaskTheme::Slate);
        assert_eq!(lone_triangle.degeneracy(), None);

        let mut only_circles = [None; GRID_CELLS as usize];
        only_circles[3] = Some(Circle);
        only_circles[9] = Some(Circle);

        let all_target = Challenge::from_shapes(only_circles, Circle, MaskTheme::Slate);
        assert_eq!(all_target.degeneracy(), Some(Degeneracy::NoNegatives));

        let no_target = Challenge::from_shapes(only_circles, Square, MaskTheme::Slate);
        assert_eq!(no_target.degeneracy(), Some(Degeneracy::NoPositives));
    }

    fn twelve_shapes() -> Challenge {
        let mut shapes = [None; GRID_CELLS as usize];
        for (index, shape) in shapes.iter_mut().take(usize::from(SHAPED_CELLS)).enumerate() {
            *shape = Some(Shape::ALL[index % Shape::ALL.len()]);
        }
        Challenge::from_shapes(shapes, Circle, MaskTheme::Yellow)
    }

    #[test]
    fn valid_challenge_survives_json() {
        let challenge = twelve_shapes();
        assert_eq!(challenge.validate(), Ok(()));

        let json = serde_json::to_value(&challenge).unwrap();
        let parsed: Challenge = serde_json::from_value(json).unwrap();

        assert_eq!(parsed, challenge);
    }

    #[test]
    fn deserialize_rejects_a_small_grid() {
        let mut json = serde_json::to_value(twelve_shapes()).unwrap();
        json["cells"]["dim"] = serde_json::json!([2, 2]);
        json["cells"]["data"]
            .as_array_mut()
            .unwrap()
            .truncate(4);

        let err = serde_json::from_value::<Challenge>(json).unwrap_err();

        assert!(err.to_string().contains("grid must be 5x5"), "{}", err);
    }

    #[test]
    fn deserialize_rejects_misplaced_indices() {
        let mut json = serde_json::to_value(twelve_shapes()).unwrap();
        json["cells"]["data"][0]["index"] = serde_json::json!(7);

        let err = serde_json::from_value::<Challenge>(json).unwrap_err();

        assert!(err.to_string().contains("does not match its position"), "{}", err);
    }

    #[test]
    fn deserialize_rejects_wrong_shape_count() {
        let json = serde_json::to_value(Challenge::from_shapes(layout(), Circle, MaskTheme::Pink))
            .unwrap();

        let err = serde_json::from_value::<Challenge>(json).unwrap_err();

        assert!(err.to_string().contains("wrong number of shaped cells"), "{}", err);
    }

    #[test]
    fn lookups_stay_in_bounds_on_any_grid() {
        let mut small = twelve_shapes();
        small.cells = Array2::from_shape_fn((2, 2), |(row, col)| {
            GridCell::new((row * 2 + col) as CellIndex, Some(Square))
        });

        assert_eq!(small.toggle(24), Err(CaptchaError::InvalidCell(24)));
        assert_eq!(small.cell(24), Err(CaptchaError::InvalidCell(24)));
        assert_eq!(small.toggle(3), Ok(MarkOutcome::Changed));
    }
}
