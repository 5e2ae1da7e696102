use super::*;

/// Generates a challenge: twelve distinct shaped positions, a shape for each,
/// then an independent target and theme.
///
/// Positions are drawn as the n-th still-free cell, so every draw lands and the
/// selection finishes after exactly [`SHAPED_CELLS`] draws.
pub fn generate_challenge<R: RandomSource>(rng: &mut R) -> Challenge {
    let mut selected = [false; GRID_CELLS as usize];
    let mut free_cells = u32::from(GRID_CELLS);

    for _ in 0..SHAPED_CELLS {
        let mut skip = rng.below(free_cells);
        for taken in selected.iter_mut().filter(|taken| !**taken) {
            if skip == 0 {
                *taken = true;
                break;
            }
            skip -= 1;
        }
        free_cells -= 1;
    }

    let mut shapes = [None; GRID_CELLS as usize];
    for (shape, taken) in shapes.iter_mut().zip(selected) {
        if taken {
            *shape = Some(rng.pick(&Shape::ALL));
        }
    }

    // target is drawn independently, it may not appear on the grid at all
    let target = rng.pick(&Shape::ALL);
    let theme = rng.pick(&MaskTheme::ALL);

    let challenge = Challenge::from_shapes(shapes, target, theme);
    log::debug!(
        "Generated challenge, target: {:?}, target cells: {}, theme: {:?}",
        target,
        challenge.positives().count(),
        theme
    );
    challenge
}
