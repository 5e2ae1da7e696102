use std::fmt::{self, Write};

use shapecheck_core::{CaptchaState, CaptchaView, GRID_SIDE, GridCell, Shape};

pub fn glyph(cell: &GridCell) -> char {
    match cell.shape {
        Some(Shape::Circle) => 'O',
        Some(Shape::Square) => '#',
        Some(Shape::Triangle) => '^',
        None => '.',
    }
}

fn status_line(state: CaptchaState) -> &'static str {
    use CaptchaState::*;
    match state {
        Loading => "Waiting for the camera, try `retry-camera`",
        Ready => "Look at the camera and `continue` to take a selfie",
        TakingSelfie => "Taking selfie...",
        SelfieCompleted => "Select every cell showing the target, then `verify`",
        SelectingGrid => "Keep selecting, then `verify`",
        Verifying => "Verifying...",
        Verified => "Verified, you are human",
        VerificationFailed => "Verification failed, `regenerate` to try again",
        UserBlocked => "Too many attempts, you are blocked",
    }
}

/// Writes a plain-text picture of the session.
pub fn render(out: &mut impl Write, view: &CaptchaView<'_>) -> fmt::Result {
    writeln!(out, "[{:?}] {}", view.state, status_line(view.state))?;
    writeln!(
        out,
        "attempts: {} used, {} left",
        view.attempts, view.attempts_left
    )?;
    if view.state.moves_mask() {
        writeln!(
            out,
            "mask at top {} left {}",
            view.mask_offset.top, view.mask_offset.left
        )?;
    }
    if let Some(photo) = view.photo {
        writeln!(out, "selfie: {} bytes of {}", photo.len(), photo.mime())?;
    }
    if let (Some(target), Some(theme)) = (view.target, view.theme) {
        writeln!(out, "find every {} (theme {})", target.name(), theme.name())?;
    }
    if let Some(cells) = view.cells {
        write!(out, "   ")?;
        for col in 0..GRID_SIDE {
            write!(out, " {:^3}", col)?;
        }
        writeln!(out)?;
        for (row, cells) in cells.chunks(usize::from(GRID_SIDE)).enumerate() {
            write!(out, "{:>2} ", row * usize::from(GRID_SIDE))?;
            for cell in cells {
                let (open, close) = if cell.marked { ('[', ']') } else { (' ', ' ') };
                write!(out, " {}{}{}", open, glyph(cell), close)?;
            }
            writeln!(out)?;
        }
    }
    if let Some(verdict) = view.verdict {
        writeln!(
            out,
            "sensitivity {:.1}%, specificity {:.1}%, needed {:.1}%",
            verdict.tpr, verdict.tnr, verdict.pass_threshold
        )?;
    }
    if let Some(err) = view.error {
        writeln!(out, "note: {}", err)?;
    }
    Ok(())
}
