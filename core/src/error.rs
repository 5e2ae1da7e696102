use serde::Serialize;
use thiserror::Error;

use crate::{CaptchaState, CellIndex, Intent};

/// Why the capture collaborator could not hand out a camera stream.
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum CapabilityError {
    #[error("No camera is available")]
    Unavailable,
    #[error("Camera access was denied")]
    Denied,
    #[error("Camera is in use by another application")]
    Busy,
}

#[derive(Error, Debug, Copy, Clone, PartialEq, Serialize)]
pub enum CaptchaError {
    #[error("Camera capability error: {0}")]
    Capability(#[from] CapabilityError),
    #[error("Intent {intent:?} is not accepted while {state:?}")]
    InvalidTransition { state: CaptchaState, intent: Intent },
    #[error("Locked out after {attempts} verification attempts")]
    LockedOut { attempts: u32 },
    #[error("Invalid cell index {0}")]
    InvalidCell(CellIndex),
    #[error("Invalid policy: {0}")]
    InvalidPolicy(&'static str),
    #[error("Invalid challenge: {0}")]
    InvalidChallenge(&'static str),
}

pub type Result<T> = core::result::Result<T, CaptchaError>;
