//! Selfie-and-shapes captcha: a randomized 5×5 shape grid, a sensitivity/specificity
//! scorer with a retry-hardened threshold, and the session state machine tying them to a
//! camera.

use serde::{Deserialize, Serialize};

pub use capture::*;
pub use cell::*;
pub use challenge::*;
pub use clock::*;
pub use error::*;
pub use generator::*;
pub use scheduler::*;
pub use scorer::*;
pub use session::*;
pub use types::*;

mod capture;
mod cell;
mod challenge;
mod clock;
mod error;
mod generator;
mod scheduler;
mod scorer;
mod session;
mod types;

/// Numeric policy supplied by the embedding application, there are no defaults.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    /// Verification requests allowed, the one reaching this count blocks instead.
    pub max_tries: u32,
    /// Percentage points added to the threshold per attempt already made.
    pub retry_penalty_rate: f64,
    /// Threshold of the first attempt, in percent.
    pub base_accepted_score_percent: f64,
}

impl Policy {
    pub fn new(
        max_tries: u32,
        retry_penalty_rate: f64,
        base_accepted_score_percent: f64,
    ) -> Result<Self> {
        let policy = Self {
            max_tries,
            retry_penalty_rate,
            base_accepted_score_percent,
        };
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_tries < 1 {
            return Err(CaptchaError::InvalidPolicy("max_tries must be at least 1"));
        }
        if !self.retry_penalty_rate.is_finite() || self.retry_penalty_rate < 0. {
            return Err(CaptchaError::InvalidPolicy(
                "retry_penalty_rate must be a non-negative number",
            ));
        }
        if !(0. ..=100.).contains(&self.base_accepted_score_percent) {
            return Err(CaptchaError::InvalidPolicy(
                "base_accepted_score_percent must be within 0 and 100",
            ));
        }
        Ok(())
    }
}

/// Outcome of toggling a grid cell
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MarkOutcome {
    NoChange,
    Changed,
}

impl MarkOutcome {
    /// Whether this outcome could have caused an update to the session
    pub const fn has_update(self) -> bool {
        match self {
            Self::NoChange => false,
            Self::Changed => true,
        }
    }
}
