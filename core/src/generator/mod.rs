use crate::*;
pub use random::*;
pub use source::*;

mod random;
mod source;

/// Produces a fresh challenge for every round.
pub trait ChallengeGenerator {
    fn generate(&mut self) -> Challenge;
}

impl<R: RandomSource> ChallengeGenerator for R {
    fn generate(&mut self) -> Challenge {
        generate_challenge(self)
    }
}
