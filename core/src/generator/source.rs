use rand::prelude::*;

/// Uniform integer source all randomness of a session is routed through.
pub trait RandomSource {
    /// Uniform value in `0..bound`, `bound` must be non-zero.
    fn below(&mut self, bound: u32) -> u32;

    /// Uniform choice among `items`, which must not be empty.
    fn pick<T: Copy>(&mut self, items: &[T]) -> T {
        items[self.below(items.len() as u32) as usize]
    }
}

/// Pseudo-random source backed by a seeded small RNG.
#[derive(Clone, Debug)]
pub struct SeededSource {
    rng: SmallRng,
}

impl SeededSource {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Seeds from operating system entropy, falling back to the clock if it fails.
    #[cfg(feature = "sys-rng")]
    pub fn from_entropy() -> Self {
        match SmallRng::try_from_rng(&mut rand::rngs::SysRng) {
            Ok(rng) => Self { rng },
            Err(err) => {
                log::warn!("No system entropy ({}), seeding from clock", err);
                Self::from_clock()
            }
        }
    }

    /// Seeds from the wall clock, for hosts without a better entropy source.
    ///
    /// The grids become guessable from the session start time.
    pub fn from_clock() -> Self {
        use web_time::{SystemTime, UNIX_EPOCH};
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos() as u64)
            .unwrap_or_default();
        log::warn!("Seeding from clock: {}", seed);
        Self::new(seed)
    }
}

impl RandomSource for SeededSource {
    fn below(&mut self, bound: u32) -> u32 {
        self.rng.random_range(0..bound)
    }
}

/// Replays a fixed sequence of values, cycling when exhausted.
///
/// Each value is reduced modulo the requested bound so scripts stay valid for any draw.
#[derive(Clone, Debug, PartialEq)]
pub struct ScriptedSource {
    values: Vec<u32>,
    cursor: usize,
}

impl ScriptedSource {
    pub fn new(values: impl Into<Vec<u32>>) -> Self {
        let mut values = values.into();
        if values.is_empty() {
            values.push(0);
        }
        Self { values, cursor: 0 }
    }

    /// How many values have been drawn so far.
    pub fn draws(&self) -> usize {
        self.cursor
    }
}

impl RandomSource for ScriptedSource {
    fn below(&mut self, bound: u32) -> u32 {
        let value = self.values[self.cursor % self.values.len()];
        self.cursor += 1;
        value % bound
    }
}
