//! Dot placement for new posts.
//!
//! Positions are drawn independently and uniformly from
//! [`MIN_COORD`, `MAX_COORD`] on both axes. The source of randomness is
//! injected so placement is reproducible under test.

use rand::{Rng, SeedableRng, rngs::StdRng};

/// Lowest coordinate, in percent of the board extent.
pub const MIN_COORD: f64 = 5.0;
/// Highest coordinate, in percent of the board extent.
pub const MAX_COORD: f64 = 95.0;

/// A dot position in percent of the board width/height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    #[must_use]
    pub fn in_bounds(self) -> bool {
        (MIN_COORD..=MAX_COORD).contains(&self.x) && (MIN_COORD..=MAX_COORD).contains(&self.y)
    }
}

/// Anything that can hand out positions for new posts.
pub trait PositionSource {
    fn next_position(&mut self) -> Position;
}

impl<P: PositionSource + ?Sized> PositionSource for &mut P {
    fn next_position(&mut self) -> Position {
        (**self).next_position()
    }
}

impl<P: PositionSource + ?Sized> PositionSource for Box<P> {
    fn next_position(&mut self) -> Position {
        (**self).next_position()
    }
}

/// Uniform positions drawn from any [`Rng`].
#[derive(Debug, Clone)]
pub struct RandomPositions<R> {
    rng: R,
}

impl<R: Rng> RandomPositions<R> {
    pub const fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RandomPositions<StdRng> {
    /// Reproducible positions from a fixed seed.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    /// Positions seeded from operating system entropy.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }
}

impl<R: Rng> PositionSource for RandomPositions<R> {
    fn next_position(&mut self) -> Position {
        Position {
            x: self.rng.gen_range(MIN_COORD..=MAX_COORD),
            y: self.rng.gen_range(MIN_COORD..=MAX_COORD),
        }
    }
}
