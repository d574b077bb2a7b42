//! Level → difficulty mapping.

use crate::domain::Difficulty;

/// Highest playable level. A correct answer here completes the game.
pub const MAX_LEVEL: u32 = 20;

/// Total over any level; everything past 15 is very hard.
pub fn difficulty_for(level: u32) -> Difficulty {
  match level {
    0..=5 => Difficulty::Easy,
    6..=10 => Difficulty::Medium,
    11..=15 => Difficulty::Hard,
    _ => Difficulty::VeryHard,
  }
}
