//! Dice sources.
//!
//! The engine never draws randomness itself; it asks a [`DiceSource`] for
//! one face per roll. Live rooms use [`DeterministicRng`](super::rng::DeterministicRng),
//! tests and replays use [`ScriptedDice`].

use std::collections::VecDeque;

/// Produces die faces in `1..=6`.
pub trait DiceSource {
    /// Roll one die.
    fn roll_die(&mut self) -> u8;
}

impl<D: DiceSource + ?Sized> DiceSource for &mut D {
    fn roll_die(&mut self) -> u8 {
        (**self).roll_die()
    }
}

/// Replays a fixed sequence of faces.
///
/// Values outside `1..=6` are clamped into range. Once the script is
/// exhausted every further roll is a 1.
#[derive(Clone, Debug, Default)]
pub struct ScriptedDice {
    faces: VecDeque<u8>,
}

impl ScriptedDice {
    /// Create from a list of faces, rolled front to back.
    pub fn new(faces: impl IntoIterator<Item = u8>) -> Self {
        Self {
            faces: faces.into_iter().collect(),
        }
    }

    /// Queue another face.
    pub fn push(&mut self, face: u8) {
        self.faces.push_back(face);
    }

    /// Faces not yet rolled.
    pub fn remaining(&self) -> usize {
        self.faces.len()
    }
}

impl DiceSource for ScriptedDice {
    fn roll_die(&mut self) -> u8 {
        self.faces.pop_front().map_or(1, |face| face.clamp(1, 6))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_order() {
        let mut dice = ScriptedDice::new([3, 6, 1]);
        assert_eq!(dice.remaining(), 3);
        assert_eq!(dice.roll_die(), 3);
        assert_eq!(dice.roll_die(), 6);
        assert_eq!(dice.roll_die(), 1);
        assert_eq!(dice.remaining(), 0);
    }

    #[test]
    fn test_scripted_exhausted_and_clamped() {
        let mut dice = ScriptedDice::new([0, 9]);
        assert_eq!(dice.roll_die(), 1);
        assert_eq!(dice.roll_die(), 6);
        assert_eq!(dice.roll_die(), 1);

        dice.push(4);
        assert_eq!(dice.roll_die(), 4);
    }

    #[test]
    fn test_mut_ref_forwarding() {
        fn roll_once<D: DiceSource>(mut dice: D) -> u8 {
            dice.roll_die()
        }

        let mut dice = ScriptedDice::new([5, 2]);
        assert_eq!(roll_once(&mut dice), 5);
        assert_eq!(dice.remaining(), 1);
    }
}
