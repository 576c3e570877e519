//! Word challenges shown to players during a match

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Source of new word challenges
pub trait WordSupply: Send {
    fn next_word(&mut self) -> String;
}

const VOCABULARY: &[&str] = &[
    "Bell", "Canvas", "Corner", "Glove", "Guard", "Knockout", "Ring", "Ropes", "Round",
    "Southpaw", "Sparring", "Stance", "Footwork", "Referee", "Bout", "Champion", "Clinch",
    "Feint", "Weave", "Slip", "Combo", "Jawline", "Mouthguard", "Bandage", "Towel",
];

/// Seeded draw from a fixed vocabulary
pub struct WordList {
    words: Vec<String>,
    last: Option<usize>,
    rng: ChaCha8Rng,
}

impl WordList {
    pub fn new(seed: u64) -> Self {
        Self::with_words(VOCABULARY.iter().map(|w| w.to_string()).collect(), seed)
    }

    /// Use a custom vocabulary. An empty list yields empty words, which never match.
    pub fn with_words(words: Vec<String>, seed: u64) -> Self {
        Self {
            words,
            last: None,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl WordSupply for WordList {
    fn next_word(&mut self) -> String {
        match self.words.len() {
            0 => String::new(),
            1 => self.words[0].clone(),
            len => {
                // Never repeat the word just shown
                let mut idx = self.rng.gen_range(0..len);
                if Some(idx) == self.last {
                    idx = (idx + 1 + self.rng.gen_range(0..len - 1)) % len;
                }
                self.last = Some(idx);
                self.words[idx].clone()
            }
        }
    }
}
