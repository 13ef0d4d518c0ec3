//! Praise and encouragement phrases.

use rand::{RngCore, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;
use serde::{Deserialize, Serialize};

/// Concrete, seedable PRNG for phrase selection.
pub type FeedbackRng = Xoshiro256StarStar;

/// A fresh entropy-seeded generator.
pub fn entropy_rng() -> FeedbackRng {
    FeedbackRng::from_entropy()
}

/// A deterministic generator for tests and reproducible CLI runs.
pub fn seeded_rng(seed: u64) -> FeedbackRng {
    FeedbackRng::seed_from_u64(seed)
}

const PRAISE: &[&str] = &[
    "Absolutely fabulous!",
    "Amazing!",
    "Awesome!",
    "Beautiful!",
    "Bravo!",
    "Cool job!",
    "Delightful!",
    "Excellent!",
    "Fantastic!",
    "Great work!",
    "I couldn't have done it better myself.",
    "Impressive work!",
    "Lovely job!",
    "Magnificent!",
    "Nice job!",
    "Out of this world!",
    "Resplendent!",
    "Smashing!",
    "Someone knows what they're doing :)",
    "Spectacular job!",
    "Splendid!",
    "Success!",
    "Super job!",
    "Superb work!",
    "Swell job!",
    "Terrific!",
    "That's a first-class answer!",
    "That's glorious!",
    "That's marvelous!",
    "Very good!",
    "Well done!",
    "What first-rate work!",
    "Wicked smaht!",
    "Wonderful!",
    "You aced it!",
    "You rock!",
    "You should be proud.",
    ":)",
];

const ENCOURAGE: &[&str] = &[
    "Please try again.",
    "Give it another try.",
    "Let's try it again.",
    "Try it again; next time's the charm!",
    "Don't give up now, try it one more time.",
    "But no need to fret, try it again.",
    "Try it again. I have a good feeling about this.",
    "Try it again. You get better each time.",
    "Try it again. Perseverence is the key to success.",
    "That's okay: you learn more from mistakes than successes. Let's do it one more time.",
];

/// Phrase pools drawn from on overall pass (praise) and fail (encouragement).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackPool {
    pub praise: Vec<String>,
    pub encourage: Vec<String>,
}

impl Default for FeedbackPool {
    fn default() -> Self {
        Self {
            praise: PRAISE.iter().map(|s| s.to_string()).collect(),
            encourage: ENCOURAGE.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl FeedbackPool {
    pub fn praise<R: RngCore + ?Sized>(&self, rng: &mut R) -> &str {
        pick(&self.praise, rng)
    }

    pub fn encourage<R: RngCore + ?Sized>(&self, rng: &mut R) -> &str {
        pick(&self.encourage, rng)
    }
}

fn pick<'p, R: RngCore + ?Sized>(pool: &'p [String], rng: &mut R) -> &'p str {
    if pool.is_empty() {
        return "";
    }
    let index = rng.next_u32() as usize % pool.len();
    &pool[index]
}

/// Joins a phrase and a message with a single space, skipping empty parts.
pub fn join_phrase(phrase: &str, message: &str) -> String {
    match (phrase.is_empty(), message.is_empty()) {
        (true, _) => message.to_string(),
        (_, true) => phrase.to_string(),
        _ => format!("{} {}", phrase, message),
    }
}
