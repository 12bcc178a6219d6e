use crate::question::{Difficulty, QuestionSet};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Replacement stems for questions that open with the plain quiz prefix.
const PHRASINGS: [&str; 8] = [
    "Elucidate the concept of",
    "Define the theological term",
    "Explain the significance of",
    "Describe the doctrine known as",
    "Articulate the meaning of",
    "Expound upon the notion of",
    "Clarify the essence of",
    "Delineate the principles underlying",
];

const STEM: &str = "What is ";

/// Either a reproducible generator from the given seed or a fresh one
/// from OS entropy.
pub fn rng_from(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Rewrite one question stem. Texts that do not start with the plain
/// prefix come back unchanged; definition-style questions ("the term
/// for", "the study of", "the name of") get a fixed stem instead of a
/// random one.
pub fn refine_text(text: &str, rng: &mut impl Rng) -> String {
    let Some(rest) = text.strip_prefix(STEM) else {
        return text.to_string();
    };
    let rest = rest.trim();
    let rest = rest.strip_suffix('?').unwrap_or(rest);
    if let Some(subject) = rest.strip_prefix("the ") {
        if subject.contains("term for")
            || subject.contains("study of")
            || subject.contains("name of")
        {
            return format!("Identify the term denoting {subject}.");
        }
    }
    let phrasing = PHRASINGS[rng.gen_range(0..PHRASINGS.len())];
    format!("{phrasing} {rest}.")
}

/// Apply the stem rewrite to every question in the three difficulty
/// lists. Returns how many texts actually changed.
pub fn refine_questions(set: &mut QuestionSet, rng: &mut impl Rng) -> usize {
    let mut rewritten = 0;
    for difficulty in Difficulty::ALL {
        for question in set.difficulty_mut(difficulty) {
            let refined = refine_text(&question.text, rng);
            if refined != question.text {
                question.text = refined;
                rewritten += 1;
            }
        }
    }
    rewritten
}

/// Shuffle the answer options of every question in place. The answer
/// string itself is never touched.
pub fn shuffle_options(set: &mut QuestionSet, rng: &mut impl Rng) -> usize {
    let mut shuffled = 0;
    for difficulty in Difficulty::ALL {
        for question in set.difficulty_mut(difficulty) {
            question.options.shuffle(rng);
            shuffled += 1;
        }
    }
    shuffled
}
