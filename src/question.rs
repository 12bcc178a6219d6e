use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// One trivia question as it sits in the bank file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Question {
    pub id: u32,
    pub text: String,
    pub options: Vec<String>,
    pub answer: String,
    pub council: String,
    pub heresy_points: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn label(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-difficulty countdown lengths, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerDefaults {
    pub easy: u32,
    pub medium: u32,
    pub hard: u32,
}

impl Default for TimerDefaults {
    fn default() -> Self {
        TimerDefaults {
            easy: 30,
            medium: 25,
            hard: 20,
        }
    }
}

impl TimerDefaults {
    pub fn for_difficulty(&self, difficulty: Difficulty) -> u32 {
        match difficulty {
            Difficulty::Easy => self.easy,
            Difficulty::Medium => self.medium,
            Difficulty::Hard => self.hard,
        }
    }
}

/// The whole question bank document. The three difficulty lists are the
/// part the tooling works on; every other top-level key (profileQuiz,
/// councils and whatever the game grows next) is carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionSet {
    #[serde(default)]
    pub easy: Vec<Question>,
    #[serde(default)]
    pub medium: Vec<Question>,
    #[serde(default)]
    pub hard: Vec<Question>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeOutcome {
    pub added: usize,
    pub dropped: usize,
}

/// What a merge did, bucket by bucket, so the caller can report it.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MergeReport {
    pub easy: MergeOutcome,
    pub medium: MergeOutcome,
    pub hard: MergeOutcome,
    pub aux_copied: Vec<String>,
}

impl MergeReport {
    pub fn outcomes(&self) -> [(Difficulty, MergeOutcome); 3] {
        [
            (Difficulty::Easy, self.easy),
            (Difficulty::Medium, self.medium),
            (Difficulty::Hard, self.hard),
        ]
    }

    pub fn added(&self) -> usize {
        self.easy.added + self.medium.added + self.hard.added
    }

    pub fn dropped(&self) -> usize {
        self.easy.dropped + self.medium.dropped + self.hard.dropped
    }
}

/// A single strict-check failure, tied to the question that caused it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    DuplicateId { difficulty: Difficulty, id: u32 },
    AnswerNotInOptions { difficulty: Difficulty, id: u32 },
    MissingTimeLimit { difficulty: Difficulty, id: u32 },
    ZeroTimeLimit { difficulty: Difficulty, id: u32 },
    EmptyOptions { difficulty: Difficulty, id: u32 },
    NegativeHeresyPoints { difficulty: Difficulty, id: u32 },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::DuplicateId { difficulty, id } => {
                write!(f, "{difficulty} question {id}: id already used in this difficulty")
            }
            Violation::AnswerNotInOptions { difficulty, id } => {
                write!(f, "{difficulty} question {id}: answer is not one of its options")
            }
            Violation::MissingTimeLimit { difficulty, id } => {
                write!(f, "{difficulty} question {id}: no time limit set")
            }
            Violation::ZeroTimeLimit { difficulty, id } => {
                write!(f, "{difficulty} question {id}: time limit must be positive")
            }
            Violation::EmptyOptions { difficulty, id } => {
                write!(f, "{difficulty} question {id}: empty options list")
            }
            Violation::NegativeHeresyPoints { difficulty, id } => {
                write!(f, "{difficulty} question {id}: negative heresy points")
            }
        }
    }
}

impl QuestionSet {
    pub fn difficulty(&self, difficulty: Difficulty) -> &[Question] {
        match difficulty {
            Difficulty::Easy => &self.easy,
            Difficulty::Medium => &self.medium,
            Difficulty::Hard => &self.hard,
        }
    }

    pub fn difficulty_mut(&mut self, difficulty: Difficulty) -> &mut Vec<Question> {
        match difficulty {
            Difficulty::Easy => &mut self.easy,
            Difficulty::Medium => &mut self.medium,
            Difficulty::Hard => &mut self.hard,
        }
    }

    pub fn counts(&self) -> [(Difficulty, usize); 3] {
        [
            (Difficulty::Easy, self.easy.len()),
            (Difficulty::Medium, self.medium.len()),
            (Difficulty::Hard, self.hard.len()),
        ]
    }

    /// Merge an expanded pack into this set. Existing questions always win:
    /// an incoming question whose id is already present in the same
    /// difficulty is dropped, everything new is appended in the order the
    /// pack lists it. Auxiliary top-level collections are copied over only
    /// when this set does not have them yet.
    pub fn merge_from(&mut self, incoming: QuestionSet) -> MergeReport {
        let mut report = MergeReport {
            easy: merge_bucket(&mut self.easy, incoming.easy),
            medium: merge_bucket(&mut self.medium, incoming.medium),
            hard: merge_bucket(&mut self.hard, incoming.hard),
            aux_copied: Vec::new(),
        };
        for (key, value) in incoming.extra {
            if let Entry::Vacant(slot) = self.extra.entry(key) {
                report.aux_copied.push(slot.key().clone());
                slot.insert(value);
            }
        }
        report
    }

    /// Give every question that has no countdown yet the default for its
    /// difficulty. Questions that already carry one are left alone.
    pub fn fill_time_limits(&mut self, defaults: &TimerDefaults) -> usize {
        let mut filled = 0;
        for difficulty in Difficulty::ALL {
            let seconds = defaults.for_difficulty(difficulty);
            for question in self.difficulty_mut(difficulty) {
                if question.time_limit.is_none() {
                    question.time_limit = Some(seconds);
                    filled += 1;
                }
            }
        }
        filled
    }

    pub fn append(&mut self, difficulty: Difficulty, questions: Vec<Question>) {
        self.difficulty_mut(difficulty).extend(questions);
    }

    /// Ids from `questions` that would collide when appended to the given
    /// difficulty, including duplicates inside the batch itself.
    pub fn conflicting_ids(&self, difficulty: Difficulty, questions: &[Question]) -> Vec<u32> {
        let mut seen: HashSet<u32> = self.difficulty(difficulty).iter().map(|q| q.id).collect();
        let mut conflicts = Vec::new();
        for question in questions {
            if !seen.insert(question.id) {
                conflicts.push(question.id);
            }
        }
        conflicts
    }

    /// Run the strict schema checks over every difficulty list and report
    /// all failures at once.
    pub fn validate(&self) -> Vec<Violation> {
        let mut violations = Vec::new();
        for difficulty in Difficulty::ALL {
            let mut seen = HashSet::new();
            for question in self.difficulty(difficulty) {
                let id = question.id;
                if !seen.insert(id) {
                    violations.push(Violation::DuplicateId { difficulty, id });
                }
                if question.options.is_empty() {
                    violations.push(Violation::EmptyOptions { difficulty, id });
                } else if !question.options.iter().any(|o| o == &question.answer) {
                    violations.push(Violation::AnswerNotInOptions { difficulty, id });
                }
                match question.time_limit {
                    None => violations.push(Violation::MissingTimeLimit { difficulty, id }),
                    Some(0) => violations.push(Violation::ZeroTimeLimit { difficulty, id }),
                    Some(_) => {}
                }
                if question.heresy_points < 0.0 {
                    violations.push(Violation::NegativeHeresyPoints { difficulty, id });
                }
            }
        }
        violations
    }
}

fn merge_bucket(base: &mut Vec<Question>, incoming: Vec<Question>) -> MergeOutcome {
    let mut seen: HashSet<u32> = base.iter().map(|q| q.id).collect();
    let mut outcome = MergeOutcome::default();
    for question in incoming {
        if seen.insert(question.id) {
            base.push(question);
            outcome.added += 1;
        } else {
            outcome.dropped += 1;
        }
    }
    outcome
}
