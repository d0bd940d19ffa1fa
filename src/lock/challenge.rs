use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Arithmetic operation a challenge is built from
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Addition,
    Subtraction,
    Multiplication,
    Division,
}

impl Operation {
    /// Display symbol used when rendering a challenge
    pub fn symbol(&self) -> &'static str {
        match self {
            Operation::Addition => "+",
            Operation::Subtraction => "−",
            Operation::Multiplication => "×",
            Operation::Division => "÷",
        }
    }

    /// All supported operations, in display order
    pub fn all() -> [Operation; 4] {
        [
            Operation::Addition,
            Operation::Subtraction,
            Operation::Multiplication,
            Operation::Division,
        ]
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// How answers are collected on the lock surface
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuestionMode {
    /// Free-form numeric entry
    FillBlank,
    /// Four choices: the answer plus three distractors
    MultipleChoice,
}

impl Default for QuestionMode {
    fn default() -> Self {
        Self::FillBlank
    }
}

/// A single generated arithmetic challenge
///
/// Invariants: `answer` is the exact non-negative result of
/// `operand1 <operation> operand2`; for division `operand1` is an exact
/// multiple of `operand2`; for subtraction `operand1 >= operand2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub operand1: i32,
    pub operand2: i32,
    pub operation: Operation,
    pub answer: i32,
    /// Shuffled presentation order for multiple choice: the answer plus
    /// three distractors. Empty in fill-blank mode.
    pub choices: Vec<i32>,
}

impl Challenge {
    /// Render the question text, e.g. "7 + 13 ="
    pub fn prompt(&self) -> String {
        format!("{} {} {} =", self.operand1, self.operation.symbol(), self.operand2)
    }

    /// The distractor values in presentation order (empty for fill-blank)
    pub fn distractors(&self) -> Vec<i32> {
        self.choices
            .iter()
            .copied()
            .filter(|&c| c != self.answer)
            .collect()
    }
}

/// An ordered set of challenges; unlocking requires every answer to match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeSet {
    challenges: Vec<Challenge>,
}

impl ChallengeSet {
    pub fn len(&self) -> usize {
        self.challenges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.challenges.is_empty()
    }

    pub fn challenges(&self) -> &[Challenge] {
        &self.challenges
    }

    /// Check a submission: correct iff every answer matches exactly.
    /// A length mismatch is simply incorrect, never an error.
    pub fn check(&self, answers: &[i32]) -> bool {
        answers.len() == self.challenges.len()
            && self
                .challenges
                .iter()
                .zip(answers)
                .all(|(c, &a)| c.answer == a)
    }
}

/// Generation parameters for a challenge set
#[derive(Debug, Clone)]
pub struct GenerationParams {
    pub question_count: usize,
    pub mode: QuestionMode,
    /// Enabled operations; an empty list falls back to addition only
    pub operations: Vec<Operation>,
    pub max_addition: i32,
    pub max_subtraction: i32,
    pub max_multiplication: i32,
    pub max_division: i32,
}

impl GenerationParams {
    /// Configured operand maximum for an operation.
    ///
    /// Precondition: callers must guarantee a maximum >= 1 for every
    /// operation they enable; the configuration loader enforces this.
    pub fn max_for(&self, op: Operation) -> i32 {
        match op {
            Operation::Addition => self.max_addition,
            Operation::Subtraction => self.max_subtraction,
            Operation::Multiplication => self.max_multiplication,
            Operation::Division => self.max_division,
        }
    }
}

/// Generate a fresh challenge set from the given parameters.
///
/// Pure given the RNG: the same seed and parameters always produce the
/// same set. Operations are picked uniformly per question.
pub fn generate(params: &GenerationParams, rng: &mut impl Rng) -> ChallengeSet {
    let fallback = [Operation::Addition];
    let ops: &[Operation] = if params.operations.is_empty() {
        &fallback
    } else {
        &params.operations
    };

    let challenges = (0..params.question_count)
        .map(|_| {
            let op = ops[rng.gen_range(0..ops.len())];
            let mut challenge = generate_one(op, params.max_for(op), rng);
            if params.mode == QuestionMode::MultipleChoice {
                challenge.choices = build_choices(challenge.answer, rng);
            }
            challenge
        })
        .collect();

    ChallengeSet { challenges }
}

fn generate_one(op: Operation, max: i32, rng: &mut impl Rng) -> Challenge {
    let (operand1, operand2, answer) = match op {
        Operation::Addition => {
            let a = rng.gen_range(1..=max);
            let b = rng.gen_range(1..=max);
            (a, b, a + b)
        }
        Operation::Subtraction => {
            let a = rng.gen_range(1..=max);
            // operand2 <= operand1 keeps the result non-negative
            let b = rng.gen_range(1..=a);
            (a, b, a - b)
        }
        Operation::Multiplication => {
            // keeps the product roughly bounded by max
            let a = rng.gen_range(1..=(max / 2).max(1));
            let b = rng.gen_range(1..=(max / a).max(1));
            (a, b, a * b)
        }
        Operation::Division => {
            // build from the quotient so the division is always exact
            let b = rng.gen_range(1..=10);
            let answer = rng.gen_range(1..=(max / b).max(1));
            (b * answer, b, answer)
        }
    };

    Challenge {
        operand1,
        operand2,
        operation: op,
        answer,
        choices: Vec::new(),
    }
}

/// Build the shuffled 4-element choice list: the answer plus three
/// distinct distractors, each perturbed by an offset scaled to the
/// answer's size and clamped to be non-negative.
fn build_choices(answer: i32, rng: &mut impl Rng) -> Vec<i32> {
    let magnitude = if answer <= 10 {
        3
    } else if answer <= 100 {
        10
    } else {
        (answer / 4).max(1)
    };

    let mut choices = vec![answer];
    while choices.len() < 4 {
        let offset = rng.gen_range(1..=magnitude);
        let candidate = if rng.gen_bool(0.5) {
            answer + offset
        } else {
            (answer - offset).max(0)
        };
        if !choices.contains(&candidate) {
            choices.push(candidate);
        }
    }

    choices.shuffle(rng);
    choices
}
