//! Condition-based grading.
//!
//! Instead of comparing trees, a list of [`ConditionRecord`]s is checked
//! against results the host computed by running the student's (and
//! optionally the solution's) code. Predicates that fail to evaluate count as
//! failed conditions; they never abort grading.

use std::sync::Arc;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::{FeedbackType, GradingResult};
use crate::feedback::{join_phrase, FeedbackPool};

pub mod predicates;

pub use predicates::{
    build_default_predicate_registry, CodeContains, Custom, Equals, InRange, MatchesSolution,
    Predicate, PredicateRegistry,
};

pub const UNCHECKABLE_MESSAGE: &str = "I couldn't check one of the conditions for this exercise.";

/// Host-computed facts about one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub student_result: Value,
    #[serde(default)]
    pub solution_result: Option<Value>,
    #[serde(default)]
    pub student_code: String,
    #[serde(default)]
    pub solution_code: String,
}

impl Environment {
    pub fn new(student_code: &str, student_result: Value) -> Self {
        Self {
            student_result,
            solution_result: None,
            student_code: student_code.to_string(),
            solution_code: String::new(),
        }
    }

    pub fn with_solution_result(mut self, result: Value) -> Self {
        self.solution_result = Some(result);
        self
    }

    pub fn with_solution_code(mut self, code: &str) -> Self {
        self.solution_code = code.to_string();
        self
    }
}

/// Whether a holding predicate means the submission passes or fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    #[default]
    PassIf,
    FailIf,
}

/// How a list of conditions combines into one verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionMode {
    /// Declaration order; the first failing condition decides.
    #[default]
    FailFast,
    /// Every condition is evaluated; all must pass.
    AllMustPass,
    /// The first condition whose predicate holds decides.
    FirstMatch,
}

#[derive(Debug, Clone)]
pub struct ConditionRecord {
    pub predicate: Arc<dyn Predicate>,
    pub on_pass: String,
    pub on_fail: String,
    pub polarity: Polarity,
}

impl ConditionRecord {
    pub fn pass_if(predicate: Arc<dyn Predicate>, message: &str) -> Self {
        Self {
            predicate,
            on_pass: message.to_string(),
            on_fail: String::new(),
            polarity: Polarity::PassIf,
        }
    }

    pub fn fail_if(predicate: Arc<dyn Predicate>, message: &str) -> Self {
        Self {
            predicate,
            on_pass: String::new(),
            on_fail: message.to_string(),
            polarity: Polarity::FailIf,
        }
    }

    pub fn with_messages(mut self, on_pass: &str, on_fail: &str) -> Self {
        self.on_pass = on_pass.to_string();
        self.on_fail = on_fail.to_string();
        self
    }
}

/// Outcome of one record.
enum Check {
    Holds,
    DoesNotHold,
    Unchecked,
}

fn check(record: &ConditionRecord, env: &Environment) -> Check {
    match record.predicate.evaluate(env) {
        Ok(true) => Check::Holds,
        Ok(false) => Check::DoesNotHold,
        Err(err) => {
            tracing::debug!(predicate = record.predicate.name(), error = %err, "predicate could not be evaluated");
            Check::Unchecked
        }
    }
}

/// Evaluate `records` against `env` and produce the verdict.
pub fn evaluate<R: RngCore + ?Sized>(
    records: &[ConditionRecord],
    env: &Environment,
    mode: ConditionMode,
    pool: &FeedbackPool,
    rng: &mut R,
) -> GradingResult {
    tracing::debug!(?mode, conditions = records.len(), "evaluating conditions");
    match mode {
        ConditionMode::FailFast => {
            let mut praise_notes = Vec::new();
            for record in records {
                match passes(record, env) {
                    Ok(()) => praise_notes.push(record.on_pass.clone()),
                    Err(message) => return incorrect(&message, pool, rng),
                }
            }
            correct(&join_notes(&praise_notes), pool, rng)
        }
        ConditionMode::AllMustPass => {
            let mut praise_notes = Vec::new();
            let mut failures = Vec::new();
            for record in records {
                match passes(record, env) {
                    Ok(()) => praise_notes.push(record.on_pass.clone()),
                    Err(message) => failures.push(message),
                }
            }
            if failures.is_empty() {
                correct(&join_notes(&praise_notes), pool, rng)
            } else {
                incorrect(&join_notes(&failures), pool, rng)
            }
        }
        ConditionMode::FirstMatch => {
            for record in records {
                match (check(record, env), record.polarity) {
                    (Check::Holds, Polarity::PassIf) => return correct(&record.on_pass, pool, rng),
                    (Check::Holds, Polarity::FailIf) => return incorrect(&record.on_fail, pool, rng),
                    (Check::Unchecked, _) => return incorrect(UNCHECKABLE_MESSAGE, pool, rng),
                    (Check::DoesNotHold, _) => {}
                }
            }
            if records.iter().any(|r| r.polarity == Polarity::PassIf) {
                incorrect("", pool, rng)
            } else {
                correct("", pool, rng)
            }
        }
    }
}

/// `Ok` when the record is satisfied, otherwise the failure message.
fn passes(record: &ConditionRecord, env: &Environment) -> Result<(), String> {
    match (check(record, env), record.polarity) {
        (Check::Holds, Polarity::PassIf) | (Check::DoesNotHold, Polarity::FailIf) => Ok(()),
        (Check::Unchecked, _) => Err(UNCHECKABLE_MESSAGE.to_string()),
        _ => Err(record.on_fail.clone()),
    }
}

fn join_notes(notes: &[String]) -> String {
    notes
        .iter()
        .filter(|n| !n.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join(" ")
}

fn correct<R: RngCore + ?Sized>(note: &str, pool: &FeedbackPool, rng: &mut R) -> GradingResult {
    GradingResult {
        correct: true,
        message: join_phrase(pool.praise(rng), note),
        location: None,
        feedback_type: FeedbackType::Success,
    }
}

fn incorrect<R: RngCore + ?Sized>(note: &str, pool: &FeedbackPool, rng: &mut R) -> GradingResult {
    GradingResult {
        correct: false,
        message: join_phrase(pool.encourage(rng), note),
        location: None,
        feedback_type: FeedbackType::Error,
    }
}
