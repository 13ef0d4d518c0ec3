//! Grading façade.
//!
//! One [`GradeRequest`] in, one [`GradingResult`] (or one [`GradeError`]) out.
//! The pipeline is: Check inputs → Parse → Compare trees or evaluate
//! conditions → Render feedback.

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::compare::{compare, CompareMode, CompareOptions, Location};
use crate::conditions::{self, ConditionMode, ConditionRecord, Environment};
use crate::feedback::{entropy_rng, generate, join_phrase, seeded_rng, FeedbackPool, MessageContext};
use crate::signature::{build_default_signature_table, SignatureTable};
use crate::syntax::normalize_named;
use crate::{err_msg, GradeError};

pub const EMPTY_SUBMISSION_MESSAGE: &str = "I didn't receive your code. Did you write any?";
pub const NO_SOLUTION_MESSAGE: &str = "No solution is provided for this exercise.";

// ============================================================================
// REQUEST / RESULT TYPES
// ============================================================================

/// How the submission is judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradingMode {
    /// Structural comparison against the solution code.
    #[default]
    Tree,
    /// Pass/fail conditions over host-computed results.
    Conditions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackType {
    Success,
    Info,
    Warning,
    Error,
}

/// The verdict for one submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradingResult {
    pub correct: bool,
    pub message: String,
    /// Where in the tree the reported discrepancy was found.
    pub location: Option<Location>,
    #[serde(rename = "type")]
    pub feedback_type: FeedbackType,
}

impl GradingResult {
    fn incorrect(message: &str, location: Option<Location>) -> Self {
        Self {
            correct: false,
            message: message.to_string(),
            location,
            feedback_type: FeedbackType::Error,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GradeRequest {
    pub student_code: String,
    pub solution_code: String,
    /// Host-computed results; required in condition mode.
    pub environment: Option<Environment>,
}

impl GradeRequest {
    pub fn new(student_code: &str, solution_code: &str) -> Self {
        Self {
            student_code: student_code.to_string(),
            solution_code: solution_code.to_string(),
            environment: None,
        }
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }
}

#[derive(Debug, Clone)]
pub struct GradeOptions {
    pub mode: GradingMode,
    pub compare_mode: CompareMode,
    pub signatures: SignatureTable,
    pub message_context: MessageContext,
    pub pool: FeedbackPool,
    pub conditions: Vec<ConditionRecord>,
    pub condition_mode: ConditionMode,
    /// Seed for phrase selection; entropy when absent.
    pub seed: Option<u64>,
}

impl Default for GradeOptions {
    fn default() -> Self {
        Self {
            mode: GradingMode::Tree,
            compare_mode: CompareMode::FirstOnly,
            signatures: build_default_signature_table(),
            message_context: MessageContext::default(),
            pool: FeedbackPool::default(),
            conditions: Vec::new(),
            condition_mode: ConditionMode::FailFast,
            seed: None,
        }
    }
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Grade one submission.
///
/// # Examples
///
/// ```rust
/// use treegrade::engine::{grade, GradeOptions, GradeRequest};
///
/// let result = grade(&GradeRequest::new("sum(1, 3)", "sum(1, 2)"), &GradeOptions::default()).unwrap();
/// assert!(!result.correct);
/// assert!(result.message.contains("second argument"));
/// ```
pub fn grade(request: &GradeRequest, options: &GradeOptions) -> Result<GradingResult, GradeError> {
    match options.seed {
        Some(seed) => grade_with_rng(request, options, &mut seeded_rng(seed)),
        None => grade_with_rng(request, options, &mut entropy_rng()),
    }
}

/// [`grade`] with an explicit phrase RNG.
pub fn grade_with_rng<R: RngCore + ?Sized>(
    request: &GradeRequest,
    options: &GradeOptions,
    rng: &mut R,
) -> Result<GradingResult, GradeError> {
    tracing::debug!(mode = ?options.mode, "grading submission");

    // Step 1: Reject empty submissions before anything else.
    if request.student_code.trim().is_empty() {
        return Ok(GradingResult::incorrect(EMPTY_SUBMISSION_MESSAGE, None));
    }

    match options.mode {
        GradingMode::Tree => grade_tree(request, options, rng),
        GradingMode::Conditions => grade_conditions(request, options, rng),
    }
}

// ============================================================================
// PIPELINES
// ============================================================================

fn grade_tree<R: RngCore + ?Sized>(
    request: &GradeRequest,
    options: &GradeOptions,
    rng: &mut R,
) -> Result<GradingResult, GradeError> {
    // Step 1: Nothing to compare against.
    if request.solution_code.trim().is_empty() {
        return Ok(GradingResult {
            correct: true,
            message: NO_SOLUTION_MESSAGE.to_string(),
            location: None,
            feedback_type: FeedbackType::Info,
        });
    }

    // Step 2: Parse both sides; syntax errors end grading.
    let solution = normalize_named("solution.py", &request.solution_code)?;
    let student = normalize_named("student.py", &request.student_code)?;

    // Step 3: Layer the solution's own definitions over the configured table.
    let compare_options = CompareOptions::new(
        options.compare_mode,
        options.signatures.with_definitions(&solution),
    );

    // Step 4: Compare and report the first discrepancy.
    let found = compare(&solution, &student, &compare_options)?;
    match found.first() {
        Some(first) => {
            tracing::debug!(kind = %first.kind, location = %first.location, "submission differs");
            Ok(GradingResult::incorrect(
                &generate(first, &options.message_context),
                Some(first.location.clone()),
            ))
        }
        None => Ok(GradingResult {
            correct: true,
            message: options.pool.praise(rng).to_string(),
            location: None,
            feedback_type: FeedbackType::Success,
        }),
    }
}

fn grade_conditions<R: RngCore + ?Sized>(
    request: &GradeRequest,
    options: &GradeOptions,
    rng: &mut R,
) -> Result<GradingResult, GradeError> {
    // Step 1: The host must have run the code.
    let mut environment = request.environment.clone().ok_or_else(|| {
        err_msg!(Internal, "Condition grading needs host-computed results for the submission")
    })?;

    // Step 2: Parse both sides; syntax errors end grading.
    normalize_named("student.py", &request.student_code)?;
    if !request.solution_code.trim().is_empty() {
        normalize_named("solution.py", &request.solution_code)?;
    }

    // Step 3: Fill in code the host left out.
    if environment.student_code.is_empty() {
        environment.student_code = request.student_code.clone();
    }
    if environment.solution_code.is_empty() {
        environment.solution_code = request.solution_code.clone();
    }

    // Step 4: Evaluate.
    if options.conditions.is_empty() {
        tracing::warn!("condition grading without any conditions");
        return Ok(GradingResult {
            correct: true,
            message: join_phrase(options.pool.praise(rng), ""),
            location: None,
            feedback_type: FeedbackType::Success,
        });
    }
    Ok(conditions::evaluate(
        &options.conditions,
        &environment,
        options.condition_mode,
        &options.pool,
        rng,
    ))
}
