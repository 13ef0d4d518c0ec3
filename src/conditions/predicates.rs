//! Built-in condition predicates and the predicate registry.

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use regex::Regex;
use serde_json::Value;

use super::Environment;
use crate::{err_msg, GradeError};

/// A boolean rule over a grading [`Environment`].
pub trait Predicate: fmt::Debug + Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &str;

    fn evaluate(&self, env: &Environment) -> Result<bool, GradeError>;
}

// ============================================================================
// PREDICATES
// ============================================================================

/// The student's result equals a fixed value.
#[derive(Debug, Clone, PartialEq)]
pub struct Equals {
    pub expected: Value,
    pub tolerance: f64,
}

impl Equals {
    pub fn new(expected: Value) -> Self {
        Self {
            expected,
            tolerance: 0.0,
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }
}

impl Predicate for Equals {
    fn name(&self) -> &str {
        "equals"
    }

    fn evaluate(&self, env: &Environment) -> Result<bool, GradeError> {
        Ok(values_equal(&env.student_result, &self.expected, self.tolerance))
    }
}

/// The student's result equals the solution's result.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MatchesSolution {
    pub tolerance: f64,
}

impl Predicate for MatchesSolution {
    fn name(&self) -> &str {
        "matches_solution"
    }

    fn evaluate(&self, env: &Environment) -> Result<bool, GradeError> {
        let solution = env
            .solution_result
            .as_ref()
            .ok_or_else(|| err_msg!(Condition, "No solution result to compare against"))?;
        Ok(values_equal(&env.student_result, solution, self.tolerance))
    }
}

/// The student's result is a number within `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InRange {
    pub min: f64,
    pub max: f64,
}

impl Predicate for InRange {
    fn name(&self) -> &str {
        "in_range"
    }

    fn evaluate(&self, env: &Environment) -> Result<bool, GradeError> {
        let n = env.student_result.as_f64().ok_or_else(|| {
            err_msg!(Condition, "Expected a numeric result, found {}", env.student_result)
        })?;
        Ok(self.min <= n && n <= self.max)
    }
}

/// The student's code matches a regular expression.
#[derive(Debug, Clone)]
pub struct CodeContains {
    pub pattern: Regex,
}

impl CodeContains {
    pub fn new(pattern: &str) -> Result<Self, GradeError> {
        let pattern = Regex::new(pattern).map_err(|e| {
            err_msg!(Config, "Invalid code pattern `{}`", pattern).with_cause(e)
        })?;
        Ok(Self { pattern })
    }
}

impl Predicate for CodeContains {
    fn name(&self) -> &str {
        "code_contains"
    }

    fn evaluate(&self, env: &Environment) -> Result<bool, GradeError> {
        Ok(self.pattern.is_match(&env.student_code))
    }
}

pub type PredicateFn = dyn Fn(&Environment) -> Result<bool, GradeError> + Send + Sync;

/// A caller-supplied closure.
#[derive(Clone)]
pub struct Custom {
    pub label: String,
    pub func: Arc<PredicateFn>,
}

impl Custom {
    pub fn new<F>(label: &str, func: F) -> Self
    where
        F: Fn(&Environment) -> Result<bool, GradeError> + Send + Sync + 'static,
    {
        Self {
            label: label.to_string(),
            func: Arc::new(func),
        }
    }
}

impl fmt::Debug for Custom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Custom").field("label", &self.label).finish()
    }
}

impl Predicate for Custom {
    fn name(&self) -> &str {
        &self.label
    }

    /// Runs the closure; a panic inside it is reported as an error so the
    /// condition counts as uncheckable.
    fn evaluate(&self, env: &Environment) -> Result<bool, GradeError> {
        panic::catch_unwind(AssertUnwindSafe(|| (self.func)(env)))
            .unwrap_or_else(|_| Err(err_msg!(Condition, "predicate `{}` panicked", self.label)))
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

/// Named predicates that exercise files can refer to.
#[derive(Debug, Clone, Default)]
pub struct PredicateRegistry {
    pub predicates: HashMap<String, Arc<dyn Predicate>>,
}

impl PredicateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Predicate>> {
        self.predicates.get(name).cloned()
    }

    pub fn register(&mut self, name: &str, predicate: Arc<dyn Predicate>) {
        self.predicates.insert(name.to_string(), predicate);
    }

    pub fn has(&self, name: &str) -> bool {
        self.predicates.contains_key(name)
    }

    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.predicates.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}

/// Builds the registry of parameterless predicates.
///
/// # Example
/// ```rust
/// use treegrade::conditions::build_default_predicate_registry;
/// let registry = build_default_predicate_registry();
/// assert!(registry.has("matches_solution"));
/// ```
pub fn build_default_predicate_registry() -> PredicateRegistry {
    let mut registry = PredicateRegistry::new();
    registry.register("matches_solution", Arc::new(MatchesSolution::default()));
    registry.register(
        "is_none",
        Arc::new(Custom::new("is_none", |env| Ok(env.student_result.is_null()))),
    );
    registry.register(
        "is_truthy",
        Arc::new(Custom::new("is_truthy", |env| Ok(is_truthy(&env.student_result)))),
    );
    registry
}

// ============================================================================
// VALUE HELPERS
// ============================================================================

/// Structural equality where numbers compare by value within `tolerance`.
pub fn values_equal(a: &Value, b: &Value, tolerance: f64) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => (x - y).abs() <= tolerance,
            _ => x == y,
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y, tolerance))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).map_or(false, |y| values_equal(x, y, tolerance)))
        }
        _ => a == b,
    }
}

/// Python truthiness of a JSON-encoded result.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(xs) => !xs.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}
