// tests/condition_tests.rs

use std::sync::Arc;

use serde_json::{json, Value};
use treegrade::conditions::{
    CodeContains, ConditionMode, ConditionRecord, Custom, Environment, Equals, InRange,
    MatchesSolution, UNCHECKABLE_MESSAGE,
};
use treegrade::engine::{grade, FeedbackType, GradeOptions, GradeRequest, GradingMode};
use treegrade::feedback::FeedbackPool;
use treegrade::{err_msg, GradeError};

fn quiet_options(conditions: Vec<ConditionRecord>, mode: ConditionMode) -> GradeOptions {
    GradeOptions {
        mode: GradingMode::Conditions,
        conditions,
        condition_mode: mode,
        pool: FeedbackPool {
            praise: vec![],
            encourage: vec![],
        },
        ..GradeOptions::default()
    }
}

fn run(student: &str, result: Value, options: &GradeOptions) -> (bool, String) {
    let request = GradeRequest::new(student, "").with_environment(Environment::new(student, result));
    let graded = grade(&request, options).unwrap();
    (graded.correct, graded.message)
}

fn answer_is(value: Value, message: &str) -> ConditionRecord {
    ConditionRecord::pass_if(Arc::new(Equals::new(value)), message)
}

#[test]
fn test_first_match_pass_and_fail() {
    let options = quiet_options(
        vec![
            answer_is(json!(42), "The answer!"),
            ConditionRecord::fail_if(Arc::new(Equals::new(json!(41))), "Off by one."),
        ],
        ConditionMode::FirstMatch,
    );
    assert_eq!(run("6 * 7", json!(42), &options), (true, "The answer!".to_string()));
    assert_eq!(run("6 * 7 - 1", json!(41), &options), (false, "Off by one.".to_string()));
    assert_eq!(run("0", json!(0), &options), (false, String::new()));
}

#[test]
fn test_first_match_with_only_fail_conditions_passes_by_default() {
    let options = quiet_options(
        vec![ConditionRecord::fail_if(Arc::new(Equals::new(Value::Null)), "Return something.")],
        ConditionMode::FirstMatch,
    );
    assert!(run("x", json!(3), &options).0);
    assert!(!run("x", Value::Null, &options).0);
}

#[test]
fn test_fail_fast_stops_at_first_failure() {
    let options = quiet_options(
        vec![
            answer_is(json!(10), "").with_messages("Right value.", "Wrong value."),
            ConditionRecord::pass_if(Arc::new(CodeContains::new(r"range\(").unwrap()), "")
                .with_messages("Nice loop.", "Use range()."),
        ],
        ConditionMode::FailFast,
    );
    assert_eq!(
        run("sum(range(5))", json!(10), &options),
        (true, "Right value. Nice loop.".to_string())
    );
    assert_eq!(
        run("sum([0, 1, 2, 3, 4])", json!(10), &options),
        (false, "Use range().".to_string())
    );
    assert_eq!(run("sum(range(4))", json!(6), &options), (false, "Wrong value.".to_string()));
}

#[test]
fn test_all_must_pass_collects_failures() {
    let options = quiet_options(
        vec![
            ConditionRecord::pass_if(Arc::new(InRange { min: 0.0, max: 1.0 }), "")
                .with_messages("", "Keep it a probability."),
            ConditionRecord::pass_if(Arc::new(CodeContains::new("random").unwrap()), "")
                .with_messages("", "Use the random module."),
        ],
        ConditionMode::AllMustPass,
    );
    assert_eq!(
        run("2", json!(2), &options),
        (false, "Keep it a probability. Use the random module.".to_string())
    );
    assert!(run("random.random()", json!(0.25), &options).0);
}

#[test]
fn test_predicate_error_is_uncheckable() {
    let exploding = Custom::new("explodes", |_env: &Environment| -> Result<bool, GradeError> {
        Err(err_msg!(Condition, "host result missing"))
    });
    let options = quiet_options(
        vec![ConditionRecord::pass_if(Arc::new(exploding), "fine")],
        ConditionMode::FailFast,
    );
    assert_eq!(run("x", json!(1), &options), (false, UNCHECKABLE_MESSAGE.to_string()));
}

#[test]
fn test_panicking_predicate_is_uncheckable() {
    let panicking = Custom::new("indexes", |env: &Environment| -> Result<bool, GradeError> {
        let lengths: Vec<usize> = Vec::new();
        Ok(lengths[env.student_code.len()] > 0)
    });
    for mode in [ConditionMode::FailFast, ConditionMode::AllMustPass, ConditionMode::FirstMatch] {
        let options = quiet_options(
            vec![ConditionRecord::pass_if(Arc::new(panicking.clone()), "fine")],
            mode,
        );
        assert_eq!(
            run("x", json!(1), &options),
            (false, UNCHECKABLE_MESSAGE.to_string()),
            "{:?}",
            mode
        );
    }
}

#[test]
fn test_matches_solution_uses_tolerance() {
    let options = quiet_options(
        vec![ConditionRecord::pass_if(
            Arc::new(MatchesSolution { tolerance: 1e-6 }),
            "Same as the solution.",
        )],
        ConditionMode::FirstMatch,
    );
    let env = Environment::new("0.1 + 0.2", json!(0.30000000000000004)).with_solution_result(json!(0.3));
    let request = GradeRequest::new("0.1 + 0.2", "0.3").with_environment(env);
    let result = grade(&request, &options).unwrap();
    assert!(result.correct);
    assert_eq!(result.feedback_type, FeedbackType::Success);
    assert_eq!(result.message, "Same as the solution.");
}

#[test]
fn test_praise_prefixes_pass_message() {
    let options = GradeOptions {
        pool: FeedbackPool {
            praise: vec!["Great work!".to_string()],
            encourage: vec!["Try again.".to_string()],
        },
        ..quiet_options(vec![answer_is(json!(1), "Exactly one.")], ConditionMode::FirstMatch)
    };
    assert_eq!(run("1", json!(1), &options), (true, "Great work! Exactly one.".to_string()));
    assert_eq!(run("2", json!(2), &options), (false, "Try again.".to_string()));
}

#[test]
fn test_condition_mode_requires_environment() {
    let options = quiet_options(vec![answer_is(json!(1), "")], ConditionMode::FailFast);
    let err = grade(&GradeRequest::new("1", ""), &options).unwrap_err();
    assert!(matches!(err, GradeError::Internal { .. }));
}

#[test]
fn test_condition_mode_still_rejects_syntax_errors() {
    let options = quiet_options(vec![answer_is(json!(1), "")], ConditionMode::FailFast);
    let request = GradeRequest::new("(1", "").with_environment(Environment::new("(1", json!(1)));
    assert!(matches!(grade(&request, &options), Err(GradeError::Parse { .. })));
}
