// tests/grading_tests.rs

mod common;

use common::{grade_code, message};
use treegrade::engine::{
    grade, FeedbackType, GradeOptions, GradeRequest, EMPTY_SUBMISSION_MESSAGE, NO_SOLUTION_MESSAGE,
};
use treegrade::feedback::FeedbackPool;
use treegrade::GradeError;

struct Case {
    student: &'static str,
    solution: &'static str,
    message: &'static str,
}

fn check(cases: &[Case]) {
    for case in cases {
        assert_eq!(
            message(case.student, case.solution),
            case.message,
            "student: {}\nsolution: {}",
            case.student,
            case.solution
        );
    }
}

// ---
// Literals and expressions
// ---

#[test]
fn test_primitives() {
    check(&[
        Case {
            student: "\"1\"",
            solution: "1",
            message: "I expected 1, but what you wrote was interpreted as \"1\" at line 1.",
        },
        Case {
            student: "1",
            solution: "\"1\"",
            message: "I expected \"1\", but what you wrote was interpreted as 1 at line 1.",
        },
        Case {
            student: "True",
            solution: "\"1\"",
            message: "I expected \"1\", but what you wrote was interpreted as True at line 1.",
        },
        Case {
            student: "\"not hello\"",
            solution: "\"hello\"",
            message: "I expected \"hello\", but what you wrote was interpreted as \"not hello\" at line 1.",
        },
        Case {
            student: "[1]",
            solution: "\"1\"",
            message: "I expected \"1\", but what you wrote was interpreted as [1] at line 1.",
        },
    ]);
}

#[test]
fn test_collections() {
    check(&[
        Case {
            student: "[2]",
            solution: "[]",
            message: "I did not expect 2 at line 1.",
        },
        Case {
            student: "[1,2]",
            solution: "[1]",
            message: "I did not expect 2 at line 1.",
        },
        Case {
            student: "[1]",
            solution: "[1,2]",
            message: "I expected 2 at line 1.",
        },
    ]);
}

#[test]
fn test_expressions() {
    check(&[
        Case {
            student: "1 + 1",
            solution: "1",
            message: "I expected 1, but what you wrote was interpreted as 1 + 1 at line 1.",
        },
        Case {
            student: "1 + (2 + 2)",
            solution: "1 + (2 + 3)",
            message: "I expected 3, but what you wrote was interpreted as 2 at line 1.",
        },
        Case {
            student: "-1",
            solution: "1",
            message: "I expected 1, but what you wrote was interpreted as -1 at line 1.",
        },
    ]);
}

// ---
// Function calls
// ---

#[test]
fn test_function_calls() {
    check(&[
        Case {
            student: "2 + sum([1,2])",
            solution: "2 + sum([1,1])",
            message: "I expected 1, but what you wrote was interpreted as 2 in the first argument (`iterable`) of `sum` at line 1.",
        },
        Case {
            student: "sqrt(log(2))",
            solution: "sqrt(log(1))",
            message: "I expected 1, but what you wrote was interpreted as 2 in the first argument of `log` at line 1.",
        },
        Case {
            student: "def foo(a, b=1): pass; foo(2)",
            solution: "def foo(a, b=1): pass; foo(1)",
            message: "I expected 1, but what you wrote was interpreted as 2 in the first argument (`a`) of `foo` at line 1.",
        },
        Case {
            student: "def foo(a, b=1): pass; foo(a=2)",
            solution: "def foo(a, b=1): pass; foo(1)",
            message: "I expected 1, but what you wrote was interpreted as 2 in the first argument (`a`) of `foo` at line 1.",
        },
        Case {
            student: "def foo(a, b=1): pass; foo(a=\"2\", b=2)",
            solution: "def foo(a, b=1): pass; foo(2, 2)",
            message: "I expected 2, but what you wrote was interpreted as \"2\" in the first argument (`a`) of `foo` at line 1.",
        },
        Case {
            student: "def head(n=5): pass; head(12)",
            solution: "def head(n=5): pass; head(n=10)",
            message: "I expected 10, but what you wrote was interpreted as 12 in the first argument (`n`) of `head` at line 1.",
        },
        Case {
            student: "bar(1)",
            solution: "foo(1)",
            message: "I expected you to call `foo()` where you called `bar()` at line 1.",
        },
    ]);
}

#[test]
fn test_argument_forms_grade_alike() {
    let solution = "def foo(a, b=1): pass; foo(1, b=2)";
    for student in [
        "def foo(a, b=1): pass; foo(1, 2)",
        "def foo(a, b=1): pass; foo(a=1, b=2)",
        "def foo(a, b=1): pass; foo(b=2, a=1)",
    ] {
        assert!(grade_code(student, solution).correct, "{}", student);
    }
}

#[test]
fn test_explicit_default_matches_omitted() {
    assert!(grade_code("round(2.5, None)", "round(2.5)").correct);
    assert!(grade_code("sum(xs)", "sum(xs, start=0)").correct);
}

#[test]
fn test_omitted_default_differs_from_passed_value() {
    assert_eq!(
        message("sum(xs)", "sum(xs, 1)"),
        "I expected 1, but what you wrote was interpreted as 0 in the second argument (`start`) of `sum` at line 1."
    );
}

#[test]
fn test_repeated_keyword_reported() {
    assert_eq!(
        message("f(x=1, x=2)", "f(x=1)"),
        "You passed multiple arguments named `x` to `f`, which will cause an error. Check your spelling, or remove one of the arguments."
    );
}

#[test]
fn test_missing_argument_message() {
    assert_eq!(
        message("max(a)", "max(a, b)"),
        "Your call to `max` should include `b` as the second argument. You may have misspelled an argument name, or left out an important argument."
    );
}

#[test]
fn test_surplus_argument_message() {
    assert_eq!(
        message("f(a, b)", "f(a)"),
        "I did not expect your call to `f` to include `b` as the second argument. You may have included an unnecessary argument, or you may have left out or misspelled an important argument name."
    );
    assert_eq!(
        message("f(a)", "f(a, b)"),
        "Your call to `f` should include `b` as the second argument. You may have misspelled an argument name, or left out an important argument."
    );
}

#[test]
fn test_positional_only_parameter_described_by_position() {
    assert_eq!(
        message("sum()", "sum(xs)"),
        "Your call to `sum` should include `xs` as the first argument. You may have misspelled an argument name, or left out an important argument."
    );
}

#[test]
fn test_method_does_not_borrow_builtin_signature() {
    assert_eq!(
        message("df.sum(0)", "df.sum()"),
        "I did not expect your call to `df.sum` to include `0` as the first argument. You may have included an unnecessary argument, or you may have left out or misspelled an important argument name."
    );
}

#[test]
fn test_wrong_method_call() {
    assert_eq!(
        message("df.tail()", "df.head()"),
        "I expected you to call `head()` where you called `tail()` at line 1."
    );
}

// ---
// String literals
// ---

#[test]
fn test_string_prefixes_matter() {
    check(&[
        Case {
            student: "\"{x}\"",
            solution: "f\"{x}\"",
            message: "I expected f\"{x}\", but what you wrote was interpreted as \"{x}\" at line 1.",
        },
        Case {
            student: "\"abc\"",
            solution: "b\"abc\"",
            message: "I expected b\"abc\", but what you wrote was interpreted as \"abc\" at line 1.",
        },
    ]);
    assert!(!grade_code("print(\"{x}\")", "print(f\"{x}\")").correct);
    assert!(grade_code("u\"abc\"", "\"abc\"").correct);
}

#[test]
fn test_equal_escapes_grade_alike() {
    assert!(grade_code(r"'\101'", "'A'").correct);
    assert!(grade_code(r"'\a'", r"'\x07'").correct);
    assert!(grade_code(r"'\N{BULLET}'", r"'•'").correct);
}

// ---
// Statements and lines
// ---

#[test]
fn test_reports_line_of_discrepancy() {
    let result = grade_code("x = 1\ny = 3", "x = 1\ny = 2");
    assert_eq!(
        result.message,
        "I expected 2, but what you wrote was interpreted as 3 at line 2."
    );
    assert_eq!(result.location.unwrap().to_string(), "body[1].value");
}

#[test]
fn test_correct_submission_gets_praise() {
    let result = grade_code("import math\nmath.sqrt(16)", "import math\nmath.sqrt(16)");
    assert!(result.correct);
    assert_eq!(result.feedback_type, FeedbackType::Success);
    assert!(FeedbackPool::default().praise.contains(&result.message));
}

#[test]
fn test_praise_is_deterministic_under_seed() {
    assert_eq!(grade_code("1", "1").message, grade_code("1", "1").message);
}

// ---
// Edge cases
// ---

#[test]
fn test_empty_submission() {
    let result = grade_code("   \n", "1");
    assert!(!result.correct);
    assert_eq!(result.message, EMPTY_SUBMISSION_MESSAGE);
}

#[test]
fn test_empty_solution() {
    let result = grade_code("1", "");
    assert!(result.correct);
    assert_eq!(result.feedback_type, FeedbackType::Info);
    assert_eq!(result.message, NO_SOLUTION_MESSAGE);
}

#[test]
fn test_syntax_error_in_submission() {
    let err = grade(&GradeRequest::new("sum(1, 2", "sum(1, 2)"), &GradeOptions::default())
        .unwrap_err();
    assert!(matches!(err, GradeError::Parse { .. }));
}

#[test]
fn test_result_serializes_with_type_field() {
    let json = serde_json::to_value(grade_code("[1]", "[1, 2]")).unwrap();
    assert_eq!(json["correct"], false);
    assert_eq!(json["type"], "error");
    assert_eq!(json["message"], "I expected 2 at line 1.");
}
