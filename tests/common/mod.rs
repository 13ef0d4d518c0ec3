//! Shared helpers for treegrade integration tests.

#![allow(dead_code)]

use std::path::PathBuf;

use treegrade::engine::{grade, GradeOptions, GradeRequest, GradingResult};

/// Grades `student` against `solution` with the default options and a fixed seed.
pub fn grade_code(student: &str, solution: &str) -> GradingResult {
    let options = GradeOptions {
        seed: Some(7),
        ..GradeOptions::default()
    };
    grade(&GradeRequest::new(student, solution), &options).unwrap()
}

/// The learner-facing message for `student` against `solution`.
pub fn message(student: &str, solution: &str) -> String {
    grade_code(student, solution).message
}

pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}
