//! treegrade: structural grading of learner code fragments.
//!
//! A submission and a reference solution are parsed into syntax trees and
//! compared node by node. Call arguments are bound to their callee's
//! signature first, so `f(1, b=2)` and `f(1, 2)` grade the same. The first
//! discrepancy is turned into a targeted message for the learner.
//!
//! ```rust
//! use treegrade::{grade, GradeOptions, GradeRequest};
//!
//! let result = grade(&GradeRequest::new("[1, 2]", "[1, 2, 3]"), &GradeOptions::default()).unwrap();
//! assert!(!result.correct);
//! ```

pub use crate::ast::Span;
pub use crate::diagnostics::{to_error_source, ErrorContext, GradeError};
pub use crate::engine::{grade, GradeOptions, GradeRequest, GradingMode, GradingResult};

pub mod ast;
pub mod cli;
pub mod compare;
pub mod conditions;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod feedback;
pub mod find;
pub mod signature;
pub mod syntax;
