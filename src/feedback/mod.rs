//! Feedback message generation.
//!
//! [`generate`] turns one [`Discrepancy`] into a sentence addressed to the
//! learner. Generation is pure: the same discrepancy and context always give
//! the same text.

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::compare::{Discrepancy, DiscrepancyKind, Fragment, Location, Step};

pub mod phrases;

pub use phrases::{entropy_rng, join_phrase, seeded_rng, FeedbackPool, FeedbackRng};

/// Rendering knobs for messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageContext {
    /// Longest rendered value, in graphemes, before it is cut with "...".
    pub max_value_len: usize,
}

impl Default for MessageContext {
    fn default() -> Self {
        Self { max_value_len: 60 }
    }
}

/// Builds the learner-facing message for `discrepancy`.
///
/// # Examples
///
/// ```rust
/// use treegrade::compare::{compare, CompareOptions};
/// use treegrade::feedback::{generate, MessageContext};
/// use treegrade::syntax::normalize;
///
/// let found = compare(
///     &normalize("[1, 2]").unwrap(),
///     &normalize("[1]").unwrap(),
///     &CompareOptions::default(),
/// )
/// .unwrap();
/// assert_eq!(generate(&found[0], &MessageContext::default()), "I expected 2 at line 1.");
/// ```
pub fn generate(discrepancy: &Discrepancy, context: &MessageContext) -> String {
    let value = |fragment: &Option<Fragment>| {
        fragment
            .as_ref()
            .map(|f| truncate(&f.render(), context.max_value_len))
            .unwrap_or_default()
    };
    let expected = value(&discrepancy.expected);
    let actual = value(&discrepancy.actual);
    let line = discrepancy.line;
    let location = &discrepancy.location;
    let argument = location.last().and_then(ArgumentRef::from_step);

    match discrepancy.kind {
        DiscrepancyKind::WrongValue if names_callee(location) => format!(
            "I expected you to call `{}()` where you called `{}()` at line {}.",
            expected, actual, line
        ),
        DiscrepancyKind::WrongValue => format!(
            "I expected {}, but what you wrote was interpreted as {}{} at line {}.",
            expected,
            actual,
            describe_where(discrepancy),
            line
        ),
        DiscrepancyKind::Missing => match argument {
            Some(arg) => format!(
                "Your call to `{}` should include {}. You may have misspelled an argument name, or left out an important argument.",
                arg.callee,
                arg.describe(&expected)
            ),
            None => format!("I expected {}{} at line {}.", expected, describe_where(discrepancy), line),
        },
        DiscrepancyKind::Unexpected => {
            format!("I did not expect {}{} at line {}.", actual, describe_where(discrepancy), line)
        }
        DiscrepancyKind::SurplusArgument => {
            let (callee, what) = match argument {
                Some(arg) => (arg.callee, arg.describe(&actual)),
                None => ("this function", format!("`{}`", actual)),
            };
            format!(
                "I did not expect your call to `{}` to include {}. You may have included an unnecessary argument, or you may have left out or misspelled an important argument name.",
                callee, what
            )
        }
        DiscrepancyKind::RepeatedArgument => {
            let (callee, name) = match argument {
                Some(arg) => (arg.callee, arg.name.unwrap_or("")),
                None => ("this function", ""),
            };
            format!(
                "You passed multiple arguments named `{}` to `{}`, which will cause an error. Check your spelling, or remove one of the arguments.",
                name, callee
            )
        }
        DiscrepancyKind::WrongArgument => {
            let callee = argument.map(|a| a.callee).unwrap_or("this function");
            format!(
                "I expected the argument `{}` in your call to `{}`, but you passed `{}` at line {}.",
                expected, callee, actual, line
            )
        }
    }
}

// ============================================================================
// RENDERING HELPERS
// ============================================================================

struct ArgumentRef<'d> {
    callee: &'d str,
    name: Option<&'d str>,
    position: Option<usize>,
    by_keyword: bool,
}

impl<'d> ArgumentRef<'d> {
    fn from_step(step: &'d Step) -> Option<Self> {
        match step {
            Step::Argument {
                callee,
                name,
                position,
                by_keyword,
            } => Some(Self {
                callee,
                name: name.as_deref(),
                position: *position,
                by_keyword: *by_keyword,
            }),
            _ => None,
        }
    }

    /// The argument as the subject of a sentence.
    fn describe(&self, value: &str) -> String {
        match (self.name, self.position) {
            (Some("**"), _) => format!("`**{}`", value),
            (Some(name), _) if self.by_keyword => {
                format!("the argument `{}` with value `{}`", name, value)
            }
            (_, Some(position)) => format!("`{}` as the {} argument", value, ordinal(position)),
            (Some(name), None) => format!("the argument `{}` with value `{}`", name, value),
            (None, None) => format!("`{}`", value),
        }
    }

    /// The argument as a place: " in the second argument (`start`) of `sum`".
    fn place(&self) -> String {
        match (self.name, self.position) {
            (Some(name), Some(position)) => format!(
                " in the {} argument (`{}`) of `{}`",
                ordinal(position),
                name,
                self.callee
            ),
            (Some("**"), None) => format!(" in the keyword unpacking of `{}`", self.callee),
            (Some(name), None) => format!(" in the argument `{}` of `{}`", name, self.callee),
            (None, Some(position)) => {
                format!(" in the {} argument of `{}`", ordinal(position), self.callee)
            }
            (None, None) => format!(" in an argument of `{}`", self.callee),
        }
    }
}

/// The discrepancy sits on a callee: `func` itself, or the method name of `obj.method`.
fn names_callee(location: &Location) -> bool {
    matches!(
        location.steps.as_slice(),
        [.., Step::Slot("func")] | [.., Step::Slot("func"), Step::Slot("attr")]
    )
}

fn describe_where(discrepancy: &Discrepancy) -> String {
    discrepancy
        .location
        .innermost_argument()
        .and_then(ArgumentRef::from_step)
        .map(|arg| arg.place())
        .unwrap_or_default()
}

/// English ordinal for a zero-based position.
fn ordinal(position: usize) -> String {
    const WORDS: [&str; 10] = [
        "first", "second", "third", "fourth", "fifth", "sixth", "seventh", "eighth", "ninth",
        "tenth",
    ];
    if let Some(word) = WORDS.get(position) {
        return word.to_string();
    }
    let n = position + 1;
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}

/// Cuts `text` to `max` graphemes, marking the cut with "...".
pub fn truncate(text: &str, max: usize) -> String {
    let graphemes: Vec<&str> = text.graphemes(true).collect();
    if graphemes.len() <= max {
        return text.to_string();
    }
    let mut out: String = graphemes[..max].concat();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::{compare, CompareMode, CompareOptions};
    use crate::signature::build_default_signature_table;
    use crate::syntax::normalize;

    fn message(solution: &str, student: &str) -> String {
        let options = CompareOptions::new(CompareMode::FirstOnly, build_default_signature_table());
        let found = compare(&normalize(solution).unwrap(), &normalize(student).unwrap(), &options).unwrap();
        generate(&found[0], &MessageContext::default())
    }

    #[test]
    fn test_wrong_value_in_argument() {
        assert_eq!(
            message("sum(1, 2)", "sum(1, 3)"),
            "I expected 2, but what you wrote was interpreted as 3 in the second argument (`start`) of `sum` at line 1."
        );
    }

    #[test]
    fn test_missing_positional_argument() {
        assert_eq!(
            message("max(a, b)", "max(a)"),
            "Your call to `max` should include `b` as the second argument. You may have misspelled an argument name, or left out an important argument."
        );
    }

    #[test]
    fn test_wrong_call() {
        assert_eq!(
            message("foo(1)", "bar(1)"),
            "I expected you to call `foo()` where you called `bar()` at line 1."
        );
    }

    #[test]
    fn test_unexpected_and_missing_elements() {
        assert_eq!(message("[]", "[2]"), "I did not expect 2 at line 1.");
        assert_eq!(message("[1, 2]", "[1]"), "I expected 2 at line 1.");
    }

    #[test]
    fn test_strings_render_double_quoted() {
        assert_eq!(
            message("1", "'1'"),
            "I expected 1, but what you wrote was interpreted as \"1\" at line 1."
        );
    }

    #[test]
    fn test_wrong_argument_name() {
        assert_eq!(
            message("f(1, x=2)", "f(1, y=2)"),
            "I expected the argument `x` in your call to `f`, but you passed `y` at line 1."
        );
    }

    #[test]
    fn test_truncate_by_graphemes() {
        assert_eq!(truncate("héllo wörld", 5), "héllo...");
        assert_eq!(truncate("short", 10), "short");
    }

    #[test]
    fn test_ordinals() {
        assert_eq!(ordinal(0), "first");
        assert_eq!(ordinal(10), "11th");
        assert_eq!(ordinal(21), "22nd");
    }
}
