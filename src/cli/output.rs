//! User-facing output for the CLI: grading verdicts, tree diffs and summaries.

use difference::{Changeset, Difference};
use std::io::Write;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::compare::Discrepancy;
use crate::engine::{FeedbackType, GradingResult};
use crate::feedback::{generate, MessageContext};
use crate::find::Found;
use crate::GradeError;

// ============================================================================
// CORE OUTPUT FUNCTIONS
// ============================================================================

/// Prints a grading verdict, as JSON or as colored text.
pub fn print_result(result: &GradingResult, json: bool) -> Result<(), GradeError> {
    if json {
        let text = serde_json::to_string_pretty(result)
            .map_err(|e| crate::err_msg!(Internal, "Could not serialize result").with_cause(e))?;
        println!("{}", text);
        return Ok(());
    }

    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    let (mark, color) = verdict_style(result);
    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true));
    let _ = write!(stdout, "{} ", mark);
    let _ = stdout.reset();
    let _ = writeln!(stdout, "{}", result.message);
    if let Some(location) = &result.location {
        let _ = stdout.set_color(ColorSpec::new().set_dimmed(true));
        let _ = writeln!(stdout, "  at {}", location);
        let _ = stdout.reset();
    }
    Ok(())
}

/// Prints the canonical forms of both trees with a word diff, then each discrepancy.
pub fn print_tree_diff(
    solution: &str,
    student: &str,
    discrepancies: &[Discrepancy],
    context: &MessageContext,
) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);

    let separator = if solution.contains('\n') || student.contains('\n') {
        "\n"
    } else {
        " "
    };
    let changeset = Changeset::new(solution, student, separator);
    print_header(&mut stdout, "--- Diff ---");
    print_diff(&mut stdout, &changeset.diffs, separator);
    let _ = writeln!(stdout);

    if discrepancies.is_empty() {
        let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true));
        let _ = writeln!(stdout, "✓ No discrepancies");
        let _ = stdout.reset();
        return;
    }
    print_header(&mut stdout, "--- Discrepancies ---");
    for (i, d) in discrepancies.iter().enumerate() {
        let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Red)));
        let _ = write!(stdout, "{}. [{}]", i + 1, d.kind);
        let _ = stdout.reset();
        let _ = writeln!(stdout, " {}", d.location);
        let _ = writeln!(stdout, "   {}", generate(d, context));
    }
}

/// Prints the last query of `found`: its hits as JSON, or the request with numbered results.
pub fn print_found(found: &Found, json: bool) -> Result<(), GradeError> {
    if json {
        let text = serde_json::to_string_pretty(&found.queries().last())
            .map_err(|e| crate::err_msg!(Internal, "Could not serialize query results").with_cause(e))?;
        println!("{}", text);
        return Ok(());
    }

    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    let color = if found.is_found() { Color::Green } else { Color::Red };
    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(color)));
    let _ = writeln!(stdout, "{}", found);
    let _ = stdout.reset();
    Ok(())
}

/// Prints one line per graded file and a closing summary.
pub fn print_batch_line(name: &str, result: &Result<GradingResult, GradeError>) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    match result {
        Ok(result) => {
            let (mark, color) = verdict_style(result);
            let _ = stdout.set_color(ColorSpec::new().set_fg(Some(color)));
            let _ = write!(stdout, "{}", mark);
            let _ = stdout.reset();
            let _ = writeln!(stdout, " {}: {}", name, result.message);
        }
        Err(e) => {
            let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Magenta)));
            let _ = write!(stdout, "!");
            let _ = stdout.reset();
            let _ = writeln!(stdout, " {}: {}", name, e);
        }
    }
}

pub fn print_batch_summary(passed: usize, failed: usize, errored: usize) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    let total = passed + failed + errored;
    print_header(&mut stdout, "\nSummary");
    let _ = writeln!(stdout, "  passed:  {}", passed);
    let _ = writeln!(stdout, "  failed:  {}", failed);
    if errored > 0 {
        let _ = writeln!(stdout, "  errors:  {}", errored);
    }
    let rate = if total > 0 {
        (passed as f64 / total as f64) * 100.0
    } else {
        0.0
    };
    let _ = writeln!(stdout, "  {:.1}% correct ({}/{})", rate, passed, total);
}

// ============================================================================
// PRIVATE HELPERS
// ============================================================================

fn verdict_style(result: &GradingResult) -> (&'static str, Color) {
    match (result.correct, result.feedback_type) {
        (true, FeedbackType::Info) => ("i", Color::Cyan),
        (true, _) => ("✓", Color::Green),
        (false, _) => ("✗", Color::Red),
    }
}

fn print_header(stdout: &mut StandardStream, text: &str) {
    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true));
    let _ = writeln!(stdout, "{}", text);
    let _ = stdout.reset();
}

fn print_diff(stdout: &mut StandardStream, diffs: &[Difference], separator: &str) {
    let line_mode = separator == "\n";
    for diff in diffs {
        let (prefix, text, color) = match diff {
            Difference::Same(x) => (" ", x, None),
            Difference::Add(x) => ("+", x, Some(Color::Green)),
            Difference::Rem(x) => ("-", x, Some(Color::Red)),
        };
        match color {
            Some(c) => {
                let _ = stdout.set_color(ColorSpec::new().set_fg(Some(c)));
            }
            None => {
                let _ = stdout.reset();
            }
        }
        if line_mode {
            for line in text.lines() {
                let _ = writeln!(stdout, "{}{}", prefix, line);
            }
        } else if color.is_some() {
            let _ = write!(stdout, "[{}{}] ", prefix, text);
        } else {
            let _ = write!(stdout, "{} ", text);
        }
    }
    let _ = stdout.reset();
    if !line_mode {
        let _ = writeln!(stdout);
    }
}
