//! Command-line arguments and subcommands for the treegrade CLI.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "treegrade",
    version,
    about = "Structural grading of learner code against reference solutions."
)]
pub struct TreegradeArgs {
    #[command(subcommand)]
    pub command: Command,
}

/// An enumeration of all available CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Grade one submission against an exercise.
    Grade {
        /// Exercise file (YAML or JSON).
        #[arg(short, long)]
        exercise: PathBuf,
        /// The submission to grade.
        #[arg(required = true)]
        file: PathBuf,
        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
        /// Seed for feedback phrase selection.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Grade a submission by conditions over results computed elsewhere.
    Check {
        /// Exercise file (YAML or JSON) in condition mode.
        #[arg(short, long)]
        exercise: PathBuf,
        /// The submission's result, as JSON.
        #[arg(long)]
        result: String,
        /// The solution's result, as JSON.
        #[arg(long)]
        solution_result: Option<String>,
        /// The submission that produced the result.
        #[arg(required = true)]
        file: PathBuf,
        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
        /// Seed for feedback phrase selection.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Show where a submission departs from a solution.
    Diff {
        /// The reference solution.
        #[arg(required = true)]
        solution: PathBuf,
        /// The submission.
        #[arg(required = true)]
        student: PathBuf,
        /// Report every discrepancy instead of the first.
        #[arg(long)]
        all: bool,
    },
    /// Show the normalized syntax tree for a file.
    Ast {
        /// The file to parse.
        #[arg(required = true)]
        file: PathBuf,
        /// Print the full tree as JSON instead of canonical source.
        #[arg(long)]
        json: bool,
    },
    /// List the constructs of a kind that a file contains.
    Find {
        /// The file to search.
        #[arg(required = true)]
        file: PathBuf,
        /// What to look for.
        #[arg(value_enum)]
        query: FindQuery,
        /// Names, operator symbols or argument patterns (`x`, `sep=", "`) to narrow the search.
        targets: Vec<String>,
        /// Print the hits as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Grade every `.py` file in a directory.
    Batch {
        /// Exercise file (YAML or JSON).
        #[arg(short, long)]
        exercise: PathBuf,
        /// Directory of submissions.
        #[arg(default_value = "submissions")]
        path: PathBuf,
        /// Seed for feedback phrase selection.
        #[arg(long)]
        seed: Option<u64>,
    },
}

/// Kinds of construct the `find` subcommand can search for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FindQuery {
    Functions,
    Arguments,
    Attributes,
    Properties,
    Methods,
    MethodCalls,
    MethodChains,
    Operators,
}
