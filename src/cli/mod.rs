//! The treegrade command-line interface.
//!
//! Each subcommand reads its inputs, calls into the library, and hands the
//! outcome to [`output`]. Any [`GradeError`] is rendered with miette and ends
//! the process with exit status 1.

use std::path::{Path, PathBuf};
use std::{fs, process};

use clap::Parser;
use walkdir::WalkDir;

use crate::cli::args::{Command, FindQuery, TreegradeArgs};
use crate::compare::{compare, CompareMode, CompareOptions};
use crate::conditions::{build_default_predicate_registry, Environment};
use crate::config::ExerciseConfig;
use crate::engine::{grade, GradeOptions, GradeRequest, GradingMode};
use crate::feedback::MessageContext;
use crate::find::{ArgPattern, Found};
use crate::signature::build_default_signature_table;
use crate::syntax::normalize_named;
use crate::{err_msg, GradeError};

pub mod args;
pub mod output;

/// The main entry point for the CLI.
pub fn run() {
    let args = TreegradeArgs::parse();

    let result = match args.command {
        Command::Grade {
            exercise,
            file,
            json,
            seed,
        } => handle_grade(&exercise, &file, json, seed),
        Command::Check {
            exercise,
            result,
            solution_result,
            file,
            json,
            seed,
        } => handle_check(&exercise, &result, solution_result.as_deref(), &file, json, seed),
        Command::Diff {
            solution,
            student,
            all,
        } => handle_diff(&solution, &student, all),
        Command::Ast { file, json } => handle_ast(&file, json),
        Command::Find {
            file,
            query,
            targets,
            json,
        } => handle_find(&file, query, &targets, json),
        Command::Batch {
            exercise,
            path,
            seed,
        } => handle_batch(&exercise, &path, seed),
    };

    if let Err(e) = result {
        print_error(e);
        process::exit(1);
    }
}

// ============================================================================
// COMMAND HANDLERS
// ============================================================================

fn handle_grade(
    exercise: &Path,
    file: &Path,
    json: bool,
    seed: Option<u64>,
) -> Result<(), GradeError> {
    let (config, options) = load_exercise(exercise, seed)?;
    let student = read_file(file)?;
    let result = grade(&GradeRequest::new(&student, &config.solution), &options)?;
    output::print_result(&result, json)
}

fn handle_check(
    exercise: &Path,
    student_result: &str,
    solution_result: Option<&str>,
    file: &Path,
    json: bool,
    seed: Option<u64>,
) -> Result<(), GradeError> {
    let (config, options) = load_exercise(exercise, seed)?;
    if options.mode != GradingMode::Conditions {
        return Err(err_msg!(
            Config,
            "{} does not grade by conditions (set `mode: conditions`)",
            exercise.display()
        ));
    }
    let student = read_file(file)?;

    let mut environment = Environment::new(&student, parse_json("--result", student_result)?)
        .with_solution_code(&config.solution);
    if let Some(text) = solution_result {
        environment = environment.with_solution_result(parse_json("--solution-result", text)?);
    }

    let request = GradeRequest::new(&student, &config.solution).with_environment(environment);
    let result = grade(&request, &options)?;
    output::print_result(&result, json)
}

fn handle_diff(solution: &Path, student: &Path, all: bool) -> Result<(), GradeError> {
    let solution_tree = normalize_named(&display_name(solution), &read_file(solution)?)?;
    let student_tree = normalize_named(&display_name(student), &read_file(student)?)?;

    let mode = if all {
        CompareMode::CollectAll
    } else {
        CompareMode::FirstOnly
    };
    let options = CompareOptions::new(
        mode,
        build_default_signature_table().with_definitions(&solution_tree),
    );
    let discrepancies = compare(&solution_tree, &student_tree, &options)?;
    output::print_tree_diff(
        &solution_tree.pretty(),
        &student_tree.pretty(),
        &discrepancies,
        &MessageContext::default(),
    );
    Ok(())
}

fn handle_ast(file: &Path, json: bool) -> Result<(), GradeError> {
    let tree = normalize_named(&display_name(file), &read_file(file)?)?;
    if json {
        let text = serde_json::to_string_pretty(&tree)
            .map_err(|e| err_msg!(Internal, "Could not serialize tree").with_cause(e))?;
        println!("{}", text);
    } else {
        println!("{}", tree.pretty());
    }
    Ok(())
}

fn handle_find(file: &Path, query: FindQuery, targets: &[String], json: bool) -> Result<(), GradeError> {
    let found = Found::new(&read_file(file)?)?;
    let target = targets.first().map(String::as_str);
    let found = match query {
        FindQuery::Functions => found.functions(target),
        FindQuery::Arguments => {
            let patterns = targets
                .iter()
                .map(|t| ArgPattern::parse(t))
                .collect::<Result<Vec<_>, _>>()?;
            found.arguments(&patterns)
        }
        FindQuery::Attributes => found.attributes(),
        FindQuery::Properties => found.properties(target),
        FindQuery::Methods => found.methods(target),
        FindQuery::MethodCalls => found.method_calls(target),
        FindQuery::MethodChains => found.method_chains(),
        FindQuery::Operators => found.operators(target)?,
    };
    output::print_found(&found, json)
}

fn handle_batch(exercise: &Path, path: &Path, seed: Option<u64>) -> Result<(), GradeError> {
    let (config, options) = load_exercise(exercise, seed)?;
    if options.mode != GradingMode::Tree {
        return Err(err_msg!(Config, "Batch grading needs a tree-mode exercise"));
    }
    let files = discover_submissions(path)?;
    if files.is_empty() {
        println!("No submissions found in {}", path.display());
        return Ok(());
    }

    let (mut passed, mut failed, mut errored) = (0, 0, 0);
    for file in &files {
        let result = read_file(file)
            .and_then(|student| grade(&GradeRequest::new(&student, &config.solution), &options));
        match &result {
            Ok(r) if r.correct => passed += 1,
            Ok(_) => failed += 1,
            Err(e) => {
                errored += 1;
                tracing::debug!(file = %file.display(), error = %e, "submission could not be graded");
            }
        }
        let name = file.strip_prefix(path).unwrap_or(file);
        output::print_batch_line(&name.display().to_string(), &result);
    }
    output::print_batch_summary(passed, failed, errored);
    Ok(())
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn load_exercise(path: &Path, seed: Option<u64>) -> Result<(ExerciseConfig, GradeOptions), GradeError> {
    let config = ExerciseConfig::load(path)?;
    let mut options = config.to_options(&build_default_predicate_registry())?;
    if seed.is_some() {
        options.seed = seed;
    }
    Ok((config, options))
}

fn read_file(path: &Path) -> Result<String, GradeError> {
    fs::read_to_string(path)
        .map_err(|e| err_msg!(Io, "Could not read {}", path.display()).with_cause(e))
}

fn parse_json(flag: &str, text: &str) -> Result<serde_json::Value, GradeError> {
    serde_json::from_str(text)
        .map_err(|e| err_msg!(Config, "{} is not valid JSON", flag).with_cause(e))
}

fn display_name(path: &Path) -> String {
    path.display().to_string()
}

/// `.py` files under `root`, sorted for stable output.
fn discover_submissions(root: &Path) -> Result<Vec<PathBuf>, GradeError> {
    if !root.is_dir() {
        return Err(err_msg!(Io, "{} is not a directory", root.display()));
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| err_msg!(Io, "Could not walk {}", root.display()).with_cause(e))?;
        let path = entry.path();
        if path.is_file() && path.extension().map_or(false, |ext| ext == "py") {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

fn print_error(error: GradeError) {
    let report = miette::Report::new(error);
    eprintln!("{report:?}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discover_submissions_sorted_and_filtered() {
        let dir = std::env::temp_dir().join(format!("treegrade-discover-{}", process::id()));
        let nested = dir.join("nested");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.join("b.py"), "1").unwrap();
        fs::write(dir.join("a.py"), "1").unwrap();
        fs::write(dir.join("notes.txt"), "x").unwrap();
        fs::write(nested.join("c.py"), "1").unwrap();

        let files = discover_submissions(&dir).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|f| f.strip_prefix(&dir).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, vec!["a.py", "b.py", "nested/c.py"]);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_discover_rejects_missing_directory() {
        let err = discover_submissions(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, GradeError::Io { .. }));
    }
}
