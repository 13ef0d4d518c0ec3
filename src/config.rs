//! Exercise configuration files.
//!
//! An exercise is described in YAML (or JSON): the solution code, how to grade
//! it, extra callee signatures and, for condition grading, the conditions.
//!
//! ```yaml
//! solution: sum(xs, start=1)
//! mode: tree
//! signatures:
//!   - name: scale
//!     params: "value, factor=2"
//! ```

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ast::{NodeKind, ParamKind, Parameter, Span, SyntaxNode};
use crate::compare::CompareMode;
use crate::conditions::{
    CodeContains, ConditionMode, ConditionRecord, Equals, InRange, MatchesSolution, Polarity,
    Predicate, PredicateRegistry,
};
use crate::diagnostics::to_error_source;
use crate::engine::{GradeOptions, GradingMode};
use crate::feedback::{FeedbackPool, MessageContext};
use crate::signature::{build_default_signature_table, Signature, SignatureTable};
use crate::syntax::normalize;
use crate::{err_ctx, err_msg, GradeError};

// ============================================================================
// CONFIGURATION TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExerciseConfig {
    #[serde(default)]
    pub solution: String,
    #[serde(default)]
    pub mode: GradingMode,
    #[serde(default)]
    pub compare_mode: CompareMode,
    #[serde(default = "default_max_value_len")]
    pub max_value_len: usize,
    #[serde(default)]
    pub signatures: Vec<SignatureSpec>,
    #[serde(default)]
    pub conditions: Vec<ConditionSpec>,
    #[serde(default)]
    pub condition_mode: ConditionMode,
    #[serde(default)]
    pub seed: Option<u64>,
    /// Replacement praise / encouragement pools.
    #[serde(default)]
    pub feedback: Option<FeedbackPool>,
}

fn default_max_value_len() -> usize {
    MessageContext::default().max_value_len
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignatureSpec {
    pub name: String,
    pub params: ParamsSpec,
}

/// Parameters either as Python source (`"a, /, b=1"`) or as a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamsSpec {
    Source(String),
    List(Vec<ParamSpec>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParamSpec {
    pub name: String,
    #[serde(default)]
    pub kind: ParamKind,
    /// Default value as guest source text.
    #[serde(default)]
    pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum PredicateSpec {
    Equals {
        value: Value,
        #[serde(default)]
        tolerance: f64,
    },
    MatchesSolution {
        #[serde(default)]
        tolerance: f64,
    },
    InRange {
        min: f64,
        max: f64,
    },
    CodeContains {
        pattern: String,
    },
    /// A predicate registered under `name`.
    Named {
        name: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConditionSpec {
    pub predicate: PredicateSpec,
    #[serde(default)]
    pub polarity: Polarity,
    /// Shorthand for `on_pass` of a pass-if or `on_fail` of a fail-if.
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub on_pass: Option<String>,
    #[serde(default)]
    pub on_fail: Option<String>,
}

// ============================================================================
// LOADING
// ============================================================================

impl ExerciseConfig {
    /// Load from a file; `.json` files are JSON, everything else YAML.
    pub fn load(path: &Path) -> Result<Self, GradeError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            err_msg!(Io, "Could not read exercise file {}", path.display()).with_cause(e)
        })?;
        let origin = path.display().to_string();
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&origin, &text),
            _ => Self::from_yaml_str(&origin, &text),
        }
    }

    pub fn from_yaml_str(origin: &str, text: &str) -> Result<Self, GradeError> {
        serde_yaml::from_str(text).map_err(|e| {
            let location = e.location().map(|l| (l.index(), l.line(), l.column()));
            config_error(origin, text, &e.to_string(), location).with_cause(e)
        })
    }

    pub fn from_json_str(origin: &str, text: &str) -> Result<Self, GradeError> {
        serde_json::from_str(text).map_err(|e| {
            let location = (e.line() > 0).then(|| {
                let index = byte_offset(text, e.line(), e.column());
                (index, e.line(), e.column())
            });
            config_error(origin, text, &e.to_string(), location).with_cause(e)
        })
    }

    /// Grading options for this exercise, resolving named predicates in `registry`.
    pub fn to_options(&self, registry: &PredicateRegistry) -> Result<GradeOptions, GradeError> {
        let mut signatures = SignatureTable::new();
        for spec in &self.signatures {
            signatures.register(spec.to_signature()?);
        }
        let conditions = self
            .conditions
            .iter()
            .map(|c| c.to_record(registry))
            .collect::<Result<Vec<_>, _>>()?;
        if self.mode == GradingMode::Conditions && conditions.is_empty() {
            return Err(err_msg!(Config, "Condition grading needs at least one condition"));
        }

        Ok(GradeOptions {
            mode: self.mode,
            compare_mode: self.compare_mode,
            signatures: build_default_signature_table().layered(&signatures),
            message_context: MessageContext {
                max_value_len: self.max_value_len,
            },
            pool: self.feedback.clone().unwrap_or_default(),
            conditions,
            condition_mode: self.condition_mode,
            seed: self.seed,
        })
    }
}

impl SignatureSpec {
    pub fn to_signature(&self) -> Result<Signature, GradeError> {
        match &self.params {
            ParamsSpec::Source(source) => Signature::parse(&self.name, source),
            ParamsSpec::List(params) => {
                let params = params
                    .iter()
                    .map(|p| {
                        Ok(Parameter {
                            name: p.name.clone(),
                            kind: p.kind,
                            default: p.default.as_deref().map(parse_default).transpose()?,
                        })
                    })
                    .collect::<Result<Vec<_>, GradeError>>()?;
                Ok(Signature::new(self.name.clone(), params))
            }
        }
    }
}

impl ConditionSpec {
    pub fn to_record(&self, registry: &PredicateRegistry) -> Result<ConditionRecord, GradeError> {
        let predicate: Arc<dyn Predicate> = match &self.predicate {
            PredicateSpec::Equals { value, tolerance } => {
                Arc::new(Equals::new(value.clone()).with_tolerance(*tolerance))
            }
            PredicateSpec::MatchesSolution { tolerance } => Arc::new(MatchesSolution {
                tolerance: *tolerance,
            }),
            PredicateSpec::InRange { min, max } => {
                if min > max {
                    return Err(err_msg!(Config, "Empty range: {} > {}", min, max));
                }
                Arc::new(InRange {
                    min: *min,
                    max: *max,
                })
            }
            PredicateSpec::CodeContains { pattern } => Arc::new(CodeContains::new(pattern)?),
            PredicateSpec::Named { name } => registry
                .get(name)
                .ok_or_else(|| err_msg!(Config, "Unknown predicate `{}`", name))?,
        };

        let shorthand = self.message.clone().unwrap_or_default();
        let (default_pass, default_fail) = match self.polarity {
            Polarity::PassIf => (shorthand, String::new()),
            Polarity::FailIf => (String::new(), shorthand),
        };
        Ok(ConditionRecord {
            predicate,
            on_pass: self.on_pass.clone().unwrap_or(default_pass),
            on_fail: self.on_fail.clone().unwrap_or(default_fail),
            polarity: self.polarity,
        })
    }
}

// ============================================================================
// UTILITIES
// ============================================================================

fn parse_default(source: &str) -> Result<SyntaxNode, GradeError> {
    let node = normalize(source)
        .map_err(|e| err_msg!(Config, "Invalid default value `{}`", source).with_cause(e))?;
    match node.kind {
        NodeKind::Module { .. } => Err(err_msg!(Config, "Default value `{}` is not an expression", source)),
        _ => Ok(node),
    }
}

fn config_error(
    origin: &str,
    text: &str,
    message: &str,
    location: Option<(usize, usize, usize)>,
) -> GradeError {
    match location {
        Some((index, line, column)) => {
            let span = Span {
                start: index,
                end: index,
                line,
                column,
            };
            err_ctx!(Config, message, &to_error_source(origin, text), span)
        }
        None => err_msg!(Config, message),
    }
}

/// Byte offset of a 1-based line / column pair.
fn byte_offset(text: &str, line: usize, column: usize) -> usize {
    let line_start: usize = text
        .split_inclusive('\n')
        .take(line.saturating_sub(1))
        .map(str::len)
        .sum();
    (line_start + column.saturating_sub(1)).min(text.len())
}
