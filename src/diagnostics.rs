//! Unified `miette`-based diagnostics for treegrade.
//!
//! Every failure that can leave the grading pipeline is a [`GradeError`]. Parse
//! failures carry the offending source and span so they render with a caret;
//! internal contract violations and configuration problems usually carry only
//! a message.
//!
//! # Error Construction Macros
//!
//! - `err_msg!(Internal, "call node expected, found {}", kind)` for message-only errors.
//! - `err_ctx!(Parse, "Syntax error", src, span)` when a source and span are at hand.
//! - `err_ctx!(Parse, "Syntax error", src, span, help)` to attach a help line.
//!
//! Pass `src` as a [`SourceArc`] and `span` as a [`Span`]; the macros clone the
//! source handle themselves.

use std::sync::Arc;

use miette::{Diagnostic, LabeledSpan, NamedSource, SourceCode};
use thiserror::Error;

use crate::Span;

pub type SourceArc = Arc<NamedSource<String>>;

/// Error classification that mirrors the [`GradeError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorType {
    /// Source text that does not parse under the guest grammar
    Parse,
    /// Malformed trees or misuse of the API by the caller
    Internal,
    /// A condition predicate that could not be evaluated
    Condition,
    /// Invalid exercise configuration
    Config,
    /// Filesystem access from the CLI
    Io,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::Parse => "Parse",
            ErrorType::Internal => "Internal",
            ErrorType::Condition => "Condition",
            ErrorType::Config => "Config",
            ErrorType::Io => "Io",
        }
    }
}

impl std::fmt::Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single additional label for multi-span diagnostics.
#[derive(Debug)]
pub struct RelatedLabel {
    pub source: SourceArc,
    pub span: Span,
    pub label: String,
}

/// Minimal, composable error context for diagnostics.
#[derive(Debug, Default)]
pub struct ErrorContext {
    /// The primary source for this error (if any).
    pub source: Option<SourceArc>,
    /// The primary span for this error (if any).
    pub span: Option<Span>,
    /// An optional help message.
    pub help: Option<String>,
    /// Additional labeled spans for multi-label diagnostics.
    pub related: Vec<RelatedLabel>,
}

impl ErrorContext {
    /// Returns an empty error context (no source, span, or help).
    pub fn none() -> Self {
        Self::default()
    }

    /// Creates a context with both source and span.
    pub fn with_source_and_span(source: SourceArc, span: Span) -> Self {
        Self {
            source: Some(source),
            span: Some(span),
            help: None,
            related: vec![],
        }
    }
}

/// Unified error type for every treegrade failure mode.
#[derive(Debug, Error)]
pub enum GradeError {
    #[error("Parse error: {message}")]
    Parse {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("Condition error: {message}")]
    Condition {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("I/O error: {message}")]
    Io {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
}

impl GradeError {
    fn get_ctx(&self) -> &ErrorContext {
        match self {
            GradeError::Parse { ctx, .. }
            | GradeError::Internal { ctx, .. }
            | GradeError::Condition { ctx, .. }
            | GradeError::Config { ctx, .. }
            | GradeError::Io { ctx, .. } => ctx,
        }
    }

    fn message(&self) -> &str {
        match self {
            GradeError::Parse { message, .. }
            | GradeError::Internal { message, .. }
            | GradeError::Condition { message, .. }
            | GradeError::Config { message, .. }
            | GradeError::Io { message, .. } => message,
        }
    }

    pub fn error_type(&self) -> ErrorType {
        match self {
            GradeError::Parse { .. } => ErrorType::Parse,
            GradeError::Internal { .. } => ErrorType::Internal,
            GradeError::Condition { .. } => ErrorType::Condition,
            GradeError::Config { .. } => ErrorType::Config,
            GradeError::Io { .. } => ErrorType::Io,
        }
    }

    /// Attaches an underlying cause, keeping the variant and context.
    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        match &mut self {
            GradeError::Parse { source, .. }
            | GradeError::Internal { source, .. }
            | GradeError::Condition { source, .. }
            | GradeError::Config { source, .. }
            | GradeError::Io { source, .. } => *source = Some(Box::new(cause)),
        }
        self
    }
}

impl Diagnostic for GradeError {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        let code = match self.error_type() {
            ErrorType::Parse => "treegrade::parse",
            ErrorType::Internal => "treegrade::internal",
            ErrorType::Condition => "treegrade::condition",
            ErrorType::Config => "treegrade::config",
            ErrorType::Io => "treegrade::io",
        };
        Some(Box::new(code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        self.get_ctx()
            .help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn std::fmt::Display + 'a>)
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        self.get_ctx()
            .source
            .as_ref()
            .map(|s| s.as_ref() as &dyn SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let ctx = self.get_ctx();
        let mut labels = Vec::new();
        if let Some(span) = ctx.span {
            labels.push(LabeledSpan::new(
                Some(self.message().to_string()),
                span.start,
                span.len().max(1),
            ));
        }
        for rel in &ctx.related {
            labels.push(LabeledSpan::new(
                Some(rel.label.clone()),
                rel.span.start,
                rel.span.len().max(1),
            ));
        }
        if labels.is_empty() {
            None
        } else {
            Some(Box::new(labels.into_iter()))
        }
    }
}

/// Wraps source text into a shared `NamedSource` for error contexts.
pub fn to_error_source<S: AsRef<str>>(name: &str, source: S) -> SourceArc {
    Arc::new(NamedSource::new(name, source.as_ref().to_string()))
}

/// Constructs a GradeError variant with a formatted message and no context.
#[macro_export]
macro_rules! err_msg {
    ($variant:ident, $msg:literal $(, $arg:expr)*) => {
        $crate::GradeError::$variant {
            message: format!($msg $(, $arg)*),
            ctx: $crate::ErrorContext::none(),
            source: None,
        }
    };
    ($variant:ident, $msg:expr) => {
        $crate::GradeError::$variant {
            message: format!("{}", $msg),
            ctx: $crate::ErrorContext::none(),
            source: None,
        }
    };
}

/// Constructs a GradeError variant with a message, source and span, and an optional help line.
#[macro_export]
macro_rules! err_ctx {
    ($variant:ident, $msg:expr, $src:expr, $span:expr, $help:expr) => {
        $crate::GradeError::$variant {
            message: $msg.to_string(),
            ctx: $crate::ErrorContext {
                source: Some($crate::diagnostics::SourceArc::clone($src)),
                span: Some($span),
                help: Some(format!("{}", $help)),
                related: vec![],
            },
            source: None,
        }
    };
    ($variant:ident, $msg:expr, $src:expr, $span:expr) => {
        $crate::GradeError::$variant {
            message: $msg.to_string(),
            ctx: $crate::ErrorContext::with_source_and_span(
                $crate::diagnostics::SourceArc::clone($src),
                $span,
            ),
            source: None,
        }
    };
}

#[cfg(test)]
mod diagnostics_tests {
    use miette::Report;

    use super::*;

    #[test]
    fn test_parse_error_renders_label_and_help() {
        let src = to_error_source("student.py", "1 +");
        let span = Span {
            start: 3,
            end: 3,
            line: 1,
            column: 4,
        };
        let err = err_ctx!(Parse, "Syntax error", &src, span, "Finish the expression.");
        let output = format!("{:?}", Report::new(err));
        assert!(output.contains("Syntax error"));
        assert!(output.contains("Finish the expression."));
        assert!(output.contains("treegrade::parse"));
    }

    #[test]
    fn test_error_chaining() {
        let cause = err_msg!(Config, "unknown predicate `{}`", "bogus");
        let err = err_msg!(Config, "Invalid exercise file").with_cause(cause);
        let output = format!("{:?}", Report::new(err));
        assert!(output.contains("Invalid exercise file"));
        assert!(output.contains("unknown predicate `bogus`"));
    }

    #[test]
    fn test_cause_is_exposed_as_error_source() {
        use std::error::Error as _;

        let plain = err_msg!(Io, "cannot read file");
        assert!(plain.source().is_none());

        let chained = err_msg!(Io, "cannot read file")
            .with_cause(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        let cause = chained.source().map(|c| c.to_string());
        assert_eq!(cause.as_deref(), Some("gone"));
    }

    #[test]
    fn test_error_type_matches_variant() {
        assert_eq!(err_msg!(Internal, "boom").error_type(), ErrorType::Internal);
        assert_eq!(
            err_msg!(Condition, "predicate {} failed", 2).error_type(),
            ErrorType::Condition
        );
    }
}
