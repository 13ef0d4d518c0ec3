//! Code queries over a parsed submission.
//!
//! Where the grader asks "does this match the solution?", the queries here ask
//! "does the code contain this construct?": calls to a function, a given
//! argument, attribute access, method calls or chains, operators. Each query
//! returns a [`Found`] that records the request and its hits. Queries chain:
//! a query on a `Found` that already holds results searches inside the last
//! hits instead of the whole tree.
//!
//! ```rust
//! use treegrade::find::Found;
//!
//! let found = Found::new("total = sum([1, 2])\nprint(total, sep='')")
//!     .unwrap()
//!     .functions(Some("print"))
//!     .arguments(&[]);
//! assert_eq!(found.texts(), vec!["total", "sep=''"]);
//! ```

use std::fmt;

use serde::Serialize;

use crate::ast::{BinaryOperator, CompareOperator, Keyword, NodeKind, Span, SyntaxNode};
use crate::syntax::{normalize, parse_named};
use crate::{err_msg, GradeError};

// ============================================================================
// QUERY RESULTS
// ============================================================================

/// The kind of construct a query looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    Functions,
    Arguments,
    Attributes,
    Properties,
    Methods,
    MethodCalls,
    MethodChains,
    Operators,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::Functions => "functions",
            QueryKind::Arguments => "arguments",
            QueryKind::Attributes => "attributes",
            QueryKind::Properties => "properties",
            QueryKind::Methods => "methods",
            QueryKind::MethodCalls => "method calls",
            QueryKind::MethodChains => "method chains",
            QueryKind::Operators => "operators",
        }
    }
}

/// One matching construct.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hit {
    /// The matched node; for a keyword argument, its value.
    pub node: SyntaxNode,
    /// The learner's text for the match, e.g. `sep=', '`.
    pub text: String,
    pub span: Span,
}

/// A request and what it found.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Query {
    pub kind: QueryKind,
    /// The name, symbol or argument list the query was narrowed to.
    pub target: Option<String>,
    pub hits: Vec<Hit>,
}

/// A positional or keyword argument to look for in calls.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgPattern {
    pub name: Option<String>,
    pub value: SyntaxNode,
}

impl ArgPattern {
    /// A positional argument, given as guest source such as `"[1, 2]"`.
    pub fn positional(value: &str) -> Result<Self, GradeError> {
        Ok(Self {
            name: None,
            value: pattern_value(value)?,
        })
    }

    /// A keyword argument `name=value`.
    pub fn keyword(name: &str, value: &str) -> Result<Self, GradeError> {
        Ok(Self {
            name: Some(name.to_string()),
            value: pattern_value(value)?,
        })
    }

    /// `"value"` or `"name=value"`.
    pub fn parse(text: &str) -> Result<Self, GradeError> {
        match text.split_once('=') {
            Some((name, value)) if is_identifier(name.trim()) && !value.starts_with('=') => {
                Self::keyword(name.trim(), value)
            }
            _ => Self::positional(text),
        }
    }
}

impl fmt::Display for ArgPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}={}", name, self.value),
            None => write!(f, "{}", self.value),
        }
    }
}

fn pattern_value(source: &str) -> Result<SyntaxNode, GradeError> {
    let node = normalize(source.trim())?;
    match node.kind {
        NodeKind::Module { .. } => Err(err_msg!(
            Internal,
            "argument pattern `{}` is not a single expression",
            source.trim()
        )),
        _ => Ok(node),
    }
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    matches!(chars.next(), Some(c) if c == '_' || c.is_alphabetic())
        && chars.all(|c| c == '_' || c.is_alphanumeric())
}

// ============================================================================
// FOUND
// ============================================================================

/// Source code, its tree, and the queries run against it so far.
#[derive(Debug, Clone)]
pub struct Found {
    source: String,
    tree: SyntaxNode,
    queries: Vec<Query>,
}

impl Found {
    pub fn new(source: &str) -> Result<Self, GradeError> {
        Ok(Self {
            source: source.to_string(),
            tree: parse_named("<code>", source)?,
            queries: Vec::new(),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn queries(&self) -> &[Query] {
        &self.queries
    }

    /// Hits of the most recent query; empty before any query.
    pub fn hits(&self) -> &[Hit] {
        self.queries.last().map(|q| q.hits.as_slice()).unwrap_or(&[])
    }

    pub fn texts(&self) -> Vec<&str> {
        self.hits().iter().map(|h| h.text.as_str()).collect()
    }

    /// Whether the most recent query matched anything.
    pub fn is_found(&self) -> bool {
        !self.hits().is_empty()
    }

    /// Calls to plain functions (`sum(...)`, not `xs.sum(...)`), optionally
    /// only those to `name`.
    pub fn functions(self, name: Option<&str>) -> Self {
        let hits = self
            .nodes()
            .into_iter()
            .filter(|node| match &node.kind {
                NodeKind::Call { func, .. } => match &func.kind {
                    NodeKind::Name { id } => name.map_or(true, |n| n == id),
                    _ => false,
                },
                _ => false,
            })
            .map(|node| self.hit(node, node.span))
            .collect();
        self.push(QueryKind::Functions, name.map(str::to_string), hits)
    }

    /// Arguments of every call. With `patterns`, only arguments equal to one of
    /// them: positional patterns match positional arguments, keyword patterns
    /// match keyword arguments of the same name. Hits follow pattern order.
    pub fn arguments(self, patterns: &[ArgPattern]) -> Self {
        let mut positional = Vec::new();
        let mut keywords = Vec::new();
        for node in self.nodes() {
            if let NodeKind::Call { args, keywords: kws, .. } = &node.kind {
                positional.extend(args.iter());
                keywords.extend(kws.iter());
            }
        }

        let hits = if patterns.is_empty() {
            let mut all: Vec<Hit> = positional
                .iter()
                .map(|arg| self.hit(arg, arg.span))
                .chain(keywords.iter().map(|kw| self.keyword_hit(kw)))
                .collect();
            all.sort_by_key(|h| h.span.start);
            all
        } else {
            let mut hits = Vec::new();
            for pattern in patterns {
                match &pattern.name {
                    None => hits.extend(
                        positional
                            .iter()
                            .filter(|arg| ***arg == pattern.value)
                            .map(|arg| self.hit(arg, arg.span)),
                    ),
                    Some(name) => hits.extend(
                        keywords
                            .iter()
                            .filter(|kw| kw.arg.as_deref() == Some(name) && kw.value == pattern.value)
                            .map(|kw| self.keyword_hit(kw)),
                    ),
                }
            }
            hits
        };

        let target = (!patterns.is_empty()).then(|| {
            patterns
                .iter()
                .map(ArgPattern::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        });
        self.push(QueryKind::Arguments, target, hits)
    }

    /// Every attribute access. An access that is called, as in `df.head()`,
    /// is reported as the whole call.
    pub fn attributes(self) -> Self {
        let nodes = self.nodes();
        let callees = callee_attributes(&nodes);
        let hits = nodes
            .iter()
            .filter_map(|node| match &node.kind {
                NodeKind::Call { func, .. } if is_attribute(func) => Some(*node),
                NodeKind::Attribute { .. } if !contains_ptr(&callees, node) => Some(*node),
                _ => None,
            })
            .map(|node| self.hit(node, node.span))
            .collect();
        self.push(QueryKind::Attributes, None, hits)
    }

    /// Attribute accesses that are not called, such as `df.shape`, optionally
    /// only those named `name`.
    pub fn properties(self, name: Option<&str>) -> Self {
        let nodes = self.nodes();
        let callees = callee_attributes(&nodes);
        let hits = nodes
            .iter()
            .filter(|node| match &node.kind {
                NodeKind::Attribute { attr, .. } => {
                    !contains_ptr(&callees, node) && name.map_or(true, |n| n == attr)
                }
                _ => false,
            })
            .map(|node| self.hit(node, node.span))
            .collect();
        self.push(QueryKind::Properties, name.map(str::to_string), hits)
    }

    /// Method calls, optionally only those whose method is `name`
    /// (`head` matches `df.head()` and `df.tail().head()`).
    pub fn methods(self, name: Option<&str>) -> Self {
        let hits = self
            .nodes()
            .into_iter()
            .filter(|node| match method_of(node) {
                Some((_, attr)) => name.map_or(true, |n| n == attr),
                None => false,
            })
            .map(|node| self.hit(node, node.span))
            .collect();
        self.push(QueryKind::Methods, name.map(str::to_string), hits)
    }

    /// Method calls whose full callee text is `callee`, e.g. `df.head` or
    /// `df.groupby("a").sum`. Without a callee, every method call.
    pub fn method_calls(self, callee: Option<&str>) -> Self {
        let wanted = callee.map(|c| match normalize(c) {
            Ok(node) if !matches!(node.kind, NodeKind::Module { .. }) => node.pretty(),
            _ => c.trim().to_string(),
        });
        let hits = self
            .nodes()
            .into_iter()
            .filter(|node| match (&node.kind, &wanted) {
                (NodeKind::Call { func, .. }, Some(wanted)) => {
                    is_attribute(func) && func.pretty() == *wanted
                }
                (NodeKind::Call { func, .. }, None) => is_attribute(func),
                _ => false,
            })
            .map(|node| self.hit(node, node.span))
            .collect();
        self.push(QueryKind::MethodCalls, callee.map(str::to_string), hits)
    }

    /// Outermost method chains: method calls whose receiver is itself a
    /// method call, like `df.head().tail()`.
    pub fn method_chains(self) -> Self {
        let nodes = self.nodes();
        let chains: Vec<&SyntaxNode> = nodes
            .iter()
            .copied()
            .filter(|node| matches!(method_of(node), Some((receiver, _)) if method_of(receiver).is_some()))
            .collect();
        let inner: Vec<&SyntaxNode> = chains
            .iter()
            .copied()
            .filter_map(|node| method_of(node).map(|(receiver, _)| receiver))
            .collect();
        let hits = chains
            .iter()
            .filter(|node| !contains_ptr(&inner, node))
            .map(|node| self.hit(node, node.span))
            .collect();
        self.push(QueryKind::MethodChains, None, hits)
    }

    /// Expressions applying an operator, optionally only `symbol` (`+`, `//`,
    /// `not in`, `and`, ...). `-` and `+` match both the binary and unary forms.
    pub fn operators(self, symbol: Option<&str>) -> Result<Self, GradeError> {
        let wanted = symbol
            .map(|s| {
                let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ");
                if is_operator(&normalized) {
                    Ok(normalized)
                } else {
                    Err(err_msg!(Internal, "`{}` is not a valid operator", s.trim()))
                }
            })
            .transpose()?;
        let hits = self
            .nodes()
            .into_iter()
            .filter(|node| {
                let ops = operator_symbols(node);
                match &wanted {
                    Some(w) => ops.iter().any(|op| op == w),
                    None => !ops.is_empty(),
                }
            })
            .map(|node| self.hit(node, node.span))
            .collect();
        Ok(self.push(QueryKind::Operators, symbol.map(str::to_string), hits))
    }

    // ------------------------------------------------------------------------
    // internals
    // ------------------------------------------------------------------------

    /// Nodes in scope: everything under the last hits, or the whole tree.
    fn nodes(&self) -> Vec<&SyntaxNode> {
        match self.queries.last() {
            Some(query) => query.hits.iter().flat_map(|h| h.node.descendants()).collect(),
            None => self.tree.descendants(),
        }
    }

    fn hit(&self, node: &SyntaxNode, span: Span) -> Hit {
        let text = self
            .source
            .get(span.start..span.end)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| node.pretty());
        Hit {
            node: node.clone(),
            text,
            span,
        }
    }

    fn keyword_hit(&self, keyword: &Keyword) -> Hit {
        self.hit(&keyword.value, keyword.span)
    }

    fn push(mut self, kind: QueryKind, target: Option<String>, hits: Vec<Hit>) -> Self {
        tracing::debug!(query = kind.as_str(), ?target, hits = hits.len(), "code query");
        self.queries.push(Query { kind, target, hits });
        self
    }
}

impl fmt::Display for Found {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(query) = self.queries.last() else {
            return write!(f, "No request has been made yet on the code");
        };
        writeln!(f, "── treegrade found ──")?;
        writeln!(f, "{}", self.source.trim())?;
        writeln!(f)?;
        writeln!(f, "── Request ──")?;
        match &query.target {
            Some(target) => writeln!(f, "{} {}", query.kind.as_str(), target)?,
            None => writeln!(f, "{}", query.kind.as_str())?,
        }
        let count = query.hits.len();
        write!(f, "Found {} {}.", count, if count == 1 { "result" } else { "results" })?;
        for (i, hit) in query.hits.iter().enumerate() {
            write!(f, "\n\n── Result {} ──\n{}", i + 1, hit.text)?;
        }
        Ok(())
    }
}

// ============================================================================
// FREE-FUNCTION QUERIES
// ============================================================================

pub fn find_functions(code: &str, name: Option<&str>) -> Result<Found, GradeError> {
    Ok(Found::new(code)?.functions(name))
}

pub fn find_arguments(code: &str, patterns: &[ArgPattern]) -> Result<Found, GradeError> {
    Ok(Found::new(code)?.arguments(patterns))
}

pub fn find_attributes(code: &str) -> Result<Found, GradeError> {
    Ok(Found::new(code)?.attributes())
}

pub fn find_properties(code: &str, name: Option<&str>) -> Result<Found, GradeError> {
    Ok(Found::new(code)?.properties(name))
}

pub fn find_methods(code: &str, name: Option<&str>) -> Result<Found, GradeError> {
    Ok(Found::new(code)?.methods(name))
}

pub fn find_method_calls(code: &str, callee: Option<&str>) -> Result<Found, GradeError> {
    Ok(Found::new(code)?.method_calls(callee))
}

pub fn find_method_chains(code: &str) -> Result<Found, GradeError> {
    Ok(Found::new(code)?.method_chains())
}

pub fn find_operators(code: &str, symbol: Option<&str>) -> Result<Found, GradeError> {
    Found::new(code)?.operators(symbol)
}

/// Whether `code` calls the function `name`.
pub fn uses_function(code: &str, name: &str) -> Result<bool, GradeError> {
    Ok(find_functions(code, Some(name))?.is_found())
}

/// Whether `code` passes `pattern` to some call.
pub fn uses_argument(code: &str, pattern: &ArgPattern) -> Result<bool, GradeError> {
    Ok(find_arguments(code, std::slice::from_ref(pattern))?.is_found())
}

pub fn uses_attributes(code: &str) -> Result<bool, GradeError> {
    Ok(find_attributes(code)?.is_found())
}

pub fn uses_method(code: &str, name: &str) -> Result<bool, GradeError> {
    Ok(find_methods(code, Some(name))?.is_found())
}

pub fn uses_method_chains(code: &str) -> Result<bool, GradeError> {
    Ok(find_method_chains(code)?.is_found())
}

pub fn uses_operator(code: &str, symbol: &str) -> Result<bool, GradeError> {
    Ok(find_operators(code, Some(symbol))?.is_found())
}

// ============================================================================
// HELPERS
// ============================================================================

fn is_attribute(node: &SyntaxNode) -> bool {
    matches!(node.kind, NodeKind::Attribute { .. })
}

/// `(receiver, method)` of a method call.
fn method_of(node: &SyntaxNode) -> Option<(&SyntaxNode, &str)> {
    match &node.kind {
        NodeKind::Call { func, .. } => match &func.kind {
            NodeKind::Attribute { value, attr } => Some((&**value, attr.as_str())),
            _ => None,
        },
        _ => None,
    }
}

/// Attribute nodes that sit in the callee position of a call.
fn callee_attributes<'a>(nodes: &[&'a SyntaxNode]) -> Vec<&'a SyntaxNode> {
    nodes
        .iter()
        .copied()
        .filter_map(|node| match &node.kind {
            NodeKind::Call { func, .. } if is_attribute(func) => Some(&**func),
            _ => None,
        })
        .collect()
}

/// Identity, not equality: two `df.head` accesses are different places.
fn contains_ptr(nodes: &[&SyntaxNode], node: &SyntaxNode) -> bool {
    nodes.iter().any(|n| std::ptr::eq(*n, node))
}

fn operator_symbols(node: &SyntaxNode) -> Vec<&'static str> {
    match &node.kind {
        NodeKind::BinOp { op, .. } | NodeKind::AugAssign { op, .. } => vec![op.symbol()],
        NodeKind::UnaryOp { op, .. } => vec![op.symbol()],
        NodeKind::BoolOp { op, .. } => vec![op.symbol()],
        NodeKind::Compare { ops, .. } => ops.iter().map(|op| op.symbol()).collect(),
        _ => vec![],
    }
}

fn is_operator(symbol: &str) -> bool {
    BinaryOperator::from_symbol(symbol).is_some()
        || CompareOperator::from_symbol(symbol).is_some()
        || matches!(symbol, "not" | "~" | "and" | "or")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_functions_by_name() {
        let code = "sum([1, 2])\nsum([1, 2, 3])\nlen([1, 2, 3])\nxs.sum()";
        assert_eq!(find_functions(code, None).unwrap().hits().len(), 3);
        assert_eq!(
            find_functions(code, Some("sum")).unwrap().texts(),
            vec!["sum([1, 2])", "sum([1, 2, 3])"]
        );
        assert!(!uses_function(code, "round").unwrap());
    }

    #[test]
    fn test_functions_inside_arguments() {
        let found = find_functions("print(round(2.5))", Some("round")).unwrap();
        assert_eq!(found.texts(), vec!["round(2.5)"]);
    }

    #[test]
    fn test_all_arguments_in_source_order() {
        let code = "print(1, \"2\", sep=\", \", end=foo(x=[\"\\n\"]))";
        let found = find_arguments(code, &[]).unwrap();
        assert_eq!(
            found.texts(),
            vec!["1", "\"2\"", "sep=\", \"", "end=foo(x=[\"\\n\"])", "x=[\"\\n\"]"]
        );
    }

    #[test]
    fn test_argument_patterns() {
        let code = "sum([1, round(2.5), 3])\nprint('Hello', 'World!', sep=', ')";
        let patterns = [
            ArgPattern::parse("2.5").unwrap(),
            ArgPattern::parse("sep=\", \"").unwrap(),
        ];
        let found = find_arguments(code, &patterns).unwrap();
        assert_eq!(found.texts(), vec!["2.5", "sep=', '"]);
        assert_eq!(found.queries()[0].target.as_deref(), Some("2.5, sep=\", \""));

        assert!(!uses_argument(code, &ArgPattern::keyword("end", "''").unwrap()).unwrap());
        assert!(!uses_argument(code, &ArgPattern::positional("', '").unwrap()).unwrap());
    }

    #[test]
    fn test_arg_pattern_parse_forms() {
        assert_eq!(ArgPattern::parse("n=5").unwrap().name.as_deref(), Some("n"));
        assert_eq!(ArgPattern::parse("a == b").unwrap().name, None);
        assert_eq!(ArgPattern::parse("'k=v'").unwrap().name, None);
        assert!(ArgPattern::parse("x = 1\ny = 2").is_err());
    }

    #[test]
    fn test_attributes_report_calls_whole() {
        let found = find_attributes("df.shape\ndf.head()\nx = df.loc[1]").unwrap();
        assert_eq!(found.texts(), vec!["df.shape", "df.head()", "df.loc"]);
        assert!(!uses_attributes("sum([1, 2, 3])").unwrap());
    }

    #[test]
    fn test_properties() {
        let code = "df.shape\ndf.head()\ndf.empty";
        assert_eq!(find_properties(code, None).unwrap().texts(), vec!["df.shape", "df.empty"]);
        assert_eq!(find_properties(code, Some("empty")).unwrap().texts(), vec!["df.empty"]);
        assert!(!find_properties(code, Some("head")).unwrap().is_found());
    }

    #[test]
    fn test_methods_and_method_calls() {
        let code = "df.head()\ndf.tail().head(3)\nhead()";
        assert_eq!(
            find_methods(code, Some("head")).unwrap().texts(),
            vec!["df.head()", "df.tail().head(3)"]
        );
        assert_eq!(find_methods(code, None).unwrap().hits().len(), 3);
        assert_eq!(
            find_method_calls(code, Some("df.tail().head")).unwrap().texts(),
            vec!["df.tail().head(3)"]
        );
        assert!(uses_method(code, "tail").unwrap());
    }

    #[test]
    fn test_method_chains_are_outermost() {
        let found = find_method_chains("df.a().b().c()\ndf.head()").unwrap();
        assert_eq!(found.texts(), vec!["df.a().b().c()"]);
        assert!(!uses_method_chains("df.head()").unwrap());
    }

    #[test]
    fn test_operators() {
        let code = "-1 + 2 * 3 // 4";
        assert_eq!(find_operators(code, None).unwrap().hits().len(), 4);
        assert_eq!(find_operators(code, Some("-")).unwrap().texts(), vec!["-1"]);
        assert_eq!(find_operators(code, Some("//")).unwrap().texts(), vec!["2 * 3 // 4"]);
        assert!(uses_operator("a not  in b", "not in").unwrap());
        assert!(uses_operator("x += 1", "+").unwrap());
        assert!(find_operators(code, Some("<>")).is_err());
    }

    #[test]
    fn test_queries_chain_within_hits() {
        let found = Found::new("print(len(xs), sep='')\nlen(ys)")
            .unwrap()
            .functions(Some("print"))
            .functions(Some("len"));
        assert_eq!(found.texts(), vec!["len(xs)"]);
        assert_eq!(found.queries().len(), 2);
    }

    #[test]
    fn test_display_lists_results() {
        let found = find_functions("sum([1])\nlen([])", Some("sum")).unwrap();
        let text = found.to_string();
        assert!(text.contains("── Request ──\nfunctions sum"));
        assert!(text.contains("Found 1 result."));
        assert!(text.contains("── Result 1 ──\nsum([1])"));
    }
}
