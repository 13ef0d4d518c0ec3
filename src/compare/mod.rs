//! Structural tree comparison.
//!
//! [`compare`] walks the expected (solution) and actual (student) trees in
//! lockstep and records each structural difference as a [`Discrepancy`].
//! Calls are compared through their standardized arguments, so argument order
//! and explicitly passed defaults do not matter.

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

use crate::ast::{Keyword, NodeKind, Parameter, SyntaxNode};
use crate::signature::SignatureTable;
use crate::{err_msg, GradeError};

pub mod standardize;

use standardize::{standardize, CallArguments};

// ============================================================================
// OPTIONS
// ============================================================================

/// How many discrepancies to collect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareMode {
    /// Stop at the first discrepancy.
    #[default]
    FirstOnly,
    /// Record every discrepancy in traversal order.
    CollectAll,
}

#[derive(Debug, Clone, Default)]
pub struct CompareOptions {
    pub mode: CompareMode,
    pub signatures: SignatureTable,
}

impl CompareOptions {
    pub fn new(mode: CompareMode, signatures: SignatureTable) -> Self {
        Self { mode, signatures }
    }
}

// ============================================================================
// DISCREPANCIES
// ============================================================================

/// One step on the path from the root to a discrepancy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// A named child slot such as `left` or `func`.
    Slot(&'static str),
    /// An element of a sequence slot.
    Index(usize),
    /// An argument of a call to `callee`.
    Argument {
        callee: String,
        name: Option<String>,
        position: Option<usize>,
        /// Whether the learner could have passed it as `name=value`.
        by_keyword: bool,
    },
}

impl Step {
    fn argument(
        callee: &str,
        name: Option<&str>,
        position: Option<usize>,
        by_keyword: bool,
    ) -> Self {
        Step::Argument {
            callee: callee.to_string(),
            name: name.map(str::to_string),
            position,
            by_keyword,
        }
    }
}

/// Path from the tree root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Location {
    pub steps: Vec<Step>,
}

impl Location {
    pub fn last(&self) -> Option<&Step> {
        self.steps.last()
    }

    /// The deepest argument step, if the location lies inside a call.
    pub fn innermost_argument(&self) -> Option<&Step> {
        self.steps
            .iter()
            .rev()
            .find(|s| matches!(s, Step::Argument { .. }))
    }

    pub fn ends_in_argument(&self) -> bool {
        matches!(self.last(), Some(Step::Argument { .. }))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return write!(f, "<root>");
        }
        for (i, step) in self.steps.iter().enumerate() {
            match step {
                Step::Slot(name) if i == 0 => write!(f, "{}", name)?,
                Step::Slot(name) => write!(f, ".{}", name)?,
                Step::Index(index) => write!(f, "[{}]", index)?,
                Step::Argument {
                    callee,
                    name,
                    position,
                    ..
                } => match (name, position) {
                    (Some(name), _) => write!(f, "<{}:{}>", callee, name)?,
                    (None, Some(position)) => write!(f, "<{}:#{}>", callee, position)?,
                    (None, None) => write!(f, "<{}:**>", callee)?,
                },
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiscrepancyKind {
    Missing,
    Unexpected,
    WrongValue,
    WrongArgument,
    RepeatedArgument,
    SurplusArgument,
}

impl DiscrepancyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscrepancyKind::Missing => "missing",
            DiscrepancyKind::Unexpected => "unexpected",
            DiscrepancyKind::WrongValue => "wrong-value",
            DiscrepancyKind::WrongArgument => "wrong-argument",
            DiscrepancyKind::RepeatedArgument => "repeated-argument",
            DiscrepancyKind::SurplusArgument => "surplus-argument",
        }
    }
}

impl fmt::Display for DiscrepancyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The thing a discrepancy is about: a subtree, or an operator / identifier token.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Node(SyntaxNode),
    Token(String),
}

impl Fragment {
    /// Guest-source rendering.
    pub fn render(&self) -> String {
        match self {
            Fragment::Node(node) => node.pretty(),
            Fragment::Token(token) => token.clone(),
        }
    }
}

impl Serialize for Fragment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.render())
    }
}

/// A single classified structural difference.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Discrepancy {
    pub kind: DiscrepancyKind,
    pub location: Location,
    pub expected: Option<Fragment>,
    pub actual: Option<Fragment>,
    /// Line of the nearest student-side node.
    pub line: usize,
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Compare `expected` (solution) against `actual` (student).
///
/// # Examples
///
/// ```rust
/// use treegrade::compare::{compare, CompareOptions, DiscrepancyKind};
/// use treegrade::syntax::normalize;
///
/// let solution = normalize("[1, 2]").unwrap();
/// let student = normalize("[1]").unwrap();
/// let found = compare(&solution, &student, &CompareOptions::default()).unwrap();
/// assert_eq!(found[0].kind, DiscrepancyKind::Missing);
/// ```
pub fn compare(
    expected: &SyntaxNode,
    actual: &SyntaxNode,
    options: &CompareOptions,
) -> Result<Vec<Discrepancy>, GradeError> {
    let mut comparator = Comparator {
        options,
        path: Vec::new(),
        found: Vec::new(),
    };
    match comparator.node(expected, actual) {
        Ok(()) | Err(Stop::Short) => {}
        Err(Stop::Error(err)) => return Err(err),
    }
    tracing::debug!(
        mode = ?options.mode,
        discrepancies = comparator.found.len(),
        "comparison finished"
    );
    Ok(comparator.found)
}

// ============================================================================
// COMPARATOR
// ============================================================================

/// Early exit from the walk: either the first discrepancy in `FirstOnly`
/// mode, or a malformed tree.
enum Stop {
    Short,
    Error(GradeError),
}

impl From<GradeError> for Stop {
    fn from(err: GradeError) -> Self {
        Stop::Error(err)
    }
}

type Flow = Result<(), Stop>;

struct Comparator<'o> {
    options: &'o CompareOptions,
    path: Vec<Step>,
    found: Vec<Discrepancy>,
}

impl<'o> Comparator<'o> {
    fn report(
        &mut self,
        kind: DiscrepancyKind,
        expected: Option<Fragment>,
        actual: Option<Fragment>,
        line: usize,
    ) -> Flow {
        self.found.push(Discrepancy {
            kind,
            location: Location {
                steps: self.path.clone(),
            },
            expected,
            actual,
            line,
        });
        match self.options.mode {
            CompareMode::FirstOnly => Err(Stop::Short),
            CompareMode::CollectAll => Ok(()),
        }
    }

    fn within<F>(&mut self, step: Step, f: F) -> Flow
    where
        F: FnOnce(&mut Self) -> Flow,
    {
        self.path.push(step);
        let result = f(self);
        self.path.pop();
        result
    }

    fn wrong_value(&mut self, expected: &SyntaxNode, actual: &SyntaxNode) -> Flow {
        self.report(
            DiscrepancyKind::WrongValue,
            Some(Fragment::Node(expected.clone())),
            Some(Fragment::Node(actual.clone())),
            actual.span.line,
        )
    }

    fn node(&mut self, expected: &SyntaxNode, actual: &SyntaxNode) -> Flow {
        validate(expected)?;
        validate(actual)?;
        let line = actual.span.line;

        use NodeKind::*;
        match (&expected.kind, &actual.kind) {
            (Module { body: e }, Module { body: a }) => self.sequence("body", e, a, line),
            (ExprStmt { value: e }, ExprStmt { value: a }) => self.slot("value", e, a),
            (
                Assign {
                    targets: et,
                    value: ev,
                },
                Assign {
                    targets: at,
                    value: av,
                },
            ) => {
                self.sequence("targets", et, at, line)?;
                self.slot("value", ev, av)
            }
            (
                AugAssign {
                    target: et,
                    op: eo,
                    value: ev,
                },
                AugAssign {
                    target: at,
                    op: ao,
                    value: av,
                },
            ) => {
                self.slot("target", et, at)?;
                self.token("op", eo.symbol(), ao.symbol(), line)?;
                self.slot("value", ev, av)
            }
            (
                FunctionDef {
                    name: en,
                    params: ep,
                    body: eb,
                },
                FunctionDef {
                    name: an,
                    params: ap,
                    body: ab,
                },
            ) => {
                self.token("name", en, an, line)?;
                self.params(ep, ap, line)?;
                self.sequence("body", eb, ab, line)
            }
            (Return { value: e }, Return { value: a }) => {
                self.optional("value", e.as_deref(), a.as_deref(), line)
            }
            (Pass, Pass) => Ok(()),
            (Import { names: e }, Import { names: a }) => {
                let render = |alias: &crate::ast::Alias| match &alias.asname {
                    Some(asname) => format!("{} as {}", alias.name, asname),
                    None => alias.name.clone(),
                };
                let e: Vec<String> = e.iter().map(render).collect();
                let a: Vec<String> = a.iter().map(render).collect();
                self.tokens("names", &e, &a, line)
            }
            (Literal { value: e }, Literal { value: a }) => {
                if e.value_eq(a) {
                    Ok(())
                } else {
                    self.wrong_value(expected, actual)
                }
            }
            (Name { id: e }, Name { id: a }) => {
                if e == a {
                    Ok(())
                } else {
                    self.wrong_value(expected, actual)
                }
            }
            (
                BinOp {
                    left: el,
                    op: eo,
                    right: er,
                },
                BinOp {
                    left: al,
                    op: ao,
                    right: ar,
                },
            ) => {
                self.slot("left", el, al)?;
                self.token("op", eo.symbol(), ao.symbol(), line)?;
                self.slot("right", er, ar)
            }
            (
                UnaryOp {
                    op: eo,
                    operand: ev,
                },
                UnaryOp {
                    op: ao,
                    operand: av,
                },
            ) => {
                self.token("op", eo.symbol(), ao.symbol(), line)?;
                self.slot("operand", ev, av)
            }
            (BoolOp { op: eo, values: ev }, BoolOp { op: ao, values: av }) => {
                self.token("op", eo.symbol(), ao.symbol(), line)?;
                self.sequence("values", ev, av, line)
            }
            (
                Compare {
                    left: el,
                    ops: eo,
                    comparators: ec,
                },
                Compare {
                    left: al,
                    ops: ao,
                    comparators: ac,
                },
            ) => {
                self.slot("left", el, al)?;
                let eo: Vec<String> = eo.iter().map(|o| o.symbol().to_string()).collect();
                let ao: Vec<String> = ao.iter().map(|o| o.symbol().to_string()).collect();
                self.tokens("ops", &eo, &ao, line)?;
                self.sequence("comparators", ec, ac, line)
            }
            (
                IfExp {
                    test: et,
                    body: eb,
                    orelse: eo,
                },
                IfExp {
                    test: at,
                    body: ab,
                    orelse: ao,
                },
            ) => {
                self.slot("test", et, at)?;
                self.slot("body", eb, ab)?;
                self.slot("orelse", eo, ao)
            }
            (Call { .. }, Call { .. }) => self.call(expected, actual),
            (Starred { value: e }, Starred { value: a }) => self.slot("value", e, a),
            (
                Attribute {
                    value: ev,
                    attr: ea,
                },
                Attribute {
                    value: av,
                    attr: aa,
                },
            ) => {
                self.slot("value", ev, av)?;
                self.token("attr", ea, aa, line)
            }
            (
                Subscript {
                    value: ev,
                    slice: es,
                },
                Subscript {
                    value: av,
                    slice: as_,
                },
            ) => {
                self.slot("value", ev, av)?;
                self.slot("slice", es, as_)
            }
            (
                Slice {
                    lower: el,
                    upper: eu,
                    step: es,
                },
                Slice {
                    lower: al,
                    upper: au,
                    step: as_,
                },
            ) => {
                self.optional("lower", el.as_deref(), al.as_deref(), line)?;
                self.optional("upper", eu.as_deref(), au.as_deref(), line)?;
                self.optional("step", es.as_deref(), as_.as_deref(), line)
            }
            (List { elts: e }, List { elts: a })
            | (Tuple { elts: e }, Tuple { elts: a })
            | (Set { elts: e }, Set { elts: a }) => self.sequence("elts", e, a, line),
            (Dict { keys: ek, values: ev }, Dict { keys: ak, values: av }) => {
                self.sequence("keys", ek, ak, line)?;
                self.sequence("values", ev, av, line)
            }
            _ => self.wrong_value(expected, actual),
        }
    }

    fn slot(&mut self, name: &'static str, expected: &SyntaxNode, actual: &SyntaxNode) -> Flow {
        self.within(Step::Slot(name), |c| c.node(expected, actual))
    }

    fn optional(
        &mut self,
        name: &'static str,
        expected: Option<&SyntaxNode>,
        actual: Option<&SyntaxNode>,
        line: usize,
    ) -> Flow {
        self.within(Step::Slot(name), |c| c.present(expected, actual, line))
    }

    /// Compare two possibly absent nodes at the current path.
    fn present(&mut self, expected: Option<&SyntaxNode>, actual: Option<&SyntaxNode>, line: usize) -> Flow {
        match (expected, actual) {
            (Some(e), Some(a)) => self.node(e, a),
            (Some(e), None) => self.report(
                DiscrepancyKind::Missing,
                Some(Fragment::Node(e.clone())),
                None,
                line,
            ),
            (None, Some(a)) => self.report(
                DiscrepancyKind::Unexpected,
                None,
                Some(Fragment::Node(a.clone())),
                a.span.line,
            ),
            (None, None) => Ok(()),
        }
    }

    fn sequence(
        &mut self,
        name: &'static str,
        expected: &[SyntaxNode],
        actual: &[SyntaxNode],
        line: usize,
    ) -> Flow {
        self.within(Step::Slot(name), |c| {
            for i in 0..expected.len().max(actual.len()) {
                c.within(Step::Index(i), |c| {
                    c.present(expected.get(i), actual.get(i), line)
                })?;
            }
            Ok(())
        })
    }

    fn token(&mut self, name: &'static str, expected: &str, actual: &str, line: usize) -> Flow {
        if expected == actual {
            return Ok(());
        }
        self.within(Step::Slot(name), |c| {
            c.report(
                DiscrepancyKind::WrongValue,
                Some(Fragment::Token(expected.to_string())),
                Some(Fragment::Token(actual.to_string())),
                line,
            )
        })
    }

    fn tokens(&mut self, name: &'static str, expected: &[String], actual: &[String], line: usize) -> Flow {
        self.within(Step::Slot(name), |c| {
            for i in 0..expected.len().max(actual.len()) {
                let (kind, e, a) = match (expected.get(i), actual.get(i)) {
                    (Some(e), Some(a)) if e == a => continue,
                    (Some(e), Some(a)) => (DiscrepancyKind::WrongValue, Some(e), Some(a)),
                    (Some(e), None) => (DiscrepancyKind::Missing, Some(e), None),
                    (None, Some(a)) => (DiscrepancyKind::Unexpected, None, Some(a)),
                    (None, None) => continue,
                };
                c.within(Step::Index(i), |c| {
                    c.report(
                        kind,
                        e.map(|t| Fragment::Token(t.clone())),
                        a.map(|t| Fragment::Token(t.clone())),
                        line,
                    )
                })?;
            }
            Ok(())
        })
    }

    fn params(&mut self, expected: &[Parameter], actual: &[Parameter], line: usize) -> Flow {
        self.within(Step::Slot("params"), |c| {
            for i in 0..expected.len().max(actual.len()) {
                c.within(Step::Index(i), |c| match (expected.get(i), actual.get(i)) {
                    (Some(e), Some(a)) if e.name == a.name && e.kind == a.kind => {
                        c.optional("default", e.default.as_ref(), a.default.as_ref(), line)
                    }
                    (Some(e), Some(a)) => c.report(
                        DiscrepancyKind::WrongValue,
                        Some(Fragment::Token(e.to_string())),
                        Some(Fragment::Token(a.to_string())),
                        line,
                    ),
                    (Some(e), None) => c.report(
                        DiscrepancyKind::Missing,
                        Some(Fragment::Token(e.to_string())),
                        None,
                        line,
                    ),
                    (None, Some(a)) => c.report(
                        DiscrepancyKind::Unexpected,
                        None,
                        Some(Fragment::Token(a.to_string())),
                        line,
                    ),
                    (None, None) => Ok(()),
                })?;
            }
            Ok(())
        })
    }

    // ------------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------------

    fn call(&mut self, expected: &SyntaxNode, actual: &SyntaxNode) -> Flow {
        let (NodeKind::Call { func: ef, .. }, NodeKind::Call { func: af, .. }) =
            (&expected.kind, &actual.kind)
        else {
            return Err(err_msg!(Internal, "call comparison on non-call nodes").into());
        };

        let before = self.found.len();
        self.slot("func", ef, af)?;
        if self.found.len() > before {
            return Ok(());
        }

        let callee = ef.dotted_name().unwrap_or_else(|| ef.display_name());
        let signature = self.options.signatures.resolve(ef);
        tracing::debug!(callee = %callee, resolved = signature.is_some(), "comparing call");

        let e_args = standardize(expected, signature)?;
        let a_args = standardize(actual, signature)?;
        let line = actual.span.line;

        for repeated in &a_args.repeated {
            let step = Step::argument(&callee, Some(&repeated.name), None, true);
            self.within(step, |c| {
                c.report(
                    DiscrepancyKind::RepeatedArgument,
                    None,
                    Some(Fragment::Node(repeated.value.clone())),
                    repeated.value.span.line,
                )
            })?;
        }

        if signature.is_some() {
            for bound in &e_args.bound {
                let step = Step::argument(
                    &callee,
                    Some(&bound.name),
                    bound.position,
                    bound.kind().accepts_keyword(),
                );
                match a_args.get(&bound.name) {
                    Some(other) => {
                        let other_value = respan_default(other, line);
                        self.within(step, |c| c.node(&bound.value, &other_value))?
                    }
                    None => self.within(step, |c| {
                        c.report(
                            DiscrepancyKind::Missing,
                            Some(Fragment::Node(bound.value.clone())),
                            None,
                            line,
                        )
                    })?,
                }
            }
            for bound in a_args.bound.iter().filter(|b| e_args.get(&b.name).is_none()) {
                let step = Step::argument(
                    &callee,
                    Some(&bound.name),
                    bound.position,
                    bound.kind().accepts_keyword(),
                );
                self.within(step, |c| {
                    c.report(
                        DiscrepancyKind::SurplusArgument,
                        None,
                        Some(Fragment::Node(bound.value.clone())),
                        bound.value.span.line,
                    )
                })?;
            }
        }

        self.leftovers(&callee, &e_args, &a_args, signature.is_none(), line)
    }

    /// Arguments no parameter accepted: positionals aligned by index, keywords
    /// matched by name.
    fn leftovers(
        &mut self,
        callee: &str,
        expected: &CallArguments,
        actual: &CallArguments,
        unresolved: bool,
        line: usize,
    ) -> Flow {
        let (pairs, e_unmatched, a_unmatched) =
            match_keywords(&expected.leftover_keywords, &actual.leftover_keywords);
        let same_positional = expected.leftover_args.len() == actual.leftover_args.len();

        // A keyword the solution never uses while the positional counts differ
        // could belong to any parameter.
        if let Some(keyword) = a_unmatched.first() {
            if !same_positional {
                let step = Step::argument(callee, Some(keyword_key(keyword)), None, true);
                return self.within(step, |c| {
                    c.report(
                        DiscrepancyKind::Unexpected,
                        None,
                        Some(Fragment::Node(keyword.value.clone())),
                        keyword.value.span.line,
                    )
                });
            }
        }

        let count = expected.leftover_args.len().max(actual.leftover_args.len());
        for i in 0..count {
            match (expected.leftover_args.get(i), actual.leftover_args.get(i)) {
                (Some(e), Some(a)) => {
                    let step = Step::argument(callee, None, Some(e.position), false);
                    self.within(step, |c| c.node(&e.value, &a.value))?;
                }
                (Some(e), None) => {
                    let step = Step::argument(callee, None, Some(e.position), false);
                    self.within(step, |c| {
                        c.report(
                            DiscrepancyKind::Missing,
                            Some(Fragment::Node(e.value.clone())),
                            None,
                            line,
                        )
                    })?;
                }
                (None, Some(a)) => {
                    let step = Step::argument(callee, None, Some(a.position), false);
                    self.within(step, |c| {
                        c.report(
                            DiscrepancyKind::SurplusArgument,
                            None,
                            Some(Fragment::Node(a.value.clone())),
                            a.value.span.line,
                        )
                    })?;
                }
                (None, None) => {}
            }
        }

        for (e, a) in pairs {
            let step = Step::argument(callee, Some(keyword_key(e)), None, true);
            self.within(step, |c| c.node(&e.value, &a.value))?;
        }

        let paired = if unresolved {
            e_unmatched.len().min(a_unmatched.len())
        } else {
            0
        };
        for (e, a) in e_unmatched.iter().zip(a_unmatched.iter()).take(paired) {
            let step = Step::argument(callee, Some(keyword_key(e)), None, true);
            self.within(step, |c| {
                c.report(
                    DiscrepancyKind::WrongArgument,
                    Some(Fragment::Token(keyword_key(e).to_string())),
                    Some(Fragment::Token(keyword_key(a).to_string())),
                    a.span.line,
                )
            })?;
        }
        for e in e_unmatched.iter().skip(paired) {
            let step = Step::argument(callee, Some(keyword_key(e)), None, true);
            self.within(step, |c| {
                c.report(
                    DiscrepancyKind::Missing,
                    Some(Fragment::Node(e.value.clone())),
                    None,
                    line,
                )
            })?;
        }
        for a in a_unmatched.iter().skip(paired) {
            let step = Step::argument(callee, Some(keyword_key(a)), None, true);
            self.within(step, |c| {
                c.report(
                    DiscrepancyKind::SurplusArgument,
                    None,
                    Some(Fragment::Node(a.value.clone())),
                    a.value.span.line,
                )
            })?;
        }
        Ok(())
    }
}

// ============================================================================
// UTILITIES
// ============================================================================

fn keyword_key(keyword: &Keyword) -> &str {
    keyword.arg.as_deref().unwrap_or("**")
}

type KeywordMatch<'k> = (Vec<(&'k Keyword, &'k Keyword)>, Vec<&'k Keyword>, Vec<&'k Keyword>);

/// Pairs keywords by name in expected order; returns the pairs and the
/// unmatched keywords of each side in encounter order.
fn match_keywords<'k>(expected: &'k [Keyword], actual: &'k [Keyword]) -> KeywordMatch<'k> {
    let mut used = vec![false; actual.len()];
    let mut pairs = Vec::new();
    let mut e_unmatched = Vec::new();
    for e in expected {
        let found = actual
            .iter()
            .enumerate()
            .position(|(i, a)| !used[i] && keyword_key(a) == keyword_key(e));
        match found {
            Some(i) => {
                used[i] = true;
                pairs.push((e, &actual[i]));
            }
            None => e_unmatched.push(e),
        }
    }
    let a_unmatched = actual
        .iter()
        .zip(used)
        .filter(|(_, used)| !used)
        .map(|(a, _)| a)
        .collect();
    (pairs, e_unmatched, a_unmatched)
}

/// A default filled in from a signature carries the signature's span; report
/// it at the call's line instead.
fn respan_default(bound: &standardize::BoundArgument, line: usize) -> SyntaxNode {
    let mut value = bound.value.clone();
    if bound.defaulted {
        value.span.line = line;
    }
    value
}

fn validate(node: &SyntaxNode) -> Result<(), GradeError> {
    match &node.kind {
        NodeKind::Compare { ops, comparators, .. } if ops.is_empty() || ops.len() != comparators.len() => {
            Err(err_msg!(
                Internal,
                "Malformed Compare node: {} operators for {} comparators",
                ops.len(),
                comparators.len()
            ))
        }
        NodeKind::Dict { keys, values } if keys.len() != values.len() => Err(err_msg!(
            Internal,
            "Malformed Dict node: {} keys for {} values",
            keys.len(),
            values.len()
        )),
        NodeKind::BoolOp { values, .. } if values.len() < 2 => Err(err_msg!(
            Internal,
            "Malformed BoolOp node: {} operands",
            values.len()
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{CompareOperator, Span};
    use crate::signature::build_default_signature_table;
    use crate::syntax::normalize;

    fn run(solution: &str, student: &str, mode: CompareMode) -> Vec<Discrepancy> {
        let options = CompareOptions::new(mode, build_default_signature_table());
        compare(&normalize(solution).unwrap(), &normalize(student).unwrap(), &options).unwrap()
    }

    fn first(solution: &str, student: &str) -> Discrepancy {
        run(solution, student, CompareMode::FirstOnly).remove(0)
    }

    #[test]
    fn test_identical_trees_have_no_discrepancies() {
        for source in ["1", "f(1, b=2)", "def f(a, b=1): return a\nf(2)", "x[1:2]"] {
            assert!(run(source, source, CompareMode::CollectAll).is_empty());
        }
    }

    #[test]
    fn test_kind_mismatch_does_not_descend() {
        let d = first("-1", "1");
        assert_eq!(d.kind, DiscrepancyKind::WrongValue);
        assert!(d.location.steps.is_empty());
        assert_eq!(d.expected.unwrap().render(), "-1");
    }

    #[test]
    fn test_numeric_literals_compare_by_value() {
        assert!(run("1", "1.0", CompareMode::FirstOnly).is_empty());
        assert_eq!(first("1", "True").kind, DiscrepancyKind::WrongValue);
    }

    #[test]
    fn test_operator_token_mismatch() {
        let d = first("a + b", "a - b");
        assert_eq!(d.location.last(), Some(&Step::Slot("op")));
        assert_eq!(d.actual.unwrap().render(), "-");
    }

    #[test]
    fn test_callee_mismatch_stops_descent() {
        let all = run("foo(1)", "bar(2)", CompareMode::CollectAll);
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].location.last(), Some(&Step::Slot("func")));
    }

    #[test]
    fn test_collect_all_agrees_on_first() {
        let all = run("[1, 2, 3]", "[0, 2, 4, 5]", CompareMode::CollectAll);
        assert_eq!(all.len(), 3);
        assert_eq!(all[0], first("[1, 2, 3]", "[0, 2, 4, 5]"));
    }

    #[test]
    fn test_signature_argument_location() {
        let d = first("sum(1, 2)", "sum(1, 3)");
        assert_eq!(
            d.location.innermost_argument(),
            Some(&Step::argument("sum", Some("start"), Some(1)))
        );
    }

    #[test]
    fn test_explicit_default_matches_omitted() {
        assert!(run("sum(xs)", "sum(xs, start=0)", CompareMode::CollectAll).is_empty());
    }

    #[test]
    fn test_surplus_kwargs_entry() {
        let mut table = SignatureTable::new();
        table.register_source("f", "a, **kw").unwrap();
        let options = CompareOptions::new(CompareMode::CollectAll, table);
        let found = compare(
            &normalize("f(1)").unwrap(),
            &normalize("f(1, extra=2)").unwrap(),
            &options,
        )
        .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, DiscrepancyKind::SurplusArgument);
    }

    #[test]
    fn test_unresolved_keyword_pairing() {
        let d = first("f(1, x=2)", "f(1, y=2)");
        assert_eq!(d.kind, DiscrepancyKind::WrongArgument);
        assert_eq!(d.expected.unwrap().render(), "x");
        assert_eq!(d.actual.unwrap().render(), "y");
    }

    #[test]
    fn test_unresolved_ambiguous_keyword() {
        let all = run("f(1, 2)", "f(1, b=2)", CompareMode::CollectAll);
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].kind, DiscrepancyKind::Unexpected);
    }

    #[test]
    fn test_repeated_reported_first() {
        let mut table = SignatureTable::new();
        table.register_source("f", "a, b=0").unwrap();
        let options = CompareOptions::new(CompareMode::CollectAll, table);
        let found = compare(
            &normalize("f(3)").unwrap(),
            &normalize("f(1, a=2)").unwrap(),
            &options,
        )
        .unwrap();
        assert_eq!(found[0].kind, DiscrepancyKind::RepeatedArgument);
        assert_eq!(found[1].kind, DiscrepancyKind::WrongValue);
    }

    #[test]
    fn test_malformed_compare_is_internal_error() {
        let name = |id: &str| SyntaxNode::new(NodeKind::Name { id: id.into() }, Span::default());
        let broken = SyntaxNode::new(
            NodeKind::Compare {
                left: Box::new(name("a")),
                ops: vec![CompareOperator::Lt, CompareOperator::Lt],
                comparators: vec![name("b")],
            },
            Span::default(),
        );
        let result = compare(&broken, &broken, &CompareOptions::default());
        assert!(matches!(result, Err(GradeError::Internal { .. })));
    }

    #[test]
    fn test_location_display() {
        let d = first("f(g(1))", "f(g(2))");
        assert_eq!(d.location.to_string(), "<f:#0><g:#0>");
    }
}
