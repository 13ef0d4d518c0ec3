//! Syntax tree for guest-language fragments.
//!
//! Every node carries a [`Span`] for message targeting. Spans never take part
//! in equality: two nodes are equal when their kinds and children are equal.

// ============================================================================
// IMPORTS
// ============================================================================

use serde::{Deserialize, Serialize};

// ============================================================================
// CORE DATA STRUCTURES
// ============================================================================

/// Represents a span in the source code.
///
/// `start`/`end` are byte offsets; `line`/`column` are 1-based and describe `start`.
///
/// # Examples
///
/// ```rust
/// use treegrade::ast::Span;
/// let span = Span { start: 0, end: 5, line: 1, column: 1 };
/// assert_eq!(span.len(), 5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Smallest span covering both `self` and `other`.
    pub fn to(self, other: Span) -> Span {
        if other.start < self.start {
            return other.to(self);
        }
        Span {
            start: self.start,
            end: self.end.max(other.end),
            line: self.line,
            column: self.column,
        }
    }
}

/// A parsed node: a kind with its children, plus where it came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntaxNode {
    pub kind: NodeKind,
    pub span: Span,
}

impl PartialEq for SyntaxNode {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

/// The node kinds of the guest language.
///
/// Child slots are listed in the order the comparator visits them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum NodeKind {
    // Statements
    Module {
        body: Vec<SyntaxNode>,
    },
    ExprStmt {
        value: Box<SyntaxNode>,
    },
    Assign {
        targets: Vec<SyntaxNode>,
        value: Box<SyntaxNode>,
    },
    AugAssign {
        target: Box<SyntaxNode>,
        op: BinaryOperator,
        value: Box<SyntaxNode>,
    },
    FunctionDef {
        name: String,
        params: Vec<Parameter>,
        body: Vec<SyntaxNode>,
    },
    Return {
        value: Option<Box<SyntaxNode>>,
    },
    Pass,
    Import {
        names: Vec<Alias>,
    },

    // Expressions
    Literal {
        value: Literal,
    },
    Name {
        id: String,
    },
    BinOp {
        left: Box<SyntaxNode>,
        op: BinaryOperator,
        right: Box<SyntaxNode>,
    },
    UnaryOp {
        op: UnaryOperator,
        operand: Box<SyntaxNode>,
    },
    BoolOp {
        op: BoolOperator,
        values: Vec<SyntaxNode>,
    },
    Compare {
        left: Box<SyntaxNode>,
        ops: Vec<CompareOperator>,
        comparators: Vec<SyntaxNode>,
    },
    IfExp {
        test: Box<SyntaxNode>,
        body: Box<SyntaxNode>,
        orelse: Box<SyntaxNode>,
    },
    Call {
        func: Box<SyntaxNode>,
        args: Vec<SyntaxNode>,
        keywords: Vec<Keyword>,
    },
    Starred {
        value: Box<SyntaxNode>,
    },
    Attribute {
        value: Box<SyntaxNode>,
        attr: String,
    },
    Subscript {
        value: Box<SyntaxNode>,
        slice: Box<SyntaxNode>,
    },
    Slice {
        lower: Option<Box<SyntaxNode>>,
        upper: Option<Box<SyntaxNode>>,
        step: Option<Box<SyntaxNode>>,
    },
    List {
        elts: Vec<SyntaxNode>,
    },
    Tuple {
        elts: Vec<SyntaxNode>,
    },
    Set {
        elts: Vec<SyntaxNode>,
    },
    Dict {
        keys: Vec<SyntaxNode>,
        values: Vec<SyntaxNode>,
    },
}

/// Literal payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Str(String),
    /// `b"..."` contents.
    Bytes(Vec<u8>),
    /// `f"..."` template text, replacement fields kept verbatim.
    FString(String),
    Bool(bool),
    None,
}

impl Literal {
    /// Value-level equality: integers and floats compare numerically, booleans
    /// never equal numbers.
    pub fn value_eq(&self, other: &Literal) -> bool {
        match (self, other) {
            (Literal::Int(a), Literal::Float(b)) | (Literal::Float(b), Literal::Int(a)) => {
                (*a as f64) == *b
            }
            _ => self == other,
        }
    }
}

/// A keyword argument in a call; `arg` is `None` for `**mapping`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Keyword {
    pub arg: Option<String>,
    pub value: SyntaxNode,
    pub span: Span,
}

impl PartialEq for Keyword {
    fn eq(&self, other: &Self) -> bool {
        self.arg == other.arg && self.value == other.value
    }
}

/// How a parameter accepts its argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    PositionalOnly,
    PositionalOrKeyword,
    KeywordOnly,
    VarPositional,
    VarKeyword,
}

impl ParamKind {
    pub fn accepts_position(&self) -> bool {
        matches!(self, ParamKind::PositionalOnly | ParamKind::PositionalOrKeyword)
    }

    pub fn accepts_keyword(&self) -> bool {
        matches!(self, ParamKind::PositionalOrKeyword | ParamKind::KeywordOnly)
    }

    pub fn is_variadic(&self) -> bool {
        matches!(self, ParamKind::VarPositional | ParamKind::VarKeyword)
    }
}

impl Default for ParamKind {
    fn default() -> Self {
        ParamKind::PositionalOrKeyword
    }
}

/// A declared parameter of a `def` or of a known callee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub kind: ParamKind,
    pub default: Option<SyntaxNode>,
}

/// `import name as asname`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alias {
    pub name: String,
    pub asname: Option<String>,
}

// ============================================================================
// OPERATORS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mult,
    MatMult,
    Div,
    FloorDiv,
    Mod,
    Pow,
    LShift,
    RShift,
    BitOr,
    BitXor,
    BitAnd,
}

impl BinaryOperator {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let op = match symbol {
            "+" => BinaryOperator::Add,
            "-" => BinaryOperator::Sub,
            "*" => BinaryOperator::Mult,
            "@" => BinaryOperator::MatMult,
            "/" => BinaryOperator::Div,
            "//" => BinaryOperator::FloorDiv,
            "%" => BinaryOperator::Mod,
            "**" => BinaryOperator::Pow,
            "<<" => BinaryOperator::LShift,
            ">>" => BinaryOperator::RShift,
            "|" => BinaryOperator::BitOr,
            "^" => BinaryOperator::BitXor,
            "&" => BinaryOperator::BitAnd,
            _ => return None,
        };
        Some(op)
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mult => "*",
            BinaryOperator::MatMult => "@",
            BinaryOperator::Div => "/",
            BinaryOperator::FloorDiv => "//",
            BinaryOperator::Mod => "%",
            BinaryOperator::Pow => "**",
            BinaryOperator::LShift => "<<",
            BinaryOperator::RShift => ">>",
            BinaryOperator::BitOr => "|",
            BinaryOperator::BitXor => "^",
            BinaryOperator::BitAnd => "&",
        }
    }

    pub(crate) fn precedence(&self) -> u8 {
        match self {
            BinaryOperator::BitOr => unparse::PREC_BITOR,
            BinaryOperator::BitXor => unparse::PREC_BITXOR,
            BinaryOperator::BitAnd => unparse::PREC_BITAND,
            BinaryOperator::LShift | BinaryOperator::RShift => unparse::PREC_SHIFT,
            BinaryOperator::Add | BinaryOperator::Sub => unparse::PREC_ARITH,
            BinaryOperator::Mult
            | BinaryOperator::MatMult
            | BinaryOperator::Div
            | BinaryOperator::FloorDiv
            | BinaryOperator::Mod => unparse::PREC_TERM,
            BinaryOperator::Pow => unparse::PREC_POWER,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOperator {
    Not,
    Invert,
    UAdd,
    USub,
}

impl UnaryOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOperator::Not => "not",
            UnaryOperator::Invert => "~",
            UnaryOperator::UAdd => "+",
            UnaryOperator::USub => "-",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoolOperator {
    And,
    Or,
}

impl BoolOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            BoolOperator::And => "and",
            BoolOperator::Or => "or",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOperator {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    Is,
    IsNot,
    In,
    NotIn,
}

impl CompareOperator {
    /// Parses an operator token; inner whitespace of `not in` / `is not` is ignored.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let normalized = symbol.split_whitespace().collect::<Vec<_>>().join(" ");
        let op = match normalized.as_str() {
            "==" => CompareOperator::Eq,
            "!=" => CompareOperator::NotEq,
            "<" => CompareOperator::Lt,
            "<=" => CompareOperator::LtE,
            ">" => CompareOperator::Gt,
            ">=" => CompareOperator::GtE,
            "is" => CompareOperator::Is,
            "is not" => CompareOperator::IsNot,
            "in" => CompareOperator::In,
            "not in" => CompareOperator::NotIn,
            _ => return None,
        };
        Some(op)
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOperator::Eq => "==",
            CompareOperator::NotEq => "!=",
            CompareOperator::Lt => "<",
            CompareOperator::LtE => "<=",
            CompareOperator::Gt => ">",
            CompareOperator::GtE => ">=",
            CompareOperator::Is => "is",
            CompareOperator::IsNot => "is not",
            CompareOperator::In => "in",
            CompareOperator::NotIn => "not in",
        }
    }
}

// ============================================================================
// PUBLIC API IMPLEMENTATION
// ============================================================================

impl SyntaxNode {
    pub fn new(kind: NodeKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// The kind tag, e.g. `"Call"`.
    pub fn kind_name(&self) -> &'static str {
        self.kind.name()
    }

    /// Dotted name of a call's callee (`f`, `math.sqrt`), if it is a plain name chain.
    ///
    /// # Examples
    ///
    /// ```rust
    /// let call = treegrade::syntax::normalize("math.sqrt(2)").unwrap();
    /// assert_eq!(call.callee_name().as_deref(), Some("math.sqrt"));
    /// ```
    pub fn callee_name(&self) -> Option<String> {
        match &self.kind {
            NodeKind::Call { func, .. } => func.dotted_name(),
            _ => None,
        }
    }

    /// `a`, `a.b`, `a.b.c` for name / attribute chains.
    pub fn dotted_name(&self) -> Option<String> {
        match &self.kind {
            NodeKind::Name { id } => Some(id.clone()),
            NodeKind::Attribute { value, attr } => {
                value.dotted_name().map(|base| format!("{}.{}", base, attr))
            }
            _ => None,
        }
    }

    /// Short name for a callee in messages: the attribute name of `obj.method`,
    /// or the rendered expression otherwise.
    pub fn display_name(&self) -> String {
        match &self.kind {
            NodeKind::Name { id } => id.clone(),
            NodeKind::Attribute { attr, .. } => attr.clone(),
            _ => self.pretty(),
        }
    }

    pub fn is_call(&self) -> bool {
        matches!(self.kind, NodeKind::Call { .. })
    }

    /// Direct child nodes in source order. Keyword values and parameter
    /// defaults count as children.
    pub fn children(&self) -> Vec<&SyntaxNode> {
        match &self.kind {
            NodeKind::Module { body } => body.iter().collect(),
            NodeKind::ExprStmt { value }
            | NodeKind::Starred { value }
            | NodeKind::Attribute { value, .. } => vec![&**value],
            NodeKind::Assign { targets, value } => {
                targets.iter().chain(std::iter::once(&**value)).collect()
            }
            NodeKind::AugAssign { target, value, .. } => vec![&**target, &**value],
            NodeKind::FunctionDef { params, body, .. } => params
                .iter()
                .filter_map(|p| p.default.as_ref())
                .chain(body.iter())
                .collect(),
            NodeKind::Return { value } => value.iter().map(|v| &**v).collect(),
            NodeKind::Pass
            | NodeKind::Import { .. }
            | NodeKind::Literal { .. }
            | NodeKind::Name { .. } => vec![],
            NodeKind::BinOp { left, right, .. } => vec![&**left, &**right],
            NodeKind::UnaryOp { operand, .. } => vec![&**operand],
            NodeKind::BoolOp { values, .. } => values.iter().collect(),
            NodeKind::Compare {
                left, comparators, ..
            } => std::iter::once(&**left).chain(comparators.iter()).collect(),
            NodeKind::IfExp { test, body, orelse } => vec![&**body, &**test, &**orelse],
            NodeKind::Call {
                func,
                args,
                keywords,
            } => std::iter::once(&**func)
                .chain(args.iter())
                .chain(keywords.iter().map(|k| &k.value))
                .collect(),
            NodeKind::Subscript { value, slice } => vec![&**value, &**slice],
            NodeKind::Slice { lower, upper, step } => [lower, upper, step]
                .into_iter()
                .filter_map(|n| n.as_deref())
                .collect(),
            NodeKind::List { elts } | NodeKind::Tuple { elts } | NodeKind::Set { elts } => {
                elts.iter().collect()
            }
            NodeKind::Dict { keys, values } => keys
                .iter()
                .zip(values.iter())
                .flat_map(|(k, v)| [k, v])
                .collect(),
        }
    }

    /// This node and all of its descendants, parents before children.
    pub fn descendants(&self) -> Vec<&SyntaxNode> {
        let mut out = Vec::new();
        collect_preorder(self, &mut out);
        out
    }
}

fn collect_preorder<'a>(node: &'a SyntaxNode, out: &mut Vec<&'a SyntaxNode>) {
    out.push(node);
    for child in node.children() {
        collect_preorder(child, out);
    }
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Module { .. } => "Module",
            NodeKind::ExprStmt { .. } => "ExprStmt",
            NodeKind::Assign { .. } => "Assign",
            NodeKind::AugAssign { .. } => "AugAssign",
            NodeKind::FunctionDef { .. } => "FunctionDef",
            NodeKind::Return { .. } => "Return",
            NodeKind::Pass => "Pass",
            NodeKind::Import { .. } => "Import",
            NodeKind::Literal { .. } => "Literal",
            NodeKind::Name { .. } => "Name",
            NodeKind::BinOp { .. } => "BinOp",
            NodeKind::UnaryOp { .. } => "UnaryOp",
            NodeKind::BoolOp { .. } => "BoolOp",
            NodeKind::Compare { .. } => "Compare",
            NodeKind::IfExp { .. } => "IfExp",
            NodeKind::Call { .. } => "Call",
            NodeKind::Starred { .. } => "Starred",
            NodeKind::Attribute { .. } => "Attribute",
            NodeKind::Subscript { .. } => "Subscript",
            NodeKind::Slice { .. } => "Slice",
            NodeKind::List { .. } => "List",
            NodeKind::Tuple { .. } => "Tuple",
            NodeKind::Set { .. } => "Set",
            NodeKind::Dict { .. } => "Dict",
        }
    }
}

// ============================================================================
// MODULE EXPORTS
// ============================================================================

pub mod unparse;

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(value: Literal, start: usize) -> SyntaxNode {
        SyntaxNode::new(
            NodeKind::Literal { value },
            Span {
                start,
                end: start + 1,
                line: 1,
                column: start + 1,
            },
        )
    }

    #[test]
    fn test_equality_ignores_spans() {
        assert_eq!(lit(Literal::Int(1), 0), lit(Literal::Int(1), 7));
        assert_ne!(lit(Literal::Int(1), 0), lit(Literal::Int(2), 0));
    }

    #[test]
    fn test_numeric_literals_compare_by_value() {
        assert!(Literal::Int(1).value_eq(&Literal::Float(1.0)));
        assert!(!Literal::Bool(true).value_eq(&Literal::Int(1)));
        assert!(!Literal::Str("1".into()).value_eq(&Literal::Int(1)));
    }

    #[test]
    fn test_compare_operator_symbols_normalize_whitespace() {
        assert_eq!(
            CompareOperator::from_symbol("not   in"),
            Some(CompareOperator::NotIn)
        );
        assert_eq!(CompareOperator::from_symbol("is not"), Some(CompareOperator::IsNot));
        assert_eq!(CompareOperator::from_symbol("=<"), None);
    }

    #[test]
    fn test_span_to_covers_both() {
        let a = Span { start: 4, end: 6, line: 1, column: 5 };
        let b = Span { start: 0, end: 2, line: 1, column: 1 };
        let merged = a.to(b);
        assert_eq!((merged.start, merged.end, merged.column), (0, 6, 1));
    }

    #[test]
    fn test_descendants_walk_parents_first_in_source_order() {
        let tree = crate::syntax::normalize("f(a + 1, k=[b])").unwrap();
        let names: Vec<String> = tree.descendants().iter().map(|n| n.pretty()).collect();
        assert_eq!(names, vec!["f(a + 1, k=[b])", "f", "a + 1", "a", "1", "[b]", "b"]);
        assert_eq!(tree.children().len(), 3);
    }

    #[test]
    fn test_conditional_children_follow_source_order() {
        let tree = crate::syntax::normalize("x if c else y").unwrap();
        let names: Vec<String> = tree.children().iter().map(|n| n.pretty()).collect();
        assert_eq!(names, vec!["x", "c", "y"]);
    }
}
