//! Tree normalization.
//!
//! Two rewrites only: a module holding exactly one expression statement becomes
//! that expression, and expression statements inside `def` bodies become their
//! expressions. Everything else is left as parsed.

use crate::ast::{NodeKind, SyntaxNode};
use crate::GradeError;

use super::parser::parse_named;

/// Parse and normalize `source`.
///
/// # Examples
///
/// ```rust
/// let node = treegrade::syntax::normalize("1 + 2").unwrap();
/// assert_eq!(node.kind_name(), "BinOp");
/// ```
pub fn normalize(source: &str) -> Result<SyntaxNode, GradeError> {
    normalize_named("<input>", source)
}

/// Like [`normalize`], naming the source in diagnostics.
pub fn normalize_named(origin: &str, source: &str) -> Result<SyntaxNode, GradeError> {
    parse_named(origin, source).map(normalize_tree)
}

/// Normalize an already parsed tree.
pub fn normalize_tree(node: SyntaxNode) -> SyntaxNode {
    let SyntaxNode { kind, span } = node;
    match kind {
        NodeKind::Module { body } => {
            let mut body: Vec<SyntaxNode> = body.into_iter().map(normalize_statement).collect();
            if body.len() == 1 && matches!(body[0].kind, NodeKind::ExprStmt { .. }) {
                if let Some(NodeKind::ExprStmt { value }) = body.pop().map(|s| s.kind) {
                    return *value;
                }
            }
            SyntaxNode::new(NodeKind::Module { body }, span)
        }
        other => normalize_statement(SyntaxNode::new(other, span)),
    }
}

fn normalize_statement(node: SyntaxNode) -> SyntaxNode {
    let SyntaxNode { kind, span } = node;
    match kind {
        NodeKind::FunctionDef { name, params, body } => {
            let body = body.into_iter().map(unwrap_body_statement).collect();
            SyntaxNode::new(NodeKind::FunctionDef { name, params, body }, span)
        }
        other => SyntaxNode::new(other, span),
    }
}

fn unwrap_body_statement(node: SyntaxNode) -> SyntaxNode {
    match node.kind {
        NodeKind::ExprStmt { value } => *value,
        kind => normalize_statement(SyntaxNode::new(kind, node.span)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_expression_is_unwrapped() {
        assert_eq!(normalize("f(1)").unwrap().kind_name(), "Call");
    }

    #[test]
    fn test_multiple_statements_stay_a_module() {
        let node = normalize("x = 1\nx").unwrap();
        let NodeKind::Module { body } = node.kind else {
            panic!("expected module");
        };
        assert_eq!(body.len(), 2);
        assert_eq!(body[1].kind_name(), "ExprStmt");
    }

    #[test]
    fn test_def_body_expressions_are_unwrapped() {
        let node = normalize("def f(x):\n    print(x)\n    return x").unwrap();
        let NodeKind::Module { body } = node.kind else {
            panic!("expected module");
        };
        let NodeKind::FunctionDef { body, .. } = &body[0].kind else {
            panic!("expected def");
        };
        assert_eq!(body[0].kind_name(), "Call");
        assert_eq!(body[1].kind_name(), "Return");
    }

    #[test]
    fn test_parentheses_produce_no_nodes() {
        assert_eq!(normalize("((x))").unwrap(), normalize("x").unwrap());
    }

    #[test]
    fn test_spans_do_not_affect_equality() {
        assert_eq!(normalize("f( 1 )").unwrap(), normalize("f(1)").unwrap());
    }
}
