//! Call argument standardization.
//!
//! Rewrites the arguments of a call into a parameter-keyed mapping so that
//! `f(1, b=2)`, `f(a=1, b=2)` and `f(b=2, a=1)` all look alike. Arguments that
//! cannot be bound are kept as leftovers, in call order.

use serde::Serialize;

use crate::ast::{Keyword, NodeKind, ParamKind, Span, SyntaxNode};
use crate::signature::Signature;
use crate::{err_msg, GradeError};

/// One parameter and the value it received.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundArgument {
    pub name: String,
    /// Index of the parameter in the signature, for parameters that take a position.
    pub position: Option<usize>,
    pub value: SyntaxNode,
    /// Filled from the parameter's default rather than passed by the caller.
    pub defaulted: bool,
    #[serde(skip)]
    kind: ParamKind,
}

impl BoundArgument {
    pub fn kind(&self) -> ParamKind {
        self.kind
    }
}

/// A positional argument that no parameter accepted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeftoverArgument {
    /// Index among the call's positional arguments.
    pub position: usize,
    pub value: SyntaxNode,
}

/// A second binding for an already bound parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepeatedArgument {
    pub name: String,
    pub value: SyntaxNode,
}

/// Canonical view of a call's arguments.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CallArguments {
    pub bound: Vec<BoundArgument>,
    pub leftover_args: Vec<LeftoverArgument>,
    pub leftover_keywords: Vec<Keyword>,
    pub repeated: Vec<RepeatedArgument>,
}

impl CallArguments {
    pub fn get(&self, name: &str) -> Option<&BoundArgument> {
        self.bound.iter().find(|b| b.name == name)
    }

    /// Rebuilds a call with `func` as callee. Standardizing the result under the
    /// same signature reproduces `self`.
    pub fn to_call(&self, func: SyntaxNode) -> SyntaxNode {
        let span = func.span;
        let mut args = Vec::new();
        let mut keywords = Vec::new();
        let mut positional = true;

        for bound in &self.bound {
            if bound.defaulted {
                positional = false;
                continue;
            }
            match bound.kind {
                ParamKind::PositionalOnly => args.push(bound.value.clone()),
                ParamKind::PositionalOrKeyword if positional => args.push(bound.value.clone()),
                ParamKind::VarPositional => match &bound.value.kind {
                    NodeKind::Tuple { elts } => args.extend(elts.iter().cloned()),
                    _ => args.push(bound.value.clone()),
                },
                _ => keywords.push(Keyword {
                    arg: Some(bound.name.clone()),
                    value: bound.value.clone(),
                    span: bound.value.span,
                }),
            }
        }

        args.extend(self.leftover_args.iter().map(|l| l.value.clone()));
        keywords.extend(self.leftover_keywords.iter().cloned());
        keywords.extend(self.repeated.iter().map(|r| Keyword {
            arg: Some(r.name.clone()),
            value: r.value.clone(),
            span: r.value.span,
        }));

        SyntaxNode::new(
            NodeKind::Call {
                func: Box::new(func),
                args,
                keywords,
            },
            span,
        )
    }
}

/// Standardize the arguments of `call` under `signature`.
///
/// # Examples
///
/// ```rust
/// use treegrade::compare::standardize::standardize;
/// use treegrade::signature::Signature;
/// use treegrade::syntax::normalize;
///
/// let sig = Signature::parse("f", "a, b").unwrap();
/// let one = standardize(&normalize("f(b=2, a=1)").unwrap(), Some(&sig)).unwrap();
/// let two = standardize(&normalize("f(1, 2)").unwrap(), Some(&sig)).unwrap();
/// assert_eq!(one.get("a").unwrap().value, two.get("a").unwrap().value);
/// ```
pub fn standardize(call: &SyntaxNode, signature: Option<&Signature>) -> Result<CallArguments, GradeError> {
    let (args, keywords) = match &call.kind {
        NodeKind::Call { args, keywords, .. } => (args, keywords),
        _ => {
            return Err(err_msg!(
                Internal,
                "Call node expected for argument standardization, found {}",
                call.kind_name()
            ))
        }
    };

    match signature {
        Some(signature) => Ok(bind(signature, args, keywords, call.span)),
        None => Ok(unbound(args, keywords)),
    }
}

fn unbound(args: &[SyntaxNode], keywords: &[Keyword]) -> CallArguments {
    let mut out = CallArguments {
        leftover_args: args
            .iter()
            .enumerate()
            .map(|(position, value)| LeftoverArgument {
                position,
                value: value.clone(),
            })
            .collect(),
        ..CallArguments::default()
    };
    for keyword in keywords {
        let seen = keyword.arg.is_some()
            && out.leftover_keywords.iter().any(|k| k.arg == keyword.arg);
        match (&keyword.arg, seen) {
            (Some(name), true) => out.repeated.push(RepeatedArgument {
                name: name.clone(),
                value: keyword.value.clone(),
            }),
            _ => out.leftover_keywords.push(keyword.clone()),
        }
    }
    out
}

fn bind(signature: &Signature, args: &[SyntaxNode], keywords: &[Keyword], call_span: Span) -> CallArguments {
    let mut out = CallArguments::default();
    // Slot per parameter, in declared order; `**kwargs` entries are collected
    // separately and spliced in at the var-keyword parameter's position.
    let mut slots: Vec<Option<SyntaxNode>> = vec![None; signature.params.len()];
    let mut extra_keywords: Vec<(String, SyntaxNode)> = Vec::new();

    let positional_params: Vec<usize> = signature
        .params
        .iter()
        .enumerate()
        .filter(|(_, p)| p.kind.accepts_position())
        .map(|(i, _)| i)
        .collect();
    let var_positional = signature.var_positional().map(|(i, _)| i);
    let mut var_values: Vec<SyntaxNode> = Vec::new();

    let mut stopped = false;
    for (position, arg) in args.iter().enumerate() {
        if matches!(arg.kind, NodeKind::Starred { .. }) {
            stopped = true;
        }
        if stopped {
            out.leftover_args.push(LeftoverArgument {
                position,
                value: arg.clone(),
            });
            continue;
        }
        match positional_params.get(position) {
            Some(&index) => slots[index] = Some(arg.clone()),
            None if var_positional.is_some() => var_values.push(arg.clone()),
            None => out.leftover_args.push(LeftoverArgument {
                position,
                value: arg.clone(),
            }),
        }
    }

    let var_keyword = signature.var_keyword().is_some();
    for keyword in keywords {
        let name = match &keyword.arg {
            Some(name) => name,
            None => {
                out.leftover_keywords.push(keyword.clone());
                continue;
            }
        };
        match signature.param(name) {
            Some((index, param)) if param.kind.accepts_keyword() => {
                if slots[index].is_some() {
                    out.repeated.push(RepeatedArgument {
                        name: name.clone(),
                        value: keyword.value.clone(),
                    });
                } else {
                    slots[index] = Some(keyword.value.clone());
                }
            }
            Some((_, param)) if param.kind == ParamKind::PositionalOnly && !var_keyword => {
                out.leftover_keywords.push(keyword.clone());
            }
            _ if var_keyword => {
                if extra_keywords.iter().any(|(n, _)| n == name) {
                    out.repeated.push(RepeatedArgument {
                        name: name.clone(),
                        value: keyword.value.clone(),
                    });
                } else {
                    extra_keywords.push((name.clone(), keyword.value.clone()));
                }
            }
            _ => out.leftover_keywords.push(keyword.clone()),
        }
    }

    for (index, param) in signature.params.iter().enumerate() {
        let position = param.kind.accepts_position().then_some(index);
        match param.kind {
            ParamKind::VarPositional => {
                let span = match (var_values.first(), var_values.last()) {
                    (Some(first), Some(last)) => first.span.to(last.span),
                    _ => call_span,
                };
                let defaulted = var_values.is_empty();
                out.bound.push(BoundArgument {
                    name: param.name.clone(),
                    position: Some(index),
                    value: SyntaxNode::new(
                        NodeKind::Tuple {
                            elts: std::mem::take(&mut var_values),
                        },
                        span,
                    ),
                    defaulted,
                    kind: param.kind,
                });
            }
            ParamKind::VarKeyword => {
                for (name, value) in extra_keywords.drain(..) {
                    out.bound.push(BoundArgument {
                        name,
                        position: None,
                        value,
                        defaulted: false,
                        kind: param.kind,
                    });
                }
            }
            _ => {
                let (value, defaulted) = match (slots[index].take(), &param.default) {
                    (Some(value), _) => (value, false),
                    (None, Some(default)) => (default.clone(), true),
                    (None, None) => continue,
                };
                out.bound.push(BoundArgument {
                    name: param.name.clone(),
                    position,
                    value,
                    defaulted,
                    kind: param.kind,
                });
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::normalize;

    fn std_under(params: &str, call: &str) -> CallArguments {
        let sig = Signature::parse("f", params).unwrap();
        standardize(&normalize(call).unwrap(), Some(&sig)).unwrap()
    }

    fn names(args: &CallArguments) -> Vec<(&str, String, bool)> {
        args.bound
            .iter()
            .map(|b| (b.name.as_str(), b.value.pretty(), b.defaulted))
            .collect()
    }

    #[test]
    fn test_keyword_order_is_irrelevant() {
        assert_eq!(std_under("a, b", "f(a=1, b=2)"), std_under("a, b", "f(b=2, a=1)"));
        assert_eq!(
            names(&std_under("a, b", "f(1, b=2)")),
            vec![("a", "1".into(), false), ("b", "2".into(), false)]
        );
    }

    #[test]
    fn test_defaults_are_filled_and_marked() {
        let args = std_under("a, b=1", "f(2)");
        assert_eq!(names(&args), vec![("a", "2".into(), false), ("b", "1".into(), true)]);
    }

    #[test]
    fn test_missing_required_is_not_flagged() {
        let args = std_under("a, b", "f(1)");
        assert_eq!(names(&args), vec![("a", "1".into(), false)]);
        assert!(args.leftover_args.is_empty());
    }

    #[test]
    fn test_repeated_positional_and_keyword() {
        let args = std_under("a, b=0", "f(1, a=2)");
        assert_eq!(args.repeated.len(), 1);
        assert_eq!(args.repeated[0].name, "a");
        assert_eq!(args.get("a").unwrap().value.pretty(), "1");
    }

    #[test]
    fn test_repeated_keyword() {
        let args = std_under("a", "f(a=1, a=2)");
        assert_eq!(args.repeated[0].value.pretty(), "2");
    }

    #[test]
    fn test_var_positional_collects_tuple() {
        let args = std_under("a, *rest", "f(1, 2, 3)");
        assert_eq!(args.get("rest").unwrap().value.pretty(), "(2, 3)");
        let empty = std_under("a, *rest", "f(1)");
        assert!(empty.get("rest").unwrap().defaulted);
    }

    #[test]
    fn test_var_keyword_binds_individually() {
        let args = std_under("a, **kw", "f(1, x=2, y=3)");
        assert_eq!(
            names(&args),
            vec![("a", "1".into(), false), ("x", "2".into(), false), ("y", "3".into(), false)]
        );
    }

    #[test]
    fn test_positional_only_keyword_is_leftover() {
        let args = std_under("x, /", "f(x=1)");
        assert!(args.bound.is_empty());
        assert_eq!(args.leftover_keywords.len(), 1);
    }

    #[test]
    fn test_excess_and_unknown_become_leftovers() {
        let args = std_under("a", "f(1, 2, z=3)");
        assert_eq!(args.leftover_args[0].position, 1);
        assert_eq!(args.leftover_keywords[0].arg.as_deref(), Some("z"));
    }

    #[test]
    fn test_starred_stops_positional_binding() {
        let args = std_under("a, b, c", "f(1, *xs, 3)");
        assert_eq!(names(&args), vec![("a", "1".into(), false)]);
        assert_eq!(args.leftover_args.len(), 2);
    }

    #[test]
    fn test_without_signature_everything_is_leftover() {
        let args = standardize(&normalize("max(a, b, key=k, key=j)").unwrap(), None).unwrap();
        assert!(args.bound.is_empty());
        assert_eq!(args.leftover_args.len(), 2);
        assert_eq!(args.leftover_keywords.len(), 1);
        assert_eq!(args.repeated[0].name, "key");
    }

    #[test]
    fn test_non_call_is_internal_error() {
        let err = standardize(&normalize("x").unwrap(), None).unwrap_err();
        assert_eq!(err.error_type(), crate::diagnostics::ErrorType::Internal);
    }

    #[test]
    fn test_to_call_is_idempotent() {
        let cases = [
            ("a, b=1, c=2", "f(1, c=3)"),
            ("a, *rest, k=0, **kw", "f(1, 2, 3, k=4, z=5)"),
            ("x, /, y=0", "f(1, x=2, y=3, y=4)"),
            ("a, b", "f(1, *xs, 3, **m)"),
        ];
        for (params, call) in cases {
            let sig = Signature::parse("f", params).unwrap();
            let node = normalize(call).unwrap();
            let first = standardize(&node, Some(&sig)).unwrap();
            let NodeKind::Call { func, .. } = node.kind else {
                panic!("expected call");
            };
            let rebuilt = first.to_call(*func);
            let second = standardize(&rebuilt, Some(&sig)).unwrap();
            assert_eq!(first, second, "not idempotent for {}", call);
        }
    }
}
