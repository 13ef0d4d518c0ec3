//! Renders syntax trees back to guest-language source.
//!
//! Output is canonical rather than faithful: parentheses appear only where
//! precedence requires them and strings always use double quotes.

use std::fmt;

use super::{Keyword, Literal, NodeKind, ParamKind, Parameter, SyntaxNode};

pub(crate) const PREC_TEST: u8 = 1;
pub(crate) const PREC_OR: u8 = 2;
pub(crate) const PREC_AND: u8 = 3;
pub(crate) const PREC_NOT: u8 = 4;
pub(crate) const PREC_CMP: u8 = 5;
pub(crate) const PREC_BITOR: u8 = 6;
pub(crate) const PREC_BITXOR: u8 = 7;
pub(crate) const PREC_BITAND: u8 = 8;
pub(crate) const PREC_SHIFT: u8 = 9;
pub(crate) const PREC_ARITH: u8 = 10;
pub(crate) const PREC_TERM: u8 = 11;
pub(crate) const PREC_FACTOR: u8 = 12;
pub(crate) const PREC_POWER: u8 = 13;
pub(crate) const PREC_ATOM: u8 = 16;

impl SyntaxNode {
    /// Pretty-prints the node as guest source.
    ///
    /// # Examples
    ///
    /// ```rust
    /// let node = treegrade::syntax::normalize("f( 1,b = 'x' )").unwrap();
    /// assert_eq!(node.pretty(), "f(1, b=\"x\")");
    /// ```
    pub fn pretty(&self) -> String {
        self.to_string()
    }

    fn precedence(&self) -> u8 {
        match &self.kind {
            NodeKind::IfExp { .. } => PREC_TEST,
            NodeKind::BoolOp { op, .. } => match op {
                super::BoolOperator::Or => PREC_OR,
                super::BoolOperator::And => PREC_AND,
            },
            NodeKind::UnaryOp { op, .. } => match op {
                super::UnaryOperator::Not => PREC_NOT,
                _ => PREC_FACTOR,
            },
            NodeKind::Compare { .. } => PREC_CMP,
            NodeKind::BinOp { op, .. } => op.precedence(),
            NodeKind::Starred { .. } => PREC_BITOR,
            _ => PREC_ATOM,
        }
    }
}

impl fmt::Display for SyntaxNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            NodeKind::Module { body } => write_joined(f, body, "\n"),
            NodeKind::ExprStmt { value } => write!(f, "{}", value),
            NodeKind::Assign { targets, value } => {
                for target in targets {
                    write!(f, "{} = ", target)?;
                }
                write!(f, "{}", value)
            }
            NodeKind::AugAssign { target, op, value } => {
                write!(f, "{} {}= {}", target, op.symbol(), value)
            }
            NodeKind::FunctionDef { name, params, body } => {
                write!(f, "def {}(", name)?;
                write_params(f, params)?;
                write!(f, "): ")?;
                write_joined(f, body, "; ")
            }
            NodeKind::Return { value } => match value {
                Some(value) => write!(f, "return {}", value),
                None => write!(f, "return"),
            },
            NodeKind::Pass => write!(f, "pass"),
            NodeKind::Import { names } => {
                write!(f, "import ")?;
                for (i, alias) in names.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", alias.name)?;
                    if let Some(asname) = &alias.asname {
                        write!(f, " as {}", asname)?;
                    }
                }
                Ok(())
            }
            NodeKind::Literal { value } => write_literal(f, value),
            NodeKind::Name { id } => write!(f, "{}", id),
            NodeKind::BinOp { left, op, right } => {
                let prec = op.precedence();
                // `**` is right-associative, everything else left-associative.
                let (left_min, right_min) = if prec == PREC_POWER {
                    (prec + 1, prec)
                } else {
                    (prec, prec + 1)
                };
                write_operand(f, left, left_min)?;
                write!(f, " {} ", op.symbol())?;
                write_operand(f, right, right_min)
            }
            NodeKind::UnaryOp { op, operand } => {
                let prec = self.precedence();
                match op {
                    super::UnaryOperator::Not => write!(f, "not ")?,
                    _ => write!(f, "{}", op.symbol())?,
                }
                write_operand(f, operand, prec)
            }
            NodeKind::BoolOp { op, values } => {
                let prec = self.precedence();
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, " {} ", op.symbol())?;
                    }
                    write_operand(f, value, prec + 1)?;
                }
                Ok(())
            }
            NodeKind::Compare {
                left,
                ops,
                comparators,
            } => {
                write_operand(f, left, PREC_CMP + 1)?;
                for (op, comparator) in ops.iter().zip(comparators) {
                    write!(f, " {} ", op.symbol())?;
                    write_operand(f, comparator, PREC_CMP + 1)?;
                }
                Ok(())
            }
            NodeKind::IfExp { test, body, orelse } => {
                write_operand(f, body, PREC_TEST + 1)?;
                write!(f, " if ")?;
                write_operand(f, test, PREC_TEST + 1)?;
                write!(f, " else ")?;
                write_operand(f, orelse, PREC_TEST)
            }
            NodeKind::Call {
                func,
                args,
                keywords,
            } => {
                write_operand(f, func, PREC_ATOM)?;
                write!(f, "(")?;
                write_joined(f, args, ", ")?;
                for (i, keyword) in keywords.iter().enumerate() {
                    if i > 0 || !args.is_empty() {
                        write!(f, ", ")?;
                    }
                    write_keyword(f, keyword)?;
                }
                write!(f, ")")
            }
            NodeKind::Starred { value } => {
                write!(f, "*")?;
                write_operand(f, value, PREC_ATOM)
            }
            NodeKind::Attribute { value, attr } => {
                write_operand(f, value, PREC_ATOM)?;
                write!(f, ".{}", attr)
            }
            NodeKind::Subscript { value, slice } => {
                write_operand(f, value, PREC_ATOM)?;
                match &slice.kind {
                    NodeKind::Tuple { elts } if !elts.is_empty() => {
                        write!(f, "[")?;
                        write_joined(f, elts, ", ")?;
                        write!(f, "]")
                    }
                    _ => write!(f, "[{}]", slice),
                }
            }
            NodeKind::Slice { lower, upper, step } => {
                if let Some(lower) = lower {
                    write!(f, "{}", lower)?;
                }
                write!(f, ":")?;
                if let Some(upper) = upper {
                    write!(f, "{}", upper)?;
                }
                if let Some(step) = step {
                    write!(f, ":{}", step)?;
                }
                Ok(())
            }
            NodeKind::List { elts } => {
                write!(f, "[")?;
                write_joined(f, elts, ", ")?;
                write!(f, "]")
            }
            NodeKind::Tuple { elts } => {
                write!(f, "(")?;
                write_joined(f, elts, ", ")?;
                if elts.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
            NodeKind::Set { elts } => {
                if elts.is_empty() {
                    return write!(f, "set()");
                }
                write!(f, "{{")?;
                write_joined(f, elts, ", ")?;
                write!(f, "}}")
            }
            NodeKind::Dict { keys, values } => {
                write!(f, "{{")?;
                for (i, (key, value)) in keys.iter().zip(values).enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

fn write_operand(f: &mut fmt::Formatter<'_>, node: &SyntaxNode, min_prec: u8) -> fmt::Result {
    if node.precedence() < min_prec {
        write!(f, "({})", node)
    } else {
        write!(f, "{}", node)
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, nodes: &[SyntaxNode], sep: &str) -> fmt::Result {
    for (i, node) in nodes.iter().enumerate() {
        if i > 0 {
            write!(f, "{}", sep)?;
        }
        write!(f, "{}", node)?;
    }
    Ok(())
}

fn write_keyword(f: &mut fmt::Formatter<'_>, keyword: &Keyword) -> fmt::Result {
    match &keyword.arg {
        Some(name) => write!(f, "{}={}", name, keyword.value),
        None => {
            write!(f, "**")?;
            write_operand(f, &keyword.value, PREC_ATOM)
        }
    }
}

pub(crate) fn write_params(f: &mut fmt::Formatter<'_>, params: &[Parameter]) -> fmt::Result {
    let has_var_positional = params.iter().any(|p| p.kind == ParamKind::VarPositional);
    let mut first = true;
    let mut emitted_star = false;
    let mut sep = |f: &mut fmt::Formatter<'_>| -> fmt::Result {
        if !first {
            write!(f, ", ")?;
        }
        first = false;
        Ok(())
    };
    for (i, param) in params.iter().enumerate() {
        if param.kind == ParamKind::KeywordOnly && !has_var_positional && !emitted_star {
            sep(f)?;
            write!(f, "*")?;
            emitted_star = true;
        }
        sep(f)?;
        match param.kind {
            ParamKind::VarPositional => write!(f, "*{}", param.name)?,
            ParamKind::VarKeyword => write!(f, "**{}", param.name)?,
            _ => write!(f, "{}", param.name)?,
        }
        if let Some(default) = &param.default {
            write!(f, "={}", default)?;
        }
        let next_is_positional_only = params
            .get(i + 1)
            .map_or(false, |next| next.kind == ParamKind::PositionalOnly);
        if param.kind == ParamKind::PositionalOnly && !next_is_positional_only {
            sep(f)?;
            write!(f, "/")?;
        }
    }
    Ok(())
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ParamKind::VarPositional => write!(f, "*{}", self.name)?,
            ParamKind::VarKeyword => write!(f, "**{}", self.name)?,
            _ => write!(f, "{}", self.name)?,
        }
        match &self.default {
            Some(default) => write!(f, "={}", default),
            None => Ok(()),
        }
    }
}

fn write_literal(f: &mut fmt::Formatter<'_>, literal: &Literal) -> fmt::Result {
    match literal {
        Literal::Int(n) => write!(f, "{}", n),
        Literal::Float(x) if x.is_infinite() => write!(f, "{}", if *x > 0.0 { "inf" } else { "-inf" }),
        Literal::Float(x) => write!(f, "{:?}", x),
        Literal::Str(s) => write!(f, "\"{}\"", escape(s)),
        Literal::Bytes(bytes) => write!(f, "b\"{}\"", escape_bytes(bytes)),
        Literal::FString(s) => write!(f, "f\"{}\"", escape(s)),
        Literal::Bool(true) => write!(f, "True"),
        Literal::Bool(false) => write!(f, "False"),
        Literal::None => write!(f, "None"),
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

fn escape_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &byte in bytes {
        match byte {
            b'\\' => out.push_str("\\\\"),
            b'"' => out.push_str("\\\""),
            b'\n' => out.push_str("\\n"),
            b'\t' => out.push_str("\\t"),
            b'\r' => out.push_str("\\r"),
            0x20..=0x7e => out.push(char::from(byte)),
            other => out.push_str(&format!("\\x{:02x}", other)),
        }
    }
    out
}
