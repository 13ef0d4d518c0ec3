//! Guest-language parser.
//!
//! Converts source text into [`SyntaxNode`] trees with source location tracking.
//! The parser is purely syntactic; the only semantic check is Python's rule
//! that positional arguments may not follow keyword arguments.

use pest::{error::Error, iterators::Pair, Parser};
use pest_derive::Parser;

use crate::ast::{
    Alias, BinaryOperator, BoolOperator, CompareOperator, Keyword, Literal, NodeKind, ParamKind,
    Parameter, Span, SyntaxNode, UnaryOperator,
};
use crate::diagnostics::{to_error_source, SourceArc};
use crate::{err_ctx, GradeError};

#[derive(Parser)]
#[grammar = "syntax/grammar.pest"]
struct GuestParser;

// ============================================================================
// PUBLIC API
// ============================================================================

/// Parse source text into a `Module` node.
pub fn parse(source_text: &str) -> Result<SyntaxNode, GradeError> {
    parse_named("<input>", source_text)
}

/// Parse source text, naming the source in diagnostics (e.g. `student.py`).
pub fn parse_named(origin: &str, source_text: &str) -> Result<SyntaxNode, GradeError> {
    let source = to_error_source(origin, source_text);
    let mut pairs = GuestParser::parse(Rule::program, source_text)
        .map_err(|e| convert_parse_error(e, source_text, &source))?;

    let builder = Builder { source: &source };
    match pairs.next() {
        Some(program) => builder.program(program),
        None => Ok(SyntaxNode::new(
            NodeKind::Module { body: vec![] },
            Span::default(),
        )),
    }
}

// ============================================================================
// AST BUILDERS
// ============================================================================

struct Builder<'s> {
    source: &'s SourceArc,
}

impl<'s> Builder<'s> {
    fn program(&self, pair: Pair<Rule>) -> Result<SyntaxNode, GradeError> {
        let span = get_span(&pair);
        let body = significant(pair)
            .filter(|p| p.as_rule() != Rule::EOI)
            .map(|p| self.statement(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SyntaxNode::new(NodeKind::Module { body }, span))
    }

    fn statement(&self, pair: Pair<Rule>) -> Result<SyntaxNode, GradeError> {
        let span = get_span(&pair);
        let kind = match pair.as_rule() {
            Rule::pass_stmt => NodeKind::Pass,
            Rule::return_stmt => {
                let value = significant(pair)
                    .next()
                    .map(|p| self.expression(p).map(Box::new))
                    .transpose()?;
                NodeKind::Return { value }
            }
            Rule::import_stmt => {
                let names = significant(pair).map(build_alias).collect();
                NodeKind::Import { names }
            }
            Rule::aug_assign => {
                let mut inner = significant(pair);
                let target = self.expression(self.expect(&mut inner, "assignment target", span)?)?;
                let op_pair = self.expect(&mut inner, "augmented operator", span)?;
                let symbol = op_pair.as_str().trim_end_matches('=');
                let op = BinaryOperator::from_symbol(symbol).ok_or_else(|| {
                    self.error(format!("Unknown operator `{}=`", symbol), get_span(&op_pair))
                })?;
                let value = self.expression(self.expect(&mut inner, "assigned value", span)?)?;
                NodeKind::AugAssign {
                    target: Box::new(target),
                    op,
                    value: Box::new(value),
                }
            }
            Rule::assign => {
                let mut parts = significant(pair)
                    .map(|p| self.expression(p))
                    .collect::<Result<Vec<_>, _>>()?;
                let value = parts
                    .pop()
                    .ok_or_else(|| self.error("Assignment without a value", span))?;
                NodeKind::Assign {
                    targets: parts,
                    value: Box::new(value),
                }
            }
            Rule::expr_stmt => {
                let mut inner = significant(pair);
                let value = self.expression(self.expect(&mut inner, "expression", span)?)?;
                NodeKind::ExprStmt {
                    value: Box::new(value),
                }
            }
            Rule::function_def => self.function_def(pair)?,
            rule => {
                return Err(self.error(format!("Unsupported statement: {:?}", rule), span));
            }
        };
        Ok(SyntaxNode::new(kind, span))
    }

    fn function_def(&self, pair: Pair<Rule>) -> Result<NodeKind, GradeError> {
        let span = get_span(&pair);
        let mut name = None;
        let mut params = Vec::new();
        let mut body = Vec::new();
        for part in significant(pair) {
            match part.as_rule() {
                Rule::name => name = Some(part.as_str().to_string()),
                Rule::param_list => params = self.param_list(part)?,
                Rule::suite => {
                    body = significant(part)
                        .filter(|p| p.as_rule() != Rule::indent)
                        .map(|p| self.statement(p))
                        .collect::<Result<Vec<_>, _>>()?;
                }
                _ => {}
            }
        }
        let name = name.ok_or_else(|| self.error("Function definition without a name", span))?;
        Ok(NodeKind::FunctionDef { name, params, body })
    }

    fn param_list(&self, pair: Pair<Rule>) -> Result<Vec<Parameter>, GradeError> {
        let mut params: Vec<Parameter> = Vec::new();
        let mut keyword_only = false;
        for part in significant(pair) {
            let span = get_span(&part);
            match part.as_rule() {
                Rule::plain_param => {
                    let mut inner = significant(part);
                    let name = self.expect(&mut inner, "parameter name", span)?;
                    let default = inner.next().map(|p| self.expression(p)).transpose()?;
                    if default.is_none()
                        && !keyword_only
                        && params.iter().any(|p| p.kind.accepts_position() && p.default.is_some())
                    {
                        return Err(self.error(
                            "Non-default parameter follows default parameter",
                            span,
                        ));
                    }
                    params.push(Parameter {
                        name: name.as_str().to_string(),
                        kind: if keyword_only {
                            ParamKind::KeywordOnly
                        } else {
                            ParamKind::PositionalOrKeyword
                        },
                        default,
                    });
                }
                Rule::var_pos_param => {
                    let name = self.expect(&mut significant(part), "parameter name", span)?;
                    params.push(Parameter {
                        name: name.as_str().to_string(),
                        kind: ParamKind::VarPositional,
                        default: None,
                    });
                    keyword_only = true;
                }
                Rule::var_kw_param => {
                    let name = self.expect(&mut significant(part), "parameter name", span)?;
                    params.push(Parameter {
                        name: name.as_str().to_string(),
                        kind: ParamKind::VarKeyword,
                        default: None,
                    });
                }
                Rule::bare_star => keyword_only = true,
                Rule::slash => {
                    if keyword_only {
                        return Err(self.error("`/` must come before `*`", span));
                    }
                    for param in params.iter_mut() {
                        param.kind = ParamKind::PositionalOnly;
                    }
                }
                _ => {}
            }
        }
        Ok(params)
    }

    fn expression(&self, pair: Pair<Rule>) -> Result<SyntaxNode, GradeError> {
        let span = get_span(&pair);
        match pair.as_rule() {
            Rule::expression | Rule::slice_lower | Rule::slice_upper | Rule::slice_step => {
                let mut inner = significant(pair);
                let first = self.expect(&mut inner, "expression", span)?;
                self.expression(first)
            }
            Rule::expression_list | Rule::subscript_list => self.sequence_or_single(pair),
            Rule::conditional => {
                let parts = significant(pair).collect::<Vec<_>>();
                match <[_; 3]>::try_from(parts) {
                    Ok([body, test, orelse]) => Ok(SyntaxNode::new(
                        NodeKind::IfExp {
                            test: Box::new(self.expression(test)?),
                            body: Box::new(self.expression(body)?),
                            orelse: Box::new(self.expression(orelse)?),
                        },
                        span,
                    )),
                    Err(parts) => self.single(parts, span),
                }
            }
            Rule::or_test | Rule::and_test => {
                let op = if pair.as_rule() == Rule::or_test {
                    BoolOperator::Or
                } else {
                    BoolOperator::And
                };
                let parts = significant(pair).collect::<Vec<_>>();
                if parts.len() == 1 {
                    return self.single(parts, span);
                }
                let values = parts
                    .into_iter()
                    .map(|p| self.expression(p))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(SyntaxNode::new(NodeKind::BoolOp { op, values }, span))
            }
            Rule::not_test => {
                let parts = significant(pair).collect::<Vec<_>>();
                match parts.first().map(|p| p.as_rule()) {
                    Some(Rule::not_test) => {
                        let operand = self.single(parts, span)?;
                        Ok(SyntaxNode::new(
                            NodeKind::UnaryOp {
                                op: UnaryOperator::Not,
                                operand: Box::new(operand),
                            },
                            span,
                        ))
                    }
                    _ => self.single(parts, span),
                }
            }
            Rule::comparison => {
                let mut inner = significant(pair);
                let left = self.expression(self.expect(&mut inner, "comparison operand", span)?)?;
                let mut ops = Vec::new();
                let mut comparators = Vec::new();
                while let Some(op_pair) = inner.next() {
                    let op = CompareOperator::from_symbol(op_pair.as_str()).ok_or_else(|| {
                        self.error(
                            format!("Unknown comparison `{}`", op_pair.as_str()),
                            get_span(&op_pair),
                        )
                    })?;
                    let right = self.expect(&mut inner, "comparison operand", span)?;
                    ops.push(op);
                    comparators.push(self.expression(right)?);
                }
                if ops.is_empty() {
                    return Ok(left);
                }
                Ok(SyntaxNode::new(
                    NodeKind::Compare {
                        left: Box::new(left),
                        ops,
                        comparators,
                    },
                    span,
                ))
            }
            Rule::bit_or
            | Rule::bit_xor
            | Rule::bit_and
            | Rule::shift
            | Rule::arith
            | Rule::term => self.binary_chain(pair),
            Rule::factor => {
                let mut inner = significant(pair);
                let first = self.expect(&mut inner, "operand", span)?;
                if first.as_rule() != Rule::factor_op {
                    return self.expression(first);
                }
                let op = match first.as_str() {
                    "-" => UnaryOperator::USub,
                    "+" => UnaryOperator::UAdd,
                    _ => UnaryOperator::Invert,
                };
                let operand = self.expression(self.expect(&mut inner, "operand", span)?)?;
                Ok(SyntaxNode::new(
                    NodeKind::UnaryOp {
                        op,
                        operand: Box::new(operand),
                    },
                    span,
                ))
            }
            Rule::power => {
                let mut inner = significant(pair);
                let base = self.expression(self.expect(&mut inner, "operand", span)?)?;
                match inner.next() {
                    Some(exponent) => Ok(SyntaxNode::new(
                        NodeKind::BinOp {
                            left: Box::new(base),
                            op: BinaryOperator::Pow,
                            right: Box::new(self.expression(exponent)?),
                        },
                        span,
                    )),
                    None => Ok(base),
                }
            }
            Rule::primary => self.primary(pair),
            Rule::star_arg => {
                let mut inner = significant(pair);
                let value = self.expression(self.expect(&mut inner, "starred value", span)?)?;
                Ok(SyntaxNode::new(
                    NodeKind::Starred {
                        value: Box::new(value),
                    },
                    span,
                ))
            }
            Rule::slice => {
                let mut lower = None;
                let mut upper = None;
                let mut step = None;
                for part in significant(pair) {
                    let slot = match part.as_rule() {
                        Rule::slice_lower => &mut lower,
                        Rule::slice_upper => &mut upper,
                        _ => &mut step,
                    };
                    *slot = Some(Box::new(self.expression(part)?));
                }
                Ok(SyntaxNode::new(NodeKind::Slice { lower, upper, step }, span))
            }
            Rule::paren_form => self.sequence_or_single(pair),
            Rule::list_display | Rule::set_display => {
                let is_list = pair.as_rule() == Rule::list_display;
                let elts = significant(pair)
                    .map(|p| self.expression(p))
                    .collect::<Result<Vec<_>, _>>()?;
                let kind = if is_list {
                    NodeKind::List { elts }
                } else {
                    NodeKind::Set { elts }
                };
                Ok(SyntaxNode::new(kind, span))
            }
            Rule::dict_display => {
                let mut keys = Vec::new();
                let mut values = Vec::new();
                for entry in significant(pair) {
                    let entry_span = get_span(&entry);
                    let mut inner = significant(entry);
                    keys.push(self.expression(self.expect(&mut inner, "dict key", entry_span)?)?);
                    values.push(self.expression(self.expect(&mut inner, "dict value", entry_span)?)?);
                }
                Ok(SyntaxNode::new(NodeKind::Dict { keys, values }, span))
            }
            Rule::constant => {
                let value = match pair.as_str() {
                    "True" => Literal::Bool(true),
                    "False" => Literal::Bool(false),
                    _ => Literal::None,
                };
                Ok(SyntaxNode::new(NodeKind::Literal { value }, span))
            }
            Rule::number => {
                let value = self.number(pair.as_str(), span)?;
                Ok(SyntaxNode::new(NodeKind::Literal { value }, span))
            }
            Rule::strings => {
                let value = self.string_literal(pair)?;
                Ok(SyntaxNode::new(NodeKind::Literal { value }, span))
            }
            Rule::name => Ok(SyntaxNode::new(
                NodeKind::Name {
                    id: pair.as_str().to_string(),
                },
                span,
            )),
            rule => Err(self.error(format!("Unsupported expression: {:?}", rule), span)),
        }
    }

    fn primary(&self, pair: Pair<Rule>) -> Result<SyntaxNode, GradeError> {
        let span = get_span(&pair);
        let mut inner = significant(pair);
        let mut node = self.expression(self.expect(&mut inner, "expression", span)?)?;
        for trailer in inner {
            let trailer_span = node.span.to(get_span(&trailer));
            let kind = match trailer.as_rule() {
                Rule::call_args => {
                    let (args, keywords) = self.call_args(trailer)?;
                    NodeKind::Call {
                        func: Box::new(node),
                        args,
                        keywords,
                    }
                }
                Rule::subscription => {
                    let trailer_inner_span = get_span(&trailer);
                    let mut parts = significant(trailer);
                    let slice =
                        self.expression(self.expect(&mut parts, "subscript", trailer_inner_span)?)?;
                    NodeKind::Subscript {
                        value: Box::new(node),
                        slice: Box::new(slice),
                    }
                }
                Rule::attribute_ref => {
                    let attr_span = get_span(&trailer);
                    let attr = self.expect(&mut significant(trailer), "attribute name", attr_span)?;
                    NodeKind::Attribute {
                        value: Box::new(node),
                        attr: attr.as_str().to_string(),
                    }
                }
                rule => {
                    return Err(self.error(format!("Unsupported trailer: {:?}", rule), trailer_span))
                }
            };
            node = SyntaxNode::new(kind, trailer_span);
        }
        Ok(node)
    }

    fn call_args(&self, pair: Pair<Rule>) -> Result<(Vec<SyntaxNode>, Vec<Keyword>), GradeError> {
        let mut args = Vec::new();
        let mut keywords = Vec::new();
        for arg in significant(pair) {
            let span = get_span(&arg);
            match arg.as_rule() {
                Rule::keyword_arg => {
                    let mut inner = significant(arg);
                    let name = self.expect(&mut inner, "keyword name", span)?;
                    let value = self.expression(self.expect(&mut inner, "keyword value", span)?)?;
                    keywords.push(Keyword {
                        arg: Some(name.as_str().to_string()),
                        value,
                        span,
                    });
                }
                Rule::double_star_arg => {
                    let mut inner = significant(arg);
                    let value = self.expression(self.expect(&mut inner, "mapping", span)?)?;
                    keywords.push(Keyword {
                        arg: None,
                        value,
                        span,
                    });
                }
                Rule::star_arg => {
                    if keywords.iter().any(|k| k.arg.is_none()) {
                        return Err(self.error(
                            "Iterable argument unpacking follows keyword argument unpacking",
                            span,
                        ));
                    }
                    args.push(self.expression(arg)?);
                }
                _ => {
                    if !keywords.is_empty() {
                        let message = if keywords.iter().any(|k| k.arg.is_none()) {
                            "Positional argument follows keyword argument unpacking"
                        } else {
                            "Positional argument follows keyword argument"
                        };
                        return Err(self.error(message, span));
                    }
                    args.push(self.expression(arg)?);
                }
            }
        }
        Ok((args, keywords))
    }

    /// Left-folds `operand (op operand)*` into nested `BinOp`s.
    fn binary_chain(&self, pair: Pair<Rule>) -> Result<SyntaxNode, GradeError> {
        let span = get_span(&pair);
        let mut inner = significant(pair);
        let mut left = self.expression(self.expect(&mut inner, "operand", span)?)?;
        while let Some(op_pair) = inner.next() {
            let op = BinaryOperator::from_symbol(op_pair.as_str()).ok_or_else(|| {
                self.error(
                    format!("Unknown operator `{}`", op_pair.as_str()),
                    get_span(&op_pair),
                )
            })?;
            let right = self.expression(self.expect(&mut inner, "operand", span)?)?;
            let merged = left.span.to(right.span);
            left = SyntaxNode::new(
                NodeKind::BinOp {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                },
                merged,
            );
        }
        Ok(left)
    }

    /// `a, b` becomes a tuple; a lone element without a trailing comma stays itself.
    fn sequence_or_single(&self, pair: Pair<Rule>) -> Result<SyntaxNode, GradeError> {
        let span = get_span(&pair);
        let parts = significant(pair).collect::<Vec<_>>();
        let trailing = parts.iter().any(|p| p.as_rule() == Rule::trailing_comma);
        let mut elts = parts
            .into_iter()
            .filter(|p| p.as_rule() != Rule::trailing_comma)
            .map(|p| self.expression(p))
            .collect::<Result<Vec<_>, _>>()?;
        if elts.len() == 1 && !trailing {
            if let Some(only) = elts.pop() {
                return Ok(only);
            }
        }
        Ok(SyntaxNode::new(NodeKind::Tuple { elts }, span))
    }

    fn single(&self, parts: Vec<Pair<Rule>>, span: Span) -> Result<SyntaxNode, GradeError> {
        let mut parts = parts.into_iter();
        let first = self.expect(&mut parts, "expression", span)?;
        self.expression(first)
    }

    fn number(&self, text: &str, span: Span) -> Result<Literal, GradeError> {
        let digits: String = text.chars().filter(|c| *c != '_').collect();
        let lower = digits.to_ascii_lowercase();
        let radix = match lower.get(..2) {
            Some("0x") => Some(16),
            Some("0o") => Some(8),
            Some("0b") => Some(2),
            _ => None,
        };
        let invalid = || self.error(format!("Invalid number literal `{}`", text), span);
        if let Some(radix) = radix {
            let digits = lower.get(2..).unwrap_or("");
            if let Ok(n) = i64::from_str_radix(digits, radix) {
                return Ok(Literal::Int(n));
            }
            // Beyond i64, like decimal literals, keep the magnitude as a float.
            return digits
                .chars()
                .try_fold(0f64, |acc, c| {
                    c.to_digit(radix)
                        .map(|d| acc * f64::from(radix) + f64::from(d))
                })
                .filter(|_| !digits.is_empty())
                .map(Literal::Float)
                .ok_or_else(invalid);
        }
        if lower.contains(['.', 'e']) {
            return lower.parse::<f64>().map(Literal::Float).map_err(|_| invalid());
        }
        match lower.parse::<i64>() {
            Ok(n) => Ok(Literal::Int(n)),
            // Integers beyond i64 keep their magnitude as floats.
            Err(_) => lower.parse::<f64>().map(Literal::Float).map_err(|_| invalid()),
        }
    }

    /// Joins adjacent string pieces. One `f` piece makes the whole literal a
    /// template; `b` pieces only join other `b` pieces.
    fn string_literal(&self, pair: Pair<Rule>) -> Result<Literal, GradeError> {
        let span = get_span(&pair);
        let pieces = significant(pair)
            .map(|p| self.string_piece(p))
            .collect::<Result<Vec<_>, _>>()?;
        let bytes = pieces
            .iter()
            .filter(|p| p.prefix == StringPrefix::Bytes)
            .count();
        if bytes > 0 && bytes < pieces.len() {
            return Err(self.error("Cannot mix bytes and nonbytes literals", span));
        }
        if bytes > 0 {
            let mut out = Vec::new();
            for ch in pieces.iter().flat_map(|p| p.text.chars()) {
                let byte = u8::try_from(u32::from(ch))
                    .map_err(|_| self.error("Bytes escape out of range", span))?;
                out.push(byte);
            }
            return Ok(Literal::Bytes(out));
        }
        if pieces.iter().any(|p| p.prefix == StringPrefix::Format) {
            let template = pieces
                .iter()
                .map(|p| match p.prefix {
                    StringPrefix::Format => p.text.clone(),
                    _ => p.text.replace('{', "{{").replace('}', "}}"),
                })
                .collect();
            return Ok(Literal::FString(template));
        }
        Ok(Literal::Str(pieces.into_iter().map(|p| p.text).collect()))
    }

    fn string_piece(&self, pair: Pair<Rule>) -> Result<StringPiece, GradeError> {
        let span = get_span(&pair);
        let mut flags = String::new();
        let mut body = "";
        let mut quote_len = 1;
        for part in pair.into_inner() {
            match part.as_rule() {
                Rule::string_prefix => flags = part.as_str().to_ascii_lowercase(),
                Rule::triple_dq | Rule::triple_sq => {
                    body = part.as_str();
                    quote_len = 3;
                }
                _ => body = part.as_str(),
            }
        }
        let inner = body
            .get(quote_len..body.len().saturating_sub(quote_len))
            .unwrap_or("");
        let prefix = if flags.contains('b') {
            StringPrefix::Bytes
        } else if flags.contains('f') {
            StringPrefix::Format
        } else {
            StringPrefix::Text
        };
        if prefix == StringPrefix::Bytes && !inner.is_ascii() {
            return Err(self.error("Bytes can only contain ASCII literal characters", span));
        }
        let text = if flags.contains('r') {
            inner.to_string()
        } else {
            unescape_string(inner, prefix != StringPrefix::Bytes)
        };
        Ok(StringPiece { prefix, text })
    }

    fn expect<'i, I>(&self, inner: &mut I, what: &str, span: Span) -> Result<Pair<'i, Rule>, GradeError>
    where
        I: Iterator<Item = Pair<'i, Rule>>,
    {
        inner
            .next()
            .ok_or_else(|| self.error(format!("Missing {}", what), span))
    }

    fn error(&self, message: impl Into<String>, span: Span) -> GradeError {
        let message: String = message.into();
        err_ctx!(Parse, message, self.source, span)
    }
}

// ============================================================================
// UTILITIES
// ============================================================================

/// Inner pairs without keyword tokens.
fn significant(pair: Pair<Rule>) -> impl Iterator<Item = Pair<Rule>> {
    pair.into_inner().filter(|p| !is_keyword_token(p.as_rule()))
}

fn is_keyword_token(rule: Rule) -> bool {
    matches!(
        rule,
        Rule::kw_and
            | Rule::kw_as
            | Rule::kw_def
            | Rule::kw_else
            | Rule::kw_if
            | Rule::kw_import
            | Rule::kw_not
            | Rule::kw_or
            | Rule::kw_pass
            | Rule::kw_return
    )
}

fn get_span(pair: &Pair<Rule>) -> Span {
    let pest_span = pair.as_span();
    let (line, column) = pest_span.start_pos().line_col();
    Span {
        start: pest_span.start(),
        end: pest_span.end(),
        line,
        column,
    }
}

fn build_alias(pair: Pair<Rule>) -> Alias {
    let mut inner = significant(pair);
    let name = inner.next().map(|p| p.as_str().to_string()).unwrap_or_default();
    let asname = inner.next().map(|p| p.as_str().to_string());
    Alias { name, asname }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StringPrefix {
    Text,
    Bytes,
    Format,
}

struct StringPiece {
    prefix: StringPrefix,
    /// Decoded contents; for bytes, each char holds one byte value.
    text: String,
}

/// Decodes backslash escapes. `\N{...}`, `\u` and `\U` only apply to text
/// strings; in bytes they stay literal.
fn unescape_string(text: &str, unicode: bool) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some('a') => result.push('\u{07}'),
            Some('b') => result.push('\u{08}'),
            Some('f') => result.push('\u{0c}'),
            Some('v') => result.push('\u{0b}'),
            Some('\\') => result.push('\\'),
            Some('\'') => result.push('\''),
            Some('"') => result.push('"'),
            Some('\n') => {}
            Some(first @ '0'..='7') => {
                let mut value = octal_digit(first);
                for _ in 0..2 {
                    match chars.peek() {
                        Some(&next @ '0'..='7') => {
                            value = value * 8 + octal_digit(next);
                            chars.next();
                        }
                        _ => break,
                    }
                }
                // At most 0o777, always a valid scalar value.
                if let Some(decoded) = char::from_u32(value) {
                    result.push(decoded);
                }
            }
            Some(code @ ('x' | 'u' | 'U')) if code == 'x' || unicode => {
                let width = match code {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let hex: String = (0..width).filter_map(|_| chars.next()).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) if hex.len() == width => result.push(decoded),
                    _ => {
                        result.push('\\');
                        result.push(code);
                        result.push_str(&hex);
                    }
                }
            }
            Some('N') if unicode && chars.peek() == Some(&'{') => {
                chars.next();
                let mut name = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    name.push(c);
                }
                match unicode_names2::character(&name.to_ascii_uppercase()) {
                    Some(decoded) if closed => result.push(decoded),
                    _ => {
                        result.push_str("\\N{");
                        result.push_str(&name);
                        if closed {
                            result.push('}');
                        }
                    }
                }
            }
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
            None => result.push('\\'),
        }
    }

    result
}

fn octal_digit(c: char) -> u32 {
    u32::from(c) - u32::from('0')
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

fn convert_parse_error(error: Error<Rule>, text: &str, source: &SourceArc) -> GradeError {
    let (start, end) = match error.location {
        pest::error::InputLocation::Pos(pos) => (pos, pos),
        pest::error::InputLocation::Span((start, end)) => (start, end),
    };
    let (line, column) = match error.line_col {
        pest::error::LineColLocation::Pos(pos) => pos,
        pest::error::LineColLocation::Span(pos, _) => pos,
    };
    let span = Span {
        start,
        end,
        line,
        column,
    };

    let message = match unbalanced_delimiter(text) {
        Some(')') => "Missing closing parenthesis",
        Some(']') => "Missing closing bracket",
        Some('}') => "Missing closing brace",
        Some(_) => "Unmatched closing delimiter",
        None => "Syntax error",
    };
    let help = format!(
        "I couldn't understand this code at line {}, column {}.",
        line, column
    );
    err_ctx!(Parse, message, source, span, help)
}

/// The first delimiter problem in `text`, ignoring strings and comments: the
/// missing closer for an unclosed opener, or `!` for a stray closer.
fn unbalanced_delimiter(text: &str) -> Option<char> {
    let mut stack = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut comment = false;
    for ch in text.chars() {
        if comment {
            comment = ch != '\n';
            continue;
        }
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => quote = Some(ch),
            '#' => comment = true,
            '(' => stack.push(')'),
            '[' => stack.push(']'),
            '{' => stack.push('}'),
            ')' | ']' | '}' => {
                if stack.pop() != Some(ch) {
                    return Some('!');
                }
            }
            _ => {}
        }
    }
    stack.pop()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::ErrorType;

    fn body(source: &str) -> Vec<SyntaxNode> {
        match parse(source).unwrap().kind {
            NodeKind::Module { body } => body,
            other => panic!("expected module, got {:?}", other),
        }
    }

    fn expr(source: &str) -> SyntaxNode {
        match body(source).remove(0).kind {
            NodeKind::ExprStmt { value } => *value,
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(body("").is_empty());
        assert!(body("# only a comment\n").is_empty());
    }

    #[test]
    fn test_simple_number() {
        let node = expr("42");
        assert_eq!(
            node.kind,
            NodeKind::Literal {
                value: Literal::Int(42)
            }
        );
        assert_eq!(node.span.column, 1);
    }

    #[test]
    fn test_number_forms() {
        let lit = |s: &str| match expr(s).kind {
            NodeKind::Literal { value } => value,
            other => panic!("expected literal, got {:?}", other),
        };
        assert_eq!(lit("1_000"), Literal::Int(1000));
        assert_eq!(lit("0x1F"), Literal::Int(31));
        assert_eq!(lit("2.5"), Literal::Float(2.5));
        assert_eq!(lit("1e3"), Literal::Float(1000.0));
        assert_eq!(lit("0b1010"), Literal::Int(10));
        assert_eq!(lit("0xFFFFFFFFFFFFFFFFFF"), Literal::Float(4722366482869645213695.0));
    }

    #[test]
    fn test_binary_precedence_and_associativity() {
        assert_eq!(expr("1 + 2 * 3").pretty(), "1 + 2 * 3");
        match expr("1 - 2 - 3").kind {
            NodeKind::BinOp { left, .. } => assert!(matches!(left.kind, NodeKind::BinOp { .. })),
            other => panic!("expected binop, got {:?}", other),
        }
        match expr("2 ** 3 ** 2").kind {
            NodeKind::BinOp { right, .. } => {
                assert!(matches!(right.kind, NodeKind::BinOp { .. }))
            }
            other => panic!("expected binop, got {:?}", other),
        }
    }

    #[test]
    fn test_call_arguments() {
        match expr("f(1, *xs, b=2, **kw)").kind {
            NodeKind::Call { args, keywords, .. } => {
                assert_eq!(args.len(), 2);
                assert!(matches!(args[1].kind, NodeKind::Starred { .. }));
                assert_eq!(keywords.len(), 2);
                assert_eq!(keywords[0].arg.as_deref(), Some("b"));
                assert_eq!(keywords[1].arg, None);
            }
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_repeated_keyword_parses() {
        assert!(parse("f(a=1, a=2)").is_ok());
    }

    #[test]
    fn test_positional_after_keyword_fails() {
        let err = parse("f(a=1, 2)").unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Parse);
        assert!(err.to_string().contains("Positional argument follows keyword argument"));
    }

    #[test]
    fn test_strings() {
        assert_eq!(
            expr(r#"'a\'b' "c""#).kind,
            NodeKind::Literal {
                value: Literal::Str("a'bc".into())
            }
        );
        assert_eq!(
            expr(r#"r"\n""#).kind,
            NodeKind::Literal {
                value: Literal::Str("\\n".into())
            }
        );
    }

    fn literal(source: &str) -> Literal {
        match expr(source).kind {
            NodeKind::Literal { value } => value,
            other => panic!("expected literal, got {:?}", other),
        }
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(literal(r"'\101\0\7'"), Literal::Str("A\0\u{07}".into()));
        assert_eq!(literal(r"'\a\b\f\v'"), Literal::Str("\u{07}\u{08}\u{0c}\u{0b}".into()));
        assert_eq!(literal(r"'\x41\u00e9'"), Literal::Str("Aé".into()));
        assert_eq!(literal(r"'\N{LATIN SMALL LETTER E WITH ACUTE}'"), Literal::Str("é".into()));
        assert_eq!(literal(r"'\N{no such name}'"), Literal::Str(r"\N{no such name}".into()));
        assert_eq!(literal(r"'\q'"), Literal::Str(r"\q".into()));
        assert_eq!(literal(r"u'\101'"), Literal::Str("A".into()));
    }

    #[test]
    fn test_string_prefixes_are_kept() {
        assert_eq!(literal(r#"b"ab\x00""#), Literal::Bytes(vec![b'a', b'b', 0]));
        assert_eq!(literal(r#"b"\u0041""#), Literal::Bytes(br"\u0041".to_vec()));
        assert_eq!(literal(r#"rb"\n""#), Literal::Bytes(br"\n".to_vec()));
        assert_eq!(literal(r#"f"{x}""#), Literal::FString("{x}".into()));
        assert_eq!(literal(r#"'{a}' f"{b}""#), Literal::FString("{{a}}{b}".into()));
        assert_ne!(literal(r#"f"{x}""#), literal(r#""{x}""#));
        assert_ne!(literal(r#"b"abc""#), literal(r#""abc""#));
    }

    #[test]
    fn test_bytes_and_text_do_not_mix() {
        let err = parse(r#"b"a" "b""#).unwrap_err();
        assert!(err.to_string().contains("Cannot mix bytes and nonbytes literals"));
        assert!(parse("b'\u{e9}'").is_err());
    }

    #[test]
    fn test_comparisons_and_boolean_ops() {
        assert_eq!(expr("a not in b").pretty(), "a not in b");
        assert_eq!(expr("a is not None").pretty(), "a is not None");
        assert_eq!(expr("1 < x <= 3").pretty(), "1 < x <= 3");
        assert_eq!(expr("a or b and not c").pretty(), "a or b and not c");
        assert_eq!(expr("ident_in").pretty(), "ident_in");
    }

    #[test]
    fn test_statements() {
        let stmts = body("import math as m\nx = y = 2\nx += 1\nreturn x");
        let kinds: Vec<_> = stmts.iter().map(|s| s.kind_name()).collect();
        assert_eq!(kinds, vec!["Import", "Assign", "AugAssign", "Return"]);
    }

    #[test]
    fn test_function_def_parameters() {
        let stmts = body("def f(a, /, b, c=1, *args, d, e=2, **kw): pass");
        let NodeKind::FunctionDef { params, body, .. } = &stmts[0].kind else {
            panic!("expected def");
        };
        let kinds: Vec<_> = params.iter().map(|p| p.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ParamKind::PositionalOnly,
                ParamKind::PositionalOrKeyword,
                ParamKind::PositionalOrKeyword,
                ParamKind::VarPositional,
                ParamKind::KeywordOnly,
                ParamKind::KeywordOnly,
                ParamKind::VarKeyword,
            ]
        );
        assert_eq!(body.len(), 1);
    }

    #[test]
    fn test_indented_function_body() {
        let stmts = body("def f(x):\n    y = x\n\n    return y\nf(1)");
        assert_eq!(stmts.len(), 2);
        let NodeKind::FunctionDef { body, .. } = &stmts[0].kind else {
            panic!("expected def");
        };
        assert_eq!(body.len(), 2);
    }

    #[test]
    fn test_multiline_call() {
        assert_eq!(expr("f(1,\n  2)").pretty(), "f(1, 2)");
    }

    #[test]
    fn test_unmatched_paren() {
        let err = parse("(a + b").unwrap_err();
        assert!(err.to_string().contains("Missing closing parenthesis"));
    }

    #[test]
    fn test_incomplete_expression() {
        let err = parse("1 +").unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Parse);
    }
}
