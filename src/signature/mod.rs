//! Callee signatures.
//!
//! A [`SignatureTable`] maps callee names (`sum`, `math.sqrt`, `foo`) to their
//! declared parameters. Tables are persistent maps, so layering the signatures
//! harvested from a solution's `def`s over the built-in table is cheap and
//! leaves the base table untouched.
//!
//! ## Usage
//! ```rust
//! use treegrade::signature::build_default_signature_table;
//! let table = build_default_signature_table();
//! assert!(table.get("sum").is_some());
//! assert!(table.get("max").is_none());
//! ```

use std::sync::Arc;

use im::HashMap;

use crate::ast::{NodeKind, ParamKind, Parameter, SyntaxNode};
use crate::syntax::parse_named;
use crate::{err_msg, GradeError};

pub mod builtins;

pub use builtins::build_default_signature_table;

// ============================================================================
// SIGNATURE
// ============================================================================

/// Ordered parameter list of a callee.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub name: String,
    pub params: Vec<Parameter>,
}

impl Signature {
    pub fn new(name: impl Into<String>, params: Vec<Parameter>) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    /// Builds a signature from a Python parameter list such as
    /// `"iterable, /, start=0"`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use treegrade::signature::Signature;
    /// let sig = Signature::parse("sum", "iterable, /, start=0").unwrap();
    /// assert_eq!(sig.params.len(), 2);
    /// assert!(sig.params[1].default.is_some());
    /// ```
    pub fn parse(name: &str, params: &str) -> Result<Self, GradeError> {
        let source = format!("def _({}): pass", params);
        let module = parse_named(name, &source)
            .map_err(|e| err_msg!(Config, "Invalid parameter list for `{}`: ({})", name, params).with_cause(e))?;
        match module.kind {
            NodeKind::Module { mut body } if body.len() == 1 => match body.remove(0).kind {
                NodeKind::FunctionDef { params, .. } => Ok(Self::new(name, params)),
                _ => Err(err_msg!(Config, "Invalid parameter list for `{}`", name)),
            },
            _ => Err(err_msg!(Config, "Invalid parameter list for `{}`", name)),
        }
    }

    /// The signature declared by a `def` node.
    pub fn from_def(node: &SyntaxNode) -> Option<Self> {
        match &node.kind {
            NodeKind::FunctionDef { name, params, .. } => Some(Self::new(name.clone(), params.clone())),
            _ => None,
        }
    }

    pub fn param(&self, name: &str) -> Option<(usize, &Parameter)> {
        self.params.iter().enumerate().find(|(_, p)| p.name == name)
    }

    pub fn var_positional(&self) -> Option<(usize, &Parameter)> {
        self.params
            .iter()
            .enumerate()
            .find(|(_, p)| p.kind == ParamKind::VarPositional)
    }

    pub fn var_keyword(&self) -> Option<(usize, &Parameter)> {
        self.params
            .iter()
            .enumerate()
            .find(|(_, p)| p.kind == ParamKind::VarKeyword)
    }
}

// ============================================================================
// SIGNATURE TABLE
// ============================================================================

/// Persistent name → signature map.
#[derive(Debug, Clone, Default)]
pub struct SignatureTable {
    signatures: HashMap<String, Arc<Signature>>,
}

impl SignatureTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Signature> {
        self.signatures.get(name).map(|s| s.as_ref())
    }

    pub fn has(&self, name: &str) -> bool {
        self.signatures.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.signatures.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn register(&mut self, signature: Signature) {
        self.signatures
            .insert(signature.name.clone(), Arc::new(signature));
    }

    /// Registers `name(params)`; see [`Signature::parse`].
    pub fn register_source(&mut self, name: &str, params: &str) -> Result<(), GradeError> {
        self.register(Signature::parse(name, params)?);
        Ok(())
    }

    /// A new table where `other`'s entries shadow this table's.
    pub fn layered(&self, other: &SignatureTable) -> SignatureTable {
        SignatureTable {
            signatures: other.signatures.clone().union(self.signatures.clone()),
        }
    }

    /// A new table with every `def` found in `tree` layered on top.
    pub fn with_definitions(&self, tree: &SyntaxNode) -> SignatureTable {
        let mut table = self.clone();
        collect_definitions(tree, &mut table);
        table
    }

    /// Signature for a callee expression: the full dotted name first, then,
    /// for `obj.method`, a method entry registered as `.method`.
    ///
    /// Plain function entries never match a method call, so `df.sum(...)` does
    /// not bind against the built-in `sum`.
    pub fn resolve(&self, callee: &SyntaxNode) -> Option<&Signature> {
        if let Some(dotted) = callee.dotted_name() {
            if let Some(sig) = self.get(&dotted) {
                return Some(sig);
            }
        }
        match &callee.kind {
            NodeKind::Attribute { attr, .. } => self.get(&format!(".{}", attr)),
            _ => None,
        }
    }
}

fn collect_definitions(node: &SyntaxNode, table: &mut SignatureTable) {
    match &node.kind {
        NodeKind::Module { body } => body.iter().for_each(|s| collect_definitions(s, table)),
        NodeKind::FunctionDef { body, .. } => {
            if let Some(sig) = Signature::from_def(node) {
                table.register(sig);
            }
            body.iter().for_each(|s| collect_definitions(s, table));
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::normalize;

    #[test]
    fn test_parse_parameter_kinds() {
        let sig = Signature::parse("sorted", "iterable, /, *, key=None, reverse=False").unwrap();
        let kinds: Vec<_> = sig.params.iter().map(|p| p.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ParamKind::PositionalOnly,
                ParamKind::KeywordOnly,
                ParamKind::KeywordOnly
            ]
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Signature::parse("f", "a b").is_err());
    }

    #[test]
    fn test_definitions_shadow_base_table() {
        let base = build_default_signature_table();
        let tree = normalize("def sum(a, b=1): pass\nsum(1)").unwrap();
        let table = base.with_definitions(&tree);
        assert_eq!(table.get("sum").unwrap().params[0].name, "a");
        assert_eq!(base.get("sum").unwrap().params[0].name, "iterable");
    }

    #[test]
    fn test_resolve_dotted_then_method_entry() {
        let table = build_default_signature_table();
        let call = normalize("math.sqrt").unwrap();
        assert_eq!(table.resolve(&call).unwrap().name, "math.sqrt");
        let method = normalize("m.sqrt").unwrap();
        assert!(table.resolve(&method).is_none());
        let method = normalize("df.sum").unwrap();
        assert!(table.resolve(&method).is_none());

        let mut custom = SignatureTable::new();
        custom.register_source("append", "item").unwrap();
        let method = normalize("xs.append").unwrap();
        assert!(custom.resolve(&method).is_none());
        custom.register_source(".append", "item").unwrap();
        assert_eq!(custom.resolve(&method).unwrap().name, ".append");
        assert!(custom.resolve(&normalize("append").unwrap()).is_none());
    }

    #[test]
    fn test_layered_prefers_overlay() {
        let mut base = SignatureTable::new();
        base.register_source("f", "a").unwrap();
        let mut overlay = SignatureTable::new();
        overlay.register_source("f", "x, y").unwrap();
        let merged = base.layered(&overlay);
        assert_eq!(merged.get("f").unwrap().params.len(), 2);
    }
}
