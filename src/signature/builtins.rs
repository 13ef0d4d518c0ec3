//! Built-in signature table for common Python callables.
//!
//! `max`, `min` and friends whose real signatures cannot be written as a plain
//! parameter list are deliberately absent; calls to them are compared
//! positionally.

use once_cell::sync::Lazy;

use super::SignatureTable;

static DEFAULT_TABLE: Lazy<SignatureTable> = Lazy::new(|| {
    let mut table = SignatureTable::new();
    register_builtins(&mut table);
    table
});

const BUILTIN_SIGNATURES: &[(&str, &str)] = &[
    ("abs", "x, /"),
    ("len", "obj, /"),
    ("sum", "iterable, /, start=0"),
    ("round", "number, ndigits=None"),
    ("pow", "base, exp, mod=None"),
    ("divmod", "x, y, /"),
    ("sorted", "iterable, /, *, key=None, reverse=False"),
    ("enumerate", "iterable, start=0"),
    ("isinstance", "obj, class_or_tuple, /"),
    ("print", "*args, sep=' ', end='\\n', file=None, flush=False"),
    ("math.sqrt", "x, /"),
    ("math.floor", "x, /"),
    ("math.ceil", "x, /"),
    ("math.pow", "x, y, /"),
];

/// Builds the canonical built-in signature table.
///
/// # Example
/// ```rust
/// use treegrade::signature::build_default_signature_table;
/// let table = build_default_signature_table();
/// assert!(table.has("print"));
/// ```
pub fn build_default_signature_table() -> SignatureTable {
    DEFAULT_TABLE.clone()
}

pub fn register_builtins(table: &mut SignatureTable) {
    for (name, params) in BUILTIN_SIGNATURES {
        if let Err(err) = table.register_source(name, params) {
            tracing::warn!(callee = *name, error = %err, "skipping malformed built-in signature");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_builtin_registers() {
        let table = build_default_signature_table();
        assert_eq!(table.len(), BUILTIN_SIGNATURES.len());
    }

    #[test]
    fn test_print_defaults_render_as_source() {
        let table = build_default_signature_table();
        let print = table.get("print").unwrap();
        let end = print.param("end").unwrap().1;
        assert_eq!(end.default.as_ref().unwrap().pretty(), "\"\\n\"");
    }
}
