//! Syntax module for the guest language.
//!
//! [`parse`] produces the raw `Module` tree straight from the grammar;
//! [`normalize`] applies the light rewriting the comparator expects.

pub mod normalize;
pub mod parser;

pub use normalize::{normalize, normalize_named, normalize_tree};
pub use parser::{parse, parse_named};
