//! # WHERE Conditions
//!
//! Conditions combine into a two-level expression: conditions inside a group
//! are AND-ed, groups are OR-ed. They are assembled with the chaining
//! [`ConditionBuilder`] or parsed from text such as
//! `age >= 30 and name startswith "R" or vip = true`.

pub mod ast;
pub mod parser;

// Re-exports
pub use ast::*;
pub use parser::*;
