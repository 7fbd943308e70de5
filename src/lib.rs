/*!
# `jsonwhere` Library

Filters in-memory JSON documents with WHERE-style conditions, without a
database.

- [`document`]: loading documents (JSON, and YAML/TOML/CBOR/MessagePack behind
  features) into a base tree plus working copy
- [`path`]: node paths locating the collection to filter
- [`operator`]: the fixed operator registry and its comparison rules
- [`condition`]: the OR-of-AND condition model, its builder and its parser
- [`evaluator`]: filtering a collection with a condition set
- [`engine`]: [`QueryEngine`], a query session with `get`/`first`/`count`
*/

pub mod condition;
pub mod document;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod operator;
pub mod path;
pub mod utils;

// Re-exports
pub use condition::{Condition, ConditionBuilder, ConditionSet};
pub use engine::QueryEngine;
pub use error::QueryError;
pub use operator::Operator;
pub use path::NodePath;
