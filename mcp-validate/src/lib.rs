//! AST-based code validation and denylist-based graph-query validation.

pub mod code;
pub mod graph_query;
pub mod identifier;

pub use code::{validate_code, Language};
pub use graph_query::validate_graph_query;
pub use identifier::{validate_identifier, validate_path};
