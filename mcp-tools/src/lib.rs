//! Lint, generation, and graph tool logic shared by both transports.
//! Execution and test running live in `mcp-exec`.

pub mod generate;
pub mod graph_tool;
pub mod lint;

pub use generate::{render, GenerationArtifact};
pub use graph_tool::{query, upsert, GraphNode, GraphRelationship};
pub use lint::{analyze_structure, code_hash, run_external_analyzer, LintArtifact};
