//! Structural lint extraction and the optional external-analyzer subprocess.

use std::collections::HashSet;
use std::time::Duration;

use mcp_core::error::AppError;
use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tree_sitter::{Node, Parser};

const ANALYZER_TIMEOUT: Duration = Duration::from_secs(10);
const ANALYZER_OUTPUT_CAP: usize = 100 * 1024;

const BRANCH_KINDS: &[&str] = &[
    "if_statement",
    "elif_clause",
    "for_statement",
    "while_statement",
    "except_clause",
    "conditional_expression",
    "boolean_operator",
];

#[derive(Debug, Clone, serde::Serialize)]
pub struct LintArtifact {
    pub code_hash: String,
    pub language: String,
    pub functions: Vec<String>,
    pub classes: Vec<String>,
    pub imports: Vec<String>,
    pub complexity: u32,
    pub analyzer_exit_code: Option<i32>,
    pub analyzer_output: Option<String>,
}

struct Extracted {
    functions: Vec<String>,
    classes: Vec<String>,
    imports: Vec<String>,
    complexity: u32,
}

fn text<'a>(node: Node<'_>, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

fn walk(node: Node<'_>, source: &[u8], out: &mut Extracted) {
    match node.kind() {
        "function_definition" => {
            if let Some(name) = node.child_by_field_name("name") {
                out.functions.push(text(name, source).to_string());
            }
        }
        "class_definition" => {
            if let Some(name) = node.child_by_field_name("name") {
                out.classes.push(text(name, source).to_string());
            }
        }
        "import_statement" => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                if matches!(child.kind(), "dotted_name" | "aliased_import") {
                    let name_node = child.child_by_field_name("name").unwrap_or(child);
                    out.imports.push(text(name_node, source).to_string());
                }
            }
        }
        "import_from_statement" => {
            if let Some(module) = node.child_by_field_name("module_name") {
                out.imports.push(text(module, source).to_string());
            }
        }
        _ => {}
    }
    if BRANCH_KINDS.contains(&node.kind()) {
        out.complexity += 1;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(child, source, out);
    }
}

/// Deduplicates by first occurrence (source order), then applies a stable
/// sort so the final listing is alphabetical and reproducible.
fn dedup_sorted(names: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut ordered: Vec<String> = names.into_iter().filter(|n| seen.insert(n.clone())).collect();
    ordered.sort();
    ordered
}

pub fn code_hash(source: &str) -> String {
    hex::encode(Sha256::digest(source.as_bytes()))
}

/// Parses `source` and extracts structural facts; does not run the external
/// analyzer (see [`run_external_analyzer`] for that).
pub fn analyze_structure(source: &str, language: &str) -> Result<LintArtifact, AppError> {
    let lang = mcp_validate::Language::parse(language)
        .ok_or_else(|| AppError::invalid(format!("unsupported language: {language}")))?;

    let mut parser = Parser::new();
    match lang {
        mcp_validate::Language::Python => parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .map_err(|e| AppError::Internal(format!("failed to load grammar: {e}")))?,
    }
    let tree = parser
        .parse(source, None)
        .ok_or_else(|| AppError::invalid("source could not be parsed"))?;

    let mut extracted = Extracted {
        functions: Vec::new(),
        classes: Vec::new(),
        imports: Vec::new(),
        complexity: 0,
    };
    walk(tree.root_node(), source.as_bytes(), &mut extracted);

    Ok(LintArtifact {
        code_hash: code_hash(source),
        language: language.to_string(),
        functions: dedup_sorted(extracted.functions),
        classes: dedup_sorted(extracted.classes),
        imports: dedup_sorted(extracted.imports),
        complexity: extracted.complexity + 1,
        analyzer_exit_code: None,
        analyzer_output: None,
    })
}

/// Runs an external analyzer binary over the source file at `source_path`,
/// bounding both wall-clock time and captured output. A missing or failing
/// analyzer is not itself an error: callers treat the absence of a result as
/// "no external findings", not a lint failure.
pub async fn run_external_analyzer(
    analyzer: &str,
    source_path: &std::path::Path,
) -> Option<(Option<i32>, String)> {
    let mut command = Command::new(analyzer);
    command
        .arg(source_path)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::null());

    let mut child = command.spawn().ok()?;
    let mut stdout = child.stdout.take()?;
    let read = async {
        let mut buf = Vec::with_capacity(8192);
        let mut chunk = [0u8; 8192];
        loop {
            match stdout.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => {
                    let take = (ANALYZER_OUTPUT_CAP.saturating_sub(buf.len())).min(n);
                    buf.extend_from_slice(&chunk[..take]);
                    if buf.len() >= ANALYZER_OUTPUT_CAP {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
        buf
    };

    let output = tokio::time::timeout(ANALYZER_TIMEOUT, read).await.ok()?;
    let status = tokio::time::timeout(ANALYZER_TIMEOUT, child.wait()).await.ok()?.ok();
    Some((
        status.and_then(|s| s.code()),
        String::from_utf8_lossy(&output).into_owned(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_structure_in_alphabetical_order() {
        let src = "import os\nimport sys\n\ndef b():\n    pass\n\ndef a():\n    if True:\n        pass\n\nclass Z:\n    pass\n";
        let artifact = analyze_structure(src, "python").unwrap();
        assert_eq!(artifact.functions, vec!["a", "b"]);
        assert_eq!(artifact.classes, vec!["Z"]);
        assert_eq!(artifact.imports, vec!["os", "sys"]);
        assert_eq!(artifact.complexity, 2);
    }

    #[test]
    fn deduplicates_repeated_imports() {
        let src = "import os\nimport os\n\ndef f():\n    pass\n";
        let artifact = analyze_structure(src, "python").unwrap();
        assert_eq!(artifact.imports, vec!["os"]);
    }

    #[test]
    fn complexity_counts_branches_plus_one() {
        let src = "def f(x):\n    if x:\n        pass\n    elif x:\n        pass\n    while x:\n        pass\n";
        let artifact = analyze_structure(src, "python").unwrap();
        assert_eq!(artifact.complexity, 4);
    }

    #[test]
    fn code_hash_is_stable() {
        assert_eq!(code_hash("print(1)"), code_hash("print(1)"));
        assert_ne!(code_hash("print(1)"), code_hash("print(2)"));
    }
}
