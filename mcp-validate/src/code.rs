//! AST-based dangerous-construct detection for user-supplied code.
//!
//! Parsing happens first; the denylists below are walked against the parsed
//! tree, never against raw text — regex is never the sole defense.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use tree_sitter::{Node, Parser};

use mcp_core::error::AppError;

pub const S_MAX: usize = 100 * 1024;
pub const D_MAX: usize = 200;
pub const N_MAX: usize = 20_000;

static DANGEROUS_MODULES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "os", "subprocess", "socket", "socketserver", "sys", "shutil", "ctypes", "importlib",
        "imp", "pty", "fcntl", "resource", "signal", "multiprocessing", "pickle", "marshal",
    ]
    .into_iter()
    .collect()
});

static NETWORK_MODULES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ["http", "http.client", "urllib", "urllib.request", "ftplib", "smtplib", "requests", "ssl"]
        .into_iter()
        .collect()
});

static DANGEROUS_FUNCTIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ["eval", "exec", "compile", "__import__", "input", "help"]
        .into_iter()
        .collect()
});

static DANGEROUS_DUNDERS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "__builtins__",
        "__globals__",
        "__import__",
        "__subclasses__",
        "__mro__",
        "__dict__",
        "__class__",
        "__bases__",
        "__code__",
        "__closure__",
        "__func__",
        "__self__",
    ]
    .into_iter()
    .collect()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Python,
}

impl Language {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "python" | "py" => Some(Language::Python),
            _ => None,
        }
    }
}

struct Walk<'a> {
    source: &'a [u8],
    strict: bool,
    node_count: usize,
    max_depth: usize,
}

fn text<'a>(node: Node<'_>, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

impl<'a> Walk<'a> {
    fn check(&mut self, node: Node<'_>, depth: usize) -> Result<(), AppError> {
        self.node_count += 1;
        self.max_depth = self.max_depth.max(depth);
        if self.node_count > N_MAX {
            return Err(AppError::invalid(format!(
                "source exceeds maximum AST node count ({N_MAX})"
            )));
        }
        if depth > D_MAX {
            return Err(AppError::invalid(format!(
                "source exceeds maximum AST depth ({D_MAX})"
            )));
        }

        match node.kind() {
            "import_statement" => self.check_import(node, None)?,
            "import_from_statement" => {
                if let Some(module) = node.child_by_field_name("module_name") {
                    self.check_import(node, Some(text(module, self.source)))?;
                }
            }
            "call" => self.check_call(node)?,
            "attribute" => self.check_attribute(node)?,
            "subscript" => self.check_subscript(node)?,
            _ => {}
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.check(child, depth + 1)?;
        }
        Ok(())
    }

    fn check_import(&self, node: Node<'_>, from_module: Option<&str>) -> Result<(), AppError> {
        let modules: Vec<String> = if let Some(m) = from_module {
            vec![m.to_string()]
        } else {
            let mut cursor = node.walk();
            node.children(&mut cursor)
                .filter(|c| matches!(c.kind(), "dotted_name" | "aliased_import"))
                .map(|c| {
                    let n = c
                        .child_by_field_name("name")
                        .unwrap_or(c);
                    text(n, self.source).to_string()
                })
                .collect()
        };

        for module in &modules {
            let root = module.split('.').next().unwrap_or(module.as_str());
            if DANGEROUS_MODULES.contains(root) || DANGEROUS_MODULES.contains(module.as_str()) {
                return Err(AppError::invalid_token(
                    format!("import of dangerous module '{module}' is not permitted"),
                    module.clone(),
                ));
            }
            if self.strict
                && (NETWORK_MODULES.contains(root) || NETWORK_MODULES.contains(module.as_str()))
            {
                return Err(AppError::invalid_token(
                    format!("import of network module '{module}' is not permitted in strict mode"),
                    module.clone(),
                ));
            }
        }
        Ok(())
    }

    fn check_call(&self, node: Node<'_>) -> Result<(), AppError> {
        let Some(function) = node.child_by_field_name("function") else {
            return Ok(());
        };
        if function.kind() == "identifier" {
            let name = text(function, self.source);
            if DANGEROUS_FUNCTIONS.contains(name) {
                return Err(AppError::invalid_token(
                    format!("call to '{name}' is not permitted"),
                    name.to_string(),
                ));
            }
            if name == "open" {
                if let Some(args) = node.child_by_field_name("arguments") {
                    if call_opens_for_write(args, self.source) {
                        return Err(AppError::invalid_token(
                            "open() in write mode is not permitted".to_string(),
                            "open".to_string(),
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    fn check_attribute(&self, node: Node<'_>) -> Result<(), AppError> {
        if let Some(attr) = node.child_by_field_name("attribute") {
            let name = text(attr, self.source);
            if DANGEROUS_DUNDERS.contains(name) {
                return Err(AppError::invalid_token(
                    format!("access to '{name}' is not permitted"),
                    name.to_string(),
                ));
            }
        }
        Ok(())
    }

    fn check_subscript(&self, node: Node<'_>) -> Result<(), AppError> {
        let Some(subscript) = node.child_by_field_name("subscript") else {
            return Ok(());
        };
        if subscript.kind() != "string" {
            return Ok(());
        }
        let key = string_literal_value(subscript, self.source);
        if !DANGEROUS_DUNDERS.contains(key.as_str()) {
            return Ok(());
        }
        let Some(value) = node.child_by_field_name("value") else {
            return Ok(());
        };
        let reaches_frame = match value.kind() {
            "call" => value
                .child_by_field_name("function")
                .map(|f| matches!(text(f, self.source), "globals" | "locals" | "vars"))
                .unwrap_or(false),
            "identifier" => matches!(text(value, self.source), "__builtins__" | "__dict__"),
            _ => false,
        };
        if reaches_frame {
            return Err(AppError::invalid_token(
                format!("subscript access to '{key}' is not permitted"),
                key,
            ));
        }
        Ok(())
    }
}

fn string_literal_value(node: Node<'_>, source: &[u8]) -> String {
    text(node, source).trim_matches(|c| c == '\'' || c == '"').to_string()
}

fn call_opens_for_write(args: Node<'_>, source: &[u8]) -> bool {
    let mut cursor = args.walk();
    for child in args.children(&mut cursor) {
        if child.kind() == "string" {
            let mode = string_literal_value(child, source);
            if mode.contains('w') || mode.contains('a') || mode.contains('x') || mode.contains('+') {
                return true;
            }
        }
        if child.kind() == "keyword_argument" {
            if let Some(name) = child.child_by_field_name("name") {
                if text(name, source) == "mode" {
                    if let Some(value) = child.child_by_field_name("value") {
                        let mode = string_literal_value(value, source);
                        if mode.contains('w') || mode.contains('a') || mode.contains('x') || mode.contains('+') {
                            return true;
                        }
                    }
                }
            }
        }
    }
    false
}

/// Returns `Ok(())` if `source` has no disallowed construct for
/// `language`, otherwise an error describing which one.
pub fn validate_code(source: &str, language: &str, strict: bool) -> Result<(), AppError> {
    if source.len() > S_MAX {
        return Err(AppError::invalid(format!(
            "source exceeds maximum length of {S_MAX} bytes"
        )));
    }

    let Some(lang) = Language::parse(language) else {
        return Err(AppError::invalid(format!(
            "unsupported language for validation: '{language}'"
        )));
    };

    let mut parser = Parser::new();
    match lang {
        Language::Python => parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .map_err(|e| AppError::Internal(format!("failed to load grammar: {e}")))?,
    }

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| AppError::invalid("source could not be parsed"))?;

    if tree.root_node().has_error() {
        return Err(AppError::invalid("source contains a syntax error"));
    }

    let mut walk = Walk {
        source: source.as_bytes(),
        strict,
        node_count: 0,
        max_depth: 0,
    };
    walk.check(tree.root_node(), 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_benign_function() {
        assert!(validate_code("def add(a, b):\n    return a + b\n", "python", false).is_ok());
    }

    #[test]
    fn rejects_dangerous_import() {
        let err = validate_code("import os\nos.system('id')\n", "python", false).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput { .. }));
    }

    #[test]
    fn rejects_dunder_import_call() {
        let err = validate_code("__import__('os').system('id')\n", "python", false).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput { .. }));
    }

    #[test]
    fn rejects_globals_subscript_bypass() {
        let src = "globals()['__builtins__']\n";
        assert!(validate_code(src, "python", false).is_err());
    }

    #[test]
    fn rejects_dunder_attribute_access() {
        assert!(validate_code("x.__class__.__mro__\n", "python", false).is_err());
    }

    #[test]
    fn rejects_open_in_write_mode() {
        assert!(validate_code("open('f.txt', 'w')\n", "python", false).is_err());
        assert!(validate_code("open('f.txt', 'r')\n", "python", false).is_ok());
    }

    #[test]
    fn strict_mode_rejects_network_modules() {
        assert!(validate_code("import urllib.request\n", "python", true).is_err());
        assert!(validate_code("import urllib.request\n", "python", false).is_ok());
    }

    #[test]
    fn rejects_oversized_source() {
        let huge = "a = 1\n".repeat(S_MAX);
        assert!(validate_code(&huge, "python", false).is_err());
    }

    #[test]
    fn rejects_unsupported_language() {
        assert!(validate_code("puts 1", "ruby", false).is_err());
    }

    #[test]
    fn is_deterministic() {
        let src = "def f():\n    eval('1')\n";
        let a = validate_code(src, "python", false);
        let b = validate_code(src, "python", false);
        assert_eq!(a.is_err(), b.is_err());
    }
}
