//! Supported sandbox languages and the argv used to run a file or a test
//! harness under each one.

use std::path::Path;

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

    pub fn source_filename(&self) -> &'static str {
        match self {
            Language::Python => "main.py",
        }
    }

    pub fn test_filename(&self) -> &'static str {
        match self {
            Language::Python => "test_module.py",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Entrypoint {
    Interpret,
    TestHarness,
}

impl Entrypoint {
    pub fn filename(&self, language: Language) -> &'static str {
        match self {
            Entrypoint::Interpret => language.source_filename(),
            Entrypoint::TestHarness => language.test_filename(),
        }
    }

    pub fn command(&self, language: Language, source_path: &Path) -> (&'static str, Vec<String>) {
        let path = source_path.display().to_string();
        match (self, language) {
            (Entrypoint::Interpret, Language::Python) => ("python3", vec![path]),
            (Entrypoint::TestHarness, Language::Python) => {
                ("python3", vec!["-m".into(), "pytest".into(), "-q".into(), path])
            }
        }
    }
}

/// A stripped-down environment handed to the child: no inherited secrets,
/// just enough for the interpreter to start.
pub fn minimal_env() -> Vec<(&'static str, &'static str)> {
    vec![
        ("PATH", "/usr/bin:/bin"),
        ("LANG", "C.UTF-8"),
        ("PYTHONDONTWRITEBYTECODE", "1"),
        ("PYTHONUNBUFFERED", "1"),
    ]
}
