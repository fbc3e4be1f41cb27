//! A private, self-removing working directory for one sandboxed run.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Wraps a [`tempfile::TempDir`] so the directory and everything written into
/// it is removed on every exit path, including panics, once this value drops.
pub struct SandboxDir(tempfile::TempDir);

impl SandboxDir {
    pub fn create() -> std::io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("mcp-exec-").tempdir()?;
        let mut perms = std::fs::metadata(dir.path())?.permissions();
        perms.set_mode(0o700);
        std::fs::set_permissions(dir.path(), perms)?;
        Ok(Self(dir))
    }

    pub fn path(&self) -> &Path {
        self.0.path()
    }

    pub fn write_source(&self, filename: &str, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.path().join(filename);
        std::fs::write(&path, contents)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_is_private_and_removed_on_drop() {
        let path;
        {
            let dir = SandboxDir::create().unwrap();
            path = dir.path().to_path_buf();
            let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o700);
            dir.write_source("main.py", "print(1)\n").unwrap();
            assert!(path.join("main.py").exists());
        }
        assert!(!path.exists());
    }
}
