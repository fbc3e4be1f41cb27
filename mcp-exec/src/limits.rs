//! Resource limits applied to a sandboxed child between fork and exec.

use rlimit::Resource;

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct ResourceLimits {
    pub cpu_seconds: u64,
    pub address_space_bytes: u64,
    pub file_size_bytes: u64,
    pub open_files: u64,
    /// Total processes the child's uid may own, including the child itself.
    /// Kept tight enough that the interpreter cannot fork a worker of its own.
    pub max_processes: u64,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            cpu_seconds: 5,
            address_space_bytes: 256 * 1024 * 1024,
            file_size_bytes: 10 * 1024 * 1024,
            open_files: 32,
            max_processes: 2,
        }
    }
}

impl ResourceLimits {
    pub fn with_memory_bytes(mut self, bytes: u64) -> Self {
        self.address_space_bytes = bytes;
        self
    }

    pub fn with_cpu_seconds(mut self, seconds: u64) -> Self {
        self.cpu_seconds = seconds;
        self
    }

    /// Runs in the child between `fork` and `exec`; must stick to
    /// async-signal-safe operations, so this is limited to plain `setrlimit`
    /// calls and nothing that allocates or takes locks.
    pub fn apply(&self) -> std::io::Result<()> {
        rlimit::setrlimit(Resource::CPU, self.cpu_seconds, self.cpu_seconds)?;
        rlimit::setrlimit(Resource::AS, self.address_space_bytes, self.address_space_bytes)?;
        rlimit::setrlimit(Resource::FSIZE, self.file_size_bytes, self.file_size_bytes)?;
        rlimit::setrlimit(Resource::NOFILE, self.open_files, self.open_files)?;
        rlimit::setrlimit(Resource::NPROC, self.max_processes, self.max_processes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limits_are_tight_but_usable() {
        let limits = ResourceLimits::default();
        assert!(limits.cpu_seconds > 0);
        assert!(limits.address_space_bytes >= 64 * 1024 * 1024);
        assert!(limits.max_processes <= 4);
    }
}
