//! 系统探测
//!
//! Device-node, environment and program lookups used to gate checks before
//! anything is spawned. Kept behind a trait so checks can be exercised
//! without a camera or a display attached.

use std::env;
use std::path::{Path, PathBuf};

#[cfg_attr(test, mockall::automock)]
pub trait SystemProbe: Send + Sync {
    /// Whether a device node or file exists.
    fn path_exists(&self, path: &Path) -> bool;

    /// Reads an environment variable, treating empty values as unset.
    fn get_env(&self, name: &str) -> Option<String>;

    /// Resolves a program the way the shell would: paths are checked
    /// directly, bare names are searched on `PATH`.
    fn find_program(&self, program: &str) -> Option<PathBuf>;
}

/// Probe backed by the real host.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostProbe;

impl SystemProbe for HostProbe {
    fn path_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn get_env(&self, name: &str) -> Option<String> {
        env::var(name).ok().filter(|value| !value.is_empty())
    }

    fn find_program(&self, program: &str) -> Option<PathBuf> {
        if program.contains('/') {
            let path = PathBuf::from(program);
            return is_executable(&path).then_some(path);
        }
        let search_path = env::var_os("PATH")?;
        env::split_paths(&search_path)
            .map(|dir| dir.join(program))
            .find(|candidate| is_executable(candidate))
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
