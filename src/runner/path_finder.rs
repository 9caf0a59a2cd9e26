//! Program lookup with fallback system locations.

use std::path::{Path, PathBuf};

/// System directories checked when a program is not on `PATH`.
///
/// `sysctl`, `ss` and friends live in sbin directories that are often
/// missing from the `PATH` of a `sudo` session.
const FALLBACK_PATHS: &[&str] = &["/usr/sbin", "/sbin", "/usr/local/bin", "/usr/bin"];

/// Resolve a program name to an executable path.
///
/// Names containing a `/` are taken as paths and returned as-is if they
/// exist. Otherwise the name is looked up on `PATH` via the `which` crate,
/// then in [`FALLBACK_PATHS`].
pub(crate) fn find_program(name: &str) -> Option<PathBuf> {
    if name.contains('/') {
        let path = Path::new(name);
        return path.exists().then(|| path.to_path_buf());
    }

    if let Ok(path) = which::which(name) {
        return Some(path);
    }

    FALLBACK_PATHS
        .iter()
        .map(|dir| PathBuf::from(dir).join(name))
        .find(|path| path.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_common_program() {
        let result = find_program("ls");
        assert!(result.is_some());
        assert!(result.unwrap().exists());
    }

    #[test]
    fn test_find_nonexistent_program() {
        assert!(find_program("definitely_not_a_real_program_12345").is_none());
    }

    #[test]
    fn test_explicit_path_must_exist() {
        assert!(find_program("/nonexistent/dir/install.sh").is_none());

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("install.sh");
        std::fs::write(&script, "#!/bin/sh\n").unwrap();
        assert_eq!(
            find_program(script.to_str().unwrap()),
            Some(script.clone())
        );
    }
}
