use std::env;
use std::path::{Path, PathBuf};

const TMP_SOCKET: &str = "/tmp/cmus-socket";

/// Well-known cmus socket locations, in lookup order.
///
/// Entries that depend on an unset (or empty) environment variable are left out.
pub fn default_socket_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(TMP_SOCKET)];
    if let Some(home) = non_empty_var("HOME") {
        paths.push(home.join(".cmus").join("socket"));
    }
    if let Some(runtime) = non_empty_var("XDG_RUNTIME_DIR") {
        paths.push(runtime.join("cmus-socket"));
    }
    paths
}

/// Returns the first candidate that exists.
pub fn discover<P: AsRef<Path>>(candidates: &[P]) -> Option<PathBuf> {
    candidates
        .iter()
        .map(AsRef::as_ref)
        .find(|path| path.exists())
        .map(Path::to_path_buf)
}

fn non_empty_var(name: &str) -> Option<PathBuf> {
    env::var_os(name)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}
