use crate::env::Environment;
use std::borrow::Cow;
use std::ffi::OsStr;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Resolve the program named by `argv[0]` using the session's `PATH`.
pub fn resolve(env: &Environment, name: &str) -> Option<PathBuf> {
    let search_paths = env.get_var("PATH").unwrap_or_default();
    find_command_path(OsStr::new(search_paths), Path::new(name)).map(Cow::into_owned)
}

/// Resolve a command path the way a typical shell would.
///
/// Behavior:
/// - Any name containing a `/` (absolute, `./foo`, `bin/sh`): returned as-is if it exists.
///   Whether it can actually be executed is left to `execve`.
/// - Single path component: search each directory in `search_paths` (PATH) and
///   return the first regular file with an execute bit set.
/// - Empty path: returns `None`.
pub fn find_command_path<'a>(search_paths: &OsStr, path: &'a Path) -> Option<Cow<'a, Path>> {
    let mut components = path.components();
    match (components.next(), components.next()) {
        (None, _) => None,
        (Some(x), None) if !path.is_absolute() && !path.starts_with(".") => {
            find_in_path(search_paths, x.as_os_str()).map(Cow::Owned)
        }
        _ => find_by_path(path).map(Cow::Borrowed),
    }
}

fn find_in_path(search_paths: &OsStr, cmd: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(search_paths)
        .map(|dir| {
            // An empty PATH entry means the current directory.
            if dir.as_os_str().is_empty() {
                PathBuf::from(".").join(cmd)
            } else {
                dir.join(cmd)
            }
        })
        .find(|candidate| is_executable_file(candidate))
}

fn find_by_path(path: &Path) -> Option<&Path> {
    if path.exists() { Some(path) } else { None }
}

fn is_executable_file(path: &Path) -> bool {
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}
